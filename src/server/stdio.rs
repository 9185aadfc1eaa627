// src/server/stdio.rs

//! Line-oriented transport: requests in, responses and pushes out.

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::server::dispatch::Dispatcher;
use crate::server::protocol::{parse_request_line, Outgoing, Push, Response};
use crate::watch::DirUpdate;

const OUTGOING_CAPACITY: usize = 256;

/// Serve requests read from `input` until it reaches EOF.
///
/// Each request is handled in its own task, so a slow `get-output` does not
/// hold up other requests; responses may therefore arrive out of order and
/// carry the request's `seq`. Directory updates are interleaved as pushes.
///
/// Returns once input is exhausted and every in-flight response is written.
/// Tearing down the registries is left to the caller.
pub async fn serve<R, W>(
    dispatcher: Dispatcher,
    updates: mpsc::Receiver<DirUpdate>,
    input: R,
    output: W,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (out_tx, out_rx) = mpsc::channel::<Outgoing>(OUTGOING_CAPACITY);
    let writer = tokio::spawn(write_loop(output, out_rx));
    let forwarder = tokio::spawn(forward_updates(updates, out_tx.clone()));

    let mut lines = BufReader::new(input).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("input closed");
                break;
            }
            Err(err) => {
                error!(error = %err, "failed to read request");
                break;
            }
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match parse_request_line(trimmed) {
            Ok(envelope) => {
                let dispatcher = dispatcher.clone();
                let tx = out_tx.clone();
                tokio::spawn(async move {
                    let response = dispatcher.handle(envelope).await;
                    let _ = tx.send(Outgoing::Response(response)).await;
                });
            }
            Err(bad) => {
                warn!(seq = bad.seq, error = %bad.error, "malformed request");
                let response = Response::error(bad.seq, &bad.error);
                if out_tx.send(Outgoing::Response(response)).await.is_err() {
                    break;
                }
            }
        }
    }

    forwarder.abort();
    drop(out_tx);
    if let Err(err) = writer.await {
        error!(error = %err, "output writer task failed");
    }

    info!("transport finished");
    Ok(())
}

async fn forward_updates(mut updates: mpsc::Receiver<DirUpdate>, out_tx: mpsc::Sender<Outgoing>) {
    while let Some(update) = updates.recv().await {
        if out_tx.send(Outgoing::Push(Push::from(update))).await.is_err() {
            break;
        }
    }
}

async fn write_loop<W>(mut output: W, mut out_rx: mpsc::Receiver<Outgoing>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = out_rx.recv().await {
        let mut line = match serde_json::to_string(&message) {
            Ok(json) => json,
            Err(err) => {
                error!(error = %err, "failed to serialize outgoing message");
                continue;
            }
        };
        line.push('\n');

        if let Err(err) = output.write_all(line.as_bytes()).await {
            error!(error = %err, "failed to write output");
            break;
        }
        if let Err(err) = output.flush().await {
            error!(error = %err, "failed to flush output");
            break;
        }
    }
}
