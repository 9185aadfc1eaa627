// src/server/dispatch.rs

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::exec::ProcessRegistry;
use crate::server::protocol::{Reply, Request, RequestEnvelope, Response};
use crate::watch::{DirUpdate, DirWatchRegistry};

/// Capacity of the channel carrying directory updates to the transport.
pub const UPDATE_CHANNEL_CAPACITY: usize = 64;

/// Routes requests to the process and watch registries.
///
/// Transport-agnostic: it turns one [`RequestEnvelope`] into one
/// [`Response`]. Cloning shares both registries.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    processes: ProcessRegistry,
    watches: DirWatchRegistry,
    updates: mpsc::Sender<DirUpdate>,
}

impl Dispatcher {
    /// Returns the dispatcher and the receiving end of every directory update
    /// produced by `watch-dir` requests.
    pub fn new(
        processes: ProcessRegistry,
        watches: DirWatchRegistry,
    ) -> (Self, mpsc::Receiver<DirUpdate>) {
        let (updates, updates_rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);
        (
            Self {
                processes,
                watches,
                updates,
            },
            updates_rx,
        )
    }

    pub fn processes(&self) -> &ProcessRegistry {
        &self.processes
    }

    pub fn watches(&self) -> &DirWatchRegistry {
        &self.watches
    }

    pub async fn handle(&self, envelope: RequestEnvelope) -> Response {
        let seq = envelope.seq;
        debug!(seq, request = ?envelope.request, "handling request");

        match envelope.request {
            Request::Spawn {
                id,
                binary,
                arguments,
            } => match self.processes.launch(&id, &binary, arguments) {
                Ok(outcome) => Response::ok(seq, Reply::Accepted(outcome.is_accepted())),
                Err(err) => {
                    warn!(group = %id, error = %err, "launch failed");
                    Response::error(Some(seq), &err)
                }
            },

            Request::List => Response::ok(seq, Reply::Listing(self.processes.list())),

            Request::Get { id } => match self.processes.get(&id) {
                Some(snapshot) => Response::ok(seq, Reply::Group(snapshot)),
                None => Response::not_found(seq),
            },

            Request::GetOutput { id } => match self.processes.get_output(&id).await {
                Some(outputs) => Response::ok(seq, Reply::Output(outputs)),
                None => Response::not_found(seq),
            },

            Request::Kill { id } => {
                if self.processes.kill(&id) {
                    Response::ack(seq)
                } else {
                    Response::not_found(seq)
                }
            }

            // Acknowledged whether or not the watch could be established.
            Request::WatchDir { path } => {
                self.watches.watch(path, self.updates.clone());
                Response::ack(seq)
            }

            Request::WatchDirClear { path } => {
                self.watches.clear(&path);
                Response::ack(seq)
            }
        }
    }

    /// Kill all groups and drop all watches.
    pub fn shutdown(&self) {
        self.processes.shutdown();
        self.watches.clear_all();
    }
}
