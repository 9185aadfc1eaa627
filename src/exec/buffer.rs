// src/exec/buffer.rs

//! Bounded, rewindable byte buffer for captured process output.
//!
//! One writer appends; any number of [`ReplayReader`]s can be created at any
//! time and each reads from the logical start of whatever is still held.
//! Offsets are absolute positions in the stream of everything ever written,
//! so a reader that falls behind the ring start knows how much it missed.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;

#[derive(Debug)]
struct Ring {
    data: VecDeque<u8>,
    /// Absolute offset of `data[0]`.
    start: u64,
}

impl Ring {
    fn end(&self) -> u64 {
        self.start + self.data.len() as u64
    }
}

#[derive(Debug)]
struct Shared {
    ring: Mutex<Ring>,
    capacity: usize,
    closed: watch::Sender<bool>,
}

impl Shared {
    fn ring(&self) -> MutexGuard<'_, Ring> {
        self.ring.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Fixed-capacity ring of the most recent output bytes.
///
/// Cloning gives another handle to the same buffer.
#[derive(Debug, Clone)]
pub struct ReplayBuffer {
    shared: Arc<Shared>,
}

impl ReplayBuffer {
    /// A capacity of zero is treated as one byte.
    pub fn new(capacity: usize) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                ring: Mutex::new(Ring {
                    data: VecDeque::new(),
                    start: 0,
                }),
                capacity: capacity.max(1),
                closed,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Append bytes, evicting the oldest ones once capacity is exceeded.
    pub fn append(&self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }

        let capacity = self.shared.capacity;
        let mut ring = self.shared.ring();

        if bytes.len() >= capacity {
            let evicted = ring.data.len() + (bytes.len() - capacity);
            ring.data.clear();
            ring.start += evicted as u64;
            ring.data.extend(&bytes[bytes.len() - capacity..]);
            return;
        }

        let overflow = (ring.data.len() + bytes.len()).saturating_sub(capacity);
        if overflow > 0 {
            ring.data.drain(..overflow);
            ring.start += overflow as u64;
        }
        ring.data.extend(bytes);
    }

    /// Mark the end of the stream. Idempotent.
    pub fn close(&self) {
        self.shared.closed.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.shared.closed.borrow()
    }

    /// Bytes currently held.
    pub fn len(&self) -> usize {
        self.shared.ring().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes ever appended, including evicted ones.
    pub fn total_written(&self) -> u64 {
        self.shared.ring().end()
    }

    /// A new cursor positioned at the logical start of the stream.
    pub fn rewind(&self) -> ReplayReader {
        ReplayReader {
            shared: Arc::clone(&self.shared),
            position: 0,
            missed: 0,
        }
    }
}

/// Independent read cursor over a [`ReplayBuffer`].
#[derive(Debug)]
pub struct ReplayReader {
    shared: Arc<Shared>,
    position: u64,
    missed: u64,
}

impl ReplayReader {
    /// Absolute offset of the next byte this cursor will return.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Bytes that were evicted before this cursor could read them.
    pub fn missed(&self) -> u64 {
        self.missed
    }

    /// Everything from the cursor to the current end; advances the cursor.
    pub fn read_available(&mut self) -> Vec<u8> {
        let ring = self.shared.ring();

        if self.position < ring.start {
            self.missed += ring.start - self.position;
            self.position = ring.start;
        }

        let offset = (self.position - ring.start) as usize;
        let bytes: Vec<u8> = ring.data.range(offset..).copied().collect();
        self.position = ring.end();
        bytes
    }

    /// Wait until the writer closes the buffer or `settle` elapses.
    ///
    /// Returns `true` if the buffer was closed.
    pub async fn wait_settled(&self, settle: Duration) -> bool {
        let mut rx = self.shared.closed.subscribe();
        let closed = async move {
            loop {
                let done = *rx.borrow_and_update();
                if done || rx.changed().await.is_err() {
                    return;
                }
            }
        };
        tokio::time::timeout(settle, closed).await.is_ok()
    }

    /// Read to end-of-stream, where end-of-stream is whichever comes first:
    /// the buffer being closed, or the quiescence window `settle` passing.
    pub async fn read_to_end(&mut self, settle: Duration) -> Vec<u8> {
        self.wait_settled(settle).await;
        self.read_available()
    }

    /// [`read_to_end`](Self::read_to_end) decoded as UTF-8 (lossy).
    pub async fn read_to_string(&mut self, settle: Duration) -> String {
        let missed_before = self.missed;
        let bytes = self.read_to_end(settle).await;
        let truncated = self.missed > missed_before;
        decode_output(&bytes, truncated)
    }
}

/// Decode captured output. When the head of the stream was evicted, the first
/// bytes may be the tail of a multi-byte character; those are dropped instead
/// of being rendered as replacement characters.
fn decode_output(bytes: &[u8], truncated: bool) -> String {
    let mut start = 0;
    if truncated {
        while start < bytes.len().min(3) && is_utf8_continuation(bytes[start]) {
            start += 1;
        }
    }
    String::from_utf8_lossy(&bytes[start..]).into_owned()
}

fn is_utf8_continuation(byte: u8) -> bool {
    byte & 0b1100_0000 == 0b1000_0000
}
