//! Queue of duplicate pairs for a polling consumer.

use super::DuplicatePair;
use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

enum StreamItem {
    Pair(DuplicatePair),
    Finished,
}

/// Result of a non-blocking poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Next {
    /// The next pair, in publication order
    Pair(DuplicatePair),
    /// Nothing queued right now but the run is still going; poll again
    Pending,
    /// All pairs have been drained and the run is over
    Finished,
}

/// Unbounded FIFO of duplicate pairs ending in a single sentinel.
///
/// Cloning yields another handle to the same queue. Producers call
/// `publish` from any thread; `close` enqueues the sentinel exactly once,
/// and anything published after it is dropped. No pair is ever queued
/// behind the sentinel.
#[derive(Clone)]
pub struct DuplicateStream {
    sender: Sender<StreamItem>,
    receiver: Receiver<StreamItem>,
    shared: Arc<StreamState>,
}

#[derive(Default)]
struct StreamState {
    /// Held across the check and the send so publish and close serialize
    closed: Mutex<bool>,
    /// The sentinel has been received
    drained: AtomicBool,
    queued: AtomicUsize,
}

impl DuplicateStream {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender,
            receiver,
            shared: Arc::new(StreamState::default()),
        }
    }

    fn lock_closed(&self) -> MutexGuard<'_, bool> {
        self.shared.closed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a pair. Returns false if the stream was already closed.
    pub fn publish(&self, pair: DuplicatePair) -> bool {
        let closed = self.lock_closed();
        if *closed {
            return false;
        }
        self.shared.queued.fetch_add(1, Ordering::AcqRel);
        // Both ends live in self, so the channel cannot be disconnected
        let _ = self.sender.send(StreamItem::Pair(pair));
        true
    }

    /// Enqueue the terminal sentinel. Later calls are no-ops.
    pub fn close(&self) {
        let mut closed = self.lock_closed();
        if !*closed {
            *closed = true;
            let _ = self.sender.send(StreamItem::Finished);
        }
    }

    pub fn is_closed(&self) -> bool {
        *self.lock_closed()
    }

    /// Pairs published but not yet polled
    pub fn pending(&self) -> usize {
        self.shared.queued.load(Ordering::Acquire)
    }

    /// Take the next item without blocking.
    pub fn poll(&self) -> Next {
        if self.shared.drained.load(Ordering::Acquire) {
            return Next::Finished;
        }
        match self.receiver.try_recv() {
            Ok(StreamItem::Pair(pair)) => {
                self.shared.queued.fetch_sub(1, Ordering::AcqRel);
                Next::Pair(pair)
            }
            Ok(StreamItem::Finished) => {
                self.shared.drained.store(true, Ordering::Release);
                Next::Finished
            }
            Err(TryRecvError::Empty) => Next::Pending,
            Err(TryRecvError::Disconnected) => Next::Finished,
        }
    }

    /// Everything currently queued, stopping at the sentinel
    pub fn drain_available(&self) -> Vec<DuplicatePair> {
        let mut pairs = Vec::new();
        while let Next::Pair(pair) = self.poll() {
            pairs.push(pair);
        }
        pairs
    }
}

impl Default for DuplicateStream {
    fn default() -> Self {
        Self::new()
    }
}
