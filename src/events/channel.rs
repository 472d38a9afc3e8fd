//! Listener that forwards events over a crossbeam channel.
//!
//! Subscribing an `EventSender` moves event handling off the worker
//! threads: the finder only enqueues, the UI thread drains the receiver.

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::{Event, EventListener};

/// Producing half; subscribe it to a finder
#[derive(Clone)]
pub struct EventSender {
    tx: Sender<Event>,
}

impl EventSender {
    /// Enqueue an event. Dropped silently once the receiver is gone.
    pub fn send(&self, event: Event) {
        let _ = self.tx.send(event);
    }
}

impl EventListener for EventSender {
    fn notify(&self, event: &Event) {
        self.send(event.clone());
    }
}

/// Consuming half
pub struct EventReceiver {
    rx: Receiver<Event>,
}

impl EventReceiver {
    /// Wait for the next event. `None` once every sender is dropped.
    pub fn recv(&self) -> Option<Event> {
        self.rx.recv().ok()
    }

    pub fn try_recv(&self) -> Option<Event> {
        self.rx.try_recv().ok()
    }

    /// Blocking iterator that ends when every sender is dropped
    pub fn iter(&self) -> impl Iterator<Item = Event> + '_ {
        self.rx.iter()
    }
}

pub struct EventChannel;

impl EventChannel {
    /// Unbounded sender/receiver pair
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (EventSender, EventReceiver) {
        let (tx, rx) = unbounded();
        (EventSender { tx }, EventReceiver { rx })
    }
}
