//! # Events Module
//!
//! How results leave a running finder.
//!
//! ## Design
//! - `EventNotifier` calls registered listeners synchronously for progress,
//!   duplicate-found and completion events.
//! - `DuplicateStream` queues every pair for a consumer that polls at its
//!   own pace and ends with one sentinel.
//! - `EventChannel` adapts the listener interface to a crossbeam channel
//!   for UIs that want events on their own thread.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//! finder.subscribe(Arc::new(sender));
//!
//! std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         if let Event::Progress { percent } = event {
//!             println!("{:.0}%", percent);
//!         }
//!     }
//! });
//! ```

mod channel;
mod notifier;
mod stream;
mod types;

pub use channel::{EventChannel, EventReceiver, EventSender};
pub use notifier::{EventListener, EventNotifier};
pub use stream::{DuplicateStream, Next};
pub use types::*;
