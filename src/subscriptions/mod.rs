//! Live query subscriptions.
//!
//! The store keeps one registration per live query. Every registration
//! receives its initial result set on subscribe, then a fresh full snapshot
//! after each append that touches its result set. Buffers are bounded and
//! slow subscribers are dropped.
//!
//! # Example
//!
//! ```ignore
//! let handle = store.subscribe(&build_query("d102").unwrap())?;
//!
//! loop {
//!     match handle.recv() {
//!         Ok(StoreEvent::Snapshot { announcements, .. }) => render(&announcements),
//!         Ok(StoreEvent::Error { cause, .. }) => eprintln!("feed error: {cause}"),
//!         Ok(StoreEvent::Dropped { .. }) | Err(_) => break,
//!     }
//! }
//! ```

mod registry;
mod types;

pub use registry::SubscriptionRegistry;
pub use types::{DropReason, StoreEvent, SubscriptionConfig, SubscriptionHandle, SubscriptionId};
