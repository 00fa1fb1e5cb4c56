//! # Bulletin
//!
//! Building-scoped announcements with live, filtered delivery.
//!
//! ## Core Concepts
//!
//! - **Store**: Append-only announcements with server-assigned ids and
//!   strictly increasing creation times, plus push-based live queries
//! - **Query**: A viewer's building plus `ALL`, newest first; a blank
//!   building selects nothing
//! - **Session**: One live subscription per viewer, superseded atomically
//!   when the building filter changes
//! - **Composer**: Validates a staff draft and posts it exactly once
//!
//! ## Example
//!
//! ```ignore
//! use bulletin::{Composer, Store, ViewerSession};
//! use std::sync::Arc;
//!
//! let store = Arc::new(Store::in_memory());
//!
//! let viewer = ViewerSession::new(store.clone());
//! viewer.set_filter("d102")?;
//!
//! let staff = Composer::new(store.clone());
//! staff.update_draft(|d| {
//!     d.title = "Fire Drill".into();
//!     d.body = "3pm today".into();
//!     d.building = "d102".into();
//! });
//! staff.submit()?;
//!
//! viewer.poll();
//! assert_eq!(viewer.announcements()[0].title, "Fire Drill");
//! ```

pub mod composer;
pub mod error;
pub mod query;
pub mod records;
pub mod session;
pub mod store;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use composer::{ComposeStatus, Composer, Draft, DraftField};
pub use error::{ComposeError, Result, SessionError, StoreError, ValidationError};
pub use query::{build_query, normalize_building, AnnouncementQuery, Order};
pub use records::AnnouncementLog;
pub use session::{SessionState, SessionView, ViewerSession};
pub use store::{AnnouncementStore, Store, StoreConfig};
pub use subscriptions::{
    DropReason, StoreEvent, SubscriptionConfig, SubscriptionHandle, SubscriptionId,
    SubscriptionRegistry,
};
pub use types::*;
