//! Durable announcement log.
//!
//! Announcements are stored in an append-only file and replayed in full
//! when the store is reopened.

mod log;

pub use log::AnnouncementLog;
