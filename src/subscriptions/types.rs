//! Subscription types for live announcement feeds.

use crate::types::Announcement;
use crossbeam_channel::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
use std::fmt;
use std::time::Duration;

/// Configuration for subscriptions.
#[derive(Clone, Debug)]
pub struct SubscriptionConfig {
    /// Max pending events per subscriber; beyond this the oldest pending
    /// snapshot is discarded.
    /// Default: 8
    pub buffer_size: usize,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self { buffer_size: 8 }
    }
}

/// Unique identifier for a subscription.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

impl fmt::Debug for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriptionId({})", self.0)
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Events pushed to a subscriber.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreEvent {
    /// Full, ordered result set of the subscribed query.
    Snapshot {
        subscription: SubscriptionId,
        announcements: Vec<Announcement>,
    },

    /// Delivery failed; the subscription may still recover.
    Error {
        subscription: SubscriptionId,
        cause: String,
    },

    /// Subscription was dropped; nothing more will be delivered.
    Dropped {
        subscription: SubscriptionId,
        reason: DropReason,
    },
}

impl StoreEvent {
    /// The subscription this event was produced for.
    pub fn subscription(&self) -> SubscriptionId {
        match self {
            StoreEvent::Snapshot { subscription, .. }
            | StoreEvent::Error { subscription, .. }
            | StoreEvent::Dropped { subscription, .. } => *subscription,
        }
    }
}

/// Why a subscription was dropped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// Explicitly unsubscribed.
    Unsubscribed,
    /// The store shut down.
    StoreClosed,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::Unsubscribed => f.write_str("unsubscribed"),
            DropReason::StoreClosed => f.write_str("store closed"),
        }
    }
}

/// Handle to a live subscription.
#[derive(Clone, Debug)]
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
    /// Channel to receive events.
    pub receiver: Receiver<StoreEvent>,
}

impl SubscriptionHandle {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<StoreEvent, RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<StoreEvent, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<StoreEvent, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}
