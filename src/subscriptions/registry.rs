//! Registry of live queries and snapshot broadcasting.

use crate::query::AnnouncementQuery;
use crate::types::Announcement;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace};

use super::types::{DropReason, StoreEvent, SubscriptionConfig, SubscriptionHandle, SubscriptionId};

/// Internal subscription state.
struct Subscription {
    query: AnnouncementQuery,
    sender: Sender<StoreEvent>,
    /// Registry-side end of the channel, used to discard superseded snapshots.
    backlog: Receiver<StoreEvent>,
}

impl Subscription {
    /// Queue an event, discarding the oldest pending one while the buffer is full.
    ///
    /// Every pending event is a full snapshot, so the newest one is all a
    /// subscriber that fell behind needs.
    fn deliver(&self, id: SubscriptionId, mut event: StoreEvent) {
        loop {
            match self.sender.try_send(event) {
                Ok(()) => return,
                Err(TrySendError::Full(rejected)) => {
                    if self.backlog.try_recv().is_ok() {
                        trace!(subscription = %id, "discarded superseded snapshot");
                    }
                    event = rejected;
                }
                // Unreachable while `backlog` is held.
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }

    fn snapshot(&self, id: SubscriptionId, records: &[Announcement]) -> StoreEvent {
        StoreEvent::Snapshot {
            subscription: id,
            announcements: self.query.select(records),
        }
    }
}

/// Tracks live queries and pushes result snapshots to them.
pub struct SubscriptionRegistry {
    /// Active subscriptions by ID.
    subscriptions: RwLock<HashMap<SubscriptionId, Subscription>>,
    /// Counter for generating subscription IDs.
    next_id: AtomicU64,
    config: SubscriptionConfig,
}

impl SubscriptionRegistry {
    pub fn new(config: SubscriptionConfig) -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            config,
        }
    }

    /// Register a query and push its initial snapshot computed from `records`.
    ///
    /// `records` must be in insertion order, and the caller must hold the
    /// store's record lock so that no append interleaves.
    pub fn register(&self, query: AnnouncementQuery, records: &[Announcement]) -> SubscriptionHandle {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(self.config.buffer_size.max(1));

        let subscription = Subscription {
            query,
            sender,
            backlog: receiver.clone(),
        };
        subscription.deliver(id, subscription.snapshot(id, records));

        debug!(subscription = %id, building = %subscription.query.building(), "subscription registered");
        self.subscriptions.write().insert(id, subscription);

        SubscriptionHandle { id, receiver }
    }

    /// Remove a subscription. Returns false if it was unknown.
    pub fn remove(&self, id: SubscriptionId) -> bool {
        let removed = self.subscriptions.write().remove(&id);
        match removed {
            Some(sub) => {
                sub.deliver(
                    id,
                    StoreEvent::Dropped {
                        subscription: id,
                        reason: DropReason::Unsubscribed,
                    },
                );
                debug!(subscription = %id, "subscription removed");
                true
            }
            None => false,
        }
    }

    /// Get subscription count.
    pub fn count(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Push a fresh snapshot to every subscription whose query matches
    /// `appended`. `records` already includes it.
    ///
    /// A subscriber that has fallen behind loses its oldest pending
    /// snapshots, never the newest one.
    pub fn broadcast_append(&self, appended: &Announcement, records: &[Announcement]) {
        let subs = self.subscriptions.read();
        for (id, sub) in subs.iter() {
            if sub.query.matches(appended) {
                sub.deliver(*id, sub.snapshot(*id, records));
            }
        }
    }

    /// Drop every subscription, notifying each one.
    pub fn close_all(&self) {
        let mut subs = self.subscriptions.write();
        for (id, sub) in subs.drain() {
            sub.deliver(
                id,
                StoreEvent::Dropped {
                    subscription: id,
                    reason: DropReason::StoreClosed,
                },
            );
        }
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new(SubscriptionConfig::default())
    }
}
