//! Viewer sessions: one live, building-filtered feed per viewer.
//!
//! # State machine
//!
//! ```text
//!            set_filter(non-empty)
//!   Idle ───────────────────────────► Subscribing ──snapshot──► Active
//!    ▲                                    │  ▲                  │  ▲
//!    │ set_filter(empty)                  │  └──── set_filter ──┘  │ snapshot
//!    │                                    ▼                        │
//!    └──────────────────────────────── Error ◄──────error──────────┘
//!
//!   any state ──detach()──► Detached (terminal)
//! ```
//!
//! # Invariants
//! - At most one store subscription is held at any time. The previous one is
//!   released before the next is requested.
//! - Every event carries the id of the subscription that produced it; events
//!   from anything but the current subscription are discarded, so the last
//!   filter always wins.
//! - Errors never clear the visible list; only a newer snapshot or an empty
//!   filter replaces it.

use crate::error::SessionError;
use crate::query::{build_query, normalize_building};
use crate::store::AnnouncementStore;
use crate::subscriptions::{StoreEvent, SubscriptionHandle};
use crate::types::Announcement;
use crossbeam_channel::{RecvTimeoutError, TryRecvError};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Lifecycle of a viewer's subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No filter, nothing subscribed, nothing shown.
    #[default]
    Idle,
    /// Subscribed, waiting for the first snapshot.
    Subscribing,
    /// Showing the latest snapshot.
    Active,
    /// The subscription failed; the last good list is still shown.
    Error,
    /// Session ended; no further subscriptions.
    Detached,
}

/// Read-only view of a session for rendering.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionView {
    pub state: SessionState,
    /// Normalized building filter.
    pub filter: String,
    /// Building the listed announcements were selected for.
    ///
    /// Lags `filter` while a switch is `Subscribing`: the previous list stays
    /// up until the new subscription's first snapshot replaces it. Empty before
    /// the first snapshot and after a blank filter.
    pub showing: String,
    /// Newest first.
    pub announcements: Vec<Announcement>,
    pub last_error: Option<String>,
}

struct Inner {
    state: SessionState,
    filter: String,
    showing: String,
    current: Option<SubscriptionHandle>,
    announcements: Vec<Announcement>,
    last_error: Option<String>,
}

/// A viewer's filtered, live announcement list.
pub struct ViewerSession<S: AnnouncementStore + ?Sized> {
    store: Arc<S>,
    inner: Mutex<Inner>,
}

impl<S: AnnouncementStore + ?Sized> ViewerSession<S> {
    /// Create an idle session.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            inner: Mutex::new(Inner {
                state: SessionState::Idle,
                filter: String::new(),
                showing: String::new(),
                current: None,
                announcements: Vec::new(),
                last_error: None,
            }),
        }
    }

    /// Point the session at a building.
    ///
    /// The previous subscription is released first. A blank filter clears
    /// the list and leaves the session idle. Re-setting the filter the
    /// session is already subscribed to is a no-op; re-setting it after an
    /// error retries.
    pub fn set_filter(&self, raw: &str) -> Result<SessionState, SessionError> {
        let filter = normalize_building(raw);
        let mut inner = self.inner.lock();

        match inner.state {
            SessionState::Detached => return Err(SessionError::Detached),
            SessionState::Subscribing | SessionState::Active if inner.filter == filter => {
                return Ok(inner.state);
            }
            _ => {}
        }

        self.release(&mut inner);
        inner.filter = filter;

        let Some(query) = build_query(&inner.filter) else {
            debug!("blank building filter; feed cleared");
            inner.announcements.clear();
            inner.showing.clear();
            inner.last_error = None;
            inner.state = SessionState::Idle;
            return Ok(inner.state);
        };

        inner.state = SessionState::Subscribing;
        match self.store.subscribe(&query) {
            Ok(handle) => {
                debug!(subscription = %handle.id, building = %query.building(), "subscribed");
                inner.current = Some(handle);
            }
            Err(err) => {
                warn!(building = %query.building(), error = %err, "subscribe failed");
                inner.state = SessionState::Error;
                inner.last_error = Some(err.to_string());
            }
        }

        Ok(inner.state)
    }

    /// Apply every push already waiting, without blocking.
    ///
    /// Returns the number of events applied (stale ones excluded).
    pub fn poll(&self) -> usize {
        let mut inner = self.inner.lock();
        let mut applied = 0;

        loop {
            let received = match &inner.current {
                Some(handle) => handle.try_recv(),
                None => break,
            };
            match received {
                Ok(event) => {
                    if Self::apply(&mut inner, event) {
                        applied += 1;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    Self::fail(&mut inner, "subscription channel closed".to_string());
                    inner.current = None;
                    applied += 1;
                    break;
                }
            }
        }

        applied
    }

    /// Block up to `timeout` for one push and apply it.
    ///
    /// Returns true if the session changed. The session stays usable from
    /// other threads while waiting; if the filter changes in the meantime,
    /// whatever arrives for the old subscription is discarded.
    pub fn wait_for_update(&self, timeout: Duration) -> bool {
        let handle = match &self.inner.lock().current {
            Some(handle) => handle.clone(),
            None => return false,
        };

        let received = handle.recv_timeout(timeout);

        let mut inner = self.inner.lock();
        match received {
            Ok(event) => Self::apply(&mut inner, event),
            Err(RecvTimeoutError::Timeout) => false,
            Err(RecvTimeoutError::Disconnected) => {
                let is_current = inner.current.as_ref().map(|h| h.id) == Some(handle.id);
                if is_current {
                    Self::fail(&mut inner, "subscription channel closed".to_string());
                    inner.current = None;
                }
                is_current
            }
        }
    }

    /// End the session and release its subscription. Idempotent.
    pub fn detach(&self) {
        let mut inner = self.inner.lock();
        self.release(&mut inner);
        inner.state = SessionState::Detached;
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    /// Current normalized filter.
    pub fn filter(&self) -> String {
        self.inner.lock().filter.clone()
    }

    /// Visible announcements, newest first.
    pub fn announcements(&self) -> Vec<Announcement> {
        self.inner.lock().announcements.clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.lock().last_error.clone()
    }

    /// Everything the presentation layer needs, read atomically.
    pub fn view(&self) -> SessionView {
        let inner = self.inner.lock();
        SessionView {
            state: inner.state,
            filter: inner.filter.clone(),
            showing: inner.showing.clone(),
            announcements: inner.announcements.clone(),
            last_error: inner.last_error.clone(),
        }
    }

    fn release(&self, inner: &mut Inner) {
        if let Some(handle) = inner.current.take() {
            debug!(subscription = %handle.id, "unsubscribing");
            self.store.unsubscribe(handle.id);
        }
    }

    /// Apply one event. Returns false if it was stale.
    fn apply(inner: &mut Inner, event: StoreEvent) -> bool {
        let current = inner.current.as_ref().map(|h| h.id);
        if current != Some(event.subscription()) {
            debug!(subscription = %event.subscription(), "discarding stale event");
            return false;
        }

        match event {
            StoreEvent::Snapshot { announcements, .. } => {
                inner.announcements = announcements;
                inner.showing = inner.filter.clone();
                inner.last_error = None;
                inner.state = SessionState::Active;
            }
            StoreEvent::Error { cause, .. } => Self::fail(inner, cause),
            StoreEvent::Dropped { reason, .. } => {
                Self::fail(inner, format!("subscription dropped: {reason}"));
                inner.current = None;
            }
        }
        true
    }

    fn fail(inner: &mut Inner, cause: String) {
        warn!(filter = %inner.filter, cause = %cause, "announcement feed error");
        inner.state = SessionState::Error;
        inner.last_error = Some(cause);
    }
}

impl<S: AnnouncementStore + ?Sized> Drop for ViewerSession<S> {
    fn drop(&mut self) {
        self.detach();
    }
}
