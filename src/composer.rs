//! Posting new announcements.
//!
//! A [`Composer`] owns the staff member's editable [`Draft`]. Submitting
//! validates the draft, performs exactly one append, and on success clears
//! the title and body. A failed append leaves the draft untouched so it
//! can be resubmitted as-is.

use crate::error::{ComposeError, ValidationError};
use crate::store::AnnouncementStore;
use crate::types::{Announcement, AnnouncementId, Building, NewAnnouncement, DATE_PLACEHOLDER};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Required draft fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DraftField {
    Title,
    Body,
}

impl DraftField {
    pub fn as_str(&self) -> &'static str {
        match self {
            DraftField::Title => "title",
            DraftField::Body => "body",
        }
    }
}

impl fmt::Display for DraftField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unvalidated form input for a new announcement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Draft {
    pub title: String,
    pub body: String,
    /// Target building; blank means `ALL`.
    pub building: String,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub urgent: bool,
}

impl Default for Draft {
    fn default() -> Self {
        Self {
            title: String::new(),
            body: String::new(),
            building: "ALL".to_string(),
            date: DATE_PLACEHOLDER.to_string(),
            start_time: "12:00 pm".to_string(),
            end_time: "3:00 pm".to_string(),
            urgent: false,
        }
    }
}

impl Draft {
    /// Trim and check the draft, producing a store input.
    pub fn validate(&self) -> Result<NewAnnouncement, ValidationError> {
        let title = self.title.trim();
        let body = self.body.trim();

        let mut missing = Vec::new();
        if title.is_empty() {
            missing.push(DraftField::Title);
        }
        if body.is_empty() {
            missing.push(DraftField::Body);
        }
        if !missing.is_empty() {
            return Err(ValidationError { missing });
        }

        Ok(
            NewAnnouncement::new(title, body, Building::target_or_all(&self.building))
                .with_schedule(
                    self.date.trim(),
                    self.start_time.trim(),
                    self.end_time.trim(),
                )
                .with_urgent(self.urgent),
        )
    }

    /// Clear the per-post fields, keeping target and schedule.
    fn reset(&mut self) {
        self.title.clear();
        self.body.clear();
    }
}

/// Outcome of the most recent submission, for display.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum ComposeStatus {
    #[default]
    Idle,
    Submitting,
    Posted(AnnouncementId),
    ValidationError(Vec<DraftField>),
    SubmissionError(String),
}

/// Draft editor and submitter for one staff session.
pub struct Composer<S: AnnouncementStore + ?Sized> {
    store: Arc<S>,
    draft: Mutex<Draft>,
    status: Mutex<ComposeStatus>,
}

impl<S: AnnouncementStore + ?Sized> Composer<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_draft(store, Draft::default())
    }

    pub fn with_draft(store: Arc<S>, draft: Draft) -> Self {
        Self {
            store,
            draft: Mutex::new(draft),
            status: Mutex::new(ComposeStatus::Idle),
        }
    }

    /// Copy of the current draft.
    pub fn draft(&self) -> Draft {
        self.draft.lock().clone()
    }

    /// Edit the draft in place.
    pub fn update_draft<F>(&self, edit: F)
    where
        F: FnOnce(&mut Draft),
    {
        edit(&mut self.draft.lock());
    }

    pub fn status(&self) -> ComposeStatus {
        self.status.lock().clone()
    }

    /// Validate and post the current draft.
    ///
    /// Performs at most one append and never retries. On success the title
    /// and body are cleared; on any error the draft is left as it was.
    pub fn submit(&self) -> Result<Announcement, ComposeError> {
        let validated = self.draft.lock().validate();
        let input = match validated {
            Ok(input) => input,
            Err(err) => {
                debug!(missing = %err, "draft rejected");
                *self.status.lock() = ComposeStatus::ValidationError(err.missing.clone());
                return Err(err.into());
            }
        };

        *self.status.lock() = ComposeStatus::Submitting;

        // The draft lock is not held across the store call.
        match self.store.append(input) {
            Ok(announcement) => {
                self.draft.lock().reset();
                *self.status.lock() = ComposeStatus::Posted(announcement.id);
                debug!(id = %announcement.id, building = %announcement.building, "announcement posted");
                Ok(announcement)
            }
            Err(err) => {
                warn!(error = %err, "posting announcement failed");
                *self.status.lock() = ComposeStatus::SubmissionError(err.to_string());
                Err(ComposeError::Submission(err))
            }
        }
    }
}
