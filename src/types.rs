//! Core types for the announcement feed.

use crate::query::normalize_building;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Sentinel building that every viewer filter matches.
pub const ALL_BUILDINGS: &str = "ALL";

/// Placeholder shown when an announcement carries no date.
pub const DATE_PLACEHOLDER: &str = "MM/DD/YY";

/// Unique identifier for an announcement (assigned by the store).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnouncementId(pub u64);

impl fmt::Debug for AnnouncementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AnnouncementId({})", self.0)
    }
}

impl fmt::Display for AnnouncementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Microseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current wall-clock time. A clock set before the epoch reads as zero.
    pub fn now() -> Self {
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as i64)
            .unwrap_or(0);
        Timestamp(micros)
    }

    /// The earliest timestamp strictly after both `self` and the current clock.
    pub fn next_after(self) -> Self {
        let now = Self::now();
        if now > self {
            now
        } else {
            Timestamp(self.0 + 1)
        }
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// A normalized building identifier: trimmed, uppercase, never empty.
///
/// Deserializing normalizes the same way and rejects a blank value.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Building(String);

impl TryFrom<String> for Building {
    type Error = String;

    fn try_from(raw: String) -> std::result::Result<Self, Self::Error> {
        Building::parse(&raw).ok_or_else(|| format!("blank building: {raw:?}"))
    }
}

impl From<Building> for String {
    fn from(building: Building) -> Self {
        building.0
    }
}

impl Building {
    /// The `ALL` sentinel.
    pub fn all() -> Self {
        Building(ALL_BUILDINGS.to_string())
    }

    /// Normalize raw input. Returns `None` when nothing is left after trimming.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = normalize_building(raw);
        if normalized.is_empty() {
            None
        } else {
            Some(Building(normalized))
        }
    }

    /// Normalize a posting target, falling back to `ALL` when blank.
    pub fn target_or_all(raw: &str) -> Self {
        Self::parse(raw).unwrap_or_else(Self::all)
    }

    pub fn is_all(&self) -> bool {
        self.0 == ALL_BUILDINGS
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Building {
    fn default() -> Self {
        Self::all()
    }
}

impl fmt::Debug for Building {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Building({})", self.0)
    }
}

impl fmt::Display for Building {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stored announcement. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    /// Unique identifier (assigned by store).
    pub id: AnnouncementId,

    pub title: String,

    pub body: String,

    /// Target building, or `ALL`.
    pub building: Building,

    /// Free-form display strings.
    pub date: String,
    pub start_time: String,
    pub end_time: String,

    pub urgent: bool,

    /// When the store accepted the record (assigned by store, strictly increasing).
    pub created_at: Timestamp,
}

impl Announcement {
    /// Date for display, with the placeholder standing in for a blank date.
    pub fn display_date(&self) -> &str {
        if self.date.is_empty() {
            DATE_PLACEHOLDER
        } else {
            &self.date
        }
    }

    /// `"start - end"`, collapsing whichever half is blank.
    pub fn time_range(&self) -> String {
        match (self.start_time.is_empty(), self.end_time.is_empty()) {
            (_, true) => self.start_time.clone(),
            (true, false) => format!(" - {}", self.end_time),
            (false, false) => format!("{} - {}", self.start_time, self.end_time),
        }
    }
}

/// Input for creating a new announcement (before id/created_at assigned).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewAnnouncement {
    pub title: String,
    pub body: String,
    pub building: Building,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub urgent: bool,
}

impl NewAnnouncement {
    /// Create an input with required fields; the rest stay blank.
    pub fn new(title: impl Into<String>, body: impl Into<String>, building: Building) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            building,
            date: String::new(),
            start_time: String::new(),
            end_time: String::new(),
            urgent: false,
        }
    }

    /// Set the display date and time range.
    pub fn with_schedule(
        mut self,
        date: impl Into<String>,
        start_time: impl Into<String>,
        end_time: impl Into<String>,
    ) -> Self {
        self.date = date.into();
        self.start_time = start_time.into();
        self.end_time = end_time.into();
        self
    }

    pub fn with_urgent(mut self, urgent: bool) -> Self {
        self.urgent = urgent;
        self
    }

    /// Attach the store-assigned identity.
    pub(crate) fn into_announcement(self, id: AnnouncementId, created_at: Timestamp) -> Announcement {
        Announcement {
            id,
            title: self.title,
            body: self.body,
            building: self.building,
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
            urgent: self.urgent,
            created_at,
        }
    }
}
