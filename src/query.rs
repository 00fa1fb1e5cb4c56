//! Translating a viewer's building filter into a store query.
//!
//! A query selects every announcement addressed to the viewer's building or
//! to `ALL`, newest first. An empty filter produces no query at all: the
//! viewer sees nothing rather than everything.

use crate::types::{Announcement, Building};

/// Trim surrounding whitespace and uppercase. Idempotent.
pub fn normalize_building(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Sort order of query results.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Order {
    /// Newest `created_at` first.
    #[default]
    CreatedAtDesc,
}

/// A live query over the announcement collection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnnouncementQuery {
    /// `building IN buildings`. Always contains `ALL`.
    buildings: Vec<Building>,
    order: Order,
}

impl AnnouncementQuery {
    /// Query for a viewer in `building`.
    pub fn for_building(building: Building) -> Self {
        let mut buildings = vec![building];
        if !buildings[0].is_all() {
            buildings.push(Building::all());
        }
        Self {
            buildings,
            order: Order::CreatedAtDesc,
        }
    }

    /// The viewer's own building (first entry).
    pub fn building(&self) -> &Building {
        &self.buildings[0]
    }

    pub fn buildings(&self) -> &[Building] {
        &self.buildings
    }

    pub fn order(&self) -> Order {
        self.order
    }

    /// Check if an announcement belongs in this query's result set.
    pub fn matches(&self, announcement: &Announcement) -> bool {
        self.buildings.contains(&announcement.building)
    }

    /// Select and order matching announcements from records held in
    /// insertion (ascending `created_at`) order.
    pub fn select<'a, I>(&self, records: I) -> Vec<Announcement>
    where
        I: IntoIterator<Item = &'a Announcement>,
        I::IntoIter: DoubleEndedIterator,
    {
        match self.order {
            Order::CreatedAtDesc => records
                .into_iter()
                .rev()
                .filter(|a| self.matches(a))
                .cloned()
                .collect(),
        }
    }
}

/// Build the query for a raw filter string, or `None` when the filter is blank.
pub fn build_query(raw_building: &str) -> Option<AnnouncementQuery> {
    Building::parse(raw_building).map(AnnouncementQuery::for_building)
}
