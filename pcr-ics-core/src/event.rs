//! Event records and the metadata carried between regenerations.
//!
//! An [`EventRecord`] is everything a player sees in their calendar app. The
//! [`EventMetadata`] exists only so calendar clients know when to refresh a
//! cached event (SEQUENCE and LAST-MODIFIED).

use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::{CoreError, CoreResult};

/// Largest SEQUENCE an ICS INTEGER can carry
pub const MAX_SEQUENCE: u32 = i32::MAX as u32;

/// Kind of in-game event, written to CATEGORIES
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Category {
    ClanBattle,
    FreeGacha,
    Campaign,
    Tower,
    StoryEvent,
    CharaFortune,
    /// Category read from a reference calendar that this version doesn't know
    Other(String),
}

impl Category {
    pub fn as_str(&self) -> &str {
        match self {
            Category::ClanBattle => "clan-battle",
            Category::FreeGacha => "free-gacha",
            Category::Campaign => "campaign",
            Category::Tower => "tower",
            Category::StoryEvent => "story-event",
            Category::CharaFortune => "chara-fortune",
            Category::Other(name) => name,
        }
    }

    pub fn from_ics_str(s: &str) -> Self {
        match s {
            "clan-battle" => Category::ClanBattle,
            "free-gacha" => Category::FreeGacha,
            "campaign" => Category::Campaign,
            "tower" => Category::Tower,
            "story-event" => Category::StoryEvent,
            "chara-fortune" => Category::CharaFortune,
            other => Category::Other(other.to_string()),
        }
    }

    /// Events published without a CATEGORIES line
    pub fn is_unspecified(&self) -> bool {
        matches!(self, Category::Other(name) if name.is_empty())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single calendar event as produced by the data source.
///
/// [`EventRecord::differs_from`] decides whether an event's sequence number
/// gets bumped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    /// Stable identifier (UID), identical across regenerations
    pub uid: String,
    pub title: String,
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub category: Category,
}

impl EventRecord {
    /// Whether this record shows players something different from `prior`.
    ///
    /// Calendars published before categories were written carry none, so an
    /// unspecified prior category is not compared.
    pub fn differs_from(&self, prior: &EventRecord) -> bool {
        let category_changed = !prior.category.is_unspecified() && self.category != prior.category;

        category_changed
            || self.uid != prior.uid
            || self.title != prior.title
            || self.description != prior.description
            || self.start != prior.start
            || self.end != prior.end
    }
}

impl fmt::Display for EventRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title)
    }
}

/// Revision bookkeeping for one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventMetadata {
    pub created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub sequence: u32,
}

impl EventMetadata {
    /// Metadata for an event seen for the first time
    pub fn fresh(now: DateTime<Utc>) -> Self {
        EventMetadata {
            created: now,
            last_modified: now,
            sequence: 0,
        }
    }

    /// Metadata after a user-visible change: same creation time, next revision
    pub fn bumped(&self, now: DateTime<Utc>) -> CoreResult<Self> {
        let sequence = self
            .sequence
            .checked_add(1)
            .filter(|&next| next <= MAX_SEQUENCE)
            .ok_or(CoreError::SequenceOverflow {
                sequence: self.sequence,
            })?;

        Ok(EventMetadata {
            created: self.created,
            last_modified: now,
            sequence,
        })
    }
}

/// An event together with its metadata, as stored in a published calendar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEntry {
    pub record: EventRecord,
    pub metadata: EventMetadata,
}
