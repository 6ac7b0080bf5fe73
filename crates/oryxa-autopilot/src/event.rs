//! Calendar events as seen by the autopilot.
//!
//! Only the schedule fields the autopilot may rewrite are modelled here.
//! `version` is an optimistic-concurrency counter bumped on every write and
//! `pending_push` tells the external calendar-sync collaborator that the
//! row has local changes it still has to push.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Free/busy visibility of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transparency {
    #[default]
    Opaque,
    Transparent,
}

impl Transparency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transparency::Opaque => "opaque",
            Transparency::Transparent => "transparent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "opaque" => Some(Transparency::Opaque),
            "transparent" => Some(Transparency::Transparent),
            _ => None,
        }
    }
}

/// Attendance status of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    #[default]
    Confirmed,
    Tentative,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Confirmed => "confirmed",
            EventStatus::Tentative => "tentative",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "confirmed" => Some(EventStatus::Confirmed),
            "tentative" => Some(EventStatus::Tentative),
            _ => None,
        }
    }
}

/// A scheduled event owned by a single user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub owner_id: String,
    #[serde(default)]
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub duration_min: i64,
    #[serde(default)]
    pub transparency: Transparency,
    #[serde(default)]
    pub status: EventStatus,
    pub version: i64,
    #[serde(default)]
    pub pending_push: bool,
}

impl Event {
    /// Create a confirmed, opaque event with a fresh id.
    ///
    /// # Errors
    /// Returns `InvalidTimeRange` when `ends_at` is not after `starts_at`.
    pub fn new(
        owner_id: impl Into<String>,
        title: impl Into<String>,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        if ends_at <= starts_at {
            return Err(ValidationError::InvalidTimeRange {
                start: starts_at,
                end: ends_at,
            });
        }
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            title: title.into(),
            starts_at,
            ends_at,
            duration_min: (ends_at - starts_at).num_minutes(),
            transparency: Transparency::Opaque,
            status: EventStatus::Confirmed,
            version: 1,
            pending_push: false,
        })
    }

    /// Whether `[starts_at, ends_at)` intersects `[from, to)`.
    pub fn intersects(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        self.starts_at < to && self.ends_at > from
    }
}
