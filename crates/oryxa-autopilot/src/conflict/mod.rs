//! Conflicts between events and prayer windows.
//!
//! A conflict is created once per (event, prayer, date) while it is active
//! and then only moves forward through its status machine:
//!
//! ```text
//! open ──► suggested ──► resolved
//!   │          │    └──► undone
//!   │          ▼
//!   └────► auto_resolved ──► undone
//! ```
//!
//! Conflicts are never deleted; closed rows are the audit and learning
//! substrate.

mod detector;

pub use detector::{overlap_minutes, ConflictDetector, DetectionSummary};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::decision::{Action, Patch};
use crate::error::AutopilotError;
use crate::prayer::{PrayerName, PrayerWindow};

/// Lifecycle state of a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStatus {
    Open,
    Suggested,
    AutoResolved,
    Resolved,
    Undone,
}

impl ConflictStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictStatus::Open => "open",
            ConflictStatus::Suggested => "suggested",
            ConflictStatus::AutoResolved => "auto_resolved",
            ConflictStatus::Resolved => "resolved",
            ConflictStatus::Undone => "undone",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(ConflictStatus::Open),
            "suggested" => Some(ConflictStatus::Suggested),
            "auto_resolved" => Some(ConflictStatus::AutoResolved),
            "resolved" => Some(ConflictStatus::Resolved),
            "undone" => Some(ConflictStatus::Undone),
            _ => None,
        }
    }

    /// Whether the autopilot still has work to do on this conflict.
    pub fn is_active(&self) -> bool {
        matches!(self, ConflictStatus::Open | ConflictStatus::Suggested)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ConflictStatus::Resolved | ConflictStatus::Undone)
    }

    pub fn can_transition_to(&self, next: ConflictStatus) -> bool {
        use ConflictStatus::*;
        matches!(
            (self, next),
            (Open, Suggested)
                | (Open, AutoResolved)
                | (Suggested, AutoResolved)
                | (Suggested, Resolved)
                | (Suggested, Undone)
                | (AutoResolved, Undone)
        )
    }

    /// Validate `self -> next`.
    ///
    /// # Errors
    /// `InvalidTransition` if the state machine forbids the move.
    pub fn check_transition(&self, next: ConflictStatus) -> Result<(), AutopilotError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(AutopilotError::InvalidTransition {
                from: *self,
                to: next,
            })
        }
    }
}

impl fmt::Display for ConflictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An overlap between one event and one prayer window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub id: String,
    pub owner_id: String,
    pub event_id: String,
    pub date: NaiveDate,
    pub prayer: PrayerName,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub overlap_min: i64,
    pub status: ConflictStatus,
    pub suggested_action: Option<Action>,
    /// Final blended confidence, 0..=100.
    pub confidence: Option<f64>,
    pub patch: Option<Patch>,
    pub undo_patch: Option<Patch>,
    /// Free-form outcome label (`accepted`, `dismissed`, the applied action...).
    pub resolution: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl Conflict {
    /// A fresh `open` conflict for `event_id` against `window`.
    pub fn open(
        owner_id: impl Into<String>,
        event_id: impl Into<String>,
        window: &PrayerWindow,
        overlap_min: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            event_id: event_id.into(),
            date: window.date,
            prayer: window.prayer,
            window_start: window.start,
            window_end: window.end,
            overlap_min,
            status: ConflictStatus::Open,
            suggested_action: None,
            confidence: None,
            patch: None,
            undo_patch: None,
            resolution: None,
            created_at: now,
            updated_at: now,
            decided_at: None,
        }
    }
}
