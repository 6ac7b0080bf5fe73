//! Applying patches to stored events.
//!
//! Writes are optimistic: the row is only updated if its `version` still
//! matches what was read, so a concurrent edit surfaces as
//! [`AutopilotError::StaleEvent`] instead of being overwritten.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::decision::Patch;
use crate::error::{AutopilotError, Result};
use crate::event::Event;
use crate::storage::AutopilotDb;

/// Event state before and after a patch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOutcome {
    pub before: Event,
    pub after: Event,
}

/// Apply `patch` to a copy of `event`.
///
/// The result is marked for push to the external calendar and carries the
/// next version number.
pub fn apply_patch(event: &Event, patch: &Patch) -> Event {
    let mut next = event.clone();
    match *patch {
        Patch::ShiftMinutes(minutes) => {
            let delta = Duration::minutes(minutes);
            next.starts_at = event.starts_at + delta;
            next.ends_at = event.ends_at + delta;
        }
        Patch::DurationMinutes(minutes) => {
            next.ends_at = event.starts_at + Duration::minutes(minutes);
            next.duration_min = minutes;
        }
        Patch::Transparency(transparency) => next.transparency = transparency,
        Patch::Status(status) => next.status = status,
    }
    next.pending_push = true;
    next.version = event.version + 1;
    next
}

/// Store-backed patch application.
pub struct PatchApplier<'a> {
    db: &'a AutopilotDb,
}

impl<'a> PatchApplier<'a> {
    pub fn new(db: &'a AutopilotDb) -> Self {
        Self { db }
    }

    /// Apply `patch` to the stored event, provided it is still at
    /// `expected_version`.
    ///
    /// # Errors
    /// `EventNotFound` if the event is gone, `StaleEvent` if its version
    /// moved or the conditional write touched no rows.
    pub fn apply(&self, event_id: &str, expected_version: i64, patch: &Patch) -> Result<PatchOutcome> {
        let before = self
            .db
            .get_event(event_id)?
            .ok_or_else(|| AutopilotError::EventNotFound(event_id.to_string()))?;

        let stale = || AutopilotError::StaleEvent {
            event_id: event_id.to_string(),
            expected_version,
        };
        if before.version != expected_version {
            return Err(stale().into());
        }

        let after = apply_patch(&before, patch);
        if self.db.update_event_if_version(&after, expected_version)? == 0 {
            return Err(stale().into());
        }

        tracing::debug!(event_id, version = after.version, ?patch, "patched event");
        Ok(PatchOutcome { before, after })
    }

    /// Apply `patch` to whatever version is currently stored.
    ///
    /// # Errors
    /// Same as [`PatchApplier::apply`].
    pub fn apply_current(&self, event_id: &str, patch: &Patch) -> Result<PatchOutcome> {
        let current = self
            .db
            .get_event(event_id)?
            .ok_or_else(|| AutopilotError::EventNotFound(event_id.to_string()))?;
        self.apply(event_id, current.version, patch)
    }
}
