//! Audit ledger and undo.
//!
//! Every apply or suggest writes one immutable [`AutopilotAction`] carrying a
//! fresh undo token. Undoing inserts a third kind of row that consumes the
//! token; the unique constraint on `consumes_token` makes a token single-use
//! without ever updating an existing row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::conflict::{Conflict, ConflictStatus};
use crate::decision::Action;
use crate::error::{AutopilotError, Result};
use crate::event::Event;
use crate::learning::{ContextBucket, LearningRecord, UserDecision};
use crate::patch::{PatchApplier, PatchOutcome};
use crate::storage::AutopilotDb;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Apply,
    Suggest,
    Undo,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Apply => "apply",
            ActionKind::Suggest => "suggest",
            ActionKind::Undo => "undo",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "apply" => Some(ActionKind::Apply),
            "suggest" => Some(ActionKind::Suggest),
            "undo" => Some(ActionKind::Undo),
            _ => None,
        }
    }
}

/// Immutable audit row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutopilotAction {
    pub id: i64,
    pub owner_id: String,
    pub conflict_id: String,
    pub kind: ActionKind,
    pub suggested_action: Option<Action>,
    pub confidence: Option<f64>,
    /// Event snapshot before the write (or at proposal time).
    pub patch_before: Option<Event>,
    pub patch_after: Option<Event>,
    /// Issued by apply/suggest rows.
    pub undo_token: Option<String>,
    /// Set on undo rows: the token this undo used up.
    pub consumes_token: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub fn new_undo_token() -> String {
    Uuid::new_v4().to_string()
}

/// Result of a successful undo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UndoOutcome {
    pub ok: bool,
    pub conflict_id: String,
    pub event_id: String,
    /// `None` when a proposal was withdrawn and no event was touched.
    pub restored: Option<PatchOutcome>,
}

pub struct Ledger<'a> {
    db: &'a AutopilotDb,
}

impl<'a> Ledger<'a> {
    pub fn new(db: &'a AutopilotDb) -> Self {
        Self { db }
    }

    /// Record an applied patch and return the issued token.
    pub fn record_apply(
        &self,
        conflict: &Conflict,
        action: Action,
        confidence: f64,
        outcome: &PatchOutcome,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let token = new_undo_token();
        self.db.insert_action(&AutopilotAction {
            id: 0,
            owner_id: conflict.owner_id.clone(),
            conflict_id: conflict.id.clone(),
            kind: ActionKind::Apply,
            suggested_action: Some(action),
            confidence: Some(confidence),
            patch_before: Some(outcome.before.clone()),
            patch_after: Some(outcome.after.clone()),
            undo_token: Some(token.clone()),
            consumes_token: None,
            created_at: now,
        })?;
        Ok(token)
    }

    /// Record a proposal and return the issued token.
    pub fn record_suggest(
        &self,
        conflict: &Conflict,
        action: Action,
        confidence: f64,
        event: &Event,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let token = new_undo_token();
        self.db.insert_action(&AutopilotAction {
            id: 0,
            owner_id: conflict.owner_id.clone(),
            conflict_id: conflict.id.clone(),
            kind: ActionKind::Suggest,
            suggested_action: Some(action),
            confidence: Some(confidence),
            patch_before: Some(event.clone()),
            patch_after: None,
            undo_token: Some(token.clone()),
            consumes_token: None,
            created_at: now,
        })?;
        Ok(token)
    }

    /// Revert the action that issued `token`.
    ///
    /// Apply tokens re-apply the conflict's `undo_patch`; suggest tokens
    /// withdraw the proposal without touching the event. Either way the
    /// conflict ends `undone`, a rejection is fed back to learning and the
    /// token is used up.
    ///
    /// # Errors
    /// `TokenNotFound` for an unknown token or one issued for another
    /// owner or conflict, `TokenAlreadyUsed` on a repeat call, and
    /// `InvalidTransition` when the conflict has moved on since the token
    /// was issued. Nothing is written on error.
    pub fn undo(
        &self,
        owner_id: &str,
        conflict_id: &str,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<UndoOutcome> {
        let issued = self
            .db
            .find_action_by_token(token)?
            .filter(|a| a.owner_id == owner_id && a.conflict_id == conflict_id)
            .ok_or(AutopilotError::TokenNotFound)?;

        if self.db.is_token_consumed(token)? {
            return Err(AutopilotError::TokenAlreadyUsed.into());
        }

        let conflict = self
            .db
            .get_conflict(conflict_id)?
            .ok_or_else(|| AutopilotError::ConflictNotFound(conflict_id.to_string()))?;

        let required = match issued.kind {
            ActionKind::Apply => ConflictStatus::AutoResolved,
            ActionKind::Suggest => ConflictStatus::Suggested,
            ActionKind::Undo => return Err(AutopilotError::TokenNotFound.into()),
        };
        if conflict.status != required {
            return Err(AutopilotError::InvalidTransition {
                from: conflict.status,
                to: ConflictStatus::Undone,
            }
            .into());
        }
        conflict.status.check_transition(ConflictStatus::Undone)?;

        let tx = self.db.conn().unchecked_transaction()?;

        let restored = match issued.kind {
            ActionKind::Apply => {
                let undo_patch =
                    conflict.undo_patch.ok_or_else(|| AutopilotError::MissingPatch {
                        conflict_id: conflict_id.to_string(),
                        kind: "undo",
                    })?;
                Some(PatchApplier::new(self.db).apply_current(&conflict.event_id, &undo_patch)?)
            }
            _ => None,
        };

        self.db.insert_action(&AutopilotAction {
            id: 0,
            owner_id: owner_id.to_string(),
            conflict_id: conflict_id.to_string(),
            kind: ActionKind::Undo,
            suggested_action: issued.suggested_action,
            confidence: issued.confidence,
            patch_before: restored.as_ref().map(|r| r.before.clone()),
            patch_after: restored.as_ref().map(|r| r.after.clone()),
            undo_token: None,
            consumes_token: Some(token.to_string()),
            created_at: now,
        })?;

        let mut undone = conflict.clone();
        undone.status = ConflictStatus::Undone;
        undone.resolution = Some("undone".into());
        undone.updated_at = now;
        undone.decided_at = Some(now);
        if self.db.save_conflict_state(&undone, conflict.status)? == 0 {
            return Err(AutopilotError::InvalidTransition {
                from: conflict.status,
                to: ConflictStatus::Undone,
            }
            .into());
        }

        if let (Some(action), Some(snapshot)) = (issued.suggested_action, issued.patch_before.as_ref()) {
            self.db.insert_learning_record(&LearningRecord {
                owner_id: owner_id.to_string(),
                conflict_id: Some(conflict_id.to_string()),
                suggested_action: action,
                bucket: ContextBucket::new(conflict.prayer, conflict.overlap_min, snapshot.starts_at),
                user_decision: UserDecision::Rejected,
                recorded_at: now,
            })?;
        }

        tx.commit()?;

        tracing::info!(
            owner_id,
            conflict_id,
            kind = issued.kind.as_str(),
            "undid autopilot action"
        );
        Ok(UndoOutcome {
            ok: true,
            conflict_id: conflict_id.to_string(),
            event_id: conflict.event_id,
            restored,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::Patch;
    use crate::event::EventStatus;
    use crate::prayer::{PrayerName, PrayerTimes, WindowBuilder};
    use chrono::{NaiveDate, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    /// Stored event with a stored conflict that was auto-resolved by marking
    /// the event tentative. Returns the conflict and the issued token.
    fn auto_resolved(db: &AutopilotDb) -> (Conflict, String) {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 19, 35, 0).unwrap();
        let event = Event::new("u1", "Gym", start, start + chrono::Duration::hours(1)).unwrap();
        db.upsert_event(&event).unwrap();

        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let times = PrayerTimes::new(date).with(PrayerName::Isha, "19:20");
        let window = WindowBuilder::default().window_for(&times, PrayerName::Isha).unwrap();
        let mut conflict = Conflict::open("u1", event.id.clone(), &window, 5, now());
        db.insert_conflict(&conflict).unwrap();

        let patch = Patch::Status(EventStatus::Tentative);
        let outcome = PatchApplier::new(db).apply(&event.id, 1, &patch).unwrap();
        conflict.status = ConflictStatus::AutoResolved;
        conflict.suggested_action = Some(Action::MakeTentative);
        conflict.confidence = Some(81.0);
        conflict.patch = Some(patch);
        conflict.undo_patch = Some(patch.inverse(&outcome.before));
        db.save_conflict_state(&conflict, ConflictStatus::Open).unwrap();

        let token = Ledger::new(db)
            .record_apply(&conflict, Action::MakeTentative, 81.0, &outcome, now())
            .unwrap();
        (conflict, token)
    }

    #[test]
    fn undo_restores_event_and_closes_conflict() {
        let db = AutopilotDb::open_memory().unwrap();
        let (conflict, token) = auto_resolved(&db);

        let outcome = Ledger::new(&db).undo("u1", &conflict.id, &token, now()).unwrap();
        assert!(outcome.ok);

        let event = db.get_event(&conflict.event_id).unwrap().unwrap();
        assert_eq!(event.status, EventStatus::Confirmed);
        assert_eq!(event.version, 3);

        let stored = db.get_conflict(&conflict.id).unwrap().unwrap();
        assert_eq!(stored.status, ConflictStatus::Undone);

        let stats = db.learning_stats("u1", now() - chrono::Duration::days(30)).unwrap();
        assert_eq!(stats.rejected_count, 1);
    }

    #[test]
    fn second_undo_is_rejected_without_mutation() {
        let db = AutopilotDb::open_memory().unwrap();
        let (conflict, token) = auto_resolved(&db);
        let ledger = Ledger::new(&db);

        ledger.undo("u1", &conflict.id, &token, now()).unwrap();
        let event_after_first = db.get_event(&conflict.event_id).unwrap().unwrap();

        let err = ledger.undo("u1", &conflict.id, &token, now()).unwrap_err();
        assert_eq!(err.autopilot(), Some(&AutopilotError::TokenAlreadyUsed));
        assert_eq!(db.get_event(&conflict.event_id).unwrap().unwrap(), event_after_first);
        assert_eq!(db.list_actions(&conflict.id).unwrap().len(), 2);
    }

    #[test]
    fn foreign_or_unknown_tokens_are_not_found() {
        let db = AutopilotDb::open_memory().unwrap();
        let (conflict, token) = auto_resolved(&db);
        let ledger = Ledger::new(&db);

        let unknown = ledger.undo("u1", &conflict.id, "bogus", now()).unwrap_err();
        assert_eq!(unknown.autopilot(), Some(&AutopilotError::TokenNotFound));

        let other_owner = ledger.undo("u2", &conflict.id, &token, now()).unwrap_err();
        assert_eq!(other_owner.autopilot(), Some(&AutopilotError::TokenNotFound));

        let other_conflict = ledger.undo("u1", "c-other", &token, now()).unwrap_err();
        assert_eq!(other_conflict.autopilot(), Some(&AutopilotError::TokenNotFound));
    }

    #[test]
    fn failed_undo_rolls_back() {
        let db = AutopilotDb::open_memory().unwrap();
        let (conflict, token) = auto_resolved(&db);
        // Without an undo patch the revert cannot happen.
        let mut broken = conflict.clone();
        broken.undo_patch = None;
        db.save_conflict_state(&broken, ConflictStatus::AutoResolved).unwrap();

        let err = Ledger::new(&db).undo("u1", &conflict.id, &token, now()).unwrap_err();
        assert_eq!(
            err.autopilot(),
            Some(&AutopilotError::MissingPatch {
                conflict_id: conflict.id.clone(),
                kind: "undo",
            })
        );
        assert!(!db.is_token_consumed(&token).unwrap());
        assert_eq!(
            db.get_conflict(&conflict.id).unwrap().unwrap().status,
            ConflictStatus::AutoResolved
        );
    }
}
