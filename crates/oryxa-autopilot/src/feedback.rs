//! The owner's answer to a proposal.
//!
//! Accepting applies the proposed patch, rejecting dismisses it. Both close
//! the conflict as `resolved` and feed the verdict back into learning.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conflict::{Conflict, ConflictStatus};
use crate::error::{AutopilotError, Result};
use crate::learning::{ContextBucket, LearningRecord, UserDecision};
use crate::ledger::Ledger;
use crate::patch::{PatchApplier, PatchOutcome};
use crate::storage::AutopilotDb;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptOutcome {
    pub conflict: Conflict,
    pub patch: PatchOutcome,
    /// Audit token of the apply row. The conflict is resolved, so it cannot
    /// be used to undo.
    pub audit_token: String,
}

fn load_suggested(db: &AutopilotDb, owner_id: &str, conflict_id: &str) -> Result<Conflict> {
    let conflict = db
        .get_conflict(conflict_id)?
        .filter(|c| c.owner_id == owner_id)
        .ok_or_else(|| AutopilotError::ConflictNotFound(conflict_id.to_string()))?;
    conflict.status.check_transition(ConflictStatus::Resolved)?;
    Ok(conflict)
}

fn resolve(conflict: &Conflict, resolution: &str, now: DateTime<Utc>) -> Conflict {
    let mut resolved = conflict.clone();
    resolved.status = ConflictStatus::Resolved;
    resolved.resolution = Some(resolution.to_string());
    resolved.updated_at = now;
    resolved.decided_at = Some(now);
    resolved
}

fn save_resolved(db: &AutopilotDb, resolved: &Conflict) -> Result<()> {
    if db.save_conflict_state(resolved, ConflictStatus::Suggested)? == 0 {
        return Err(AutopilotError::InvalidTransition {
            from: ConflictStatus::Suggested,
            to: ConflictStatus::Resolved,
        }
        .into());
    }
    Ok(())
}

/// Apply a suggested patch on the owner's behalf.
///
/// # Errors
/// `ConflictNotFound`, `InvalidTransition` unless the conflict is
/// suggested, `EventNotFound` or `StaleEvent` from the patch write.
pub fn accept_suggestion(
    db: &AutopilotDb,
    owner_id: &str,
    conflict_id: &str,
    now: DateTime<Utc>,
) -> Result<AcceptOutcome> {
    let conflict = load_suggested(db, owner_id, conflict_id)?;
    let (Some(action), Some(patch)) = (conflict.suggested_action, conflict.patch) else {
        return Err(AutopilotError::MissingPatch {
            conflict_id: conflict_id.to_string(),
            kind: "suggested",
        }
        .into());
    };

    let tx = db.conn().unchecked_transaction()?;
    let outcome = PatchApplier::new(db).apply_current(&conflict.event_id, &patch)?;

    let mut resolved = resolve(&conflict, "accepted", now);
    resolved.undo_patch = Some(patch.inverse(&outcome.before));
    save_resolved(db, &resolved)?;

    let confidence = conflict.confidence.unwrap_or_else(|| action.base_confidence());
    let audit_token = Ledger::new(db).record_apply(&resolved, action, confidence, &outcome, now)?;
    db.insert_learning_record(&LearningRecord {
        owner_id: owner_id.to_string(),
        conflict_id: Some(conflict.id.clone()),
        suggested_action: action,
        bucket: ContextBucket::new(conflict.prayer, conflict.overlap_min, outcome.before.starts_at),
        user_decision: UserDecision::Accepted,
        recorded_at: now,
    })?;
    tx.commit()?;

    tracing::info!(owner_id, conflict_id, action = action.as_str(), "suggestion accepted");
    Ok(AcceptOutcome {
        conflict: resolved,
        patch: outcome,
        audit_token,
    })
}

/// Dismiss a suggestion without touching the event.
///
/// # Errors
/// `ConflictNotFound`, or `InvalidTransition` unless the conflict is
/// suggested.
pub fn reject_suggestion(
    db: &AutopilotDb,
    owner_id: &str,
    conflict_id: &str,
    now: DateTime<Utc>,
) -> Result<Conflict> {
    let conflict = load_suggested(db, owner_id, conflict_id)?;
    let starts_at = db
        .get_event(&conflict.event_id)?
        .map_or(conflict.window_start, |e| e.starts_at);

    let tx = db.conn().unchecked_transaction()?;
    let resolved = resolve(&conflict, "dismissed", now);
    save_resolved(db, &resolved)?;
    if let Some(action) = conflict.suggested_action {
        db.insert_learning_record(&LearningRecord {
            owner_id: owner_id.to_string(),
            conflict_id: Some(conflict.id.clone()),
            suggested_action: action,
            bucket: ContextBucket::new(conflict.prayer, conflict.overlap_min, starts_at),
            user_decision: UserDecision::Rejected,
            recorded_at: now,
        })?;
    }
    tx.commit()?;

    tracing::info!(owner_id, conflict_id, "suggestion dismissed");
    Ok(resolved)
}
