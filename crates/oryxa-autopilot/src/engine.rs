//! The autopilot run: decide, gate, apply or propose, audit.
//!
//! One run processes a bounded batch of the owner's open and suggested
//! conflicts (open first, then oldest first), strictly one at a time.
//! Each item is isolated: its failure is reported in the [`RunReport`] and
//! the batch moves on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::{Duration, Instant};

use crate::conflict::{overlap_minutes, Conflict, ConflictStatus};
use crate::consent::{ConsentGate, Route};
use crate::decision::{Decision, DecisionEngine};
use crate::error::{AutopilotError, CoreError, Result};
use crate::event::Event;
use crate::learning::LearnedConfidenceModel;
use crate::ledger::Ledger;
use crate::notify::Notification;
use crate::patch::PatchApplier;
use crate::storage::{AutopilotConfig, AutopilotDb};

/// What happened to one conflict in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemAction {
    Applied,
    Suggested,
    /// Left for the next run.
    Deferred,
    /// Nothing to do, or nothing that can be done.
    Skipped,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemResult {
    pub conflict_id: String,
    pub action: ItemAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub undo_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ItemResult {
    fn without_decision(conflict_id: &str, action: ItemAction, error: impl Into<String>) -> Self {
        Self {
            conflict_id: conflict_id.to_string(),
            action,
            decision: None,
            undo_token: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub processed: usize,
    pub results: Vec<ItemResult>,
}

impl RunReport {
    pub fn count(&self, action: ItemAction) -> usize {
        self.results.iter().filter(|r| r.action == action).count()
    }
}

pub struct Autopilot<'a> {
    db: &'a AutopilotDb,
    config: AutopilotConfig,
}

impl<'a> Autopilot<'a> {
    pub fn new(db: &'a AutopilotDb, config: AutopilotConfig) -> Self {
        Self { db, config }
    }

    pub fn config(&self) -> &AutopilotConfig {
        &self.config
    }

    /// Process the owner's pending conflicts now.
    ///
    /// # Errors
    /// Only if the batch itself cannot be loaded; per-item failures are
    /// reported in the result list.
    pub fn run(&self, owner_id: &str) -> Result<RunReport> {
        self.run_at(owner_id, Utc::now())
    }

    /// Process the owner's pending conflicts as of `now`.
    ///
    /// # Errors
    /// Same as [`Autopilot::run`].
    pub fn run_at(&self, owner_id: &str, now: DateTime<Utc>) -> Result<RunReport> {
        let started = Instant::now();
        let deadline = Duration::from_millis(self.config.engine.batch_deadline_ms);

        let batch = self
            .db
            .list_active_conflicts(owner_id, self.config.engine.batch_size)?;
        let engine = self.decision_engine(now);

        let mut report = RunReport::default();
        // Events written to (or proposed for) in this batch.
        let mut touched: HashSet<String> = HashSet::new();

        for conflict in batch {
            let result = if started.elapsed() >= deadline {
                ItemResult::without_decision(&conflict.id, ItemAction::Deferred, "batch deadline exceeded")
            } else if touched.contains(&conflict.event_id) {
                ItemResult::without_decision(
                    &conflict.id,
                    ItemAction::Deferred,
                    "event already handled in this batch",
                )
            } else {
                let conflict_id = conflict.id.clone();
                let event_id = conflict.event_id.clone();
                match self.process(&engine, conflict, now) {
                    Ok(result) => {
                        if matches!(result.action, ItemAction::Applied | ItemAction::Suggested) {
                            touched.insert(event_id);
                        }
                        result
                    }
                    Err(e) => {
                        tracing::warn!(owner_id, conflict_id = %conflict_id, error = %e, "conflict not processed");
                        failure_result(&conflict_id, e)
                    }
                }
            };
            report.results.push(result);
        }

        report.processed = report.results.len();
        tracing::info!(
            owner_id,
            processed = report.processed,
            applied = report.count(ItemAction::Applied),
            suggested = report.count(ItemAction::Suggested),
            deferred = report.count(ItemAction::Deferred),
            "autopilot run finished"
        );
        Ok(report)
    }

    fn decision_engine(&self, now: DateTime<Utc>) -> DecisionEngine<LearnedConfidenceModel<'a>> {
        DecisionEngine::new(
            LearnedConfidenceModel::new(self.db, &self.config.learning, now),
            self.config.buffers,
            &self.config.learning,
            ConsentGate::from_config(&self.config.consent),
        )
    }

    fn process(
        &self,
        engine: &DecisionEngine<LearnedConfidenceModel<'_>>,
        mut conflict: Conflict,
        now: DateTime<Utc>,
    ) -> Result<ItemResult> {
        let event = self
            .db
            .get_event(&conflict.event_id)?
            .ok_or_else(|| AutopilotError::EventNotFound(conflict.event_id.clone()))?;

        // The event may have been edited since detection.
        let overlap = overlap_minutes(
            event.starts_at,
            event.ends_at,
            conflict.window_start,
            conflict.window_end,
        );
        if overlap == 0 {
            return Ok(ItemResult::without_decision(
                &conflict.id,
                ItemAction::Skipped,
                "overlap cleared",
            ));
        }
        if overlap != conflict.overlap_min {
            self.db.update_conflict_overlap(
                &conflict.id,
                overlap,
                conflict.window_start,
                conflict.window_end,
                now,
            )?;
            conflict.overlap_min = overlap;
        }

        let decision = engine.decide(&conflict, &event)?;
        let day = now.date_naive();
        let limit = self.config.engine.daily_auto_apply_limit;
        let quota_available = limit > 0 && self.db.auto_apply_count(&conflict.owner_id, day)? < limit;

        match engine.gate().route(decision.confidence, quota_available) {
            Route::AutoApply => self.auto_apply(conflict, &event, decision, now),
            Route::Propose => {
                if !decision.requires_consent {
                    tracing::info!(conflict_id = %conflict.id, "daily auto-apply limit reached; proposing");
                }
                self.propose(conflict, &event, decision, now)
            }
        }
    }

    fn auto_apply(
        &self,
        conflict: Conflict,
        event: &Event,
        decision: Decision,
        now: DateTime<Utc>,
    ) -> Result<ItemResult> {
        conflict.status.check_transition(ConflictStatus::AutoResolved)?;

        let tx = self.db.conn().unchecked_transaction()?;
        let outcome = PatchApplier::new(self.db).apply(&event.id, event.version, &decision.patch)?;

        let mut resolved = conflict.clone();
        resolved.status = ConflictStatus::AutoResolved;
        resolved.suggested_action = Some(decision.action);
        resolved.confidence = Some(decision.confidence);
        resolved.patch = Some(decision.patch);
        resolved.undo_patch = Some(decision.patch.inverse(&outcome.before));
        resolved.resolution = Some("auto_applied".into());
        resolved.updated_at = now;
        resolved.decided_at = Some(now);
        if self.db.save_conflict_state(&resolved, conflict.status)? == 0 {
            return Err(AutopilotError::InvalidTransition {
                from: conflict.status,
                to: ConflictStatus::AutoResolved,
            }
            .into());
        }

        let token = Ledger::new(self.db).record_apply(
            &resolved,
            decision.action,
            decision.confidence,
            &outcome,
            now,
        )?;
        self.db.increment_auto_apply(&conflict.owner_id, now.date_naive())?;
        self.db.insert_notification(
            &Notification::applied(&resolved, &outcome.after, &decision, &token),
            now,
        )?;
        tx.commit()?;

        tracing::info!(
            conflict_id = %resolved.id,
            event_id = %event.id,
            action = decision.action.as_str(),
            confidence = decision.confidence,
            "auto-applied"
        );
        Ok(ItemResult {
            conflict_id: resolved.id,
            action: ItemAction::Applied,
            decision: Some(decision),
            undo_token: Some(token),
            error: None,
        })
    }

    fn propose(
        &self,
        conflict: Conflict,
        event: &Event,
        decision: Decision,
        now: DateTime<Utc>,
    ) -> Result<ItemResult> {
        let mut suggested = conflict.clone();
        suggested.status = ConflictStatus::Suggested;
        suggested.confidence = Some(decision.confidence);
        suggested.updated_at = now;

        // Same proposal as last run: only the confidence may have moved.
        let unchanged = conflict.status == ConflictStatus::Suggested
            && conflict.suggested_action == Some(decision.action)
            && conflict.patch == Some(decision.patch);
        if unchanged {
            self.db.save_conflict_state(&suggested, ConflictStatus::Suggested)?;
            return Ok(ItemResult {
                conflict_id: suggested.id,
                action: ItemAction::Suggested,
                decision: Some(decision),
                undo_token: None,
                error: None,
            });
        }

        if conflict.status != ConflictStatus::Suggested {
            conflict.status.check_transition(ConflictStatus::Suggested)?;
        }
        suggested.suggested_action = Some(decision.action);
        suggested.patch = Some(decision.patch);
        suggested.undo_patch = Some(decision.undo_patch);

        let tx = self.db.conn().unchecked_transaction()?;
        if self.db.save_conflict_state(&suggested, conflict.status)? == 0 {
            return Err(AutopilotError::InvalidTransition {
                from: conflict.status,
                to: ConflictStatus::Suggested,
            }
            .into());
        }
        let token = Ledger::new(self.db).record_suggest(
            &suggested,
            decision.action,
            decision.confidence,
            event,
            now,
        )?;
        self.db.insert_notification(
            &Notification::suggested(&suggested, event, &decision, &token),
            now,
        )?;
        tx.commit()?;

        tracing::debug!(
            conflict_id = %suggested.id,
            action = decision.action.as_str(),
            confidence = decision.confidence,
            "proposed"
        );
        Ok(ItemResult {
            conflict_id: suggested.id,
            action: ItemAction::Suggested,
            decision: Some(decision),
            undo_token: Some(token),
            error: None,
        })
    }
}

/// Map a per-item error to its reported outcome.
fn failure_result(conflict_id: &str, error: CoreError) -> ItemResult {
    let action = match error.autopilot() {
        Some(AutopilotError::EventNotFound(_)) => ItemAction::Skipped,
        Some(AutopilotError::StaleEvent { .. }) => ItemAction::Deferred,
        _ => ItemAction::Failed,
    };
    ItemResult::without_decision(conflict_id, action, error.to_string())
}
