//! Store-backed learned confidence.

use chrono::{DateTime, Duration, Utc};

use super::{ConfidenceSource, ContextBucket};
use crate::decision::Action;
use crate::error::Result;
use crate::storage::{AutopilotDb, LearningConfig};

/// Acceptance rate as a 0–100 percentage, or `None` below `min_samples`.
pub fn acceptance_rate(total: u64, accepted: u64, min_samples: u64) -> Option<f64> {
    if total == 0 || total < min_samples {
        return None;
    }
    Some(accepted.min(total) as f64 * 100.0 / total as f64)
}

/// Learned confidence over the owner's feedback history.
pub struct LearnedConfidenceModel<'a> {
    db: &'a AutopilotDb,
    min_samples: u64,
    lookback_days: u32,
    now: DateTime<Utc>,
}

impl<'a> LearnedConfidenceModel<'a> {
    pub fn new(db: &'a AutopilotDb, config: &LearningConfig, now: DateTime<Utc>) -> Self {
        Self {
            db,
            min_samples: config.min_samples,
            lookback_days: config.lookback_days,
            now,
        }
    }

    /// Start of the trailing window, or `None` for all history.
    fn since(&self) -> Option<DateTime<Utc>> {
        (self.lookback_days > 0).then(|| self.now - Duration::days(i64::from(self.lookback_days)))
    }
}

impl ConfidenceSource for LearnedConfidenceModel<'_> {
    fn learned_confidence(
        &self,
        owner_id: &str,
        action: Action,
        bucket: &ContextBucket,
    ) -> Result<Option<f64>> {
        let tally = self
            .db
            .learning_tally(owner_id, action, bucket, self.since())?;
        let learned = acceptance_rate(tally.total, tally.accepted, self.min_samples);
        if learned.is_none() {
            tracing::debug!(
                owner_id,
                action = action.as_str(),
                samples = tally.total,
                "insufficient learning data"
            );
        }
        Ok(learned)
    }
}
