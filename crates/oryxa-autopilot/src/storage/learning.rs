//! Learning record persistence and aggregation.

use chrono::{DateTime, Utc};
use rusqlite::params;

use super::{fmt_ts, AutopilotDb};
use crate::decision::Action;
use crate::learning::{ActionStats, ContextBucket, LearningRecord, LearningStats};

/// Raw counts for one (action, bucket).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LearningTally {
    pub total: u64,
    pub accepted: u64,
}

impl AutopilotDb {
    pub fn insert_learning_record(&self, record: &LearningRecord) -> Result<i64, rusqlite::Error> {
        self.conn().execute(
            "INSERT INTO learning_records (owner_id, conflict_id, suggested_action, prayer_name,
                overlap_band, time_of_day, day_of_week, user_decision, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                record.owner_id,
                record.conflict_id,
                record.suggested_action.as_str(),
                record.bucket.prayer.as_str(),
                record.bucket.overlap_band.as_str(),
                record.bucket.time_of_day.as_str(),
                record.bucket.day_of_week,
                record.user_decision.as_str(),
                fmt_ts(record.recorded_at),
            ],
        )?;
        Ok(self.conn().last_insert_rowid())
    }

    /// Accepted/total feedback for `action` in exactly `bucket`, optionally
    /// restricted to records at or after `since`.
    pub fn learning_tally(
        &self,
        owner_id: &str,
        action: Action,
        bucket: &ContextBucket,
        since: Option<DateTime<Utc>>,
    ) -> Result<LearningTally, rusqlite::Error> {
        self.conn().query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN user_decision = 'accepted' THEN 1 ELSE 0 END), 0)
             FROM learning_records
             WHERE owner_id = ?1 AND suggested_action = ?2 AND prayer_name = ?3
               AND overlap_band = ?4 AND time_of_day = ?5 AND day_of_week = ?6
               AND (?7 IS NULL OR recorded_at >= ?7)",
            params![
                owner_id,
                action.as_str(),
                bucket.prayer.as_str(),
                bucket.overlap_band.as_str(),
                bucket.time_of_day.as_str(),
                bucket.day_of_week,
                since.map(fmt_ts),
            ],
            |row| {
                Ok(LearningTally {
                    total: row.get(0)?,
                    accepted: row.get(1)?,
                })
            },
        )
    }

    /// Acceptance summary since `since`, with the three most frequent actions.
    pub fn learning_stats(
        &self,
        owner_id: &str,
        since: DateTime<Utc>,
    ) -> Result<LearningStats, rusqlite::Error> {
        let mut stmt = self.conn().prepare(
            "SELECT suggested_action, COUNT(*),
                    COALESCE(SUM(CASE WHEN user_decision = 'accepted' THEN 1 ELSE 0 END), 0)
             FROM learning_records
             WHERE owner_id = ?1 AND recorded_at >= ?2
             GROUP BY suggested_action
             ORDER BY COUNT(*) DESC, suggested_action ASC",
        )?;
        let rows = stmt.query_map(params![owner_id, fmt_ts(since)], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u64>(1)?,
                row.get::<_, u64>(2)?,
            ))
        })?;

        let mut total = 0;
        let mut accepted = 0;
        let mut per_action = Vec::new();
        for row in rows {
            let (action, count, ok) = row?;
            total += count;
            accepted += ok;
            // Rows written by older builds may carry unknown action names.
            if let Some(action) = Action::parse(&action) {
                per_action.push(ActionStats {
                    action,
                    count,
                    rate: ok as f64 * 100.0 / count as f64,
                });
            }
        }
        per_action.truncate(3);

        Ok(LearningStats {
            total_decisions: total,
            accepted_count: accepted,
            rejected_count: total - accepted,
            acceptance_rate: if total > 0 {
                accepted as f64 * 100.0 / total as f64
            } else {
                0.0
            },
            top_actions: per_action,
        })
    }
}
