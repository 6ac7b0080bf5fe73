//! Conflict persistence.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{
    fmt_date, fmt_ts, parse_date, parse_enum, parse_opt_json, parse_opt_ts, parse_ts, to_opt_json,
    AutopilotDb,
};
use crate::conflict::{Conflict, ConflictStatus};
use crate::decision::Action;
use crate::prayer::PrayerName;

const CONFLICT_COLUMNS: &str = "id, owner_id, event_id, date_iso, prayer_name, window_start, window_end,
     overlap_min, status, suggested_action, confidence, patch, undo_patch, resolution,
     created_at, updated_at, decided_at";

fn row_to_conflict(row: &Row) -> rusqlite::Result<Conflict> {
    let suggested_action: Option<String> = row.get(9)?;
    Ok(Conflict {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        event_id: row.get(2)?,
        date: parse_date(3, &row.get::<_, String>(3)?)?,
        prayer: parse_enum(4, &row.get::<_, String>(4)?, PrayerName::parse)?,
        window_start: parse_ts(5, &row.get::<_, String>(5)?)?,
        window_end: parse_ts(6, &row.get::<_, String>(6)?)?,
        overlap_min: row.get(7)?,
        status: parse_enum(8, &row.get::<_, String>(8)?, ConflictStatus::parse)?,
        suggested_action: suggested_action
            .map(|s| parse_enum(9, &s, Action::parse))
            .transpose()?,
        confidence: row.get(10)?,
        patch: parse_opt_json(11, row.get(11)?)?,
        undo_patch: parse_opt_json(12, row.get(12)?)?,
        resolution: row.get(13)?,
        created_at: parse_ts(14, &row.get::<_, String>(14)?)?,
        updated_at: parse_ts(15, &row.get::<_, String>(15)?)?,
        decided_at: parse_opt_ts(16, row.get(16)?)?,
    })
}

impl AutopilotDb {
    pub fn insert_conflict(&self, conflict: &Conflict) -> Result<(), rusqlite::Error> {
        self.conn().execute(
            &format!(
                "INSERT INTO conflicts ({CONFLICT_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"
            ),
            params![
                conflict.id,
                conflict.owner_id,
                conflict.event_id,
                fmt_date(conflict.date),
                conflict.prayer.as_str(),
                fmt_ts(conflict.window_start),
                fmt_ts(conflict.window_end),
                conflict.overlap_min,
                conflict.status.as_str(),
                conflict.suggested_action.map(|a| a.as_str()),
                conflict.confidence,
                to_opt_json(conflict.patch.as_ref())?,
                to_opt_json(conflict.undo_patch.as_ref())?,
                conflict.resolution,
                fmt_ts(conflict.created_at),
                fmt_ts(conflict.updated_at),
                conflict.decided_at.map(fmt_ts),
            ],
        )?;
        Ok(())
    }

    pub fn get_conflict(&self, id: &str) -> Result<Option<Conflict>, rusqlite::Error> {
        self.conn()
            .query_row(
                &format!("SELECT {CONFLICT_COLUMNS} FROM conflicts WHERE id = ?1"),
                params![id],
                row_to_conflict,
            )
            .optional()
    }

    /// The conflict for (event, prayer, date) in any status, if any.
    pub fn find_conflict(
        &self,
        event_id: &str,
        prayer: PrayerName,
        date: NaiveDate,
    ) -> Result<Option<Conflict>, rusqlite::Error> {
        self.conn()
            .query_row(
                &format!(
                    "SELECT {CONFLICT_COLUMNS} FROM conflicts
                     WHERE event_id = ?1 AND prayer_name = ?2 AND date_iso = ?3"
                ),
                params![event_id, prayer.as_str(), fmt_date(date)],
                row_to_conflict,
            )
            .optional()
    }

    /// Refresh overlap and window bounds of an active conflict in place.
    /// Status is left untouched. Returns rows changed.
    pub fn update_conflict_overlap(
        &self,
        id: &str,
        overlap_min: i64,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<usize, rusqlite::Error> {
        self.conn().execute(
            "UPDATE conflicts
             SET overlap_min = ?1, window_start = ?2, window_end = ?3, updated_at = ?4
             WHERE id = ?5 AND status IN ('open', 'suggested')",
            params![overlap_min, fmt_ts(window_start), fmt_ts(window_end), fmt_ts(now), id],
        )
    }

    /// Open/suggested conflicts of `owner_id`, at most `limit`. Open
    /// conflicts come first so waiting suggestions cannot starve new ones;
    /// oldest first within each status.
    pub fn list_active_conflicts(
        &self,
        owner_id: &str,
        limit: usize,
    ) -> Result<Vec<Conflict>, rusqlite::Error> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {CONFLICT_COLUMNS} FROM conflicts
             WHERE owner_id = ?1 AND status IN ('open', 'suggested')
             ORDER BY CASE status WHEN 'open' THEN 0 ELSE 1 END, created_at ASC, id ASC
             LIMIT ?2"
        ))?;
        let rows = stmt.query_map(params![owner_id, limit as i64], row_to_conflict)?;
        rows.collect()
    }

    /// Conflicts of `owner_id`, newest first, optionally filtered by status.
    pub fn list_conflicts(
        &self,
        owner_id: &str,
        status: Option<ConflictStatus>,
        limit: usize,
    ) -> Result<Vec<Conflict>, rusqlite::Error> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {CONFLICT_COLUMNS} FROM conflicts
             WHERE owner_id = ?1 AND (?2 IS NULL OR status = ?2)
             ORDER BY created_at DESC, id DESC
             LIMIT ?3"
        ))?;
        let rows = stmt.query_map(
            params![owner_id, status.map(|s| s.as_str()), limit as i64],
            row_to_conflict,
        )?;
        rows.collect()
    }

    /// Persist the decision fields and status of `conflict`, but only if the
    /// stored status is still `expected`. Returns rows changed (0 or 1).
    pub fn save_conflict_state(
        &self,
        conflict: &Conflict,
        expected: ConflictStatus,
    ) -> Result<usize, rusqlite::Error> {
        self.conn().execute(
            "UPDATE conflicts SET
                status = ?1, suggested_action = ?2, confidence = ?3, patch = ?4,
                undo_patch = ?5, resolution = ?6, updated_at = ?7, decided_at = ?8
             WHERE id = ?9 AND status = ?10",
            params![
                conflict.status.as_str(),
                conflict.suggested_action.map(|a| a.as_str()),
                conflict.confidence,
                to_opt_json(conflict.patch.as_ref())?,
                to_opt_json(conflict.undo_patch.as_ref())?,
                conflict.resolution,
                fmt_ts(conflict.updated_at),
                conflict.decided_at.map(fmt_ts),
                conflict.id,
                expected.as_str(),
            ],
        )
    }
}
