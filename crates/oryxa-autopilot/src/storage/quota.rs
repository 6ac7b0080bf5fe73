//! Per-owner daily auto-apply counter.

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension};

use super::{fmt_date, AutopilotDb};

impl AutopilotDb {
    pub fn auto_apply_count(&self, owner_id: &str, day: NaiveDate) -> Result<u32, rusqlite::Error> {
        Ok(self
            .conn()
            .query_row(
                "SELECT count FROM auto_apply_quota WHERE owner_id = ?1 AND day_iso = ?2",
                params![owner_id, fmt_date(day)],
                |row| row.get(0),
            )
            .optional()?
            .unwrap_or(0))
    }

    /// Bump the counter for (owner, day) and return the new value.
    pub fn increment_auto_apply(&self, owner_id: &str, day: NaiveDate) -> Result<u32, rusqlite::Error> {
        self.conn().query_row(
            "INSERT INTO auto_apply_quota (owner_id, day_iso, count) VALUES (?1, ?2, 1)
             ON CONFLICT(owner_id, day_iso) DO UPDATE SET count = count + 1
             RETURNING count",
            params![owner_id, fmt_date(day)],
            |row| row.get(0),
        )
    }
}
