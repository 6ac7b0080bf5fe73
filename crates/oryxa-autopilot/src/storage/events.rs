//! Event and prayer-time persistence.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{fmt_date, fmt_ts, parse_date, parse_enum, parse_ts, AutopilotDb};
use crate::event::{Event, EventStatus, Transparency};
use crate::prayer::PrayerTimes;

const EVENT_COLUMNS: &str =
    "id, owner_id, title, starts_at, ends_at, duration_min, transparency, status, version, pending_push";

fn row_to_event(row: &Row) -> rusqlite::Result<Event> {
    Ok(Event {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        title: row.get(2)?,
        starts_at: parse_ts(3, &row.get::<_, String>(3)?)?,
        ends_at: parse_ts(4, &row.get::<_, String>(4)?)?,
        duration_min: row.get(5)?,
        transparency: parse_enum(6, &row.get::<_, String>(6)?, Transparency::parse)?,
        status: parse_enum(7, &row.get::<_, String>(7)?, EventStatus::parse)?,
        version: row.get(8)?,
        pending_push: row.get(9)?,
    })
}

fn row_to_prayer_times(row: &Row) -> rusqlite::Result<PrayerTimes> {
    Ok(PrayerTimes {
        date: parse_date(0, &row.get::<_, String>(0)?)?,
        fajr: row.get(1)?,
        dhuhr: row.get(2)?,
        asr: row.get(3)?,
        maghrib: row.get(4)?,
        isha: row.get(5)?,
    })
}

impl AutopilotDb {
    /// Insert or fully replace an event as written by its owner.
    ///
    /// User edits bump the stored version so in-flight autopilot writes
    /// computed against the old row fail their version check.
    pub fn upsert_event(&self, event: &Event) -> Result<(), rusqlite::Error> {
        self.conn().execute(
            "INSERT INTO events (id, owner_id, title, starts_at, ends_at, duration_min,
                                 transparency, status, version, pending_push, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                starts_at = excluded.starts_at,
                ends_at = excluded.ends_at,
                duration_min = excluded.duration_min,
                transparency = excluded.transparency,
                status = excluded.status,
                version = MAX(events.version + 1, excluded.version),
                pending_push = excluded.pending_push,
                updated_at = excluded.updated_at",
            params![
                event.id,
                event.owner_id,
                event.title,
                fmt_ts(event.starts_at),
                fmt_ts(event.ends_at),
                event.duration_min,
                event.transparency.as_str(),
                event.status.as_str(),
                event.version,
                event.pending_push,
                fmt_ts(Utc::now()),
            ],
        )?;
        Ok(())
    }

    pub fn get_event(&self, id: &str) -> Result<Option<Event>, rusqlite::Error> {
        self.conn()
            .query_row(
                &format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1"),
                params![id],
                row_to_event,
            )
            .optional()
    }

    /// Events of `owner_id` intersecting `[from, to)`, earliest first.
    pub fn list_events(
        &self,
        owner_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Event>, rusqlite::Error> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM events
             WHERE owner_id = ?1 AND starts_at < ?2 AND ends_at > ?3
             ORDER BY starts_at ASC"
        ))?;
        let rows = stmt.query_map(params![owner_id, fmt_ts(to), fmt_ts(from)], row_to_event)?;
        rows.collect()
    }

    /// Write `event`'s schedule fields only if the stored version is still
    /// `expected_version`. Returns the number of rows changed (0 or 1).
    pub fn update_event_if_version(
        &self,
        event: &Event,
        expected_version: i64,
    ) -> Result<usize, rusqlite::Error> {
        self.conn().execute(
            "UPDATE events SET
                starts_at = ?1, ends_at = ?2, duration_min = ?3, transparency = ?4,
                status = ?5, version = ?6, pending_push = ?7, updated_at = ?8
             WHERE id = ?9 AND version = ?10",
            params![
                fmt_ts(event.starts_at),
                fmt_ts(event.ends_at),
                event.duration_min,
                event.transparency.as_str(),
                event.status.as_str(),
                event.version,
                event.pending_push,
                fmt_ts(Utc::now()),
                event.id,
                expected_version,
            ],
        )
    }

    /// Events with local changes the calendar-sync collaborator still owes.
    pub fn list_pending_push(&self, owner_id: &str) -> Result<Vec<Event>, rusqlite::Error> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM events
             WHERE owner_id = ?1 AND pending_push = 1
             ORDER BY starts_at ASC"
        ))?;
        let rows = stmt.query_map(params![owner_id], row_to_event)?;
        rows.collect()
    }

    pub fn upsert_prayer_times(
        &self,
        owner_id: &str,
        times: &PrayerTimes,
    ) -> Result<(), rusqlite::Error> {
        self.conn().execute(
            "INSERT OR REPLACE INTO prayer_times (owner_id, date_iso, fajr, dhuhr, asr, maghrib, isha)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                owner_id,
                fmt_date(times.date),
                times.fajr,
                times.dhuhr,
                times.asr,
                times.maghrib,
                times.isha,
            ],
        )?;
        Ok(())
    }

    pub fn get_prayer_times(
        &self,
        owner_id: &str,
        date: NaiveDate,
    ) -> Result<Option<PrayerTimes>, rusqlite::Error> {
        self.conn()
            .query_row(
                "SELECT date_iso, fajr, dhuhr, asr, maghrib, isha
                 FROM prayer_times WHERE owner_id = ?1 AND date_iso = ?2",
                params![owner_id, fmt_date(date)],
                row_to_prayer_times,
            )
            .optional()
    }
}
