//! Database schema migrations for the autopilot store.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
///
/// Increment this when adding new migrations.
pub const SCHEMA_VERSION: i32 = 4;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }
    if current_version < 3 {
        migrate_v3(conn)?;
    }
    if current_version < 4 {
        migrate_v4(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (initial database).
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            tracing::warn!(error = %e, "failed to read schema_version");
        }
        0
    })
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: events, prayer times and conflicts.
///
/// Only one open/suggested conflict may exist per (event, prayer, date);
/// closed conflicts accumulate as history.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS events (
            id           TEXT PRIMARY KEY,
            owner_id     TEXT NOT NULL,
            title        TEXT NOT NULL DEFAULT '',
            starts_at    TEXT NOT NULL,
            ends_at      TEXT NOT NULL,
            duration_min INTEGER NOT NULL,
            transparency TEXT NOT NULL DEFAULT 'opaque',
            status       TEXT NOT NULL DEFAULT 'confirmed',
            version      INTEGER NOT NULL DEFAULT 1,
            pending_push INTEGER NOT NULL DEFAULT 0,
            updated_at   TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS prayer_times (
            owner_id TEXT NOT NULL,
            date_iso TEXT NOT NULL,
            fajr     TEXT,
            dhuhr    TEXT,
            asr      TEXT,
            maghrib  TEXT,
            isha     TEXT,
            PRIMARY KEY (owner_id, date_iso)
        );

        CREATE TABLE IF NOT EXISTS conflicts (
            id               TEXT PRIMARY KEY,
            owner_id         TEXT NOT NULL,
            event_id         TEXT NOT NULL,
            date_iso         TEXT NOT NULL,
            prayer_name      TEXT NOT NULL,
            window_start     TEXT NOT NULL,
            window_end       TEXT NOT NULL,
            overlap_min      INTEGER NOT NULL CHECK (overlap_min > 0),
            status           TEXT NOT NULL DEFAULT 'open',
            suggested_action TEXT,
            confidence       REAL CHECK (confidence IS NULL OR (confidence >= 0 AND confidence <= 100)),
            patch            TEXT,
            undo_patch       TEXT,
            resolution       TEXT,
            created_at       TEXT NOT NULL,
            updated_at       TEXT NOT NULL,
            decided_at       TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_events_owner_starts ON events(owner_id, starts_at);
        CREATE INDEX IF NOT EXISTS idx_conflicts_owner_status ON conflicts(owner_id, status, created_at);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_conflicts_active
            ON conflicts(event_id, prayer_name, date_iso)
            WHERE status IN ('open', 'suggested');",
    )?;

    set_schema_version(&tx, 1)?;
    tx.commit()?;
    Ok(())
}

/// Migration v2: audit ledger, learning records and notification outbox.
///
/// `undo_token` and `consumes_token` are both unique: a token is issued once
/// and can be consumed by exactly one undo row.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS autopilot_actions (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id         TEXT NOT NULL,
            conflict_id      TEXT NOT NULL,
            kind             TEXT NOT NULL,
            suggested_action TEXT,
            confidence       REAL,
            patch_before     TEXT,
            patch_after      TEXT,
            undo_token       TEXT UNIQUE,
            consumes_token   TEXT UNIQUE,
            created_at       TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS learning_records (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id         TEXT NOT NULL,
            conflict_id      TEXT,
            suggested_action TEXT NOT NULL,
            prayer_name      TEXT NOT NULL,
            overlap_band     TEXT NOT NULL,
            time_of_day      TEXT NOT NULL,
            day_of_week      INTEGER NOT NULL,
            user_decision    TEXT NOT NULL,
            recorded_at      TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS notifications (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id   TEXT NOT NULL,
            title      TEXT NOT NULL,
            body       TEXT NOT NULL,
            priority   INTEGER NOT NULL,
            payload    TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_actions_conflict ON autopilot_actions(conflict_id);
        CREATE INDEX IF NOT EXISTS idx_learning_bucket
            ON learning_records(owner_id, suggested_action, prayer_name, overlap_band, time_of_day, day_of_week);
        CREATE INDEX IF NOT EXISTS idx_notifications_owner ON notifications(owner_id, created_at);",
    )?;

    set_schema_version(&tx, 2)?;
    tx.commit()?;
    Ok(())
}

/// Migration v3: per-owner, per-day auto-apply counter.
fn migrate_v3(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS auto_apply_quota (
            owner_id TEXT NOT NULL,
            day_iso  TEXT NOT NULL,
            count    INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (owner_id, day_iso)
        );",
    )?;

    set_schema_version(&tx, 3)?;
    tx.commit()?;
    Ok(())
}

/// Migration v4: one conflict per (owner, event, prayer, date) in any status.
///
/// Earlier schemas allowed a fresh row once the previous one was closed.
/// The first row of each key is kept, so a decided conflict stays decided.
fn migrate_v4(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "DELETE FROM conflicts
         WHERE rowid NOT IN (
             SELECT MIN(rowid) FROM conflicts
             GROUP BY owner_id, event_id, prayer_name, date_iso
         );

        DROP INDEX IF EXISTS idx_conflicts_active;
        CREATE UNIQUE INDEX IF NOT EXISTS idx_conflicts_key
            ON conflicts(owner_id, event_id, prayer_name, date_iso);",
    )?;

    set_schema_version(&tx, 4)?;
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_database_reaches_current_version() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), SCHEMA_VERSION);
    }

    #[test]
    fn migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), SCHEMA_VERSION);
    }

    #[test]
    fn zero_overlap_rows_are_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        let result = conn.execute(
            "INSERT INTO conflicts (id, owner_id, event_id, date_iso, prayer_name, window_start,
                window_end, overlap_min, created_at, updated_at)
             VALUES ('c1', 'u', 'e', '2026-03-01', 'isha', 'a', 'b', 0, 'x', 'x')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn v4_collapses_reopened_conflicts_to_the_first_row() {
        let conn = Connection::open_in_memory().unwrap();
        create_schema_version_table(&conn).unwrap();
        migrate_v1(&conn).unwrap();
        migrate_v2(&conn).unwrap();
        migrate_v3(&conn).unwrap();

        for (id, status, created) in [("c1", "auto_resolved", "2026-03-01T10:00:00Z"), ("c2", "open", "2026-03-01T11:00:00Z")] {
            conn.execute(
                "INSERT INTO conflicts (id, owner_id, event_id, date_iso, prayer_name, window_start,
                    window_end, overlap_min, status, created_at, updated_at)
                 VALUES (?1, 'u', 'e', '2026-03-01', 'isha', 'a', 'b', 5, ?2, ?3, ?3)",
                rusqlite::params![id, status, created],
            )
            .unwrap();
        }

        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), SCHEMA_VERSION);
        let ids: Vec<String> = conn
            .prepare("SELECT id FROM conflicts")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(ids, vec!["c1".to_string()]);

        let again = conn.execute(
            "INSERT INTO conflicts (id, owner_id, event_id, date_iso, prayer_name, window_start,
                window_end, overlap_min, created_at, updated_at)
             VALUES ('c3', 'u', 'e', '2026-03-01', 'isha', 'a', 'b', 5, 'x', 'x')",
            [],
        );
        assert!(again.is_err());
    }
}
