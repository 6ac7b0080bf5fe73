//! Integration tests for on-disk persistence and configuration files.

use chrono::{NaiveDate, TimeZone, Utc};
use oryxa_autopilot::storage::migrations::{get_schema_version, SCHEMA_VERSION};
use oryxa_autopilot::{
    Autopilot, AutopilotConfig, AutopilotDb, ConflictDetector, ConflictStatus, Event, PrayerName,
    PrayerTimes,
};

#[test]
fn state_survives_reopening_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("autopilot.db");
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();

    let token = {
        let db = AutopilotDb::open_at(&path).unwrap();
        db.upsert_prayer_times("u1", &PrayerTimes::new(date).with(PrayerName::Isha, "19:20"))
            .unwrap();
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 19, 0, 0).unwrap();
        db.upsert_event(&Event::new("u1", "Dinner", start, start + chrono::Duration::minutes(45)).unwrap())
            .unwrap();
        ConflictDetector::default().detect_day(&db, "u1", date, now).unwrap();
        let report = Autopilot::new(&db, AutopilotConfig::default()).run_at("u1", now).unwrap();
        report.results[0].undo_token.clone().unwrap()
    };

    let db = AutopilotDb::open_at(&path).unwrap();
    assert_eq!(get_schema_version(db.conn()), SCHEMA_VERSION);
    assert!(db.find_action_by_token(&token).unwrap().is_some());
    let conflicts = db.list_conflicts("u1", Some(ConflictStatus::AutoResolved), 10).unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(db.list_pending_push("u1").unwrap().len(), 1);
}

#[test]
fn tuned_config_changes_engine_behaviour() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("autopilot.toml");

    let mut config = AutopilotConfig::load_from(&path).unwrap();
    config.set("consent.threshold", "90").unwrap();
    config.set("buffers.isha.post", "5").unwrap();
    config.save_to(&path).unwrap();

    let reloaded = AutopilotConfig::load_from(&path).unwrap();
    assert_eq!(reloaded.consent.threshold, 90.0);

    let db = AutopilotDb::open_memory().unwrap();
    let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    db.upsert_prayer_times("u1", &PrayerTimes::new(date).with(PrayerName::Isha, "19:20"))
        .unwrap();
    let start = Utc.with_ymd_and_hms(2026, 3, 1, 19, 0, 0).unwrap();
    db.upsert_event(&Event::new("u1", "Dinner", start, start + chrono::Duration::minutes(45)).unwrap())
        .unwrap();

    ConflictDetector::new(reloaded.buffers)
        .detect_day(&db, "u1", date, now)
        .unwrap();
    let conflict = &db.list_conflicts("u1", None, 10).unwrap()[0];
    // Window is 19:10–19:25 with the shorter post buffer.
    assert_eq!(conflict.overlap_min, 15);

    // 70 base confidence for shortening is below the raised threshold.
    let report = Autopilot::new(&db, reloaded).run_at("u1", now).unwrap();
    assert_eq!(report.results[0].action, oryxa_autopilot::ItemAction::Suggested);
}
