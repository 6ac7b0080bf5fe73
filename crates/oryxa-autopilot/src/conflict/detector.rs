//! Intersecting stored events with prayer windows.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::Conflict;
use crate::error::Result;
use crate::event::Event;
use crate::prayer::{BufferTable, PrayerWindow, WindowBuilder};
use crate::storage::AutopilotDb;

/// Whole minutes shared by `[ev_start, ev_end)` and `[win_start, win_end)`,
/// floored at zero.
pub fn overlap_minutes(
    ev_start: DateTime<Utc>,
    ev_end: DateTime<Utc>,
    win_start: DateTime<Utc>,
    win_end: DateTime<Utc>,
) -> i64 {
    let start = ev_start.max(win_start);
    let end = ev_end.min(win_end);
    if end <= start {
        return 0;
    }
    (end - start).num_minutes()
}

/// A positive overlap between one event and one window.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlap<'a> {
    pub event: &'a Event,
    pub window: &'a PrayerWindow,
    pub minutes: i64,
}

/// All positive (event, window) overlaps, in window order then event order.
pub fn find_overlaps<'a>(events: &'a [Event], windows: &'a [PrayerWindow]) -> Vec<Overlap<'a>> {
    windows
        .iter()
        .flat_map(|window| {
            events.iter().filter_map(move |event| {
                let minutes = window.overlap_minutes(event.starts_at, event.ends_at);
                (minutes > 0).then_some(Overlap {
                    event,
                    window,
                    minutes,
                })
            })
        })
        .collect()
}

/// Counts from one detection pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionSummary {
    pub dates_scanned: usize,
    pub windows: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Overlaps whose conflict was already decided; never reopened.
    #[serde(default)]
    pub closed: usize,
    /// Dates with no stored prayer times.
    pub missing_dates: Vec<NaiveDate>,
}

impl DetectionSummary {
    fn absorb(&mut self, other: DetectionSummary) {
        self.dates_scanned += other.dates_scanned;
        self.windows += other.windows;
        self.created += other.created;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.closed += other.closed;
        self.missing_dates.extend(other.missing_dates);
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConflictDetector {
    builder: WindowBuilder,
}

impl ConflictDetector {
    pub fn new(buffers: BufferTable) -> Self {
        Self {
            builder: WindowBuilder::new(buffers),
        }
    }

    /// Detect conflicts for every date in `from..=to`.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read or written.
    pub fn detect_range(
        &self,
        db: &AutopilotDb,
        owner_id: &str,
        from: NaiveDate,
        to: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<DetectionSummary> {
        let mut summary = DetectionSummary::default();
        for date in from.iter_days().take_while(|d| *d <= to) {
            summary.absorb(self.detect_day(db, owner_id, date, now)?);
        }
        tracing::info!(
            owner_id,
            %from,
            %to,
            created = summary.created,
            updated = summary.updated,
            "conflict detection finished"
        );
        Ok(summary)
    }

    /// Detect conflicts between the owner's events and the prayer windows
    /// of `date`. Re-running over unchanged data writes nothing.
    ///
    /// There is at most one conflict per (event, prayer, date). Once it has
    /// left `open`/`suggested` it is never reopened or refreshed.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read or written.
    pub fn detect_day(
        &self,
        db: &AutopilotDb,
        owner_id: &str,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<DetectionSummary> {
        let mut summary = DetectionSummary {
            dates_scanned: 1,
            ..DetectionSummary::default()
        };

        let Some(times) = db.get_prayer_times(owner_id, date)? else {
            tracing::warn!(owner_id, %date, "no prayer times stored; skipping date");
            summary.missing_dates.push(date);
            return Ok(summary);
        };

        let windows = self.builder.build(&times);
        summary.windows = windows.len();
        let (Some(from), Some(to)) = (
            windows.iter().map(|w| w.start).min(),
            windows.iter().map(|w| w.end).max(),
        ) else {
            return Ok(summary);
        };

        let events = db.list_events(owner_id, from, to)?;
        for overlap in find_overlaps(&events, &windows) {
            let Overlap {
                event,
                window,
                minutes,
            } = overlap;

            match db.find_conflict(&event.id, window.prayer, window.date)? {
                None => {
                    let conflict = Conflict::open(owner_id, event.id.clone(), window, minutes, now);
                    db.insert_conflict(&conflict)?;
                    tracing::debug!(
                        conflict_id = %conflict.id,
                        event_id = %event.id,
                        prayer = %window.prayer,
                        overlap_min = minutes,
                        "conflict created"
                    );
                    summary.created += 1;
                }
                Some(existing) if !existing.status.is_active() => summary.closed += 1,
                Some(existing)
                    if existing.overlap_min != minutes
                        || existing.window_start != window.start
                        || existing.window_end != window.end =>
                {
                    db.update_conflict_overlap(&existing.id, minutes, window.start, window.end, now)?;
                    tracing::debug!(
                        conflict_id = %existing.id,
                        from = existing.overlap_min,
                        to = minutes,
                        "conflict overlap updated"
                    );
                    summary.updated += 1;
                }
                Some(_) => summary.unchanged += 1,
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::ConflictStatus;
    use crate::prayer::{PrayerName, PrayerTimes};
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, h, m, 0).unwrap()
    }

    fn seeded() -> (AutopilotDb, Event) {
        let db = AutopilotDb::open_memory().unwrap();
        db.upsert_prayer_times(
            "u1",
            &PrayerTimes::new(day())
                .with(PrayerName::Fajr, "05:00")
                .with(PrayerName::Dhuhr, "12:10")
                .with(PrayerName::Asr, "15:30")
                .with(PrayerName::Maghrib, "18:05")
                .with(PrayerName::Isha, "19:20"),
        )
        .unwrap();
        let event = Event::new("u1", "Dinner", at(19, 0), at(19, 45)).unwrap();
        db.upsert_event(&event).unwrap();
        (db, event)
    }

    #[test]
    fn overlap_examples() {
        assert_eq!(overlap_minutes(at(19, 0), at(19, 45), at(19, 10), at(19, 40)), 30);
        assert_eq!(overlap_minutes(at(19, 35), at(20, 30), at(19, 10), at(19, 40)), 5);
        assert_eq!(overlap_minutes(at(18, 0), at(19, 10), at(19, 10), at(19, 40)), 0);
        assert_eq!(overlap_minutes(at(20, 0), at(21, 0), at(19, 10), at(19, 40)), 0);
    }

    #[test]
    fn detects_isha_conflict_once() {
        let (db, event) = seeded();
        let detector = ConflictDetector::default();

        let first = detector.detect_day(&db, "u1", day(), at(12, 0)).unwrap();
        assert_eq!(first.windows, 5);
        assert_eq!(first.created, 1);

        let conflict = db.find_conflict(&event.id, PrayerName::Isha, day()).unwrap().unwrap();
        assert_eq!(conflict.overlap_min, 30);
        assert_eq!(conflict.status, ConflictStatus::Open);

        let second = detector.detect_day(&db, "u1", day(), at(13, 0)).unwrap();
        assert_eq!(second.created, 0);
        assert_eq!(second.unchanged, 1);
        assert_eq!(db.list_conflicts("u1", None, 10).unwrap().len(), 1);
    }

    #[test]
    fn edited_event_updates_overlap_in_place() {
        let (db, mut event) = seeded();
        let detector = ConflictDetector::default();
        detector.detect_day(&db, "u1", day(), at(12, 0)).unwrap();

        let mut conflict = db.find_conflict(&event.id, PrayerName::Isha, day()).unwrap().unwrap();
        conflict.status = ConflictStatus::Suggested;
        db.save_conflict_state(&conflict, ConflictStatus::Open).unwrap();

        event.starts_at = at(19, 25);
        event.ends_at = at(20, 10);
        event.duration_min = 45;
        db.upsert_event(&event).unwrap();

        let summary = detector.detect_day(&db, "u1", day(), at(13, 0)).unwrap();
        assert_eq!(summary.updated, 1);
        let refreshed = db.get_conflict(&conflict.id).unwrap().unwrap();
        assert_eq!(refreshed.overlap_min, 15);
        assert_eq!(refreshed.status, ConflictStatus::Suggested);
    }

    #[test]
    fn decided_conflicts_are_never_reopened() {
        let (db, mut event) = seeded();
        let detector = ConflictDetector::default();
        detector.detect_day(&db, "u1", day(), at(12, 0)).unwrap();

        let mut conflict = db.find_conflict(&event.id, PrayerName::Isha, day()).unwrap().unwrap();
        conflict.status = ConflictStatus::AutoResolved;
        db.save_conflict_state(&conflict, ConflictStatus::Open).unwrap();

        // Still overlapping, with a different overlap than recorded.
        event.ends_at = at(19, 30);
        event.duration_min = 30;
        db.upsert_event(&event).unwrap();

        let summary = detector.detect_day(&db, "u1", day(), at(13, 0)).unwrap();
        assert_eq!(summary.created, 0);
        assert_eq!(summary.updated, 0);
        assert_eq!(summary.closed, 1);

        let conflicts = db.list_conflicts("u1", None, 10).unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].status, ConflictStatus::AutoResolved);
        assert_eq!(conflicts[0].overlap_min, 30);
    }

    #[test]
    fn missing_prayer_times_skip_the_date() {
        let (db, _) = seeded();
        let next = day().succ_opt().unwrap();
        let summary = ConflictDetector::default()
            .detect_range(&db, "u1", day(), next, at(12, 0))
            .unwrap();
        assert_eq!(summary.dates_scanned, 2);
        assert_eq!(summary.missing_dates, vec![next]);
        assert_eq!(summary.created, 1);
    }

    #[test]
    fn multi_day_event_is_checked_on_each_date() {
        let db = AutopilotDb::open_memory().unwrap();
        let next = day().succ_opt().unwrap();
        for date in [day(), next] {
            db.upsert_prayer_times("u1", &PrayerTimes::new(date).with(PrayerName::Fajr, "05:00"))
                .unwrap();
        }
        let retreat = Event::new("u1", "Retreat", at(4, 0), at(4, 0) + Duration::days(1) + Duration::hours(2))
            .unwrap();
        db.upsert_event(&retreat).unwrap();

        let summary = ConflictDetector::default()
            .detect_range(&db, "u1", day(), next, at(0, 0))
            .unwrap();
        assert_eq!(summary.created, 2);
        assert!(db.find_conflict(&retreat.id, PrayerName::Fajr, next).unwrap().is_some());
    }

    proptest! {
        #[test]
        fn overlap_matches_formula_for_intersecting_pairs(
            ev_start in 0i64..2_000,
            ev_len in 1i64..600,
            win_start in 0i64..2_000,
            win_len in 1i64..90,
        ) {
            let base = at(0, 0);
            let es = base + Duration::minutes(ev_start);
            let ee = es + Duration::minutes(ev_len);
            let ws = base + Duration::minutes(win_start);
            let we = ws + Duration::minutes(win_len);

            let overlap = overlap_minutes(es, ee, ws, we);
            prop_assert!(overlap >= 0);
            if es < we && ee > ws {
                prop_assert_eq!(overlap, (ee.min(we) - es.max(ws)).num_minutes());
                prop_assert!(overlap > 0);
            } else {
                prop_assert_eq!(overlap, 0);
            }
            prop_assert_eq!(overlap, overlap_minutes(ws, we, es, ee));
        }
    }
}
