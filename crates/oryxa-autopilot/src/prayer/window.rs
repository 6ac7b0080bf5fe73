//! Prayer windows: a prayer's clock time widened by per-prayer buffers.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{PrayerName, PrayerTimes};
use crate::error::AutopilotError;

/// Minutes reserved before and after a prayer's clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrayerBuffer {
    pub pre: i64,
    pub post: i64,
}

impl PrayerBuffer {
    pub const fn new(pre: i64, post: i64) -> Self {
        Self { pre, post }
    }
}

/// Per-prayer buffers. Fajr is widest, maghrib narrowest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferTable {
    #[serde(default = "default_fajr")]
    pub fajr: PrayerBuffer,
    #[serde(default = "default_regular")]
    pub dhuhr: PrayerBuffer,
    #[serde(default = "default_regular")]
    pub asr: PrayerBuffer,
    #[serde(default = "default_maghrib")]
    pub maghrib: PrayerBuffer,
    #[serde(default = "default_regular")]
    pub isha: PrayerBuffer,
}

fn default_fajr() -> PrayerBuffer {
    PrayerBuffer::new(15, 30)
}
fn default_regular() -> PrayerBuffer {
    PrayerBuffer::new(10, 20)
}
fn default_maghrib() -> PrayerBuffer {
    PrayerBuffer::new(10, 15)
}

impl Default for BufferTable {
    fn default() -> Self {
        Self {
            fajr: default_fajr(),
            dhuhr: default_regular(),
            asr: default_regular(),
            maghrib: default_maghrib(),
            isha: default_regular(),
        }
    }
}

impl BufferTable {
    pub fn get(&self, prayer: PrayerName) -> PrayerBuffer {
        match prayer {
            PrayerName::Fajr => self.fajr,
            PrayerName::Dhuhr => self.dhuhr,
            PrayerName::Asr => self.asr,
            PrayerName::Maghrib => self.maghrib,
            PrayerName::Isha => self.isha,
        }
    }
}

/// A single prayer's reserved time span on one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrayerWindow {
    pub date: NaiveDate,
    pub prayer: PrayerName,
    pub prayer_at: DateTime<Utc>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub pre_buffer_min: i64,
    pub post_buffer_min: i64,
}

impl PrayerWindow {
    /// Whole minutes of `[start, end)` that fall inside this window.
    pub fn overlap_minutes(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
        crate::conflict::overlap_minutes(start, end, self.start, self.end)
    }
}

/// Turns a day's prayer times into ordered windows.
#[derive(Debug, Clone, Default)]
pub struct WindowBuilder {
    buffers: BufferTable,
}

impl WindowBuilder {
    pub fn new(buffers: BufferTable) -> Self {
        Self { buffers }
    }

    pub fn buffers(&self) -> &BufferTable {
        &self.buffers
    }

    /// Build the window for a single prayer.
    ///
    /// Clock times are interpreted as UTC on `times.date`.
    ///
    /// # Errors
    /// `MissingPrayerTime` when no time is stored for the prayer,
    /// `InvalidPrayerTime` when the stored value is not a clock time.
    pub fn window_for(
        &self,
        times: &PrayerTimes,
        prayer: PrayerName,
    ) -> Result<PrayerWindow, AutopilotError> {
        let clock = times.clock_time(prayer)?;
        let prayer_at = times.date.and_time(clock).and_utc();
        let buffer = self.buffers.get(prayer);

        Ok(PrayerWindow {
            date: times.date,
            prayer,
            prayer_at,
            start: prayer_at - Duration::minutes(buffer.pre),
            end: prayer_at + Duration::minutes(buffer.post),
            pre_buffer_min: buffer.pre,
            post_buffer_min: buffer.post,
        })
    }

    /// Build every window available for the day, in prayer order.
    ///
    /// Prayers without a usable time are skipped, never guessed.
    pub fn build(&self, times: &PrayerTimes) -> Vec<PrayerWindow> {
        PrayerName::ALL
            .iter()
            .filter_map(|&prayer| match self.window_for(times, prayer) {
                Ok(window) => Some(window),
                Err(e) => {
                    tracing::debug!(date = %times.date, %prayer, error = %e, "skipping prayer window");
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    #[test]
    fn isha_window_uses_asymmetric_buffers() {
        let times = PrayerTimes::new(day()).with(PrayerName::Isha, "19:20");
        let window = WindowBuilder::default()
            .window_for(&times, PrayerName::Isha)
            .unwrap();

        assert_eq!(window.start, Utc.with_ymd_and_hms(2026, 3, 1, 19, 10, 0).unwrap());
        assert_eq!(window.end, Utc.with_ymd_and_hms(2026, 3, 1, 19, 40, 0).unwrap());
        assert_eq!(window.pre_buffer_min, 10);
        assert_eq!(window.post_buffer_min, 20);
    }

    #[test]
    fn default_buffer_table() {
        let table = BufferTable::default();
        assert_eq!(table.get(PrayerName::Fajr), PrayerBuffer::new(15, 30));
        assert_eq!(table.get(PrayerName::Dhuhr), PrayerBuffer::new(10, 20));
        assert_eq!(table.get(PrayerName::Asr), PrayerBuffer::new(10, 20));
        assert_eq!(table.get(PrayerName::Maghrib), PrayerBuffer::new(10, 15));
        assert_eq!(table.get(PrayerName::Isha), PrayerBuffer::new(10, 20));
    }

    #[test]
    fn build_skips_missing_prayers_and_keeps_order() {
        let times = PrayerTimes::new(day())
            .with(PrayerName::Isha, "19:20")
            .with(PrayerName::Fajr, "05:00")
            .with(PrayerName::Asr, "not-a-time");

        let windows = WindowBuilder::default().build(&times);
        let names: Vec<_> = windows.iter().map(|w| w.prayer).collect();
        assert_eq!(names, vec![PrayerName::Fajr, PrayerName::Isha]);
    }

    #[test]
    fn fajr_window_can_start_on_previous_day() {
        let times = PrayerTimes::new(day()).with(PrayerName::Fajr, "00:05");
        let window = WindowBuilder::default()
            .window_for(&times, PrayerName::Fajr)
            .unwrap();
        assert_eq!(window.start, Utc.with_ymd_and_hms(2026, 2, 28, 23, 50, 0).unwrap());
        assert_eq!(window.date, day());
    }

    #[test]
    fn custom_buffers_are_applied() {
        let mut table = BufferTable::default();
        table.maghrib = PrayerBuffer::new(5, 40);
        let times = PrayerTimes::new(day()).with(PrayerName::Maghrib, "18:00");
        let window = WindowBuilder::new(table)
            .window_for(&times, PrayerName::Maghrib)
            .unwrap();
        assert_eq!(window.start, Utc.with_ymd_and_hms(2026, 3, 1, 17, 55, 0).unwrap());
        assert_eq!(window.end, Utc.with_ymd_and_hms(2026, 3, 1, 18, 40, 0).unwrap());
    }
}
