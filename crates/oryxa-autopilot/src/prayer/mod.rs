//! Daily prayer times and the windows derived from them.

mod window;

pub use window::{BufferTable, PrayerBuffer, PrayerWindow, WindowBuilder};

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AutopilotError;

/// One of the five daily prayers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrayerName {
    Fajr,
    Dhuhr,
    Asr,
    Maghrib,
    Isha,
}

impl PrayerName {
    /// All prayers in chronological order.
    pub const ALL: [PrayerName; 5] = [
        PrayerName::Fajr,
        PrayerName::Dhuhr,
        PrayerName::Asr,
        PrayerName::Maghrib,
        PrayerName::Isha,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PrayerName::Fajr => "fajr",
            PrayerName::Dhuhr => "dhuhr",
            PrayerName::Asr => "asr",
            PrayerName::Maghrib => "maghrib",
            PrayerName::Isha => "isha",
        }
    }

    /// Parse a stored or user-supplied name (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fajr" => Some(PrayerName::Fajr),
            "dhuhr" | "zuhr" => Some(PrayerName::Dhuhr),
            "asr" => Some(PrayerName::Asr),
            "maghrib" => Some(PrayerName::Maghrib),
            "isha" => Some(PrayerName::Isha),
            _ => None,
        }
    }
}

impl fmt::Display for PrayerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrayerName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown prayer: {s}"))
    }
}

/// The raw prayer-time row for one owner and date.
///
/// Times are `HH:MM` clock strings as delivered by the prayer-time source.
/// Any of them may be missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrayerTimes {
    pub date: NaiveDate,
    #[serde(default)]
    pub fajr: Option<String>,
    #[serde(default)]
    pub dhuhr: Option<String>,
    #[serde(default)]
    pub asr: Option<String>,
    #[serde(default)]
    pub maghrib: Option<String>,
    #[serde(default)]
    pub isha: Option<String>,
}

impl PrayerTimes {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            fajr: None,
            dhuhr: None,
            asr: None,
            maghrib: None,
            isha: None,
        }
    }

    /// Builder-style setter used by callers seeding a full day.
    pub fn with(mut self, prayer: PrayerName, hhmm: impl Into<String>) -> Self {
        self.set(prayer, Some(hhmm.into()));
        self
    }

    pub fn get(&self, prayer: PrayerName) -> Option<&str> {
        let value = match prayer {
            PrayerName::Fajr => &self.fajr,
            PrayerName::Dhuhr => &self.dhuhr,
            PrayerName::Asr => &self.asr,
            PrayerName::Maghrib => &self.maghrib,
            PrayerName::Isha => &self.isha,
        };
        value.as_deref().filter(|s| !s.trim().is_empty())
    }

    pub fn set(&mut self, prayer: PrayerName, value: Option<String>) {
        let slot = match prayer {
            PrayerName::Fajr => &mut self.fajr,
            PrayerName::Dhuhr => &mut self.dhuhr,
            PrayerName::Asr => &mut self.asr,
            PrayerName::Maghrib => &mut self.maghrib,
            PrayerName::Isha => &mut self.isha,
        };
        *slot = value;
    }

    /// Clock time of `prayer`, or `MissingPrayerTime` / `InvalidPrayerTime`.
    pub fn clock_time(&self, prayer: PrayerName) -> Result<NaiveTime, AutopilotError> {
        let raw = self.get(prayer).ok_or(AutopilotError::MissingPrayerTime {
            prayer,
            date: self.date,
        })?;
        parse_clock(raw).ok_or_else(|| AutopilotError::InvalidPrayerTime {
            prayer,
            value: raw.to_string(),
        })
    }
}

/// Parse `HH:MM` (optionally `HH:MM:SS`), ignoring any trailing zone label
/// such as `"04:51 (EET)"`.
pub fn parse_clock(raw: &str) -> Option<NaiveTime> {
    let clock = raw.split_whitespace().next()?;
    NaiveTime::parse_from_str(clock, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(clock, "%H:%M:%S"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_prayer_names() {
        assert_eq!(PrayerName::parse("Isha"), Some(PrayerName::Isha));
        assert_eq!(PrayerName::parse("zuhr"), Some(PrayerName::Dhuhr));
        assert_eq!(PrayerName::parse("tahajjud"), None);
        assert_eq!("maghrib".parse::<PrayerName>().unwrap(), PrayerName::Maghrib);
    }

    #[test]
    fn parse_clock_formats() {
        assert_eq!(parse_clock("04:51"), NaiveTime::from_hms_opt(4, 51, 0));
        assert_eq!(parse_clock("19:20:30"), NaiveTime::from_hms_opt(19, 20, 30));
        assert_eq!(parse_clock("04:51 (EET)"), NaiveTime::from_hms_opt(4, 51, 0));
        assert_eq!(parse_clock("25:00"), None);
        assert_eq!(parse_clock(""), None);
    }

    #[test]
    fn missing_and_blank_times_are_reported() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let times = PrayerTimes::new(date)
            .with(PrayerName::Fajr, "05:01")
            .with(PrayerName::Asr, "  ");

        assert!(times.clock_time(PrayerName::Fajr).is_ok());
        assert_eq!(
            times.clock_time(PrayerName::Asr),
            Err(AutopilotError::MissingPrayerTime { prayer: PrayerName::Asr, date })
        );
        assert_eq!(
            times.clock_time(PrayerName::Isha),
            Err(AutopilotError::MissingPrayerTime { prayer: PrayerName::Isha, date })
        );
    }

    #[test]
    fn invalid_time_is_not_missing() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let times = PrayerTimes::new(date).with(PrayerName::Dhuhr, "noon");
        assert!(matches!(
            times.clock_time(PrayerName::Dhuhr),
            Err(AutopilotError::InvalidPrayerTime { .. })
        ));
    }
}
