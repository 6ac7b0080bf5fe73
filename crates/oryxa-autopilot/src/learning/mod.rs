//! Learning from the owner's accept/reject feedback.
//!
//! Feedback is bucketed by the context a suggestion was made in so that
//! "make tentative during an evening isha overlap on Fridays" is learned
//! separately from "reschedule a morning fajr clash".

mod model;

pub use model::{acceptance_rate, LearnedConfidenceModel};

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::decision::Action;
use crate::error::Result;
use crate::prayer::PrayerName;

/// Coarse overlap size, matching the decision table's thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapBand {
    /// 10 minutes or less
    Minor,
    /// More than 10, at most 20 minutes
    Moderate,
    /// More than 20 minutes
    Major,
}

impl OverlapBand {
    pub fn from_minutes(overlap_min: i64) -> Self {
        if overlap_min > 20 {
            Self::Major
        } else if overlap_min > 10 {
            Self::Moderate
        } else {
            Self::Minor
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minor => "minor",
            Self::Moderate => "moderate",
            Self::Major => "major",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "minor" => Some(Self::Minor),
            "moderate" => Some(Self::Moderate),
            "major" => Some(Self::Major),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeOfDay {
    /// 05–12 morning, 12–17 afternoon, 17–21 evening, otherwise night.
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=11 => Self::Morning,
            12..=16 => Self::Afternoon,
            17..=20 => Self::Evening,
            _ => Self::Night,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
            Self::Night => "night",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "morning" => Some(Self::Morning),
            "afternoon" => Some(Self::Afternoon),
            "evening" => Some(Self::Evening),
            "night" => Some(Self::Night),
            _ => None,
        }
    }
}

/// The context a suggestion is judged in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextBucket {
    pub prayer: PrayerName,
    pub overlap_band: OverlapBand,
    pub time_of_day: TimeOfDay,
    /// 0 = Sunday ... 6 = Saturday
    pub day_of_week: u32,
}

impl ContextBucket {
    /// Bucket for an event starting at `starts_at` overlapping `prayer` by
    /// `overlap_min` minutes.
    pub fn new(prayer: PrayerName, overlap_min: i64, starts_at: DateTime<Utc>) -> Self {
        Self {
            prayer,
            overlap_band: OverlapBand::from_minutes(overlap_min),
            time_of_day: TimeOfDay::from_hour(starts_at.hour()),
            day_of_week: starts_at.weekday().num_days_from_sunday(),
        }
    }
}

/// The owner's verdict on a suggestion or an applied action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserDecision {
    Accepted,
    Rejected,
}

impl UserDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// Append-only feedback row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningRecord {
    pub owner_id: String,
    pub conflict_id: Option<String>,
    pub suggested_action: Action,
    pub bucket: ContextBucket,
    pub user_decision: UserDecision,
    pub recorded_at: DateTime<Utc>,
}

/// Per-action acceptance summary for the learning dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionStats {
    pub action: Action,
    pub count: u64,
    pub rate: f64,
}

/// Acceptance summary over a trailing window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningStats {
    pub total_decisions: u64,
    pub accepted_count: u64,
    pub rejected_count: u64,
    pub acceptance_rate: f64,
    pub top_actions: Vec<ActionStats>,
}

/// Source of learned confidence for the decision engine.
///
/// Returning `Ok(None)` means there is not enough feedback for this
/// (action, bucket) and the rule-based confidence should stand alone.
pub trait ConfidenceSource {
    fn learned_confidence(
        &self,
        owner_id: &str,
        action: Action,
        bucket: &ContextBucket,
    ) -> Result<Option<f64>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn overlap_bands_follow_decision_thresholds() {
        assert_eq!(OverlapBand::from_minutes(1), OverlapBand::Minor);
        assert_eq!(OverlapBand::from_minutes(10), OverlapBand::Minor);
        assert_eq!(OverlapBand::from_minutes(11), OverlapBand::Moderate);
        assert_eq!(OverlapBand::from_minutes(20), OverlapBand::Moderate);
        assert_eq!(OverlapBand::from_minutes(21), OverlapBand::Major);
    }

    #[test]
    fn time_of_day_boundaries() {
        assert_eq!(TimeOfDay::from_hour(4), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_hour(5), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_hour(12), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::from_hour(17), TimeOfDay::Evening);
        assert_eq!(TimeOfDay::from_hour(21), TimeOfDay::Night);
    }

    #[test]
    fn bucket_uses_sunday_based_weekday() {
        // 2026-03-01 is a Sunday.
        let starts = Utc.with_ymd_and_hms(2026, 3, 1, 19, 0, 0).unwrap();
        let bucket = ContextBucket::new(PrayerName::Isha, 30, starts);
        assert_eq!(bucket.day_of_week, 0);
        assert_eq!(bucket.time_of_day, TimeOfDay::Evening);
        assert_eq!(bucket.overlap_band, OverlapBand::Major);
    }
}
