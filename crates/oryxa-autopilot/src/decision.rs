//! Remediation decisions for prayer conflicts.
//!
//! The rule table picks an action from the overlap size and event duration,
//! and the learned model (when it has enough feedback) pulls the rule-based
//! confidence towards what the owner actually accepts.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::conflict::Conflict;
use crate::consent::ConsentGate;
use crate::error::Result;
use crate::event::{Event, EventStatus, Transparency};
use crate::learning::{ConfidenceSource, ContextBucket};
use crate::prayer::BufferTable;
use crate::storage::LearningConfig;

/// Shortest duration a shortened event may end up with.
pub const MIN_SHORTENED_MINUTES: i64 = 15;

/// Remediation action for a conflicting event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Reschedule,
    Shorten,
    MakeTransparent,
    MakeTentative,
}

impl Action {
    pub const ALL: [Action; 4] = [
        Action::Reschedule,
        Action::Shorten,
        Action::MakeTransparent,
        Action::MakeTentative,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Reschedule => "reschedule",
            Action::Shorten => "shorten",
            Action::MakeTransparent => "make_transparent",
            Action::MakeTentative => "make_tentative",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "reschedule" => Some(Action::Reschedule),
            "shorten" => Some(Action::Shorten),
            "make_transparent" => Some(Action::MakeTransparent),
            "make_tentative" => Some(Action::MakeTentative),
            _ => None,
        }
    }

    /// Rule-based confidence before any learning is blended in.
    pub fn base_confidence(&self) -> f64 {
        match self {
            Action::Reschedule => 80.0,
            Action::Shorten => 70.0,
            Action::MakeTransparent => 65.0,
            Action::MakeTentative => 60.0,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single field-group mutation of an event.
///
/// Serialized externally tagged, e.g. `{"shift_minutes":20}` or
/// `{"transparency":"transparent"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Patch {
    /// Move the whole event by this many minutes.
    ShiftMinutes(i64),
    /// Keep the start, set the duration.
    DurationMinutes(i64),
    Transparency(Transparency),
    Status(EventStatus),
}

impl Patch {
    /// The patch that reverts `self` when applied to the result of applying
    /// `self` to `before`.
    pub fn inverse(&self, before: &Event) -> Patch {
        match self {
            Patch::ShiftMinutes(minutes) => Patch::ShiftMinutes(-minutes),
            Patch::DurationMinutes(_) => Patch::DurationMinutes(before.duration_min),
            Patch::Transparency(_) => Patch::Transparency(before.transparency),
            Patch::Status(_) => Patch::Status(before.status),
        }
    }
}

/// Output of the rule table for one conflict.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutcome {
    pub action: Action,
    pub base_confidence: f64,
    pub patch: Patch,
    pub reason: String,
}

/// Apply the decision table to `conflict` on `event`.
pub fn decide_rule(conflict: &Conflict, event: &Event, buffers: &BufferTable) -> RuleOutcome {
    let overlap = conflict.overlap_min;
    let buffer = buffers.get(conflict.prayer);

    let (action, patch, reason) = if overlap > 20 {
        let new_start = conflict.window_end + Duration::minutes(buffer.post);
        let delta_secs = (new_start - event.starts_at).num_seconds();
        // Round up to whole minutes so the event never lands inside the buffer.
        let shift = (delta_secs + 59).div_euclid(60);
        (
            Action::Reschedule,
            Patch::ShiftMinutes(shift),
            format!(
                "{overlap} min overlap with {}; move start by {shift} min",
                conflict.prayer
            ),
        )
    } else if overlap > 10 && event.duration_min > 30 {
        let minutes = (event.duration_min - overlap - buffer.pre).max(MIN_SHORTENED_MINUTES);
        (
            Action::Shorten,
            Patch::DurationMinutes(minutes),
            format!(
                "{overlap} min overlap with {}; shorten to {minutes} min",
                conflict.prayer
            ),
        )
    } else if overlap > 10 {
        (
            Action::MakeTransparent,
            Patch::Transparency(Transparency::Transparent),
            format!(
                "{overlap} min overlap with {} on a short event; mark as free",
                conflict.prayer
            ),
        )
    } else {
        (
            Action::MakeTentative,
            Patch::Status(EventStatus::Tentative),
            format!("minor {overlap} min overlap with {}; mark tentative", conflict.prayer),
        )
    };

    RuleOutcome {
        action,
        base_confidence: action.base_confidence(),
        patch,
        reason,
    }
}

/// Blend rule-based and learned confidence, clamped to `0..=100` and
/// rounded to two decimals.
pub fn blend_confidence(base: f64, learned: Option<f64>, learned_weight: f64) -> f64 {
    let weight = if learned_weight.is_finite() {
        learned_weight.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let raw = match learned.filter(|l| l.is_finite()) {
        Some(learned) => (1.0 - weight) * base + weight * learned,
        None => base,
    };
    if !raw.is_finite() {
        return 0.0;
    }
    (raw.clamp(0.0, 100.0) * 100.0).round() / 100.0
}

/// A decided remediation for one conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub action: Action,
    pub confidence: f64,
    pub requires_consent: bool,
    pub patch: Patch,
    pub undo_patch: Patch,
    pub reason: String,
    pub base_confidence: f64,
    pub learned_confidence: Option<f64>,
}

/// Picks an action and its final confidence.
pub struct DecisionEngine<S> {
    source: S,
    buffers: BufferTable,
    learned_weight: f64,
    gate: ConsentGate,
}

impl<S: ConfidenceSource> DecisionEngine<S> {
    pub fn new(source: S, buffers: BufferTable, learning: &LearningConfig, gate: ConsentGate) -> Self {
        Self {
            source,
            buffers,
            learned_weight: learning.learned_weight,
            gate,
        }
    }

    pub fn gate(&self) -> &ConsentGate {
        &self.gate
    }

    /// Decide how to resolve `conflict` given the event's current state.
    ///
    /// # Errors
    /// Propagates failures of the learned confidence lookup.
    pub fn decide(&self, conflict: &Conflict, event: &Event) -> Result<Decision> {
        let rule = decide_rule(conflict, event, &self.buffers);
        let bucket = ContextBucket::new(conflict.prayer, conflict.overlap_min, event.starts_at);
        let learned = self
            .source
            .learned_confidence(&conflict.owner_id, rule.action, &bucket)?
            .filter(|l| l.is_finite());

        let confidence = blend_confidence(rule.base_confidence, learned, self.learned_weight);
        let decision = Decision {
            action: rule.action,
            confidence,
            requires_consent: self.gate.requires_consent(confidence),
            undo_patch: rule.patch.inverse(event),
            patch: rule.patch,
            reason: rule.reason,
            base_confidence: rule.base_confidence,
            learned_confidence: learned,
        };

        tracing::debug!(
            conflict_id = %conflict.id,
            action = decision.action.as_str(),
            confidence = decision.confidence,
            learned = ?decision.learned_confidence,
            requires_consent = decision.requires_consent,
            "decided"
        );
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prayer::{PrayerName, PrayerTimes, WindowBuilder};
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use proptest::prelude::*;

    struct Fixed(Option<f64>);

    impl ConfidenceSource for Fixed {
        fn learned_confidence(&self, _: &str, _: Action, _: &ContextBucket) -> Result<Option<f64>> {
            Ok(self.0)
        }
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, h, m, 0).unwrap()
    }

    fn isha_conflict(event: &Event) -> Conflict {
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let times = PrayerTimes::new(date).with(PrayerName::Isha, "19:20");
        let window = WindowBuilder::default().window_for(&times, PrayerName::Isha).unwrap();
        let overlap = window.overlap_minutes(event.starts_at, event.ends_at);
        Conflict::open("u1", event.id.clone(), &window, overlap, at(12, 0))
    }

    fn engine(learned: Option<f64>) -> DecisionEngine<Fixed> {
        DecisionEngine::new(
            Fixed(learned),
            BufferTable::default(),
            &LearningConfig::default(),
            ConsentGate::new(70.0),
        )
    }

    #[test]
    fn large_overlap_reschedules_past_window() {
        let event = Event::new("u1", "Dinner", at(19, 0), at(19, 45)).unwrap();
        let conflict = isha_conflict(&event);
        assert_eq!(conflict.overlap_min, 30);

        let decision = engine(None).decide(&conflict, &event).unwrap();
        assert_eq!(decision.action, Action::Reschedule);
        assert_eq!(decision.confidence, 80.0);
        assert!(!decision.requires_consent);
        // 19:40 window end + 20 min post buffer = 20:00, one hour after 19:00.
        assert_eq!(decision.patch, Patch::ShiftMinutes(60));
        assert_eq!(decision.undo_patch, Patch::ShiftMinutes(-60));
    }

    #[test]
    fn moderate_overlap_on_long_event_shortens() {
        let event = Event::new("u1", "Review", at(19, 25), at(20, 10)).unwrap();
        let conflict = isha_conflict(&event);
        assert_eq!(conflict.overlap_min, 15);

        let decision = engine(None).decide(&conflict, &event).unwrap();
        assert_eq!(decision.action, Action::Shorten);
        assert_eq!(decision.confidence, 70.0);
        assert_eq!(decision.learned_confidence, None);
        assert_eq!(decision.patch, Patch::DurationMinutes(20));
        assert_eq!(decision.undo_patch, Patch::DurationMinutes(45));
    }

    #[test]
    fn shorten_never_goes_below_floor() {
        let event = Event::new("u1", "Sync", at(18, 55), at(19, 30)).unwrap();
        let mut conflict = isha_conflict(&event);
        conflict.overlap_min = 20;
        let rule = decide_rule(&conflict, &event, &BufferTable::default());
        assert_eq!(rule.patch, Patch::DurationMinutes(MIN_SHORTENED_MINUTES));
    }

    #[test]
    fn moderate_overlap_on_short_event_goes_transparent() {
        let event = Event::new("u1", "Call", at(19, 25), at(19, 45)).unwrap();
        let conflict = isha_conflict(&event);
        assert_eq!(conflict.overlap_min, 15);
        let decision = engine(None).decide(&conflict, &event).unwrap();
        assert_eq!(decision.action, Action::MakeTransparent);
        assert_eq!(decision.confidence, 65.0);
        assert!(decision.requires_consent);
        assert_eq!(decision.patch, Patch::Transparency(Transparency::Transparent));
        assert_eq!(decision.undo_patch, Patch::Transparency(Transparency::Opaque));
    }

    #[test]
    fn minor_overlap_with_learning_auto_applies() {
        let event = Event::new("u1", "Gym", at(19, 35), at(20, 30)).unwrap();
        let conflict = isha_conflict(&event);
        assert_eq!(conflict.overlap_min, 5);

        let without = engine(None).decide(&conflict, &event).unwrap();
        assert_eq!(without.action, Action::MakeTentative);
        assert_eq!(without.confidence, 60.0);
        assert!(without.requires_consent);

        let with = engine(Some(90.0)).decide(&conflict, &event).unwrap();
        assert_eq!(with.confidence, 81.0);
        assert!(!with.requires_consent);
        assert_eq!(with.undo_patch, Patch::Status(EventStatus::Confirmed));
    }

    #[test]
    fn blend_ignores_non_finite_learning() {
        assert_eq!(blend_confidence(60.0, Some(f64::NAN), 0.7), 60.0);
        assert_eq!(blend_confidence(60.0, Some(250.0), 1.0), 100.0);
        assert_eq!(blend_confidence(60.0, Some(-40.0), 1.0), 0.0);
    }

    #[test]
    fn patch_wire_format() {
        assert_eq!(serde_json::to_string(&Patch::ShiftMinutes(20)).unwrap(), r#"{"shift_minutes":20}"#);
        assert_eq!(
            serde_json::to_string(&Patch::Transparency(Transparency::Transparent)).unwrap(),
            r#"{"transparency":"transparent"}"#
        );
        let parsed: Patch = serde_json::from_str(r#"{"status":"tentative"}"#).unwrap();
        assert_eq!(parsed, Patch::Status(EventStatus::Tentative));
    }

    #[test]
    fn action_strings_roundtrip() {
        for action in Action::ALL {
            assert_eq!(Action::parse(action.as_str()), Some(action));
        }
        assert_eq!(Action::parse("delete"), None);
    }

    proptest! {
        #[test]
        fn blended_confidence_is_always_in_range(
            base in -1_000.0f64..1_000.0,
            learned in proptest::option::of(-1_000.0f64..1_000.0),
            weight in -2.0f64..2.0,
        ) {
            let c = blend_confidence(base, learned, weight);
            prop_assert!((0.0..=100.0).contains(&c));
        }
    }
}
