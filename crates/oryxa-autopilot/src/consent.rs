//! Consent gate: whether a decision may be applied without asking.

use serde::{Deserialize, Serialize};

use crate::storage::ConsentConfig;

/// Where a decision goes next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// Mutate the event now.
    AutoApply,
    /// Record a proposal and wait for the owner.
    Propose,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsentGate {
    threshold: f64,
}

impl Default for ConsentGate {
    fn default() -> Self {
        Self::new(70.0)
    }
}

impl ConsentGate {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn from_config(config: &ConsentConfig) -> Self {
        Self::new(config.threshold)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn requires_consent(&self, confidence: f64) -> bool {
        confidence < self.threshold
    }

    /// Route a decision. Confident decisions still fall back to a proposal
    /// once the owner's auto-apply quota for the day is used up.
    pub fn route(&self, confidence: f64, quota_available: bool) -> Route {
        if self.requires_consent(confidence) || !quota_available {
            Route::Propose
        } else {
            Route::AutoApply
        }
    }
}
