//! # Oryxa Autopilot
//!
//! Conflict detection and autopilot resolution for events that clash with
//! the owner's prayer times. All operations are available through the
//! `oryxa-cli` binary; any other front end is a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Prayer windows**: per-date prayer clock times widened by asymmetric
//!   pre/post buffers
//! - **Detection**: overlaps between stored events and windows become
//!   `open` conflicts, idempotently
//! - **Decisions**: a rule table blended with confidence learned from the
//!   owner's past answers, routed through a consent threshold
//! - **Apply/Undo**: optimistic, versioned event writes with an immutable
//!   audit ledger and single-use undo tokens
//! - **Storage**: SQLite for state and history, TOML for configuration
//!
//! ## Key Components
//!
//! - [`ConflictDetector`]: builds windows and records conflicts
//! - [`Autopilot`]: one bounded, per-item-isolated resolution run
//! - [`Ledger`]: audit trail and undo
//! - [`AutopilotDb`]: persistence
//! - [`AutopilotConfig`]: configuration management

pub mod conflict;
pub mod consent;
pub mod decision;
pub mod engine;
pub mod error;
pub mod event;
pub mod feedback;
pub mod learning;
pub mod ledger;
pub mod notify;
pub mod patch;
pub mod prayer;
pub mod storage;

pub use conflict::{overlap_minutes, Conflict, ConflictDetector, ConflictStatus, DetectionSummary};
pub use consent::{ConsentGate, Route};
pub use decision::{blend_confidence, Action, Decision, DecisionEngine, Patch};
pub use engine::{Autopilot, ItemAction, ItemResult, RunReport};
pub use error::{AutopilotError, ConfigError, CoreError, DatabaseError, Result, ValidationError};
pub use event::{Event, EventStatus, Transparency};
pub use feedback::{accept_suggestion, reject_suggestion, AcceptOutcome};
pub use learning::{ConfidenceSource, ContextBucket, LearnedConfidenceModel, LearningStats, UserDecision};
pub use ledger::{ActionKind, AutopilotAction, Ledger, UndoOutcome};
pub use notify::{Notification, NotificationKind, NotificationPayload};
pub use patch::{apply_patch, PatchApplier, PatchOutcome};
pub use prayer::{BufferTable, PrayerBuffer, PrayerName, PrayerTimes, PrayerWindow, WindowBuilder};
pub use storage::{AutopilotConfig, AutopilotDb};
