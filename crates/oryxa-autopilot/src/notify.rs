//! Notification payloads for the outbox.
//!
//! Delivery is someone else's job; the engine only writes rows that an
//! external notifier picks up.

use serde::{Deserialize, Serialize};

use crate::conflict::Conflict;
use crate::decision::{Action, Decision, Patch};
use crate::event::Event;

/// Priority of applied-action notices; lower is more urgent.
pub const PRIORITY_APPLIED: i64 = 1;
pub const PRIORITY_SUGGESTED: i64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    AutopilotApplied,
    AutopilotSuggest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub conflict_id: String,
    pub event_id: String,
    #[serde(default)]
    pub event_title: String,
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub undo_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<Patch>,
    pub confidence: f64,
}

/// An outbox entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub owner_id: String,
    pub title: String,
    pub body: String,
    pub priority: i64,
    pub payload: NotificationPayload,
}

impl Notification {
    /// Notice that `decision` was applied, carrying the token to undo it.
    pub fn applied(conflict: &Conflict, event: &Event, decision: &Decision, undo_token: &str) -> Self {
        Self {
            owner_id: conflict.owner_id.clone(),
            title: "Conflict resolved automatically".into(),
            body: decision.reason.clone(),
            priority: PRIORITY_APPLIED,
            payload: NotificationPayload {
                kind: NotificationKind::AutopilotApplied,
                conflict_id: conflict.id.clone(),
                event_id: event.id.clone(),
                event_title: event.title.clone(),
                action: decision.action,
                undo_token: Some(undo_token.to_string()),
                patch: None,
                confidence: decision.confidence,
            },
        }
    }

    /// Proposal awaiting the owner's consent. The token dismisses it.
    pub fn suggested(conflict: &Conflict, event: &Event, decision: &Decision, undo_token: &str) -> Self {
        Self {
            owner_id: conflict.owner_id.clone(),
            title: "Suggested fix for a prayer conflict".into(),
            body: decision.reason.clone(),
            priority: PRIORITY_SUGGESTED,
            payload: NotificationPayload {
                kind: NotificationKind::AutopilotSuggest,
                conflict_id: conflict.id.clone(),
                event_id: event.id.clone(),
                event_title: event.title.clone(),
                action: decision.action,
                undo_token: Some(undo_token.to_string()),
                patch: Some(decision.patch),
                confidence: decision.confidence,
            },
        }
    }
}
