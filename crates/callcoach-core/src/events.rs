use serde::{Deserialize, Serialize};

use crate::types::{DecisionPayload, Turn};

/// Events fanned out to every viewer attached to a call.
///
/// Serialized as `{ "type": "...", "payload": { ... } }`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum CoachEvent {
    /// A transcript turn was ingested for the call.
    Transcript(Turn),
    /// The engine produced a new decision for the call.
    Coach(DecisionPayload),
    /// Connection-level notice (e.g. the listener was attached).
    System(SystemNotice),
}

/// Payload of a `system` event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemNotice {
    pub message: String,
    pub call_id: String,
}

impl CoachEvent {
    /// The notice sent to a listener right after it attaches.
    pub fn connected(call_id: impl Into<String>) -> Self {
        CoachEvent::System(SystemNotice {
            message: "connected".to_string(),
            call_id: call_id.into(),
        })
    }

    /// Event type tag as it appears on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            CoachEvent::Transcript(_) => "transcript",
            CoachEvent::Coach(_) => "coach",
            CoachEvent::System(_) => "system",
        }
    }
}
