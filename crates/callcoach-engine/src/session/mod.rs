//! Per-call session state.
//!
//! One [`Session`] exists per active call. It is created on first reference
//! and mutated only by the decision engine (and transcript ingestion) while
//! the caller holds that call's lock.

pub mod state_machine;

use serde::Serialize;

use callcoach_core::{EndReason, Mode, QueuedQuestion, Timestamp, Turn};

use crate::error::EngineError;
use crate::session::state_machine::validate_transition;

/// Script position, streak counters, and hold bookkeeping for one call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub call_id: String,
    /// Every ingested turn, in arrival order.
    pub transcript: Vec<Turn>,
    /// Turns the UI last confirmed as rendered.
    pub displayed_transcript: Vec<Turn>,
    mode: Mode,
    /// Current scripted question group.
    pub section: String,
    /// Position within `section`.
    pub key_index: usize,
    /// Consecutive unresolved objection cycles.
    pub objection_streak: u32,
    /// Counted end-call requests.
    pub end_call_intent_streak: u32,
    /// Tolerates one objection cycle between two end-call requests.
    pub end_intent_grace: bool,
    pub current_prompt_id: Option<String>,
    /// While `now` is before this instant the current prompt is held.
    pub pending_advance_at: Option<Timestamp>,
    pub next_queued: Option<QueuedQuestion>,
    /// Set once the session reaches end-call.
    pub end_reason: Option<EndReason>,
    pub created_at: Timestamp,
    pub last_decision_at: Option<Timestamp>,
}

impl Session {
    /// A fresh session at the first question of `first_section`.
    pub fn new(call_id: impl Into<String>, first_section: impl Into<String>, now: Timestamp) -> Self {
        Self {
            call_id: call_id.into(),
            transcript: Vec::new(),
            displayed_transcript: Vec::new(),
            mode: Mode::KeyQuestion,
            section: first_section.into(),
            key_index: 0,
            objection_streak: 0,
            end_call_intent_streak: 0,
            end_intent_grace: false,
            current_prompt_id: None,
            pending_advance_at: None,
            next_queued: None,
            end_reason: None,
            created_at: now,
            last_decision_at: None,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Move to `to`, rejecting transitions the state machine does not allow.
    pub fn set_mode(&mut self, to: Mode) -> Result<(), EngineError> {
        validate_transition(self.mode, to)?;
        if self.mode != to {
            tracing::debug!(call_id = %self.call_id, "Session mode: {} -> {}", self.mode, to);
        }
        self.mode = to;
        Ok(())
    }

    /// Enter the terminal end-call mode. No hold may survive it.
    pub fn end_call(&mut self, reason: EndReason) -> Result<(), EngineError> {
        self.set_mode(Mode::EndCall)?;
        self.end_reason = Some(reason);
        self.pending_advance_at = None;
        self.next_queued = None;
        Ok(())
    }

    pub fn is_ended(&self) -> bool {
        self.mode == Mode::EndCall
    }

    /// Remaining hold in milliseconds, if a hold is active at `now`.
    pub fn hold_remaining(&self, now: Timestamp) -> Option<i64> {
        self.pending_advance_at
            .filter(|deadline| now < *deadline)
            .map(|deadline| deadline.saturating_sub(now))
    }

    /// Append an ingested turn to the full transcript.
    pub fn record_turn(&mut self, turn: Turn) {
        self.transcript.push(turn);
    }
}
