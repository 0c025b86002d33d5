//! Request-level coaching service.
//!
//! Validates inbound transcript and analyze requests, resolves the call's
//! session, and runs ingestion or a decision cycle under that session's lock.

use std::sync::Arc;

use serde::Deserialize;

use callcoach_core::{
    deserialize_opt_timestamp, now_millis, DecisionPayload, Speaker, Timestamp, Turn,
};

use crate::catalog::Catalog;
use crate::classifier::{LexicalClassifier, SignalExtractor};
use crate::engine::{apply_queued_advance, CoachEngine};
use crate::error::EngineError;
use crate::session::Session;
use crate::store::{lock_session, SessionStore};

/// Action name that commits the queued advance before deciding.
pub const APPLY_QUEUED_ADVANCE: &str = "applyQueuedAdvance";

/// Inbound transcript line.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptInput {
    #[serde(default, alias = "callId")]
    pub session_id: Option<String>,
    #[serde(default, alias = "ts", deserialize_with = "deserialize_opt_timestamp")]
    pub timestamp: Option<Timestamp>,
    #[serde(default)]
    pub speaker: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// Inbound request for one decision cycle.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeInput {
    #[serde(default, alias = "callId")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub displayed_turns: Option<Vec<Turn>>,
    /// Epoch milliseconds; fractions are truncated.
    #[serde(default, deserialize_with = "deserialize_opt_timestamp")]
    pub now: Option<Timestamp>,
    #[serde(default)]
    pub action: Option<String>,
}

/// Session store plus decision engine.
pub struct CoachService<C: SignalExtractor = LexicalClassifier> {
    engine: CoachEngine<C>,
    store: SessionStore,
}

impl CoachService<LexicalClassifier> {
    pub fn new(catalog: Arc<Catalog>, hold_ms: u64) -> Self {
        Self::with_engine(CoachEngine::new(catalog, hold_ms))
    }
}

impl<C: SignalExtractor> CoachService<C> {
    pub fn with_engine(engine: CoachEngine<C>) -> Self {
        let store = SessionStore::new(engine.catalog().first_section_id());
        Self { engine, store }
    }

    pub fn engine(&self) -> &CoachEngine<C> {
        &self.engine
    }

    /// Validate and append a transcript line to its call's session.
    pub fn ingest(&self, input: TranscriptInput) -> Result<(String, Turn), EngineError> {
        let call_id = required(input.session_id, "sessionId")?;
        let speaker: Speaker = required(input.speaker, "speaker")?
            .parse()
            .map_err(|reason| EngineError::InvalidField {
                field: "speaker",
                reason,
            })?;
        let text = required(input.text, "text")?;

        let now = now_millis();
        let turn = Turn {
            timestamp: input.timestamp.unwrap_or(now),
            speaker,
            text,
            confidence: input.confidence,
        };

        let handle = self.store.get_or_create(&call_id, now)?;
        lock_session(&handle).record_turn(turn.clone());
        tracing::debug!(call_id = %call_id, %speaker, "Ingested transcript line");
        Ok((call_id, turn))
    }

    /// Run one decision cycle for the request's call.
    pub fn analyze(&self, input: AnalyzeInput) -> Result<(String, DecisionPayload), EngineError> {
        let call_id = required(input.session_id, "sessionId")?;
        let turns = input
            .displayed_turns
            .ok_or(EngineError::MissingField("displayedTurns"))?;
        let now = input.now.unwrap_or_else(now_millis);

        let handle = self.store.get_or_create(&call_id, now)?;
        let mut session = lock_session(&handle);
        if input.action.as_deref() == Some(APPLY_QUEUED_ADVANCE) {
            apply_queued_advance(&mut session);
        }
        let payload = self.engine.decide(&mut session, &turns, now)?;
        Ok((call_id, payload))
    }

    /// Copy of the call's current session state.
    pub fn snapshot(&self, call_id: &str) -> Result<Session, EngineError> {
        let handle = self.store.get(call_id)?;
        let session = lock_session(&handle);
        Ok(session.clone())
    }

    /// Forget a call. The next reference starts a fresh session.
    pub fn reset(&self, call_id: &str) -> Result<(), EngineError> {
        self.store.remove(call_id)
    }

    pub fn active_sessions(&self) -> usize {
        self.store.len()
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, EngineError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(EngineError::MissingField(field)),
    }
}
