//! Per-cycle coaching decisions.
//!
//! [`CoachEngine::decide`] runs one cycle for one session: it records what
//! the UI displayed, respects an active hold, classifies the latest prospect
//! utterance, updates the streak counters, and produces the next
//! [`DecisionPayload`]. Every cycle ends in exactly one of: end call, hold,
//! return from a resolved objection, rebuttal, or the current key question
//! followed by a queued advance.

use std::sync::Arc;

use callcoach_core::{
    Category, DecisionNote, DecisionPayload, EndReason, Mode, Reaction, Signal, Timestamp, Turn,
};

use crate::catalog::Catalog;
use crate::classifier::{LexicalClassifier, SignalExtractor};
use crate::error::EngineError;
use crate::session::Session;

/// Counted end-call requests that end the call.
pub const END_INTENT_LIMIT: u32 = 2;

/// Consecutive unresolved objections that end the call.
pub const OBJECTION_LIMIT: u32 = 3;

/// Prompt id reported with every end-call payload.
pub const END_CALL_PROMPT_ID: &str = "END_CALL";

/// Decision engine over an immutable catalog and a signal extractor.
pub struct CoachEngine<C: SignalExtractor = LexicalClassifier> {
    catalog: Arc<Catalog>,
    classifier: C,
    hold_ms: i64,
}

impl CoachEngine<LexicalClassifier> {
    /// Engine backed by the keyword classifier.
    pub fn new(catalog: Arc<Catalog>, hold_ms: u64) -> Self {
        Self::with_classifier(catalog, LexicalClassifier::new(), hold_ms)
    }
}

impl<C: SignalExtractor> CoachEngine<C> {
    pub fn with_classifier(catalog: Arc<Catalog>, classifier: C, hold_ms: u64) -> Self {
        Self {
            catalog,
            classifier,
            hold_ms: i64::try_from(hold_ms).unwrap_or(i64::MAX),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn hold_ms(&self) -> i64 {
        self.hold_ms
    }

    /// Run one decision cycle against `session`.
    ///
    /// The caller must hold the session's lock for the whole call so that
    /// cycles for the same call never interleave.
    pub fn decide(
        &self,
        session: &mut Session,
        displayed_turns: &[Turn],
        now: Timestamp,
    ) -> Result<DecisionPayload, EngineError> {
        session.displayed_transcript = displayed_turns.to_vec();
        session.last_decision_at = Some(now);

        if session.is_ended() {
            let reason = session.end_reason;
            let mut payload = self.end_call_payload(reason);
            payload.note = Some(DecisionNote::CallAlreadyEnded);
            return Ok(payload);
        }

        if let Some(remaining) = session.hold_remaining(now) {
            tracing::debug!(call_id = %session.call_id, remaining, "Holding current prompt");
            let prompt = self.current_text(session);
            let mut payload =
                DecisionPayload::new(session.mode(), session.current_prompt_id.clone(), prompt)
                    .with_note(DecisionNote::HoldingBeforeAdvance);
            payload.hold_ms_remaining = Some(remaining);
            return Ok(payload);
        }
        session.pending_advance_at = None;

        let signal = self.classifier.classify(
            displayed_turns,
            session.current_prompt_id.as_deref(),
            session.mode(),
        );
        tracing::debug!(
            call_id = %session.call_id,
            mode = %session.mode(),
            reaction = ?signal.reaction,
            category = ?signal.objection_category,
            end_intent = signal.end_intent,
            resolved = signal.objection_resolved,
            "Decision cycle"
        );

        track_end_intent(session, &signal);
        if let Some(reason) = escalation(session) {
            return self.end_call(session, reason, &signal);
        }

        if session.mode() == Mode::Objection && signal.objection_resolved {
            return self.return_from_objection(session, &signal);
        }

        if signal.reaction == Reaction::Negative {
            return self.rebut(session, &signal);
        }

        self.ask_or_advance(session, &signal, now)
    }

    fn end_call(
        &self,
        session: &mut Session,
        reason: EndReason,
        signal: &Signal,
    ) -> Result<DecisionPayload, EngineError> {
        session.end_call(reason)?;
        tracing::info!(
            call_id = %session.call_id,
            %reason,
            objection_streak = session.objection_streak,
            end_call_intent_streak = session.end_call_intent_streak,
            "Ending call"
        );
        Ok(self
            .end_call_payload(Some(reason))
            .with_confidence(signal.confidence))
    }

    fn return_from_objection(
        &self,
        session: &mut Session,
        signal: &Signal,
    ) -> Result<DecisionPayload, EngineError> {
        session.objection_streak = 0;
        session.set_mode(Mode::KeyQuestion)?;

        let prompt = self.current_text(session);
        let mut payload =
            DecisionPayload::new(Mode::KeyQuestion, session.current_prompt_id.clone(), prompt)
                .with_confidence(signal.confidence)
                .with_note(DecisionNote::ObjectionResolvedReturnToSameKeyQuestion);
        payload.preface = Some(self.catalog.continue_phrase().to_string());
        Ok(payload)
    }

    fn rebut(
        &self,
        session: &mut Session,
        signal: &Signal,
    ) -> Result<DecisionPayload, EngineError> {
        session.set_mode(Mode::Objection)?;
        session.objection_streak += 1;
        // The script position is frozen until the objection resolves.
        session.next_queued = None;

        if let Some(reason) = escalation(session) {
            return self.end_call(session, reason, signal);
        }

        let streak = session.objection_streak;
        let category = signal.objection_category.unwrap_or(Category::NotInterested);

        let payload = match self.catalog.rebuttal(category) {
            Some(rebuttal) => {
                let mut payload = DecisionPayload::new(
                    Mode::Objection,
                    Some(format!("OBJ_{}_{}", category, streak)),
                    rebuttal.prompt,
                )
                .with_confidence(signal.confidence);
                payload.alternatives = Some(rebuttal.alternatives);
                payload.objection_category = Some(category);
                payload
            }
            None => {
                tracing::warn!(call_id = %session.call_id, %category, "No rebuttal bank, using fallback line");
                DecisionPayload::new(
                    Mode::Objection,
                    Some(format!("OBJ_unknown_{}", streak)),
                    self.catalog.fallback_line(),
                )
                .with_confidence(signal.confidence)
                .with_note(DecisionNote::GenericObjectionFallback)
            }
        };
        Ok(payload)
    }

    fn ask_or_advance(
        &self,
        session: &mut Session,
        signal: &Signal,
        now: Timestamp,
    ) -> Result<DecisionPayload, EngineError> {
        session.objection_streak = 0;
        session.set_mode(Mode::KeyQuestion)?;

        if self.catalog.question(&session.section, session.key_index).is_none() {
            self.recover_position(session);
        }
        let current = self
            .catalog
            .question(&session.section, session.key_index)
            .cloned();

        if session.current_prompt_id.is_none() {
            if let Some(question) = current {
                session.current_prompt_id = Some(question.id.clone());
                return Ok(DecisionPayload::new(
                    Mode::KeyQuestion,
                    Some(question.id),
                    question.text,
                )
                .with_confidence(signal.confidence)
                .with_note(DecisionNote::StartOrRecoverKeyQuestion));
            }
        }

        let next = self.catalog.next_after(&session.section, session.key_index);
        session.pending_advance_at = Some(now.saturating_add(self.hold_ms));
        session.next_queued = next.clone();

        let prompt = current.map(|q| q.text).unwrap_or_default();
        let mut payload =
            DecisionPayload::new(Mode::KeyQuestion, session.current_prompt_id.clone(), prompt)
                .with_confidence(signal.confidence)
                .with_note(DecisionNote::HoldingThenAdvance);
        payload.delay_ms = Some(self.hold_ms);
        payload.queued_next = next;
        Ok(payload)
    }

    fn end_call_payload(&self, reason: Option<EndReason>) -> DecisionPayload {
        let mut payload = DecisionPayload::new(
            Mode::EndCall,
            Some(END_CALL_PROMPT_ID.to_string()),
            self.catalog.end_call_phrase(),
        );
        payload.should_end_call = true;
        payload.reason = reason;
        payload
    }

    fn current_text(&self, session: &Session) -> String {
        self.catalog
            .question(&session.section, session.key_index)
            .map(|q| q.text.clone())
            .unwrap_or_default()
    }

    // The stored position no longer exists in the catalog.
    fn recover_position(&self, session: &mut Session) {
        if self.catalog.questions(&session.section).is_empty() {
            tracing::warn!(call_id = %session.call_id, section = %session.section, "Unknown section, restarting script");
            session.section = self.catalog.first_section_id().to_string();
        }
        session.key_index = 0;
        session.current_prompt_id = None;
    }
}

/// Commit a queued advance, if any. Returns whether the position moved.
///
/// Only a session asking key questions can advance.
pub fn apply_queued_advance(session: &mut Session) -> bool {
    if session.mode() != Mode::KeyQuestion {
        return false;
    }
    let Some(next) = session.next_queued.take() else {
        return false;
    };
    tracing::debug!(
        call_id = %session.call_id,
        section = %next.section,
        key_index = next.key_index,
        prompt_id = %next.id,
        "Advancing to queued question"
    );
    session.section = next.section;
    session.key_index = next.key_index;
    session.current_prompt_id = Some(next.id);
    true
}

// One intervening cycle in objection mode is tolerated between two end-call
// requests; a second non-end-intent cycle clears the count.
fn track_end_intent(session: &mut Session, signal: &Signal) {
    if signal.end_intent {
        session.end_call_intent_streak += 1;
        session.end_intent_grace = true;
    } else if session.end_intent_grace && session.mode() == Mode::Objection {
        session.end_intent_grace = false;
    } else {
        session.end_call_intent_streak = 0;
        session.end_intent_grace = false;
    }
}

fn escalation(session: &Session) -> Option<EndReason> {
    if session.end_call_intent_streak >= END_INTENT_LIMIT {
        Some(EndReason::ProspectEndIntentTwice)
    } else if session.objection_streak >= OBJECTION_LIMIT {
        Some(EndReason::ThreeObjectionsFailed)
    } else {
        None
    }
}
