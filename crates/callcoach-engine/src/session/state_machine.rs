//! Mode state machine with validated transitions.
//!
//! Enforces the allowed posture changes for a call session:
//! KeyQuestion <-> Objection, either -> EndCall, EndCall is terminal.

use callcoach_core::Mode;

use crate::error::EngineError;

/// Validate that a mode transition is allowed.
///
/// Valid transitions:
/// - KeyQuestion -> KeyQuestion (positive/neutral cycle)
/// - KeyQuestion -> Objection
/// - KeyQuestion -> EndCall
/// - Objection -> Objection (repeated objection)
/// - Objection -> KeyQuestion (resolved, or positive/neutral cycle)
/// - Objection -> EndCall
pub fn validate_transition(from: Mode, to: Mode) -> Result<(), EngineError> {
    let valid = matches!(
        (from, to),
        (Mode::KeyQuestion, Mode::KeyQuestion)
            | (Mode::KeyQuestion, Mode::Objection)
            | (Mode::KeyQuestion, Mode::EndCall)
            | (Mode::Objection, Mode::Objection)
            | (Mode::Objection, Mode::KeyQuestion)
            | (Mode::Objection, Mode::EndCall)
    );

    if valid {
        Ok(())
    } else {
        Err(EngineError::InvalidTransition(from, to))
    }
}
