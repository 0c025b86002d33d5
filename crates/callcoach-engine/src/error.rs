//! Error types for the coaching engine.

use callcoach_core::error::CoachError;
use callcoach_core::Mode;

/// Errors from catalog loading, session handling, and request validation.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("invalid field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("invalid catalog: {0}")]
    InvalidCatalog(String),
    #[error("invalid mode transition: {0} -> {1}")]
    InvalidTransition(Mode, Mode),
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("session lock poisoned: {0}")]
    LockPoisoned(String),
}

impl EngineError {
    /// Whether the error was caused by the caller's input rather than the service.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            EngineError::MissingField(_) | EngineError::InvalidField { .. }
        )
    }
}

impl From<EngineError> for CoachError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidCatalog(msg) => CoachError::Catalog(msg),
            other => CoachError::Api(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_display() {
        let err = EngineError::MissingField("sessionId");
        assert_eq!(err.to_string(), "missing required field: sessionId");

        let err = EngineError::InvalidField {
            field: "speaker",
            reason: "unknown speaker 'bot'".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid field 'speaker': unknown speaker 'bot'"
        );

        let err = EngineError::InvalidTransition(Mode::EndCall, Mode::KeyQuestion);
        assert_eq!(
            err.to_string(),
            "invalid mode transition: end_call -> key_question"
        );

        let err = EngineError::SessionNotFound("CA42".to_string());
        assert_eq!(err.to_string(), "session not found: CA42");
    }

    #[test]
    fn test_is_validation() {
        assert!(EngineError::MissingField("text").is_validation());
        assert!(EngineError::InvalidField {
            field: "speaker",
            reason: String::new()
        }
        .is_validation());
        assert!(!EngineError::SessionNotFound("x".into()).is_validation());
        assert!(!EngineError::LockPoisoned("x".into()).is_validation());
    }

    #[test]
    fn test_into_coach_error() {
        let err: CoachError = EngineError::InvalidCatalog("no sections".into()).into();
        assert!(matches!(err, CoachError::Catalog(_)));

        let err: CoachError = EngineError::LockPoisoned("boom".into()).into();
        assert!(matches!(err, CoachError::Api(_)));
    }
}
