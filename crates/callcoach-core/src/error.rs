use thiserror::Error;

/// Process-level error type for the call coach.
///
/// Subsystem crates define their own error types and convert into this one
/// (or into the API error) at their boundary.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CoachError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for CoachError {
    fn from(err: toml::de::Error) -> Self {
        CoachError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for CoachError {
    fn from(err: toml::ser::Error) -> Self {
        CoachError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for CoachError {
    fn from(err: serde_json::Error) -> Self {
        CoachError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for call coach operations.
pub type Result<T> = std::result::Result<T, CoachError>;
