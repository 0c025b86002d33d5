//! Shared domain types, configuration, and errors for the call coach.

pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use config::CoachConfig;
pub use error::{CoachError, Result};
pub use events::{CoachEvent, SystemNotice};
pub use types::*;
