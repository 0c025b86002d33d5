//! Coaching engine for live calls.
//!
//! Holds the question and rebuttal catalog, classifies the prospect's latest
//! utterance, and walks each call's session through key questions,
//! objections, and end-call escalation.

pub mod catalog;
pub mod classifier;
pub mod engine;
pub mod error;
pub mod service;
pub mod session;
pub mod store;

pub use catalog::{Catalog, CatalogFile, KeyQuestion, ObjectionBank, Rebuttal, Section};
pub use classifier::{LexicalClassifier, SignalExtractor};
pub use engine::{apply_queued_advance, CoachEngine};
pub use error::EngineError;
pub use service::{AnalyzeInput, CoachService, TranscriptInput};
pub use session::Session;
pub use store::SessionStore;
