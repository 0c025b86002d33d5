//! Call coach API crate - axum HTTP server, route handlers, live event fan-out.
//!
//! Exposes the telephony webhook, transcript ingestion, coaching decisions,
//! session inspection, and per-call WebSocket/SSE streams.

pub mod error;
pub mod handlers;
pub mod hub;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use hub::EventHub;
pub use routes::{create_router, start_server};
pub use state::AppState;
