//! Application state shared across all route handlers.
//!
//! AppState holds the coaching service and the event hub. It is passed to
//! handlers via axum's State extractor.

use std::sync::Arc;
use std::time::Instant;

use callcoach_core::config::CoachConfig;
use callcoach_engine::{Catalog, CoachService};

use crate::hub::EventHub;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<CoachConfig>,
    /// Sessions and the decision engine.
    pub service: Arc<CoachService>,
    /// Per-call fan-out to WebSocket and SSE listeners.
    pub hub: Arc<EventHub>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Create a new AppState from the config and a loaded catalog.
    pub fn new(config: CoachConfig, catalog: Catalog) -> Self {
        let service = CoachService::new(Arc::new(catalog), config.engine.hold_ms);
        let hub = EventHub::new(config.fanout.channel_capacity);
        Self {
            config: Arc::new(config),
            service: Arc::new(service),
            hub: Arc::new(hub),
            start_time: Instant::now(),
        }
    }
}
