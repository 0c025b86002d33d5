//! Call coach binary - composition root.
//!
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Install tracing
//! 3. Load the question and rebuttal catalog
//! 4. Serve the axum API until Ctrl-C

mod cli;

use std::path::Path;

use clap::Parser;

use callcoach_api::routes;
use callcoach_api::state::AppState;
use callcoach_core::config::CoachConfig;
use callcoach_engine::Catalog;

use crate::cli::CliArgs;

/// Resolves once the process is asked to stop.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

fn load_catalog(path: &str) -> Result<Catalog, callcoach_engine::EngineError> {
    if path.is_empty() {
        tracing::info!("Using built-in catalog");
        return Ok(Catalog::builtin());
    }
    Catalog::load(Path::new(path))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config. Read before tracing so the configured level applies.
    let config_file = args.resolve_config_path();
    let config_found = config_file.exists();
    let mut config = if config_found {
        CoachConfig::load(&config_file)?
    } else {
        CoachConfig::default()
    };
    args.apply(&mut config);

    // Tracing. RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting callcoach v{}", env!("CARGO_PKG_VERSION"));
    if config_found {
        tracing::info!(path = %config_file.display(), "Configuration loaded");
    } else {
        tracing::warn!(path = %config_file.display(), "Config file not found, using defaults");
    }

    // Catalog. A broken catalog file is fatal.
    let catalog = match load_catalog(&config.catalog.path) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(path = %config.catalog.path, error = %e, "Failed to load catalog");
            return Err(e.into());
        }
    };
    tracing::info!(
        sections = catalog.sections().len(),
        hold_ms = config.engine.hold_ms,
        "Coaching engine ready"
    );

    // === API server ===

    let state = AppState::new(config.clone(), catalog);
    if let Err(e) = routes::start_server(&config, state, shutdown_signal()).await {
        tracing::error!(error = %e, "Server failed");
        if let callcoach_core::CoachError::Api(ref msg) = e {
            if msg.starts_with("Failed to bind") {
                tracing::error!("Try: callcoach --port {}", config.server.port.saturating_add(1));
            }
        }
        return Err(e.into());
    }

    Ok(())
}
