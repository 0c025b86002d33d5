//! CLI argument definitions for the call coach server.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

use callcoach_core::config::CoachConfig;

/// Default config file, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "callcoach.toml";

/// Callcoach: live call-coaching server.
#[derive(Parser, Debug)]
#[command(name = "callcoach", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// HTTP port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Bind address.
    #[arg(long = "host")]
    pub host: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Question and rebuttal catalog (TOML). Built-in catalog when absent.
    #[arg(long = "catalog")]
    pub catalog: Option<PathBuf>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > CALLCOACH_CONFIG env var > ./callcoach.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        self.resolve_config_path_with(env_var)
    }

    fn resolve_config_path_with(&self, env: impl Fn(&str) -> Option<String>) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Some(p) = env("CALLCOACH_CONFIG") {
            return PathBuf::from(p);
        }
        PathBuf::from(DEFAULT_CONFIG_FILE)
    }

    /// Resolve the HTTP port.
    ///
    /// Priority: --port flag > CALLCOACH_PORT > PORT > config file value.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        self.resolve_port_with(config_port, env_var)
    }

    fn resolve_port_with(&self, config_port: u16, env: impl Fn(&str) -> Option<String>) -> u16 {
        if let Some(p) = self.port {
            return p;
        }
        ["CALLCOACH_PORT", "PORT"]
            .into_iter()
            .filter_map(|key| env(key))
            .find_map(|val| val.parse::<u16>().ok())
            .unwrap_or(config_port)
    }

    /// Apply every override to a loaded config.
    pub fn apply(&self, config: &mut CoachConfig) {
        self.apply_with(config, env_var)
    }

    fn apply_with(&self, config: &mut CoachConfig, env: impl Fn(&str) -> Option<String>) {
        config.server.port = self.resolve_port_with(config.server.port, &env);
        if let Some(ref host) = self.host {
            config.server.host = host.clone();
        }
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(ref catalog) = self.catalog {
            config.catalog.path = catalog.to_string_lossy().to_string();
        }
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}
