//! CLI argument definitions for the regassist server.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

use regassist_core::config::AssistConfig;

/// Regulatory Assistant: password-gated chat over regulatory documents.
#[derive(Parser, Debug)]
#[command(name = "regassist", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", env = "REGASSIST_CONFIG")]
    pub config: Option<PathBuf>,

    /// API server port.
    #[arg(short = 'p', long = "port", env = "REGASSIST_PORT")]
    pub port: Option<u16>,

    /// Bind address.
    #[arg(long = "host")]
    pub host: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag / REGASSIST_CONFIG > ~/.regassist/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(default_config_path)
    }

    /// Log filter directive.
    ///
    /// Priority: --log-level flag > `RUST_LOG` > config file value.
    pub fn resolve_log_filter(&self, rust_log: Option<String>, config_level: &str) -> String {
        self.log_level
            .clone()
            .or_else(|| rust_log.filter(|v| !v.trim().is_empty()))
            .unwrap_or_else(|| config_level.to_string())
    }

    /// Overlay the server flags onto a loaded configuration.
    pub fn apply_to(&self, config: &mut AssistConfig) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(ref host) = self.host {
            config.server.host = host.clone();
        }
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".regassist").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".regassist").join("config.toml");
    }
    PathBuf::from("config.toml")
}
