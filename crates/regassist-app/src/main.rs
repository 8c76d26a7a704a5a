//! Regulatory Assistant binary - composition root.
//!
//! 1. Parse CLI flags, read the TOML config and start tracing
//! 2. Overlay secrets from the environment and validate
//! 3. Build the extractor, the backend registry and the document directory
//! 4. Start the axum API server

mod cli;

use std::sync::Arc;

use clap::Parser;

use regassist_api::state::AppState;
use regassist_chat::ChatOrchestrator;
use regassist_core::config::{AssistConfig, GeneralConfig};
use regassist_core::error::AssistError;
use regassist_directory::DirectoryClient;
use regassist_extract::{DocumentExtractor, PdfiumRenderer};
use regassist_gateway::BackendRegistry;
use regassist_ocr::{TesseractConfig, TesseractOcrService};

use cli::CliArgs;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config file first, so its log level can seed the filter.
    let config_file = args.resolve_config_path();
    let loaded = AssistConfig::load_if_exists(&config_file);
    let config_level = match &loaded {
        Ok(Some(config)) => config.general.log_level.clone(),
        _ => GeneralConfig::default().log_level,
    };

    // Tracing.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(
            args.resolve_log_filter(std::env::var("RUST_LOG").ok(), &config_level),
        ))
        .init();

    tracing::info!("Starting Regulatory Assistant v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match loaded {
        Ok(Some(config)) => {
            tracing::info!(path = %config_file.display(), "Configuration loaded");
            config
        }
        Ok(None) => {
            tracing::info!(path = %config_file.display(), "No configuration file, using defaults");
            AssistConfig::default()
        }
        Err(e) => {
            tracing::error!(path = %config_file.display(), error = %e, "Failed to read configuration");
            return Err(e.into());
        }
    };
    config.apply_env_overrides();
    args.apply_to(&mut config);

    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "Invalid configuration");
        return Err(e.into());
    }

    // Extraction.
    let ocr = TesseractOcrService::new(TesseractConfig::from(&config.extraction));
    let renderer = Arc::new(PdfiumRenderer::from(&config.extraction));
    let extractor = Arc::new(DocumentExtractor::new(ocr, renderer));

    // Backends and document directory.
    let backends = BackendRegistry::from_config(&config)?;
    if backends.available().is_empty() {
        tracing::warn!("No chat backend configured; every chat request will fail");
    }
    let orchestrator = ChatOrchestrator::new(extractor, backends);
    let directory = DirectoryClient::new(&config.directory)?;

    // === API server ===

    let port = config.server.port;
    let state = AppState::new(config, orchestrator, directory);

    match regassist_api::start_server(state).await {
        Ok(()) => Ok(()),
        Err(AssistError::Io(e)) if e.kind() == std::io::ErrorKind::AddrInUse => {
            tracing::error!(error = %e, "Failed to bind - is another instance running?");
            tracing::error!("Try: regassist --port {}", port.saturating_add(1));
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}
