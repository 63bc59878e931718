//! Overlay relay binary.
//!
//! ## Usage
//!
//! ```bash
//! OVERLAY_WS_TOKEN=secret overlay-relay
//!
//! # Custom port and state file
//! OVERLAY_WS_PORT=9000 OVERLAY_CONFIG_PATH=./state.json overlay-relay
//!
//! # With verbose logging
//! RUST_LOG=overlay_relay=trace overlay-relay
//! ```

use std::process::ExitCode;

use overlay_relay::config::{AppConfig, LogFormat};
use overlay_relay::server::{shutdown_signal, RelayServer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            init_tracing(&AppConfig::default());
            tracing::error!(error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config);

    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "Invalid configuration");
        return ExitCode::FAILURE;
    }

    tracing::info!(
        state_file = %config.config_path.display(),
        rate_limit = config.rate_limit,
        "Starting overlay relay"
    );

    let server = match RelayServer::from_config(&config).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start server");
            return ExitCode::FAILURE;
        }
    };

    match server.serve(shutdown_signal()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` takes precedence over the configured log level.
fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match config.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}
