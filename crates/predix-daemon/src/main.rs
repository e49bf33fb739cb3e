//! Predix Daemon - monitoring backend core
//!
//! Binds the HTTP listener, serves the real-time gateway and drives the
//! sensor, prediction and anomaly tasks in the background.

use clap::Parser;
use predix_daemon::config::DaemonConfig;
use predix_daemon::error::{DaemonError, DaemonResult};
use predix_daemon::gateway::{Gateway, TokenVerifier};
use predix_daemon::simulation::PlantSimulation;
use predix_daemon::{storage, Adapters, Server};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Predix Daemon CLI
#[derive(Parser)]
#[command(name = "predixd")]
#[command(about = "Predix Daemon - monitoring backend core", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "PREDIX_CONFIG")]
    config: Option<String>,

    /// Log level
    #[arg(long, env = "PREDIX_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, env = "PREDIX_LOG_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> DaemonResult<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| cli.log_level.clone().into());

    if cli.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    // Load configuration
    let config = DaemonConfig::load(cli.config.as_deref())
        .map_err(|e| DaemonError::Config(e.to_string()))?;

    // Fatal before anything else is built
    let addr = config.listen_addr()?;

    println!(
        r#"
  ____  ____  _____ ____ _____  __
 |  _ \|  _ \| ____|  _ \_ _\ \/ /
 | |_) | |_) |  _| | | | | | \  /
 |  __/|  _ <| |___| |_| | | /  \
 |_|   |_| \_\_____|____/___/_/\_\

  Predictive maintenance backend
  Version: {}
  Listening: {}
"#,
        env!("CARGO_PKG_VERSION"),
        addr
    );

    match bootstrap(config).await {
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            tracing::error!(error = %e, "Failed to start server: {}", e);
            Ok(())
        }
        Ok(()) => Ok(()),
    }
}

async fn bootstrap(config: DaemonConfig) -> DaemonResult<()> {
    let verifier = match &config.jwt_access_secret {
        Some(secret) => TokenVerifier::from_secret(secret.expose().as_bytes()),
        None => {
            tracing::warn!("JWT_ACCESS_SECRET not set, every real-time handshake will be rejected");
            TokenVerifier::reject_all()
        }
    };
    let gateway = Arc::new(Gateway::new(verifier));

    let plant = Arc::new(PlantSimulation::new(
        config.simulated_machines,
        gateway.clone(),
        config.ticket_interval(),
    ));
    let adapters = Adapters::from_shared(plant);

    let persistence = storage::connect(&config)?;

    Server::new(config, persistence, gateway, adapters)?
        .run()
        .await
}
