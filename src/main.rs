//! hazpoint CLI - hazard raster sampling and confidence intervals over HTTP.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hazpoint::http::{self, HostKind, FUNCTIONS_PORT_ENV};
use hazpoint::service::{CiRequest, HazStatsPayload, HazardService, ValuesRequest};
use hazpoint::{build_store, ci, Config};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "hazpoint")]
#[command(version)]
#[command(about = "Sample GeoTIFF hazard rasters at a point and compute confidence intervals")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file (defaults apply when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the web-app host (`/get_values`, `/get_ci_values`)
    Serve {
        /// Bind address, overriding `server.host`
        #[arg(long)]
        host: Option<String>,

        /// Bind port, overriding `server.port`
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run as a functions custom handler (`/api/...`)
    Functions,

    /// Sample band values at a location
    Sample {
        /// Raster identifier, relative to the configured storage
        #[arg(short, long)]
        file: String,

        /// One-based band index (repeatable)
        #[arg(short, long = "band", required = true)]
        bands: Vec<i64>,

        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
    },

    /// Compute a confidence interval from hazard statistics
    Ci {
        #[arg(long, allow_hyphen_values = true)]
        mean: f64,

        #[arg(long)]
        std_dev: f64,

        #[arg(short, long, default_value = "5")]
        realizations: i64,

        #[arg(short, long, default_value = "normal")]
        distribution: String,

        #[arg(long, default_value = "0.9")]
        confidence_level: f64,
    },

    /// Validate configuration file and storage credentials
    Validate,

    /// Show example configuration
    ExampleConfig,
}

fn setup_logging(level: Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("hazpoint: a global tracing subscriber is already installed");
    }
}

fn print_example_config() {
    let example = r#"# hazpoint configuration file

[server]
host = "127.0.0.1"
port = 8000

[logging]
# trace, debug, info, warn or error (--verbose forces debug)
level = "info"

# Rasters on the local filesystem; request `file` fields are relative to root
[storage]
backend = "local"
root = "data"

# Azure Blob Storage
# [storage]
# backend = "azure"
# container = "data"
# account = "myaccount"
# access_key_env = "AZURE_STORAGE_KEY"
# or a connection string, read from AZURE_STORAGE_CONNECTION_STRING by default
# connection_string_env = "AZURE_STORAGE_CONNECTION_STRING"
# prefix = "hazards"

# S3 or S3-compatible
# [storage]
# backend = "s3"
# bucket = "hazard-rasters"
# region = "us-east-1"
# endpoint = "http://localhost:9000"
# access_key_id_env = "AWS_ACCESS_KEY_ID"
# secret_access_key_env = "AWS_SECRET_ACCESS_KEY"
# allow_http = true

# HTTP(S) server with range request support
# [storage]
# backend = "http"
# base_url = "https://example.org/rasters/"
# timeout_secs = 30
"#;
    println!("{example}");
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let config = Config::load(path.map(PathBuf::as_path))
        .with_context(|| format!("Failed to load config from {path:?}"))?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn build_service(config: &Config) -> Result<Arc<HazardService>> {
    let store = build_store(&config.storage, Handle::current())
        .context("Failed to configure raster storage")?;
    Ok(Arc::new(HazardService::new(store)))
}

async fn serve(service: Arc<HazardService>, host_kind: HostKind, host: &str, port: u16) -> Result<()> {
    let app = http::router(service, host_kind);
    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .with_context(|| format!("Failed to bind {host}:{port}"))?;

    info!(addr = %listener.local_addr()?, host = ?host_kind, "Listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::ExampleConfig = cli.command {
        print_example_config();
        return Ok(());
    }

    let config = load_config(cli.config.as_ref())?;
    setup_logging(config.logging.max_level(cli.verbose)?);

    match cli.command {
        Commands::ExampleConfig => {}

        Commands::Validate => {
            build_store(&config.storage, Handle::current())
                .context("Failed to configure raster storage")?;
            info!("Configuration is valid");
            info!("  Listen:  {}:{}", config.server.host, config.server.port);
            info!("  Storage: {}", config.storage.backend_name());
        }

        Commands::Serve { host, port } => {
            let service = build_service(&config)?;
            let host = host.unwrap_or(config.server.host);
            let port = port.unwrap_or(config.server.port);
            serve(service, HostKind::WebApp, &host, port).await?;
        }

        Commands::Functions => {
            let service = build_service(&config)?;
            let port = match std::env::var(FUNCTIONS_PORT_ENV) {
                Ok(value) => value
                    .parse()
                    .with_context(|| format!("{FUNCTIONS_PORT_ENV} is not a port: {value}"))?,
                Err(_) => config.server.port,
            };
            serve(service, HostKind::Functions, &config.server.host, port).await?;
        }

        Commands::Sample {
            file,
            bands,
            lat,
            lon,
        } => {
            let service = build_service(&config)?;
            let request = ValuesRequest {
                file: Some(file),
                bands: Some(bands),
                lat: Some(lat),
                lon: Some(lon),
            };
            let values = tokio::task::spawn_blocking(move || service.get_values(&request))
                .await
                .context("Sampling task failed")??;
            println!("{}", serde_json::to_string_pretty(&values)?);
        }

        Commands::Ci {
            mean,
            std_dev,
            realizations,
            distribution,
            confidence_level,
        } => {
            let query = CiRequest {
                haz_stats: Some(HazStatsPayload {
                    mean: Some(mean),
                    std_dev: Some(std_dev),
                }),
                realizations: Some(realizations),
                distribution: Some(distribution),
                confidence_level: Some(confidence_level),
            }
            .validate()?;
            let interval = ci::compute_ci(
                query.stats,
                query.realizations,
                &query.distribution,
                query.confidence_level,
            )?;
            println!("{}", serde_json::to_string_pretty(&interval)?);
        }
    }

    Ok(())
}
