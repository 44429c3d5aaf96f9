//! Tunnel Admin CLI - serve the tunnel update API or check payloads offline

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tunnel_admin_api::store::{MemoryTunnelStore, SeedFile};
use tunnel_admin_api::{ApiServer, ApiServerConfig};
use tunnel_admin_proto::TunnelUpdateRequest;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_HASH"),
    ", built ",
    env!("BUILD_TIME"),
    ")"
);

/// Tunnel Admin - manage multi-hop tunnel configuration
#[derive(Parser, Debug)]
#[command(name = "tunnel-admin")]
#[command(about = "Tunnel Admin - manage multi-hop tunnel configuration")]
#[command(version, long_version = LONG_VERSION)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the tunnel administration API
    #[command(long_about = r#"
Serve the tunnel administration API backed by an in-memory store.

EXAMPLES:
  # Serve on the default address with seeded tunnels and nodes
  tunnel-admin serve --seed ./seed.json

  # Bind to all interfaces without CORS
  tunnel-admin serve --bind 0.0.0.0:8080 --no-cors

ENVIRONMENT VARIABLES:
  TUNNEL_ADMIN_BIND   Address to bind the API server
  TUNNEL_ADMIN_SEED   Seed file with nodes and tunnels
    "#)]
    Serve {
        /// Address to bind the API server
        #[arg(long, env = "TUNNEL_ADMIN_BIND", default_value = "127.0.0.1:8080")]
        bind: SocketAddr,

        /// JSON seed file: {"nodes": [ids], "tunnels": [...]}
        #[arg(long, env = "TUNNEL_ADMIN_SEED")]
        seed: Option<PathBuf>,

        /// Disable CORS headers
        #[arg(long)]
        no_cors: bool,
    },

    /// Validate a tunnel update payload and print its normalized form
    Validate {
        /// Path to a JSON update payload
        file: PathBuf,
    },
}

/// Setup logging with the specified log level
fn setup_logging(verbose: bool) {
    let log_level = if verbose { "debug" } else { "info" };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(filter)
        .init();
}

async fn serve(bind: SocketAddr, seed: Option<PathBuf>, no_cors: bool) -> Result<()> {
    let seed = match seed {
        Some(path) => SeedFile::load(&path)
            .with_context(|| format!("Failed to load seed file {}", path.display()))?,
        None => {
            warn!("No seed file given, starting with an empty store");
            SeedFile::default()
        }
    };

    let store = Arc::new(MemoryTunnelStore::from_seed(seed));
    let config = ApiServerConfig {
        bind_addr: bind,
        enable_cors: !no_cors,
    };

    let server = ApiServer::new(config, store);

    tokio::select! {
        result = server.start() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
            Ok(())
        }
    }
}

/// Outcome of checking an update payload file
#[derive(Debug)]
struct CheckReport {
    accepted: bool,
    /// Pretty normalized JSON, or one `field: message` line per violation
    output: String,
}

fn check_payload(file: &Path) -> Result<CheckReport> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not valid JSON", file.display()))?;

    match TunnelUpdateRequest::validate_json(value) {
        Ok(update) => Ok(CheckReport {
            accepted: true,
            output: serde_json::to_string_pretty(&update)?,
        }),
        Err(err) => Ok(CheckReport {
            accepted: false,
            output: err
                .violations()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n"),
        }),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    match cli.command {
        Commands::Serve {
            bind,
            seed,
            no_cors,
        } => {
            info!("Tunnel Admin {} starting...", LONG_VERSION);
            if let Err(e) = serve(bind, seed, no_cors).await {
                error!("Server error: {:#}", e);
                return Err(e);
            }
            info!("Tunnel Admin stopped");
            Ok(())
        }
        Commands::Validate { file } => {
            let report = check_payload(&file)?;
            println!("{}", report.output);
            if !report.accepted {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}
