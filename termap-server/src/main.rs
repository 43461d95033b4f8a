//! termap-server - terminology code lists and crosswalk mappings over HTTP
//!
//! Uploads `code;description` lists per terminology and year, records
//! mappings between codes, and answers point lookups for both.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use termap_common::config::{load_toml_config, CliOverrides, ServiceConfig};
use termap_common::db::init_database_with;
use termap_common::DuplicatePolicy;
use termap_server::api::buildinfo::BuildInfo;
use termap_server::{build_router, AppState};
use tokio::signal;
use tracing::{error, info};

/// Command-line arguments for termap-server
#[derive(Parser, Debug)]
#[command(name = "termap-server")]
#[command(about = "Terminology code list and mapping service")]
#[command(version)]
struct Args {
    /// Folder holding terminology.db (falls back to TERMAP_ROOT_FOLDER, then the config file)
    #[arg(short, long)]
    root_folder: Option<String>,

    /// Address to bind
    #[arg(long, env = "TERMAP_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "TERMAP_PORT")]
    port: Option<u16>,

    /// TOML config file
    #[arg(short, long, env = "TERMAP_CONFIG")]
    config: Option<PathBuf>,

    /// Uploads repeating an existing (terminology, year, code): allow or reject
    #[arg(long)]
    duplicate_codes: Option<DuplicatePolicy>,

    /// Mappings repeating an existing source+target tuple: allow or reject
    #[arg(long)]
    duplicate_mappings: Option<DuplicatePolicy>,
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            root_folder: self.root_folder.clone(),
            host: self.host.clone(),
            port: self.port,
            duplicate_codes: self.duplicate_codes,
            duplicate_mappings: self.duplicate_mappings,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "termap_server=info,termap_common=info,tower_http=info".into()),
        )
        .init();

    // Build identification first, before any config or database delays
    info!("Starting termap-server {}", BuildInfo::current());

    let args = Args::parse();

    let toml_config = load_toml_config(args.config.as_deref()).context("Failed to load config")?;
    let config = ServiceConfig::resolve(&args.overrides(), &toml_config);

    let db_path = config.database_path();
    info!("Database path: {}", db_path.display());
    info!(
        "Duplicate policy: codes={}, mappings={}",
        config.duplicate_codes, config.duplicate_mappings
    );

    let pool = match init_database_with(&db_path, config.max_connections).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to open database: {}", e);
            return Err(e).context("Database initialization failed");
        }
    };

    let state = AppState::new(pool.clone())
        .with_policies(config.duplicate_codes, config.duplicate_mappings);
    let app = build_router(state);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("termap-server listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    info!("termap-server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
