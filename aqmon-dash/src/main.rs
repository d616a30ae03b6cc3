//! aqmon-dash - Air-quality dashboard and prediction service
//!
//! Connects read-only to the measurement store populated by the external
//! ingestion pipeline, runs the refresh pipeline, and serves the
//! dashboard/prediction HTTP API.

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use aqmon_dash::config::{DashboardSettings, TomlConfig};
use aqmon_dash::models::ModelSet;
use aqmon_dash::refresh::RefreshParams;
use aqmon_dash::{build_router, db, AppState};

/// Air-quality dashboard service
#[derive(Debug, Parser)]
#[command(name = "aqmon-dash", version)]
struct Args {
    /// Root folder containing the measurement database and model artifacts
    #[arg(long)]
    root_folder: Option<String>,

    /// HTTP server port (overrides the bootstrap config)
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber before anything else
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!(
        "Starting AQMon dashboard (aqmon-dash) v{}",
        env!("CARGO_PKG_VERSION")
    );

    let args = Args::parse();

    let root_folder = aqmon_common::config::resolve_root_folder(
        args.root_folder.as_deref(),
        "AQMON_ROOT_FOLDER",
    )?;
    info!("Root folder: {}", root_folder.display());

    let bootstrap = TomlConfig::load(&root_folder);
    let port = args.port.unwrap_or(bootstrap.port);

    // Total store outage at startup is the one unrecoverable failure
    let db_path = aqmon_common::config::database_path(&root_folder);
    info!("Database path: {}", db_path.display());
    let pool = match db::connect_readonly(&db_path).await {
        Ok(pool) => {
            info!("✓ Connected to measurement store (read-only)");
            pool
        }
        Err(e) => {
            error!("Failed to connect to measurement store: {}", e);
            return Err(e);
        }
    };

    // Missing models degrade the prediction screen, never startup
    let models_dir = bootstrap.models_dir(&root_folder);
    let models = ModelSet::load(&models_dir);

    let settings = DashboardSettings::load(&pool).await;
    info!(
        "Dashboard defaults: window = {}, auto-refresh = {}, interval = {}s",
        settings.window, settings.auto_refresh, settings.refresh_interval_secs
    );

    let state = AppState::new(pool, models, RefreshParams::from_settings(&settings));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    info!("aqmon-dash listening on http://127.0.0.1:{}", port);
    info!("Health check: http://127.0.0.1:{}/health", port);

    axum::serve(listener, app).await?;

    Ok(())
}
