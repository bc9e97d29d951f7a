//! FITS HTTP API binary.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load database configuration from `DB_*`
//! 3. Connect the pool; exit 1 if the database is unreachable
//! 4. Compile plot and map templates
//! 5. Serve on `HTTP_PORT` until `Ctrl-C`

use std::sync::Arc;

use fits_api::{AppState, ServerConfig, start_server};
use fits_db::{PostgresConfig, PostgresPool};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application entry point for the FITS API.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the database cannot be
/// reached, or the server fails to bind.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("fits-api starting");

    let db_config = PostgresConfig::from_env()?;
    info!(
        host = %db_config.host,
        database = %db_config.database,
        max_connections = db_config.max_connections,
        "Database configuration loaded"
    );

    let pool = PostgresPool::connect(&db_config).await?;
    let state = Arc::new(AppState::new(pool)?);
    let server_config = ServerConfig::from_env()?;

    let result = start_server(&server_config, Arc::clone(&state)).await;
    state.db.close().await;
    result?;

    info!("fits-api exiting");
    Ok(())
}
