//! FITS gRPC ingest binary.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load `TOKEN_WRITE`, `PORT` and optional TLS paths; exit 1 on an
//!    empty token
//! 3. Connect the pool from `DB_*`; exit 1 if the database is unreachable
//! 4. Load or generate the TLS identity
//! 5. Serve until `Ctrl-C`

use fits_db::{PostgresConfig, PostgresPool};
use fits_grpc::{FitsService, GrpcConfig, PemIdentity, WriteToken, serve};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Application entry point for the FITS gRPC server.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the database cannot be
/// reached, the TLS identity cannot be loaded, or the listener fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("fits-grpc starting");

    let config = GrpcConfig::from_env()?;
    let db_config = PostgresConfig::from_env()?;
    let pool = PostgresPool::connect(&db_config).await?;

    let identity = match &config.tls {
        Some((cert, key)) => PemIdentity::from_files(cert, key).await?,
        None => {
            info!("no TLS_CERT/TLS_KEY, generating a self signed certificate");
            PemIdentity::self_signed()?
        }
    };

    let listener = TcpListener::bind(config.addr).await?;
    let service = FitsService::new(pool.clone(), WriteToken::new(config.token.as_str()));

    let result = serve(listener, service, &identity, shutdown_signal()).await;
    pool.close().await;
    result?;

    info!("fits-grpc exiting");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
