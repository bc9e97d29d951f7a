//! Authenticated gRPC ingest API for FITS.
//!
//! Serves the `fits.Fits` service over TLS: site upsert, delete and lookup,
//! a client stream of observations to upsert, and a server stream of one
//! site's series. Writes need the static token held in [`GrpcConfig`].
//!
//! # Modules
//!
//! - [`service`]: the `fits.Fits` implementation
//! - [`auth`]: write token checks
//! - [`tls`]: operator supplied or self signed TLS identity
//! - [`config`]: environment configuration
//! - [`error`]: [`GrpcError`] and its mapping onto status codes

use std::future::Future;

use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::{Server, ServerTlsConfig};
use tracing::info;

pub mod auth;
pub mod config;
pub mod error;
pub mod service;
pub mod tls;

/// Code generated from `proto/fits.proto`.
#[allow(
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    clippy::panic,
    clippy::unreachable
)]
pub mod proto {
    tonic::include_proto!("fits");
}

// Re-export primary types for convenience.
pub use auth::WriteToken;
pub use config::GrpcConfig;
pub use error::GrpcError;
pub use service::FitsService;
pub use tls::PemIdentity;

/// Serve `service` over TLS on `listener` until `shutdown` resolves.
///
/// # Errors
///
/// Returns [`GrpcError::Transport`] if TLS setup fails or the server
/// encounters a fatal error.
pub async fn serve<F>(
    listener: TcpListener,
    service: FitsService,
    identity: &PemIdentity,
    shutdown: F,
) -> Result<(), GrpcError>
where
    F: Future<Output = ()> + Send,
{
    let addr = listener
        .local_addr()
        .map_err(|e| GrpcError::Config(format!("listener address: {e}")))?;

    let router = Server::builder()
        .tls_config(ServerTlsConfig::new().identity(identity.identity()))?
        .add_service(proto::fits_server::FitsServer::new(service));

    info!(%addr, "FITS gRPC listening");
    router
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
        .await?;
    info!("FITS gRPC stopped");
    Ok(())
}
