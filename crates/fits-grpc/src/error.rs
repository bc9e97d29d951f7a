//! Error types for the gRPC service.
//!
//! Every failure is a [`GrpcError`] until it leaves a handler, where it
//! becomes a [`tonic::Status`]:
//!
//! | Error | Code |
//! |-------|------|
//! | missing required field | `InvalidArgument` |
//! | identifier not in the database | `NotFound` |
//! | input the database rejects | `InvalidArgument` |
//! | bad or missing token | `Unauthenticated` |
//! | database failure | `Internal` |

use fits_db::DbError;
use tonic::{Code, Status};

/// Errors that can occur in the gRPC service and its startup.
#[derive(Debug, thiserror::Error)]
pub enum GrpcError {
    /// A required request field was empty.
    #[error("{0}")]
    InvalidArgument(String),

    /// The write token was missing or wrong.
    #[error("{0}")]
    Unauthenticated(String),

    /// A data layer failure.
    #[error(transparent)]
    Db(#[from] DbError),

    /// Invalid or missing configuration.
    #[error("config error: {0}")]
    Config(String),

    /// The TLS identity could not be generated or read.
    #[error("TLS error: {0}")]
    Tls(String),

    /// The transport failed to start or serve.
    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// Receiving from a client stream failed.
    #[error("{message}")]
    Stream {
        /// Code reported by the transport.
        code: Code,
        /// Message reported by the transport.
        message: String,
    },
}

impl GrpcError {
    /// The gRPC status code this error is reported with.
    pub const fn code(&self) -> Code {
        match self {
            Self::InvalidArgument(_) | Self::Db(DbError::Invalid(_)) => Code::InvalidArgument,
            Self::Unauthenticated(_) => Code::Unauthenticated,
            Self::Db(DbError::NotFound(_)) => Code::NotFound,
            Self::Db(_) | Self::Config(_) | Self::Tls(_) | Self::Transport(_) => Code::Internal,
            Self::Stream { code, .. } => *code,
        }
    }
}

impl From<GrpcError> for Status {
    fn from(err: GrpcError) -> Self {
        let code = err.code();
        if code == Code::Internal {
            tracing::error!(error = %err, "internal error");
        }
        Self::new(code, err.to_string())
    }
}

impl From<Status> for GrpcError {
    fn from(s: Status) -> Self {
        Self::Stream {
            code: s.code(),
            message: s.message().to_owned(),
        }
    }
}

/// An `InvalidArgument` error when `value` is empty.
pub fn require(value: &str, name: &str) -> Result<(), GrpcError> {
    if value.is_empty() {
        Err(GrpcError::InvalidArgument(format!("{name} is required")))
    } else {
        Ok(())
    }
}
