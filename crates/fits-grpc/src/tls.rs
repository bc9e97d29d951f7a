//! TLS identity for the gRPC listener.
//!
//! Operators supply a PEM certificate and key. Without them a self signed
//! certificate for `localhost` is generated at startup.

use std::path::Path;

use tonic::transport::Identity;

use crate::error::GrpcError;

/// A PEM encoded certificate and private key.
#[derive(Clone)]
pub struct PemIdentity {
    /// Certificate chain.
    pub cert: String,
    /// Private key.
    pub key: String,
}

impl std::fmt::Debug for PemIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PemIdentity")
            .field("cert", &self.cert)
            .field("key", &"<redacted>")
            .finish()
    }
}

impl PemIdentity {
    /// Generate a self signed certificate for `localhost`.
    ///
    /// # Errors
    ///
    /// Returns [`GrpcError::Tls`] if key generation fails.
    pub fn self_signed() -> Result<Self, GrpcError> {
        let rcgen::CertifiedKey { cert, key_pair } =
            rcgen::generate_simple_self_signed(vec!["localhost".to_owned()])
                .map_err(|e| GrpcError::Tls(format!("self signed certificate: {e}")))?;
        Ok(Self {
            cert: cert.pem(),
            key: key_pair.serialize_pem(),
        })
    }

    /// Read a certificate and key from PEM files.
    ///
    /// # Errors
    ///
    /// Returns [`GrpcError::Tls`] if either file cannot be read.
    pub async fn from_files(cert: &Path, key: &Path) -> Result<Self, GrpcError> {
        let read = |p: &Path| {
            let p = p.to_owned();
            async move {
                tokio::fs::read_to_string(&p)
                    .await
                    .map_err(|e| GrpcError::Tls(format!("read {}: {e}", p.display())))
            }
        };
        Ok(Self {
            cert: read(cert).await?,
            key: read(key).await?,
        })
    }

    /// The identity tonic serves with.
    pub fn identity(&self) -> Identity {
        Identity::from_pem(&self.cert, &self.key)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn self_signed_is_pem() {
        let id = PemIdentity::self_signed().unwrap();
        assert!(id.cert.starts_with("-----BEGIN CERTIFICATE-----"));
        assert!(id.key.contains("PRIVATE KEY-----"));
        assert!(!format!("{id:?}").contains(&id.key));
    }

    #[tokio::test]
    async fn missing_files_are_tls_errors() {
        let err = PemIdentity::from_files(Path::new("/nonexistent/c.pem"), Path::new("/nonexistent/k.pem"))
            .await
            .unwrap_err();
        assert!(matches!(err, GrpcError::Tls(_)));
    }
}
