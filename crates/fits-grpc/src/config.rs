//! gRPC server configuration loaded from the environment.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use crate::error::GrpcError;

/// gRPC server configuration.
#[derive(Clone)]
pub struct GrpcConfig {
    /// Address to listen on.
    pub addr: SocketAddr,
    /// Token required in the `token` metadata entry of every write.
    pub token: String,
    /// PEM certificate and key paths. A self signed identity is generated
    /// when unset.
    pub tls: Option<(PathBuf, PathBuf)>,
}

impl std::fmt::Debug for GrpcConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrpcConfig")
            .field("addr", &self.addr)
            .field("token", &"<redacted>")
            .field("tls", &self.tls)
            .finish()
    }
}

impl GrpcConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Required |
    /// |----------|----------|
    /// | `TOKEN_WRITE` | yes, non-empty |
    /// | `PORT` | yes |
    /// | `TLS_CERT` | with `TLS_KEY` |
    /// | `TLS_KEY` | with `TLS_CERT` |
    ///
    /// # Errors
    ///
    /// Returns [`GrpcError::Config`] when a required variable is missing or
    /// empty, `PORT` is not a port number, or only one TLS path is set.
    pub fn from_env() -> Result<Self, GrpcError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, which returns a variable's value.
    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, GrpcError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup("TOKEN_WRITE")
            .filter(|t| !t.is_empty())
            .ok_or_else(|| GrpcError::Config("empty write token TOKEN_WRITE".into()))?;

        let port = lookup("PORT")
            .filter(|p| !p.is_empty())
            .ok_or_else(|| GrpcError::Config("PORT is required".into()))?;
        let port: u16 = port
            .parse()
            .map_err(|e| GrpcError::Config(format!("invalid PORT {port}: {e}")))?;

        let cert = lookup("TLS_CERT").filter(|p| !p.is_empty());
        let key = lookup("TLS_KEY").filter(|p| !p.is_empty());
        let tls = match (cert, key) {
            (Some(c), Some(k)) => Some((PathBuf::from(c), PathBuf::from(k))),
            (None, None) => None,
            _ => {
                return Err(GrpcError::Config(
                    "TLS_CERT and TLS_KEY must be set together".into(),
                ));
            }
        };

        Ok(Self {
            addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)),
            token,
            tls,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<GrpcConfig, GrpcError> {
        let env: BTreeMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        GrpcConfig::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn minimal() {
        let c = load(&[("TOKEN_WRITE", "secret"), ("PORT", "8443")]).unwrap();
        assert_eq!(c.addr.port(), 8443);
        assert_eq!(c.token, "secret");
        assert!(c.tls.is_none());
    }

    #[test]
    fn empty_token_is_refused() {
        assert!(load(&[("TOKEN_WRITE", ""), ("PORT", "8443")]).is_err());
        assert!(load(&[("PORT", "8443")]).is_err());
    }

    #[test]
    fn port_is_required() {
        assert!(load(&[("TOKEN_WRITE", "secret")]).is_err());
        assert!(load(&[("TOKEN_WRITE", "secret"), ("PORT", "https")]).is_err());
    }

    #[test]
    fn tls_paths_come_in_pairs() {
        assert!(load(&[("TOKEN_WRITE", "s"), ("PORT", "1"), ("TLS_CERT", "c.pem")]).is_err());
        let c = load(&[
            ("TOKEN_WRITE", "s"),
            ("PORT", "1"),
            ("TLS_CERT", "c.pem"),
            ("TLS_KEY", "k.pem"),
        ])
        .unwrap();
        assert_eq!(c.tls, Some((PathBuf::from("c.pem"), PathBuf::from("k.pem"))));
    }

    #[test]
    fn debug_hides_token() {
        let c = load(&[("TOKEN_WRITE", "secret"), ("PORT", "8443")]).unwrap();
        assert!(!format!("{c:?}").contains("secret"));
    }
}
