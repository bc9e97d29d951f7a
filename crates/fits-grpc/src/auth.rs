//! Write token checks.
//!
//! Writes carry the server's static token in a `token` metadata entry. The
//! comparison takes the same time wherever the first differing byte is.

use tonic::metadata::MetadataMap;

use crate::error::GrpcError;

/// Metadata key holding the write token.
pub const TOKEN_KEY: &str = "token";

/// Holds the server's write token.
#[derive(Clone)]
pub struct WriteToken {
    token: String,
}

impl std::fmt::Debug for WriteToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WriteToken(<redacted>)")
    }
}

impl WriteToken {
    /// Wrap the server's token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Check the request metadata. Exactly one `token` entry must be
    /// present and equal the server token. An empty server token refuses
    /// every write.
    ///
    /// # Errors
    ///
    /// Returns [`GrpcError::Unauthenticated`] otherwise.
    pub fn check(&self, metadata: &MetadataMap) -> Result<(), GrpcError> {
        if self.token.is_empty() {
            return Err(GrpcError::Unauthenticated("server write token empty".into()));
        }

        let mut values = metadata.get_all(TOKEN_KEY).iter();
        let supplied = match (values.next(), values.next()) {
            (Some(v), None) => v.as_bytes(),
            _ => return Err(GrpcError::Unauthenticated("valid write token required".into())),
        };

        if constant_time_eq(supplied, self.token.as_bytes()) {
            Ok(())
        } else {
            Err(GrpcError::Unauthenticated("valid write token required".into()))
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use tonic::metadata::MetadataValue;

    use super::*;

    fn with_tokens(tokens: &[&'static str]) -> MetadataMap {
        let mut md = MetadataMap::new();
        for &t in tokens {
            md.append(TOKEN_KEY, MetadataValue::from_static(t));
        }
        md
    }

    #[test]
    fn matching_token_passes() {
        let w = WriteToken::new("testwrite");
        assert!(w.check(&with_tokens(&["testwrite"])).is_ok());
    }

    #[test]
    fn wrong_missing_or_repeated_token_fails() {
        let w = WriteToken::new("testwrite");
        assert!(w.check(&with_tokens(&["testwritf"])).is_err());
        assert!(w.check(&with_tokens(&["test"])).is_err());
        assert!(w.check(&with_tokens(&[])).is_err());
        assert!(w.check(&with_tokens(&["testwrite", "testwrite"])).is_err());
    }

    #[test]
    fn empty_server_token_refuses_everything() {
        let w = WriteToken::new("");
        assert!(w.check(&with_tokens(&[""])).is_err());
        assert!(w.check(&with_tokens(&[])).is_err());
    }

    #[test]
    fn constant_time_eq_compares_bytes() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }
}
