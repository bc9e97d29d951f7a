//! Error types for the data layer.
//!
//! All errors are propagated via [`DbError`], which separates identifiers
//! that do not resolve and input the database rejects from failures of the
//! database itself.

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// An identifier did not resolve, or a selection that must be
    /// non-empty was empty.
    #[error("not found: {0}")]
    NotFound(String),

    /// The database rejected client input (bad polygon, unknown SRS).
    #[error("invalid: {0}")]
    Invalid(String),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DbError {
    /// True for [`DbError::NotFound`].
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Classify a failed spatial query. A projection failure raised by
    /// `PostGIS` is [`DbError::NotFound`]; timeouts, lost connections and
    /// every other failure stay [`DbError::Postgres`].
    pub(crate) fn from_spatial(e: sqlx::Error) -> Self {
        let projection = match &e {
            sqlx::Error::Database(db) => is_projection_failure(db.code().as_deref(), db.message()),
            _ => false,
        };
        if projection {
            Self::NotFound(format!("spatial query failed: {e}"))
        } else {
            Self::Postgres(e)
        }
    }
}

/// `PostGIS` reports a failed `ST_Transform` as `invalid_parameter_value`
/// or as an internal error naming the transform.
fn is_projection_failure(code: Option<&str>, message: &str) -> bool {
    match code {
        Some("22023") => true,
        Some("XX000") => {
            let m = message.to_ascii_lowercase();
            ["transform", "proj", "srid"].iter().any(|k| m.contains(k))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projection_failures() {
        assert!(is_projection_failure(Some("22023"), "invalid SRID"));
        assert!(is_projection_failure(
            Some("XX000"),
            "transform: couldn't project point (1 2 0): latitude or longitude exceeded limits"
        ));
        assert!(is_projection_failure(Some("XX000"), "GetProj4StringSPI: Cannot find SRID (9999)"));
    }

    #[test]
    fn server_faults_are_not_projection_failures() {
        assert!(!is_projection_failure(
            Some("57014"),
            "canceling statement due to statement timeout"
        ));
        assert!(!is_projection_failure(Some("42501"), "permission denied for table observation"));
        assert!(!is_projection_failure(Some("XX000"), "could not read block 0"));
        assert!(!is_projection_failure(None, "transform"));
    }

    #[test]
    fn non_database_errors_stay_postgres() {
        let e = DbError::from_spatial(sqlx::Error::PoolTimedOut);
        assert!(matches!(e, DbError::Postgres(_)));
    }
}
