//! Catalog, health and fallback handlers, plus helpers shared by every
//! handler module.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/type` | Type catalog |
//! | `GET` | `/method` | Method catalog, optionally for one type |
//! | `GET` | `/soh` | Database health check |
//! | `GET` | `/soh/up` | Liveness probe |

use std::sync::Arc;

use axum::extract::{RawQuery, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use fits_db::{CatalogStore, Resolver};
use fits_types::{Query, Schema};

use crate::error::ApiError;
use crate::shape::{V1_JSON, json_response, negotiate};
use crate::state::AppState;

const NONE: Schema = Schema::new(&[], &[]);
const METHOD: Schema = Schema::new(&[], &["typeID"]);

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// True when the raw query carries a non-empty value for `name`.
pub fn has_param(raw: Option<&str>, name: &str) -> bool {
    raw.is_some_and(|r| {
        url::form_urlencoded::parse(r.as_bytes()).any(|(k, v)| k == name && !v.is_empty())
    })
}

/// A parameter the route schema marks as required.
pub(crate) fn required<'q>(value: Option<&'q str>, name: &str) -> Result<&'q str, ApiError> {
    value.ok_or_else(|| ApiError::Internal(format!("{name} required by schema but missing")))
}

// ---------------------------------------------------------------------------
// GET /type, GET /method
// ---------------------------------------------------------------------------

/// Every observation type.
pub async fn types(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(raw): RawQuery,
) -> Result<Response, ApiError> {
    negotiate(&headers, V1_JSON)?;
    Query::from_query_string(&NONE, raw.as_deref())?;

    let catalog = CatalogStore::new(state.db.pool()).types().await?;
    json_response(&catalog, V1_JSON)
}

/// Every method, or the methods valid for `typeID`.
pub async fn methods(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(raw): RawQuery,
) -> Result<Response, ApiError> {
    negotiate(&headers, V1_JSON)?;
    let q = Query::from_query_string(&METHOD, raw.as_deref())?;

    let pool = state.db.pool();
    if let Some(type_id) = q.type_id() {
        Resolver::new(pool).valid_type(type_id).await?;
    }

    let catalog = CatalogStore::new(pool).methods(q.type_id()).await?;
    json_response(&catalog, V1_JSON)
}

// ---------------------------------------------------------------------------
// State of health
// ---------------------------------------------------------------------------

/// 200 when `SELECT 1` succeeds, 503 otherwise.
pub async fn soh(State(state): State<Arc<AppState>>, RawQuery(raw): RawQuery) -> Result<Response, ApiError> {
    Query::from_query_string(&NONE, raw.as_deref())?;
    state.db.ping().await?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        "<html><head></head><body>ok</body></html>",
    )
        .into_response())
}

/// Always 200. Does not touch the database.
pub async fn soh_up() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], "ok")
}

/// 404 for every unrouted path.
pub async fn not_found() -> ApiError {
    ApiError::NotFound(StatusCode::NOT_FOUND.canonical_reason().unwrap_or("not found").to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_param_needs_a_value() {
        assert!(has_param(Some("siteID=TEST1&typeID=t1"), "siteID"));
        assert!(!has_param(Some("siteID=&typeID=t1"), "siteID"));
        assert!(!has_param(Some("typeID=t1"), "siteID"));
        assert!(!has_param(None, "siteID"));
    }

    #[test]
    fn required_missing_is_internal() {
        assert!(matches!(required(None, "siteID"), Err(ApiError::Internal(_))));
        assert_eq!(required(Some("x"), "siteID").ok(), Some("x"));
    }
}
