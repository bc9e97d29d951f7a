//! Observation handlers: CSV series, spatial CSV, statistics and results.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/observation?siteID=..` | One site's series as CSV |
//! | `GET` | `/observation?typeID=..&start=..&days=..` | Every site's series in a time window as CSV |
//! | `GET` | `/observation/stats` | Summary statistics as JSON |
//! | `GET` | `/observation_results` | Raw or daily mean results as JSON |

use std::sync::Arc;

use axum::extract::{RawQuery, State};
use axum::http::HeaderMap;
use axum::response::Response;
use chrono::{Duration, Utc};
use fits_db::{ObservationStore, Resolver, SeriesSelection, SpatialSelection, TimeWindow};
use fits_types::{Query, ResultsDocument, Schema};
use tracing::debug;

use crate::error::ApiError;
use crate::handlers::{has_param, required};
use crate::shape::{Csv, V1_CSV, V1_JSON, csv_filename, csv_response, json_response, negotiate};
use crate::state::AppState;

/// Longest spatial selection, in days.
pub const MAX_SPATIAL_DAYS: u32 = 7;

const SITE_OBSERVATION: Schema = Schema::new(
    &["siteID", "typeID"],
    &["networkID", "days", "methodID", "start"],
);

const SPATIAL_OBSERVATION: Schema = Schema::new(
    &["typeID", "days", "start"],
    &["srsName", "within", "methodID"],
);

const STATS: Schema = Schema::new(
    &["siteID", "typeID"],
    &["networkID", "days", "methodID", "start"],
);

const RESULTS: Schema = Schema::new(&["siteID", "typeID"], &[]);

// ---------------------------------------------------------------------------
// GET /observation
// ---------------------------------------------------------------------------

/// `GET /observation`, dispatching on `siteID`.
pub async fn observation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(raw): RawQuery,
) -> Result<Response, ApiError> {
    negotiate(&headers, V1_CSV)?;
    if has_param(raw.as_deref(), "siteID") {
        site_observation(&state, raw.as_deref()).await
    } else {
        spatial_observation(&state, raw.as_deref()).await
    }
}

async fn site_observation(state: &AppState, raw: Option<&str>) -> Result<Response, ApiError> {
    let q = Query::from_query_string(&SITE_OBSERVATION, raw)?;
    let site_id = required(q.site_id(), "siteID")?;
    let type_id = required(q.type_id(), "typeID")?;

    let pool = state.db.pool();
    let resolver = Resolver::new(pool);
    resolver.valid_site(site_id).await?;
    let typ = resolver.valid_type(type_id).await?;
    if let Some(method_id) = q.method_id() {
        resolver.valid_type_method(type_id, method_id).await?;
    }

    let sel = SeriesSelection {
        site_id,
        type_id,
        method_id: q.method_id(),
        window: TimeWindow::from_query(q.days(), q.start(), Utc::now()),
    };

    let mut csv = Csv::series(type_id, &typ.unit);
    let rows = ObservationStore::new(pool)
        .scan_series(&sel, |p| csv.push_point(&p))
        .await?;
    debug!(site_id, type_id, rows, "observation csv");

    let filename = csv_filename(&[Some(site_id), Some(type_id), q.method_id()]);
    Ok(csv_response(csv.into_string(), &filename))
}

async fn spatial_observation(state: &AppState, raw: Option<&str>) -> Result<Response, ApiError> {
    let q = Query::from_query_string(&SPATIAL_OBSERVATION, raw)?;
    let type_id = required(q.type_id(), "typeID")?;
    let start = q
        .start()
        .ok_or_else(|| ApiError::Internal("start required by schema but missing".into()))?;

    let days = q.days();
    if !(1..=MAX_SPATIAL_DAYS).contains(&days) {
        return Err(ApiError::BadRequest(format!(
            "days must be between 1 and {MAX_SPATIAL_DAYS}"
        )));
    }
    let end = start
        .checked_add_signed(Duration::days(i64::from(days)))
        .ok_or_else(|| ApiError::BadRequest("start plus days is out of range".into()))?;

    let srs = q.srs();
    let pool = state.db.pool();
    let resolver = Resolver::new(pool);
    let typ = resolver.valid_type(type_id).await?;
    if let Some(method_id) = q.method_id() {
        resolver.valid_type_method(type_id, method_id).await?;
    }
    resolver.valid_srs(&srs).await?;
    if let Some(wkt) = q.within() {
        resolver.valid_poly(wkt).await?;
    }

    let sel = SpatialSelection {
        type_id,
        method_id: q.method_id(),
        start,
        end,
        within: q.within(),
        srid: srs.id,
    };

    let mut csv = Csv::spatial(type_id, &typ.unit, &srs.to_string());
    let rows = ObservationStore::new(pool)
        .scan_spatial(&sel, |r| csv.push_spatial(&r))
        .await?;
    debug!(type_id, days, rows, srs = %srs, "spatial observation csv");

    let filename = csv_filename(&[Some(type_id), q.method_id()]);
    Ok(csv_response(csv.into_string(), &filename))
}

// ---------------------------------------------------------------------------
// GET /observation/stats
// ---------------------------------------------------------------------------

/// `GET /observation/stats`. An empty selection is 404.
pub async fn stats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(raw): RawQuery,
) -> Result<Response, ApiError> {
    negotiate(&headers, V1_JSON)?;
    let q = Query::from_query_string(&STATS, raw.as_deref())?;
    let site_id = required(q.site_id(), "siteID")?;
    let type_id = required(q.type_id(), "typeID")?;

    let pool = state.db.pool();
    let resolver = Resolver::new(pool);
    resolver.valid_site(site_id).await?;
    let typ = resolver.valid_type(type_id).await?;
    if let Some(method_id) = q.method_id() {
        resolver.valid_type_method(type_id, method_id).await?;
    }

    let sel = SeriesSelection {
        site_id,
        type_id,
        method_id: q.method_id(),
        window: TimeWindow::from_query(q.days(), q.start(), Utc::now()),
    };

    let stats = ObservationStore::new(pool).stats(&sel, &typ.unit).await?;
    json_response(&stats, V1_JSON)
}

// ---------------------------------------------------------------------------
// GET /observation_results
// ---------------------------------------------------------------------------

/// `GET /observation_results`. `siteID` is a comma separated list; one site
/// gives the raw series, several give daily means.
pub async fn results(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(raw): RawQuery,
) -> Result<Response, ApiError> {
    negotiate(&headers, V1_JSON)?;
    let q = Query::from_query_string(&RESULTS, raw.as_deref())?;
    let type_id = required(q.type_id(), "typeID")?;
    let site_ids: Vec<String> = required(q.site_id(), "siteID")?
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect();

    let pool = state.db.pool();
    let resolver = Resolver::new(pool);
    resolver.valid_type(type_id).await?;
    for id in &site_ids {
        resolver.valid_site(id).await?;
    }

    let store = ObservationStore::new(pool);
    let doc = match site_ids.as_slice() {
        [] => return Err(ApiError::BadRequest("siteID: no sites given".into())),
        [site_id] => {
            let sel = SeriesSelection {
                site_id,
                type_id,
                method_id: None,
                window: TimeWindow::unbounded(),
            };
            ResultsDocument::raw(type_id, site_id, store.series(&sel).await?)
        }
        sites => ResultsDocument::daily(type_id, sites, &store.daily_means(type_id, sites).await?),
    };

    json_response(&doc, V1_JSON)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spatial_schema_requires_window() {
        let err = Query::from_query_string(&SPATIAL_OBSERVATION, Some("typeID=e&days=1"));
        assert!(err.is_err());
    }

    #[test]
    fn site_schema_rejects_spatial_params() {
        let err = Query::from_query_string(&SITE_OBSERVATION, Some("siteID=A&typeID=e&srsName=EPSG:2193"));
        assert!(err.is_err());
    }
}
