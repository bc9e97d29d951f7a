//! Site GeoJSON handlers.

use std::sync::Arc;

use axum::extract::{RawQuery, State};
use axum::http::HeaderMap;
use axum::response::Response;
use fits_db::{Resolver, SiteFilter, SiteStore};
use fits_types::{FeatureCollection, Query, Schema};

use crate::error::ApiError;
use crate::handlers::{has_param, required};
use crate::shape::{V1_GEOJSON, json_response, negotiate};
use crate::state::AppState;

const SITE: Schema = Schema::new(&["siteID"], &["networkID"]);

const SITES: Schema = Schema::new(&[], &["typeID", "methodID", "within", "networkID"]);

/// `GET /site`, dispatching on `siteID`.
pub async fn site(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(raw): RawQuery,
) -> Result<Response, ApiError> {
    negotiate(&headers, V1_GEOJSON)?;
    if has_param(raw.as_deref(), "siteID") {
        single_site(&state, raw.as_deref()).await
    } else {
        sites(&state, raw.as_deref()).await
    }
}

/// One site as a collection of one feature.
async fn single_site(state: &AppState, raw: Option<&str>) -> Result<Response, ApiError> {
    let q = Query::from_query_string(&SITE, raw)?;
    let site_id = required(q.site_id(), "siteID")?;

    let site = SiteStore::new(state.db.pool()).get(site_id).await?;
    let fc: FeatureCollection = std::iter::once(site).collect();
    json_response(&fc, V1_GEOJSON)
}

async fn sites(state: &AppState, raw: Option<&str>) -> Result<Response, ApiError> {
    let q = Query::from_query_string(&SITES, raw)?;

    let pool = state.db.pool();
    let resolver = Resolver::new(pool);
    match (q.type_id(), q.method_id()) {
        (None, Some(_)) => {
            return Err(ApiError::BadRequest("methodID requires typeID".into()));
        }
        (Some(type_id), Some(method_id)) => {
            resolver.valid_type(type_id).await?;
            resolver.valid_type_method(type_id, method_id).await?;
        }
        (Some(type_id), None) => {
            resolver.valid_type(type_id).await?;
        }
        (None, None) => {}
    }
    if let Some(wkt) = q.within() {
        resolver.valid_poly(wkt).await?;
    }

    let filter = SiteFilter {
        type_id: q.type_id(),
        method_id: q.method_id(),
        within: q.within(),
    };
    let fc = SiteStore::new(pool).geojson(&filter).await?;
    json_response(&fc, V1_GEOJSON)
}
