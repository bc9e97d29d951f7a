//! Integration tests for the FITS API endpoints.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server. The state holds a lazy pool pointed at a closed
//! port, so every request that fails validation before touching the
//! database is tested without one. Tests marked `#[ignore]` need a live
//! `PostgreSQL` with `PostGIS` reachable through the `DB_*` variables:
//!
//! ```bash
//! DB_USER=postgres DB_PASSWD=... cargo test -p fits-api -- --ignored
//! ```

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::float_cmp
)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use chrono::{TimeZone, Utc};
use fits_api::{AppState, build_router};
use fits_db::{ObservationStore, PostgresConfig, PostgresPool, SiteStore};
use fits_types::{DEFAULT_SAMPLE_ID, Observation, Site};
use serde_json::Value;
use tokio::sync::{Mutex, MutexGuard};
use tower::ServiceExt;

const TIMEOUT: Duration = Duration::from_secs(30);

/// Live tests share one schema, so they run one at a time.
static SCHEMA_LOCK: Mutex<()> = Mutex::const_new(());

// =============================================================================
// Helpers
// =============================================================================

/// A router whose database is never reachable.
fn offline_router() -> Router {
    let config = PostgresConfig {
        host: "127.0.0.1".to_owned(),
        port: 1,
        ..PostgresConfig::default()
    }
    .with_max_connections(1)
    .with_connect_timeout(Duration::from_secs(1));
    let pool = PostgresPool::connect_lazy(&config).unwrap();
    build_router(Arc::new(AppState::new(pool).unwrap()), TIMEOUT)
}

async fn send(app: Router, method: &str, uri: &str, accept: Option<&str>) -> Response {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(a) = accept {
        req = req.header(header::ACCEPT, a);
    }
    app.oneshot(req.body(Body::empty()).unwrap()).await.unwrap()
}

async fn get(app: Router, uri: &str) -> Response {
    send(app, "GET", uri, None).await
}

async fn body_string(resp: Response) -> String {
    let bytes = axum::body::to_bytes(resp.into_body(), 1 << 24).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn header_str<'r>(resp: &'r Response, name: &str) -> &'r str {
    resp.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

fn assert_text_error(resp: &Response, status: StatusCode) {
    assert_eq!(resp.status(), status);
    assert_eq!(header_str(resp, "content-type"), "text/plain; charset=utf-8");
}

// =============================================================================
// Methods and headers
// =============================================================================

#[tokio::test]
async fn post_is_not_allowed() {
    let resp = send(offline_router(), "POST", "/type", None).await;
    assert_text_error(&resp, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn delete_on_unknown_path_is_not_allowed() {
    let resp = send(offline_router(), "DELETE", "/nope", None).await;
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn options_is_empty_ok_with_cors() {
    let resp = send(offline_router(), "OPTIONS", "/observation", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(header_str(&resp, "access-control-allow-origin"), "*");
    assert_eq!(header_str(&resp, "access-control-allow-methods"), "GET, OPTIONS");
    assert!(body_string(resp).await.is_empty());
}

#[tokio::test]
async fn every_response_carries_cache_headers() {
    for uri in ["/soh/up", "/nope", "/site?bogus=1"] {
        let resp = get(offline_router(), uri).await;
        assert_eq!(header_str(&resp, "vary"), "Accept", "{uri}");
        assert_eq!(header_str(&resp, "cache-control"), "max-age=10", "{uri}");
        assert_eq!(header_str(&resp, "surrogate-control"), "max-age=10", "{uri}");
        assert_eq!(header_str(&resp, "access-control-allow-origin"), "*", "{uri}");
        assert_eq!(
            header_str(&resp, "access-control-allow-methods"),
            "GET, OPTIONS",
            "{uri}"
        );
    }
}

#[tokio::test]
async fn unknown_path_is_404_text() {
    let resp = get(offline_router(), "/observations").await;
    assert_text_error(&resp, StatusCode::NOT_FOUND);
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn soh_up_never_touches_the_database() {
    let resp = get(offline_router(), "/soh/up").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_string(resp).await, "ok");
}

#[tokio::test]
async fn soh_without_database_is_503() {
    let resp = get(offline_router(), "/soh").await;
    assert_text_error(&resp, StatusCode::SERVICE_UNAVAILABLE);
}

// =============================================================================
// Validation before any database access
// =============================================================================

#[tokio::test]
async fn unexpected_parameter_is_400() {
    let resp = get(offline_router(), "/observation?siteID=TEST1&typeID=t1&colour=red").await;
    assert_text_error(&resp, StatusCode::BAD_REQUEST);
    assert!(body_string(resp).await.contains("colour"));
}

#[tokio::test]
async fn duplicate_parameter_is_400() {
    let resp = get(offline_router(), "/observation?siteID=TEST1&siteID=TEST2&typeID=t1").await;
    assert_text_error(&resp, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_required_parameter_is_400() {
    let resp = get(offline_router(), "/observation/stats?siteID=TEST1").await;
    assert_text_error(&resp, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn spatial_days_beyond_a_week_is_400() {
    let resp = get(
        offline_router(),
        "/observation?typeID=t1&start=2010-01-01T00:00:00Z&days=8",
    )
    .await;
    assert_text_error(&resp, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bad_within_is_400() {
    let resp = get(offline_router(), "/site?within=DROP%20TABLE").await;
    assert_text_error(&resp, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn site_method_without_type_is_400() {
    let resp = get(offline_router(), "/site?methodID=m1").await;
    assert_text_error(&resp, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn map_with_site_and_sites_is_400() {
    let resp = get(offline_router(), "/map/site?siteID=TEST1&sites=TEST2").await;
    assert_text_error(&resp, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn plot_with_bad_yrange_is_400() {
    let resp = get(offline_router(), "/plot?siteID=TEST1&typeID=t1&yrange=3,1").await;
    assert_text_error(&resp, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn spark_label_must_be_known() {
    let resp = get(offline_router(), "/spark?siteID=TEST1&typeID=t1&label=some").await;
    assert_text_error(&resp, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn mismatched_accept_is_406() {
    let resp = send(
        offline_router(),
        "GET",
        "/type",
        Some("application/vnd.geo+json;version=1"),
    )
    .await;
    assert_text_error(&resp, StatusCode::NOT_ACCEPTABLE);
}

#[tokio::test]
async fn valid_query_without_database_is_503() {
    let resp = get(offline_router(), "/type").await;
    assert_text_error(&resp, StatusCode::SERVICE_UNAVAILABLE);
}

// =============================================================================
// Live database
// =============================================================================

async fn live_router() -> (MutexGuard<'static, ()>, PostgresPool, Router) {
    let guard = SCHEMA_LOCK.lock().await;
    let config = PostgresConfig::from_env().expect("bad DB_* environment");
    let pool = PostgresPool::connect(&config)
        .await
        .expect("Failed to connect to PostgreSQL -- is it running?");
    sqlx::raw_sql(include_str!("../../fits-db/tests/fixtures/fits.sql"))
        .execute(pool.pool())
        .await
        .expect("Failed to load fixture schema");

    SiteStore::new(pool.pool())
        .save(&Site {
            site_id: "TEST1".to_owned(),
            name: "Test site".to_owned(),
            longitude: 176.0,
            latitude: -38.0,
            height: 12.5,
            ground_relationship: -1.0,
        })
        .await
        .unwrap();

    let store = ObservationStore::new(pool.pool());
    for (d, v, e) in [(1, 1.0, 0.1), (2, 2.0, 0.2), (3, 3.0, 0.3)] {
        store
            .save(&Observation {
                site_id: "TEST1".to_owned(),
                type_id: "t1".to_owned(),
                method_id: "m1".to_owned(),
                sample_id: DEFAULT_SAMPLE_ID.to_owned(),
                time: Utc.with_ymd_and_hms(2010, 1, d, 0, 0, 0).unwrap(),
                value: v,
                error: e,
            })
            .await
            .unwrap();
    }

    let router = build_router(Arc::new(AppState::new(pool.clone()).unwrap()), TIMEOUT);
    (guard, pool, router)
}

#[tokio::test]
#[ignore = "requires live PostgreSQL instance with PostGIS"]
async fn live_site_observation_csv() {
    let (_guard, _pool, app) = live_router().await;
    let resp = get(app, "/observation?siteID=TEST1&typeID=t1").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(header_str(&resp, "content-type"), "text/csv;version=1");
    assert_eq!(
        header_str(&resp, "content-disposition"),
        "attachment; filename=\"FITS-TEST1-t1.csv\""
    );
    assert_eq!(
        body_string(resp).await,
        "date-time, t1 (mm), error (mm)\n\
         2010-01-01T00:00:00.000Z,1,0.1\n\
         2010-01-02T00:00:00.000Z,2,0.2\n\
         2010-01-03T00:00:00.000Z,3,0.3\n"
    );
}

#[tokio::test]
#[ignore = "requires live PostgreSQL instance with PostGIS"]
async fn live_empty_selection_is_header_only() {
    let (_guard, _pool, app) = live_router().await;
    let resp = get(app, "/observation?siteID=TEST1&typeID=t1&methodID=m2").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_string(resp).await, "date-time, t1 (mm), error (mm)\n");
}

#[tokio::test]
#[ignore = "requires live PostgreSQL instance with PostGIS"]
async fn live_unknown_site_is_404() {
    let (_guard, _pool, app) = live_router().await;
    let resp = get(app, "/observation?siteID=NOPE&typeID=t1").await;
    assert_text_error(&resp, StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "requires live PostgreSQL instance with PostGIS"]
async fn live_stats_json() {
    let (_guard, _pool, app) = live_router().await;
    let resp = get(app, "/observation/stats?siteID=TEST1&typeID=t1").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(header_str(&resp, "content-type"), "application/json;version=1");

    let json: Value = serde_json::from_str(&body_string(resp).await).unwrap();
    assert_eq!(json["Mean"], 2.0);
    assert_eq!(json["Unit"], "mm");
    assert_eq!(json["Maximum"]["Value"], 3.0);
    assert!(
        json["First"]["DateTime"]
            .as_str()
            .unwrap()
            .starts_with("2010-01-01T00:00:00")
    );
}

#[tokio::test]
#[ignore = "requires live PostgreSQL instance with PostGIS"]
async fn live_type_catalog() {
    let (_guard, _pool, app) = live_router().await;
    let resp = get(app, "/type").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json: Value = serde_json::from_str(&body_string(resp).await).unwrap();
    assert_eq!(json["type"][0]["typeID"], "t1");
}

#[tokio::test]
#[ignore = "requires live PostgreSQL instance with PostGIS"]
async fn live_plot_is_full_size_svg() {
    let (_guard, _pool, app) = live_router().await;
    let resp = get(app, "/plot?siteID=TEST1&typeID=t1").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(header_str(&resp, "content-type"), "image/svg+xml");
    let svg = body_string(resp).await;
    assert!(svg.contains("width=\"800\""));
    assert!(svg.contains("height=\"270\""));
}

#[tokio::test]
#[ignore = "requires live PostgreSQL instance with PostGIS"]
async fn live_site_geojson() {
    let (_guard, _pool, app) = live_router().await;
    let resp = get(app, "/site?siteID=TEST1").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        header_str(&resp, "content-type"),
        "application/vnd.geo+json;version=1"
    );
    let json: Value = serde_json::from_str(&body_string(resp).await).unwrap();
    assert_eq!(json["features"][0]["properties"]["siteID"], "TEST1");
}
