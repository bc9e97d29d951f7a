//! Axum router construction for the FITS API.
//!
//! Every route answers `GET` and `OPTIONS` only. Cache and CORS headers are
//! set on every response, including errors.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::Request;
use axum::http::header::{self, HeaderName, HeaderValue};
use axum::http::{Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::state::AppState;
use crate::{handlers, map, observation, plot, site};

/// Build the complete Axum router for the FITS API.
///
/// | Path | Handler |
/// |------|---------|
/// | `/spark` | [`plot::spark`] |
/// | `/map/site` | [`map::site_map`] |
/// | `/observation_results` | [`observation::results`] |
/// | `/observation/stats` | [`observation::stats`] |
/// | `/type` | [`handlers::types`] |
/// | `/method` | [`handlers::methods`] |
/// | `/plot` | [`plot::plot`] |
/// | `/observation` | [`observation::observation`] |
/// | `/site` | [`site::site`] |
/// | `/soh/up` | [`handlers::soh_up`] |
/// | `/soh` | [`handlers::soh`] |
///
/// Anything else is 404.
pub fn build_router(state: Arc<AppState>, timeout: Duration) -> Router {
    Router::new()
        .route("/spark", get(plot::spark))
        .route("/map/site", get(map::site_map))
        .route("/observation_results", get(observation::results))
        .route("/observation/stats", get(observation::stats))
        .route("/type", get(handlers::types))
        .route("/method", get(handlers::methods))
        .route("/plot", get(plot::plot))
        .route("/observation", get(observation::observation))
        .route("/site", get(site::site))
        .route("/soh/up", get(handlers::soh_up))
        .route("/soh", get(handlers::soh))
        .fallback(handlers::not_found)
        .layer(middleware::from_fn(get_or_options))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .layer(always(header::VARY, "Accept"))
        .layer(always(header::CACHE_CONTROL, "max-age=10"))
        .layer(always(HeaderName::from_static("surrogate-control"), "max-age=10"))
        .layer(always(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .layer(always(header::ACCESS_CONTROL_ALLOW_METHODS, "GET, OPTIONS"))
        .with_state(state)
}

fn always(name: HeaderName, value: &'static str) -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(name, HeaderValue::from_static(value))
}

/// `OPTIONS` is answered here with an empty 200. Anything but `GET` is 405.
async fn get_or_options(req: Request, next: Next) -> Response {
    match *req.method() {
        Method::GET => next.run(req).await,
        Method::OPTIONS => StatusCode::OK.into_response(),
        _ => ApiError::MethodNotAllowed.into_response(),
    }
}
