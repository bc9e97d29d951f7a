//! Shared application state for the HTTP API.
//!
//! Handlers share one [`AppState`] behind an `Arc`. It holds the database
//! pool and the compiled SVG templates; neither is mutated while serving.

use fits_db::PostgresPool;
use fits_plot::{PlotError, Renderer};

use crate::map::MapRenderer;

/// State shared by every request.
pub struct AppState {
    /// Database connection pool.
    pub db: PostgresPool,
    /// Plot and sparkline templates.
    pub plots: Renderer,
    /// Site map template.
    pub maps: MapRenderer,
}

impl AppState {
    /// Build state around a pool, compiling every template.
    pub fn new(db: PostgresPool) -> Result<Self, PlotError> {
        Ok(Self {
            db,
            plots: Renderer::new()?,
            maps: MapRenderer::new()?,
        })
    }
}
