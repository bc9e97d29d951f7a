//! Read-only HTTP API for FITS (field time series) observations.
//!
//! Serves observation CSV, statistics and results JSON, site GeoJSON, type
//! and method catalogs, SVG plots, sparklines and site maps from a
//! PostgreSQL/PostGIS database.
//!
//! # Modules
//!
//! - [`router`]: the path table, method gate and response headers
//! - [`shape`]: content negotiation, CSV tables and response builders
//! - [`observation`], [`site`], [`plot`], [`map`], [`handlers`]: handlers
//! - [`projection`]: EPSG:3857 layout for site maps
//! - [`server`]: bind, serve and shut down
//!
//! Every response carries `Vary: Accept`, a ten second cache lifetime and
//! open CORS headers. Errors are one line of `text/plain`.

pub mod error;
pub mod handlers;
pub mod map;
pub mod observation;
pub mod plot;
pub mod projection;
pub mod router;
pub mod server;
pub mod shape;
pub mod site;
pub mod state;

// Re-export primary types for convenience.
pub use error::ApiError;
pub use router::build_router;
pub use server::{ServerConfig, ServerError, start_server};
pub use state::AppState;
