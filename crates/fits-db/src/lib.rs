//! `PostgreSQL`/`PostGIS` data layer for FITS.
//!
//! All persistent state lives in the `fits` schema. This crate resolves
//! request identifiers, runs the fixed set of observation and site queries,
//! and performs the two ingest writes (site upsert, observation upsert).
//!
//! # Architecture
//!
//! ```text
//! PostgresPool (PgPool, shared per process)
//!     |
//!     +-- Resolver          (site/type/method/sample/SRS/polygon checks)
//!     +-- ObservationStore  (series, stats, spatial, daily means, upsert)
//!     +-- SiteStore         (GeoJSON collections, upsert, delete)
//!     +-- CatalogStore      (type and method catalogs)
//!     +-- MapLayerStore     (land/lake outlines for site maps)
//! ```
//!
//! # Modules
//!
//! - [`postgres`] -- Connection pool and environment configuration
//! - [`resolver`] -- Identifier resolution
//! - [`observation_store`] -- Observation queries and ingest
//! - [`site_store`] -- Site queries and writes
//! - [`catalog_store`] -- Type and method catalogs
//! - [`map_layers`] -- Map outline queries
//! - [`error`] -- Shared error types

pub mod catalog_store;
pub mod error;
pub mod map_layers;
pub mod observation_store;
pub mod postgres;
pub mod resolver;
pub mod site_store;

// Re-export primary types for convenience.
pub use catalog_store::CatalogStore;
pub use error::DbError;
pub use map_layers::{LayerWindow, MapLayerStore};
pub use observation_store::{
    ObservationStore, SeriesSelection, SpatialRow, SpatialSelection, TimeWindow,
};
pub use postgres::{PostgresConfig, PostgresPool};
pub use resolver::Resolver;
pub use site_store::{SiteFilter, SiteStore};
