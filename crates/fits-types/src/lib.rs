//! Shared type definitions for FITS (Field Time Series).
//!
//! This crate is the single source of truth for the entities served by the
//! HTTP API and written through the gRPC ingest service, and for the
//! validation of every query parameter the HTTP API recognizes.
//!
//! # Modules
//!
//! - [`model`] -- Sites, types, methods, observations and statistics
//! - [`geojson`] -- `GeoJSON` feature collections of sites
//! - [`results`] -- Chart results (raw series and daily means)
//! - [`bbox`] -- Map bounding boxes (numeric and named regions)
//! - [`valid`] -- Query parameter validation
//! - [`time`] -- Timestamp formatting shared by CSV and JSON output

pub mod bbox;
pub mod geojson;
pub mod model;
pub mod results;
pub mod time;
pub mod valid;

// Re-export primary types at crate root for convenience.
pub use bbox::Bbox;
pub use geojson::{Feature, FeatureCollection, Geometry, SiteProperties};
pub use model::{
    DEFAULT_SAMPLE_ID, Method, MethodCatalog, Observation, ObservationStats, ObservationType,
    Point, Site, StatsAccumulator, TypeCatalog,
};
pub use results::{DailyMean, ResultRow, ResultsDocument};
pub use valid::{Label, Param, PlotType, Query, Schema, Scheme, Srs, ValidationError, YRange};
