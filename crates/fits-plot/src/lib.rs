//! SVG time series plots for FITS.
//!
//! A [`Plot`] gathers labelled series and options; a [`Renderer`] scales it
//! into a fixed viewport, lays out axes and the key, and fills an SVG
//! template. Five layouts are available: the 800 by 270 plot (line or
//! scatter) and the sparkline (line or scatter) with three label styles.
//!
//! # Modules
//!
//! - [`model`] -- Plot inputs
//! - [`scale`] -- Data to pixel mapping and range alerts
//! - [`axes`] -- Grid and tick labels
//! - [`colour`] -- Palettes and label-stable colour assignment
//! - [`key`] -- Key entries
//! - [`render`] -- Template rendering
//! - [`error`] -- Error types

pub mod axes;
pub mod colour;
pub mod error;
pub mod key;
pub mod model;
pub mod render;
pub mod scale;

// Re-export primary types for convenience.
pub use error::PlotError;
pub use model::{Plot, Series};
pub use render::Renderer;
