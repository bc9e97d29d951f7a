//! Error types for the plot engine.

/// Errors that can occur while rendering a plot.
#[derive(Debug, thiserror::Error)]
pub enum PlotError {
    /// A template failed to load or render.
    #[error("template error: {0}")]
    Template(String),
}
