//! Plot inputs.
//!
//! A [`Plot`] collects labelled series and display options. It holds no
//! pixel values; those are computed when the plot is drawn.

use chrono::{DateTime, Utc};
use fits_types::valid::{Scheme, YRange};
use fits_types::Point;

/// A labelled run of points in ascending time order.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    /// Label shown in the key and used to pick the series colour.
    pub label: String,
    /// Points in ascending time order.
    pub points: Vec<Point>,
}

impl Series {
    /// Create a series.
    pub fn new(label: impl Into<String>, points: Vec<Point>) -> Self {
        Self {
            label: label.into(),
            points,
        }
    }
}

/// Everything needed to draw one plot.
#[derive(Debug, Clone, Default)]
pub struct Plot {
    pub(crate) title: String,
    pub(crate) y_label: String,
    pub(crate) unit: String,
    pub(crate) x_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub(crate) y_range: Option<YRange>,
    pub(crate) mean_stddev: Option<(f64, f64)>,
    pub(crate) scheme: Scheme,
    pub(crate) series: Vec<Series>,
}

impl Plot {
    /// Create an empty plot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Title drawn above the plot area.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Label drawn alongside the y axis.
    pub fn set_y_label(&mut self, label: impl Into<String>) {
        self.y_label = label.into();
    }

    /// Unit appended to the latest value.
    pub fn set_unit(&mut self, unit: impl Into<String>) {
        self.unit = unit.into();
    }

    /// Fix the x axis. Without this the axis spans the data.
    pub const fn set_x_axis(&mut self, min: DateTime<Utc>, max: DateTime<Utc>) {
        self.x_range = Some((min, max));
    }

    /// Fix the y axis, or center it on the data with a half height.
    /// Without this the axis spans the data and its errors.
    pub const fn set_y_range(&mut self, range: YRange) {
        self.y_range = Some(range);
    }

    /// Shade mean plus and minus one standard deviation.
    pub const fn set_mean_stddev(&mut self, mean: f64, stddev: f64) {
        self.mean_stddev = Some((mean, stddev));
    }

    /// Palette used for series colours.
    pub const fn set_scheme(&mut self, scheme: Scheme) {
        self.scheme = scheme;
    }

    /// Add a series.
    pub fn add_series(&mut self, series: Series) {
        self.series.push(series);
    }

    /// Series added so far.
    pub fn series(&self) -> &[Series] {
        &self.series
    }

    /// Drop every error value. Sparklines do not display errors and must not
    /// range on them.
    pub(crate) fn without_errors(&self) -> Self {
        let mut p = self.clone();
        for s in &mut p.series {
            for pt in &mut s.points {
                pt.error = 0.0;
            }
        }
        p
    }
}
