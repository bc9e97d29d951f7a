//! Mapping data onto the plot area.
//!
//! Pixel coordinates have their origin at the top left of the plot area,
//! so larger values sit at smaller y.

use chrono::{DateTime, Duration, Utc};
use fits_types::Point;
use fits_types::valid::YRange;
use serde::Serialize;

use crate::model::Plot;

/// A point in plot pixels with its error bar half height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Px {
    /// Horizontal position.
    pub x: i64,
    /// Vertical position.
    pub y: i64,
    /// Error bar half height.
    pub e: i64,
}

/// Nearest pixel, rounding half away from zero. Saturates off the plot.
#[allow(clippy::cast_possible_truncation)]
fn round_px(v: f64) -> i64 {
    v.round() as i64
}

#[allow(clippy::cast_possible_truncation)]
fn trunc_px(v: f64) -> i64 {
    v as i64
}

#[allow(clippy::cast_precision_loss)]
fn seconds(d: Duration) -> f64 {
    d.num_milliseconds() as f64 / 1000.0
}

/// First, last, lowest and highest points across every series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extremes {
    /// Earliest point.
    pub first: Point,
    /// Latest point.
    pub last: Point,
    /// Lowest value.
    pub min: Point,
    /// Highest value.
    pub max: Point,
}

impl Extremes {
    /// `None` when no series holds a point.
    pub fn of(plot: &Plot) -> Option<Self> {
        let mut points = plot.series.iter().flat_map(|s| s.points.iter());
        let p = points.next()?;
        let mut x = Self {
            first: *p,
            last: *p,
            min: *p,
            max: *p,
        };
        for p in points {
            if p.time < x.first.time {
                x.first = *p;
            }
            if p.time > x.last.time {
                x.last = *p;
            }
            if p.value < x.min.value {
                x.min = *p;
            }
            if p.value > x.max.value {
                x.max = *p;
            }
        }
        Some(x)
    }
}

/// Mean and standard deviation band in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    /// Mean value.
    pub mean: f64,
    /// Standard deviation.
    pub stddev: f64,
    /// Top of the band.
    pub y: i64,
    /// Band height.
    pub h: i64,
    /// Mean line.
    pub m: i64,
}

/// One series in pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaledSeries {
    /// Series label.
    pub label: String,
    /// Whether any point has a non zero error.
    pub has_errors: bool,
    /// Points in time order.
    pub pts: Vec<Px>,
}

/// A plot mapped onto a `width` by `height` pixel area.
#[derive(Debug, Clone, PartialEq)]
pub struct Scaled {
    /// Plot area width.
    pub width: i64,
    /// Plot area height.
    pub height: i64,
    /// Left edge of the x axis.
    pub x_min: DateTime<Utc>,
    /// Right edge of the x axis.
    pub x_max: DateTime<Utc>,
    /// Bottom of the y axis.
    pub y_min: f64,
    /// Top of the y axis.
    pub y_max: f64,
    /// Pixels per second.
    pub dx: f64,
    /// Pixels per value unit.
    pub dy: f64,
    /// Series in pixels, in the order they were added.
    pub series: Vec<ScaledSeries>,
    /// Data extremes, `None` for an empty plot.
    pub extremes: Option<Extremes>,
    /// Set when any point or its error bar falls outside the plot area.
    pub range_alert: bool,
    /// Mean and standard deviation band, when requested.
    pub band: Option<Band>,
}

impl Scaled {
    /// Scale `plot` onto a `width` by `height` area. `now` stands in for the
    /// data when the plot is empty and no x axis was set.
    pub fn new(plot: &Plot, width: i64, height: i64, now: DateTime<Utc>) -> Self {
        let extremes = Extremes::of(plot);

        let (mut x_min, mut x_max) = plot.x_range.unwrap_or_else(|| {
            extremes.map_or_else(
                || (now.checked_sub_signed(Duration::days(1)).unwrap_or(now), now),
                |e| (e.first.time, e.last.time),
            )
        });
        if x_max <= x_min {
            x_min = x_min.checked_sub_signed(Duration::days(1)).unwrap_or(x_min);
            x_max = x_max.checked_add_signed(Duration::days(1)).unwrap_or(x_max);
        }

        let (y_min, y_max) = y_bounds(plot.y_range, extremes.as_ref());

        #[allow(clippy::cast_precision_loss)]
        let (w, h) = (width as f64, height as f64);
        let dx = w / seconds(x_max.signed_duration_since(x_min));
        let dy = h / (y_max - y_min);

        let mut s = Self {
            width,
            height,
            x_min,
            x_max,
            y_min,
            y_max,
            dx,
            dy,
            series: Vec::with_capacity(plot.series.len()),
            extremes,
            range_alert: false,
            band: None,
        };

        for series in &plot.series {
            let pts: Vec<Px> = series.points.iter().map(|p| s.px(p)).collect();
            if pts
                .iter()
                .any(|p| p.y.saturating_sub(p.e) < 0 || p.y.saturating_add(p.e) > height)
            {
                s.range_alert = true;
            }
            s.series.push(ScaledSeries {
                label: series.label.clone(),
                has_errors: series.points.iter().any(|p| p.error > 0.0),
                pts,
            });
        }

        s.band = plot.mean_stddev.map(|(mean, stddev)| Band {
            mean,
            stddev,
            y: s.y(mean + stddev),
            h: round_px(stddev * 2.0 * dy),
            m: s.y(mean),
        });

        s
    }

    /// Horizontal pixel for a time.
    pub fn x(&self, t: DateTime<Utc>) -> i64 {
        round_px(seconds(t.signed_duration_since(self.x_min)) * self.dx)
    }

    /// Vertical pixel for a value.
    pub fn y(&self, v: f64) -> i64 {
        self.height.saturating_sub(round_px((v - self.y_min) * self.dy))
    }

    /// A point in pixels.
    pub fn px(&self, p: &Point) -> Px {
        Px {
            x: self.x(p.time),
            y: self.y(p.value),
            e: trunc_px(p.error * self.dy),
        }
    }
}

/// Smallest y span, relative to the larger bound, kept as given.
const MIN_RELATIVE_SPAN: f64 = 1e-12;

/// Smallest absolute y span kept as given.
const MIN_SPAN: f64 = 1e-300;

/// The y axis bounds. A range too narrow to divide is widened about its
/// middle by one unit each way, or by a millionth of the middle when that
/// is larger. An overflowing range is narrowed to half of `f64::MAX`.
fn y_bounds(range: Option<YRange>, extremes: Option<&Extremes>) -> (f64, f64) {
    let (lo, hi) = match (range, extremes) {
        (Some(YRange::Fixed { min, max }), _) => (min.min(max), min.max(max)),
        (Some(YRange::Symmetric(r)), e) => {
            let mid = e.map_or(0.0, |e| e.min.value + (e.max.value - e.min.value).abs() / 2.0);
            (mid - r, mid + r)
        }
        (None, Some(e)) => {
            let mut lo = e.min.value - e.min.error;
            let hi = e.max.value + e.max.error;
            // Show the x axis when it nearly fits anyway.
            if lo > 0.0 && lo / (hi - lo).abs() < 0.1 {
                lo = 0.0;
            }
            (lo, hi)
        }
        (None, None) => (0.0, 0.0),
    };

    if !(lo.is_finite() && hi.is_finite()) {
        return (-1.0, 1.0);
    }

    let mid = lo / 2.0 + hi / 2.0;
    let span = hi - lo;
    if !span.is_finite() {
        let half = f64::MAX / 4.0;
        return (mid - half, mid + half);
    }

    if span >= MIN_SPAN && span > lo.abs().max(hi.abs()) * MIN_RELATIVE_SPAN {
        (lo, hi)
    } else {
        let d = 1f64.max(mid.abs() * 1e-6);
        (mid - d, mid + d)
    }
}
