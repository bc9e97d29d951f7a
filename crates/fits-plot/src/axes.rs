//! Grid lines and axis labels.
//!
//! Major ticks carry a label, minor ticks do not.

use chrono::{Datelike, TimeZone, Utc};
use serde::Serialize;

use crate::scale::Scaled;

/// Minimum spacing in pixels between x axis labels.
const MIN_LABEL_SPACING: i64 = 60;

/// Minimum spacing in pixels between minor y ticks.
const MIN_MINOR_SPACING: f64 = 7.0;

/// Most ticks drawn on the y axis, major and minor together.
const MAX_Y_TICKS: i64 = 200;

/// A tick at a pixel offset along its axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tick {
    /// Pixel offset along the axis.
    pub pos: i64,
    /// Label for major ticks.
    pub label: Option<String>,
}

/// Ticks for both axes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Axes {
    /// Ticks along the x axis.
    pub x: Vec<Tick>,
    /// Ticks along the y axis, major first.
    pub y: Vec<Tick>,
    /// Pixel row of y = 0 when it is in range.
    pub x_axis_y: Option<i64>,
}

impl Axes {
    /// Lay out ticks for a scaled plot.
    pub fn new(s: &Scaled) -> Self {
        let (y, x_axis_y) = y_ticks(s);
        Self {
            x: x_ticks(s),
            y,
            x_axis_y,
        }
    }
}

#[allow(
    clippy::float_cmp,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss
)]
fn y_ticks(s: &Scaled) -> (Vec<Tick>, Option<i64>) {
    let span = (s.y_max - s.y_min).abs();
    let long_label = span <= 0.1;
    let e = span.log10().floor();
    let mut major = 10f64.powf(e);
    let mut minor = 10f64.powf(e - 1.0);
    if major == span {
        major /= 2.0;
    }
    if !(major.is_normal() && minor.is_normal() && major > 0.0) {
        return (Vec::new(), None);
    }

    let lo = ((s.y_min / major).floor() as i64).saturating_sub(1);
    let hi = ((s.y_max / major).floor() as i64).saturating_add(1);
    let start = lo as f64 * major;
    let end = hi as f64 * major;

    let mut ticks = Vec::new();
    let mut x_axis_y = None;

    for k in lo..hi.min(lo.saturating_add(MAX_Y_TICKS)) {
        let v = k as f64 * major;
        if v < s.y_min || v > s.y_max {
            continue;
        }
        let pos = s.y(v);
        let label = if long_label { format!("{v:.2}") } else { format!("{v:.1}") };
        ticks.push(Tick {
            pos,
            label: Some(label),
        });
        if k == 0 {
            x_axis_y = Some(pos);
        }
    }

    if minor * s.dy < MIN_MINOR_SPACING {
        minor *= 5.0;
    }
    let steps = ((end - start) / minor).ceil().max(0.0) as i64;
    for j in 0..steps.min(MAX_Y_TICKS) {
        let v = start + j as f64 * minor;
        if v >= s.y_min && v <= s.y_max {
            ticks.push(Tick { pos: s.y(v), label: None });
        }
    }

    (ticks, x_axis_y)
}

fn x_ticks(s: &Scaled) -> Vec<Tick> {
    let first_year = s.x_min.year();
    let last_year = s.x_max.year();
    let years = i64::from(last_year.saturating_sub(first_year));
    let months = s.x_max.signed_duration_since(s.x_min).num_days().checked_div(28).unwrap_or(0);

    let per = |n: i64| s.width.checked_div(n).unwrap_or(i64::MAX);
    let (label_year, show_month) = if years == 0 || months == 0 {
        (true, true)
    } else if per(years) < MIN_LABEL_SPACING {
        (false, false)
    } else if per(months) < MIN_LABEL_SPACING {
        (true, false)
    } else {
        (true, true)
    };

    let mut ticks = Vec::new();

    for year in first_year.saturating_add(1)..=last_year {
        let Some(t) = Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).single() else {
            continue;
        };
        let label = ((label_year || year.checked_rem(5) == Some(0)) && !show_month).then(|| year.to_string());
        ticks.push(Tick { pos: s.x(t), label });
    }

    if show_month {
        for year in first_year.saturating_sub(1)..=last_year.saturating_add(1) {
            for month in 1..=12 {
                let Some(t) = Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single() else {
                    continue;
                };
                if t > s.x_min && t < s.x_max {
                    ticks.push(Tick {
                        pos: s.x(t),
                        label: Some(format!("{year}-{month:02}")),
                    });
                }
            }
        }
    }

    ticks
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::DateTime;
    use fits_types::Point;
    use fits_types::valid::YRange;

    use super::*;
    use crate::model::{Plot, Series};

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn scaled(from: DateTime<Utc>, to: DateTime<Utc>, range: YRange) -> Scaled {
        let mut p = Plot::new();
        p.add_series(Series::new("A", vec![Point::new(from, 1.0, 0.0)]));
        p.set_x_axis(from, to);
        p.set_y_range(range);
        Scaled::new(&p, 600, 170, to)
    }

    fn labels(ticks: &[Tick]) -> Vec<&str> {
        ticks.iter().filter_map(|t| t.label.as_deref()).collect()
    }

    #[test]
    fn y_labels_one_decimal() {
        let s = scaled(at(2010, 1, 1), at(2010, 1, 3), YRange::Fixed { min: 0.0, max: 4.0 });
        let a = Axes::new(&s);
        assert_eq!(labels(&a.y), vec!["0.0", "1.0", "2.0", "3.0", "4.0"]);
        assert_eq!(a.x_axis_y, Some(170));
    }

    #[test]
    fn y_major_halved_on_exact_decade() {
        let s = scaled(at(2010, 1, 1), at(2010, 1, 3), YRange::Fixed { min: 0.0, max: 10.0 });
        let a = Axes::new(&s);
        assert_eq!(labels(&a.y), vec!["0.0", "5.0", "10.0"]);
    }

    #[test]
    fn y_labels_two_decimals_for_small_range() {
        let s = scaled(at(2010, 1, 1), at(2010, 1, 3), YRange::Fixed { min: 0.0, max: 0.05 });
        let a = Axes::new(&s);
        let l = labels(&a.y);
        assert!(l.contains(&"0.00"));
        assert!(l.iter().all(|s| s.split('.').nth(1).unwrap().len() == 2));
    }

    #[test]
    fn y_axis_hidden_when_zero_out_of_range() {
        let s = scaled(at(2010, 1, 1), at(2010, 1, 3), YRange::Fixed { min: 5.0, max: 9.0 });
        assert_eq!(Axes::new(&s).x_axis_y, None);
    }

    #[test]
    fn symmetric_labels_bracket_data() {
        let mut p = Plot::new();
        p.add_series(Series::new(
            "TEST1",
            vec![
                Point::new(at(2010, 1, 1), 1.0, 0.1),
                Point::new(at(2010, 1, 2), 2.0, 0.2),
                Point::new(at(2010, 1, 3), 3.0, 0.3),
            ],
        ));
        p.set_y_range(YRange::Symmetric(12.2));
        let a = Axes::new(&Scaled::new(&p, 600, 170, at(2020, 1, 1)));
        let values: Vec<f64> = labels(&a.y).iter().map(|l| l.parse().unwrap()).collect();
        let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        assert!(lo <= -4.1);
        assert!(hi >= 8.1);
    }

    #[test]
    fn minor_ticks_thin_out() {
        let s = scaled(at(2010, 1, 1), at(2010, 1, 3), YRange::Fixed { min: 0.0, max: 90.0 });
        let a = Axes::new(&s);
        let minor: Vec<i64> = a.y.iter().filter(|t| t.label.is_none()).map(|t| t.pos).collect();
        assert!(minor.windows(2).all(|w| w[0].abs_diff(w[1]) >= 7));
    }

    fn y_ticks_for(min: f64, max: f64) -> Vec<Tick> {
        Axes::new(&scaled(at(2010, 1, 1), at(2010, 1, 3), YRange::Fixed { min, max })).y
    }

    #[test]
    fn degenerate_ranges_give_bounded_ticks() {
        for (min, max) in [(0.0, 1e-323), (0.0, 1e-300), (-1e308, 1e308), (1e16, 1e16 + 2.0)] {
            let y = y_ticks_for(min, max);
            assert!(y.len() <= 2 * usize::try_from(MAX_Y_TICKS).unwrap(), "{min},{max}");
            assert!(y.iter().any(|t| t.label.is_some()), "{min},{max}");
            assert!(y.iter().all(|t| (0..=170).contains(&t.pos)), "{min},{max}");
        }
    }

    #[test]
    fn huge_range_keeps_labels() {
        let y = y_ticks_for(-1e308, 1e308);
        assert!(labels(&y).len() >= 2);
    }

    #[test]
    fn months_labelled_within_a_year() {
        let s = scaled(at(2010, 1, 15), at(2010, 6, 15), YRange::Fixed { min: 0.0, max: 4.0 });
        let a = Axes::new(&s);
        assert_eq!(labels(&a.x), vec!["2010-02", "2010-03", "2010-04", "2010-05", "2010-06"]);
    }

    #[test]
    fn years_labelled_over_a_decade() {
        let s = scaled(at(2001, 6, 1), at(2009, 6, 1), YRange::Fixed { min: 0.0, max: 4.0 });
        let a = Axes::new(&s);
        let l = labels(&a.x);
        assert_eq!(l.first(), Some(&"2002"));
        assert_eq!(l.len(), 8);
    }

    #[test]
    fn sparse_years_over_a_long_span() {
        let s = scaled(at(1950, 1, 1), at(2020, 1, 1), YRange::Fixed { min: 0.0, max: 4.0 });
        let a = Axes::new(&s);
        let l = labels(&a.x);
        assert!(l.iter().all(|y| y.parse::<i32>().unwrap().checked_rem(5) == Some(0)));
        assert!(a.x.len() > l.len());
    }
}
