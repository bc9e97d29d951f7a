//! SVG rendering via `minijinja`.
//!
//! Templates are compiled into the binary. They receive a fully scaled
//! context of integers and preformatted strings and do no arithmetic.

use chrono::{DateTime, Utc};
use fits_types::time::date;
use fits_types::valid::{Label, PlotType};
use minijinja::{AutoEscape, Environment};
use serde::Serialize;

use crate::axes::{Axes, Tick};
use crate::colour;
use crate::error::PlotError;
use crate::key::{self, KeyEntry};
use crate::model::Plot;
use crate::scale::{Px, Scaled};

/// Plot area width of the full plot.
pub const PLOT_WIDTH: i64 = 600;
/// Plot area height of the full plot.
pub const PLOT_HEIGHT: i64 = 170;
/// Plot area width of a sparkline.
pub const SPARK_WIDTH: i64 = 100;
/// Plot area height of a sparkline.
pub const SPARK_HEIGHT: i64 = 20;

const TEMPLATES: [(&str, &str); 7] = [
    ("plot_base.svg", include_str!("../templates/plot_base.svg")),
    ("plot_line.svg", include_str!("../templates/plot_line.svg")),
    ("plot_scatter.svg", include_str!("../templates/plot_scatter.svg")),
    ("spark_marks.svg", include_str!("../templates/spark_marks.svg")),
    ("spark_all.svg", include_str!("../templates/spark_all.svg")),
    ("spark_latest.svg", include_str!("../templates/spark_latest.svg")),
    ("spark_none.svg", include_str!("../templates/spark_none.svg")),
];

// ---------------------------------------------------------------------------
// Template context
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct Bar {
    x: i64,
    lo: i64,
    hi: i64,
}

#[derive(Serialize)]
struct SeriesCtx {
    colour: &'static str,
    has_errors: bool,
    line: String,
    error_poly: String,
    pts: Vec<Px>,
    bars: Vec<Bar>,
}

#[derive(Serialize)]
struct BandCtx {
    y: i64,
    h: i64,
    m: i64,
}

#[derive(Serialize)]
struct Markers {
    last: Px,
    min: Px,
    max: Px,
}

#[derive(Serialize)]
struct Footer {
    last: String,
    last_date: String,
    min: String,
    min_date: String,
    max: String,
    max_date: String,
}

#[derive(Serialize)]
struct Context<'a> {
    title: &'a str,
    y_label: &'a str,
    unit: &'a str,
    range_alert: bool,
    scatter: bool,
    x_ticks: Vec<Tick>,
    y_ticks: Vec<Tick>,
    x_axis_y: Option<i64>,
    band: Option<BandCtx>,
    series: Vec<SeriesCtx>,
    markers: Option<Markers>,
    key: Vec<KeyEntry>,
    footer: Option<Footer>,
}

fn line(pts: &[Px]) -> String {
    pts.iter().map(|p| format!("{},{} ", p.x, p.y)).collect()
}

/// Above the points left to right, then below them right to left.
fn error_poly(pts: &[Px]) -> String {
    let upper = pts.iter().map(|p| format!("{},{} ", p.x, p.y.saturating_sub(p.e)));
    let lower = pts.iter().rev().map(|p| format!("{},{} ", p.x, p.y.saturating_add(p.e)));
    upper.chain(lower).collect()
}

impl<'a> Context<'a> {
    fn new(plot: &'a Plot, s: &Scaled, scatter: bool, axes: Axes) -> Self {
        let labels: Vec<&str> = s.series.iter().map(|x| x.label.as_str()).collect();
        let colours = colour::assign(&labels, plot.scheme);

        let series: Vec<SeriesCtx> = s
            .series
            .iter()
            .zip(colours.iter().copied())
            .map(|(x, c)| SeriesCtx {
                colour: c,
                has_errors: x.has_errors,
                line: line(&x.pts),
                error_poly: error_poly(&x.pts),
                bars: x
                    .pts
                    .iter()
                    .map(|p| Bar {
                        x: p.x,
                        lo: p.y.saturating_add(p.e),
                        hi: p.y.saturating_sub(p.e),
                    })
                    .collect(),
                pts: x.pts.clone(),
            })
            .collect();

        let pairs: Vec<(&str, &str)> = labels.iter().copied().zip(colours.iter().copied()).collect();
        let key = key::entries(&pairs, s.band.map(|b| (b.mean, b.stddev)));

        Self {
            title: &plot.title,
            y_label: &plot.y_label,
            unit: &plot.unit,
            range_alert: s.range_alert,
            scatter,
            x_ticks: axes.x,
            y_ticks: axes.y,
            x_axis_y: axes.x_axis_y,
            band: s.band.map(|b| BandCtx { y: b.y, h: b.h, m: b.m }),
            series,
            markers: s.extremes.map(|e| Markers {
                last: s.px(&e.last),
                min: s.px(&e.min),
                max: s.px(&e.max),
            }),
            key,
            footer: s.extremes.map(|e| Footer {
                last: format!("{:.2}", e.last.value),
                last_date: date(&e.last.time),
                min: format!("{:.2}", e.min.value),
                min_date: date(&e.min.time),
                max: format!("{:.2}", e.max.value),
                max_date: date(&e.max.time),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Renders plots and sparklines to SVG.
///
/// Build one at startup and share it; rendering takes `&self`.
pub struct Renderer {
    env: Environment<'static>,
}

impl Renderer {
    /// Compile every template.
    pub fn new() -> Result<Self, PlotError> {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::Html);
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);

        for (name, source) in TEMPLATES {
            env.add_template(name, source)
                .map_err(|e| PlotError::Template(format!("failed to add {name}: {e}")))?;
        }

        Ok(Self { env })
    }

    /// Draw an 800 by 270 plot.
    pub fn plot(&self, plot: &Plot, kind: PlotType) -> Result<String, PlotError> {
        self.plot_at(plot, kind, Utc::now())
    }

    /// Draw a sparkline. Errors are not drawn and do not affect the range.
    pub fn spark(&self, plot: &Plot, kind: PlotType, label: Label) -> Result<String, PlotError> {
        self.spark_at(plot, kind, label, Utc::now())
    }

    fn plot_at(&self, plot: &Plot, kind: PlotType, now: DateTime<Utc>) -> Result<String, PlotError> {
        let scaled = Scaled::new(plot, PLOT_WIDTH, PLOT_HEIGHT, now);
        let axes = Axes::new(&scaled);
        let (name, scatter) = match kind {
            PlotType::Line => ("plot_line.svg", false),
            PlotType::Scatter => ("plot_scatter.svg", true),
        };
        self.render(name, &Context::new(plot, &scaled, scatter, axes))
    }

    fn spark_at(
        &self,
        plot: &Plot,
        kind: PlotType,
        label: Label,
        now: DateTime<Utc>,
    ) -> Result<String, PlotError> {
        let plot = plot.without_errors();
        let scaled = Scaled::new(&plot, SPARK_WIDTH, SPARK_HEIGHT, now);
        let name = match label {
            Label::All => "spark_all.svg",
            Label::Latest => "spark_latest.svg",
            Label::None => "spark_none.svg",
        };
        let scatter = kind == PlotType::Scatter;
        self.render(name, &Context::new(&plot, &scaled, scatter, Axes::default()))
    }

    fn render(&self, name: &str, ctx: &Context<'_>) -> Result<String, PlotError> {
        let out = self
            .env
            .get_template(name)
            .map_err(|e| PlotError::Template(format!("missing {name}: {e}")))?
            .render(ctx)
            .map_err(|e| PlotError::Template(format!("{name} render failed: {e}")))?;
        tracing::debug!(template = name, bytes = out.len(), "rendered svg");
        Ok(out)
    }
}
