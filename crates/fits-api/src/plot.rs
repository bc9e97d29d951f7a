//! SVG plot handlers.
//!
//! `/plot` draws one site (`siteID`) or several (`sites`) for a type.
//! `/spark` draws a small single site sparkline.

use std::sync::Arc;

use axum::extract::{RawQuery, State};
use axum::response::Response;
use chrono::{DateTime, Duration, Utc};
use fits_db::{ObservationStore, Resolver, SeriesSelection, TimeWindow};
use fits_plot::{Plot, Series};
use fits_types::{Query, Schema};
use tracing::debug;

use crate::error::ApiError;
use crate::handlers::{has_param, required};
use crate::shape::svg_response;
use crate::state::AppState;

const PLOT_SITE: Schema = Schema::new(
    &["siteID", "typeID"],
    &[
        "days",
        "yrange",
        "type",
        "start",
        "stddev",
        "showMethod",
        "scheme",
        "networkID",
    ],
);

const PLOT_SITES: Schema = Schema::new(
    &["sites", "typeID"],
    &["days", "yrange", "type", "start", "scheme"],
);

const SPARK: Schema = Schema::new(
    &["siteID", "typeID"],
    &["days", "yrange", "type", "stddev", "label", "networkID"],
);

/// Fixed x axis for `days` and `start`, `None` to range on the data.
///
/// | `days` | `start` | axis |
/// |--------|---------|------|
/// | 0 | unset | data |
/// | > 0 | unset | `[now - days, now]` |
/// | 0 | set | `[start, now]` |
/// | > 0 | set | `[start, start + days]` |
pub fn x_axis(
    days: u32,
    start: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let span = Duration::days(i64::from(days));
    match (days, start) {
        (0, None) => None,
        (_, None) => now.checked_sub_signed(span).map(|s| (s, now)),
        (0, Some(s)) => Some((s, now)),
        (_, Some(s)) => s.checked_add_signed(span).map(|e| (s, e)),
    }
}

fn apply_common(plot: &mut Plot, q: &Query, now: DateTime<Utc>) {
    if let Some((min, max)) = x_axis(q.days(), q.start(), now) {
        plot.set_x_axis(min, max);
    }
    if let Some(r) = q.yrange() {
        plot.set_y_range(r);
    }
    plot.set_scheme(q.scheme());
}

// ---------------------------------------------------------------------------
// GET /plot
// ---------------------------------------------------------------------------

/// `GET /plot`, dispatching on `siteID`.
pub async fn plot(State(state): State<Arc<AppState>>, RawQuery(raw): RawQuery) -> Result<Response, ApiError> {
    if has_param(raw.as_deref(), "siteID") {
        plot_site(&state, raw.as_deref()).await
    } else {
        plot_sites(&state, raw.as_deref()).await
    }
}

async fn plot_site(state: &AppState, raw: Option<&str>) -> Result<Response, ApiError> {
    let q = Query::from_query_string(&PLOT_SITE, raw)?;
    let site_id = required(q.site_id(), "siteID")?;
    let type_id = required(q.type_id(), "typeID")?;

    let pool = state.db.pool();
    let resolver = Resolver::new(pool);
    let site = resolver.valid_site(site_id).await?;
    let typ = resolver.valid_type(type_id).await?;

    let now = Utc::now();
    let mut p = Plot::new();
    p.set_title(format!("{} ({}) - {}", site.site_id, site.name, typ.description));
    p.set_y_label(format!("{} ({})", typ.name, typ.unit));
    p.set_unit(typ.unit.as_str());
    apply_common(&mut p, &q, now);

    let sel = SeriesSelection {
        site_id,
        type_id,
        method_id: None,
        window: TimeWindow::from_query(q.days(), q.start(), now),
    };
    let store = ObservationStore::new(pool);

    if q.show_method() {
        for (method, points) in store.series_by_method(&sel).await? {
            p.add_series(Series::new(method, points));
        }
    } else {
        p.add_series(Series::new(site_id, store.series(&sel).await?));
    }

    let band = if q.stddev() { store.mean_stddev(&sel).await? } else { None };
    if let Some((mean, stddev)) = band {
        p.set_mean_stddev(mean, stddev);
    }

    let svg = state.plots.plot(&p, q.plot_type())?;
    debug!(site_id, type_id, bytes = svg.len(), "rendered plot");
    Ok(svg_response(svg))
}

async fn plot_sites(state: &AppState, raw: Option<&str>) -> Result<Response, ApiError> {
    let q = Query::from_query_string(&PLOT_SITES, raw)?;
    let type_id = required(q.type_id(), "typeID")?;

    let pool = state.db.pool();
    let resolver = Resolver::new(pool);
    let typ = resolver.valid_type(type_id).await?;
    for id in q.sites() {
        resolver.valid_site(id).await?;
    }

    let now = Utc::now();
    let mut p = Plot::new();
    p.set_title(typ.description.as_str());
    p.set_y_label(format!("{} ({})", typ.name, typ.unit));
    p.set_unit(typ.unit.as_str());
    apply_common(&mut p, &q, now);

    let window = TimeWindow::from_query(q.days(), q.start(), now);
    let store = ObservationStore::new(pool);
    for site_id in q.sites() {
        let sel = SeriesSelection {
            site_id,
            type_id,
            method_id: None,
            window,
        };
        p.add_series(Series::new(site_id.as_str(), store.series(&sel).await?));
    }

    let svg = state.plots.plot(&p, q.plot_type())?;
    debug!(sites = q.sites().len(), type_id, bytes = svg.len(), "rendered plot");
    Ok(svg_response(svg))
}

// ---------------------------------------------------------------------------
// GET /spark
// ---------------------------------------------------------------------------

/// `GET /spark`.
pub async fn spark(State(state): State<Arc<AppState>>, RawQuery(raw): RawQuery) -> Result<Response, ApiError> {
    let q = Query::from_query_string(&SPARK, raw.as_deref())?;
    let site_id = required(q.site_id(), "siteID")?;
    let type_id = required(q.type_id(), "typeID")?;

    let pool = state.db.pool();
    let resolver = Resolver::new(pool);
    resolver.valid_site(site_id).await?;
    let typ = resolver.valid_type(type_id).await?;

    let now = Utc::now();
    let mut p = Plot::new();
    p.set_unit(typ.unit.as_str());
    if let Some((min, max)) = x_axis(q.days(), None, now) {
        p.set_x_axis(min, max);
    }
    if let Some(r) = q.yrange() {
        p.set_y_range(r);
    }

    let sel = SeriesSelection {
        site_id,
        type_id,
        method_id: None,
        window: TimeWindow::from_query(q.days(), None, now),
    };
    let store = ObservationStore::new(pool);
    p.add_series(Series::new(site_id, store.series(&sel).await?));

    let band = if q.stddev() { store.mean_stddev(&sel).await? } else { None };
    if let Some((mean, stddev)) = band {
        p.set_mean_stddev(mean, stddev);
    }

    let svg = state.plots.spark(&p, q.plot_type(), q.label())?;
    Ok(svg_response(svg))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn x_axis_table() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap();
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        assert_eq!(x_axis(0, None, now), None);
        assert_eq!(
            x_axis(9, None, now),
            Some((Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(), now))
        );
        assert_eq!(x_axis(0, Some(start), now), Some((start, now)));
        assert_eq!(
            x_axis(31, Some(start), now),
            Some((start, Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()))
        );
    }

    #[test]
    fn multi_site_plot_accepts_days_alone() {
        let q = Query::from_query_string(&PLOT_SITES, Some("sites=A.B,C.D&typeID=e&days=30")).unwrap();
        assert_eq!(q.days(), 30);
        assert!(q.start().is_none());
    }

    #[test]
    fn spark_rejects_show_method() {
        assert!(Query::from_query_string(&SPARK, Some("siteID=A&typeID=e&showMethod=true")).is_err());
    }
}
