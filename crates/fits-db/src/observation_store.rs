//! Observation queries and ingest writes.
//!
//! Every read maps onto one fixed SQL shape. Optional filters are nullable
//! bind parameters (`$n IS NULL OR ...`) rather than alternative query
//! strings, so adding a filter never multiplies the number of shapes.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use fits_types::{DailyMean, Observation, ObservationStats, Point, StatsAccumulator};
use futures::{Stream, TryStreamExt};
use sqlx::PgPool;

use crate::error::DbError;
use crate::resolver::Resolver;

// ---------------------------------------------------------------------------
// Selections
// ---------------------------------------------------------------------------

/// Exclusive time bounds for a single-site selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    /// Only observations strictly after this instant.
    pub after: Option<DateTime<Utc>>,
    /// Only observations strictly before this instant.
    pub before: Option<DateTime<Utc>>,
}

impl TimeWindow {
    /// No bounds.
    pub const fn unbounded() -> Self {
        Self {
            after: None,
            before: None,
        }
    }

    /// Bounds from the `days` and `start` query parameters.
    ///
    /// | `days` | `start` | window |
    /// |--------|---------|--------|
    /// | 0 | unset | unbounded |
    /// | > 0 | unset | `(now - days, ..)` |
    /// | 0 | set | `(start, ..)` |
    /// | > 0 | set | `(start, start + days)` |
    pub fn from_query(days: u32, start: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        let span = Duration::days(i64::from(days));
        match (days, start) {
            (0, None) => Self::unbounded(),
            (_, None) => Self {
                after: now.checked_sub_signed(span),
                before: None,
            },
            (0, Some(s)) => Self {
                after: Some(s),
                before: None,
            },
            (_, Some(s)) => Self {
                after: Some(s),
                before: s.checked_add_signed(span),
            },
        }
    }
}

/// Observations of one type at one site.
#[derive(Debug, Clone, Copy)]
pub struct SeriesSelection<'q> {
    /// Site identifier.
    pub site_id: &'q str,
    /// Type identifier.
    pub type_id: &'q str,
    /// Restrict to one method.
    pub method_id: Option<&'q str>,
    /// Time bounds.
    pub window: TimeWindow,
}

/// Observations of one type at every site over a bounded period.
#[derive(Debug, Clone, Copy)]
pub struct SpatialSelection<'q> {
    /// Type identifier.
    pub type_id: &'q str,
    /// Restrict to one method.
    pub method_id: Option<&'q str>,
    /// Inclusive start.
    pub start: DateTime<Utc>,
    /// Exclusive end.
    pub end: DateTime<Utc>,
    /// Restrict to sites inside this EPSG:4326 WKT polygon.
    pub within: Option<&'q str>,
    /// SRID to project site coordinates into.
    pub srid: i32,
}

/// One row of a spatial selection.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct SpatialRow {
    /// Site identifier.
    pub site_id: String,
    /// Projected x coordinate.
    pub x: f64,
    /// Projected y coordinate.
    pub y: f64,
    /// Site height.
    pub height: f64,
    /// Site ground relationship.
    pub ground_relationship: f64,
    /// Observation time.
    pub time: DateTime<Utc>,
    /// Observed value.
    pub value: f64,
    /// Observation error.
    pub error: f64,
}

// ---------------------------------------------------------------------------
// SQL
// ---------------------------------------------------------------------------

/// Shared predicate for single-site selections.
/// `$1` site, `$2` type, `$3` method, `$4` after, `$5` before.
macro_rules! series_predicate {
    () => {
        r"
        FROM fits.observation o
        WHERE o.sitepk = (SELECT sitepk FROM fits.site WHERE siteid = $1 ORDER BY sitepk DESC LIMIT 1)
          AND o.typepk = (SELECT typepk FROM fits.type WHERE typeid = $2)
          AND ($3::text IS NULL OR o.methodpk = (SELECT methodpk FROM fits.method WHERE methodid = $3))
          AND ($4::timestamptz IS NULL OR o.time > $4)
          AND ($5::timestamptz IS NULL OR o.time < $5)"
    };
}

const SERIES_SQL: &str = concat!(
    "SELECT o.time, o.value::float8, o.error::float8",
    series_predicate!(),
    " ORDER BY o.time ASC"
);

const SERIES_BY_METHOD_SQL: &str = concat!(
    "SELECT (SELECT name FROM fits.method m WHERE m.methodpk = o.methodpk), o.time, o.value::float8, o.error::float8",
    series_predicate!(),
    " ORDER BY o.time ASC"
);

const MEAN_STDDEV_SQL: &str = concat!(
    "SELECT avg(o.value)::float8, stddev_pop(o.value)::float8",
    series_predicate!()
);

const SPATIAL_SQL: &str = r"
    SELECT s.siteid AS site_id,
           ST_X(ST_Transform(s.location::geometry, $5::int)) AS x,
           ST_Y(ST_Transform(s.location::geometry, $5::int)) AS y,
           s.height::float8 AS height,
           s.ground_relationship::float8 AS ground_relationship,
           o.time AS time,
           o.value::float8 AS value,
           o.error::float8 AS error
    FROM fits.observation o
    JOIN fits.site s ON s.sitepk = o.sitepk
    WHERE o.typepk = (SELECT typepk FROM fits.type WHERE typeid = $1)
      AND ($2::text IS NULL OR o.methodpk = (SELECT methodpk FROM fits.method WHERE methodid = $2))
      AND o.time >= $3 AND o.time < $4
      AND ($6::text IS NULL OR ST_Within(s.location::geometry, ST_GeomFromText($6, 4326)))
    ORDER BY s.siteid, o.time";

const DAILY_MEANS_SQL: &str = r"
    SELECT to_char(o.time AT TIME ZONE 'UTC', 'YYYY-MM-DD') AS day,
           s.siteid,
           avg(o.value)::float8,
           avg(o.error)::float8
    FROM fits.observation o
    JOIN fits.site s ON s.sitepk = o.sitepk
    WHERE o.typepk = (SELECT typepk FROM fits.type WHERE typeid = $1)
      AND s.siteid = ANY($2)
    GROUP BY day, s.siteid
    ORDER BY day, s.siteid";

const UPSERT_SQL: &str = r"
    INSERT INTO fits.observation(sitepk, typepk, methodpk, samplepk, time, value, error)
    SELECT site.sitepk, type.typepk, method.methodpk, sample.samplepk, $5, $6, $7
    FROM fits.site, fits.type, fits.method, fits.sample
    WHERE site.siteid = $1
      AND type.typeid = $2
      AND method.methodid = $3
      AND sample.sampleid = $4
    ON CONFLICT (sitepk, typepk, methodpk, samplepk, time) DO UPDATE SET
      value = EXCLUDED.value,
      error = EXCLUDED.error";

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Operations on `fits.observation`.
pub struct ObservationStore<'a> {
    pool: &'a PgPool,
}

impl<'a> ObservationStore<'a> {
    /// Create an observation store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Stream a single-site series in ascending time order.
    pub fn series_stream<'s>(
        &'s self,
        sel: &'s SeriesSelection<'s>,
    ) -> impl Stream<Item = Result<Point, DbError>> + 's {
        sqlx::query_as::<_, (DateTime<Utc>, f64, f64)>(SERIES_SQL)
            .bind(sel.site_id)
            .bind(sel.type_id)
            .bind(sel.method_id)
            .bind(sel.window.after)
            .bind(sel.window.before)
            .fetch(self.pool)
            .map_ok(|(t, v, e)| Point::new(t, v, e))
            .map_err(DbError::from)
    }

    /// Visit every point of a series once, in ascending time order.
    /// Returns the number of points visited.
    pub async fn scan_series<F>(&self, sel: &SeriesSelection<'_>, mut visit: F) -> Result<u64, DbError>
    where
        F: FnMut(Point),
    {
        let mut count: u64 = 0;
        let mut rows = self.series_stream(sel);
        while let Some(p) = rows.try_next().await? {
            visit(p);
            count = count.saturating_add(1);
        }
        tracing::debug!(site_id = sel.site_id, type_id = sel.type_id, count, "scanned series");
        Ok(count)
    }

    /// Collect a series.
    pub async fn series(&self, sel: &SeriesSelection<'_>) -> Result<Vec<Point>, DbError> {
        let mut points = Vec::new();
        self.scan_series(sel, |p| points.push(p)).await?;
        Ok(points)
    }

    /// Collect a series split by method name. Each series is in time order
    /// and the map is ordered by method name.
    pub async fn series_by_method(
        &self,
        sel: &SeriesSelection<'_>,
    ) -> Result<BTreeMap<String, Vec<Point>>, DbError> {
        let mut rows = sqlx::query_as::<_, (Option<String>, DateTime<Utc>, f64, f64)>(SERIES_BY_METHOD_SQL)
            .bind(sel.site_id)
            .bind(sel.type_id)
            .bind(sel.method_id)
            .bind(sel.window.after)
            .bind(sel.window.before)
            .fetch(self.pool);

        let mut by_method: BTreeMap<String, Vec<Point>> = BTreeMap::new();
        while let Some((method, t, v, e)) = rows.try_next().await? {
            by_method
                .entry(method.unwrap_or_default())
                .or_default()
                .push(Point::new(t, v, e));
        }
        Ok(by_method)
    }

    /// Mean and population standard deviation of the values in a series.
    /// `None` when the selection is empty.
    pub async fn mean_stddev(&self, sel: &SeriesSelection<'_>) -> Result<Option<(f64, f64)>, DbError> {
        let (mean, stddev): (Option<f64>, Option<f64>) = sqlx::query_as(MEAN_STDDEV_SQL)
            .bind(sel.site_id)
            .bind(sel.type_id)
            .bind(sel.method_id)
            .bind(sel.window.after)
            .bind(sel.window.before)
            .fetch_one(self.pool)
            .await?;

        Ok(mean.zip(stddev))
    }

    /// Summary statistics for a series.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] when the selection is empty.
    pub async fn stats(&self, sel: &SeriesSelection<'_>, unit: &str) -> Result<ObservationStats, DbError> {
        let mut acc = StatsAccumulator::new();
        self.scan_series(sel, |p| acc.push(p)).await?;
        acc.finish(unit).ok_or_else(|| {
            DbError::NotFound(format!(
                "no observations for siteID {} typeID {}",
                sel.site_id, sel.type_id
            ))
        })
    }

    /// Visit every row of a spatial selection once, ordered by site then
    /// time. Returns the number of rows visited.
    ///
    /// # Errors
    ///
    /// A projection failure raised by the database is
    /// [`DbError::NotFound`]. Any other database failure is
    /// [`DbError::Postgres`].
    pub async fn scan_spatial<F>(&self, sel: &SpatialSelection<'_>, mut visit: F) -> Result<u64, DbError>
    where
        F: FnMut(SpatialRow),
    {
        let mut rows = sqlx::query_as::<_, SpatialRow>(SPATIAL_SQL)
            .bind(sel.type_id)
            .bind(sel.method_id)
            .bind(sel.start)
            .bind(sel.end)
            .bind(sel.srid)
            .bind(sel.within)
            .fetch(self.pool);

        let mut count: u64 = 0;
        loop {
            match rows.try_next().await {
                Ok(Some(row)) => {
                    visit(row);
                    count = count.saturating_add(1);
                }
                Ok(None) => break,
                Err(e) => return Err(DbError::from_spatial(e)),
            }
        }
        tracing::debug!(type_id = sel.type_id, count, "scanned spatial observations");
        Ok(count)
    }

    /// Daily mean value and error per site for `type_id`, for every UTC day
    /// on which any of `sites` has an observation.
    pub async fn daily_means(&self, type_id: &str, sites: &[String]) -> Result<Vec<DailyMean>, DbError> {
        let rows: Vec<(String, String, f64, f64)> = sqlx::query_as(DAILY_MEANS_SQL)
            .bind(type_id)
            .bind(sites)
            .fetch_all(self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(date, site_id, value, error)| DailyMean {
                date,
                site_id,
                value,
                error,
            })
            .collect())
    }

    /// Insert or update one observation.
    ///
    /// The method must be valid for the type. When the write touches no row
    /// the missing site, type, method or sample is reported.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] for an unknown identifier or a method
    /// not permitted for the type.
    pub async fn save(&self, obs: &Observation) -> Result<u64, DbError> {
        let resolver = Resolver::new(self.pool);
        resolver.valid_type_method(&obs.type_id, &obs.method_id).await?;

        let affected = sqlx::query(UPSERT_SQL)
            .bind(&obs.site_id)
            .bind(&obs.type_id)
            .bind(&obs.method_id)
            .bind(&obs.sample_id)
            .bind(obs.time)
            .bind(obs.value)
            .bind(obs.error)
            .execute(self.pool)
            .await?
            .rows_affected();

        if affected == 0 {
            resolver.valid_site(&obs.site_id).await?;
            resolver.valid_type(&obs.type_id).await?;
            resolver.valid_method(&obs.method_id).await?;
            resolver.valid_sample(&obs.sample_id).await?;
        }

        tracing::debug!(site_id = %obs.site_id, type_id = %obs.type_id, affected, "saved observation");
        Ok(affected)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2010, 1, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn window_unbounded() {
        assert_eq!(TimeWindow::from_query(0, None, at(10)), TimeWindow::unbounded());
    }

    #[test]
    fn window_days_only() {
        let w = TimeWindow::from_query(3, None, at(10));
        assert_eq!(w.after, Some(at(7)));
        assert_eq!(w.before, None);
    }

    #[test]
    fn window_start_only() {
        let w = TimeWindow::from_query(0, Some(at(2)), at(10));
        assert_eq!(w.after, Some(at(2)));
        assert_eq!(w.before, None);
    }

    #[test]
    fn window_start_and_days() {
        let w = TimeWindow::from_query(5, Some(at(2)), at(10));
        assert_eq!(w.after, Some(at(2)));
        assert_eq!(w.before, Some(at(7)));
    }

    #[test]
    fn series_sql_shape() {
        assert!(SERIES_SQL.starts_with("SELECT o.time"));
        assert!(SERIES_SQL.contains("$5::timestamptz IS NULL"));
        assert!(SERIES_SQL.trim_end().ends_with("ORDER BY o.time ASC"));
        assert!(MEAN_STDDEV_SQL.contains("stddev_pop"));
        assert!(!MEAN_STDDEV_SQL.contains("ORDER BY"));
    }
}
