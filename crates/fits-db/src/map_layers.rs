//! Land and lake outlines for site maps.
//!
//! Outlines live in `public.map180_layers` as EPSG:3857 geometries, keyed
//! by zoom level, layer kind and region. The table is loaded outside this
//! service; a missing table or an empty window yields an empty path rather
//! than an error. Other database failures propagate.

use sqlx::PgPool;

use crate::error::DbError;

/// Layer kind for land polygons.
pub const LAND: i32 = 0;

/// Layer kind for lake polygons.
pub const LAKES: i32 = 1;

/// SQLSTATE `undefined_table`.
const UNDEFINED_TABLE: &str = "42P01";

const LAYER_SQL: &str = r"
    SELECT array_to_string(array_agg(
        ST_AsSVG(ST_TransScale(ST_Intersection(ST_MakeEnvelope($1, $2, $3, $4, 3857), geom), $5, $6, $7, $8), 0, 1)
    ), ' ')
    FROM public.map180_layers
    WHERE zoom = $9 AND type = $10 AND region = $11";

/// One window onto a layer, in EPSG:3857 meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerWindow {
    /// Envelope lower-left x.
    pub llx: f64,
    /// Envelope lower-left y.
    pub lly: f64,
    /// Envelope upper-right x.
    pub urx: f64,
    /// Envelope upper-right y.
    pub ury: f64,
    /// Translation applied before scaling, x.
    pub xshift: f64,
    /// Translation applied before scaling, y.
    pub yshift: f64,
    /// Pixels per meter.
    pub scale: f64,
}

/// Read access to `public.map180_layers`.
pub struct MapLayerStore<'a> {
    pool: &'a PgPool,
}

impl<'a> MapLayerStore<'a> {
    /// Create a map layer store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// SVG path data for `layer` within each window, joined by spaces.
    ///
    /// When nothing is stored at `zoom` the next coarser zoom is tried,
    /// down to zero.
    pub async fn path(&self, windows: &[LayerWindow], zoom: i32, layer: i32, region: i32) -> Result<String, DbError> {
        let mut z = zoom;
        loop {
            let mut parts = Vec::with_capacity(windows.len());
            for w in windows {
                if let Some(p) = self.fetch(w, z, layer, region).await? {
                    parts.push(p);
                }
            }
            let joined = parts.join(" ");
            if !joined.trim().is_empty() || z <= 0 {
                return Ok(joined);
            }
            z = z.saturating_sub(1);
        }
    }

    async fn fetch(&self, w: &LayerWindow, zoom: i32, layer: i32, region: i32) -> Result<Option<String>, DbError> {
        let row: Result<(Option<String>,), sqlx::Error> = sqlx::query_as(LAYER_SQL)
            .bind(w.llx)
            .bind(w.lly)
            .bind(w.urx)
            .bind(w.ury)
            .bind(w.xshift)
            .bind(w.yshift)
            .bind(w.scale)
            .bind(w.scale)
            .bind(zoom)
            .bind(layer)
            .bind(region)
            .fetch_one(self.pool)
            .await;

        match row {
            Ok((p,)) => Ok(p),
            Err(sqlx::Error::Database(e)) if is_missing_table(e.code().as_deref()) => {
                tracing::warn!(error = %e, zoom, layer, "map layers table missing, drawing without outlines");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn is_missing_table(code: Option<&str>) -> bool {
    code == Some(UNDEFINED_TABLE)
}
