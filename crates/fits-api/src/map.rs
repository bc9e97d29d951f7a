//! Site maps.
//!
//! `/map/site` draws sites as triangles on an EPSG:3857 outline map. Either
//! named sites are drawn (`siteID` or `sites`) or every site with data of a
//! type (`typeID`, `methodID`, `within`). Without `bbox` the smallest
//! default New Zealand bound holding every marker is used.

use std::sync::Arc;

use axum::extract::{RawQuery, State};
use axum::response::Response;
use fits_db::map_layers::{LAKES, LAND};
use fits_db::{MapLayerStore, Resolver, SiteFilter, SiteStore};
use fits_plot::PlotError;
use fits_types::{Bbox, Query, Schema, Site};
use minijinja::{AutoEscape, Environment};
use serde::Serialize;

use crate::error::ApiError;
use crate::handlers::has_param;
use crate::projection::Map3857;
use crate::shape::svg_response;
use crate::state::AppState;

const TEMPLATE: &str = include_str!("../templates/site_map.svg");

/// Width of the inset map.
const INSET_WIDTH: u32 = 80;

/// Maps narrower than this label markers by site id alone.
const SHORT_LABEL_WIDTH: i64 = 250;

const LABEL_HEIGHT: i64 = 12;

const SITE_MAP: Schema = Schema::new(
    &[],
    &["networkID", "siteID", "sites", "width", "bbox", "insetBbox"],
);

const SITE_TYPE_MAP: Schema = Schema::new(
    &[],
    &["typeID", "methodID", "within", "width", "bbox", "insetBbox"],
);

// ---------------------------------------------------------------------------
// Markers
// ---------------------------------------------------------------------------

/// A site to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    /// Longitude.
    pub lon: f64,
    /// Latitude.
    pub lat: f64,
    /// Site identifier, the short label.
    pub site_id: String,
    /// `name (siteID)`, the tooltip and long label.
    pub label: String,
}

impl From<Site> for Marker {
    fn from(s: Site) -> Self {
        Self {
            lon: s.longitude,
            lat: s.latitude,
            label: format!("{} ({})", s.name, s.site_id),
            site_id: s.site_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Template context
// ---------------------------------------------------------------------------

/// Land and lake path data for one map.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LayerPaths {
    land: String,
    lakes: String,
    blur: i64,
    coast: i64,
}

impl LayerPaths {
    /// Path data for a map of `width` pixels.
    pub fn new(land: String, lakes: String, width: i64) -> Self {
        let (blur, coast) = if width < SHORT_LABEL_WIDTH { (4, 10) } else { (10, 30) };
        Self {
            land,
            lakes,
            blur,
            coast,
        }
    }

    async fn fetch(store: &MapLayerStore<'_>, map: &Map3857) -> Result<Self, ApiError> {
        let windows = map.windows();
        let land = store.path(&windows, map.zoom, LAND, map.region).await?;
        let lakes = store.path(&windows, map.zoom, LAKES, map.region).await?;
        Ok(Self::new(land, lakes, map.width))
    }
}

#[derive(Serialize)]
struct InsetCtx {
    frame_width: i64,
    frame_height: i64,
    layers: LayerPaths,
    x: i64,
    y: i64,
    w: i64,
    h: i64,
}

impl InsetCtx {
    /// The inset outline with `main` marked on it, at least 5 pixels square.
    fn new(inset: &Map3857, main: &Bbox, layers: LayerPaths) -> Self {
        let (mut x, mut y) = inset.point(main.llx, main.ury);
        let (x1, y1) = inset.point(main.urx, main.lly);

        let mut w = x1.saturating_sub(x);
        if w < 5 {
            w = 5;
            x = x.saturating_sub(2);
        }
        let mut h = y1.saturating_sub(y);
        if h < 5 {
            h = 5;
            y = y.saturating_sub(2);
        }

        Self {
            frame_width: inset.width.saturating_add(6),
            frame_height: inset.height.saturating_add(6),
            layers,
            x,
            y,
            w,
            h,
        }
    }
}

#[derive(Serialize)]
struct MarkerCtx {
    x: i64,
    y: i64,
    title: String,
}

#[derive(Serialize)]
struct LabelCtx {
    x: i64,
    y: i64,
    text: String,
}

#[derive(Serialize)]
struct MapCtx {
    width: i64,
    height: i64,
    title: String,
    main: LayerPaths,
    inset: Option<InsetCtx>,
    markers: Vec<MarkerCtx>,
    labels: Vec<LabelCtx>,
}

/// Labels stacked up from the bottom right corner, as many as fit.
fn labels(map: &Map3857, markers: &[Marker]) -> Vec<LabelCtx> {
    let short = map.width < SHORT_LABEL_WIDTH;
    let x = map.width.saturating_sub(5);
    let mut y = map.height.saturating_sub(5);
    let mut out = Vec::new();
    for m in markers.iter().rev() {
        if y < LABEL_HEIGHT {
            break;
        }
        let text = if short { &m.site_id } else { &m.label };
        out.push(LabelCtx {
            x,
            y,
            text: text.clone(),
        });
        y = y.saturating_sub(LABEL_HEIGHT);
    }
    out
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// A site map to draw.
#[derive(Debug, Clone, Default)]
pub struct MapRequest {
    /// Map bounds; derived from the markers when absent.
    pub bbox: Option<Bbox>,
    /// Bounds of an optional inset map.
    pub inset: Option<Bbox>,
    /// Width in pixels.
    pub width: u32,
    /// Sites to draw.
    pub markers: Vec<Marker>,
}

impl MapRequest {
    fn bounds(&self) -> Bbox {
        self.bbox.unwrap_or_else(|| {
            let points: Vec<(f64, f64)> = self.markers.iter().map(|m| (m.lon, m.lat)).collect();
            Bbox::from_points(&points)
        })
    }
}

/// Renders site maps to SVG.
pub struct MapRenderer {
    env: Environment<'static>,
}

impl MapRenderer {
    /// Compile the map template.
    pub fn new() -> Result<Self, PlotError> {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::Html);
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.add_template("site_map.svg", TEMPLATE)
            .map_err(|e| PlotError::Template(format!("failed to add site_map.svg: {e}")))?;
        Ok(Self { env })
    }

    /// Fetch outlines and draw the map.
    pub async fn svg(&self, layers: &MapLayerStore<'_>, req: &MapRequest) -> Result<String, ApiError> {
        let bbox = req.bounds();
        let map = Map3857::new(&bbox, req.width);
        let main = LayerPaths::fetch(layers, &map).await?;

        let inset = match req.inset {
            Some(ib) => {
                let in_map = Map3857::new(&ib, INSET_WIDTH);
                Some((in_map, LayerPaths::fetch(layers, &in_map).await?))
            }
            None => None,
        };

        self.draw(&bbox, &map, main, inset, &req.markers)
    }

    /// Draw a map from already fetched outlines.
    fn draw(
        &self,
        bbox: &Bbox,
        map: &Map3857,
        main: LayerPaths,
        inset: Option<(Map3857, LayerPaths)>,
        markers: &[Marker],
    ) -> Result<String, ApiError> {
        let ctx = MapCtx {
            width: map.width,
            height: map.height,
            title: bbox.title.map_or_else(|| bbox.to_string(), str::to_owned),
            main,
            inset: inset.map(|(in_map, paths)| InsetCtx::new(&in_map, bbox, paths)),
            markers: markers
                .iter()
                .map(|m| {
                    let (x, y) = map.point(m.lon, m.lat);
                    MarkerCtx {
                        x,
                        y,
                        title: m.label.clone(),
                    }
                })
                .collect(),
            labels: labels(map, markers),
        };

        let out = self
            .env
            .get_template("site_map.svg")
            .and_then(|t| t.render(&ctx))
            .map_err(|e| ApiError::Internal(format!("site map render failed: {e}")))?;
        tracing::debug!(markers = markers.len(), bytes = out.len(), "rendered site map");
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /map/site`, dispatching on `siteID`/`sites`.
pub async fn site_map(
    State(state): State<Arc<AppState>>,
    RawQuery(raw): RawQuery,
) -> Result<Response, ApiError> {
    if has_param(raw.as_deref(), "siteID") || has_param(raw.as_deref(), "sites") {
        named_sites_map(&state, raw.as_deref()).await
    } else {
        site_type_map(&state, raw.as_deref()).await
    }
}

async fn named_sites_map(state: &AppState, raw: Option<&str>) -> Result<Response, ApiError> {
    let q = Query::from_query_string(&SITE_MAP, raw)?;

    let ids: Vec<String> = match (q.site_id(), q.sites()) {
        (Some(_), [_, ..]) => {
            return Err(ApiError::BadRequest("specify siteID or sites, not both".into()));
        }
        (Some(id), []) => vec![id.to_owned()],
        (None, []) => return Err(ApiError::BadRequest("specify siteID or sites".into())),
        (None, sites) => sites.to_vec(),
    };

    let sites = SiteStore::new(state.db.pool());
    let mut markers = Vec::with_capacity(ids.len());
    for id in &ids {
        markers.push(Marker::from(sites.get(id).await?));
    }

    let req = MapRequest {
        bbox: q.bbox(),
        inset: q.inset_bbox(),
        width: q.width(),
        markers,
    };
    let svg = state.maps.svg(&MapLayerStore::new(state.db.pool()), &req).await?;
    Ok(svg_response(svg))
}

async fn site_type_map(state: &AppState, raw: Option<&str>) -> Result<Response, ApiError> {
    let q = Query::from_query_string(&SITE_TYPE_MAP, raw)?;

    if q.method_id().is_some() && q.type_id().is_none() {
        return Err(ApiError::BadRequest(
            "typeID must be specified when methodID is specified".into(),
        ));
    }

    let pool = state.db.pool();
    let resolver = Resolver::new(pool);
    if let Some(type_id) = q.type_id() {
        resolver.valid_type(type_id).await?;
        if let Some(method_id) = q.method_id() {
            resolver.valid_type_method(type_id, method_id).await?;
        }
    }

    let bbox_wkt = q.bbox().map(|b| b.to_wkt_polygon());
    let within = match q.within() {
        Some(w) => {
            resolver.valid_poly(w).await?;
            Some(w)
        }
        None => bbox_wkt.as_deref(),
    };

    let filter = SiteFilter {
        type_id: q.type_id(),
        method_id: q.method_id(),
        within,
    };
    let markers = SiteStore::new(pool)
        .collection(&filter)
        .await?
        .into_iter()
        .map(Marker::from)
        .collect();

    let req = MapRequest {
        bbox: q.bbox(),
        inset: q.inset_bbox(),
        width: q.width(),
        markers,
    };
    let svg = state.maps.svg(&MapLayerStore::new(pool), &req).await?;
    Ok(svg_response(svg))
}
