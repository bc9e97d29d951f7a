//! Web Mercator (EPSG:3857) layout for site maps.
//!
//! A [`Map3857`] fixes a bounding box to a pixel width. Pixel `(0, 0)` is
//! the top left corner of the box. Boxes crossing the 180 meridian are laid
//! out continuously, with longitudes west of 180 moved one world width east.

use std::f64::consts::FRAC_PI_4;

use fits_db::LayerWindow;
use fits_types::Bbox;

/// Circumference of the EPSG:3857 world in meters.
pub const WIDTH_3857: f64 = 40_075_016.685_578_5;

/// Easting of the 180 meridian.
const EDGE_3857: f64 = WIDTH_3857 / 2.0;

const RADIUS: f64 = 6_378_137.0;

/// Mercator is undefined at the poles.
const MAX_LAT: f64 = 85.0;

/// Layer region holding the detailed New Zealand outlines.
const NZ_REGION: i32 = 1;

/// Easting in meters.
pub fn easting(lon: f64) -> f64 {
    let lon = if lon > 180.0 { lon - 360.0 } else { lon };
    RADIUS * lon.to_radians()
}

/// Northing in meters.
pub fn northing(lat: f64) -> f64 {
    let lat = lat.clamp(-MAX_LAT, MAX_LAT).to_radians();
    RADIUS * (FRAC_PI_4 + lat / 2.0).tan().ln()
}

#[allow(clippy::cast_possible_truncation)]
fn round_px(v: f64) -> i64 {
    v.round() as i64
}

/// A bounding box fixed to a pixel width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Map3857 {
    /// Western edge, meters.
    pub llx: f64,
    /// Southern edge, meters.
    pub lly: f64,
    /// Eastern edge, meters.
    pub urx: f64,
    /// Northern edge, meters.
    pub ury: f64,
    /// Pixels per meter.
    pub dx: f64,
    /// Width in pixels.
    pub width: i64,
    /// Height in pixels.
    pub height: i64,
    /// The box spans the 180 meridian.
    pub crosses_180: bool,
    /// Outline detail level, 0 coarsest.
    pub zoom: i32,
    /// Outline region.
    pub region: i32,
}

impl Map3857 {
    /// Lay out `bbox` at `width` pixels wide.
    pub fn new(bbox: &Bbox, width: u32) -> Self {
        let crosses_180 = bbox.crosses_180();
        let llx = easting(bbox.llx);
        let urx = easting(bbox.urx);
        let lly = northing(bbox.lly);
        let ury = northing(bbox.ury);

        let mut span = if crosses_180 {
            WIDTH_3857 - llx + urx
        } else {
            urx - llx
        };
        if span.is_nan() || span <= 0.0 {
            span = WIDTH_3857;
        }

        let dx = f64::from(width) / span;
        let degrees = span / WIDTH_3857 * 360.0;

        Self {
            llx,
            lly,
            urx,
            ury,
            dx,
            width: i64::from(width),
            height: round_px((ury - lly) * dx),
            crosses_180,
            zoom: zoom_for(degrees),
            region: region_for(bbox),
        }
    }

    /// Pixel position of a longitude and latitude.
    pub fn point(&self, lon: f64, lat: f64) -> (i64, i64) {
        let mut x = easting(lon);
        if self.crosses_180 && x < self.llx {
            x += WIDTH_3857;
        }
        (
            round_px((x - self.llx) * self.dx),
            round_px((self.ury - northing(lat)) * self.dx),
        )
    }

    /// Layer query windows. A box crossing 180 needs one window each side.
    pub fn windows(&self) -> Vec<LayerWindow> {
        let window = |llx: f64, urx: f64, xshift: f64| LayerWindow {
            llx,
            lly: self.lly,
            urx,
            ury: self.ury,
            xshift,
            yshift: -self.ury,
            scale: self.dx,
        };

        if self.crosses_180 {
            vec![
                window(self.llx, EDGE_3857, -self.llx),
                window(-EDGE_3857, self.urx, WIDTH_3857 - self.llx),
            ]
        } else {
            vec![window(self.llx, self.urx, -self.llx)]
        }
    }
}

fn zoom_for(degrees: f64) -> i32 {
    match degrees {
        d if d >= 90.0 => 0,
        d if d >= 20.0 => 1,
        d if d >= 5.0 => 2,
        d if d >= 1.0 => 3,
        _ => 4,
    }
}

fn region_for(bbox: &Bbox) -> i32 {
    let inside = Bbox::named("NewZealandRegion")
        .is_some_and(|r| r.contains(bbox.llx, bbox.lly) && r.contains(bbox.urx, bbox.ury));
    if inside { NZ_REGION } else { 0 }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn meridian_and_equator_are_origin() {
        assert_eq!(easting(0.0), 0.0);
        assert!(northing(0.0).abs() < 1e-6);
        assert!((easting(180.0) - EDGE_3857).abs() < 1e-6);
        assert_eq!(easting(190.0), easting(-170.0));
    }

    #[test]
    fn new_zealand_layout() {
        let b: Bbox = "NewZealand".parse().unwrap();
        let m = Map3857::new(&b, 130);
        assert!(!m.crosses_180);
        assert_eq!(m.width, 130);
        assert!(m.height > 130);
        assert_eq!(m.point(165.0, -34.0), (0, 0));
        assert_eq!(m.point(179.0, -48.0), (130, m.height));
        assert_eq!(m.windows().len(), 1);
        assert_eq!(m.region, 1);
    }

    #[test]
    fn crossing_layout_is_continuous() {
        let b: Bbox = "NewZealandChathamIsland".parse().unwrap();
        let m = Map3857::new(&b, 200);
        assert!(m.crosses_180);
        let (x_east, _) = m.point(179.9, -44.0);
        let (x_west, _) = m.point(-179.9, -44.0);
        assert!(x_west > x_east);
        assert_eq!(m.point(-175.0, -34.0).0, 200);

        let w = m.windows();
        assert_eq!(w.len(), 2);
        assert_eq!(w[0].urx, EDGE_3857);
        assert_eq!(w[1].llx, -EDGE_3857);
        assert!((w[1].xshift - (WIDTH_3857 - m.llx)).abs() < 1e-6);
    }

    #[test]
    fn world_is_coarse_and_global() {
        let m = Map3857::new(&Bbox::world(), 360);
        assert_eq!(m.zoom, 0);
        assert_eq!(m.region, 0);
        assert!((m.dx * WIDTH_3857 - 360.0).abs() < 1e-9);
    }

    #[test]
    fn small_boxes_zoom_in() {
        let m = Map3857::new(&"WhiteIsland".parse::<Bbox>().unwrap(), 130);
        assert_eq!(m.zoom, 4);
    }
}
