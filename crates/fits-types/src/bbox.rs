//! Map bounding boxes.
//!
//! A bounding box is given either as four comma separated degrees
//! `llx,lly,urx,ury` or by one of a small set of region names. A box whose
//! upper-right longitude is less than its lower-left longitude crosses the
//! 180 meridian.

use std::fmt;
use std::str::FromStr;

use crate::valid::ValidationError;

/// A longitude/latitude rectangle in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bbox {
    /// Lower-left longitude.
    pub llx: f64,
    /// Lower-left latitude.
    pub lly: f64,
    /// Upper-right longitude.
    pub urx: f64,
    /// Upper-right latitude.
    pub ury: f64,
    /// Map title for boxes chosen from the default bounds list.
    pub title: Option<&'static str>,
}

/// Named regions accepted wherever a bounding box is.
const NAMED: [(&str, Bbox); 7] = [
    ("LakeTaupo", Bbox::fixed(175.64, -39.00, 176.15, -38.61, None)),
    ("WhiteIsland", Bbox::fixed(177.164, -37.54, 177.20, -37.505, None)),
    ("RaoulIsland", Bbox::fixed(-178.02, -29.32, -177.86, -29.22, None)),
    ("ChathamIsland", Bbox::fixed(-177.2, -44.22, -176.1, -43.65, None)),
    ("NewZealand", Bbox::fixed(165.0, -48.0, 179.0, -34.0, None)),
    ("NewZealandChathamIsland", Bbox::fixed(165.0, -48.0, -175.0, -34.0, None)),
    ("NewZealandRegion", Bbox::fixed(165.0, -48.0, -175.0, -28.0, None)),
];

/// Default map bounds, smallest first. A map without an explicit box uses
/// the first of these that holds every marker.
const DEFAULT_BOUNDS: [Bbox; 7] = [
    Bbox::fixed(165.0, -48.0, 179.0, -34.0, Some("New Zealand")),
    Bbox::fixed(165.0, -48.0, -175.0, -34.0, Some("New Zealand, Chathams")),
    Bbox::fixed(165.0, -48.0, -177.0, -27.0, Some("New Zealand, Raoul")),
    Bbox::fixed(165.0, -48.0, -175.0, -27.0, Some("New Zealand, Raoul, Chathams")),
    Bbox::fixed(165.0, -48.0, -168.0, -10.0, Some("New Zealand Pacific region")),
    Bbox::fixed(155.0, -85.0, -95.0, -30.0, Some("New Zealand, Antartica")),
    Bbox::fixed(155.0, -85.0, -95.0, -5.0, Some("New Zealand, Pacific, Antartica")),
];

/// Whole world, used when no default bound holds the markers.
const WORLD: Bbox = Bbox::fixed(0.0, -85.0, 360.0, 85.0, Some("World"));

impl Bbox {
    const fn fixed(llx: f64, lly: f64, urx: f64, ury: f64, title: Option<&'static str>) -> Self {
        Self {
            llx,
            lly,
            urx,
            ury,
            title,
        }
    }

    /// Look up a named region.
    pub fn named(name: &str) -> Option<Self> {
        NAMED.iter().find(|(n, _)| *n == name).map(|(_, b)| *b)
    }

    /// The whole-world box.
    pub const fn world() -> Self {
        WORLD
    }

    /// True when the box spans the 180 meridian.
    pub fn crosses_180(&self) -> bool {
        self.urx < self.llx || self.urx > 180.0
    }

    /// Upper-right longitude on the same 0..360 scale as `llx`.
    pub fn urx_unwrapped(&self) -> f64 {
        if self.urx < self.llx {
            self.urx + 360.0
        } else {
            self.urx
        }
    }

    /// True when `(lon, lat)` lies in the box (edges inclusive).
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        if lat < self.lly || lat > self.ury {
            return false;
        }
        let lon = if self.crosses_180() && lon < 0.0 {
            lon + 360.0
        } else {
            lon
        };
        lon >= self.llx && lon <= self.urx_unwrapped()
    }

    /// The smallest default bound holding every point, or the world.
    pub fn from_points(points: &[(f64, f64)]) -> Self {
        DEFAULT_BOUNDS
            .iter()
            .find(|b| points.iter().all(|&(lon, lat)| b.contains(lon, lat)))
            .copied()
            .unwrap_or(WORLD)
    }

    /// The box as a closed WKT polygon in EPSG:4326.
    ///
    /// Boxes crossing 180 are written with longitudes past 180 so the ring
    /// stays simple; callers compare them with shifted longitudes.
    pub fn to_wkt_polygon(&self) -> String {
        let (x0, x1, y0, y1) = (self.llx, self.urx_unwrapped(), self.lly, self.ury);
        format!("POLYGON(({x0} {y0},{x1} {y0},{x1} {y1},{x0} {y1},{x0} {y0}))")
    }
}

impl fmt::Display for Bbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.llx, self.lly, self.urx, self.ury)
    }
}

impl FromStr for Bbox {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(b) = Self::named(s) {
            return Ok(b);
        }

        let invalid = || ValidationError::BadRequest(format!("invalid bbox: {s}"));

        let parts: Vec<f64> = s
            .split(',')
            .map(|p| p.trim_matches(|c: char| c == ' ' || c == '+').parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|e| ValidationError::BadRequest(format!("invalid bbox: {s}: {e}")))?;

        let [llx, lly, urx, ury] = parts.as_slice() else {
            return Err(invalid());
        };

        if !(-180.0..=360.0).contains(llx)
            || !(-180.0..=360.0).contains(urx)
            || !(-90.0..=90.0).contains(lly)
            || !(-90.0..=90.0).contains(ury)
            || lly >= ury
        {
            return Err(invalid());
        }

        Ok(Self::fixed(*llx, *lly, *urx, *ury, None))
    }
}
