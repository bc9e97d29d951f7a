//! Response shaping.
//!
//! Every successful response body is built in memory first and handed to
//! one of the `*_response` helpers here, which attach the content type.
//! Numbers in CSV are written with the shortest decimal text that parses
//! back to the same `f64`, and times as `YYYY-MM-DDTHH:MM:SS.fffZ`.

use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::{IntoResponse, Response};
use fits_db::SpatialRow;
use fits_types::Point;
use fits_types::time::millis_utc;
use serde::Serialize;

use crate::error::ApiError;

/// JSON documents.
pub const V1_JSON: &str = "application/json;version=1";
/// `GeoJSON` documents.
pub const V1_GEOJSON: &str = "application/vnd.geo+json;version=1";
/// CSV tables.
pub const V1_CSV: &str = "text/csv;version=1";
/// SVG images.
pub const SVG: &str = "image/svg+xml";

const VERSIONED: [&str; 3] = [V1_JSON, V1_GEOJSON, V1_CSV];

/// Reject a request whose `Accept` header names another versioned FITS
/// representation. Anything else, including no header or `*/*`, gets the
/// route's own representation.
pub fn negotiate(headers: &HeaderMap, offered: &str) -> Result<(), ApiError> {
    let Some(accept) = headers.get(header::ACCEPT).and_then(|v| v.to_str().ok()) else {
        return Ok(());
    };
    let accept = accept.trim();
    if accept != offered && VERSIONED.contains(&accept) {
        return Err(ApiError::NotAcceptable(format!(
            "can't find a route for Accept header {accept}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// A CSV table built in memory.
#[derive(Debug, Default)]
pub struct Csv {
    buf: String,
}

impl Csv {
    /// Start a table with a header row.
    pub fn new(header: &[&str]) -> Self {
        let mut buf = header.join(", ");
        buf.push('\n');
        Self { buf }
    }

    /// Header for a single site series of `type_id` in `unit`.
    pub fn series(type_id: &str, unit: &str) -> Self {
        Self::new(&[
            "date-time",
            &format!("{type_id} ({unit})"),
            &format!("error ({unit})"),
        ])
    }

    /// Header for a spatial selection projected into `srs`.
    pub fn spatial(type_id: &str, unit: &str, srs: &str) -> Self {
        Self::new(&[
            "siteID",
            &format!("X ({srs})"),
            &format!("Y ({srs})"),
            "height",
            "groundRelationship",
            "date-time",
            &format!("{type_id} ({unit})"),
            &format!("error ({unit})"),
        ])
    }

    /// Append a `time,value,error` row.
    pub fn push_point(&mut self, p: &Point) {
        self.buf
            .push_str(&format!("{},{},{}\n", millis_utc(&p.time), p.value, p.error));
    }

    /// Append a spatial row.
    pub fn push_spatial(&mut self, r: &SpatialRow) {
        self.buf.push_str(&format!(
            "{},{},{},{},{},{},{},{}\n",
            r.site_id,
            r.x,
            r.y,
            r.height,
            r.ground_relationship,
            millis_utc(&r.time),
            r.value,
            r.error
        ));
    }

    /// The finished table.
    pub fn into_string(self) -> String {
        self.buf
    }
}

/// `FITS-<parts joined by ->.csv`, skipping absent parts.
pub fn csv_filename(parts: &[Option<&str>]) -> String {
    let mut name = String::from("FITS");
    for p in parts.iter().flatten() {
        name.push('-');
        name.push_str(p);
    }
    name.push_str(".csv");
    name
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// A CSV attachment.
pub fn csv_response(body: String, filename: &str) -> Response {
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(V1_CSV)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response()
}

/// A JSON document with the given content type.
pub fn json_response<T: Serialize>(value: &T, content_type: &'static str) -> Result<Response, ApiError> {
    let body = serde_json::to_string(value)
        .map_err(|e| ApiError::Internal(format!("JSON error: {e}")))?;
    Ok(([(header::CONTENT_TYPE, content_type)], body).into_response())
}

/// An SVG image.
pub fn svg_response(body: String) -> Response {
    ([(header::CONTENT_TYPE, SVG)], body).into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn day(d: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2010, 1, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn series_table() {
        let mut csv = Csv::series("t1", "mm");
        csv.push_point(&Point::new(day(1), 1.0, 0.1));
        csv.push_point(&Point::new(day(2), 2.0, 0.2));
        csv.push_point(&Point::new(day(3), 3.0, 0.3));
        assert_eq!(
            csv.into_string(),
            "date-time, t1 (mm), error (mm)\n\
             2010-01-01T00:00:00.000Z,1,0.1\n\
             2010-01-02T00:00:00.000Z,2,0.2\n\
             2010-01-03T00:00:00.000Z,3,0.3\n"
        );
    }

    #[test]
    fn shortest_round_trip_numbers() {
        let mut csv = Csv::new(&["x"]);
        csv.push_point(&Point::new(day(1), 0.1 + 0.2, -12.5));
        let text = csv.into_string();
        let row = text.lines().nth(1).unwrap();
        assert_eq!(row, "2010-01-01T00:00:00.000Z,0.30000000000000004,-12.5");
    }

    #[test]
    fn spatial_table() {
        let mut csv = Csv::spatial("t1", "mm", "EPSG:4326");
        csv.push_spatial(&SpatialRow {
            site_id: "TEST1".into(),
            x: 176.5,
            y: -38.25,
            height: 40.0,
            ground_relationship: -1.0,
            time: day(1),
            value: 1.0,
            error: 0.0,
        });
        assert_eq!(
            csv.into_string(),
            "siteID, X (EPSG:4326), Y (EPSG:4326), height, groundRelationship, date-time, t1 (mm), error (mm)\n\
             TEST1,176.5,-38.25,40,-1,2010-01-01T00:00:00.000Z,1,0\n"
        );
    }

    #[test]
    fn filenames() {
        assert_eq!(csv_filename(&[Some("TEST1"), Some("t1"), None]), "FITS-TEST1-t1.csv");
        assert_eq!(csv_filename(&[Some("t1"), Some("m1")]), "FITS-t1-m1.csv");
    }

    #[test]
    fn negotiation() {
        let mut h = HeaderMap::new();
        assert!(negotiate(&h, V1_CSV).is_ok());
        h.insert(header::ACCEPT, HeaderValue::from_static("*/*"));
        assert!(negotiate(&h, V1_CSV).is_ok());
        h.insert(header::ACCEPT, HeaderValue::from_static(V1_CSV));
        assert!(negotiate(&h, V1_CSV).is_ok());
        h.insert(header::ACCEPT, HeaderValue::from_static(V1_JSON));
        assert!(matches!(negotiate(&h, V1_CSV), Err(ApiError::NotAcceptable(_))));
    }
}
