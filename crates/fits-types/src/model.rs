//! Core entities: sites, types, methods, observations and statistics.
//!
//! Field names in the serialized form are part of the public HTTP contract
//! and are fixed with `#[serde(rename)]` where they differ from Rust naming.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sample identifier applied on ingest when the client supplies none.
pub const DEFAULT_SAMPLE_ID: &str = "none";

// ---------------------------------------------------------------------------
// Reference data
// ---------------------------------------------------------------------------

/// A physical location at which observations are recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    /// Stable unique identifier.
    #[serde(rename = "siteID")]
    pub site_id: String,
    /// Human readable name.
    pub name: String,
    /// WGS84 longitude in degrees.
    pub longitude: f64,
    /// WGS84 latitude in degrees.
    pub latitude: f64,
    /// Height in meters.
    pub height: f64,
    /// Ground relationship in meters, negative above ground.
    #[serde(rename = "groundRelationship")]
    pub ground_relationship: f64,
}

/// A measurable quantity together with its unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationType {
    /// Unique identifier, e.g. `e` or `t1`.
    #[serde(rename = "typeID")]
    pub type_id: String,
    /// Short human name, e.g. `east`.
    pub name: String,
    /// Unit symbol, e.g. `mm`.
    pub unit: String,
    /// Long description, used for plot titles.
    pub description: String,
}

/// A measurement procedure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Method {
    /// Unique identifier.
    #[serde(rename = "methodID")]
    pub method_id: String,
    /// Human name.
    pub name: String,
    /// Long description.
    pub description: String,
    /// Reference URL.
    pub reference: String,
}

/// The `/type` response document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TypeCatalog {
    /// Every type, ordered by identifier.
    #[serde(rename = "type")]
    pub types: Vec<ObservationType>,
}

/// The `/method` response document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MethodCatalog {
    /// Methods, optionally restricted to those valid for one type.
    #[serde(rename = "method")]
    pub methods: Vec<Method>,
}

// ---------------------------------------------------------------------------
// Observations
// ---------------------------------------------------------------------------

/// One observation as written through the ingest path.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Site identifier.
    pub site_id: String,
    /// Type identifier.
    pub type_id: String,
    /// Method identifier.
    pub method_id: String,
    /// Sample identifier, [`DEFAULT_SAMPLE_ID`] when absent.
    pub sample_id: String,
    /// Observation time (UTC, nanosecond precision).
    pub time: DateTime<Utc>,
    /// Observed value.
    pub value: f64,
    /// Observation error; 0 means unknown.
    pub error: f64,
}

/// A single timestamped value with its error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Observation time.
    #[serde(rename = "DateTime")]
    pub time: DateTime<Utc>,
    /// Observed value.
    #[serde(rename = "Value")]
    pub value: f64,
    /// Observation error.
    #[serde(rename = "Error")]
    pub error: f64,
}

impl Point {
    /// Create a point.
    pub const fn new(time: DateTime<Utc>, value: f64, error: f64) -> Self {
        Self { time, value, error }
    }
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// The `/observation/stats` response document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ObservationStats {
    /// Largest value, earliest on ties.
    pub maximum: Point,
    /// Smallest value, earliest on ties.
    pub minimum: Point,
    /// Earliest point.
    pub first: Point,
    /// Latest point.
    pub last: Point,
    /// Arithmetic mean of the values.
    pub mean: f64,
    /// Population standard deviation of the values.
    pub stddev_population: f64,
    /// Unit symbol of the type.
    pub unit: String,
}

/// Single-pass accumulator for [`ObservationStats`].
///
/// Points must be pushed in ascending time order. Mean and variance use
/// Welford's update so the whole series is never held in memory.
#[derive(Debug, Clone, Default)]
pub struct StatsAccumulator {
    count: u64,
    mean: f64,
    m2: f64,
    first: Option<Point>,
    last: Option<Point>,
    minimum: Option<Point>,
    maximum: Option<Point>,
}

impl StatsAccumulator {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of points seen so far.
    pub const fn count(&self) -> u64 {
        self.count
    }

    /// Add the next point in time order.
    #[allow(clippy::cast_precision_loss)]
    pub fn push(&mut self, p: Point) {
        self.count = self.count.saturating_add(1);
        let delta = p.value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (p.value - self.mean);

        if self.first.is_none() {
            self.first = Some(p);
        }
        self.last = Some(p);

        // Strict comparisons keep the earliest point on ties.
        if self.minimum.is_none_or(|m| p.value < m.value) {
            self.minimum = Some(p);
        }
        if self.maximum.is_none_or(|m| p.value > m.value) {
            self.maximum = Some(p);
        }
    }

    /// Finish accumulation. Returns `None` when no point was pushed.
    #[allow(clippy::cast_precision_loss)]
    pub fn finish(self, unit: &str) -> Option<ObservationStats> {
        let (first, last) = (self.first?, self.last?);
        let (minimum, maximum) = (self.minimum?, self.maximum?);
        let variance = if self.count == 0 {
            0.0
        } else {
            self.m2 / self.count as f64
        };

        Some(ObservationStats {
            maximum,
            minimum,
            first,
            last,
            mean: self.mean,
            stddev_population: variance.max(0.0).sqrt(),
            unit: unit.to_owned(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn day(d: u32, value: f64, error: f64) -> Point {
        Point::new(Utc.with_ymd_and_hms(2010, 1, d, 0, 0, 0).unwrap(), value, error)
    }

    #[test]
    fn stats_of_three_points() {
        let mut acc = StatsAccumulator::new();
        acc.push(day(1, 1.0, 0.1));
        acc.push(day(2, 2.0, 0.2));
        acc.push(day(3, 3.0, 0.3));
        let s = acc.finish("mm").unwrap();

        assert!((s.mean - 2.0).abs() < 1e-12);
        assert!((s.stddev_population - 0.816_496_580_927_726).abs() < 1e-12);
        assert_eq!(s.minimum.value, 1.0);
        assert_eq!(s.maximum.value, 3.0);
        assert_eq!(s.first.value, 1.0);
        assert_eq!(s.last.value, 3.0);
        assert_eq!(s.unit, "mm");
    }

    #[test]
    fn empty_selection_has_no_stats() {
        assert!(StatsAccumulator::new().finish("mm").is_none());
    }

    #[test]
    fn ties_keep_earliest() {
        let mut acc = StatsAccumulator::new();
        acc.push(day(1, 5.0, 0.0));
        acc.push(day(2, 1.0, 0.0));
        acc.push(day(3, 5.0, 0.0));
        acc.push(day(4, 1.0, 0.0));
        let s = acc.finish("mm").unwrap();
        assert_eq!(s.maximum.time, day(1, 0.0, 0.0).time);
        assert_eq!(s.minimum.time, day(2, 0.0, 0.0).time);
    }

    #[test]
    fn stats_json_field_names() {
        let mut acc = StatsAccumulator::new();
        acc.push(day(1, 1.0, 0.1));
        let json = serde_json::to_value(acc.finish("mm").unwrap()).unwrap();
        for key in ["Maximum", "Minimum", "First", "Last", "Mean", "StddevPopulation", "Unit"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(json["First"]["DateTime"], "2010-01-01T00:00:00Z");
        assert_eq!(json["First"]["Value"], 1.0);
        assert_eq!(json["First"]["Error"], 0.1);
    }

    #[test]
    fn type_catalog_json() {
        let catalog = TypeCatalog {
            types: vec![ObservationType {
                type_id: "t1".into(),
                name: "east".into(),
                unit: "mm".into(),
                description: "displacement".into(),
            }],
        };
        assert_eq!(
            serde_json::to_string(&catalog).unwrap(),
            r#"{"type":[{"typeID":"t1","name":"east","unit":"mm","description":"displacement"}]}"#
        );
    }

    #[test]
    fn method_catalog_json() {
        let catalog = MethodCatalog {
            methods: vec![Method {
                method_id: "m1".into(),
                name: "doas-s".into(),
                description: "Scanning DOAS".into(),
                reference: "http://example.org".into(),
            }],
        };
        let json = serde_json::to_value(&catalog).unwrap();
        assert_eq!(json["method"][0]["methodID"], "m1");
        assert_eq!(json["method"][0]["reference"], "http://example.org");
    }
}
