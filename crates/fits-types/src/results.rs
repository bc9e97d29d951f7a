//! Chart results for `/observation_results`.
//!
//! One site gives the raw series as `[time, [value, error]]` rows. Several
//! sites give one row per UTC day on which any of them has data, holding
//! the daily mean `[value, error]` for each site in request order, or
//! `null` where a site has nothing that day.

use std::collections::{BTreeMap, BTreeSet};

use serde::ser::{SerializeSeq, Serializer};
use serde::Serialize;

use crate::model::Point;
use crate::time::millis_utc;

/// Mean value and error for one site on one UTC day.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyMean {
    /// Calendar day, `YYYY-MM-DD`.
    pub date: String,
    /// Site identifier.
    pub site_id: String,
    /// Mean of the values.
    pub value: f64,
    /// Mean of the errors.
    pub error: f64,
}

/// One row of the `results` array.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultRow {
    /// A raw observation: `[time, [value, error]]`.
    Raw(Point),
    /// One day across several sites: `[date, [v, e] | null, ...]`.
    Daily {
        /// Calendar day, `YYYY-MM-DD`.
        date: String,
        /// Per-site means in request order.
        entries: Vec<Option<(f64, f64)>>,
    },
}

impl Serialize for ResultRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Raw(p) => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element(&millis_utc(&p.time))?;
                seq.serialize_element(&[p.value, p.error])?;
                seq.end()
            }
            Self::Daily { date, entries } => {
                let mut seq = serializer.serialize_seq(Some(entries.len().saturating_add(1)))?;
                seq.serialize_element(date)?;
                for e in entries {
                    seq.serialize_element(&e.map(|(v, err)| [v, err]))?;
                }
                seq.end()
            }
        }
    }
}

/// The `/observation_results` response document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultsDocument {
    /// The requested type identifier.
    pub param: String,
    /// The requested sites, in request order.
    pub sites: Vec<String>,
    /// Result rows, ascending in time.
    pub results: Vec<ResultRow>,
}

impl ResultsDocument {
    /// Document for a single site's raw series.
    pub fn raw(type_id: &str, site_id: &str, points: Vec<Point>) -> Self {
        Self {
            param: type_id.to_owned(),
            sites: vec![site_id.to_owned()],
            results: points.into_iter().map(ResultRow::Raw).collect(),
        }
    }

    /// Document for several sites from per-site daily means.
    ///
    /// Rows cover exactly the days present in `means`, ascending.
    pub fn daily(type_id: &str, sites: &[String], means: &[DailyMean]) -> Self {
        let days: BTreeSet<&str> = means.iter().map(|m| m.date.as_str()).collect();
        let by_key: BTreeMap<(&str, &str), (f64, f64)> = means
            .iter()
            .map(|m| ((m.date.as_str(), m.site_id.as_str()), (m.value, m.error)))
            .collect();

        let results = days
            .into_iter()
            .map(|day| ResultRow::Daily {
                date: day.to_owned(),
                entries: sites
                    .iter()
                    .map(|s| by_key.get(&(day, s.as_str())).copied())
                    .collect(),
            })
            .collect();

        Self {
            param: type_id.to_owned(),
            sites: sites.to_vec(),
            results,
        }
    }
}
