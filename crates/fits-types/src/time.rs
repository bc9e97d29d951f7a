//! Timestamp formatting.
//!
//! CSV rows and chart results use millisecond precision with a literal `Z`
//! suffix, e.g. `2010-01-01T00:00:00.000Z`. This format is part of the
//! public API.

use chrono::{DateTime, Utc};

/// Format `t` as `YYYY-MM-DDTHH:MM:SS.fffZ`.
pub fn millis_utc(t: &DateTime<Utc>) -> String {
    t.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Format `t` as a calendar date `YYYY-MM-DD`.
pub fn date(t: &DateTime<Utc>) -> String {
    t.format("%Y-%m-%d").to_string()
}
