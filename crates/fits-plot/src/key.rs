//! The plot key.
//!
//! One entry per series in sorted label order. Multi-word labels wrap one
//! word per line. A mean and standard deviation entry, without a marker,
//! follows when the plot shades a band.

use serde::Serialize;

const LINE_HEIGHT: i64 = 12;
const ENTRY_GAP: i64 = 5;

/// A line of key text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyText {
    /// Horizontal offset.
    pub x: i64,
    /// Vertical offset.
    pub y: i64,
    /// Text.
    pub text: String,
}

/// One key entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyEntry {
    /// Marker colour, absent for the band entry.
    pub colour: Option<String>,
    /// Vertical offset of the marker.
    pub y: i64,
    /// Lines of text.
    pub text: Vec<KeyText>,
}

/// Build key entries from `(label, colour)` pairs.
pub fn entries(series: &[(&str, &str)], band: Option<(f64, f64)>) -> Vec<KeyEntry> {
    let mut sorted: Vec<(&str, &str)> = series.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let mut y: i64 = 0;
    let mut out = Vec::with_capacity(sorted.len().saturating_add(1));

    for (label, colour) in sorted {
        let mut words = label.split_whitespace();
        let mut text = Vec::new();
        let marker_y = y;
        if let Some(first) = words.next() {
            text.push(KeyText {
                x: 6,
                y,
                text: first.to_owned(),
            });
            y = y.saturating_add(LINE_HEIGHT);
        }
        for w in words {
            text.push(KeyText {
                x: 9,
                y,
                text: w.to_owned(),
            });
            y = y.saturating_add(LINE_HEIGHT);
        }
        out.push(KeyEntry {
            colour: Some(colour.to_owned()),
            y: marker_y,
            text,
        });
        y = y.saturating_add(ENTRY_GAP);
    }

    if let Some((mean, stddev)) = band {
        y = y.saturating_add(ENTRY_GAP);
        out.push(KeyEntry {
            colour: None,
            y,
            text: vec![
                KeyText {
                    x: 0,
                    y,
                    text: format!("mean: {mean:.3}"),
                },
                KeyText {
                    x: 0,
                    y: y.saturating_add(13),
                    text: format!("stddev: {stddev:.3}"),
                },
            ],
        });
    }

    out
}
