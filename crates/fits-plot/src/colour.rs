//! Series colours.
//!
//! Colours are handed out in sorted label order so a label keeps its colour
//! when other series come and go.

use fits_types::valid::Scheme;

const WEB: [&str; 7] = [
    "darkcyan",
    "darkgoldenrod",
    "lawngreen",
    "orangered",
    "darkcyan",
    "forestgreen",
    "mediumslateblue",
];

const PROJECTOR: [&str; 7] = ["black", "red", "blue", "magenta", "orange", "indigo", "purple"];

/// The palette for a scheme.
pub const fn palette(scheme: Scheme) -> &'static [&'static str] {
    match scheme {
        Scheme::Web => &WEB,
        Scheme::Projector => &PROJECTOR,
    }
}

/// Colour for each label, in the order the labels were given.
pub fn assign(labels: &[&str], scheme: Scheme) -> Vec<&'static str> {
    let colours = palette(scheme);
    let mut order: Vec<usize> = (0..labels.len()).collect();
    order.sort_by(|a, b| labels.get(*a).cmp(&labels.get(*b)));

    let mut out = vec![""; labels.len()];
    for (rank, idx) in order.into_iter().enumerate() {
        let colour = rank
            .checked_rem(colours.len())
            .and_then(|i| colours.get(i))
            .copied()
            .unwrap_or("black");
        if let Some(slot) = out.get_mut(idx) {
            *slot = colour;
        }
    }
    out
}
