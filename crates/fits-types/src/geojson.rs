//! `GeoJSON` documents for sites.
//!
//! Only the subset needed for site collections is modelled: a
//! `FeatureCollection` of `Point` features. `features` always serializes as
//! an array, empty when nothing matched.

use serde::{Deserialize, Serialize};

use crate::model::Site;

/// Properties carried by each site feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteProperties {
    /// Site identifier.
    #[serde(rename = "siteID")]
    pub site_id: String,
    /// Site name.
    pub name: String,
    /// Height in meters.
    pub height: f64,
    /// Ground relationship in meters.
    #[serde(rename = "groundRelationship")]
    pub ground_relationship: f64,
}

/// A `Point` geometry, `[longitude, latitude]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    /// Always `Point`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Longitude then latitude.
    pub coordinates: [f64; 2],
}

/// One site as a `GeoJSON` feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Always `Feature`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Site location.
    pub geometry: Geometry,
    /// Site attributes.
    pub properties: SiteProperties,
}

/// A collection of site features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    /// Always `FeatureCollection`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Features in query order.
    pub features: Vec<Feature>,
}

impl From<Site> for Feature {
    fn from(s: Site) -> Self {
        Self {
            kind: "Feature".to_owned(),
            geometry: Geometry {
                kind: "Point".to_owned(),
                coordinates: [s.longitude, s.latitude],
            },
            properties: SiteProperties {
                site_id: s.site_id,
                name: s.name,
                height: s.height,
                ground_relationship: s.ground_relationship,
            },
        }
    }
}

impl FromIterator<Site> for FeatureCollection {
    fn from_iter<I: IntoIterator<Item = Site>>(iter: I) -> Self {
        Self {
            kind: "FeatureCollection".to_owned(),
            features: iter.into_iter().map(Feature::from).collect(),
        }
    }
}

impl FeatureCollection {
    /// Sites as `(longitude, latitude, siteID, name)`, for map markers.
    pub fn points(&self) -> impl Iterator<Item = (f64, f64, &str, &str)> {
        self.features.iter().map(|f| {
            let [lon, lat] = f.geometry.coordinates;
            (lon, lat, f.properties.site_id.as_str(), f.properties.name.as_str())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    fn taupo() -> Site {
        Site {
            site_id: "TAUP".into(),
            name: "Taupo".into(),
            longitude: 176.08,
            latitude: -38.74,
            height: 12.5,
            ground_relationship: -1.0,
        }
    }

    #[test]
    fn empty_collection_has_array() {
        let fc: FeatureCollection = std::iter::empty().collect();
        assert_eq!(
            serde_json::to_string(&fc).unwrap(),
            r#"{"type":"FeatureCollection","features":[]}"#
        );
    }

    #[test]
    fn feature_shape() {
        let fc: FeatureCollection = std::iter::once(taupo()).collect();
        let v = serde_json::to_value(&fc).unwrap();
        let f = &v["features"][0];
        assert_eq!(f["type"], "Feature");
        assert_eq!(f["geometry"]["type"], "Point");
        assert_eq!(f["geometry"]["coordinates"][0], 176.08);
        assert_eq!(f["geometry"]["coordinates"][1], -38.74);
        assert_eq!(f["properties"]["siteID"], "TAUP");
        assert_eq!(f["properties"]["name"], "Taupo");
        assert_eq!(f["properties"]["height"], 12.5);
        assert_eq!(f["properties"]["groundRelationship"], -1.0);
    }

    #[test]
    fn points_for_markers() {
        let fc: FeatureCollection = std::iter::once(taupo()).collect();
        let p: Vec<_> = fc.points().collect();
        assert_eq!(p, vec![(176.08, -38.74, "TAUP", "Taupo")]);
    }
}
