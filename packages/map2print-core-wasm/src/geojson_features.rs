// GeoJSON-style feature exchange format shared with the UI and API consumers.
// Every feature carries a single numeric `val` property.
use geo_types::{Coord, LineString, Polygon};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::models::{Feature, FeatureSet};
use crate::ring_validation::validate_ring;

type RingCoords = Vec<Vec<f64>>;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Polygon(Vec<RingCoords>),
    MultiPolygon(Vec<Vec<RingCoords>>),
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Properties {
    pub val: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GeoJsonFeature {
    #[serde(rename = "type", default = "feature_type")]
    pub r#type: String,
    pub properties: Properties,
    pub geometry: Geometry,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FeatureCollection {
    #[serde(rename = "type", default = "collection_type")]
    pub r#type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub features: Vec<GeoJsonFeature>,
}

/// Body of the terrain API response.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TerrainResponseData {
    pub terrain: Vec<GeoJsonFeature>,
}

/// Body of the buildings API response.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BuildingsResponseData {
    pub buildings: Vec<GeoJsonFeature>,
}

fn feature_type() -> String {
    "Feature".to_string()
}

fn collection_type() -> String {
    "FeatureCollection".to_string()
}

fn ring_to_coords(ring: &LineString<f64>) -> RingCoords {
    ring.coords().map(|c| vec![c.x, c.y]).collect()
}

fn coords_to_ring(ring: RingCoords) -> Result<LineString<f64>> {
    let coords = ring
        .into_iter()
        .map(|position| match position.as_slice() {
            [x, y, ..] => Ok(Coord { x: *x, y: *y }),
            _ => Err(PipelineError::invalid_polygon(format!(
                "position needs at least 2 values, got {}",
                position.len()
            ))),
        })
        .collect::<Result<Vec<_>>>()?;
    validate_ring(&coords)?;
    Ok(LineString::from(coords))
}

fn rings_to_polygon(rings: Vec<RingCoords>) -> Result<Polygon<f64>> {
    let mut rings = rings.into_iter();
    let exterior = rings
        .next()
        .ok_or_else(|| PipelineError::invalid_polygon("polygon has no rings"))?;
    let exterior = coords_to_ring(exterior)?;
    let interiors = rings.map(coords_to_ring).collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(exterior, interiors))
}

impl GeoJsonFeature {
    pub fn from_feature(feature: &Feature) -> Self {
        let polygon = &feature.polygon;
        let rings = std::iter::once(polygon.exterior())
            .chain(polygon.interiors())
            .map(ring_to_coords)
            .collect();
        Self {
            r#type: feature_type(),
            properties: Properties { val: feature.val },
            geometry: Geometry::Polygon(rings),
        }
    }

    /// One feature per polygon; a MultiPolygon's parts share the `val`.
    pub fn into_features(self) -> Result<Vec<Feature>> {
        let val = self.properties.val;
        let polygons = match self.geometry {
            Geometry::Polygon(rings) => vec![rings],
            Geometry::MultiPolygon(polygons) => polygons,
        };
        polygons
            .into_iter()
            .map(|rings| Ok(Feature::new(rings_to_polygon(rings)?, val)))
            .collect()
    }
}

impl FeatureCollection {
    pub fn from_feature_set(set: &FeatureSet) -> Self {
        Self {
            r#type: collection_type(),
            name: set.name.clone(),
            features: set.features.iter().map(GeoJsonFeature::from_feature).collect(),
        }
    }

    pub fn from_features(features: Vec<GeoJsonFeature>) -> Self {
        Self {
            r#type: collection_type(),
            name: None,
            features,
        }
    }

    pub fn into_feature_set(self) -> Result<FeatureSet> {
        let mut features = Vec::with_capacity(self.features.len());
        for feature in self.features {
            features.extend(feature.into_features()?);
        }
        Ok(FeatureSet {
            name: self.name,
            features,
        })
    }
}

/// Parse either a FeatureCollection or a bare feature array.
pub fn parse_feature_set(json: &str) -> Result<FeatureSet> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Input {
        Collection(FeatureCollection),
        Features(Vec<GeoJsonFeature>),
    }

    let collection = match serde_json::from_str::<Input>(json)? {
        Input::Collection(collection) => collection,
        Input::Features(features) => FeatureCollection::from_features(features),
    };
    collection.into_feature_set()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::polygon;

    #[test]
    fn decodes_multipolygon_with_3d_positions() {
        let json = r#"{
            "type": "FeatureCollection",
            "features": [{
                "geometry": {"type": "MultiPolygon", "coordinates": [
                    [[[0, 0, 5], [1, 0, 5], [1, 1, 5], [0, 0, 5]]],
                    [[[2, 0], [3, 0], [3, 1], [2, 0]]]
                ]},
                "properties": {"val": 12.5}
            }]
        }"#;
        let set = parse_feature_set(json).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.values().all(|v| v == 12.5));
        assert_eq!(set.features[1].polygon.exterior().0[0], Coord { x: 2.0, y: 0.0 });
    }

    #[test]
    fn accepts_bare_feature_array() {
        let json = r#"[{"type": "Feature", "properties": {"val": 1},
            "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [0, 1], [0, 0]]]}}]"#;
        let set = parse_feature_set(json).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.name, None);
    }

    #[test]
    fn rejects_unclosed_ring() {
        let json = r#"{"features": [{"properties": {"val": 1},
            "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 1]]]}}]}"#;
        let err = parse_feature_set(json).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidPolygon { .. }));
    }

    #[test]
    fn rejects_self_crossing_ring() {
        let json = r#"{"features": [{"properties": {"val": 1},
            "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [1, 1], [1, 0], [0, 1], [0, 0]]]}}]}"#;
        assert!(parse_feature_set(json).is_err());
    }

    #[test]
    fn encodes_polygon_features_with_val() {
        let square = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)];
        let set = FeatureSet::named("vector", vec![Feature::new(square, 4.0)]);
        let value = serde_json::to_value(FeatureCollection::from_feature_set(&set)).unwrap();

        assert_eq!(value["type"], "FeatureCollection");
        assert_eq!(value["name"], "vector");
        let feature = &value["features"][0];
        assert_eq!(feature["type"], "Feature");
        assert_eq!(feature["properties"]["val"], 4.0);
        assert_eq!(feature["geometry"]["type"], "Polygon");
        assert_eq!(feature["geometry"]["coordinates"][0].as_array().unwrap().len(), 5);
    }

    #[test]
    fn encoded_set_decodes_to_same_features() {
        let framed = polygon!(
            exterior: [(x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 4.0), (x: 0.0, y: 4.0)],
            interiors: [[(x: 1.0, y: 1.0), (x: 1.0, y: 2.0), (x: 2.0, y: 2.0), (x: 2.0, y: 1.0)]],
        );
        let set = FeatureSet::named("vector", vec![Feature::new(framed, 2.0)]);
        let json = serde_json::to_string(&FeatureCollection::from_feature_set(&set)).unwrap();
        assert_eq!(parse_feature_set(&json).unwrap(), set);
    }
}
