// Shared data structures passed between the pipeline stages
use geo_types::Polygon;
use serde::{Deserialize, Serialize};

/// A polygon tagged with a single scalar elevation or height.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub polygon: Polygon<f64>,
    pub val: f64,
}

impl Feature {
    pub fn new(polygon: Polygon<f64>, val: f64) -> Self {
        Self { polygon, val }
    }
}

/// Ordered collection of features. Order is insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureSet {
    pub name: Option<String>,
    pub features: Vec<Feature>,
}

impl FeatureSet {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            name: None,
            features,
        }
    }

    pub fn named(name: impl Into<String>, features: Vec<Feature>) -> Self {
        Self {
            name: Some(name.into()),
            features,
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.features.iter().map(|f| f.val)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Footprint3d {
    /// polygons -> rings -> [x, y, z]
    pub coordinates: Vec<Vec<Vec<[f64; 3]>>>,
}

/// Building record as returned by the buildings service.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BuildingFootprint {
    pub footprint3d: Footprint3d,
    pub average_eave_height: f64,
}

impl BuildingFootprint {
    /// Ground reference: z of the first vertex of the first ring.
    pub fn base_elevation(&self) -> Option<f64> {
        self.footprint3d
            .coordinates
            .first()
            .and_then(|polygon| polygon.first())
            .and_then(|ring| ring.first())
            .map(|p| p[2])
    }

    /// z-values of every vertex of every ring of the first polygon.
    pub fn z_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.footprint3d
            .coordinates
            .iter()
            .take(1)
            .flatten()
            .flatten()
            .map(|p| p[2])
    }
}

/// Indexed triangle mesh. Indices are 0-based.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub positions: Vec<[f64; 3]>,
    pub triangles: Vec<[usize; 3]>,
}

impl Mesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }
}

#[derive(Serialize, Deserialize)]
pub struct CacheStats {
    pub raster_tiles_count: usize,
    pub terrain_feature_sets_count: usize,
    pub max_raster_tiles: usize,
    pub total_requests: usize,
    pub hit_rate: f64,
}
