// Pixel space -> local geographic frame around a centre point.
//
// Distances are converted with a mean-earth-radius linear approximation,
// which holds for tiles a few hundred metres across.
use geo::Rotate;
use geo_types::{Coord, Point};
use std::f64::consts::PI;

use crate::console_log;
use crate::models::{Feature, FeatureSet};

/// Mean earth radius in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;
/// Side length in pixels of the terrain rasters requested from the tile service.
pub const TERRAIN_PIXEL_DIMENSION: f64 = 400.0;

pub fn metres_to_degrees(metres: f64) -> f64 {
    (metres / EARTH_RADIUS_M) * 180.0 / PI
}

/// Square ground area of half-width `radius_m` around `center` (lon, lat),
/// covered by a raster of `pixel_dimension` pixels per side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalFrame {
    pub center: Coord<f64>,
    pub radius_m: f64,
    pub pixel_dimension: f64,
}

impl LocalFrame {
    pub fn new(center: Coord<f64>, radius_m: f64) -> Self {
        Self {
            center,
            radius_m,
            pixel_dimension: TERRAIN_PIXEL_DIMENSION,
        }
    }

    pub fn with_pixel_dimension(mut self, pixel_dimension: f64) -> Self {
        self.pixel_dimension = pixel_dimension;
        self
    }

    pub fn metres_per_pixel(&self) -> f64 {
        (self.radius_m * 2.0) / self.pixel_dimension
    }

    /// Reference corner that pixel (0, 0) maps onto.
    pub fn anchor(&self) -> Coord<f64> {
        let offset = metres_to_degrees(self.radius_m);
        Coord {
            x: self.center.x + offset,
            y: self.center.y - offset,
        }
    }

    /// Longitude shrinks as the column grows, latitude grows with the row.
    pub fn pixel_to_geo(&self, pixel: Coord<f64>) -> Coord<f64> {
        let anchor = self.anchor();
        let mpp = self.metres_per_pixel();
        Coord {
            x: anchor.x - metres_to_degrees(pixel.x * mpp),
            y: anchor.y + metres_to_degrees(pixel.y * mpp),
        }
    }
}

/// Map every ring of every feature from pixel space into the frame.
pub fn transform_features(set: FeatureSet, frame: &LocalFrame) -> FeatureSet {
    let FeatureSet { name, features } = set;
    let features = features
        .into_iter()
        .map(|f| {
            let mut polygon = f.polygon;
            polygon.exterior_mut(|ring| {
                ring.0.iter_mut().for_each(|c| *c = frame.pixel_to_geo(*c));
            });
            polygon.interiors_mut(|rings| {
                for ring in rings {
                    ring.0.iter_mut().for_each(|c| *c = frame.pixel_to_geo(*c));
                }
            });
            Feature::new(polygon, f.val)
        })
        .collect();

    FeatureSet { name, features }
}

/// Mean of all ring vertices, closing vertices excluded.
pub fn centroid_of(set: &FeatureSet) -> Option<Coord<f64>> {
    let mut sum = Coord { x: 0.0, y: 0.0 };
    let mut count = 0usize;
    for feature in &set.features {
        let rings = std::iter::once(feature.polygon.exterior()).chain(feature.polygon.interiors());
        for ring in rings {
            let coords = &ring.0;
            let open = if ring.is_closed() && !coords.is_empty() {
                &coords[..coords.len() - 1]
            } else {
                &coords[..]
            };
            for c in open {
                sum = sum + *c;
                count += 1;
            }
        }
    }
    (count > 0).then(|| sum / count as f64)
}

/// Rotate the whole set about its centroid, clockwise for positive `degrees`.
pub fn rotate_features(set: FeatureSet, degrees: f64) -> FeatureSet {
    let Some(pivot) = centroid_of(&set) else {
        return set;
    };
    console_log!(
        "Rotating {} features by {} degrees about ({}, {})",
        set.len(),
        degrees,
        pivot.x,
        pivot.y
    );

    let pivot = Point::from(pivot);
    let FeatureSet { name, features } = set;
    let features = features
        .into_iter()
        .map(|f| Feature::new(f.polygon.rotate_around_point(-degrees, pivot), f.val))
        .collect();

    FeatureSet { name, features }
}
