// Terrain and building branches, merge, and mesh export
use geo_types::Coord;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::export_obj::mesh_to_obj;
use crate::extrude::extrude_features;
use crate::footprint::project_footprints;
use crate::frame::{rotate_features, transform_features, LocalFrame};
use crate::models::{BuildingFootprint, FeatureSet, Mesh};
use crate::normalize::{normalize_footprint_heights, normalize_heights};
use crate::polygonize::{polygonize, VECTOR_LAYER_NAME};
use crate::raster::RasterBand;
use crate::{console_log, console_warn};

/// Polygonize, normalize and place a terrain raster around `center` (lon, lat).
pub fn terrain_features(
    band: &RasterBand,
    center: Coord<f64>,
    radius_m: f64,
    config: &PipelineConfig,
) -> Result<FeatureSet> {
    let polygons = polygonize(band, config.connectivity);
    if polygons.is_empty() {
        return Ok(polygons);
    }

    let normalized = normalize_heights(polygons, config.terrain_height_multiplier)?;
    let frame = LocalFrame::new(center, radius_m).with_pixel_dimension(config.pixel_dimension);
    let centred = transform_features(normalized, &frame);

    if config.rotate_degrees == 0.0 {
        Ok(centred)
    } else {
        Ok(rotate_features(centred, config.rotate_degrees))
    }
}

/// Terrain branch starting from a decoded image buffer. A malformed image
/// degrades to an empty feature set.
pub fn terrain_features_from_image(
    width: usize,
    height: usize,
    channels: usize,
    pixels: &[u8],
    center: Coord<f64>,
    radius_m: f64,
    config: &PipelineConfig,
) -> Result<FeatureSet> {
    match RasterBand::from_interleaved(width, height, channels, config.band_index, pixels) {
        Ok(band) => terrain_features(&band, center, radius_m, config),
        Err(PipelineError::InvalidRaster { message }) => {
            console_warn!("Ignoring terrain raster: {}", message);
            Ok(FeatureSet::named(VECTOR_LAYER_NAME, Vec::new()))
        }
        Err(err) => Err(err),
    }
}

/// Rebase building heights and flatten them into height-tagged polygons.
pub fn building_features(buildings: Vec<BuildingFootprint>, config: &PipelineConfig) -> Result<FeatureSet> {
    if buildings.is_empty() {
        console_log!("No buildings to project");
        return Ok(FeatureSet::default());
    }
    let normalized = normalize_footprint_heights(buildings, config.building_height_multiplier)?;
    project_footprints(normalized, config.hole_policy)
}

/// Concatenate two feature sets, `first` before `second`.
pub fn combine_features(first: FeatureSet, second: FeatureSet) -> FeatureSet {
    let FeatureSet { name, mut features } = first;
    features.extend(second.features);
    FeatureSet { name, features }
}

pub fn features_to_mesh(set: &FeatureSet, config: &PipelineConfig) -> Result<Mesh> {
    extrude_features(set, &config.extrude_options())
}

pub fn features_to_obj(set: &FeatureSet, config: &PipelineConfig) -> Result<String> {
    let mesh = features_to_mesh(set, config)?;
    Ok(mesh_to_obj(&mesh))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::metres_to_degrees;
    use crate::models::Footprint3d;
    use geo_types::coord;

    fn centre() -> Coord<f64> {
        coord! { x: 149.14685651385764, y: -35.3217767033581 }
    }

    #[rustfmt::skip]
    fn terrain_band() -> RasterBand {
        RasterBand::new(4, 4, vec![
            30.0, 30.0, 31.0, 31.0,
            30.0, 30.0, 31.0, 31.0,
            32.0, 32.0, 31.0, 31.0,
            32.0, 32.0, 32.0, 32.0,
        ])
        .unwrap()
    }

    fn footprint(x: f64, y: f64, z: f64, eave: f64) -> BuildingFootprint {
        let d = 0.0001;
        BuildingFootprint {
            footprint3d: Footprint3d {
                coordinates: vec![vec![vec![
                    [x, y, z],
                    [x + d, y, z],
                    [x + d, y + d, z],
                    [x, y + d, z],
                    [x, y, z],
                ]]],
            },
            average_eave_height: eave,
        }
    }

    #[test]
    fn terrain_branch_normalizes_and_centres() {
        let config = PipelineConfig {
            rotate_degrees: 0.0,
            pixel_dimension: 4.0,
            ..PipelineConfig::default()
        };
        let set = terrain_features(&terrain_band(), centre(), 300.0, &config).unwrap();

        assert_eq!(set.values().collect::<Vec<_>>(), vec![0.0, 2.0, 4.0]);

        let frame = LocalFrame::new(centre(), 300.0).with_pixel_dimension(4.0);
        assert_eq!(set.features[0].polygon.exterior().0[0], frame.anchor());
        // the full tile spans two radii west of the anchor
        let min_lon = set
            .features
            .iter()
            .flat_map(|f| f.polygon.exterior().coords().map(|c| c.x))
            .fold(f64::INFINITY, f64::min);
        assert!((min_lon - (frame.anchor().x - metres_to_degrees(600.0))).abs() < 1e-12);
    }

    #[test]
    fn terrain_branch_rotation_keeps_values() {
        let config = PipelineConfig {
            pixel_dimension: 4.0,
            ..PipelineConfig::default()
        };
        let set = terrain_features(&terrain_band(), centre(), 300.0, &config).unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.values().collect::<Vec<_>>(), vec![0.0, 2.0, 4.0]);
    }

    #[test]
    fn malformed_image_degrades_to_empty_terrain() {
        let set = terrain_features_from_image(4, 4, 4, &[0u8; 7], centre(), 300.0, &PipelineConfig::default())
            .unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn empty_image_gives_empty_terrain() {
        let set = terrain_features_from_image(0, 0, 4, &[], centre(), 300.0, &PipelineConfig::default()).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn building_branch_uses_normalized_base() {
        let buildings = vec![footprint(149.1, -35.3, 580.0, 6.0), footprint(149.2, -35.3, 577.0, 9.0)];
        let set = building_features(buildings, &PipelineConfig::default()).unwrap();
        // bases rebased to 0 and 6, eave added unscaled
        assert_eq!(set.values().collect::<Vec<_>>(), vec![12.0, 9.0]);
    }

    #[test]
    fn no_buildings_is_empty_set() {
        let set = building_features(Vec::new(), &PipelineConfig::default()).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn combined_sets_export_to_obj() {
        let config = PipelineConfig::default();
        let terrain = terrain_features(&terrain_band(), centre(), 300.0, &config).unwrap();
        let buildings = building_features(vec![footprint(149.1468, -35.3217, 580.0, 6.0)], &config).unwrap();

        let combined = combine_features(terrain, buildings);
        assert_eq!(combined.len(), 4);
        assert_eq!(combined.features[3].val, 6.0);

        let mesh = features_to_mesh(&combined, &config).unwrap();
        let obj = features_to_obj(&combined, &config).unwrap();

        let vertex_lines = obj.lines().filter(|l| l.starts_with("v ")).count();
        let face_lines: Vec<&str> = obj.lines().filter(|l| l.starts_with("f ")).collect();
        assert_eq!(vertex_lines, mesh.vertex_count());
        assert_eq!(face_lines.len(), mesh.triangle_count());

        for line in face_lines {
            for index in line.split_whitespace().skip(1) {
                let index: usize = index.parse().unwrap();
                assert!((1..=vertex_lines).contains(&index));
            }
        }
    }
}
