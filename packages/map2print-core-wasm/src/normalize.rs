// Rebase elevations onto a zero floor and apply the vertical exaggeration.
use crate::console_log;
use crate::error::{PipelineError, Result};
use crate::models::{BuildingFootprint, Feature, FeatureSet};

pub const TERRAIN_HEIGHT_MULTIPLIER: f64 = 2.0;
pub const BUILDING_HEIGHT_MULTIPLIER: f64 = 2.0;

/// Global minimum of a value sequence. Empty or non-finite input is rejected.
fn floor_of(values: impl Iterator<Item = f64>, what: &str) -> Result<f64> {
    let mut min: Option<f64> = None;
    for value in values {
        if !value.is_finite() {
            return Err(PipelineError::degenerate_heights(format!(
                "{} contains non-finite value {}",
                what, value
            )));
        }
        min = Some(min.map_or(value, |m| m.min(value)));
    }
    min.ok_or_else(|| PipelineError::degenerate_heights(format!("{} is empty", what)))
}

/// Replace every feature value with `(val - min) * multiplier`, `min` taken
/// over the whole set.
pub fn normalize_heights(set: FeatureSet, multiplier: f64) -> Result<FeatureSet> {
    let min = floor_of(set.values(), "feature set")?;

    let FeatureSet { name, features } = set;
    let features = features
        .into_iter()
        .map(|f| Feature::new(f.polygon, (f.val - min) * multiplier))
        .collect();

    Ok(FeatureSet { name, features })
}

/// Same rebasing for building footprints: every z of every ring of each
/// footprint's first polygon, against the minimum over all buildings.
pub fn normalize_footprint_heights(
    buildings: Vec<BuildingFootprint>,
    multiplier: f64,
) -> Result<Vec<BuildingFootprint>> {
    let min = floor_of(
        buildings.iter().flat_map(|b| b.z_values()),
        "building footprints",
    )?;
    console_log!(
        "Normalizing {} building footprints against base elevation {}",
        buildings.len(),
        min
    );

    Ok(buildings
        .into_iter()
        .map(|mut building| {
            if let Some(polygon) = building.footprint3d.coordinates.first_mut() {
                for point in polygon.iter_mut().flatten() {
                    point[2] = (point[2] - min) * multiplier;
                }
            }
            building
        })
        .collect())
}
