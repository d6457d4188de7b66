// Building footprint prisms -> flat height-tagged polygons
use geo_types::{Coord, LineString, Polygon};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::models::{BuildingFootprint, Feature, FeatureSet};
use crate::ring_validation::validate_ring;
use crate::{console_log, console_warn};

/// What to do with courtyard rings in a footprint.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum HolePolicy {
    /// Fail with `UnsupportedFootprint`.
    #[default]
    Reject,
    /// Keep the first part's exterior only, filling courtyards and dropping
    /// further parts. Logged per building.
    Fill,
}

/// One feature per building, in input order, with
/// `val = averageEaveHeight + base elevation`.
pub fn project_footprints(buildings: Vec<BuildingFootprint>, policy: HolePolicy) -> Result<FeatureSet> {
    let features = buildings
        .into_iter()
        .enumerate()
        .map(|(index, building)| project_footprint(index, building, policy))
        .collect::<Result<Vec<_>>>()?;

    console_log!("Projected {} building footprints", features.len());
    Ok(FeatureSet::new(features))
}

fn project_footprint(index: usize, building: BuildingFootprint, policy: HolePolicy) -> Result<Feature> {
    let base = building.base_elevation().ok_or_else(|| {
        PipelineError::invalid_polygon(format!("building {} has an empty footprint", index))
    })?;

    let BuildingFootprint {
        footprint3d,
        average_eave_height,
    } = building;
    let mut polygons = footprint3d.coordinates.into_iter();
    let rings = polygons.next().unwrap_or_default();
    let extra_parts = polygons.count();
    if extra_parts > 0 {
        match policy {
            HolePolicy::Reject => {
                return Err(PipelineError::unsupported_footprint(
                    index,
                    format!("footprint has {} extra part(s)", extra_parts),
                ));
            }
            HolePolicy::Fill => {
                console_warn!("Building {}: keeping the first part, dropping {}", index, extra_parts);
            }
        }
    }

    let mut rings = rings.into_iter();
    let exterior = rings.next().unwrap_or_default();
    let holes = rings.count();
    if holes > 0 {
        match policy {
            HolePolicy::Reject => {
                return Err(PipelineError::unsupported_footprint(
                    index,
                    format!("footprint has {} hole ring(s)", holes),
                ));
            }
            HolePolicy::Fill => {
                console_warn!("Building {}: filling {} hole ring(s)", index, holes);
            }
        }
    }

    let exterior: Vec<Coord<f64>> = exterior.iter().map(|p| Coord { x: p[0], y: p[1] }).collect();
    validate_ring(&exterior).map_err(|err| match err {
        PipelineError::InvalidPolygon { message } => {
            PipelineError::invalid_polygon(format!("building {}: {}", index, message))
        }
        other => other,
    })?;

    Ok(Feature::new(
        Polygon::new(LineString::from(exterior), Vec::new()),
        average_eave_height + base,
    ))
}
