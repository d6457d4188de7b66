// Ring checks applied to polygons that enter the pipeline from outside
use geo::line_intersection::{line_intersection, LineIntersection};
use geo_types::{Coord, Line};

use crate::error::{PipelineError, Result};

fn boxes_overlap(a: &Line<f64>, b: &Line<f64>) -> bool {
    let (a_min_x, a_max_x) = (a.start.x.min(a.end.x), a.start.x.max(a.end.x));
    let (a_min_y, a_max_y) = (a.start.y.min(a.end.y), a.start.y.max(a.end.y));
    let (b_min_x, b_max_x) = (b.start.x.min(b.end.x), b.start.x.max(b.end.x));
    let (b_min_y, b_max_y) = (b.start.y.min(b.end.y), b.start.y.max(b.end.y));
    !(b_max_x < a_min_x || b_min_x > a_max_x || b_max_y < a_min_y || b_min_y > a_max_y)
}

/// Check that `ring` is closed, has at least three distinct vertices and does
/// not cross itself. Touching itself at a vertex is allowed, since diagonal
/// raster regions produce exactly that.
pub fn validate_ring(ring: &[Coord<f64>]) -> Result<()> {
    let (Some(first), Some(last)) = (ring.first(), ring.last()) else {
        return Err(PipelineError::invalid_polygon("ring has no coordinates"));
    };
    if first != last {
        return Err(PipelineError::invalid_polygon(format!(
            "ring is not closed: starts at ({}, {}) and ends at ({}, {})",
            first.x, first.y, last.x, last.y
        )));
    }
    if ring.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return Err(PipelineError::invalid_polygon("ring has non-finite coordinates"));
    }

    let segments: Vec<Line<f64>> = ring
        .windows(2)
        .filter(|pair| pair[0] != pair[1])
        .map(|pair| Line::new(pair[0], pair[1]))
        .collect();
    if segments.len() < 3 {
        return Err(PipelineError::invalid_polygon(format!(
            "ring needs at least 3 distinct vertices, got {}",
            segments.len()
        )));
    }

    let n = segments.len();
    for i in 0..n {
        for j in (i + 1)..n {
            let (a, b) = (&segments[i], &segments[j]);
            if !boxes_overlap(a, b) {
                continue;
            }
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            let crossing = match line_intersection(*a, *b) {
                None => false,
                Some(LineIntersection::Collinear { .. }) => true,
                Some(LineIntersection::SinglePoint { is_proper, .. }) => !adjacent && is_proper,
            };
            if crossing {
                return Err(PipelineError::invalid_polygon(format!(
                    "ring intersects itself between segments {} and {}",
                    i, j
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::coord;

    fn ring(points: &[(f64, f64)]) -> Vec<Coord<f64>> {
        points.iter().map(|&(x, y)| coord! { x: x, y: y }).collect()
    }

    #[test]
    fn accepts_closed_square() {
        let square = ring(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.0, 0.0)]);
        assert!(validate_ring(&square).is_ok());
    }

    #[test]
    fn rejects_unclosed_ring() {
        let open = ring(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);
        assert!(matches!(
            validate_ring(&open),
            Err(PipelineError::InvalidPolygon { .. })
        ));
    }

    #[test]
    fn rejects_bow_tie() {
        let bow_tie = ring(&[(0.0, 0.0), (1.0, 1.0), (1.0, 0.0), (0.0, 1.0), (0.0, 0.0)]);
        assert!(matches!(
            validate_ring(&bow_tie),
            Err(PipelineError::InvalidPolygon { .. })
        ));
    }

    #[test]
    fn rejects_spike_back_along_edge() {
        let spike = ring(&[(0.0, 0.0), (2.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 0.0)]);
        assert!(validate_ring(&spike).is_err());
    }

    #[test]
    fn rejects_degenerate_ring() {
        let line = ring(&[(0.0, 0.0), (1.0, 0.0), (0.0, 0.0)]);
        assert!(validate_ring(&line).is_err());
    }

    #[test]
    fn accepts_pinch_vertex() {
        // two unit squares meeting at (1, 1)
        let figure_eight = ring(&[
            (0.0, 0.0),
            (1.0, 0.0),
            (1.0, 1.0),
            (2.0, 1.0),
            (2.0, 2.0),
            (1.0, 2.0),
            (1.0, 1.0),
            (0.0, 1.0),
            (0.0, 0.0),
        ]);
        assert!(validate_ring(&figure_eight).is_ok());
    }
}
