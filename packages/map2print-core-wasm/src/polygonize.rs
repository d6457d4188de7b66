// Raster band -> polygon conversion.
//
// Cells are grouped into maximal regions of equal value, then each region's
// boundary is walked along cell edges. Walking direction keeps the region on
// the right-hand side in pixel space (rows grow downward), so exteriors come
// out with positive shoelace area and holes with negative area.
use std::collections::{HashMap, VecDeque};

use geo_types::{Coord, LineString, Polygon};
use serde::{Deserialize, Serialize};

use crate::console_log;
use crate::models::{Feature, FeatureSet};
use crate::raster::{GeoTransform, RasterBand};

/// Layer name given to polygonized feature sets.
pub const VECTOR_LAYER_NAME: &str = "vector";

const UNLABELED: usize = usize::MAX;

const FOUR_NEIGHBOURS: [(isize, isize); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];
const EIGHT_NEIGHBOURS: [(isize, isize); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
];

/// Adjacency rule used when grouping cells into regions.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(try_from = "u8", into = "u8")]
pub enum Connectivity {
    Four,
    #[default]
    Eight,
}

impl Connectivity {
    fn offsets(self) -> &'static [(isize, isize)] {
        match self {
            Connectivity::Four => &FOUR_NEIGHBOURS,
            Connectivity::Eight => &EIGHT_NEIGHBOURS,
        }
    }
}

impl TryFrom<u8> for Connectivity {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            4 => Ok(Connectivity::Four),
            8 => Ok(Connectivity::Eight),
            other => Err(format!("connectivity must be 4 or 8, got {}", other)),
        }
    }
}

impl From<Connectivity> for u8 {
    fn from(value: Connectivity) -> Self {
        match value {
            Connectivity::Four => 4,
            Connectivity::Eight => 8,
        }
    }
}

struct Region {
    value: f64,
    // (col, row), sorted in scan order
    cells: Vec<(usize, usize)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    East,
    South,
    West,
    North,
}

impl Step {
    // Turns are as seen on screen, with rows growing downward.
    fn turn_right(self) -> Self {
        match self {
            Step::East => Step::South,
            Step::South => Step::West,
            Step::West => Step::North,
            Step::North => Step::East,
        }
    }

    fn turn_left(self) -> Self {
        match self {
            Step::East => Step::North,
            Step::North => Step::West,
            Step::West => Step::South,
            Step::South => Step::East,
        }
    }
}

type Vertex = (i64, i64);

struct Edge {
    from: Vertex,
    to: Vertex,
    step: Step,
}

/// Convert a raster band into one feature per connected region of equal value.
///
/// Regions are emitted in raster scan order of their first cell. An empty band
/// yields an empty set.
pub fn polygonize(band: &RasterBand, connectivity: Connectivity) -> FeatureSet {
    if band.is_empty() {
        console_log!("Polygonize skipped: raster band has zero size");
        return FeatureSet::named(VECTOR_LAYER_NAME, Vec::new());
    }

    let (labels, regions) = label_regions(band, connectivity);
    let transform = band.geotransform();

    let features: Vec<Feature> = regions
        .iter()
        .enumerate()
        .map(|(label, region)| {
            let edges = boundary_edges(band.width(), band.height(), &labels, label, &region.cells);
            let rings = trace_rings(&edges, connectivity);
            Feature::new(build_polygon(rings, &transform), region.value)
        })
        .collect();

    console_log!(
        "Polygonized {}x{} band into {} regions",
        band.width(),
        band.height(),
        features.len()
    );

    FeatureSet::named(VECTOR_LAYER_NAME, features)
}

fn same_value(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

fn label_regions(band: &RasterBand, connectivity: Connectivity) -> (Vec<usize>, Vec<Region>) {
    let width = band.width();
    let height = band.height();
    let mut labels = vec![UNLABELED; width * height];
    let mut regions = Vec::new();
    let mut queue = VecDeque::new();

    for row in 0..height {
        for col in 0..width {
            if labels[row * width + col] != UNLABELED {
                continue;
            }

            let label = regions.len();
            let value = band.value(col, row);
            let mut cells = Vec::new();
            labels[row * width + col] = label;
            queue.push_back((col, row));

            while let Some((c, r)) = queue.pop_front() {
                cells.push((c, r));
                for &(dc, dr) in connectivity.offsets() {
                    let nc = c as isize + dc;
                    let nr = r as isize + dr;
                    if nc < 0 || nr < 0 || nc as usize >= width || nr as usize >= height {
                        continue;
                    }
                    let (nc, nr) = (nc as usize, nr as usize);
                    let idx = nr * width + nc;
                    if labels[idx] == UNLABELED && same_value(band.value(nc, nr), value) {
                        labels[idx] = label;
                        queue.push_back((nc, nr));
                    }
                }
            }

            cells.sort_unstable_by_key(|&(c, r)| (r, c));
            regions.push(Region { value, cells });
        }
    }

    (labels, regions)
}

/// Cell sides that separate the region from anything else, directed so the
/// region lies on the right.
fn boundary_edges(
    width: usize,
    height: usize,
    labels: &[usize],
    label: usize,
    cells: &[(usize, usize)],
) -> Vec<Edge> {
    let in_region = |c: i64, r: i64| {
        c >= 0
            && r >= 0
            && (c as usize) < width
            && (r as usize) < height
            && labels[r as usize * width + c as usize] == label
    };

    let mut edges = Vec::new();
    for &(col, row) in cells {
        let (c, r) = (col as i64, row as i64);
        if !in_region(c, r - 1) {
            edges.push(Edge { from: (c, r), to: (c + 1, r), step: Step::East });
        }
        if !in_region(c + 1, r) {
            edges.push(Edge { from: (c + 1, r), to: (c + 1, r + 1), step: Step::South });
        }
        if !in_region(c, r + 1) {
            edges.push(Edge { from: (c + 1, r + 1), to: (c, r + 1), step: Step::West });
        }
        if !in_region(c - 1, r) {
            edges.push(Edge { from: (c, r + 1), to: (c, r), step: Step::North });
        }
    }
    edges
}

/// Chain boundary edges into closed rings of corner vertices.
///
/// A vertex with two outgoing edges is a pinch where two region cells touch
/// diagonally. With 8-connectivity the walk turns left there and crosses over
/// to the other cell; with 4-connectivity it turns right and stays.
fn trace_rings(edges: &[Edge], connectivity: Connectivity) -> Vec<Vec<Vertex>> {
    let mut outgoing: HashMap<Vertex, Vec<usize>> = HashMap::new();
    for (i, edge) in edges.iter().enumerate() {
        outgoing.entry(edge.from).or_default().push(i);
    }

    let next_edge = |edge: &Edge| -> Option<usize> {
        let candidates = outgoing.get(&edge.to)?;
        match candidates.as_slice() {
            [only] => Some(*only),
            _ => {
                let wanted = match connectivity {
                    Connectivity::Eight => edge.step.turn_left(),
                    Connectivity::Four => edge.step.turn_right(),
                };
                candidates
                    .iter()
                    .copied()
                    .find(|&i| edges[i].step == wanted)
                    .or_else(|| candidates.first().copied())
            }
        }
    };

    let mut visited = vec![false; edges.len()];
    let mut rings = Vec::new();

    for start in 0..edges.len() {
        if visited[start] {
            continue;
        }

        let mut ring = Vec::new();
        let mut current = start;
        loop {
            visited[current] = true;
            let edge = &edges[current];
            let Some(next) = next_edge(edge) else {
                break;
            };
            if edges[next].step != edge.step {
                ring.push(edge.to);
            }
            if next == start || visited[next] {
                break;
            }
            current = next;
        }

        // the walk closes on the start edge's origin; put it first
        ring.rotate_right(1);
        if ring.len() >= 3 {
            rings.push(ring);
        }
    }

    rings
}

fn doubled_area(ring: &[Vertex]) -> i64 {
    let n = ring.len();
    (0..n)
        .map(|i| {
            let (x0, y0) = ring[i];
            let (x1, y1) = ring[(i + 1) % n];
            x0 * y1 - x1 * y0
        })
        .sum()
}

fn build_polygon(rings: Vec<Vec<Vertex>>, transform: &GeoTransform) -> Polygon<f64> {
    let exterior_idx = rings
        .iter()
        .enumerate()
        .max_by_key(|(_, ring)| doubled_area(ring))
        .map(|(i, _)| i);

    let to_line = |ring: &[Vertex]| -> LineString<f64> {
        ring.iter()
            .map(|&(x, y)| {
                let (gx, gy) = transform.apply(x as f64, y as f64);
                Coord { x: gx, y: gy }
            })
            .collect::<Vec<_>>()
            .into()
    };

    let Some(exterior_idx) = exterior_idx else {
        return Polygon::new(LineString::new(Vec::new()), Vec::new());
    };

    let exterior = to_line(&rings[exterior_idx]);
    let interiors = rings
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != exterior_idx)
        .map(|(_, ring)| to_line(ring))
        .collect();

    Polygon::new(exterior, interiors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Area, Contains};
    use geo_types::Point;

    fn band(width: usize, height: usize, values: &[f64]) -> RasterBand {
        RasterBand::new(width, height, values.to_vec()).unwrap()
    }

    fn pseudo_random_grid(width: usize, height: usize, classes: u64, seed: u64) -> Vec<f64> {
        let mut state = seed;
        (0..width * height)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                ((state >> 33) % classes) as f64
            })
            .collect()
    }

    #[test]
    fn uniform_block_is_one_square() {
        let set = polygonize(&band(2, 2, &[5.0; 4]), Connectivity::Eight);
        assert_eq!(set.len(), 1);

        let feature = &set.features[0];
        assert_eq!(feature.val, 5.0);
        assert!(feature.polygon.interiors().is_empty());

        let coords: Vec<(f64, f64)> = feature.polygon.exterior().coords().map(|c| (c.x, c.y)).collect();
        assert_eq!(coords.len(), 5);
        assert_eq!(coords.first(), coords.last());
        assert_eq!(&coords[..4], &[(0.0, 0.0), (2.0, 0.0), (2.0, 2.0), (0.0, 2.0)]);
    }

    #[test]
    fn single_cell_region_is_closed_unit_square() {
        let set = polygonize(&band(3, 1, &[1.0, 2.0, 1.0]), Connectivity::Eight);
        assert_eq!(set.len(), 3);

        let middle = &set.features[1];
        assert_eq!(middle.val, 2.0);
        assert!(middle.polygon.exterior().is_closed());
        assert_eq!(middle.polygon.exterior().0.len(), 5);
        assert!((middle.polygon.unsigned_area() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn diagonal_cells_join_only_with_eight_connectivity() {
        let grid = band(2, 2, &[1.0, 2.0, 2.0, 1.0]);

        let eight = polygonize(&grid, Connectivity::Eight);
        assert_eq!(eight.len(), 2);
        assert_eq!(eight.values().collect::<Vec<_>>(), vec![1.0, 2.0]);

        let four = polygonize(&grid, Connectivity::Four);
        assert_eq!(four.len(), 4);
    }

    #[test]
    fn pinched_region_keeps_a_single_exterior() {
        let grid = band(2, 2, &[1.0, 2.0, 2.0, 1.0]);
        let set = polygonize(&grid, Connectivity::Eight);
        let first = &set.features[0];
        // two unit squares joined at the pinch vertex
        assert_eq!(first.polygon.exterior().0.len(), 9);
        assert!(first.polygon.interiors().is_empty());
        assert!((first.polygon.unsigned_area() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn enclosed_region_becomes_a_hole() {
        #[rustfmt::skip]
        let grid = band(3, 3, &[
            1.0, 1.0, 1.0,
            1.0, 7.0, 1.0,
            1.0, 1.0, 1.0,
        ]);
        let set = polygonize(&grid, Connectivity::Eight);
        assert_eq!(set.len(), 2);

        let outer = &set.features[0];
        assert_eq!(outer.val, 1.0);
        assert_eq!(outer.polygon.interiors().len(), 1);
        assert!((outer.polygon.unsigned_area() - 8.0).abs() < 1e-12);

        let inner = &set.features[1];
        assert_eq!(inner.val, 7.0);
        assert!(inner.polygon.interiors().is_empty());
    }

    #[test]
    fn diagonal_gap_is_not_a_hole_with_four_connectivity() {
        // ring of 1s whose corner cells are missing: the 1s are only
        // 8-connected around the centre, so with 4-connectivity they split
        #[rustfmt::skip]
        let grid = band(3, 3, &[
            0.0, 1.0, 0.0,
            1.0, 0.0, 1.0,
            0.0, 1.0, 0.0,
        ]);
        let four = polygonize(&grid, Connectivity::Four);
        assert_eq!(four.len(), 9);

        let eight = polygonize(&grid, Connectivity::Eight);
        // corners + centre of 0s, and the diamond of 1s
        assert_eq!(eight.len(), 2);
        let diamond = eight.features.iter().find(|f| f.val == 1.0).unwrap();
        assert!((diamond.polygon.unsigned_area() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn regions_partition_the_grid() {
        let (width, height) = (13, 9);
        for seed in [1_u64, 7, 42] {
            let values = pseudo_random_grid(width, height, 3, seed);
            let grid = band(width, height, &values);

            for connectivity in [Connectivity::Four, Connectivity::Eight] {
                let set = polygonize(&grid, connectivity);

                let total: f64 = set.features.iter().map(|f| f.polygon.unsigned_area()).sum();
                assert!((total - (width * height) as f64).abs() < 1e-9);

                for row in 0..height {
                    for col in 0..width {
                        let centre = Point::new(col as f64 + 0.5, row as f64 + 0.5);
                        let owners: Vec<&Feature> = set
                            .features
                            .iter()
                            .filter(|f| f.polygon.contains(&centre))
                            .collect();
                        assert_eq!(owners.len(), 1, "cell ({}, {}) seed {}", col, row, seed);
                        assert_eq!(owners[0].val, values[row * width + col]);
                    }
                }
            }
        }
    }

    #[test]
    fn regions_follow_scan_order() {
        let grid = band(3, 2, &[3.0, 3.0, 1.0, 2.0, 3.0, 1.0]);
        let set = polygonize(&grid, Connectivity::Four);
        assert_eq!(set.values().collect::<Vec<_>>(), vec![3.0, 1.0, 2.0]);
    }

    #[test]
    fn geotransform_is_applied_to_vertices() {
        let transform = GeoTransform {
            origin_x: 100.0,
            origin_y: 200.0,
            pixel_width: 10.0,
            pixel_height: -10.0,
        };
        let grid = RasterBand::with_geotransform(1, 1, vec![4.0], transform).unwrap();
        let set = polygonize(&grid, Connectivity::Eight);
        let coords: Vec<(f64, f64)> = set.features[0]
            .polygon
            .exterior()
            .coords()
            .map(|c| (c.x, c.y))
            .collect();
        assert_eq!(
            &coords[..4],
            &[(100.0, 200.0), (110.0, 200.0), (110.0, 190.0), (100.0, 190.0)]
        );
    }

    #[test]
    fn empty_band_gives_empty_set() {
        let set = polygonize(&band(0, 0, &[]), Connectivity::Eight);
        assert!(set.is_empty());
    }

    #[test]
    fn connectivity_parses_from_number() {
        assert_eq!(Connectivity::try_from(8).unwrap(), Connectivity::Eight);
        assert_eq!(Connectivity::try_from(4).unwrap(), Connectivity::Four);
        assert!(Connectivity::try_from(6).is_err());
        assert_eq!(Connectivity::default(), Connectivity::Eight);
    }
}
