//! Location of physical coordinates within the grid.

use crate::{
    error::OutOfDomainError,
    geometry::{Dim3, Vec3},
    grid::{fgr, CurvilinearGrid},
    topology::{CellStep, Edge, FaceCell, GridTopology},
};
use std::{collections::HashMap, sync::Arc};

#[cfg(feature = "serialization")]
use serde::Serialize;

/// A location given both physically and relative to the grid.
///
/// The fractional coordinates lie in `[0, 1]` and run along `i`, `j` and
/// upward in the layer, respectively.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub struct Position {
    pub lon: fgr,
    pub lat: fgr,
    pub depth: fgr,
    pub time: fgr,
    pub face: usize,
    pub i: usize,
    pub j: usize,
    pub k: usize,
    pub frac: [fgr; 3],
}

impl Position {
    /// Creates a position from grid-relative coordinates, computing the
    /// physical coordinates with the forward map of the grid.
    pub fn from_grid(
        grid: &CurvilinearGrid,
        face: usize,
        i: usize,
        j: usize,
        k: usize,
        frac: [fgr; 3],
        time: fgr,
    ) -> Self {
        let (lon, lat, depth) = grid.physical_coordinates_of(face, k, j, i, frac);
        Self {
            lon,
            lat,
            depth,
            time,
            face,
            i,
            j,
            k,
            frac,
        }
    }

    /// Returns the horizontal column containing the position.
    pub fn column(&self) -> FaceCell {
        FaceCell::new(self.face, self.i, self.j)
    }
}

/// Configuration parameters for coordinate location.
#[derive(Clone, Debug)]
pub struct LocatorConfig {
    /// Convergence tolerance for the fractional coordinates in the Newton iteration.
    pub newton_tolerance: fgr,
    /// Maximum number of Newton iterations per candidate cell.
    pub max_newton_iterations: usize,
    /// Maximum number of cells to walk through before giving up.
    pub max_walk_steps: usize,
    /// Approximate number of cell centers per spatial bin.
    pub cells_per_bin: usize,
    /// Distance outside the unit square still accepted as inside a cell.
    pub edge_tolerance: fgr,
}

impl LocatorConfig {
    pub const DEFAULT_NEWTON_TOLERANCE: fgr = 1e-12;
    pub const DEFAULT_MAX_NEWTON_ITERATIONS: usize = 30;
    pub const DEFAULT_MAX_WALK_STEPS: usize = 64;
    pub const DEFAULT_CELLS_PER_BIN: usize = 4;
    pub const DEFAULT_EDGE_TOLERANCE: fgr = 1e-9;

    /// Panics if any of the configuration parameter values are invalid.
    pub fn validate(&self) {
        assert!(
            self.newton_tolerance > 0.0,
            "Newton tolerance must be larger than zero."
        );
        assert!(
            self.max_newton_iterations > 0,
            "Maximum number of Newton iterations must be larger than zero."
        );
        assert!(
            self.cells_per_bin > 0,
            "Number of cells per bin must be larger than zero."
        );
        assert!(
            self.edge_tolerance >= 0.0,
            "Edge tolerance must be non-negative."
        );
    }
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            newton_tolerance: Self::DEFAULT_NEWTON_TOLERANCE,
            max_newton_iterations: Self::DEFAULT_MAX_NEWTON_ITERATIONS,
            max_walk_steps: Self::DEFAULT_MAX_WALK_STEPS,
            cells_per_bin: Self::DEFAULT_CELLS_PER_BIN,
            edge_tolerance: Self::DEFAULT_EDGE_TOLERANCE,
        }
    }
}

/// Uniform bins of embedded cell centers for finding a nearby starting cell.
#[derive(Clone, Debug)]
struct CenterBins {
    lower: [fgr; 3],
    widths: [fgr; 3],
    counts: [usize; 3],
    bins: HashMap<[usize; 3], Vec<(FaceCell, Vec3<fgr>)>>,
}

impl CenterBins {
    fn new(grid: &CurvilinearGrid, n_faces: usize, cells_per_bin: usize) -> Self {
        let centers: Vec<(FaceCell, Vec3<fgr>)> = (0..n_faces)
            .flat_map(|face| {
                grid.embedded_centers(face)
                    .indexed_iter()
                    .map(move |((j, i), center)| (FaceCell::new(face, i, j), *center))
                    .collect::<Vec<_>>()
            })
            .collect();

        let mut lower = [fgr::INFINITY; 3];
        let mut upper = [fgr::NEG_INFINITY; 3];
        for (_, center) in &centers {
            for dim in Dim3::slice() {
                lower[dim as usize] = lower[dim as usize].min(center[dim]);
                upper[dim as usize] = upper[dim as usize].max(center[dim]);
            }
        }

        let n_per_axis = ((centers.len() as fgr / cells_per_bin as fgr).sqrt().round() as usize).max(1);
        let mut widths = [1.0; 3];
        let mut counts = [1; 3];
        for axis in 0..3 {
            let extent = upper[axis] - lower[axis];
            if extent > 0.0 {
                counts[axis] = n_per_axis;
                widths[axis] = extent / n_per_axis as fgr;
            }
        }

        let mut bins = Self {
            lower,
            widths,
            counts,
            bins: HashMap::new(),
        };
        for (cell, center) in centers {
            let key = bins.key_of(&center);
            bins.bins.entry(key).or_default().push((cell, center));
        }
        bins
    }

    fn key_of(&self, point: &Vec3<fgr>) -> [usize; 3] {
        let mut key = [0; 3];
        for dim in Dim3::slice() {
            let axis = dim as usize;
            let offset = ((point[dim] - self.lower[axis]) / self.widths[axis]).floor();
            key[axis] = (offset.max(0.0) as usize).min(self.counts[axis] - 1);
        }
        key
    }

    /// Finds the cell whose center is closest to the given embedded point,
    /// by searching shells of bins of increasing size around the point.
    fn nearest(&self, point: &Vec3<fgr>) -> Option<FaceCell> {
        let key = self.key_of(point);
        let max_radius = *self.counts.iter().max()?;
        let min_width = self
            .widths
            .iter()
            .zip(self.counts.iter())
            .filter(|(_, &count)| count > 1)
            .map(|(&width, _)| width)
            .fold(fgr::INFINITY, fgr::min);

        let mut best: Option<(FaceCell, fgr)> = None;
        for radius in 0..=max_radius {
            if let Some((_, distance)) = best {
                if (radius as fgr - 1.0) * min_width > distance {
                    break;
                }
            }
            for candidate_key in shell(key, radius, self.counts) {
                if let Some(members) = self.bins.get(&candidate_key) {
                    for (cell, center) in members {
                        let distance = (*center - *point).length();
                        if best.map_or(true, |(_, best_distance)| distance < best_distance) {
                            best = Some((*cell, distance));
                        }
                    }
                }
            }
        }
        best.map(|(cell, _)| cell)
    }
}

/// Keys of the bins at exactly the given Chebyshev distance from the center key.
fn shell(center: [usize; 3], radius: usize, counts: [usize; 3]) -> Vec<[usize; 3]> {
    let r = radius as i64;
    let range = |axis: usize| {
        let c = center[axis] as i64;
        (c - r).max(0)..=(c + r).min(counts[axis] as i64 - 1)
    };
    let mut keys = Vec::new();
    for x in range(0) {
        for y in range(1) {
            for z in range(2) {
                let distance = (x - center[0] as i64)
                    .abs()
                    .max((y - center[1] as i64).abs())
                    .max((z - center[2] as i64).abs());
                if distance == r {
                    keys.push([x as usize, y as usize, z as usize]);
                }
            }
        }
    }
    keys
}

/// Strictly increasing time axis of time-varying data.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub struct TimeAxis {
    times: Vec<fgr>,
}

impl TimeAxis {
    /// Creates a new time axis, or returns `None` if the times are not strictly increasing.
    pub fn new(times: Vec<fgr>) -> Option<Self> {
        if times.is_empty() || times.windows(2).any(|pair| pair[1] <= pair[0]) {
            None
        } else {
            Some(Self { times })
        }
    }

    pub fn times(&self) -> &[fgr] {
        &self.times
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Finds the snapshot interval containing the given time.
    ///
    /// # Returns
    ///
    /// The index of the lower snapshot and the fractional position of the time
    /// between it and the next, or an `OutOfDomainError` if the time lies
    /// outside the axis.
    pub fn locate(&self, time: fgr) -> Result<(usize, fgr), OutOfDomainError> {
        let (start, end) = (self.times[0], self.times[self.times.len() - 1]);
        if !(time >= start && time <= end) {
            return Err(OutOfDomainError::Temporal { time, start, end });
        }
        if self.times.len() == 1 {
            return Ok((0, 0.0));
        }
        let upper = self.times.partition_point(|&t| t <= time);
        let lower = upper.saturating_sub(1).min(self.times.len() - 2);
        let (t0, t1) = (self.times[lower], self.times[lower + 1]);
        Ok((lower, ((time - t0) / (t1 - t0)).max(0.0).min(1.0)))
    }

    /// Returns the first node strictly after (or, going backward, strictly
    /// before) the given time, if any.
    pub fn next_node(&self, time: fgr, forward: bool) -> Option<fgr> {
        if forward {
            self.times.iter().copied().find(|&t| t > time)
        } else {
            self.times.iter().rev().copied().find(|&t| t < time)
        }
    }
}

/// Maps physical coordinates to grid-relative positions.
#[derive(Clone, Debug)]
pub struct CoordinateIndex {
    topology: Arc<GridTopology>,
    grid: Arc<CurvilinearGrid>,
    bins: CenterBins,
    config: LocatorConfig,
}

impl CoordinateIndex {
    /// Creates a new index for the given grid.
    pub fn new(topology: Arc<GridTopology>, grid: Arc<CurvilinearGrid>, config: LocatorConfig) -> Self {
        config.validate();
        let bins = CenterBins::new(&grid, topology.number_of_faces(), config.cells_per_bin);
        Self {
            topology,
            grid,
            bins,
            config,
        }
    }

    pub fn topology(&self) -> &GridTopology {
        &self.topology
    }

    pub fn grid(&self) -> &CurvilinearGrid {
        &self.grid
    }

    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    /// Finds the position corresponding to the given physical coordinates.
    ///
    /// # Parameters
    ///
    /// - `lon`: Longitude in degrees (or x for Cartesian grids).
    /// - `lat`: Latitude in degrees (or y for Cartesian grids).
    /// - `depth`: Depth below the surface.
    /// - `time`: Time of the position. Only stored, time axes are handled by the dataset.
    ///
    /// # Returns
    ///
    /// A `Result` which is either:
    ///
    /// - `Ok`: Contains the located position.
    /// - `Err`: Contains an `OutOfDomainError` describing why the coordinates could not be located.
    pub fn locate(
        &self,
        lon: fgr,
        lat: fgr,
        depth: fgr,
        time: fgr,
    ) -> Result<Position, OutOfDomainError> {
        let (cell, frac_xy) = self.locate_horizontal(lon, lat)?;
        let (k, frac_z) = self.locate_vertical(depth)?;
        Ok(Position {
            lon,
            lat,
            depth,
            time,
            face: cell.face,
            i: cell.i,
            j: cell.j,
            k,
            frac: [frac_xy[0], frac_xy[1], frac_z],
        })
    }

    /// Finds the layer containing the given depth, along with the vertical
    /// fractional coordinate (0 at the lower interface, 1 at the upper).
    pub fn locate_vertical(&self, depth: fgr) -> Result<(usize, fgr), OutOfDomainError> {
        let interfaces = self.grid.depth_interfaces();
        let bottom = self.grid.bottom_depth();
        if !(depth >= 0.0 && depth <= bottom) {
            return Err(OutOfDomainError::Vertical {
                depth,
                top: 0.0,
                bottom,
            });
        }
        let n_layers = interfaces.len() - 1;
        let k = interfaces
            .partition_point(|&interface| interface <= depth)
            .saturating_sub(1)
            .min(n_layers - 1);
        let frac = (interfaces[k + 1] - depth) / self.grid.layer_thickness(k);
        Ok((k, frac.max(0.0).min(1.0)))
    }

    /// Finds the column containing the given horizontal coordinates, along
    /// with the horizontal fractional coordinates within it.
    pub fn locate_horizontal(&self, lon: fgr, lat: fgr) -> Result<(FaceCell, [fgr; 2]), OutOfDomainError> {
        let point = self.grid.system().embed(lon, lat);
        let mut cell = self
            .bins
            .nearest(&point)
            .ok_or(OutOfDomainError::Horizontal { lon, lat })?;

        for _ in 0..=self.config.max_walk_steps {
            let frac = self
                .grid
                .cell_map(cell.face, cell.i, cell.j)
                .inverse(
                    &point,
                    self.config.newton_tolerance,
                    self.config.max_newton_iterations,
                )
                .ok_or(OutOfDomainError::Horizontal { lon, lat })?;

            match self.largest_overflow(frac) {
                None => {
                    let frac = [frac[0].max(0.0).min(1.0), frac[1].max(0.0).min(1.0)];
                    return Ok(self.canonical_cell(cell, frac));
                }
                Some(edge) => match self.topology.step(cell, edge) {
                    CellStep::Boundary => return Err(OutOfDomainError::Horizontal { lon, lat }),
                    CellStep::Cell(next, _) => cell = next,
                },
            }
        }
        Err(OutOfDomainError::WalkBudgetExceeded {
            lon,
            lat,
            steps: self.config.max_walk_steps,
        })
    }

    /// Returns the edge through which the fractional coordinates overflow the
    /// most, or `None` if they lie inside the unit square.
    fn largest_overflow(&self, frac: [fgr; 2]) -> Option<Edge> {
        let mut largest: Option<(Edge, fgr)> = None;
        for dim in Dim3::slice_xy() {
            let value = frac[dim as usize];
            let (overflow, upper) = if value < 0.0 {
                (-value, false)
            } else {
                (value - 1.0, true)
            };
            if overflow > self.config.edge_tolerance
                && largest.map_or(true, |(_, largest_overflow)| overflow > largest_overflow)
            {
                largest = Some((Edge::from_exit(dim, upper), overflow));
            }
        }
        largest.map(|(edge, _)| edge)
    }

    /// Moves a position lying on a face seam to the lowest face id among all
    /// cells sharing the point, checking x-edges before y-edges.
    ///
    /// Cells are explored through every edge the point lies on, so corners
    /// where several faces meet resolve to the same cell from any of them.
    fn canonical_cell(&self, cell: FaceCell, frac: [fgr; 2]) -> (FaceCell, [fgr; 2]) {
        let mut best = (cell, frac);
        let mut visited = vec![cell];
        let mut pending = vec![(cell, frac)];
        while let Some((current, current_frac)) = pending.pop() {
            for edge in Edge::all() {
                if !self.lies_on_edge(current_frac, edge) {
                    continue;
                }
                if let Some((neighbor, neighbor_frac, _)) =
                    self.topology.cross_edge(current, edge, current_frac)
                {
                    if visited.contains(&neighbor) {
                        continue;
                    }
                    visited.push(neighbor);
                    if neighbor.face < best.0.face {
                        best = (neighbor, neighbor_frac);
                    }
                    pending.push((neighbor, neighbor_frac));
                }
            }
        }
        best
    }

    fn lies_on_edge(&self, frac: [fgr; 2], edge: Edge) -> bool {
        let value = frac[edge.normal_dim() as usize];
        if edge.is_upper() {
            value >= 1.0 - self.config.edge_tolerance
        } else {
            value <= self.config.edge_tolerance
        }
    }

    /// Computes the physical coordinates of a grid-relative location.
    pub fn physical_coordinates_of(
        &self,
        face: usize,
        k: usize,
        j: usize,
        i: usize,
        frac: [fgr; 3],
    ) -> (fgr, fgr, fgr) {
        self.grid.physical_coordinates_of(face, k, j, i, frac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{grid::builders, topology::layouts};
    use approx::assert_abs_diff_eq;

    fn cubed_sphere_index(n: usize) -> CoordinateIndex {
        let topology = Arc::new(layouts::cubed_sphere(n, 2).unwrap());
        let grid = Arc::new(builders::cubed_sphere(n, 1.0, vec![0.0, 10.0, 50.0], &topology).unwrap());
        CoordinateIndex::new(topology, grid, LocatorConfig::default())
    }

    #[test]
    fn locate_round_trips_on_every_cube_face() {
        let index = cubed_sphere_index(5);
        for face in 0..6 {
            for &(i, j, frac) in &[(0, 0, [0.3, 0.6, 0.2]), (2, 3, [0.5, 0.5, 0.9]), (4, 4, [0.81, 0.17, 0.5])] {
                let (lon, lat, depth) = index.physical_coordinates_of(face, 1, j, i, frac);
                let position = index.locate(lon, lat, depth, 0.0).unwrap();
                assert_eq!((position.face, position.i, position.j, position.k), (face, i, j, 1));
                for dim in 0..3 {
                    assert_abs_diff_eq!(position.frac[dim], frac[dim], epsilon = 1e-8);
                }
            }
        }
    }

    #[test]
    fn locating_outside_closed_box_fails() {
        let topology = Arc::new(layouts::closed_box(4, 3, 1).unwrap());
        let grid = Arc::new(
            builders::cartesian(&[0.0, 1.0, 2.0, 3.0, 4.0], &[0.0, 1.0, 2.0, 3.0], vec![0.0, 5.0], &topology)
                .unwrap(),
        );
        let index = CoordinateIndex::new(topology, grid, LocatorConfig::default());
        assert!(matches!(
            index.locate(4.5, 1.0, 1.0, 0.0),
            Err(OutOfDomainError::Horizontal { .. })
        ));
        assert!(matches!(
            index.locate(1.5, 1.5, 6.0, 0.0),
            Err(OutOfDomainError::Vertical { .. })
        ));
        let position = index.locate(2.25, 0.5, 5.0, 0.0).unwrap();
        assert_eq!((position.i, position.j, position.k), (2, 0, 0));
        assert_abs_diff_eq!(position.frac[0], 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(position.frac[2], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn cube_corner_resolves_to_lowest_face_from_any_side() {
        let n = 3;
        let index = cubed_sphere_index(n);
        // Faces 1, 2 and 3 meet at this corner
        let expected = (FaceCell::new(1, n - 1, n - 1), [1.0, 1.0]);
        for start in [
            (FaceCell::new(3, 0, 0), [0.0, 0.0]),
            (FaceCell::new(2, n - 1, 0), [1.0, 0.0]),
            expected,
        ] {
            let (cell, frac) = index.canonical_cell(start.0, start.1);
            assert_eq!(cell, expected.0);
            assert_abs_diff_eq!(frac[0], 1.0, epsilon = 1e-12);
            assert_abs_diff_eq!(frac[1], 1.0, epsilon = 1e-12);
        }

        let corner = Vec3::new(-1.0, 1.0, 1.0);
        let (lon, lat) = crate::geometry::lon_lat_from_vector(&corner);
        let position = index.locate(lon, lat, 5.0, 0.0).unwrap();
        assert_eq!(position.column(), expected.0);
    }

    #[test]
    fn time_axis_locates_intervals() {
        let axis = TimeAxis::new(vec![0.0, 10.0, 30.0]).unwrap();
        assert_eq!(axis.locate(5.0).unwrap(), (0, 0.5));
        assert_eq!(axis.locate(30.0).unwrap(), (1, 1.0));
        assert_eq!(axis.locate(10.0).unwrap(), (1, 0.0));
        assert!(axis.locate(-1.0).is_err());
        assert_eq!(axis.next_node(10.0, true), Some(30.0));
        assert_eq!(axis.next_node(10.0, false), Some(0.0));
        assert!(TimeAxis::new(vec![1.0, 1.0]).is_none());
    }
}
