//! Curvilinear grids made up of the faces of a topology.

pub mod builders;

use crate::{
    error::DatasetError,
    geometry::{
        self,
        Dim3::{X, Y, Z},
        Vec3,
    },
    topology::GridTopology,
};
use ndarray::prelude::*;

/// Floating-point precision to use for grid coordinates.
#[allow(non_camel_case_types)]
pub type fgr = f64;

/// How horizontal coordinates are interpreted.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CoordinateSystem {
    /// Longitude and latitude in degrees on a sphere with the given radius.
    Spherical { radius: fgr },
    /// Plane coordinates `(x, y)`, given in the longitude and latitude slots.
    Cartesian,
}

impl CoordinateSystem {
    /// Mean radius of the Earth [m].
    pub const EARTH_RADIUS: fgr = 6_371_000.0;

    /// Embeds a horizontal coordinate pair into 3D space.
    pub fn embed(&self, lon: fgr, lat: fgr) -> Vec3<fgr> {
        match self {
            Self::Spherical { .. } => geometry::unit_vector_from_lon_lat(lon, lat),
            Self::Cartesian => Vec3::new(lon, lat, 1.0),
        }
    }

    /// Converts an embedded point back into a horizontal coordinate pair.
    pub fn unembed(&self, point: &Vec3<fgr>) -> (fgr, fgr) {
        match self {
            Self::Spherical { .. } => geometry::lon_lat_from_vector(point),
            Self::Cartesian => (point[X] / point[Z], point[Y] / point[Z]),
        }
    }

    /// Physical distance between two embedded points.
    pub fn distance(&self, a: &Vec3<fgr>, b: &Vec3<fgr>) -> fgr {
        match self {
            Self::Spherical { radius } => radius * geometry::central_angle(a, b),
            Self::Cartesian => (*a - *b).length(),
        }
    }

    /// Physical area of the quadrilateral with the given embedded corners, in
    /// counterclockwise or clockwise order.
    pub fn quad_area(&self, corners: [&Vec3<fgr>; 4]) -> fgr {
        match self {
            Self::Spherical { radius } => {
                radius
                    * radius
                    * (spherical_triangle_area(corners[0], corners[1], corners[2])
                        + spherical_triangle_area(corners[0], corners[2], corners[3]))
            }
            Self::Cartesian => {
                let mut twice_area = 0.0;
                for idx in 0..4 {
                    let (a, b) = (corners[idx], corners[(idx + 1) % 4]);
                    twice_area += a[X] * b[Y] - b[X] * a[Y];
                }
                0.5 * twice_area.abs()
            }
        }
    }

    fn is_spherical(&self) -> bool {
        matches!(self, Self::Spherical { .. })
    }
}

/// Area of a spherical triangle on the unit sphere (its solid angle).
fn spherical_triangle_area(a: &Vec3<fgr>, b: &Vec3<fgr>, c: &Vec3<fgr>) -> fgr {
    let numerator = a.dot(&b.cross(c)).abs();
    let denominator = 1.0 + a.dot(b) + b.dot(c) + c.dot(a);
    2.0 * numerator.atan2(denominator)
}

/// Lengths and areas of the cells of one face.
#[derive(Clone, Debug)]
pub struct FaceMetrics {
    /// Length of the west face of each cell, shape `(ny, nx + 1)`.
    pub west_lengths: Array2<fgr>,
    /// Length of the south face of each cell, shape `(ny + 1, nx)`.
    pub south_lengths: Array2<fgr>,
    /// Horizontal area of each cell, shape `(ny, nx)`.
    pub areas: Array2<fgr>,
}

/// Bilinear map from the fractional coordinates of a cell to embedded space.
///
/// Spherical points are obtained by normalizing the bilinear combination of
/// the corner unit vectors, so points on a shared cell edge depend only on the
/// two corners of that edge.
#[derive(Clone, Copy, Debug)]
pub struct CellMap {
    origin: Vec3<fgr>,
    along_x: Vec3<fgr>,
    along_y: Vec3<fgr>,
    twist: Vec3<fgr>,
    spherical: bool,
}

impl CellMap {
    /// Creates the map for a cell with the given lower-left, lower-right,
    /// upper-left and upper-right corners.
    pub fn new(
        c00: &Vec3<fgr>,
        c10: &Vec3<fgr>,
        c01: &Vec3<fgr>,
        c11: &Vec3<fgr>,
        spherical: bool,
    ) -> Self {
        Self {
            origin: *c00,
            along_x: *c10 - *c00,
            along_y: *c01 - *c00,
            twist: *c11 - *c10 - *c01 + *c00,
            spherical,
        }
    }

    fn bilinear(&self, fx: fgr, fy: fgr) -> Vec3<fgr> {
        self.origin + self.along_x * fx + self.along_y * fy + self.twist * (fx * fy)
    }

    /// Maps fractional coordinates to an embedded point.
    pub fn forward(&self, fx: fgr, fy: fgr) -> Vec3<fgr> {
        let point = self.bilinear(fx, fy);
        if self.spherical {
            point.normalized()
        } else {
            point
        }
    }

    /// Derivatives of the (unnormalized) map with respect to the fractional coordinates.
    pub fn tangents(&self, fx: fgr, fy: fgr) -> (Vec3<fgr>, Vec3<fgr>) {
        (
            self.along_x + self.twist * fy,
            self.along_y + self.twist * fx,
        )
    }

    /// Finds the fractional coordinates of the given embedded point by Newton
    /// iteration, treating the point as a ray through the origin so that the
    /// spherical normalization does not have to be differentiated.
    ///
    /// The result may lie outside the unit square if the point is outside the cell.
    /// Returns `None` if the iteration does not converge.
    pub fn inverse(&self, point: &Vec3<fgr>, tolerance: fgr, max_iterations: usize) -> Option<[fgr; 2]> {
        let (mut fx, mut fy) = (0.5, 0.5);
        let mut scale = self.bilinear(fx, fy).dot(point) / point.squared_length();

        for _ in 0..max_iterations {
            let residual = self.bilinear(fx, fy) - *point * scale;
            let (dx, dy) = self.tangents(fx, fy);
            let delta = geometry::solve_3x3([dx, dy, -*point], -residual)?;
            fx += delta[X];
            fy += delta[Y];
            scale += delta[Z];
            if !(fx.is_finite() && fy.is_finite()) {
                return None;
            }
            if delta[X].abs() < tolerance && delta[Y].abs() < tolerance {
                return if scale > 0.0 { Some([fx, fy]) } else { None };
            }
        }
        None
    }
}

/// Geometry of all faces of a grid: cell corners, vertical layers and metrics.
#[derive(Clone, Debug)]
pub struct CurvilinearGrid {
    system: CoordinateSystem,
    corners: Vec<Array2<Vec3<fgr>>>,
    centers: Vec<Array2<Vec3<fgr>>>,
    depth_interfaces: Vec<fgr>,
    metrics: Vec<FaceMetrics>,
}

impl CurvilinearGrid {
    /// Creates a new grid from cell corner coordinates.
    ///
    /// # Parameters
    ///
    /// - `system`: How the corner coordinates are to be interpreted.
    /// - `lon_corners`: Longitude (or x) of the cell corners of each face, shape `(ny + 1, nx + 1)`.
    /// - `lat_corners`: Latitude (or y) of the cell corners of each face, shape `(ny + 1, nx + 1)`.
    /// - `depth_interfaces`: Depths of the `nz + 1` layer interfaces, starting with 0 at the surface.
    /// - `topology`: Topology the grid has to be consistent with.
    ///
    /// # Returns
    ///
    /// A `Result` which is either:
    ///
    /// - `Ok`: Contains the new grid, with metrics derived from the corners.
    /// - `Err`: Contains a `DatasetError` describing an inconsistency.
    pub fn new(
        system: CoordinateSystem,
        lon_corners: Vec<Array2<fgr>>,
        lat_corners: Vec<Array2<fgr>>,
        depth_interfaces: Vec<fgr>,
        topology: &GridTopology,
    ) -> Result<Self, DatasetError> {
        if lon_corners.len() != topology.number_of_faces()
            || lat_corners.len() != topology.number_of_faces()
        {
            return Err(DatasetError::Topology(
                crate::error::TopologyError::FaceCount {
                    expected: topology.number_of_faces(),
                    found: lon_corners.len().min(lat_corners.len()),
                },
            ));
        }
        if depth_interfaces.len() != topology.nz() + 1
            || depth_interfaces[0] != 0.0
            || depth_interfaces.windows(2).any(|pair| pair[1] <= pair[0])
        {
            return Err(DatasetError::InvalidDepths);
        }

        let mut corners = Vec::with_capacity(lon_corners.len());
        for (face, (lon, lat)) in lon_corners.iter().zip(lat_corners.iter()).enumerate() {
            let shape = topology.face_shape(face);
            let expected = vec![shape.ny + 1, shape.nx + 1];
            for coords in [lon, lat] {
                if coords.shape() != expected.as_slice() {
                    return Err(DatasetError::CoordinateShape {
                        face,
                        found: coords.shape().to_vec(),
                        expected,
                    });
                }
            }
            corners.push(Array2::from_shape_fn(lon.dim(), |idx| {
                system.embed(lon[idx], lat[idx])
            }));
        }

        let centers = corners
            .iter()
            .map(|face_corners| {
                let (ny, nx) = (face_corners.nrows() - 1, face_corners.ncols() - 1);
                Array2::from_shape_fn((ny, nx), |(j, i)| {
                    Self::cell_map_from(face_corners, i, j, system.is_spherical()).forward(0.5, 0.5)
                })
            })
            .collect();

        let metrics = corners
            .iter()
            .enumerate()
            .map(|(face, face_corners)| Self::derive_metrics(&system, face, face_corners))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            system,
            corners,
            centers,
            depth_interfaces,
            metrics,
        })
    }

    /// Replaces the derived metrics of the given face with externally supplied ones.
    pub fn with_metrics(mut self, face: usize, metrics: FaceMetrics) -> Result<Self, DatasetError> {
        let (ny, nx) = self.centers[face].dim();
        let checks = [
            (metrics.west_lengths.shape(), vec![ny, nx + 1]),
            (metrics.south_lengths.shape(), vec![ny + 1, nx]),
            (metrics.areas.shape(), vec![ny, nx]),
        ];
        for (found, expected) in checks {
            if found != expected.as_slice() {
                return Err(DatasetError::CoordinateShape {
                    face,
                    found: found.to_vec(),
                    expected,
                });
            }
        }
        self.metrics[face] = metrics;
        Ok(self)
    }

    fn derive_metrics(
        system: &CoordinateSystem,
        face: usize,
        corners: &Array2<Vec3<fgr>>,
    ) -> Result<FaceMetrics, DatasetError> {
        let (ny, nx) = (corners.nrows() - 1, corners.ncols() - 1);
        let west_lengths = Array2::from_shape_fn((ny, nx + 1), |(j, i)| {
            system.distance(&corners[[j, i]], &corners[[j + 1, i]])
        });
        let south_lengths = Array2::from_shape_fn((ny + 1, nx), |(j, i)| {
            system.distance(&corners[[j, i]], &corners[[j, i + 1]])
        });
        let areas = Array2::from_shape_fn((ny, nx), |(j, i)| {
            system.quad_area([
                &corners[[j, i]],
                &corners[[j, i + 1]],
                &corners[[j + 1, i + 1]],
                &corners[[j + 1, i]],
            ])
        });
        if let Some(((j, i), _)) = areas.indexed_iter().find(|&(_, &area)| !(area > 0.0)) {
            return Err(DatasetError::DegenerateCell { face, j, i });
        }
        Ok(FaceMetrics {
            west_lengths,
            south_lengths,
            areas,
        })
    }

    fn cell_map_from(corners: &Array2<Vec3<fgr>>, i: usize, j: usize, spherical: bool) -> CellMap {
        CellMap::new(
            &corners[[j, i]],
            &corners[[j, i + 1]],
            &corners[[j + 1, i]],
            &corners[[j + 1, i + 1]],
            spherical,
        )
    }

    /// Returns the number of faces.
    pub fn number_of_faces(&self) -> usize {
        self.corners.len()
    }

    /// Returns the coordinate system of the grid.
    pub fn system(&self) -> &CoordinateSystem {
        &self.system
    }

    /// Returns the bilinear map of the given cell.
    pub fn cell_map(&self, face: usize, i: usize, j: usize) -> CellMap {
        Self::cell_map_from(&self.corners[face], i, j, self.system.is_spherical())
    }

    /// Returns the embedded cell centers of the given face, shape `(ny, nx)`.
    pub fn embedded_centers(&self, face: usize) -> &Array2<Vec3<fgr>> {
        &self.centers[face]
    }

    /// Returns the metrics of the given face.
    pub fn metrics(&self, face: usize) -> &FaceMetrics {
        &self.metrics[face]
    }

    /// Returns the depths of the layer interfaces, starting at the surface.
    pub fn depth_interfaces(&self) -> &[fgr] {
        &self.depth_interfaces
    }

    /// Returns the thickness of the given layer.
    pub fn layer_thickness(&self, k: usize) -> fgr {
        self.depth_interfaces[k + 1] - self.depth_interfaces[k]
    }

    /// Returns the depth of the bottom of the deepest layer.
    pub fn bottom_depth(&self) -> fgr {
        self.depth_interfaces[self.depth_interfaces.len() - 1]
    }

    /// Computes the horizontal coordinates of the given fractional position in a cell.
    pub fn horizontal_coordinates_of(&self, face: usize, i: usize, j: usize, frac: [fgr; 2]) -> (fgr, fgr) {
        self.system
            .unembed(&self.cell_map(face, i, j).forward(frac[0], frac[1]))
    }

    /// Computes the depth of the given vertical fractional position in a layer.
    ///
    /// The vertical fraction is 0 at the lower and 1 at the upper interface.
    pub fn depth_of(&self, k: usize, fz: fgr) -> fgr {
        let (upper, lower) = (self.depth_interfaces[k], self.depth_interfaces[k + 1]);
        lower + fz * (upper - lower)
    }

    /// Computes longitude, latitude and depth of a grid-relative position.
    pub fn physical_coordinates_of(
        &self,
        face: usize,
        k: usize,
        j: usize,
        i: usize,
        frac: [fgr; 3],
    ) -> (fgr, fgr, fgr) {
        let (lon, lat) = self.horizontal_coordinates_of(face, i, j, [frac[0], frac[1]]);
        (lon, lat, self.depth_of(k, frac[2]))
    }

    /// Computes the angle from local east (or the x-axis for Cartesian grids)
    /// to the direction of increasing `i` at the center of the given cell, in radians.
    pub fn cell_x_angle(&self, face: usize, i: usize, j: usize) -> fgr {
        let map = self.cell_map(face, i, j);
        let (along_x, _) = map.tangents(0.5, 0.5);
        match self.system {
            CoordinateSystem::Cartesian => along_x[Y].atan2(along_x[X]),
            CoordinateSystem::Spherical { .. } => {
                let center = map.forward(0.5, 0.5);
                let (lon, _) = self.system.unembed(&center);
                let lon = lon.to_radians();
                let east = Vec3::new(-lon.sin(), lon.cos(), 0.0);
                let north = center.cross(&east);
                along_x.dot(&north).atan2(along_x.dot(&east))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::layouts;
    use approx::assert_abs_diff_eq;

    #[test]
    fn cell_map_inverse_recovers_fractions_on_sphere() {
        let corners = [(10.0, 20.0), (12.5, 20.5), (9.5, 22.0), (12.0, 23.0)];
        let embedded: Vec<_> = corners
            .iter()
            .map(|&(lon, lat)| geometry::unit_vector_from_lon_lat(lon, lat))
            .collect();
        let map = CellMap::new(&embedded[0], &embedded[1], &embedded[2], &embedded[3], true);
        for &(fx, fy) in &[(0.1, 0.2), (0.5, 0.5), (0.93, 0.07), (1.2, -0.1)] {
            let point = map.forward(fx, fy);
            let found = map.inverse(&point, 1e-13, 30).unwrap();
            assert_abs_diff_eq!(found[0], fx, epsilon = 1e-10);
            assert_abs_diff_eq!(found[1], fy, epsilon = 1e-10);
        }
    }

    #[test]
    fn cartesian_metrics_match_rectangle() {
        let topology = layouts::closed_box(2, 1, 1).unwrap();
        let grid = builders::cartesian(&[0.0, 2.0, 5.0], &[0.0, 4.0], vec![0.0, 10.0], &topology).unwrap();
        let metrics = grid.metrics(0);
        assert_abs_diff_eq!(metrics.areas[[0, 0]], 8.0, epsilon = 1e-12);
        assert_abs_diff_eq!(metrics.areas[[0, 1]], 12.0, epsilon = 1e-12);
        assert_abs_diff_eq!(metrics.west_lengths[[0, 2]], 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(metrics.south_lengths[[1, 1]], 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(grid.cell_x_angle(0, 1, 0), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn spherical_areas_sum_to_sphere() {
        let n = 6;
        let topology = layouts::cubed_sphere(n, 1).unwrap();
        let grid = builders::cubed_sphere(n, 1.0, vec![0.0, 1.0], &topology).unwrap();
        let total: fgr = (0..6).map(|face| grid.metrics(face).areas.sum()).sum();
        assert_abs_diff_eq!(total, 4.0 * std::f64::consts::PI, epsilon = 1e-9);
    }

    #[test]
    fn depth_fraction_runs_upward() {
        let topology = layouts::closed_box(1, 1, 2).unwrap();
        let grid = builders::cartesian(&[0.0, 1.0], &[0.0, 1.0], vec![0.0, 10.0, 30.0], &topology).unwrap();
        assert_abs_diff_eq!(grid.depth_of(1, 0.0), 30.0);
        assert_abs_diff_eq!(grid.depth_of(1, 1.0), 10.0);
        assert_abs_diff_eq!(grid.depth_of(0, 0.25), 7.5);
    }
}
