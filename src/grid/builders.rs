//! Constructors for grids with analytically defined corners.

use super::{fgr, CoordinateSystem, CurvilinearGrid};
use crate::{
    error::DatasetError,
    geometry::{self, Vec3},
    topology::{layouts::CUBED_SPHERE_FACES, GridTopology},
};
use ndarray::prelude::*;
use std::f64::consts::FRAC_PI_4;

/// Creates a single-face grid with rectilinear Cartesian cells.
///
/// `x_edges` and `y_edges` hold the `nx + 1` and `ny + 1` cell boundary coordinates.
pub fn cartesian(
    x_edges: &[fgr],
    y_edges: &[fgr],
    depth_interfaces: Vec<fgr>,
    topology: &GridTopology,
) -> Result<CurvilinearGrid, DatasetError> {
    let (x, y) = tensor_corners(x_edges, y_edges);
    CurvilinearGrid::new(
        CoordinateSystem::Cartesian,
        vec![x],
        vec![y],
        depth_interfaces,
        topology,
    )
}

/// Creates a single-face grid with cells bounded by meridians and parallels.
///
/// `lon_edges` and `lat_edges` hold the `nx + 1` and `ny + 1` cell boundary coordinates in degrees.
pub fn regular_lon_lat(
    lon_edges: &[fgr],
    lat_edges: &[fgr],
    radius: fgr,
    depth_interfaces: Vec<fgr>,
    topology: &GridTopology,
) -> Result<CurvilinearGrid, DatasetError> {
    let (lon, lat) = tensor_corners(lon_edges, lat_edges);
    CurvilinearGrid::new(
        CoordinateSystem::Spherical { radius },
        vec![lon],
        vec![lat],
        depth_interfaces,
        topology,
    )
}

/// Creates an equiangular cubed-sphere grid with `n` x `n` cells per face,
/// matching the face layout of `topology::layouts::cubed_sphere`.
pub fn cubed_sphere(
    n: usize,
    radius: fgr,
    depth_interfaces: Vec<fgr>,
    topology: &GridTopology,
) -> Result<CurvilinearGrid, DatasetError> {
    let (lon, lat): (Vec<_>, Vec<_>) = (0..CUBED_SPHERE_FACES)
        .map(|face| cubed_sphere_face_corners(face, n))
        .unzip();
    CurvilinearGrid::new(
        CoordinateSystem::Spherical { radius },
        lon,
        lat,
        depth_interfaces,
        topology,
    )
}

fn tensor_corners(x_edges: &[fgr], y_edges: &[fgr]) -> (Array2<fgr>, Array2<fgr>) {
    let shape = (y_edges.len(), x_edges.len());
    (
        Array2::from_shape_fn(shape, |(_, i)| x_edges[i]),
        Array2::from_shape_fn(shape, |(j, _)| y_edges[j]),
    )
}

/// Center direction and the directions of increasing `i` and `j` for each cube face.
fn cube_face_frame(face: usize) -> [Vec3<fgr>; 3] {
    let x = Vec3::new(1.0, 0.0, 0.0);
    let y = Vec3::new(0.0, 1.0, 0.0);
    let z = Vec3::new(0.0, 0.0, 1.0);
    match face {
        0 => [x, y, z],
        1 => [y, -x, z],
        2 => [z, -x, -y],
        3 => [-x, -z, -y],
        4 => [-y, -z, x],
        5 => [-z, y, x],
        _ => panic!("A cube has only six faces"),
    }
}

fn cubed_sphere_face_corners(face: usize, n: usize) -> (Array2<fgr>, Array2<fgr>) {
    let [center, along_i, along_j] = cube_face_frame(face);
    let angle = |idx: usize| -FRAC_PI_4 + 2.0 * FRAC_PI_4 * idx as fgr / n as fgr;
    let points = Array2::from_shape_fn((n + 1, n + 1), |(j, i)| {
        geometry::lon_lat_from_vector(
            &(center + along_i * angle(i).tan() + along_j * angle(j).tan()),
        )
    });
    (points.mapv(|(lon, _)| lon), points.mapv(|(_, lat)| lat))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{layouts, CellStep, Edge, FaceCell};
    use approx::assert_abs_diff_eq;

    #[test]
    fn cube_face_frames_are_right_handed() {
        for face in 0..CUBED_SPHERE_FACES {
            let [center, along_i, along_j] = cube_face_frame(face);
            let normal = along_i.cross(&along_j);
            assert_abs_diff_eq!(normal.dot(&center), 1.0);
        }
    }

    #[test]
    fn cubed_sphere_neighbors_share_edge_corners() {
        let n = 3;
        let topology = layouts::cubed_sphere(n, 1).unwrap();
        let grid = cubed_sphere(n, 1.0, vec![0.0, 1.0], &topology).unwrap();
        // Centers of adjacent cells across a seam are about one cell width apart
        let cell_angle = 2.0 * FRAC_PI_4 / n as fgr;
        for face in 0..CUBED_SPHERE_FACES {
            for edge in Edge::all() {
                let cell = match edge {
                    Edge::South => FaceCell::new(face, 1, 0),
                    Edge::North => FaceCell::new(face, 1, n - 1),
                    Edge::West => FaceCell::new(face, 0, 1),
                    Edge::East => FaceCell::new(face, n - 1, 1),
                };
                if let CellStep::Cell(neighbor, _) = topology.step(cell, edge) {
                    let a = grid.embedded_centers(cell.face)[[cell.j, cell.i]];
                    let b = grid.embedded_centers(neighbor.face)[[neighbor.j, neighbor.i]];
                    let separation = geometry::central_angle(&a, &b);
                    assert!(separation < 1.2 * cell_angle, "{} {}", face, edge);
                }
            }
        }
    }
}
