#![allow(dead_code)]

use ndarray::prelude::*;
use seatrace::{
    dataset::{
        fields::{FaceComponents, FaceQuantity, FaceVectorField, ScalarField},
        OceanDataset,
    },
    geometry::{Dim3::Z, Vec3},
    grid::{builders, fgr, CurvilinearGrid},
    index::LocatorConfig,
    topology::{layouts, Edge, FaceShape, GridTopology, TopologyBuilder},
};

/// Single-layer channel of unit Cartesian cells, one cell wide.
pub fn channel_topology(nx: usize, periodic: bool, land: Option<Array3<bool>>) -> GridTopology {
    let mut builder = TopologyBuilder::new(vec![FaceShape::new(nx, 1)], 1);
    if periodic {
        builder = builder.link(0, Edge::East, 0, Edge::West);
    }
    if let Some(land) = land {
        builder = builder.land_mask(vec![land]);
    }
    builder.remaining_as_boundary().build().unwrap()
}

/// Channel dataset with the given eastward velocity snapshots on the `nx + 1`
/// x-faces, and no vertical velocity.
pub fn channel(
    topology: GridTopology,
    u_snapshots: Vec<Vec<fgr>>,
    times: Option<Vec<fgr>>,
) -> OceanDataset<fgr> {
    let nx = topology.face_shape(0).nx;
    let x: Vec<fgr> = (0..=nx).map(|i| i as fgr).collect();
    let grid = builders::cartesian(&x, &[0.0, 1.0], vec![0.0, 1.0], &topology).unwrap();
    let mut dataset = OceanDataset::new(topology, grid, times, LocatorConfig::default()).unwrap();
    let snapshots = u_snapshots
        .into_iter()
        .map(|u| FaceComponents {
            u: vec![Array3::from_shape_vec((1, 1, nx + 1), u).unwrap()],
            v: vec![Array3::zeros((1, 2, nx))],
            w: None,
        })
        .collect();
    let field = FaceVectorField::new("velocity", FaceQuantity::Velocity, snapshots, dataset.topology())
        .unwrap();
    dataset.add_vector_field(field).unwrap();
    dataset.set_velocity("velocity").unwrap();
    dataset
}

/// Embedded corner `(i, j)` of a face, with `i` and `j` up to and including `n`.
pub fn corner(grid: &CurvilinearGrid, n: usize, face: usize, i: usize, j: usize) -> Vec3<fgr> {
    let (ci, cj) = (i.min(n - 1), j.min(n - 1));
    grid.cell_map(face, ci, cj).forward((i - ci) as fgr, (j - cj) as fgr)
}

/// Single-layer unit cubed sphere with a non-divergent transport field
/// rotating eastward about the polar axis at one radian per unit time,
/// derived from the streamfunction `-z`, and a scalar field holding the
/// `z`-coordinate of each cell center.
pub fn rotating_cubed_sphere(n: usize) -> OceanDataset<fgr> {
    let topology = layouts::cubed_sphere(n, 1).unwrap();
    let grid = builders::cubed_sphere(n, 1.0, vec![0.0, 1.0], &topology).unwrap();

    let streamfunction = |face: usize, i: usize, j: usize| -corner(&grid, n, face, i, j)[Z];
    let mut u = Vec::new();
    let mut v = Vec::new();
    let mut z = Vec::new();
    for face in 0..6 {
        u.push(Array3::from_shape_fn((1, n, n + 1), |(_, j, i)| {
            streamfunction(face, i, j) - streamfunction(face, i, j + 1)
        }));
        v.push(Array3::from_shape_fn((1, n + 1, n), |(_, j, i)| {
            streamfunction(face, i + 1, j) - streamfunction(face, i, j)
        }));
        let centers = grid.embedded_centers(face);
        z.push(Array3::from_shape_fn((1, n, n), |(_, j, i)| {
            centers[[j, i]][Z] / centers[[j, i]].length()
        }));
    }

    let mut dataset = OceanDataset::new(topology, grid, None, LocatorConfig::default()).unwrap();
    let field = FaceVectorField::new(
        "transport",
        FaceQuantity::Transport,
        vec![FaceComponents { u, v, w: None }],
        dataset.topology(),
    )
    .unwrap();
    dataset.add_vector_field(field).unwrap();
    dataset.set_velocity("transport").unwrap();
    let z = ScalarField::steady("z", z, dataset.topology()).unwrap();
    dataset.add_scalar_field(z).unwrap();
    dataset
}

/// Single column of one unit Cartesian cell per layer, closed on all sides,
/// with the given upward velocity on every layer interface.
pub fn water_column(depth_interfaces: Vec<fgr>, w: fgr) -> OceanDataset<fgr> {
    let nz = depth_interfaces.len() - 1;
    let topology = layouts::closed_box(1, 1, nz).unwrap();
    let grid = builders::cartesian(&[0.0, 1.0], &[0.0, 1.0], depth_interfaces, &topology).unwrap();
    let mut dataset = OceanDataset::new(topology, grid, None, LocatorConfig::default()).unwrap();
    let field = FaceVectorField::new(
        "velocity",
        FaceQuantity::Velocity,
        vec![FaceComponents {
            u: vec![Array3::zeros((nz, 1, 2))],
            v: vec![Array3::zeros((nz, 2, 1))],
            w: Some(vec![Array3::from_elem((nz + 1, 1, 1), w)]),
        }],
        dataset.topology(),
    )
    .unwrap();
    dataset.add_vector_field(field).unwrap();
    dataset.set_velocity("velocity").unwrap();
    dataset
}

/// Zonally periodic band of four 90 degree wide cells between 30S and 30N
/// on the unit sphere, with an eastward transport moving particles one cell
/// width per unit time.
pub fn zonal_band() -> OceanDataset<fgr> {
    let topology = layouts::zonally_periodic(4, 2, 1).unwrap();
    let grid = builders::regular_lon_lat(
        &[-180.0, -90.0, 0.0, 90.0, 180.0],
        &[-30.0, 0.0, 30.0],
        1.0,
        vec![0.0, 1.0],
        &topology,
    )
    .unwrap();
    let areas = grid.metrics(0).areas.clone();
    let mut dataset = OceanDataset::new(topology, grid, None, LocatorConfig::default()).unwrap();
    let field = FaceVectorField::new(
        "transport",
        FaceQuantity::Transport,
        vec![FaceComponents {
            u: vec![Array3::from_shape_fn((1, 2, 5), |(_, j, _)| areas[[j, 0]])],
            v: vec![Array3::zeros((1, 3, 4))],
            w: None,
        }],
        dataset.topology(),
    )
    .unwrap();
    dataset.add_vector_field(field).unwrap();
    dataset.set_velocity("transport").unwrap();
    dataset
}
