//! Adjacency tables for commonly used grid layouts.

use super::{Edge, FaceShape, GridTopology, TopologyBuilder};
use crate::error::TopologyError;
use Edge::{East, North, South, West};

/// Number of faces in a lat-lon-cap grid.
pub const LLC_FACES: usize = 13;

/// Number of faces in a cubed-sphere grid.
pub const CUBED_SPHERE_FACES: usize = 6;

/// A single face closed on all sides.
pub fn closed_box(nx: usize, ny: usize, nz: usize) -> Result<GridTopology, TopologyError> {
    TopologyBuilder::new(vec![FaceShape::new(nx, ny)], nz)
        .remaining_as_boundary()
        .build()
}

/// A single face whose west and east edges are glued together,
/// as for a regular longitude-latitude grid spanning the globe zonally.
pub fn zonally_periodic(nx: usize, ny: usize, nz: usize) -> Result<GridTopology, TopologyError> {
    TopologyBuilder::new(vec![FaceShape::new(nx, ny)], nz)
        .link(0, East, 0, West)
        .remaining_as_boundary()
        .build()
}

/// Six `n` x `n` faces forming a cube, in the face ordering used by MITgcm.
pub fn cubed_sphere(n: usize, nz: usize) -> Result<GridTopology, TopologyError> {
    cubed_sphere_builder(n, nz).build()
}

/// Builder for a cubed-sphere topology, so that a land mask can be added.
pub fn cubed_sphere_builder(n: usize, nz: usize) -> TopologyBuilder {
    TopologyBuilder::new(vec![FaceShape::new(n, n); CUBED_SPHERE_FACES], nz)
        .link(0, East, 1, West)
        .link(0, North, 2, West)
        .link(0, West, 4, North)
        .link(0, South, 5, North)
        .link(1, North, 2, South)
        .link(1, East, 3, South)
        .link(1, South, 5, East)
        .link(2, East, 3, West)
        .link(2, North, 4, West)
        .link(3, North, 4, South)
        .link(3, East, 5, South)
        .link(4, East, 5, West)
}

/// Thirteen `n` x `n` faces of a lat-lon-cap grid.
///
/// Faces 0-2 and 3-5 are stacked northward with x pointing east, face 6 is
/// the arctic cap, and faces 7-9 and 10-12 are rotated a quarter turn so that
/// x points south and y points east. The southern edges facing Antarctica are
/// closed.
pub fn llc(n: usize, nz: usize) -> Result<GridTopology, TopologyError> {
    llc_builder(n, nz).build()
}

/// Builder for a lat-lon-cap topology, so that a land mask can be added.
pub fn llc_builder(n: usize, nz: usize) -> TopologyBuilder {
    TopologyBuilder::new(vec![FaceShape::new(n, n); LLC_FACES], nz)
        // Northward stacking of the two unrotated facets
        .link(0, North, 1, South)
        .link(1, North, 2, South)
        .link(2, North, 6, West)
        .link(3, North, 4, South)
        .link(4, North, 5, South)
        .link(5, North, 6, South)
        // Between the unrotated facets
        .link(0, East, 3, West)
        .link(1, East, 4, West)
        .link(2, East, 5, West)
        // Wrapping around to the last rotated facet
        .link(0, West, 12, North)
        .link(1, West, 11, North)
        .link(2, West, 10, North)
        // Into the first rotated facet
        .link(3, East, 9, South)
        .link(4, East, 8, South)
        .link(5, East, 7, South)
        // Arctic cap to the rotated facets
        .link(6, East, 7, West)
        .link(6, North, 10, West)
        // Southward stacking of the rotated facets
        .link(7, East, 8, West)
        .link(8, East, 9, West)
        .link(10, East, 11, West)
        .link(11, East, 12, West)
        // Between the rotated facets
        .link(7, North, 10, South)
        .link(8, North, 11, South)
        .link(9, North, 12, South)
        // Antarctica
        .boundary(0, South)
        .boundary(3, South)
        .boundary(9, East)
        .boundary(12, East)
}
