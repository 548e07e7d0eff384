//! Connectivity of the rectangular faces making up a grid.
//!
//! A grid consists of one or more faces, each a rectangular block of
//! `nx` x `ny` columns with `nz` vertical levels. How the faces are stitched
//! together is described by an adjacency table holding, for every edge of
//! every face, either the edge of the face on the other side of it or a
//! closed domain boundary. Regular periodic grids, cubed spheres and
//! lat-lon-cap grids are all expressed through the same table.

pub mod layouts;

use crate::{
    error::TopologyError,
    geometry::Dim3::{self, X, Y},
};
use ndarray::prelude::*;
use std::fmt;

/// One of the four edges of a face.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Edge {
    /// The edge at `j = 0`.
    South = 0,
    /// The edge at `j = ny`.
    North = 1,
    /// The edge at `i = 0`.
    West = 2,
    /// The edge at `i = nx`.
    East = 3,
}

impl Edge {
    /// Creates an array for iterating over all edges, in tie-breaking priority order.
    pub fn all() -> [Self; 4] {
        [Self::West, Self::East, Self::South, Self::North]
    }

    /// Returns the edge crossed when leaving a cell along the given horizontal
    /// dimension, through the upper or lower face.
    pub fn from_exit(dim: Dim3, upper: bool) -> Self {
        match (dim, upper) {
            (X, false) => Self::West,
            (X, true) => Self::East,
            (Y, false) => Self::South,
            (Y, true) => Self::North,
            _ => panic!("Vertical exits do not cross face edges"),
        }
    }

    /// Returns the index dimension normal to the edge.
    pub fn normal_dim(self) -> Dim3 {
        match self {
            Self::West | Self::East => X,
            Self::South | Self::North => Y,
        }
    }

    /// Whether the edge lies at the upper end of its normal dimension.
    pub fn is_upper(self) -> bool {
        matches!(self, Self::North | Self::East)
    }

    /// Unit index offset pointing out of the face through this edge.
    pub fn outward(self) -> [i64; 2] {
        match self {
            Self::South => [0, -1],
            Self::North => [0, 1],
            Self::West => [-1, 0],
            Self::East => [1, 0],
        }
    }

    /// Unit index offset running along the edge from its first corner.
    fn tangent(self) -> [i64; 2] {
        match self {
            Self::South | Self::North => [1, 0],
            Self::West | Self::East => [0, 1],
        }
    }

    /// First corner of the edge, in doubled index coordinates.
    fn first_corner(self, shape: &FaceShape) -> [i64; 2] {
        match self {
            Self::South | Self::West => [0, 0],
            Self::North => [0, 2 * shape.ny as i64],
            Self::East => [2 * shape.nx as i64, 0],
        }
    }

    /// Number of cells along the edge.
    fn length(self, shape: &FaceShape) -> usize {
        match self {
            Self::South | Self::North => shape.nx,
            Self::West | Self::East => shape.ny,
        }
    }

    fn from_outward(direction: [i64; 2]) -> Self {
        match direction {
            [0, -1] => Self::South,
            [0, 1] => Self::North,
            [-1, 0] => Self::West,
            [1, 0] => Self::East,
            _ => panic!("Invalid unit direction {:?}", direction),
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::South => "south",
                Self::North => "north",
                Self::West => "west",
                Self::East => "east",
            }
        )
    }
}

/// A rotation of the horizontal index frame by a multiple of a quarter turn.
///
/// Maps index offsets (and vector components) expressed in the frame of one
/// face into the frame of a neighboring face.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Orientation {
    matrix: [[i64; 2]; 2],
}

impl Orientation {
    /// The orientation leaving index frames unchanged.
    pub const IDENTITY: Self = Self {
        matrix: [[1, 0], [0, 1]],
    };

    /// Creates an array of the four rotations, starting with the identity and
    /// proceeding counterclockwise.
    pub fn rotations() -> [Self; 4] {
        [
            Self::IDENTITY,
            Self {
                matrix: [[0, -1], [1, 0]],
            },
            Self {
                matrix: [[-1, 0], [0, -1]],
            },
            Self {
                matrix: [[0, 1], [-1, 0]],
            },
        ]
    }

    /// Finds the rotation carrying a particle leaving through `exit` into the
    /// interior of a face it enters through `entry`.
    pub fn for_crossing(exit: Edge, entry: Edge) -> Self {
        let out = exit.outward();
        let inward = entry.outward().map(|component| -component);
        Self::rotations()
            .into_iter()
            .find(|rotation| rotation.apply(out) == inward)
            .expect("Some quarter-turn rotation always maps one unit axis onto another")
    }

    /// Applies the orientation to an integer index offset.
    pub fn apply(&self, offset: [i64; 2]) -> [i64; 2] {
        let m = &self.matrix;
        [
            m[0][0] * offset[0] + m[0][1] * offset[1],
            m[1][0] * offset[0] + m[1][1] * offset[1],
        ]
    }

    /// Applies the orientation to a pair of horizontal vector components.
    pub fn apply_to_components(&self, components: [f64; 2]) -> [f64; 2] {
        let m = &self.matrix;
        [
            m[0][0] as f64 * components[0] + m[0][1] as f64 * components[1],
            m[1][0] as f64 * components[0] + m[1][1] as f64 * components[1],
        ]
    }

    /// Returns the orientation obtained by first applying `first` and then `self`.
    pub fn after(&self, first: &Self) -> Self {
        let (a, b) = (&self.matrix, &first.matrix);
        let mut matrix = [[0; 2]; 2];
        for (row, matrix_row) in matrix.iter_mut().enumerate() {
            for (col, entry) in matrix_row.iter_mut().enumerate() {
                *entry = a[row][0] * b[0][col] + a[row][1] * b[1][col];
            }
        }
        Self { matrix }
    }

    /// Returns the inverse orientation.
    pub fn inverse(&self) -> Self {
        let m = &self.matrix;
        Self {
            matrix: [[m[0][0], m[1][0]], [m[0][1], m[1][1]]],
        }
    }

    /// Whether the orientation leaves index frames unchanged.
    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Returns the frame dimension that the given dimension of the source frame
    /// is mapped onto, and whether its sense is reversed.
    pub fn map_dim(&self, dim: Dim3) -> (Dim3, bool) {
        match dim {
            X | Y => {
                let unit = if dim == X { [1, 0] } else { [0, 1] };
                let mapped = self.apply(unit);
                if mapped[0] != 0 {
                    (X, mapped[0] < 0)
                } else {
                    (Y, mapped[1] < 0)
                }
            }
            Dim3::Z => (Dim3::Z, false),
        }
    }
}

/// Horizontal shape of a face.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaceShape {
    pub nx: usize,
    pub ny: usize,
}

impl FaceShape {
    pub fn new(nx: usize, ny: usize) -> Self {
        Self { nx, ny }
    }

    /// Number of columns in the face.
    pub fn size(&self) -> usize {
        self.nx * self.ny
    }
}

/// Entry of the adjacency table for a single face edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeNeighbor {
    /// The edge is glued to the given edge of the given face.
    Face { face: usize, edge: Edge },
    /// The edge is a closed boundary of the domain.
    Boundary,
}

/// Result of looking up the neighbor of a face edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NeighborEdge {
    Linked {
        face: usize,
        edge: Edge,
        orientation: Orientation,
    },
    Boundary,
}

/// A horizontal grid column, identified by face and cell indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FaceCell {
    pub face: usize,
    pub i: usize,
    pub j: usize,
}

impl FaceCell {
    pub fn new(face: usize, i: usize, j: usize) -> Self {
        Self { face, i, j }
    }
}

/// Result of stepping one cell across an edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellStep {
    /// The neighboring cell, along with the orientation mapping the frame of
    /// the original cell into the frame of the new one.
    Cell(FaceCell, Orientation),
    /// The edge is a closed domain boundary.
    Boundary,
}

/// Precomputed affine map of doubled index coordinates across a linked edge.
#[derive(Clone, Copy, Debug)]
struct Seam {
    face: usize,
    edge: Edge,
    orientation: Orientation,
    origin: [i64; 2],
    image: [i64; 2],
}

impl Seam {
    fn map_doubled(&self, point: [i64; 2]) -> [i64; 2] {
        let mapped = self
            .orientation
            .apply([point[0] - self.origin[0], point[1] - self.origin[1]]);
        [mapped[0] + self.image[0], mapped[1] + self.image[1]]
    }

    fn map_continuous(&self, point: [f64; 2]) -> [f64; 2] {
        let relative = [
            2.0 * point[0] - self.origin[0] as f64,
            2.0 * point[1] - self.origin[1] as f64,
        ];
        let mapped = self.orientation.apply_to_components(relative);
        [
            0.5 * (mapped[0] + self.image[0] as f64),
            0.5 * (mapped[1] + self.image[1] as f64),
        ]
    }
}

#[derive(Clone, Copy, Debug)]
enum SeamEntry {
    Linked(Seam),
    Boundary,
}

/// Describes how the faces of a grid are connected, and which cells are land.
///
/// Immutable after construction. The adjacency table is validated to be total
/// and symmetric when the topology is built.
#[derive(Clone, Debug)]
pub struct GridTopology {
    shapes: Vec<FaceShape>,
    nz: usize,
    seams: Vec<[SeamEntry; 4]>,
    land: Vec<Array3<bool>>,
}

impl GridTopology {
    /// Creates a new topology from an explicit adjacency table.
    ///
    /// # Parameters
    ///
    /// - `shapes`: Horizontal shape of each face.
    /// - `nz`: Number of vertical levels (shared by all faces).
    /// - `table`: For each face, the neighbor of its south, north, west and east edge,
    ///   in that order. `None` entries mark edges without a registered neighbor.
    /// - `land`: Optional land mask for each face, indexed as `[k, j, i]`.
    ///
    /// # Returns
    ///
    /// A `Result` which is either:
    ///
    /// - `Ok`: Contains the new topology.
    /// - `Err`: Contains a `TopologyError` describing why the table is malformed.
    pub fn from_table(
        shapes: Vec<FaceShape>,
        nz: usize,
        table: Vec<[Option<EdgeNeighbor>; 4]>,
        land: Option<Vec<Array3<bool>>>,
    ) -> Result<Self, TopologyError> {
        if table.len() != shapes.len() {
            return Err(TopologyError::FaceCount {
                expected: shapes.len(),
                found: table.len(),
            });
        }
        for (face, shape) in shapes.iter().enumerate() {
            if shape.nx == 0 || shape.ny == 0 || nz == 0 {
                return Err(TopologyError::EmptyFace {
                    face,
                    shape: (shape.nx, shape.ny),
                });
            }
        }

        let mut seams = Vec::with_capacity(shapes.len());
        for (face, entries) in table.iter().enumerate() {
            let mut face_seams = [SeamEntry::Boundary; 4];
            for edge in Edge::all() {
                face_seams[edge as usize] =
                    Self::validated_seam(&shapes, &table, face, edge, entries[edge as usize])?;
            }
            seams.push(face_seams);
        }

        let land = match land {
            Some(land) => {
                if land.len() != shapes.len() {
                    return Err(TopologyError::FaceCount {
                        expected: shapes.len(),
                        found: land.len(),
                    });
                }
                for (face, (mask, shape)) in land.iter().zip(shapes.iter()).enumerate() {
                    let expected = vec![nz, shape.ny, shape.nx];
                    if mask.shape() != expected.as_slice() {
                        return Err(TopologyError::MaskShape {
                            face,
                            found: mask.shape().to_vec(),
                            expected,
                        });
                    }
                }
                land
            }
            None => shapes
                .iter()
                .map(|shape| Array3::from_elem((nz, shape.ny, shape.nx), false))
                .collect(),
        };

        Ok(Self {
            shapes,
            nz,
            seams,
            land,
        })
    }

    fn validated_seam(
        shapes: &[FaceShape],
        table: &[[Option<EdgeNeighbor>; 4]],
        face: usize,
        edge: Edge,
        entry: Option<EdgeNeighbor>,
    ) -> Result<SeamEntry, TopologyError> {
        match entry {
            None => Err(TopologyError::MissingNeighbor { face, edge }),
            Some(EdgeNeighbor::Boundary) => Ok(SeamEntry::Boundary),
            Some(EdgeNeighbor::Face {
                face: neighbor_face,
                edge: neighbor_edge,
            }) => {
                if neighbor_face >= shapes.len() {
                    return Err(TopologyError::UnknownFace {
                        face,
                        edge,
                        neighbor_face,
                    });
                }
                let reciprocal = table[neighbor_face][neighbor_edge as usize];
                if reciprocal != Some(EdgeNeighbor::Face { face, edge }) {
                    return Err(TopologyError::Asymmetric {
                        face,
                        edge,
                        neighbor_face,
                        neighbor_edge,
                    });
                }
                let (shape, neighbor_shape) = (&shapes[face], &shapes[neighbor_face]);
                let (length, neighbor_length) =
                    (edge.length(shape), neighbor_edge.length(neighbor_shape));
                if length != neighbor_length {
                    return Err(TopologyError::LengthMismatch {
                        face,
                        edge,
                        length,
                        neighbor_length,
                    });
                }

                let orientation = Orientation::for_crossing(edge, neighbor_edge);
                let mapped_tangent = orientation.apply(edge.tangent());
                let image = if mapped_tangent == neighbor_edge.tangent() {
                    neighbor_edge.first_corner(neighbor_shape)
                } else {
                    let first = neighbor_edge.first_corner(neighbor_shape);
                    let tangent = neighbor_edge.tangent();
                    let doubled_length = 2 * neighbor_length as i64;
                    [
                        first[0] + doubled_length * tangent[0],
                        first[1] + doubled_length * tangent[1],
                    ]
                };
                Ok(SeamEntry::Linked(Seam {
                    face: neighbor_face,
                    edge: neighbor_edge,
                    orientation,
                    origin: edge.first_corner(shape),
                    image,
                }))
            }
        }
    }

    /// Returns the number of faces.
    pub fn number_of_faces(&self) -> usize {
        self.shapes.len()
    }

    /// Returns the horizontal shape of the given face.
    pub fn face_shape(&self, face: usize) -> &FaceShape {
        &self.shapes[face]
    }

    /// Returns the horizontal shapes of all faces.
    pub fn face_shapes(&self) -> &[FaceShape] {
        &self.shapes
    }

    /// Returns the number of vertical levels.
    pub fn nz(&self) -> usize {
        self.nz
    }

    /// Total number of horizontal columns over all faces.
    pub fn number_of_columns(&self) -> usize {
        self.shapes.iter().map(FaceShape::size).sum()
    }

    /// Looks up what lies on the other side of the given face edge.
    pub fn locate_neighbor(&self, face: usize, edge: Edge) -> NeighborEdge {
        match self.seams[face][edge as usize] {
            SeamEntry::Linked(seam) => NeighborEdge::Linked {
                face: seam.face,
                edge: seam.edge,
                orientation: seam.orientation,
            },
            SeamEntry::Boundary => NeighborEdge::Boundary,
        }
    }

    /// Whether the given cell is land.
    pub fn is_land(&self, face: usize, k: usize, j: usize, i: usize) -> bool {
        self.land[face][[k, j, i]]
    }

    /// Returns the land mask of the given face, indexed as `[k, j, i]`.
    pub fn land_mask(&self, face: usize) -> &Array3<bool> {
        &self.land[face]
    }

    /// Whether the given column index lies on the given edge of its face.
    fn lies_on_edge(&self, cell: &FaceCell, edge: Edge) -> bool {
        let shape = &self.shapes[cell.face];
        match edge {
            Edge::South => cell.j == 0,
            Edge::North => cell.j + 1 == shape.ny,
            Edge::West => cell.i == 0,
            Edge::East => cell.i + 1 == shape.nx,
        }
    }

    /// Moves one cell from the given column through the given edge of that column.
    pub fn step(&self, cell: FaceCell, edge: Edge) -> CellStep {
        if !self.lies_on_edge(&cell, edge) {
            let [di, dj] = edge.outward();
            return CellStep::Cell(
                FaceCell::new(
                    cell.face,
                    (cell.i as i64 + di) as usize,
                    (cell.j as i64 + dj) as usize,
                ),
                Orientation::IDENTITY,
            );
        }
        match self.seams[cell.face][edge as usize] {
            SeamEntry::Boundary => CellStep::Boundary,
            SeamEntry::Linked(seam) => {
                let [di, dj] = edge.outward();
                let ghost_center = [
                    2 * (cell.i as i64 + di) + 1,
                    2 * (cell.j as i64 + dj) + 1,
                ];
                let [x, y] = seam.map_doubled(ghost_center);
                debug_assert!(x > 0 && y > 0 && x % 2 == 1 && y % 2 == 1);
                CellStep::Cell(
                    FaceCell::new(seam.face, ((x - 1) / 2) as usize, ((y - 1) / 2) as usize),
                    seam.orientation,
                )
            }
        }
    }

    /// Maps a horizontal fractional position on the given edge of a column
    /// into the frame of the column on the other side.
    ///
    /// # Returns
    ///
    /// `None` if the edge is a domain boundary, otherwise the new column, the
    /// fractional position within it and the orientation between the frames.
    pub fn cross_edge(
        &self,
        cell: FaceCell,
        edge: Edge,
        frac: [f64; 2],
    ) -> Option<(FaceCell, [f64; 2], Orientation)> {
        let (new_cell, orientation) = match self.step(cell, edge) {
            CellStep::Boundary => return None,
            CellStep::Cell(new_cell, orientation) => (new_cell, orientation),
        };
        let new_frac = if self.lies_on_edge(&cell, edge) {
            let seam = match self.seams[cell.face][edge as usize] {
                SeamEntry::Linked(seam) => seam,
                SeamEntry::Boundary => unreachable!("Boundary handled by step"),
            };
            let mapped =
                seam.map_continuous([cell.i as f64 + frac[0], cell.j as f64 + frac[1]]);
            [
                mapped[0] - new_cell.i as f64,
                mapped[1] - new_cell.j as f64,
            ]
        } else {
            let [di, dj] = edge.outward();
            [frac[0] - di as f64, frac[1] - dj as f64]
        };
        Some((
            new_cell,
            [new_frac[0].max(0.0).min(1.0), new_frac[1].max(0.0).min(1.0)],
            orientation,
        ))
    }

    /// Finds the column at the given index offset from a start column, where
    /// the offset is expressed in the frame of the start column.
    ///
    /// Offsets are walked one cell at a time, first along x and then along y.
    /// If that path is blocked by a boundary, the opposite order is tried, so
    /// corners where several faces meet resolve deterministically.
    ///
    /// # Returns
    ///
    /// `None` if the offset leads outside the domain, otherwise the column and
    /// the orientation mapping the start frame into the frame of that column.
    pub fn offset_cell(
        &self,
        start: FaceCell,
        di: i64,
        dj: i64,
    ) -> Option<(FaceCell, Orientation)> {
        self.walk(start, [(0, di), (1, dj)])
            .or_else(|| self.walk(start, [(1, dj), (0, di)]))
    }

    fn walk(&self, start: FaceCell, legs: [(usize, i64); 2]) -> Option<(FaceCell, Orientation)> {
        let mut cell = start;
        let mut orientation = Orientation::IDENTITY;
        for (axis, count) in legs {
            let mut direction = [0; 2];
            direction[axis] = count.signum();
            for _ in 0..count.abs() {
                let edge = Edge::from_outward(orientation.apply(direction));
                match self.step(cell, edge) {
                    CellStep::Boundary => return None,
                    CellStep::Cell(next_cell, step_orientation) => {
                        cell = next_cell;
                        orientation = step_orientation.after(&orientation);
                    }
                }
            }
        }
        Some((cell, orientation))
    }
}

/// Incrementally builds a symmetric adjacency table.
#[derive(Clone, Debug)]
pub struct TopologyBuilder {
    shapes: Vec<FaceShape>,
    nz: usize,
    table: Vec<[Option<EdgeNeighbor>; 4]>,
    land: Option<Vec<Array3<bool>>>,
}

impl TopologyBuilder {
    /// Starts a new table for faces of the given shapes, with all edges unregistered.
    pub fn new(shapes: Vec<FaceShape>, nz: usize) -> Self {
        let table = vec![[None; 4]; shapes.len()];
        Self {
            shapes,
            nz,
            table,
            land: None,
        }
    }

    /// Glues two face edges together, registering the link in both directions.
    pub fn link(mut self, face_a: usize, edge_a: Edge, face_b: usize, edge_b: Edge) -> Self {
        self.table[face_a][edge_a as usize] = Some(EdgeNeighbor::Face {
            face: face_b,
            edge: edge_b,
        });
        self.table[face_b][edge_b as usize] = Some(EdgeNeighbor::Face {
            face: face_a,
            edge: edge_a,
        });
        self
    }

    /// Marks a face edge as a closed domain boundary.
    pub fn boundary(mut self, face: usize, edge: Edge) -> Self {
        self.table[face][edge as usize] = Some(EdgeNeighbor::Boundary);
        self
    }

    /// Marks every edge that has not been registered yet as a closed boundary.
    pub fn remaining_as_boundary(mut self) -> Self {
        for entries in self.table.iter_mut() {
            for entry in entries.iter_mut().filter(|entry| entry.is_none()) {
                *entry = Some(EdgeNeighbor::Boundary);
            }
        }
        self
    }

    /// Sets the land mask of each face, indexed as `[k, j, i]`.
    pub fn land_mask(mut self, land: Vec<Array3<bool>>) -> Self {
        self.land = Some(land);
        self
    }

    /// Validates the table and creates the topology.
    pub fn build(self) -> Result<GridTopology, TopologyError> {
        GridTopology::from_table(self.shapes, self.nz, self.table, self.land)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotations_compose_and_invert() {
        let [identity, quarter, half, three_quarters] = Orientation::rotations();
        assert_eq!(quarter.after(&quarter), half);
        assert_eq!(quarter.after(&three_quarters), identity);
        assert_eq!(quarter.inverse(), three_quarters);
        assert_eq!(quarter.apply([1, 0]), [0, 1]);
        assert!(half.after(&half).is_identity());
        assert_eq!(quarter.map_dim(X), (Y, false));
        assert_eq!(quarter.map_dim(Y), (X, true));
    }

    #[test]
    fn crossing_orientation_points_into_neighbor() {
        for exit in Edge::all() {
            for entry in Edge::all() {
                let orientation = Orientation::for_crossing(exit, entry);
                let inward = entry.outward().map(|c| -c);
                assert_eq!(orientation.apply(exit.outward()), inward);
            }
        }
    }

    #[test]
    fn missing_neighbor_is_rejected() {
        let result = TopologyBuilder::new(vec![FaceShape::new(3, 2)], 1)
            .boundary(0, Edge::South)
            .boundary(0, Edge::North)
            .boundary(0, Edge::West)
            .build();
        assert_eq!(
            result.unwrap_err(),
            TopologyError::MissingNeighbor {
                face: 0,
                edge: Edge::East
            }
        );
    }

    #[test]
    fn asymmetric_table_is_rejected() {
        let shapes = vec![FaceShape::new(2, 2), FaceShape::new(2, 2)];
        let mut table = vec![[Some(EdgeNeighbor::Boundary); 4]; 2];
        table[0][Edge::East as usize] = Some(EdgeNeighbor::Face {
            face: 1,
            edge: Edge::West,
        });
        let result = GridTopology::from_table(shapes, 1, table, None);
        assert!(matches!(result, Err(TopologyError::Asymmetric { .. })));
    }

    #[test]
    fn mismatched_edge_lengths_are_rejected() {
        let result = TopologyBuilder::new(vec![FaceShape::new(2, 3), FaceShape::new(2, 4)], 1)
            .link(0, Edge::East, 1, Edge::West)
            .remaining_as_boundary()
            .build();
        assert!(matches!(result, Err(TopologyError::LengthMismatch { .. })));
    }

    #[test]
    fn periodic_step_wraps_around() {
        let topology = layouts::zonally_periodic(4, 3, 1).unwrap();
        assert_eq!(
            topology.step(FaceCell::new(0, 3, 1), Edge::East),
            CellStep::Cell(FaceCell::new(0, 0, 1), Orientation::IDENTITY)
        );
        assert_eq!(
            topology.step(FaceCell::new(0, 0, 2), Edge::West),
            CellStep::Cell(FaceCell::new(0, 3, 2), Orientation::IDENTITY)
        );
        assert_eq!(
            topology.step(FaceCell::new(0, 2, 2), Edge::North),
            CellStep::Boundary
        );
    }

    #[test]
    fn rotated_seam_maps_cells_and_fractions_consistently() {
        // Face 1 is rotated a quarter turn: its west edge is glued to the north edge of face 0
        let topology = TopologyBuilder::new(vec![FaceShape::new(3, 3), FaceShape::new(3, 3)], 1)
            .link(0, Edge::North, 1, Edge::West)
            .remaining_as_boundary()
            .build()
            .unwrap();

        let (cell, frac, orientation) = topology
            .cross_edge(FaceCell::new(0, 0, 2), Edge::North, [0.25, 1.0])
            .unwrap();
        assert_eq!(cell.face, 1);
        assert_eq!(cell.i, 0);
        assert!((frac[0] - 0.0).abs() < 1e-12);
        assert_eq!(orientation.apply(Edge::North.outward()), [1, 0]);

        // Crossing back lands where we started
        let (back_cell, back_frac, back_orientation) = topology
            .cross_edge(cell, Edge::West, frac)
            .unwrap();
        assert_eq!(back_cell, FaceCell::new(0, 0, 2));
        assert!((back_frac[0] - 0.25).abs() < 1e-12);
        assert!((back_frac[1] - 1.0).abs() < 1e-12);
        assert!(back_orientation.after(&orientation).is_identity());
    }

    #[test]
    fn walking_around_cubed_sphere_returns_to_start() {
        let n = 4;
        let topology = layouts::cubed_sphere(n, 1).unwrap();
        let start = FaceCell::new(0, 1, 2);
        let (end, orientation) = topology.offset_cell(start, 4 * n as i64, 0).unwrap();
        assert_eq!(end, start);
        assert!(orientation.is_identity());
    }

    #[test]
    fn llc_table_is_valid_and_closed_at_antarctica() {
        let topology = layouts::llc(6, 2).unwrap();
        assert_eq!(topology.number_of_faces(), 13);
        assert_eq!(topology.locate_neighbor(0, Edge::South), NeighborEdge::Boundary);
        match topology.locate_neighbor(2, Edge::North) {
            NeighborEdge::Linked { face, edge, .. } => {
                assert_eq!(face, 6);
                assert_eq!(edge, Edge::West);
            }
            NeighborEdge::Boundary => panic!("Face 2 should connect to the arctic cap"),
        }
    }

    #[test]
    fn step_and_back_is_identity_on_every_llc_edge() {
        let n = 5;
        let topology = layouts::llc(n, 1).unwrap();
        for face in 0..topology.number_of_faces() {
            for edge in Edge::all() {
                for along in 0..n {
                    let cell = match edge {
                        Edge::South => FaceCell::new(face, along, 0),
                        Edge::North => FaceCell::new(face, along, n - 1),
                        Edge::West => FaceCell::new(face, 0, along),
                        Edge::East => FaceCell::new(face, n - 1, along),
                    };
                    if let CellStep::Cell(neighbor, orientation) = topology.step(cell, edge) {
                        let back_edge =
                            Edge::from_outward(orientation.apply(edge.outward()).map(|c| -c));
                        assert_eq!(
                            topology.step(neighbor, back_edge),
                            CellStep::Cell(cell, orientation.inverse())
                        );
                    }
                }
            }
        }
    }
}
