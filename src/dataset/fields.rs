//! Gridded scalar fields and staggered vector fields.

use crate::{
    error::{DatasetError, TopologyError},
    geometry::Dim3::{self, X, Y, Z},
    num::BFloat,
    topology::{CellStep, Edge, FaceCell, GridTopology, NeighborEdge},
};
use ndarray::prelude::*;

/// What the face values of a staggered vector field represent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaceQuantity {
    /// Velocity normal to the face. Vertical velocity is positive upward.
    Velocity,
    /// Volume transport through the face. Vertical transport is positive upward.
    Transport,
}

/// Face-normal components of a staggered vector field at one time.
///
/// For each face of the grid, `u` holds values on the x-faces with shape
/// `(nz, ny, nx + 1)`, `v` on the y-faces with shape `(nz, ny + 1, nx)` and
/// the optional `w` on the layer interfaces with shape `(nz + 1, ny, nx)`,
/// where interface `k` is the top of layer `k`.
#[derive(Clone, Debug)]
pub struct FaceComponents<F: BFloat> {
    pub u: Vec<Array3<F>>,
    pub v: Vec<Array3<F>>,
    pub w: Option<Vec<Array3<F>>>,
}

fn check_shape<F: BFloat>(
    name: &str,
    face: usize,
    array: &Array3<F>,
    expected: [usize; 3],
) -> Result<(), DatasetError> {
    if array.shape() != expected {
        Err(DatasetError::FieldShape {
            name: name.to_string(),
            face,
            found: array.shape().to_vec(),
            expected: expected.to_vec(),
        })
    } else {
        Ok(())
    }
}

fn check_face_count<F: BFloat>(
    arrays: &[Array3<F>],
    topology: &GridTopology,
) -> Result<(), DatasetError> {
    if arrays.len() != topology.number_of_faces() {
        Err(DatasetError::Topology(TopologyError::FaceCount {
            expected: topology.number_of_faces(),
            found: arrays.len(),
        }))
    } else {
        Ok(())
    }
}

/// A cell-centered scalar field, stored per time snapshot and face as `[k, j, i]`.
#[derive(Clone, Debug)]
pub struct ScalarField<F: BFloat> {
    name: String,
    snapshots: Vec<Vec<Array3<F>>>,
}

impl<F: BFloat> ScalarField<F> {
    /// Creates a new scalar field after checking the array shapes against the topology.
    pub fn new<S: Into<String>>(
        name: S,
        snapshots: Vec<Vec<Array3<F>>>,
        topology: &GridTopology,
    ) -> Result<Self, DatasetError> {
        let name = name.into();
        if snapshots.is_empty() {
            return Err(DatasetError::SnapshotCount {
                name,
                found: 0,
                expected: 1,
            });
        }
        for faces in &snapshots {
            check_face_count(faces, topology)?;
            for (face, values) in faces.iter().enumerate() {
                let shape = topology.face_shape(face);
                check_shape(&name, face, values, [topology.nz(), shape.ny, shape.nx])?;
            }
        }
        Ok(Self { name, snapshots })
    }

    /// Creates a new steady scalar field.
    pub fn steady<S: Into<String>>(
        name: S,
        values: Vec<Array3<F>>,
        topology: &GridTopology,
    ) -> Result<Self, DatasetError> {
        Self::new(name, vec![values], topology)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn number_of_snapshots(&self) -> usize {
        self.snapshots.len()
    }

    /// Returns the value in the given cell at the given snapshot.
    ///
    /// Fields with a single snapshot return it for any snapshot index.
    pub fn value(&self, time_index: usize, face: usize, k: usize, j: usize, i: usize) -> F {
        let time_index = time_index.min(self.snapshots.len() - 1);
        self.snapshots[time_index][face][[k, j, i]]
    }
}

/// A vector field given by its normal components on the cell faces.
#[derive(Clone, Debug)]
pub struct FaceVectorField<F: BFloat> {
    name: String,
    quantity: FaceQuantity,
    snapshots: Vec<FaceComponents<F>>,
}

impl<F: BFloat> FaceVectorField<F> {
    /// Creates a new vector field from components given on all cell faces.
    pub fn new<S: Into<String>>(
        name: S,
        quantity: FaceQuantity,
        snapshots: Vec<FaceComponents<F>>,
        topology: &GridTopology,
    ) -> Result<Self, DatasetError> {
        let name = name.into();
        if snapshots.is_empty() {
            return Err(DatasetError::SnapshotCount {
                name,
                found: 0,
                expected: 1,
            });
        }
        let has_vertical = snapshots[0].w.is_some();
        let nz = topology.nz();
        for components in &snapshots {
            check_face_count(&components.u, topology)?;
            check_face_count(&components.v, topology)?;
            if components.w.is_some() != has_vertical {
                return Err(DatasetError::MissingVelocity(vec![format!("{}.w", name)]));
            }
            for face in 0..topology.number_of_faces() {
                let shape = topology.face_shape(face);
                let (nx, ny) = (shape.nx, shape.ny);
                check_shape(&name, face, &components.u[face], [nz, ny, nx + 1])?;
                check_shape(&name, face, &components.v[face], [nz, ny + 1, nx])?;
                if let Some(w) = &components.w {
                    check_face_count(w, topology)?;
                    check_shape(&name, face, &w[face], [nz + 1, ny, nx])?;
                }
            }
        }
        Ok(Self {
            name,
            quantity,
            snapshots,
        })
    }

    /// Creates a new vector field from components given once per cell, with
    /// shape `(nz, ny, nx)` for all components.
    ///
    /// `u` and `v` hold the values on the west and south face of each cell,
    /// while `w[k]` holds the value on interface `k`, the top of layer `k`.
    /// Values on the east and north faces along the edges of each grid face
    /// are taken from the neighboring cells across the seam, with the
    /// components swapped as required by the relative orientation of the faces.
    /// East and north faces on closed boundaries and the bottom of the deepest
    /// layer get zero.
    pub fn from_lower_faces<S: Into<String>>(
        name: S,
        quantity: FaceQuantity,
        lower_faces: Vec<FaceComponents<F>>,
        topology: &GridTopology,
    ) -> Result<Self, DatasetError> {
        let name = name.into();
        let snapshots = lower_faces
            .iter()
            .map(|lower| complete_lower_faces(&name, lower, topology))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(name, quantity, snapshots, topology)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn quantity(&self) -> FaceQuantity {
        self.quantity
    }

    pub fn number_of_snapshots(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether the field has a vertical component.
    pub fn has_vertical(&self) -> bool {
        self.snapshots[0].w.is_some()
    }

    /// Returns the normal component on the lower or upper face of the given
    /// cell along the given dimension, in the frame of the face holding the cell.
    ///
    /// Fields without a vertical component return zero for `Z`.
    pub fn face_value(
        &self,
        time_index: usize,
        dim: Dim3,
        face: usize,
        k: usize,
        j: usize,
        i: usize,
        upper: bool,
    ) -> F {
        let components = &self.snapshots[time_index.min(self.snapshots.len() - 1)];
        let shift = upper as usize;
        match dim {
            X => components.u[face][[k, j, i + shift]],
            Y => components.v[face][[k, j + shift, i]],
            Z => match &components.w {
                // The upper face of layer k is interface k
                Some(w) => w[face][[k + 1 - shift, j, i]],
                None => F::zero(),
            },
        }
    }

    /// Returns the vertical component on the given layer interface.
    pub fn interface_value(&self, time_index: usize, face: usize, interface: usize, j: usize, i: usize) -> F {
        let components = &self.snapshots[time_index.min(self.snapshots.len() - 1)];
        match &components.w {
            Some(w) => w[face][[interface, j, i]],
            None => F::zero(),
        }
    }
}

fn complete_lower_faces<F: BFloat>(
    name: &str,
    lower: &FaceComponents<F>,
    topology: &GridTopology,
) -> Result<FaceComponents<F>, DatasetError> {
    let nz = topology.nz();
    check_face_count(&lower.u, topology)?;
    check_face_count(&lower.v, topology)?;
    let mut u = Vec::with_capacity(topology.number_of_faces());
    let mut v = Vec::with_capacity(topology.number_of_faces());

    for face in 0..topology.number_of_faces() {
        let shape = topology.face_shape(face);
        let (nx, ny) = (shape.nx, shape.ny);
        check_shape(name, face, &lower.u[face], [nz, ny, nx])?;
        check_shape(name, face, &lower.v[face], [nz, ny, nx])?;

        let mut full_u = Array3::zeros((nz, ny, nx + 1));
        full_u
            .slice_mut(s![.., .., ..nx])
            .assign(&lower.u[face]);
        for j in 0..ny {
            if let Some(values) =
                values_across_edge(lower, topology, FaceCell::new(face, nx - 1, j), Edge::East)?
            {
                full_u.slice_mut(s![.., j, nx]).assign(&values);
            }
        }

        let mut full_v = Array3::zeros((nz, ny + 1, nx));
        full_v
            .slice_mut(s![.., ..ny, ..])
            .assign(&lower.v[face]);
        for i in 0..nx {
            if let Some(values) =
                values_across_edge(lower, topology, FaceCell::new(face, i, ny - 1), Edge::North)?
            {
                full_v.slice_mut(s![.., ny, i]).assign(&values);
            }
        }

        u.push(full_u);
        v.push(full_v);
    }

    let w = match &lower.w {
        Some(lower_w) => {
            check_face_count(lower_w, topology)?;
            let mut w = Vec::with_capacity(lower_w.len());
            for (face, values) in lower_w.iter().enumerate() {
                let shape = topology.face_shape(face);
                check_shape(name, face, values, [nz, shape.ny, shape.nx])?;
                let mut full_w = Array3::zeros((nz + 1, shape.ny, shape.nx));
                full_w.slice_mut(s![..nz, .., ..]).assign(values);
                w.push(full_w);
            }
            Some(w)
        }
        None => None,
    };

    Ok(FaceComponents { u, v, w })
}

/// Finds the column of lower-face values that coincides with the upper face
/// of the given edge column, or `None` if the edge is a closed boundary.
fn values_across_edge<F: BFloat>(
    lower: &FaceComponents<F>,
    topology: &GridTopology,
    cell: FaceCell,
    edge: Edge,
) -> Result<Option<Array1<F>>, DatasetError> {
    let entry = match topology.locate_neighbor(cell.face, edge) {
        NeighborEdge::Boundary => return Ok(None),
        NeighborEdge::Linked { edge: entry, .. } => entry,
    };
    let neighbor = match topology.step(cell, edge) {
        CellStep::Cell(neighbor, _) => neighbor,
        CellStep::Boundary => return Ok(None),
    };
    // Entering through a lower edge means the shared face is the lower face of
    // the neighbor, with its positive direction pointing the same way as ours
    let source = match entry {
        Edge::West => &lower.u[neighbor.face],
        Edge::South => &lower.v[neighbor.face],
        Edge::East | Edge::North => {
            return Err(DatasetError::UpperEdgeSeam {
                face: cell.face,
                edge,
            })
        }
    };
    Ok(Some(source.slice(s![.., neighbor.j, neighbor.i]).to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{layouts, FaceShape, TopologyBuilder};

    #[test]
    fn periodic_lower_faces_wrap_into_upper_faces() {
        let topology = layouts::zonally_periodic(3, 2, 1).unwrap();
        let u = Array3::from_shape_fn((1, 2, 3), |(_, j, i)| (10 * j + i) as f64);
        let v = Array3::from_shape_fn((1, 2, 3), |(_, j, i)| -((10 * j + i) as f64));
        let field = FaceVectorField::from_lower_faces(
            "velocity",
            FaceQuantity::Velocity,
            vec![FaceComponents {
                u: vec![u],
                v: vec![v],
                w: None,
            }],
            &topology,
        )
        .unwrap();
        // East face of the last column is the west face of the first
        assert_eq!(field.face_value(0, X, 0, 0, 1, 2, true), 10.0);
        assert_eq!(field.face_value(0, X, 0, 0, 1, 2, false), 12.0);
        // Closed northern boundary
        assert_eq!(field.face_value(0, Y, 0, 0, 1, 1, true), 0.0);
        assert_eq!(field.face_value(0, Y, 0, 0, 1, 1, false), -11.0);
        assert_eq!(field.face_value(0, Z, 0, 0, 1, 1, true), 0.0);
    }

    #[test]
    fn rotated_seam_swaps_components() {
        let topology = TopologyBuilder::new(vec![FaceShape::new(2, 2), FaceShape::new(2, 2)], 1)
            .link(0, Edge::North, 1, Edge::West)
            .remaining_as_boundary()
            .build()
            .unwrap();
        let u1 = Array3::from_shape_fn((1, 2, 2), |(_, j, i)| (100 + 10 * j + i) as f64);
        let lower = FaceComponents {
            u: vec![Array3::zeros((1, 2, 2)), u1],
            v: vec![Array3::zeros((1, 2, 2)), Array3::zeros((1, 2, 2))],
            w: None,
        };
        let field =
            FaceVectorField::from_lower_faces("transport", FaceQuantity::Transport, vec![lower], &topology)
                .unwrap();
        // The north edge of face 0 runs along the west edge of face 1 from its top row down
        assert_eq!(field.face_value(0, Y, 0, 0, 1, 0, true), 110.0);
        assert_eq!(field.face_value(0, Y, 0, 0, 1, 1, true), 100.0);
    }

    #[test]
    fn lower_interface_values_fill_layer_tops() {
        let topology = layouts::closed_box(1, 1, 2).unwrap();
        let zeros = || Array3::<f64>::zeros((2, 1, 1));
        let w = Array3::from_shape_vec((2, 1, 1), vec![3.0, 5.0]).unwrap();
        let field = FaceVectorField::from_lower_faces(
            "velocity",
            FaceQuantity::Velocity,
            vec![FaceComponents {
                u: vec![zeros()],
                v: vec![zeros()],
                w: Some(vec![w]),
            }],
            &topology,
        )
        .unwrap();
        assert!(field.has_vertical());
        assert_eq!(field.face_value(0, Z, 0, 0, 0, 0, true), 3.0);
        assert_eq!(field.face_value(0, Z, 0, 0, 0, 0, false), 5.0);
        assert_eq!(field.face_value(0, Z, 0, 1, 0, 0, true), 5.0);
        assert_eq!(field.face_value(0, Z, 0, 1, 0, 0, false), 0.0);
        assert_eq!(field.interface_value(0, 0, 2, 0, 0), 0.0);
    }

    #[test]
    fn upper_to_upper_seam_cannot_be_completed() {
        let topology = TopologyBuilder::new(vec![FaceShape::new(2, 2), FaceShape::new(2, 2)], 1)
            .link(0, Edge::East, 1, Edge::East)
            .remaining_as_boundary()
            .build()
            .unwrap();
        let zeros = || Array3::<f32>::zeros((1, 2, 2));
        let result = FaceVectorField::from_lower_faces(
            "velocity",
            FaceQuantity::Velocity,
            vec![FaceComponents {
                u: vec![zeros(), zeros()],
                v: vec![zeros(), zeros()],
                w: None,
            }],
            &topology,
        );
        assert!(matches!(result, Err(DatasetError::UpperEdgeSeam { .. })));
    }

    #[test]
    fn scalar_field_rejects_wrong_shape() {
        let topology = layouts::closed_box(3, 2, 1).unwrap();
        let result = ScalarField::steady("theta", vec![Array3::<f64>::zeros((1, 3, 2))], &topology);
        assert!(matches!(result, Err(DatasetError::FieldShape { .. })));
    }
}
