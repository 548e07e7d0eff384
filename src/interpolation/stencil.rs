//! Assembly of interpolation stencils across the grid topology.

use super::{fip, FieldLayout, InterpolationKernel, SampleLocation};
use crate::{
    geometry::Dim3,
    index::Position,
    topology::{FaceCell, GridTopology, Orientation},
};

/// A single sample taking part in an interpolation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StencilPoint {
    /// Column holding the sample.
    pub cell: FaceCell,
    /// Maps the frame of the query column into the frame of `cell`.
    pub orientation: Orientation,
    /// Layer index, or interface index (from the surface) for vertically face-located data.
    pub k: usize,
    /// Index of the time snapshot.
    pub time_index: usize,
    /// For horizontally face-located data, the dimension (in the frame of the
    /// query column) and whether the sample lies on the upper face of `cell`.
    pub face_side: Option<(Dim3, bool)>,
}

impl StencilPoint {
    /// Resolves the face holding the sample in the frame of `cell`.
    ///
    /// # Returns
    ///
    /// The dimension of the face in the frame of `cell`, whether it is the upper
    /// face, and the sign to apply to a vector component stored on that face to
    /// express it along the queried dimension of the query frame.
    pub fn local_face(&self) -> Option<(Dim3, bool, fip)> {
        self.face_side.map(|(dim, upper)| {
            let (local_dim, reversed) = self.orientation.map_dim(dim);
            (
                local_dim,
                upper != reversed,
                if reversed { -1.0 } else { 1.0 },
            )
        })
    }
}

/// A finite stencil of samples with non-negative weights summing to one.
#[derive(Clone, Debug, PartialEq)]
pub struct KernelWeight {
    points: Vec<(StencilPoint, fip)>,
}

impl KernelWeight {
    pub fn points(&self) -> &[(StencilPoint, fip)] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Computes the weighted sum of the values produced for each stencil point.
    pub fn apply<V>(&self, mut value_of: V) -> fip
    where
        V: FnMut(&StencilPoint) -> fip,
    {
        self.points
            .iter()
            .map(|(point, weight)| weight * value_of(point))
            .sum()
    }
}

/// Temporal placement of a query: the lower snapshot index, the fraction of
/// the way to the next snapshot and the number of snapshots.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeFraction {
    pub index: usize,
    pub frac: fip,
    pub n_snapshots: usize,
}

impl TimeFraction {
    /// Placement for data without a time axis.
    pub fn steady() -> Self {
        Self {
            index: 0,
            frac: 0.0,
            n_snapshots: 1,
        }
    }
}

impl InterpolationKernel {
    /// Computes the interpolation stencil for data with the given layout at
    /// the given position.
    ///
    /// Samples outside the domain, and samples rejected by `accept`, are
    /// dropped and the remaining weights renormalized.
    ///
    /// # Parameters
    ///
    /// - `topology`: Topology used to walk the stencil across face seams.
    /// - `position`: Query position.
    /// - `time`: Temporal placement of the query.
    /// - `layout`: Sample locations of the data.
    /// - `accept`: Returns whether the given stencil point holds a usable sample.
    ///
    /// # Returns
    ///
    /// The stencil, or `None` if no sample survives.
    pub fn stencil<A>(
        &self,
        topology: &GridTopology,
        position: &Position,
        time: TimeFraction,
        layout: FieldLayout,
        accept: A,
    ) -> Option<KernelWeight>
    where
        A: Fn(&StencilPoint) -> bool,
    {
        assert!(
            !(layout.x == SampleLocation::Face && layout.y == SampleLocation::Face),
            "Data can be face-located along at most one horizontal dimension"
        );
        let weights_x = self.horizontal.weights_1d(layout.x, position.frac[0]);
        let weights_y = self.horizontal.weights_1d(layout.y, position.frac[1]);
        let weights_z = self.vertical.weights_1d(layout.z, position.frac[2]);
        let weights_t = if time.n_snapshots > 1 {
            self.temporal.weights_1d(SampleLocation::Face, time.frac)
        } else {
            vec![(0, 1.0)]
        };

        let start = position.column();
        let nz = topology.nz() as i64;
        let mut points = Vec::with_capacity(
            weights_x.len() * weights_y.len() * weights_z.len() * weights_t.len(),
        );

        for &(offset_x, weight_x) in &weights_x {
            let (di, side_x) = split_face_offset(layout.x, offset_x);
            for &(offset_y, weight_y) in &weights_y {
                let (dj, side_y) = split_face_offset(layout.y, offset_y);
                let (cell, orientation) = match topology.offset_cell(start, di, dj) {
                    Some(found) => found,
                    None => continue,
                };
                let face_side = side_x
                    .map(|upper| (Dim3::X, upper))
                    .or_else(|| side_y.map(|upper| (Dim3::Y, upper)));

                for &(offset_z, weight_z) in &weights_z {
                    // Vertical fractions increase upward while layer indices increase downward
                    let k = match layout.z {
                        SampleLocation::Center => position.k as i64 - offset_z,
                        SampleLocation::Face => position.k as i64 + 1 - offset_z,
                    };
                    let upper_k = match layout.z {
                        SampleLocation::Center => nz - 1,
                        SampleLocation::Face => nz,
                    };
                    if k < 0 || k > upper_k {
                        continue;
                    }
                    for &(offset_t, weight_t) in &weights_t {
                        let time_index = time.index as i64 + offset_t;
                        if time_index < 0 || time_index >= time.n_snapshots as i64 {
                            continue;
                        }
                        let point = StencilPoint {
                            cell,
                            orientation,
                            k: k as usize,
                            time_index: time_index as usize,
                            face_side,
                        };
                        let weight = weight_x * weight_y * weight_z * weight_t;
                        if weight > 0.0 && accept(&point) {
                            points.push((point, weight));
                        }
                    }
                }
            }
        }

        let total: fip = points.iter().map(|(_, weight)| weight).sum();
        if points.is_empty() || !(total > 0.0) {
            return None;
        }
        for (_, weight) in points.iter_mut() {
            *weight /= total;
        }
        Some(KernelWeight { points })
    }
}

/// Splits a sample offset into a column offset and, for face-located
/// samples, whether the sample lies on the upper face of that column.
fn split_face_offset(location: SampleLocation, offset: i64) -> (i64, Option<bool>) {
    match location {
        SampleLocation::Center => (offset, None),
        SampleLocation::Face if offset <= 0 => (offset, Some(false)),
        SampleLocation::Face => (offset - 1, Some(true)),
    }
}
