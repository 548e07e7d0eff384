//! Gridded ocean data and point interpolation.

pub mod fields;

use crate::{
    error::{DatasetError, OutOfDomainError, SeatraceError, TopologyError},
    geometry::Dim3::{self, X, Y, Z},
    grid::{fgr, CurvilinearGrid},
    index::{CoordinateIndex, LocatorConfig, Position, TimeAxis},
    interpolation::{
        fip,
        stencil::{StencilPoint, TimeFraction},
        FieldLayout, InterpolationKernel,
    },
    io::Verbosity,
    num::BFloat,
    topology::GridTopology,
    tracking::ftr,
    velocity::{CellVelocityField, FaceRates},
};
use fields::{FaceQuantity, FaceVectorField, ScalarField};
use indicatif::ParallelProgressIterator;
use rayon::prelude::*;
use std::{collections::HashMap, sync::Arc};

/// Frame in which interpolated horizontal vector components are expressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VectorFrame {
    /// Along the `i` and `j` directions of the cell containing the query.
    Grid,
    /// Along local east and north (or the x- and y-axes for Cartesian grids).
    EastNorth,
}

/// Grid, topology and named fields shared by all queries and tracking runs.
#[derive(Clone, Debug)]
pub struct OceanDataset<F: BFloat> {
    topology: Arc<GridTopology>,
    grid: Arc<CurvilinearGrid>,
    index: CoordinateIndex,
    time_axis: Option<TimeAxis>,
    scalars: HashMap<String, ScalarField<F>>,
    vectors: HashMap<String, FaceVectorField<F>>,
    velocity: Option<String>,
}

impl<F: BFloat> OceanDataset<F> {
    /// Creates a new dataset without any fields.
    ///
    /// # Parameters
    ///
    /// - `topology`: Connectivity and land mask of the grid.
    /// - `grid`: Geometry of the grid faces.
    /// - `times`: Optional strictly increasing times of the field snapshots.
    /// - `locator_config`: Configuration for locating physical coordinates.
    ///
    /// # Returns
    ///
    /// A `Result` which is either:
    ///
    /// - `Ok`: Contains the new dataset.
    /// - `Err`: Contains a `DatasetError` if the grid does not match the topology
    ///   or the time axis is not strictly increasing.
    pub fn new(
        topology: GridTopology,
        grid: CurvilinearGrid,
        times: Option<Vec<fgr>>,
        locator_config: LocatorConfig,
    ) -> Result<Self, DatasetError> {
        if grid.number_of_faces() != topology.number_of_faces() {
            return Err(DatasetError::Topology(TopologyError::FaceCount {
                expected: topology.number_of_faces(),
                found: grid.number_of_faces(),
            }));
        }
        for (face, shape) in topology.face_shapes().iter().enumerate() {
            let centers = grid.embedded_centers(face);
            if centers.dim() != (shape.ny, shape.nx) {
                return Err(DatasetError::CoordinateShape {
                    face,
                    found: vec![centers.nrows() + 1, centers.ncols() + 1],
                    expected: vec![shape.ny + 1, shape.nx + 1],
                });
            }
        }
        if grid.depth_interfaces().len() != topology.nz() + 1 {
            return Err(DatasetError::InvalidDepths);
        }
        let time_axis = match times {
            Some(times) => Some(TimeAxis::new(times).ok_or(DatasetError::NonMonotonicTime)?),
            None => None,
        };

        let topology = Arc::new(topology);
        let grid = Arc::new(grid);
        let index = CoordinateIndex::new(Arc::clone(&topology), Arc::clone(&grid), locator_config);
        Ok(Self {
            topology,
            grid,
            index,
            time_axis,
            scalars: HashMap::new(),
            vectors: HashMap::new(),
            velocity: None,
        })
    }

    pub fn topology(&self) -> &GridTopology {
        &self.topology
    }

    pub fn grid(&self) -> &CurvilinearGrid {
        &self.grid
    }

    pub fn index(&self) -> &CoordinateIndex {
        &self.index
    }

    pub fn time_axis(&self) -> Option<&TimeAxis> {
        self.time_axis.as_ref()
    }

    fn expected_snapshots(&self) -> usize {
        self.time_axis.as_ref().map_or(1, TimeAxis::len)
    }

    fn check_new_field(&self, name: &str, n_snapshots: usize) -> Result<(), DatasetError> {
        if self.scalars.contains_key(name) || self.vectors.contains_key(name) {
            return Err(DatasetError::DuplicateField(name.to_string()));
        }
        let expected = self.expected_snapshots();
        if n_snapshots != 1 && n_snapshots != expected {
            return Err(DatasetError::SnapshotCount {
                name: name.to_string(),
                found: n_snapshots,
                expected,
            });
        }
        Ok(())
    }

    /// Adds a cell-centered scalar field. Fields with a single snapshot are
    /// treated as constant in time.
    pub fn add_scalar_field(&mut self, field: ScalarField<F>) -> Result<(), DatasetError> {
        self.check_new_field(field.name(), field.number_of_snapshots())?;
        self.scalars.insert(field.name().to_string(), field);
        Ok(())
    }

    /// Adds a staggered vector field. Fields with a single snapshot are
    /// treated as constant in time.
    pub fn add_vector_field(&mut self, field: FaceVectorField<F>) -> Result<(), DatasetError> {
        self.check_new_field(field.name(), field.number_of_snapshots())?;
        self.vectors.insert(field.name().to_string(), field);
        Ok(())
    }

    /// Selects the vector field that advects particles.
    pub fn set_velocity(&mut self, name: &str) -> Result<(), DatasetError> {
        if !self.vectors.contains_key(name) {
            return Err(DatasetError::UnknownField(name.to_string()));
        }
        self.velocity = Some(name.to_string());
        Ok(())
    }

    pub fn scalar_field(&self, name: &str) -> Result<&ScalarField<F>, DatasetError> {
        self.scalars
            .get(name)
            .ok_or_else(|| DatasetError::UnknownField(name.to_string()))
    }

    pub fn vector_field(&self, name: &str) -> Result<&FaceVectorField<F>, DatasetError> {
        self.vectors
            .get(name)
            .ok_or_else(|| DatasetError::UnknownField(name.to_string()))
    }

    /// Returns the field that advects particles.
    pub fn velocity_field(&self) -> Result<&FaceVectorField<F>, DatasetError> {
        match &self.velocity {
            Some(name) => self.vector_field(name),
            None => Err(DatasetError::MissingVelocity(vec![
                "u".to_string(),
                "v".to_string(),
            ])),
        }
    }

    /// Whether fields may vary in time.
    pub fn is_time_varying(&self) -> bool {
        self.time_axis.is_some()
    }

    /// Finds the position corresponding to the given physical coordinates.
    ///
    /// The time must lie on the time axis if the dataset has one.
    pub fn locate(
        &self,
        lon: fgr,
        lat: fgr,
        depth: fgr,
        time: fgr,
    ) -> Result<Position, OutOfDomainError> {
        if let Some(axis) = &self.time_axis {
            axis.locate(time)?;
        }
        self.index.locate(lon, lat, depth, time)
    }

    /// Finds the temporal placement of the given time for a field with the
    /// given number of snapshots.
    pub fn time_fraction(&self, n_snapshots: usize, time: fgr) -> Result<TimeFraction, OutOfDomainError> {
        match &self.time_axis {
            Some(axis) if n_snapshots > 1 => {
                let (index, frac) = axis.locate(time)?;
                Ok(TimeFraction {
                    index,
                    frac,
                    n_snapshots,
                })
            }
            _ => Ok(TimeFraction::steady()),
        }
    }

    /// Interpolates a scalar field at the given position.
    ///
    /// Land cells do not contribute to the interpolated value.
    ///
    /// # Returns
    ///
    /// A `Result` which is either:
    ///
    /// - `Ok`: Contains the interpolated value, or `None` if every sample in the stencil is unusable.
    /// - `Err`: Contains a `SeatraceError` if the field does not exist or the time is outside the time axis.
    pub fn interp_scalar(
        &self,
        name: &str,
        position: &Position,
        kernel: &InterpolationKernel,
    ) -> Result<Option<fip>, SeatraceError> {
        let field = self.scalar_field(name)?;
        let time = self.time_fraction(field.number_of_snapshots(), position.time)?;
        Ok(kernel
            .stencil(
                &self.topology,
                position,
                time,
                FieldLayout::centered(),
                |point| !self.topology.is_land(point.cell.face, point.k, point.cell.j, point.cell.i),
            )
            .map(|weights| {
                weights.apply(|point| {
                    field
                        .value(point.time_index, point.cell.face, point.k, point.cell.j, point.cell.i)
                        .into()
                })
            }))
    }

    /// Locates the given physical coordinates and interpolates a scalar field there.
    pub fn interp_scalar_at(
        &self,
        name: &str,
        lon: fgr,
        lat: fgr,
        depth: fgr,
        time: fgr,
        kernel: &InterpolationKernel,
    ) -> Result<Option<fip>, SeatraceError> {
        let position = self.locate(lon, lat, depth, time)?;
        self.interp_scalar(name, &position, kernel)
    }

    /// Interpolates a scalar field at many positions in parallel.
    ///
    /// Positions whose time lies outside the time axis give `None`.
    pub fn interp_scalars(
        &self,
        name: &str,
        positions: &[Position],
        kernel: &InterpolationKernel,
        verbosity: &Verbosity,
    ) -> Result<Vec<Option<fip>>, SeatraceError> {
        self.scalar_field(name)?;
        if verbosity.print_messages() {
            println!("Interpolating {} at {} positions", name, positions.len());
        }
        Ok(positions
            .par_iter()
            .progress_with(verbosity.create_progress_bar(positions.len()))
            .map(|position| self.interp_scalar(name, position, kernel).ok().flatten())
            .collect())
    }

    /// Interpolates a staggered vector field at the given position.
    ///
    /// # Returns
    ///
    /// A `Result` which is either:
    ///
    /// - `Ok`: Contains the interpolated horizontal components in the requested frame
    ///   and the vertical component (zero for fields without one), or `None` if no
    ///   usable samples surround the position.
    /// - `Err`: Contains a `SeatraceError` if the field does not exist or the time is outside the time axis.
    pub fn interp_vector(
        &self,
        name: &str,
        position: &Position,
        kernel: &InterpolationKernel,
        frame: VectorFrame,
    ) -> Result<Option<[fip; 3]>, SeatraceError> {
        let field = self.vector_field(name)?;
        let time = self.time_fraction(field.number_of_snapshots(), position.time)?;

        let horizontal_component = |layout: FieldLayout| {
            kernel
                .stencil(&self.topology, position, time, layout, |_| true)
                .map(|weights| {
                    weights.apply(|point: &StencilPoint| {
                        point.local_face().map_or(0.0, |(dim, upper, sign)| {
                            let value: fip = field
                                .face_value(
                                    point.time_index,
                                    dim,
                                    point.cell.face,
                                    point.k,
                                    point.cell.j,
                                    point.cell.i,
                                    upper,
                                )
                                .into();
                            sign * value
                        })
                    })
                })
        };
        let (u, v) = match (
            horizontal_component(FieldLayout::x_face()),
            horizontal_component(FieldLayout::y_face()),
        ) {
            (Some(u), Some(v)) => (u, v),
            _ => return Ok(None),
        };

        let w = if field.has_vertical() {
            kernel
                .stencil(&self.topology, position, time, FieldLayout::z_face(), |_| true)
                .map_or(0.0, |weights| {
                    weights.apply(|point| {
                        field
                            .interface_value(
                                point.time_index,
                                point.cell.face,
                                point.k,
                                point.cell.j,
                                point.cell.i,
                            )
                            .into()
                    })
                })
        } else {
            0.0
        };

        let (u, v) = match frame {
            VectorFrame::Grid => (u, v),
            VectorFrame::EastNorth => {
                let angle = self.grid.cell_x_angle(position.face, position.i, position.j);
                let (sin, cos) = angle.sin_cos();
                (u * cos - v * sin, u * sin + v * cos)
            }
        };
        Ok(Some([u, v, w]))
    }

    /// Interpolates a staggered vector field at many positions in parallel.
    ///
    /// Positions whose time lies outside the time axis give `None`.
    pub fn interp_vectors(
        &self,
        name: &str,
        positions: &[Position],
        kernel: &InterpolationKernel,
        frame: VectorFrame,
        verbosity: &Verbosity,
    ) -> Result<Vec<Option<[fip; 3]>>, SeatraceError> {
        self.vector_field(name)?;
        if verbosity.print_messages() {
            println!("Interpolating {} at {} positions", name, positions.len());
        }
        Ok(positions
            .par_iter()
            .progress_with(verbosity.create_progress_bar(positions.len()))
            .map(|position| {
                self.interp_vector(name, position, kernel, frame)
                    .ok()
                    .flatten()
            })
            .collect())
    }

    fn face_rates_at_snapshot(
        &self,
        field: &FaceVectorField<F>,
        time_index: usize,
        face: usize,
        i: usize,
        j: usize,
        k: usize,
    ) -> FaceRates {
        let metrics = self.grid.metrics(face);
        let area = metrics.areas[[j, i]];
        let thickness = self.grid.layer_thickness(k);
        let mut rates = FaceRates {
            lower: [0.0; 3],
            upper: [0.0; 3],
            active: [true, true, field.has_vertical()],
        };
        for dim in Dim3::slice() {
            for upper in [false, true] {
                let value: ftr = field.face_value(time_index, dim, face, k, j, i, upper).into();
                let shift = upper as usize;
                let rate = match (field.quantity(), dim) {
                    (FaceQuantity::Velocity, X) => value * metrics.west_lengths[[j, i + shift]] / area,
                    (FaceQuantity::Velocity, Y) => value * metrics.south_lengths[[j + shift, i]] / area,
                    (FaceQuantity::Velocity, Z) => value / thickness,
                    (FaceQuantity::Transport, _) => value / (area * thickness),
                };
                if upper {
                    rates.upper[dim as usize] = rate;
                } else {
                    rates.lower[dim as usize] = rate;
                }
            }
        }
        rates
    }

    /// Computes the normal rates of change of the fractional coordinates on
    /// the faces of the given cell at the given time.
    ///
    /// Land cells have no motion.
    pub fn face_rates(
        &self,
        face: usize,
        i: usize,
        j: usize,
        k: usize,
        time: ftr,
    ) -> Result<FaceRates, SeatraceError> {
        let field = self.velocity_field()?;
        if self.topology.is_land(face, k, j, i) {
            return Ok(FaceRates::still());
        }
        let time = self.time_fraction(field.number_of_snapshots(), time)?;
        let lower = self.face_rates_at_snapshot(field, time.index, face, i, j, k);
        if time.index + 1 < time.n_snapshots && time.frac > 0.0 {
            let upper = self.face_rates_at_snapshot(field, time.index + 1, face, i, j, k);
            Ok(lower.lerp(&upper, time.frac))
        } else {
            Ok(lower)
        }
    }

    /// Reconstructs the velocity inside the given cell at the given time.
    pub fn cell_velocity(
        &self,
        face: usize,
        i: usize,
        j: usize,
        k: usize,
        time: ftr,
    ) -> Result<CellVelocityField, SeatraceError> {
        Ok(CellVelocityField::from_face_rates(
            &self.face_rates(face, i, j, k, time)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dataset::fields::FaceComponents,
        grid::{builders, FaceMetrics},
        interpolation::KernelOrder,
        topology::{layouts, TopologyBuilder},
    };
    use approx::assert_abs_diff_eq;
    use ndarray::prelude::*;

    fn channel(nx: usize, ny: usize, nz: usize) -> OceanDataset<f64> {
        let topology = layouts::closed_box(nx, ny, nz).unwrap();
        let x: Vec<fgr> = (0..=nx).map(|i| i as fgr).collect();
        let y: Vec<fgr> = (0..=ny).map(|j| 2.0 * j as fgr).collect();
        let depths: Vec<fgr> = (0..=nz).map(|k| 10.0 * k as fgr).collect();
        let grid = builders::cartesian(&x, &y, depths, &topology).unwrap();
        OceanDataset::new(topology, grid, None, LocatorConfig::default()).unwrap()
    }

    #[test]
    fn linear_scalar_is_reproduced_by_linear_kernel() {
        let mut dataset = channel(6, 4, 1);
        // Value equal to the x-coordinate of the cell center
        let values = Array3::from_shape_fn((1, 4, 6), |(_, _, i)| i as f64 + 0.5);
        let field = ScalarField::steady("x", vec![values], dataset.topology()).unwrap();
        dataset.add_scalar_field(field).unwrap();
        let kernel = InterpolationKernel::new(KernelOrder::Linear);
        let value = dataset
            .interp_scalar_at("x", 2.7, 3.3, 5.0, 0.0, &kernel)
            .unwrap()
            .unwrap();
        assert_abs_diff_eq!(value, 2.7, epsilon = 1e-12);
    }

    #[test]
    fn land_cells_are_excluded_from_scalar_interpolation() {
        let mut land = Array3::from_elem((1, 1, 2), false);
        land[[0, 0, 1]] = true;
        let topology = TopologyBuilder::new(vec![crate::topology::FaceShape::new(2, 1)], 1)
            .remaining_as_boundary()
            .land_mask(vec![land])
            .build()
            .unwrap();
        let grid = builders::cartesian(&[0.0, 1.0, 2.0], &[0.0, 1.0], vec![0.0, 1.0], &topology).unwrap();
        let mut dataset = OceanDataset::new(topology, grid, None, LocatorConfig::default()).unwrap();
        let values = Array3::from_shape_vec((1, 1, 2), vec![3.0, 1000.0]).unwrap();
        dataset
            .add_scalar_field(ScalarField::steady("theta", vec![values], dataset.topology()).unwrap())
            .unwrap();
        let value = dataset
            .interp_scalar_at("theta", 0.9, 0.5, 0.5, 0.0, &InterpolationKernel::default())
            .unwrap();
        assert_eq!(value, Some(3.0));
        let value = dataset
            .interp_scalar_at("theta", 1.5, 0.5, 0.5, 0.0, &InterpolationKernel::default())
            .unwrap();
        assert_eq!(value, None);
    }

    #[test]
    fn velocity_rates_use_face_lengths_and_areas() {
        let mut dataset = channel(2, 1, 1);
        let u = Array3::from_shape_vec((1, 1, 3), vec![1.0, 2.0, 0.0]).unwrap();
        let field = FaceVectorField::new(
            "velocity",
            FaceQuantity::Velocity,
            vec![FaceComponents {
                u: vec![u],
                v: vec![Array3::zeros((1, 2, 2))],
                w: None,
            }],
            dataset.topology(),
        )
        .unwrap();
        dataset.add_vector_field(field).unwrap();
        dataset.set_velocity("velocity").unwrap();
        // Cells are 1 wide and 2 high, so u = 1 moves one cell width per unit time
        let rates = dataset.face_rates(0, 0, 0, 0, 0.0).unwrap();
        assert_abs_diff_eq!(rates.lower[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(rates.upper[0], 2.0, epsilon = 1e-12);
        assert!(!rates.active[2]);

        let interpolated = dataset
            .interp_vector(
                "velocity",
                &dataset.locate(0.5, 1.0, 5.0, 0.0).unwrap(),
                &InterpolationKernel::default(),
                VectorFrame::EastNorth,
            )
            .unwrap()
            .unwrap();
        assert_abs_diff_eq!(interpolated[0], 1.5, epsilon = 1e-12);
        assert_abs_diff_eq!(interpolated[1], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn grid_with_other_face_count_is_rejected() {
        let box_topology = layouts::closed_box(2, 2, 1).unwrap();
        let grid = builders::cartesian(&[0.0, 1.0, 2.0], &[0.0, 1.0, 2.0], vec![0.0, 1.0], &box_topology)
            .unwrap();
        let result = OceanDataset::<f64>::new(
            layouts::cubed_sphere(2, 1).unwrap(),
            grid,
            None,
            LocatorConfig::default(),
        );
        assert_eq!(
            result.err(),
            Some(DatasetError::Topology(TopologyError::FaceCount {
                expected: 6,
                found: 1
            }))
        );
    }

    #[test]
    fn supplied_metrics_replace_derived_ones() {
        let topology = layouts::closed_box(2, 1, 1).unwrap();
        let grid = builders::cartesian(&[0.0, 1.0, 2.0], &[0.0, 2.0], vec![0.0, 10.0], &topology).unwrap();
        let metrics = |areas_shape: (usize, usize)| FaceMetrics {
            west_lengths: Array2::from_elem((1, 3), 2.0),
            south_lengths: Array2::from_elem((2, 2), 1.0),
            areas: Array2::from_elem(areas_shape, 4.0),
        };
        assert!(matches!(
            grid.clone().with_metrics(0, metrics((2, 2))),
            Err(DatasetError::CoordinateShape { face: 0, .. })
        ));
        let grid = grid.with_metrics(0, metrics((1, 2))).unwrap();
        assert_eq!(grid.metrics(0).areas[[0, 1]], 4.0);

        let mut dataset = OceanDataset::new(topology, grid, None, LocatorConfig::default()).unwrap();
        let field = FaceVectorField::new(
            "velocity",
            FaceQuantity::Velocity,
            vec![FaceComponents {
                u: vec![Array3::from_elem((1, 1, 3), 1.0)],
                v: vec![Array3::zeros((1, 2, 2))],
                w: None,
            }],
            dataset.topology(),
        )
        .unwrap();
        dataset.add_vector_field(field).unwrap();
        dataset.set_velocity("velocity").unwrap();
        // Face length 2 over area 4
        let rates = dataset.face_rates(0, 1, 0, 0, 0.0).unwrap();
        assert_abs_diff_eq!(rates.lower[0], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn duplicate_and_unknown_fields_are_rejected() {
        let mut dataset = channel(2, 2, 1);
        let values = || vec![Array3::zeros((1, 2, 2))];
        dataset
            .add_scalar_field(ScalarField::steady("salt", values(), dataset.topology()).unwrap())
            .unwrap();
        let duplicate = ScalarField::steady("salt", values(), dataset.topology()).unwrap();
        assert_eq!(
            dataset.add_scalar_field(duplicate),
            Err(DatasetError::DuplicateField("salt".to_string()))
        );
        assert_eq!(
            dataset.set_velocity("velocity"),
            Err(DatasetError::UnknownField("velocity".to_string()))
        );
        assert!(dataset.velocity_field().is_err());
    }
}
