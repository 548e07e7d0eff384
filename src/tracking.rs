//! Lagrangian tracking of particle sets through the cell velocity field.

pub mod output;

use crate::{
    dataset::OceanDataset,
    error::{OutOfDomainError, SeatraceError},
    geometry::Dim3::{self, X, Y, Z},
    grid::fgr,
    index::{Position, TimeAxis},
    interpolation::InterpolationKernel,
    io::Verbosity,
    num::BFloat,
    stepping::{AnalyticStepper, StepOutcome, StepperConfig},
    topology::Edge,
    velocity::CellVelocityField,
};
use indicatif::ParallelProgressIterator;
use output::{CrossingRecord, ParticleState, Snapshot, TrackingOutput};
use rayon::prelude::*;
use std::collections::BTreeMap;

#[cfg(feature = "serialization")]
use serde::Serialize;

/// Floating-point precision to use for tracking.
#[allow(non_camel_case_types)]
pub type ftr = f64;

/// Lifecycle state of a tracked particle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub enum ParticleStatus {
    Active,
    /// The stopping predicate returned `true`.
    StoppedByPredicate,
    /// The particle left the domain through a boundary, into land or outside the time axis.
    OutOfDomain,
    /// The particle was still moving when the final time was reached.
    FinalTimeReached,
    /// The particle can not leave its cell, or kept crossing cells without progress.
    Stuck,
}

impl ParticleStatus {
    pub fn is_active(self) -> bool {
        self == Self::Active
    }
}

/// Number of particles with each status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub struct StatusCounts {
    pub active: usize,
    pub stopped_by_predicate: usize,
    pub out_of_domain: usize,
    pub final_time_reached: usize,
    pub stuck: usize,
}

impl StatusCounts {
    fn count(&mut self, status: ParticleStatus) {
        match status {
            ParticleStatus::Active => self.active += 1,
            ParticleStatus::StoppedByPredicate => self.stopped_by_predicate += 1,
            ParticleStatus::OutOfDomain => self.out_of_domain += 1,
            ParticleStatus::FinalTimeReached => self.final_time_reached += 1,
            ParticleStatus::Stuck => self.stuck += 1,
        }
    }
}

/// How stopped particles appear in snapshots taken after they stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoppedOutputPolicy {
    /// Report the last position and status of the particle.
    RetainLast,
    /// Leave the particle out.
    Omit,
}

/// Configuration parameters for tracking.
#[derive(Clone, Debug)]
pub struct TrackingConfig {
    /// How stopped particles appear in later snapshots.
    pub stopped_output: StoppedOutputPolicy,
    /// A particle crossing more cells than this between two output times is considered stuck.
    pub max_crossings_per_interval: usize,
    /// Whether to record the position of every cell crossing.
    pub record_crossings: bool,
    pub stepper: StepperConfig,
    pub verbosity: Verbosity,
}

impl TrackingConfig {
    pub const DEFAULT_STOPPED_OUTPUT: StoppedOutputPolicy = StoppedOutputPolicy::RetainLast;
    pub const DEFAULT_MAX_CROSSINGS_PER_INTERVAL: usize = 100_000;
    pub const DEFAULT_RECORD_CROSSINGS: bool = false;

    /// Panics if any of the configuration parameter values are invalid.
    pub fn validate(&self) {
        assert!(
            self.max_crossings_per_interval > 0,
            "Maximum number of crossings per interval must be larger than zero."
        );
        self.stepper.validate();
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            stopped_output: Self::DEFAULT_STOPPED_OUTPUT,
            max_crossings_per_interval: Self::DEFAULT_MAX_CROSSINGS_PER_INTERVAL,
            record_crossings: Self::DEFAULT_RECORD_CROSSINGS,
            stepper: StepperConfig::default(),
            verbosity: Verbosity::default(),
        }
    }
}

/// What to compute in a tracking run.
#[derive(Clone, Debug)]
pub struct TrackingRequest {
    /// Times at which to record snapshots, monotonic in the direction of tracking.
    pub output_times: Vec<ftr>,
    /// Time at which tracking ends, defaulting to the last output time.
    pub final_time: Option<ftr>,
    /// Kernel used to sample scalar fields at the particle positions.
    pub kernel: InterpolationKernel,
    /// Names of the scalar fields to sample at each output time.
    pub sampled_fields: Vec<String>,
}

impl TrackingRequest {
    /// Creates a request for snapshots at the given times without sampling.
    pub fn new(output_times: Vec<ftr>) -> Self {
        Self {
            output_times,
            final_time: None,
            kernel: InterpolationKernel::default(),
            sampled_fields: Vec::new(),
        }
    }

    pub fn with_final_time(mut self, final_time: ftr) -> Self {
        self.final_time = Some(final_time);
        self
    }

    /// Requests sampling of the given scalar fields with the given kernel.
    pub fn with_sampled_fields<S: Into<String>>(
        mut self,
        kernel: InterpolationKernel,
        names: impl IntoIterator<Item = S>,
    ) -> Self {
        self.kernel = kernel;
        self.sampled_fields = names.into_iter().map(Into::into).collect();
        self
    }

    /// Time at which tracking ends, if anything is requested at all.
    pub fn end_time(&self) -> Option<ftr> {
        self.final_time.or_else(|| self.output_times.last().copied())
    }

    /// Panics if the output times are not monotonic in the given direction.
    fn validate(&self, forward: bool) {
        assert!(
            self.output_times
                .windows(2)
                .all(|pair| if forward { pair[0] <= pair[1] } else { pair[0] >= pair[1] }),
            "Output times must be monotonic in the direction of tracking."
        );
    }
}

/// Velocity of the cell a particle is in, kept until the particle changes
/// cell or the field reaches a time node.
#[derive(Clone, Copy, Debug)]
struct CachedField {
    face: usize,
    i: usize,
    j: usize,
    k: usize,
    field: CellVelocityField,
}

impl CachedField {
    fn is_for(&self, position: &Position) -> bool {
        (self.face, self.i, self.j, self.k) == (position.face, position.i, position.j, position.k)
    }
}

/// Change to a single particle computed in one tracking round.
#[derive(Clone, Copy, Debug)]
struct ParticleUpdate {
    position: Position,
    status: ParticleStatus,
    cached: Option<CachedField>,
    crossed: bool,
}

impl ParticleUpdate {
    fn stopped(position: Position, status: ParticleStatus) -> Self {
        Self {
            position,
            status,
            cached: None,
            crossed: false,
        }
    }
}

/// State shared by all particles while advancing toward one target time.
struct Round<'a, F: BFloat> {
    dataset: &'a OceanDataset<F>,
    stepper: &'a AnalyticStepper,
    /// Time axis of the velocity field, if it varies in time.
    velocity_axis: Option<&'a TimeAxis>,
    target: ftr,
    forward: bool,
}

impl<'a, F: BFloat> Round<'a, F> {
    fn is_behind(&self, time: ftr) -> bool {
        if self.forward {
            time < self.target
        } else {
            time > self.target
        }
    }

    /// Advances a particle through its current cell, stopping at the first
    /// cell face, time node of the velocity field or the target time.
    fn advance<P>(
        &self,
        id: usize,
        position: &Position,
        cached: Option<CachedField>,
        predicate: &P,
    ) -> ParticleUpdate
    where
        P: Fn(&Position) -> bool + Sync,
    {
        let time = position.time;
        let mut budget = (self.target - time).abs();
        let mut budget_end = self.target;
        let mut reaches_node = false;
        if let Some(axis) = self.velocity_axis {
            match axis.next_node(time, self.forward) {
                Some(node) if (node - time).abs() < budget => {
                    budget = (node - time).abs();
                    budget_end = node;
                    reaches_node = true;
                }
                Some(_) => {}
                None => {
                    log::warn!(
                        "Particle {} reached the end of the time axis at t = {}",
                        id,
                        time
                    );
                    return ParticleUpdate::stopped(*position, ParticleStatus::OutOfDomain);
                }
            }
        }

        let cached = match cached.filter(|cached| cached.is_for(position)) {
            Some(cached) => cached,
            None => {
                let field = match self.dataset.cell_velocity(
                    position.face,
                    position.i,
                    position.j,
                    position.k,
                    time,
                ) {
                    Ok(field) => field,
                    Err(err) => {
                        log::warn!("Stopping particle {}: {}", id, err);
                        return ParticleUpdate::stopped(*position, ParticleStatus::OutOfDomain);
                    }
                };
                CachedField {
                    face: position.face,
                    i: position.i,
                    j: position.j,
                    k: position.k,
                    field: if self.forward { field } else { field.reversed() },
                }
            }
        };

        let mut update = match self.stepper.step(&cached.field, position.frac, budget) {
            StepOutcome::Stuck => {
                log::warn!(
                    "Particle {} is stuck in cell ({}, {}, {}) of face {}",
                    id,
                    position.i,
                    position.j,
                    position.k,
                    position.face
                );
                return ParticleUpdate::stopped(*position, ParticleStatus::Stuck);
            }
            StepOutcome::Interior { frac, .. } => ParticleUpdate {
                position: self.position_in(position, position.k, frac, budget_end),
                status: ParticleStatus::Active,
                cached: if reaches_node { None } else { Some(cached) },
                crossed: false,
            },
            StepOutcome::Exit {
                dim,
                upper,
                time: elapsed,
                frac,
            } => {
                let exit_time = if elapsed >= budget {
                    budget_end
                } else if self.forward {
                    time + elapsed
                } else {
                    time - elapsed
                };
                match self.cross(position, dim, upper, frac, exit_time) {
                    Some(position) => ParticleUpdate {
                        position,
                        status: ParticleStatus::Active,
                        cached: None,
                        crossed: true,
                    },
                    None => ParticleUpdate::stopped(
                        Position::from_grid(
                            self.dataset.grid(),
                            position.face,
                            position.i,
                            position.j,
                            position.k,
                            frac,
                            exit_time,
                        ),
                        ParticleStatus::OutOfDomain,
                    ),
                }
            }
        };
        if update.status.is_active() && predicate(&update.position) {
            update.status = ParticleStatus::StoppedByPredicate;
        }
        update
    }

    fn position_in(&self, position: &Position, k: usize, frac: [ftr; 3], time: ftr) -> Position {
        Position::from_grid(
            self.dataset.grid(),
            position.face,
            position.i,
            position.j,
            k,
            frac,
            time,
        )
    }

    /// Moves a particle on a cell face into the neighboring cell.
    ///
    /// # Returns
    ///
    /// `None` if the neighbor is land or outside the domain.
    fn cross(
        &self,
        position: &Position,
        dim: Dim3,
        upper: bool,
        frac: [ftr; 3],
        time: ftr,
    ) -> Option<Position> {
        let topology = self.dataset.topology();
        let (column, k, new_frac) = match dim {
            Z => {
                // The upper face of a layer borders the layer above it
                let k = if upper {
                    position.k.checked_sub(1)?
                } else {
                    Some(position.k + 1).filter(|&k| k < topology.nz())?
                };
                let mut new_frac = frac;
                new_frac[2] = if upper { 0.0 } else { 1.0 };
                (position.column(), k, new_frac)
            }
            X | Y => {
                let (column, horizontal, _) =
                    topology.cross_edge(position.column(), Edge::from_exit(dim, upper), [frac[0], frac[1]])?;
                (column, position.k, [horizontal[0], horizontal[1], frac[2]])
            }
        };
        if topology.is_land(column.face, k, column.j, column.i) {
            return None;
        }
        Some(Position::from_grid(
            self.dataset.grid(),
            column.face,
            column.i,
            column.j,
            k,
            new_frac,
            time,
        ))
    }
}

/// A set of particles tracked through a dataset.
///
/// The particle data is stored as parallel arrays indexed by particle.
#[derive(Clone, Debug)]
pub struct ParticleSet {
    ids: Vec<usize>,
    positions: Vec<Position>,
    statuses: Vec<ParticleStatus>,
    cached_fields: Vec<Option<CachedField>>,
}

impl ParticleSet {
    /// Creates a new set of active particles at the given positions,
    /// identified by their index.
    pub fn new(positions: Vec<Position>) -> Self {
        let ids = (0..positions.len()).collect();
        Self::with_ids(ids, positions)
    }

    fn with_ids(ids: Vec<usize>, positions: Vec<Position>) -> Self {
        let number_of_particles = positions.len();
        Self {
            ids,
            positions,
            statuses: vec![ParticleStatus::Active; number_of_particles],
            cached_fields: vec![None; number_of_particles],
        }
    }

    /// Creates a new set of particles at the given physical coordinates.
    ///
    /// # Parameters
    ///
    /// - `dataset`: Dataset to locate the coordinates in.
    /// - `coordinates`: Longitude, latitude and depth of each particle.
    /// - `time`: Start time of all the particles.
    /// - `verbosity`: Whether and how to pass non-critical information to the user.
    ///
    /// # Returns
    ///
    /// The particles that could be located, identified by the index of their
    /// coordinates, along with the index and error of each coordinate that
    /// could not be located.
    pub fn seed<F: BFloat>(
        dataset: &OceanDataset<F>,
        coordinates: &[[fgr; 3]],
        time: ftr,
        verbosity: &Verbosity,
    ) -> (Self, Vec<(usize, OutOfDomainError)>) {
        let located: Vec<_> = coordinates
            .par_iter()
            .progress_with(verbosity.create_progress_bar(coordinates.len()))
            .map(|&[lon, lat, depth]| dataset.locate(lon, lat, depth, time))
            .collect();

        let mut ids = Vec::with_capacity(located.len());
        let mut positions = Vec::with_capacity(located.len());
        let mut failures = Vec::new();
        for (idx, result) in located.into_iter().enumerate() {
            match result {
                Ok(position) => {
                    ids.push(idx);
                    positions.push(position);
                }
                Err(err) => {
                    log::warn!("Could not seed particle {}: {}", idx, err);
                    failures.push((idx, err));
                }
            }
        }
        if verbosity.print_messages() {
            println!(
                "Seeded {} particles ({} outside the domain)",
                positions.len(),
                failures.len()
            );
        }
        (Self::with_ids(ids, positions), failures)
    }

    pub fn number_of_particles(&self) -> usize {
        self.positions.len()
    }

    pub fn ids(&self) -> &[usize] {
        &self.ids
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn statuses(&self) -> &[ParticleStatus] {
        &self.statuses
    }

    pub fn status_counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        self.statuses.iter().for_each(|&status| counts.count(status));
        counts
    }

    /// Creates a new set containing the particles for which the given closure
    /// returns `true`, keeping their identifiers and statuses.
    pub fn subset<P>(&self, predicate: P) -> Self
    where
        P: Fn(&Position, ParticleStatus) -> bool,
    {
        let mut subset = Self::with_ids(Vec::new(), Vec::new());
        for idx in 0..self.number_of_particles() {
            if predicate(&self.positions[idx], self.statuses[idx]) {
                subset.ids.push(self.ids[idx]);
                subset.positions.push(self.positions[idx]);
                subset.statuses.push(self.statuses[idx]);
                subset.cached_fields.push(None);
            }
        }
        subset
    }

    /// Tracks the active particles through the velocity field of the dataset.
    ///
    /// Particles move analytically from cell to cell. All active particles
    /// advance one cell-event in parallel per round, and the results of a
    /// round are applied together. Tracking runs backward in time if the end
    /// time precedes the particle times.
    ///
    /// # Parameters
    ///
    /// - `dataset`: Dataset containing the velocity field and sampled fields.
    /// - `request`: Output times, final time and fields to sample.
    /// - `config`: Configuration parameters for tracking.
    /// - `predicate`: Closure returning `true` for positions where a particle should stop.
    ///
    /// # Returns
    ///
    /// A `Result` which is either:
    ///
    /// - `Ok`: Contains the snapshots at the output times and any recorded crossings.
    /// - `Err`: Contains a `SeatraceError` if the velocity or a sampled field is missing.
    pub fn track<F, P>(
        &mut self,
        dataset: &OceanDataset<F>,
        request: &TrackingRequest,
        config: &TrackingConfig,
        predicate: P,
    ) -> Result<TrackingOutput, SeatraceError>
    where
        F: BFloat,
        P: Fn(&Position) -> bool + Sync,
    {
        config.validate();
        let velocity = dataset.velocity_field()?;
        for name in &request.sampled_fields {
            dataset.scalar_field(name)?;
        }

        let mut crossings = if config.record_crossings {
            Some(vec![Vec::new(); self.number_of_particles()])
        } else {
            None
        };
        let end_time = match request.end_time() {
            Some(end_time) => end_time,
            None => {
                return Ok(TrackingOutput {
                    snapshots: Vec::new(),
                    crossings: crossings.map(|_| Vec::new()),
                })
            }
        };
        let start_time = self
            .positions
            .iter()
            .map(|position| position.time)
            .fold(ftr::INFINITY, ftr::min);
        let forward = self.positions.is_empty() || end_time >= start_time;
        request.validate(forward);

        let stepper = AnalyticStepper::new(config.stepper.clone());
        let velocity_axis = dataset
            .time_axis()
            .filter(|_| velocity.number_of_snapshots() > 1);

        if config.verbosity.print_messages() {
            println!(
                "Tracking {} particles {} to t = {}",
                self.number_of_particles(),
                if forward { "forward" } else { "backward" },
                end_time
            );
        }
        let progress_bar = config
            .verbosity
            .create_progress_bar(request.output_times.len());

        let mut snapshots = Vec::with_capacity(request.output_times.len());
        let past_end = |time: ftr| if forward { time > end_time } else { time < end_time };
        for &output_time in &request.output_times {
            let target = if past_end(output_time) { end_time } else { output_time };
            let round = Round {
                dataset,
                stepper: &stepper,
                velocity_axis,
                target,
                forward,
            };
            self.advance_to(&round, config, &predicate, crossings.as_mut());
            if target == end_time {
                self.finish_active(end_time);
            }
            snapshots.push(self.snapshot(dataset, request, config, output_time));
            progress_bar.inc(1);
        }
        progress_bar.finish();

        if self.statuses.iter().any(|status| status.is_active()) {
            let round = Round {
                dataset,
                stepper: &stepper,
                velocity_axis,
                target: end_time,
                forward,
            };
            self.advance_to(&round, config, &predicate, crossings.as_mut());
            self.finish_active(end_time);
        }

        if config.verbosity.print_messages() {
            let counts = self.status_counts();
            println!(
                "Tracking done: {} reached the final time, {} stopped, {} left the domain, {} stuck",
                counts.final_time_reached, counts.stopped_by_predicate, counts.out_of_domain, counts.stuck
            );
        }

        Ok(TrackingOutput {
            snapshots,
            crossings: crossings.map(|crossings| {
                self.ids
                    .iter()
                    .zip(crossings)
                    .map(|(&id, positions)| CrossingRecord { id, positions })
                    .collect()
            }),
        })
    }

    /// Runs rounds until no active particle is behind the target time of the round.
    fn advance_to<F, P>(
        &mut self,
        round: &Round<F>,
        config: &TrackingConfig,
        predicate: &P,
        mut crossings: Option<&mut Vec<Vec<Position>>>,
    ) where
        F: BFloat,
        P: Fn(&Position) -> bool + Sync,
    {
        let mut crossing_counts = vec![0; self.number_of_particles()];
        loop {
            let updates: Vec<(usize, ParticleUpdate)> = (0..self.number_of_particles())
                .into_par_iter()
                .filter(|&idx| {
                    self.statuses[idx].is_active() && round.is_behind(self.positions[idx].time)
                })
                .map(|idx| {
                    (
                        idx,
                        round.advance(
                            self.ids[idx],
                            &self.positions[idx],
                            self.cached_fields[idx],
                            predicate,
                        ),
                    )
                })
                .collect();
            if updates.is_empty() {
                break;
            }
            log::debug!(
                "Advanced {} particles toward t = {}",
                updates.len(),
                round.target
            );
            for (idx, update) in updates {
                self.positions[idx] = update.position;
                self.statuses[idx] = update.status;
                self.cached_fields[idx] = update.cached;
                if !update.crossed {
                    continue;
                }
                if let Some(crossings) = crossings.as_deref_mut() {
                    crossings[idx].push(update.position);
                }
                crossing_counts[idx] += 1;
                if crossing_counts[idx] > config.max_crossings_per_interval
                    && self.statuses[idx].is_active()
                {
                    log::warn!(
                        "Particle {} crossed more than {} cells before t = {}, marking it as stuck",
                        self.ids[idx],
                        config.max_crossings_per_interval,
                        round.target
                    );
                    self.statuses[idx] = ParticleStatus::Stuck;
                }
            }
        }
    }

    fn finish_active(&mut self, end_time: ftr) {
        for (status, position) in self.statuses.iter_mut().zip(&self.positions) {
            if status.is_active() && position.time == end_time {
                *status = ParticleStatus::FinalTimeReached;
            }
        }
    }

    fn snapshot<F: BFloat>(
        &self,
        dataset: &OceanDataset<F>,
        request: &TrackingRequest,
        config: &TrackingConfig,
        time: ftr,
    ) -> Snapshot {
        let particles: Vec<ParticleState> = (0..self.number_of_particles())
            .filter(|&idx| {
                config.stopped_output == StoppedOutputPolicy::RetainLast
                    || self.statuses[idx].is_active()
                    || self.positions[idx].time == time
            })
            .map(|idx| ParticleState {
                id: self.ids[idx],
                position: self.positions[idx],
                status: self.statuses[idx],
            })
            .collect();
        let samples: BTreeMap<_, _> = request
            .sampled_fields
            .iter()
            .map(|name| {
                let values: Vec<_> = particles
                    .par_iter()
                    .map(|state| {
                        dataset
                            .interp_scalar(name, &state.position, &request.kernel)
                            .ok()
                            .flatten()
                    })
                    .collect();
                (name.clone(), values)
            })
            .collect();
        Snapshot {
            time,
            particles,
            samples,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dataset::fields::{FaceComponents, FaceQuantity, FaceVectorField, ScalarField},
        grid::builders,
        index::LocatorConfig,
        topology::layouts,
    };
    use approx::assert_abs_diff_eq;
    use ndarray::prelude::*;

    /// Closed channel of unit cells with a uniform eastward velocity that
    /// vanishes on the closed ends.
    fn channel(nx: usize, speed: f64) -> OceanDataset<f64> {
        let topology = layouts::closed_box(nx, 1, 1).unwrap();
        let x: Vec<fgr> = (0..=nx).map(|i| i as fgr).collect();
        let grid = builders::cartesian(&x, &[0.0, 1.0], vec![0.0, 1.0], &topology).unwrap();
        let mut dataset = OceanDataset::new(topology, grid, None, LocatorConfig::default()).unwrap();
        let mut u = Array3::from_elem((1, 1, nx + 1), speed);
        u[[0, 0, 0]] = 0.0;
        u[[0, 0, nx]] = 0.0;
        let field = FaceVectorField::new(
            "velocity",
            FaceQuantity::Velocity,
            vec![FaceComponents {
                u: vec![u],
                v: vec![Array3::zeros((1, 2, nx))],
                w: None,
            }],
            dataset.topology(),
        )
        .unwrap();
        dataset.add_vector_field(field).unwrap();
        dataset.set_velocity("velocity").unwrap();
        let x_center: Vec<f64> = (0..nx).map(|i| i as f64 + 0.5).collect();
        let theta = Array3::from_shape_vec((1, 1, nx), x_center).unwrap();
        dataset
            .add_scalar_field(ScalarField::steady("x", vec![theta], dataset.topology()).unwrap())
            .unwrap();
        dataset
    }

    #[test]
    fn particle_moves_with_uniform_flow() {
        let dataset = channel(6, 1.0);
        let start = dataset.locate(1.5, 0.5, 0.5, 0.0).unwrap();
        let mut particles = ParticleSet::new(vec![start]);
        let output = particles
            .track(
                &dataset,
                &TrackingRequest::new(vec![1.0, 2.5]),
                &TrackingConfig::default(),
                |_| false,
            )
            .unwrap();
        let trajectory = output.trajectory_of(0);
        assert_abs_diff_eq!(trajectory[0].lon, 2.5, epsilon = 1e-12);
        assert_abs_diff_eq!(trajectory[1].lon, 4.0, epsilon = 1e-12);
        assert_eq!(trajectory[1].time, 2.5);
        assert_eq!(particles.statuses(), &[ParticleStatus::FinalTimeReached]);
    }

    #[test]
    fn backward_tracking_retraces_forward_path() {
        let dataset = channel(6, 1.0);
        let start = dataset.locate(4.25, 0.5, 0.5, 0.0).unwrap();
        let mut particles = ParticleSet::new(vec![start]);
        let output = particles
            .track(
                &dataset,
                &TrackingRequest::new(vec![-1.0, -2.0]),
                &TrackingConfig::default(),
                |_| false,
            )
            .unwrap();
        let trajectory = output.trajectory_of(0);
        assert_abs_diff_eq!(trajectory[0].lon, 3.25, epsilon = 1e-12);
        assert_abs_diff_eq!(trajectory[1].lon, 2.25, epsilon = 1e-12);
        assert_eq!(trajectory[1].time, -2.0);
    }

    #[test]
    fn predicate_stops_particle_after_crossing() {
        let dataset = channel(6, 1.0);
        let start = dataset.locate(0.5, 0.5, 0.5, 0.0).unwrap();
        let mut particles = ParticleSet::new(vec![start]);
        let output = particles
            .track(
                &dataset,
                &TrackingRequest::new(vec![10.0]),
                &TrackingConfig::default(),
                |position| position.i >= 3,
            )
            .unwrap();
        let state = output.snapshots[0].particle(0).unwrap();
        assert_eq!(state.status, ParticleStatus::StoppedByPredicate);
        assert_eq!(state.position.i, 3);
        assert_abs_diff_eq!(state.position.lon, 3.0, epsilon = 1e-12);
        // Exponential acceleration out of the first cell takes ln 2
        assert_abs_diff_eq!(state.position.time, 2.0 + 2.0_f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn omitted_particles_disappear_after_stopping() {
        let dataset = channel(4, 1.0);
        let positions = vec![
            dataset.locate(0.5, 0.5, 0.5, 0.0).unwrap(),
            dataset.locate(2.5, 0.5, 0.5, 0.0).unwrap(),
        ];
        let mut particles = ParticleSet::new(positions);
        let config = TrackingConfig {
            stopped_output: StoppedOutputPolicy::Omit,
            ..TrackingConfig::default()
        };
        let output = particles
            .track(
                &dataset,
                &TrackingRequest::new(vec![0.25, 5.0]),
                &config,
                |position| position.lon >= 3.0 - 1e-9,
            )
            .unwrap();
        assert_eq!(output.snapshots[0].particles.len(), 2);
        let last = &output.snapshots[1];
        assert_eq!(last.particles.len(), 0);
        assert_eq!(
            particles.status_counts(),
            StatusCounts {
                stopped_by_predicate: 2,
                ..StatusCounts::default()
            }
        );
    }

    #[test]
    fn particle_in_still_cell_is_stuck() {
        let dataset = channel(3, 0.0);
        let start = dataset.locate(1.5, 0.5, 0.5, 0.0).unwrap();
        let mut particles = ParticleSet::new(vec![start]);
        let output = particles
            .track(
                &dataset,
                &TrackingRequest::new(vec![1.0]),
                &TrackingConfig::default(),
                |_| false,
            )
            .unwrap();
        let state = output.snapshots[0].particle(0).unwrap();
        assert_eq!(state.status, ParticleStatus::Stuck);
        assert_eq!(state.position.time, 0.0);
    }

    #[test]
    fn crossings_and_samples_are_recorded() {
        let dataset = channel(6, 1.0);
        let start = dataset.locate(0.5, 0.5, 0.5, 0.0).unwrap();
        let mut particles = ParticleSet::new(vec![start]);
        let config = TrackingConfig {
            record_crossings: true,
            ..TrackingConfig::default()
        };
        let request = TrackingRequest::new(vec![2.0])
            .with_sampled_fields(InterpolationKernel::default(), ["x"]);
        let output = particles.track(&dataset, &request, &config, |_| false).unwrap();
        let crossings = output.crossings.unwrap();
        assert_eq!(crossings.len(), 1);
        let lons: Vec<f64> = crossings[0].positions.iter().map(|p| p.lon).collect();
        assert_eq!(lons.len(), 2);
        assert_abs_diff_eq!(lons[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(lons[1], 2.0, epsilon = 1e-12);
        let samples = output.snapshots[0].samples_of("x").unwrap();
        assert_abs_diff_eq!(samples[0].unwrap(), 3.0 - 2.0_f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn crossing_budget_marks_particle_stuck() {
        let dataset = channel(6, 1.0);
        let start = dataset.locate(0.5, 0.5, 0.5, 0.0).unwrap();
        let mut particles = ParticleSet::new(vec![start]);
        let config = TrackingConfig {
            max_crossings_per_interval: 2,
            ..TrackingConfig::default()
        };
        particles
            .track(&dataset, &TrackingRequest::new(vec![4.0]), &config, |_| false)
            .unwrap();
        assert_eq!(particles.statuses(), &[ParticleStatus::Stuck]);
        assert_eq!(particles.positions()[0].i, 3);
    }

    #[test]
    fn subset_keeps_identifiers() {
        let dataset = channel(4, 1.0);
        let (particles, failures) = ParticleSet::seed(
            &dataset,
            &[[0.5, 0.5, 0.5], [9.0, 0.5, 0.5], [2.5, 0.5, 0.5]],
            0.0,
            &Verbosity::Quiet,
        );
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, 1);
        assert_eq!(particles.ids(), &[0, 2]);
        let subset = particles.subset(|position, _| position.lon > 1.0);
        assert_eq!(subset.ids(), &[2]);
    }
}
