//! Recorded states of tracked particles.

use super::{ftr, ParticleStatus};
use crate::{index::Position, interpolation::fip};
use std::collections::BTreeMap;

#[cfg(feature = "serialization")]
use serde::Serialize;
#[cfg(any(feature = "json", feature = "pickle"))]
use {
    crate::io::utils,
    std::{io, path::Path},
};

/// State of a single particle at an output time.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub struct ParticleState {
    /// Identifier of the particle, stable across subsets.
    pub id: usize,
    pub position: Position,
    pub status: ParticleStatus,
}

/// States of the particles at one requested output time.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub struct Snapshot {
    pub time: ftr,
    pub particles: Vec<ParticleState>,
    /// Values of the sampled scalar fields, aligned with `particles`.
    pub samples: BTreeMap<String, Vec<Option<fip>>>,
}

impl Snapshot {
    /// Finds the state of the particle with the given identifier.
    pub fn particle(&self, id: usize) -> Option<&ParticleState> {
        self.particles.iter().find(|state| state.id == id)
    }

    /// Returns the sampled values of the given field, if it was sampled.
    pub fn samples_of(&self, name: &str) -> Option<&[Option<fip>]> {
        self.samples.get(name).map(Vec::as_slice)
    }
}

/// Every cell crossing made by one particle during a run.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub struct CrossingRecord {
    pub id: usize,
    /// Positions right after entering each new cell.
    pub positions: Vec<Position>,
}

/// Result of a tracking run.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub struct TrackingOutput {
    /// One snapshot per requested output time, in request order.
    pub snapshots: Vec<Snapshot>,
    /// Recorded cell crossings, if requested.
    pub crossings: Option<Vec<CrossingRecord>>,
}

impl TrackingOutput {
    /// Collects the positions of the particle with the given identifier at
    /// each output time where it is present.
    pub fn trajectory_of(&self, id: usize) -> Vec<Position> {
        self.snapshots
            .iter()
            .filter_map(|snapshot| snapshot.particle(id).map(|state| state.position))
            .collect()
    }

    /// Serializes the output into JSON format and writes it to the given writer.
    #[cfg(feature = "json")]
    pub fn write_as_json<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        utils::write_data_as_json(writer, self)
    }

    /// Serializes the output into JSON format and saves it at the given path.
    #[cfg(feature = "json")]
    pub fn save_as_json<P: AsRef<Path>>(&self, output_file_path: P) -> io::Result<()> {
        utils::save_data_as_json(output_file_path, self)
    }

    /// Serializes the output into pickle format and writes it to the given writer.
    ///
    /// All the output is saved as a single pickled structure.
    #[cfg(feature = "pickle")]
    pub fn write_as_pickle<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        utils::write_data_as_pickle(writer, self)
    }

    /// Serializes the output into pickle format and saves it at the given path.
    ///
    /// All the output is saved as a single pickled structure.
    #[cfg(feature = "pickle")]
    pub fn save_as_pickle<P: AsRef<Path>>(&self, output_file_path: P) -> io::Result<()> {
        utils::save_data_as_pickle(output_file_path, self)
    }
}
