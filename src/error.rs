//! Error types.

use crate::topology::Edge;
use std::io;
use thiserror::Error;

/// Malformed grid connectivity detected while building a topology.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum TopologyError {
    #[error("Edge {edge} of face {face} has no registered neighbor")]
    MissingNeighbor { face: usize, edge: Edge },
    #[error("Edge {edge} of face {face} links to nonexistent face {neighbor_face}")]
    UnknownFace {
        face: usize,
        edge: Edge,
        neighbor_face: usize,
    },
    #[error(
        "Link from face {face} edge {edge} to face {neighbor_face} edge {neighbor_edge} is not reciprocated"
    )]
    Asymmetric {
        face: usize,
        edge: Edge,
        neighbor_face: usize,
        neighbor_edge: Edge,
    },
    #[error(
        "Edge {edge} of face {face} has length {length} but is linked to an edge of length {neighbor_length}"
    )]
    LengthMismatch {
        face: usize,
        edge: Edge,
        length: usize,
        neighbor_length: usize,
    },
    #[error("Face {face} has shape {shape:?}, but all dimensions must be nonzero")]
    EmptyFace { face: usize, shape: (usize, usize) },
    #[error("Land mask for face {face} has shape {found:?}, expected {expected:?}")]
    MaskShape {
        face: usize,
        found: Vec<usize>,
        expected: Vec<usize>,
    },
    #[error("Expected {expected} faces, got {found}")]
    FaceCount { expected: usize, found: usize },
}

/// A query position that could not be located inside the domain.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum OutOfDomainError {
    #[error("Position ({lon}, {lat}) lies outside all grid faces")]
    Horizontal { lon: f64, lat: f64 },
    #[error("Location of ({lon}, {lat}) did not converge within {steps} cell steps")]
    WalkBudgetExceeded { lon: f64, lat: f64, steps: usize },
    #[error("Depth {depth} lies outside the vertical extent [{top}, {bottom}]")]
    Vertical { depth: f64, top: f64, bottom: f64 },
    #[error("Time {time} lies outside the time axis [{start}, {end}]")]
    Temporal { time: f64, start: f64, end: f64 },
}

/// Inconsistent or missing data supplied to a dataset.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum DatasetError {
    #[error("Field {name} has shape {found:?} on face {face}, expected {expected:?}")]
    FieldShape {
        name: String,
        face: usize,
        found: Vec<usize>,
        expected: Vec<usize>,
    },
    #[error("Field {name} has {found} time snapshots, expected {expected}")]
    SnapshotCount {
        name: String,
        found: usize,
        expected: usize,
    },
    #[error("No field named {0}")]
    UnknownField(String),
    #[error("A field named {0} already exists")]
    DuplicateField(String),
    #[error("Time axis must be strictly increasing")]
    NonMonotonicTime,
    #[error("Depth interfaces must start at zero and be strictly increasing")]
    InvalidDepths,
    #[error("Velocity components {0:?} are missing")]
    MissingVelocity(Vec<String>),
    #[error("Coordinate array for face {face} has shape {found:?}, expected {expected:?}")]
    CoordinateShape {
        face: usize,
        found: Vec<usize>,
        expected: Vec<usize>,
    },
    #[error("Cell (face {face}, j {j}, i {i}) has non-positive area or edge length")]
    DegenerateCell { face: usize, j: usize, i: usize },
    #[error(
        "Edge {edge} of face {face} is glued to an upper edge, so its face values cannot be completed from lower-face data"
    )]
    UpperEdgeSeam { face: usize, edge: Edge },
    #[error(transparent)]
    Topology(#[from] TopologyError),
}

/// Any error produced by this crate.
#[derive(Debug, Error)]
pub enum SeatraceError {
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error(transparent)]
    OutOfDomain(#[from] OutOfDomainError),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    Io(#[from] io::Error),
}
