//! The `seatrace` crate provides analytic Lagrangian particle tracking and
//! point interpolation on curvilinear ocean-model grids.
pub mod dataset;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod index;
pub mod interpolation;
pub mod io;
pub mod num;
pub mod stepping;
pub mod topology;
pub mod tracking;
pub mod velocity;
