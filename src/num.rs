//! Utilities related to numbers.

use std::fmt;

/// Floating point marker trait for field data.
///
/// Field values may be stored in single or double precision, but are always
/// converted to `f64` before taking part in tracking arithmetic.
pub trait BFloat:
    Sync
    + Send
    + num::Float
    + num::cast::FromPrimitive
    + ieee754::Ieee754
    + Into<f64>
    + fmt::Debug
    + 'static
{
}

impl BFloat for f32 {}
impl BFloat for f64 {}
