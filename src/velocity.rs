//! Reconstruction of the velocity field inside a grid cell.

use crate::{
    geometry::Dim3::{self, X, Y, Z},
    tracking::ftr,
};

/// Normal rates of change of the fractional coordinates on the lower and
/// upper faces of a cell, in fractional units per unit time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceRates {
    pub lower: [ftr; 3],
    pub upper: [ftr; 3],
    /// Whether motion along each dimension is resolved at all.
    pub active: [bool; 3],
}

impl FaceRates {
    /// Creates face rates for a cell where nothing moves.
    pub fn still() -> Self {
        Self {
            lower: [0.0; 3],
            upper: [0.0; 3],
            active: [false; 3],
        }
    }

    /// Linearly interpolates between two sets of face rates.
    pub fn lerp(&self, other: &Self, weight: ftr) -> Self {
        let mix = |a: [ftr; 3], b: [ftr; 3]| {
            [
                a[0] + (b[0] - a[0]) * weight,
                a[1] + (b[1] - a[1]) * weight,
                a[2] + (b[2] - a[2]) * weight,
            ]
        };
        Self {
            lower: mix(self.lower, other.lower),
            upper: mix(self.upper, other.upper),
            active: self.active,
        }
    }
}

/// Velocity inside a cell, varying linearly along each fractional coordinate
/// between the values on the lower and upper faces.
///
/// Along dimension `d`, the rate of change of the fractional coordinate `x`
/// is `a[d] * x + b[d]`, valid for `x` in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellVelocityField {
    a: [ftr; 3],
    b: [ftr; 3],
    active: [bool; 3],
}

impl CellVelocityField {
    /// Reconstructs the cell velocity from the normal rates on its faces.
    pub fn from_face_rates(rates: &FaceRates) -> Self {
        let mut a = [0.0; 3];
        let mut b = [0.0; 3];
        for dim in Dim3::slice() {
            let d = dim as usize;
            if rates.active[d] {
                a[d] = rates.upper[d] - rates.lower[d];
                b[d] = rates.lower[d];
            }
        }
        Self {
            a,
            b,
            active: rates.active,
        }
    }

    /// Creates a field where nothing moves, as in land cells.
    pub fn still() -> Self {
        Self::from_face_rates(&FaceRates::still())
    }

    /// Returns the field with the direction of motion reversed, for tracking backward in time.
    pub fn reversed(&self) -> Self {
        Self {
            a: self.a.map(|a| -a),
            b: self.b.map(|b| -b),
            active: self.active,
        }
    }

    /// Returns the coefficients `(a, b)` along the given dimension.
    pub fn coefficients(&self, dim: Dim3) -> (ftr, ftr) {
        (self.a[dim as usize], self.b[dim as usize])
    }

    pub fn is_active(&self, dim: Dim3) -> bool {
        self.active[dim as usize]
    }

    /// Rate of change of the fractional coordinate along `dim` at fractional coordinate `x`.
    pub fn rate(&self, dim: Dim3, x: ftr) -> ftr {
        let (a, b) = self.coefficients(dim);
        a * x + b
    }

    /// Divergence in fractional space, equal to the net outflow per unit cell volume.
    pub fn divergence(&self) -> ftr {
        self.a[X as usize] + self.a[Y as usize] + self.a[Z as usize]
    }
}
