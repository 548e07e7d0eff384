//! Interpolation weights for gridded data.

pub mod stencil;

use std::fmt;

/// Floating-point precision to use for interpolation.
#[allow(non_camel_case_types)]
pub type fip = f64;

/// Order of the interpolation kernel along one dimension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KernelOrder {
    /// The single closest sample.
    Nearest,
    /// Linear interpolation between the two enclosing samples.
    Linear,
    /// Uniform cubic B-spline over the four closest samples.
    ///
    /// The weights are non-negative and twice continuously differentiable in
    /// the query coordinate, at the cost of smoothing the sampled values.
    Cubic,
}

impl KernelOrder {
    /// Number of samples the kernel covers along one dimension.
    pub fn width(self) -> usize {
        match self {
            Self::Nearest => 1,
            Self::Linear => 2,
            Self::Cubic => 4,
        }
    }

    /// Computes the one-dimensional weights for the given position.
    ///
    /// # Parameters
    ///
    /// - `location`: Where the samples are located within their cells.
    /// - `frac`: Fractional coordinate of the query within its cell, in `[0, 1]`.
    ///
    /// # Returns
    ///
    /// The sample offsets relative to the cell containing the query, with their weights.
    /// For `Face` located samples, offset `o` refers to the lower face of cell `o`.
    pub fn weights_1d(self, location: SampleLocation, frac: fip) -> Vec<(i64, fip)> {
        let relative = match location {
            SampleLocation::Center => frac - 0.5,
            SampleLocation::Face => frac,
        };
        match self {
            Self::Nearest => vec![((relative + 0.5).floor() as i64, 1.0)],
            Self::Linear => {
                let base = relative.floor();
                let t = relative - base;
                let base = base as i64;
                vec![(base, 1.0 - t), (base + 1, t)]
            }
            Self::Cubic => {
                let base = relative.floor();
                let t = relative - base;
                let base = base as i64;
                let (t2, t3) = (t * t, t * t * t);
                let one_minus_t = 1.0 - t;
                vec![
                    (base - 1, one_minus_t * one_minus_t * one_minus_t / 6.0),
                    (base, (3.0 * t3 - 6.0 * t2 + 4.0) / 6.0),
                    (base + 1, (-3.0 * t3 + 3.0 * t2 + 3.0 * t + 1.0) / 6.0),
                    (base + 2, t3 / 6.0),
                ]
            }
        }
    }
}

impl fmt::Display for KernelOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Nearest => "nearest",
                Self::Linear => "linear",
                Self::Cubic => "cubic",
            }
        )
    }
}

/// Location of the samples of a field within the grid cells, along one dimension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleLocation {
    Center,
    /// On the cell face at the lower end of the dimension.
    Face,
}

/// Sample locations of a field along each spatial dimension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldLayout {
    pub x: SampleLocation,
    pub y: SampleLocation,
    pub z: SampleLocation,
}

impl FieldLayout {
    /// Layout of tracers and other cell-centered data.
    pub fn centered() -> Self {
        Self {
            x: SampleLocation::Center,
            y: SampleLocation::Center,
            z: SampleLocation::Center,
        }
    }

    /// Layout of the x-component of a staggered vector.
    pub fn x_face() -> Self {
        Self {
            x: SampleLocation::Face,
            ..Self::centered()
        }
    }

    /// Layout of the y-component of a staggered vector.
    pub fn y_face() -> Self {
        Self {
            y: SampleLocation::Face,
            ..Self::centered()
        }
    }

    /// Layout of the vertical component of a staggered vector.
    pub fn z_face() -> Self {
        Self {
            z: SampleLocation::Face,
            ..Self::centered()
        }
    }
}

/// Kernel orders to use along the horizontal, vertical and temporal dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InterpolationKernel {
    pub horizontal: KernelOrder,
    pub vertical: KernelOrder,
    pub temporal: KernelOrder,
}

impl InterpolationKernel {
    /// Creates a kernel using the given order in space and linear interpolation in time.
    pub fn new(order: KernelOrder) -> Self {
        Self {
            horizontal: order,
            vertical: order,
            temporal: KernelOrder::Linear,
        }
    }

    pub fn with_vertical(mut self, order: KernelOrder) -> Self {
        self.vertical = order;
        self
    }

    pub fn with_temporal(mut self, order: KernelOrder) -> Self {
        self.temporal = order;
        self
    }
}

impl Default for InterpolationKernel {
    fn default() -> Self {
        Self::new(KernelOrder::Linear)
    }
}
