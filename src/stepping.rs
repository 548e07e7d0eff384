//! Analytic integration of particle motion through a single cell.

use crate::{
    geometry::Dim3,
    tracking::ftr,
    velocity::CellVelocityField,
};

/// Configuration parameters for the analytic stepper.
#[derive(Clone, Debug)]
pub struct StepperConfig {
    /// Rates of change of fractional coordinates with smaller magnitude are treated as zero.
    pub velocity_epsilon: ftr,
    /// Below this magnitude of the velocity gradient `a`, motion is treated as uniform.
    pub linear_threshold: ftr,
}

impl StepperConfig {
    pub const DEFAULT_VELOCITY_EPSILON: ftr = 1e-14;
    pub const DEFAULT_LINEAR_THRESHOLD: ftr = 1e-12;

    /// Panics if any of the configuration parameter values are invalid.
    pub fn validate(&self) {
        assert!(
            self.velocity_epsilon >= 0.0,
            "Velocity epsilon must be non-negative."
        );
        assert!(
            self.linear_threshold >= 0.0,
            "Linear threshold must be non-negative."
        );
    }
}

impl Default for StepperConfig {
    fn default() -> Self {
        Self {
            velocity_epsilon: Self::DEFAULT_VELOCITY_EPSILON,
            linear_threshold: Self::DEFAULT_LINEAR_THRESHOLD,
        }
    }
}

/// Result of advancing a particle within its cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StepOutcome {
    /// The particle reaches a face of the cell.
    Exit {
        /// Dimension normal to the exit face.
        dim: Dim3,
        /// Whether the exit face is the upper face along `dim`.
        upper: bool,
        /// Elapsed time until the exit.
        time: ftr,
        /// Fractional coordinates at the exit, exactly 0 or 1 along `dim`.
        frac: [ftr; 3],
    },
    /// The time budget runs out before the particle leaves the cell.
    Interior {
        /// Elapsed time, equal to the budget.
        time: ftr,
        /// Fractional coordinates after the elapsed time.
        frac: [ftr; 3],
    },
    /// The particle is at rest and can never leave the cell.
    Stuck,
}

/// Closed-form solver for the motion of a particle in a cell velocity field.
#[derive(Clone, Debug)]
pub struct AnalyticStepper {
    config: StepperConfig,
}

impl AnalyticStepper {
    /// Creates a new stepper with the given configuration.
    pub fn new(config: StepperConfig) -> Self {
        config.validate();
        Self { config }
    }

    pub fn config(&self) -> &StepperConfig {
        &self.config
    }

    /// Computes the time needed to go from `x` to `target` under `dx/dt = a*x + b`.
    ///
    /// # Returns
    ///
    /// `None` if the particle never reaches the target: when it moves away from
    /// it, is at rest, or approaches a stagnation point before the target.
    pub fn time_to_wall(&self, a: ftr, b: ftr, x: ftr, target: ftr) -> Option<ftr> {
        let initial_rate = a * x + b;
        if initial_rate.abs() <= self.config.velocity_epsilon {
            return None;
        }
        // Only the upper wall can be reached by moving in the positive direction
        let toward_upper = target >= 1.0;
        if (initial_rate > 0.0) != toward_upper {
            return None;
        }
        let final_rate = a * target + b;
        if final_rate * initial_rate <= 0.0 {
            return None;
        }
        let distance = target - x;
        let time = if a.abs() <= self.config.linear_threshold {
            distance / initial_rate
        } else {
            (a * distance / initial_rate).ln_1p() / a
        };
        if time.is_finite() {
            Some(time.max(0.0))
        } else {
            None
        }
    }

    /// Computes the position reached from `x` after time `t` under `dx/dt = a*x + b`.
    pub fn advance(&self, a: ftr, b: ftr, x: ftr, t: ftr) -> ftr {
        let initial_rate = a * x + b;
        if a.abs() <= self.config.linear_threshold {
            x + initial_rate * t
        } else {
            x + initial_rate * (a * t).exp_m1() / a
        }
    }

    /// Advances a particle at the given fractional coordinates until it
    /// leaves the cell or the time budget runs out.
    ///
    /// When the particle reaches several faces at the same time, the exit
    /// through the lowest dimension wins, and the lower face wins within a dimension.
    ///
    /// # Parameters
    ///
    /// - `field`: Velocity in the cell.
    /// - `frac`: Fractional coordinates of the particle.
    /// - `budget`: Maximum time to advance.
    ///
    /// # Returns
    ///
    /// The outcome of the step.
    pub fn step(&self, field: &CellVelocityField, frac: [ftr; 3], budget: ftr) -> StepOutcome {
        let mut earliest: Option<(Dim3, bool, ftr)> = None;
        for dim in Dim3::slice() {
            if !field.is_active(dim) {
                continue;
            }
            let (a, b) = field.coefficients(dim);
            for (upper, target) in [(false, 0.0), (true, 1.0)] {
                if let Some(time) = self.time_to_wall(a, b, frac[dim as usize], target) {
                    if earliest.map_or(true, |(_, _, earliest_time)| time < earliest_time) {
                        earliest = Some((dim, upper, time));
                    }
                }
            }
        }

        let (exit_dim, exit_upper, exit_time) = match earliest {
            Some(exit) => exit,
            None if self.is_at_rest(field, frac) => return StepOutcome::Stuck,
            // Drifting toward a stagnation point that is never reached
            None => {
                return StepOutcome::Interior {
                    time: budget,
                    frac: self.advance_all(field, frac, budget),
                }
            }
        };

        if exit_time > budget {
            StepOutcome::Interior {
                time: budget,
                frac: self.advance_all(field, frac, budget),
            }
        } else {
            let mut exit_frac = self.advance_all(field, frac, exit_time);
            exit_frac[exit_dim as usize] = if exit_upper { 1.0 } else { 0.0 };
            StepOutcome::Exit {
                dim: exit_dim,
                upper: exit_upper,
                time: exit_time,
                frac: exit_frac,
            }
        }
    }

    fn is_at_rest(&self, field: &CellVelocityField, frac: [ftr; 3]) -> bool {
        Dim3::slice().into_iter().all(|dim| {
            !field.is_active(dim)
                || field.rate(dim, frac[dim as usize]).abs() <= self.config.velocity_epsilon
        })
    }

    fn advance_all(&self, field: &CellVelocityField, frac: [ftr; 3], time: ftr) -> [ftr; 3] {
        let mut advanced = frac;
        for dim in Dim3::slice() {
            if field.is_active(dim) {
                let (a, b) = field.coefficients(dim);
                advanced[dim as usize] = self
                    .advance(a, b, frac[dim as usize], time)
                    .max(0.0)
                    .min(1.0);
            }
        }
        advanced
    }
}

impl Default for AnalyticStepper {
    fn default() -> Self {
        Self::new(StepperConfig::default())
    }
}
