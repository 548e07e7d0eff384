//! Status reporting and output utilities.

pub mod utils;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::fmt;

/// Template used for progress bars unless another style is supplied.
pub const DEFAULT_PROGRESS_TEMPLATE: &str = "Progress: {bar:40}  {percent}% | ETA: {eta}";

/// How much non-critical status information to report.
#[derive(Clone)]
pub enum Verbosity {
    Quiet,
    Messages,
    Progress(ProgressStyle),
}

impl Verbosity {
    /// Creates a verbosity level showing progress bars with the default style.
    pub fn with_default_progress() -> Self {
        Self::Progress(
            ProgressStyle::with_template(DEFAULT_PROGRESS_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        )
    }

    /// Whether status messages should be printed.
    pub fn print_messages(&self) -> bool {
        !matches!(self, Self::Quiet)
    }

    /// Creates a progress bar for the given number of items, which is hidden
    /// unless progress reporting is enabled.
    pub fn create_progress_bar(&self, length: usize) -> ProgressBar {
        match self {
            Self::Progress(style) => ProgressBar::new(length as u64).with_style(style.clone()),
            _ => ProgressBar::with_draw_target(Some(length as u64), ProgressDrawTarget::hidden()),
        }
    }
}

impl fmt::Debug for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Progress styles carry no printable representation
        match self {
            Self::Quiet => f.write_str("Quiet"),
            Self::Messages => f.write_str("Messages"),
            Self::Progress(_) => f.write_str("Progress(..)"),
        }
    }
}

impl Default for Verbosity {
    fn default() -> Self {
        Self::Quiet
    }
}
