use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Number of fit-then-clip passes made by the robust estimator
pub const DEFAULT_ITERATIONS: usize = 3;
/// Half-width, in units of the fitted sigma, of the window kept after each pass
pub const DEFAULT_CLIP_SIGMAS: f64 = 3.0;
/// Half-width, in units of the naive standard deviation, of the histogram range
pub const DEFAULT_HISTOGRAM_SIGMAS: f64 = 3.0;
/// Smallest sample for which a binned fit is attempted
pub const DEFAULT_MIN_FIT_POINTS: usize = 20;
/// Floor applied to `floor(sqrt(n))` when choosing the number of histogram bins
pub const DEFAULT_MIN_BINS: usize = 1;
/// Iteration cap handed to the Gauss-Newton solver
pub const DEFAULT_MAX_SOLVER_ITERS: u64 = 100;
/// Solver stops once successive costs differ by less than this, the square root of `f64::EPSILON`
pub const DEFAULT_SOLVER_TOLERANCE: f64 = 1.490_116_119_384_765_6e-8;

/// Tunables of the robust Gaussian estimator
///
/// Every field has a default, so a configuration file only needs to name the values it
/// overrides:
///
/// ```toml
/// iterations = 5
/// clip_sigmas = 2.5
/// ```
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RobustFitConfig {
    pub iterations: usize,
    pub clip_sigmas: f64,
    pub histogram_sigmas: f64,
    pub min_fit_points: usize,
    pub min_bins: usize,
    pub max_solver_iters: u64,
    pub solver_tolerance: f64,
    /// Print every solver iteration to the terminal
    pub log_solver_iterations: bool,
}

impl Default for RobustFitConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            clip_sigmas: DEFAULT_CLIP_SIGMAS,
            histogram_sigmas: DEFAULT_HISTOGRAM_SIGMAS,
            min_fit_points: DEFAULT_MIN_FIT_POINTS,
            min_bins: DEFAULT_MIN_BINS,
            max_solver_iters: DEFAULT_MAX_SOLVER_ITERS,
            solver_tolerance: DEFAULT_SOLVER_TOLERANCE,
            log_solver_iterations: false,
        }
    }
}

impl RobustFitConfig {
    /// Parse a configuration from TOML text
    ///
    /// # Errors
    /// Returns an error if the text is not valid TOML or a field has the wrong type.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Read a configuration from a TOML file on disk
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or does not parse.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Number of histogram bins used for a sample of `len` points
    #[must_use]
    pub fn bins_for(&self, len: usize) -> usize {
        // Truncating square root, as the analysis scripts always did
        let bins = (len as f64).sqrt().floor() as usize;
        bins.max(self.min_bins).max(1)
    }
}
