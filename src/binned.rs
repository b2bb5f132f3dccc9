use itertools::{Itertools, MinMaxResult};

use crate::histogram::{bin_index, linspace};
use crate::linefit::{line_fit, replace_zero_uncertainties, LineFitResult};
use crate::robust::RobustGaussianEstimator;
use crate::{Error, Result};

/// Robust width of a quantity in equal-width bins of a covariate
///
/// This is how resolutions and pull widths are profiled against vertex density or pile-up:
/// every bin gets its own robust Gaussian fit.
#[derive(Clone, Debug, PartialEq)]
pub struct BinnedProfile {
    edges: Vec<f64>,
    sigmas: Vec<f64>,
    sigma_errors: Vec<f64>,
    counts: Vec<usize>,
}

impl BinnedProfile {
    #[must_use]
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    #[must_use]
    pub fn centers(&self) -> Vec<f64> {
        self.edges
            .iter()
            .tuple_windows()
            .map(|(left, right)| 0.5 * (left + right))
            .collect()
    }

    #[must_use]
    pub fn sigmas(&self) -> &[f64] {
        &self.sigmas
    }

    #[must_use]
    pub fn sigma_errors(&self) -> &[f64] {
        &self.sigma_errors
    }

    /// Number of observations that fell into each bin
    #[must_use]
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    /// Fit a straight line to the per-bin widths against the bin centres
    ///
    /// Bins without a width uncertainty (empty, or too sparse for a binned fit) are given unit
    /// uncertainty first.
    ///
    /// # Errors
    /// Fails as [`line_fit`] does, notably for profiles of two or fewer bins.
    pub fn line_fit(&self) -> Result<LineFitResult> {
        let uncertainties = replace_zero_uncertainties(&self.sigma_errors);
        line_fit(&self.centers(), &self.sigmas, &uncertainties)
    }
}

/// Profile the robust width of `values` in `bins` equal-width bins of `covariate`
///
/// The bins span the observed range of the covariate, with the last bin closed on the right.
///
/// # Errors
/// `ProfileLengthMismatch` if the inputs differ in length, `EmptyInput` for no observations and
/// `InvalidBinCount` for zero bins.
pub fn binned_robust_sigma(
    covariate: &[f64],
    values: &[f64],
    bins: usize,
    estimator: &RobustGaussianEstimator,
) -> Result<BinnedProfile> {
    if covariate.len() != values.len() {
        return Err(Error::ProfileLengthMismatch {
            covariate: covariate.len(),
            values: values.len(),
        });
    }
    if bins == 0 {
        return Err(Error::InvalidBinCount);
    }

    let (mut lo, mut hi) = match covariate.iter().copied().minmax_by(f64::total_cmp) {
        MinMaxResult::NoElements => return Err(Error::EmptyInput),
        MinMaxResult::OneElement(x) => (x, x),
        MinMaxResult::MinMax(lo, hi) => (lo, hi),
    };
    if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }

    let mut grouped: Vec<Vec<f64>> = vec![Vec::new(); bins];
    for (&x, &value) in covariate.iter().zip(values) {
        if let Some(index) = bin_index(x, lo, hi, bins) {
            grouped[index].push(value);
        }
    }

    let estimates = grouped
        .iter()
        .map(|group| estimator.fit(group))
        .collect::<Vec<_>>();

    Ok(BinnedProfile {
        edges: linspace(lo, hi, bins + 1),
        sigmas: estimates.iter().map(|e| e.sigma()).collect(),
        sigma_errors: estimates.iter().map(|e| e.sigma_std_error()).collect(),
        counts: grouped.iter().map(Vec::len).collect(),
    })
}
