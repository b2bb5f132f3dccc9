use ndarray::Array2;

use crate::config::RobustFitConfig;
use crate::distributions::NormalDistribution;
use crate::histogram::DensityHistogram;
use crate::minimisation::{GaussianProblem, SolverSettings};
use crate::{Error, Result};

/// How a [`GaussianEstimate`] was obtained
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EstimateSource {
    /// Least-squares fit of the Gaussian density to a histogram of the sample
    BinnedFit,
    /// Sample mean and standard deviation, the binned fit was not possible
    NaiveMoments,
    /// The sample was empty before any estimate could be made
    Empty,
}

/// Mean and width of a Gaussian, with the covariance of the pair
///
/// The covariance is indexed `[mean, sigma]`. It is the zero matrix whenever the estimate does
/// not come from a fit, meaning no uncertainty information is available.
#[derive(Clone, Debug, PartialEq)]
pub struct GaussianEstimate {
    mean: f64,
    sigma: f64,
    covariance: Array2<f64>,
    source: EstimateSource,
}

impl GaussianEstimate {
    fn empty() -> Self {
        Self {
            mean: 0.0,
            sigma: 0.0,
            covariance: Array2::zeros((2, 2)),
            source: EstimateSource::Empty,
        }
    }

    fn naive(distribution: NormalDistribution<f64>) -> Self {
        Self {
            mean: distribution.mean(),
            sigma: distribution.standard_deviation(),
            covariance: Array2::zeros((2, 2)),
            source: EstimateSource::NaiveMoments,
        }
    }

    #[must_use]
    pub const fn mean(&self) -> f64 {
        self.mean
    }

    #[must_use]
    pub const fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Standard error of the mean, `sqrt(covariance[0, 0])`
    #[must_use]
    pub fn mean_std_error(&self) -> f64 {
        self.covariance[[0, 0]].sqrt()
    }

    /// Standard error of sigma, `sqrt(covariance[1, 1])`
    #[must_use]
    pub fn sigma_std_error(&self) -> f64 {
        self.covariance[[1, 1]].sqrt()
    }

    #[must_use]
    pub const fn covariance(&self) -> &Array2<f64> {
        &self.covariance
    }

    #[must_use]
    pub const fn source(&self) -> EstimateSource {
        self.source
    }

    fn distribution(&self) -> NormalDistribution<f64> {
        NormalDistribution {
            mean: self.mean,
            standard_deviation: self.sigma,
        }
    }
}

/// Iterative sigma-clipping Gaussian fit
///
/// Each pass fits the current sample, then drops every observation that is not strictly
/// inside `clip_sigmas` fitted sigmas of the fitted mean. Residual and pull distributions carry
/// long tails from mis-reconstructions, so the core width converges where a plain standard
/// deviation would not.
#[derive(Clone, Debug, Default)]
pub struct RobustGaussianEstimator {
    config: RobustFitConfig,
}

impl RobustGaussianEstimator {
    #[must_use]
    pub const fn new(config: RobustFitConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &RobustFitConfig {
        &self.config
    }

    /// Fit `sample`
    ///
    /// This never fails. An empty sample gives `(0, 0)` with zero covariance; a pass that cannot
    /// run the binned fit falls back to the naive moments of that pass.
    #[must_use]
    pub fn fit(&self, sample: &[f64]) -> GaussianEstimate {
        let mut estimate = GaussianEstimate::empty();
        let mut sample = sample.to_vec();

        for iteration in 0..self.config.iterations {
            let Some(naive) = NormalDistribution::from_sample(&sample) else {
                return estimate;
            };

            estimate = match self.binned_fit(&sample, naive) {
                Ok(fitted) => fitted,
                Err(reason) => {
                    tracing::debug!(
                        iteration,
                        points = sample.len(),
                        %reason,
                        "falling back to naive mean/std"
                    );
                    GaussianEstimate::naive(naive)
                }
            };
            tracing::trace!(
                iteration,
                mean = estimate.mean,
                sigma = estimate.sigma,
                "robust gaussian pass"
            );

            sample = clip(&sample, &estimate.distribution(), self.config.clip_sigmas);
        }

        estimate
    }

    /// Fit the Gaussian density to a histogram of `sample`, seeded with the naive moments
    ///
    /// # Errors
    /// `InsufficientData` for samples below the configured minimum, otherwise
    /// `FitConvergenceFailure` for any numerical failure of the fit.
    fn binned_fit(
        &self,
        sample: &[f64],
        naive: NormalDistribution<f64>,
    ) -> Result<GaussianEstimate> {
        if sample.len() < self.config.min_fit_points {
            return Err(Error::InsufficientData {
                required: self.config.min_fit_points,
                actual: sample.len(),
            });
        }

        let half_width = self.config.histogram_sigmas * naive.standard_deviation();
        let range = (naive.mean() - half_width, naive.mean() + half_width);
        let bins = self.config.bins_for(sample.len());

        let histogram = DensityHistogram::build(sample, bins, range).ok_or_else(|| {
            Error::FitConvergenceFailure(format!(
                "no observations inside histogram range {range:?}"
            ))
        })?;

        let settings = SolverSettings {
            max_iters: self.config.max_solver_iters,
            tolerance: self.config.solver_tolerance,
            log_iterations: self.config.log_solver_iterations,
        };
        let solution = GaussianProblem::from_histogram(&histogram).solve(naive, settings)?;

        Ok(GaussianEstimate {
            mean: solution.distribution.mean(),
            sigma: solution.distribution.standard_deviation(),
            covariance: solution.covariance,
            source: EstimateSource::BinnedFit,
        })
    }
}

/// Keep the observations strictly inside `width` standard deviations of the mean
pub(crate) fn clip(
    sample: &[f64],
    distribution: &NormalDistribution<f64>,
    width: f64,
) -> Vec<f64> {
    sample
        .iter()
        .copied()
        .filter(|&x| distribution.contains(x, width))
        .collect()
}
