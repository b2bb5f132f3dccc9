#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
// #![warn(clippy::cargo)]

//! Robust statistics for vertex reconstruction studies
//!
//! The core is an iterative, outlier-rejecting Gaussian fit for residual and pull
//! distributions, and a weighted straight-line fit with a chi-square p-value.
//!
//! ```
//! use vertex_stats::{line_fit, robust_gauss_fit, robust_std};
//!
//! let sample: Vec<f64> = (0..10).map(f64::from).collect();
//! let estimate = robust_gauss_fit(&sample);
//! assert_eq!(robust_std(&sample), estimate.sigma());
//!
//! let x = [0., 1., 2., 3.];
//! let y = [1., 3., 5., 7.];
//! let fit = line_fit(&x, &y, &[1.; 4]).unwrap();
//! assert!((fit.slope() - 2.).abs() < 1e-10);
//! ```

// Links OpenBLAS, which provides the LAPACK routines behind `ndarray-linalg`
extern crate blas_src;

pub mod binned;
pub mod config;
pub(crate) mod distributions;
mod error;
pub(crate) mod histogram;
pub mod linefit;
pub(crate) mod math;
pub(crate) mod minimisation;
pub mod robust;

pub use binned::{binned_robust_sigma, BinnedProfile};
pub use config::RobustFitConfig;
pub use error::Error;
pub use linefit::{line_fit, replace_zero_uncertainties, LineFitResult};
pub use robust::{EstimateSource, GaussianEstimate, RobustGaussianEstimator};

pub type Result<T> = ::std::result::Result<T, Error>;

/// Robust Gaussian fit of `sample` with the default configuration
///
/// See [`RobustGaussianEstimator`]. An empty sample yields `(0, 0)` with zero covariance.
#[must_use]
pub fn robust_gauss_fit(sample: &[f64]) -> GaussianEstimate {
    RobustGaussianEstimator::default().fit(sample)
}

/// Robust width of `sample`
#[must_use]
pub fn robust_std(sample: &[f64]) -> f64 {
    robust_gauss_fit(sample).sigma()
}

/// Standard error of the robust width of `sample`
///
/// Zero whenever the fit fell back to naive moments.
#[must_use]
pub fn robust_std_std(sample: &[f64]) -> f64 {
    robust_gauss_fit(sample).sigma_std_error()
}
