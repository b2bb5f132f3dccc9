use argmin::core::observers::{ObserverMode, SlogLogger};
use argmin::core::{Executor, Jacobian, Operator, State};
use argmin::solver::gaussnewton::GaussNewtonLS;
use argmin::solver::linesearch::MoreThuenteLineSearch;
use ndarray::{array, Array1, Array2};
use ndarray_linalg::Inverse;

use crate::distributions::NormalDistribution;
use crate::histogram::DensityHistogram;
use crate::{Error, Result};

/// Least-squares problem matching a Gaussian density to a binned density estimate
///
/// The parameter vector is $\left[\mu, \sigma\right]$. Residuals are the model density at each
/// bin centre minus the observed density in that bin.
#[derive(Clone, Debug)]
pub(crate) struct GaussianProblem {
    centers: Vec<f64>,
    densities: Vec<f64>,
}

/// A converged binned fit
#[derive(Clone, Debug)]
pub(crate) struct Solution {
    pub(crate) distribution: NormalDistribution<f64>,
    pub(crate) covariance: Array2<f64>,
}

/// Solver settings for a single binned fit
#[derive(Clone, Copy, Debug)]
pub(crate) struct SolverSettings {
    pub(crate) max_iters: u64,
    pub(crate) tolerance: f64,
    /// Attach argmin's terminal logger to the run
    pub(crate) log_iterations: bool,
}

impl GaussianProblem {
    pub(crate) fn from_histogram(histogram: &DensityHistogram) -> Self {
        Self {
            centers: histogram.centers(),
            densities: histogram.densities().to_vec(),
        }
    }

    fn distribution(params: &Array1<f64>) -> NormalDistribution<f64> {
        NormalDistribution {
            mean: params[0],
            standard_deviation: params[1],
        }
    }

    fn compute(&self, params: &Array1<f64>) -> Array1<f64> {
        let distribution = Self::distribution(params);
        self.centers
            .iter()
            .zip(&self.densities)
            .map(|(&x, &observed)| distribution.pdf(x) - observed)
            .collect()
    }

    /// Run the optimisation from `initial`
    ///
    /// Gauss-Newton with a More-Thuente line search. A run that uses up `settings.max_iters`
    /// is a failure. The covariance follows the convention of an unweighted curve fit: the
    /// inverse of $J^T J$ scaled by the residual variance $\chi^2 / (n - 2)$.
    pub(crate) fn solve(
        self,
        initial: NormalDistribution<f64>,
        settings: SolverSettings,
    ) -> Result<Solution> {
        let num_bins = self.centers.len();
        if num_bins <= 2 {
            return Err(Error::FitConvergenceFailure(format!(
                "{num_bins} bins leave no degrees of freedom"
            )));
        }

        let (mean, sigma) = (initial.mean(), initial.standard_deviation());
        if !(mean.is_finite() && sigma.is_finite()) || sigma <= 0.0 {
            return Err(Error::FitConvergenceFailure(format!(
                "cannot seed a fit with mean {mean} and sigma {sigma}"
            )));
        }

        let linesearch = MoreThuenteLineSearch::new()
            .with_bounds(0.0, 1.0)
            .map_err(solver_error)?;
        let solver = GaussNewtonLS::new(linesearch)
            .with_tolerance(settings.tolerance)
            .map_err(solver_error)?;

        let mut executor = Executor::new(self.clone(), solver)
            .configure(|state| state.param(array![mean, sigma]).max_iters(settings.max_iters));
        if settings.log_iterations {
            executor = executor.add_observer(SlogLogger::term(), ObserverMode::Always);
        }
        let res = executor.run().map_err(solver_error)?;

        let state = res.state();
        if state.get_iter() >= state.get_max_iters() {
            return Err(Error::FitConvergenceFailure(format!(
                "no convergence after {} iterations",
                state.get_iter()
            )));
        }
        let params = state
            .get_best_param()
            .cloned()
            .ok_or_else(|| Error::FitConvergenceFailure("solver returned no parameters".into()))?;

        if !params.iter().all(|p| p.is_finite()) || params[1] <= 0.0 {
            return Err(Error::FitConvergenceFailure(format!(
                "unphysical parameters mean {} sigma {}",
                params[0], params[1]
            )));
        }

        let covariance = self.covariance(&params)?;

        Ok(Solution {
            distribution: Self::distribution(&params),
            covariance,
        })
    }

    fn covariance(&self, params: &Array1<f64>) -> Result<Array2<f64>> {
        let jacobian = self.jacobian(params).map_err(solver_error)?;
        let residuals = self.apply(params).map_err(solver_error)?;

        let curvature = jacobian.t().dot(&jacobian);
        let inverse = curvature.inv().map_err(|e| {
            Error::FitConvergenceFailure(format!("covariance of the parameters is singular: {e}"))
        })?;

        let dof = (self.centers.len() - 2) as f64;
        let residual_variance = residuals.dot(&residuals) / dof;
        let covariance = inverse * residual_variance;

        if covariance.iter().all(|c| c.is_finite()) {
            Ok(covariance)
        } else {
            Err(Error::FitConvergenceFailure(
                "covariance of the parameters is not finite".into(),
            ))
        }
    }
}

fn solver_error(error: argmin::core::Error) -> Error {
    Error::FitConvergenceFailure(error.to_string())
}

impl Operator for GaussianProblem {
    type Param = Array1<f64>;
    type Output = Array1<f64>;

    fn apply(&self, p: &Self::Param) -> ::std::result::Result<Self::Output, argmin::core::Error> {
        Ok(self.compute(p))
    }
}

impl Jacobian for GaussianProblem {
    type Param = Array1<f64>;
    type Jacobian = Array2<f64>;

    fn jacobian(
        &self,
        p: &Self::Param,
    ) -> ::std::result::Result<Self::Jacobian, argmin::core::Error> {
        let distribution = Self::distribution(p);
        let mut jacobian = Array2::zeros((self.centers.len(), 2));
        for (ii, &x) in self.centers.iter().enumerate() {
            let [d_mean, d_sigma] = distribution.pdf_gradient(x);
            jacobian[[ii, 0]] = d_mean;
            jacobian[[ii, 1]] = d_sigma;
        }
        Ok(jacobian)
    }
}
