use ndarray::{arr2, Array1, Array2, Axis};
use ndarray_linalg::Inverse;
use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::math::vandermonde;
use crate::{Error, Result};

/// Outcome of a weighted straight-line fit `y = slope * x + intercept`
#[derive(Clone, Debug, PartialEq)]
pub struct LineFitResult {
    slope: f64,
    intercept: f64,
    /// Indexed `[slope, intercept]`
    covariance: Array2<f64>,
    chi_square: f64,
    degrees_of_freedom: usize,
    p_value: f64,
}

impl LineFitResult {
    #[must_use]
    pub const fn slope(&self) -> f64 {
        self.slope
    }

    #[must_use]
    pub const fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Parameter covariance, ordered `[slope, intercept]`
    #[must_use]
    pub const fn covariance(&self) -> &Array2<f64> {
        &self.covariance
    }

    #[must_use]
    pub fn slope_std_error(&self) -> f64 {
        self.covariance[[0, 0]].sqrt()
    }

    #[must_use]
    pub fn intercept_std_error(&self) -> f64 {
        self.covariance[[1, 1]].sqrt()
    }

    #[must_use]
    pub const fn chi_square(&self) -> f64 {
        self.chi_square
    }

    #[must_use]
    pub const fn degrees_of_freedom(&self) -> usize {
        self.degrees_of_freedom
    }

    /// Probability of a chi-square at least as large as the one observed, were the line the
    /// true model
    #[must_use]
    pub const fn p_value(&self) -> f64 {
        self.p_value
    }

    /// The fitted line evaluated at `x`
    #[must_use]
    pub fn evaluate(&self, x: f64) -> f64 {
        self.slope.mul_add(x, self.intercept)
    }
}

/// Replace vanishing uncertainties with unity
///
/// Points whose uncertainty is exactly zero would otherwise carry infinite weight. The analysis
/// scripts apply this before every line fit, it is not done inside [`line_fit`].
#[must_use]
pub fn replace_zero_uncertainties(uncertainties: &[f64]) -> Vec<f64> {
    uncertainties
        .iter()
        .map(|&u| if u == 0.0 { 1.0 } else { u })
        .collect()
}

/// Weighted least-squares fit of a straight line
///
/// Each point is weighted by `1 / y_uncertainty^2`. The uncertainties are taken as absolute, so
/// the covariance is $(X^T W X)^{-1}$ without rescaling by the residuals. The p-value is that of
/// the chi-square with `n - 2` degrees of freedom.
///
/// # Errors
/// - `LengthMismatch` if the three inputs differ in length
/// - `InvalidUncertainty` for a zero or non-finite uncertainty
/// - `DegenerateRegression` for two or fewer points, or when every `x` is the same
pub fn line_fit(x: &[f64], y: &[f64], y_uncertainty: &[f64]) -> Result<LineFitResult> {
    if x.len() != y.len() || x.len() != y_uncertainty.len() {
        return Err(Error::LengthMismatch {
            x: x.len(),
            y: y.len(),
            uncertainty: y_uncertainty.len(),
        });
    }

    let num_points = x.len();
    if num_points <= 2 {
        return Err(Error::DegenerateRegression(format!(
            "{num_points} points leave no degrees of freedom for a line"
        )));
    }

    if let Some((index, &value)) = y_uncertainty
        .iter()
        .enumerate()
        .find(|(_, u)| **u == 0.0 || !u.is_finite())
    {
        return Err(Error::InvalidUncertainty { index, value });
    }

    // Identical abscissae would only differ from their mean by rounding
    if x.iter().all(|&xi| xi == x[0]) {
        return Err(Error::DegenerateRegression(
            "all x values are identical".into(),
        ));
    }

    let inverse_sigma: Array1<f64> = y_uncertainty.iter().map(|u| u.recip()).collect();
    let weights = inverse_sigma.mapv(|w| w * w);
    let total_weight = weights.sum();

    // Solve about the weighted centroid, so a large common offset in `x` or `y` does not
    // swamp the spread of the data
    let x_arr = Array1::from_iter(x.iter().copied());
    let y_arr = Array1::from_iter(y.iter().copied());
    let x_bar = weights.dot(&x_arr) / total_weight;
    let y_bar = weights.dot(&y_arr) / total_weight;
    let x_centred: Vec<f64> = x.iter().map(|xi| xi - x_bar).collect();

    let spread: f64 = x_centred
        .iter()
        .zip(&weights)
        .map(|(xi, w)| w * xi * xi)
        .sum();
    if !(spread > 0.0 && spread.is_finite()) {
        return Err(Error::DegenerateRegression(format!(
            "weighted spread of x is {spread}"
        )));
    }

    // Columns are [1, x - x_bar], so the solution is ordered [offset, slope]
    let design = vandermonde(&x_centred, 1) * &inverse_sigma.view().insert_axis(Axis(1));
    let target = y_arr.mapv(|yi| yi - y_bar) * &inverse_sigma;

    let normal_matrix = design.t().dot(&design);
    let inverse = normal_matrix.inv().map_err(|e| {
        Error::DegenerateRegression(format!("weighted design matrix is singular: {e}"))
    })?;
    let solution = inverse.dot(&design.t().dot(&target));
    let (offset, slope) = (solution[0], solution[1]);
    let intercept = slope.mul_add(-x_bar, y_bar + offset);

    let residuals = target - design.dot(&solution);
    let chi_square = residuals.dot(&residuals);
    let degrees_of_freedom = num_points - 2;

    let p_value = chi_square_p_value(chi_square, degrees_of_freedom)?;

    // intercept = offset - slope * x_bar, propagated to the [slope, intercept] ordering
    let slope_variance = inverse[[1, 1]];
    let cross = x_bar.mul_add(-slope_variance, inverse[[0, 1]]);
    let intercept_variance = (x_bar * x_bar).mul_add(
        slope_variance,
        (2. * x_bar).mul_add(-inverse[[0, 1]], inverse[[0, 0]]),
    );
    let covariance = arr2(&[[slope_variance, cross], [cross, intercept_variance]]);

    Ok(LineFitResult {
        slope,
        intercept,
        covariance,
        chi_square,
        degrees_of_freedom,
        p_value,
    })
}

fn chi_square_p_value(chi_square: f64, degrees_of_freedom: usize) -> Result<f64> {
    let distribution = ChiSquared::new(degrees_of_freedom as f64)
        .map_err(|e| Error::DegenerateRegression(e.to_string()))?;
    Ok((1.0 - distribution.cdf(chi_square)).clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use ndarray_rand::rand::SeedableRng;
    use ndarray_rand::rand_distr::{Distribution, Normal};
    use proptest::prelude::*;
    use rand_isaac::Isaac64Rng;

    use super::{chi_square_p_value, line_fit, replace_zero_uncertainties};
    use crate::Error;

    #[test]
    fn noiseless_line_is_recovered_with_unit_p_value() {
        let x: Vec<f64> = (0..10).map(f64::from).collect();
        let y: Vec<f64> = x.iter().map(|xi| 2. * xi + 1.).collect();
        let sigma = replace_zero_uncertainties(&vec![0.0; x.len()]);

        let fit = line_fit(&x, &y, &sigma).unwrap();

        approx::assert_relative_eq!(fit.slope(), 2.0, max_relative = 1e-10);
        approx::assert_relative_eq!(fit.intercept(), 1.0, max_relative = 1e-10);
        approx::assert_relative_eq!(fit.chi_square(), 0.0, epsilon = 1e-18);
        approx::assert_relative_eq!(fit.p_value(), 1.0, epsilon = 1e-9);
        assert_eq!(fit.degrees_of_freedom(), 8);
    }

    #[test]
    fn two_points_are_degenerate() {
        let result = line_fit(&[0., 1.], &[1., 3.], &[1., 1.]);
        assert!(matches!(result, Err(Error::DegenerateRegression(_))));
    }

    #[test]
    fn identical_abscissae_are_degenerate() {
        let result = line_fit(&[2., 2., 2., 2.], &[1., 2., 3., 4.], &[1., 1., 1., 1.]);
        assert!(matches!(result, Err(Error::DegenerateRegression(_))));
    }

    #[test]
    fn identical_large_abscissae_are_degenerate() {
        let x = [1e9 + 0.25; 5];
        let result = line_fit(&x, &[1., 2., 3., 4., 5.], &[0.1; 5]);
        assert!(matches!(result, Err(Error::DegenerateRegression(_))));
    }

    fn alternating_line(offset: f64) -> (Vec<f64>, Vec<f64>) {
        let x = (0..10).map(|ii| offset + f64::from(ii)).collect();
        let y = (0..10)
            .map(|ii| 2. * f64::from(ii) + 1. + if ii % 2 == 0 { 0.1 } else { -0.1 })
            .collect();
        (x, y)
    }

    #[test]
    fn large_common_offset_in_x_leaves_the_fit_unchanged() {
        let sigma = [0.1; 10];
        let (x, y) = alternating_line(0.0);
        let reference = line_fit(&x, &y, &sigma).unwrap();

        approx::assert_relative_eq!(
            reference.slope(),
            1.993_939_393_939_394,
            max_relative = 1e-12
        );
        approx::assert_relative_eq!(
            reference.chi_square(),
            9.696_969_696_969_7,
            max_relative = 1e-9
        );
        approx::assert_relative_eq!(reference.p_value(), 0.286_942, epsilon = 1e-5);

        for offset in [1e6, 1e8, 1e9] {
            let (x, y) = alternating_line(offset);
            let fit = line_fit(&x, &y, &sigma).unwrap();

            approx::assert_relative_eq!(fit.slope(), reference.slope(), max_relative = 1e-9);
            approx::assert_relative_eq!(
                fit.intercept(),
                reference.slope().mul_add(-offset, reference.intercept()),
                max_relative = 1e-12
            );
            approx::assert_relative_eq!(
                fit.chi_square(),
                reference.chi_square(),
                max_relative = 1e-9
            );
            approx::assert_relative_eq!(fit.p_value(), reference.p_value(), max_relative = 1e-9);
            approx::assert_relative_eq!(
                fit.slope_std_error(),
                reference.slope_std_error(),
                max_relative = 1e-9
            );
            approx::assert_relative_eq!(
                fit.evaluate(offset + 4.5),
                reference.evaluate(4.5),
                max_relative = 1e-6
            );
        }
    }

    #[test]
    fn heavily_uncertain_outlier_barely_moves_the_line() {
        let x = [0., 1., 2., 3., 4.];
        let y = [1., 3., 5., 7., 30.];
        let sigma = [1., 1., 1., 1., 1e3];

        let fit = line_fit(&x, &y, &sigma).unwrap();

        // Uncentred weighted normal equations, exact enough for abscissae this small
        let weights: Vec<f64> = sigma.iter().map(|s: &f64| s.powi(-2)).collect();
        let sum = |f: &dyn Fn(usize) -> f64| {
            (0..x.len())
                .map(|ii| weights[ii] * f(ii))
                .sum::<f64>()
        };
        let s = sum(&|_| 1.0);
        let sx = sum(&|ii| x[ii]);
        let sxx = sum(&|ii| x[ii] * x[ii]);
        let sy = sum(&|ii| y[ii]);
        let sxy = sum(&|ii| x[ii] * y[ii]);
        let determinant = s * sxx - sx * sx;

        approx::assert_relative_eq!(
            fit.slope(),
            (s * sxy - sx * sy) / determinant,
            max_relative = 1e-10
        );
        approx::assert_relative_eq!(
            fit.intercept(),
            (sxx * sy - sx * sxy) / determinant,
            max_relative = 1e-10
        );
        approx::assert_relative_eq!(fit.slope(), 2.000_010_5, max_relative = 1e-7);

        let covariance = fit.covariance();
        approx::assert_relative_eq!(covariance[[0, 0]], s / determinant, max_relative = 1e-10);
        approx::assert_relative_eq!(covariance[[1, 1]], sxx / determinant, max_relative = 1e-10);
        approx::assert_relative_eq!(covariance[[0, 1]], -sx / determinant, max_relative = 1e-10);

        // Equal weights would let the outlier drag the slope well away from two
        let unweighted = line_fit(&x, &y, &[1.; 5]).unwrap();
        assert!(unweighted.slope() > 5.0);
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let result = line_fit(&[0., 1., 2.], &[1., 3.], &[1., 1., 1.]);
        assert!(matches!(result, Err(Error::LengthMismatch { .. })));
    }

    #[test]
    fn zero_uncertainty_is_rejected() {
        let result = line_fit(&[0., 1., 2.], &[1., 3., 5.], &[1., 0., 1.]);
        assert!(matches!(
            result,
            Err(Error::InvalidUncertainty { index: 1, .. })
        ));
    }

    #[test]
    fn covariance_matches_closed_form_for_unit_weights() {
        let x = [0., 1., 2., 3.];
        let y = [1., 2.9, 5.2, 6.8];
        let fit = line_fit(&x, &y, &[1.; 4]).unwrap();

        // For unit weights: var(slope) = n / D, var(intercept) = Sxx / D, cov = -Sx / D
        let (n, sx, sxx) = (4., 6., 14.);
        let determinant = n * sxx - sx * sx;
        let covariance = fit.covariance();
        approx::assert_relative_eq!(covariance[[0, 0]], n / determinant, max_relative = 1e-12);
        approx::assert_relative_eq!(covariance[[1, 1]], sxx / determinant, max_relative = 1e-12);
        approx::assert_relative_eq!(covariance[[0, 1]], -sx / determinant, max_relative = 1e-12);
        approx::assert_relative_eq!(covariance[[0, 1]], covariance[[1, 0]]);
    }

    #[test]
    fn uncertainties_scale_the_chi_square() {
        let x = [0., 1., 2., 3., 4.];
        let y = [0.1, 0.9, 2.2, 2.8, 4.1];
        let unit = line_fit(&x, &y, &[1.; 5]).unwrap();
        let halved = line_fit(&x, &y, &[0.5; 5]).unwrap();

        approx::assert_relative_eq!(unit.slope(), halved.slope(), max_relative = 1e-12);
        approx::assert_relative_eq!(
            halved.chi_square(),
            4. * unit.chi_square(),
            max_relative = 1e-12
        );
        assert!(halved.p_value() < unit.p_value());
    }

    #[test]
    fn noisy_line_has_sensible_p_value() {
        let seed = 40;
        let mut rng = Isaac64Rng::seed_from_u64(seed);
        let noise = Normal::new(0.0, 0.3).unwrap();

        let x: Vec<f64> = (0..50).map(|ii| f64::from(ii) * 0.2).collect();
        let y: Vec<f64> = x
            .iter()
            .map(|xi| -0.5 * xi + 3. + noise.sample(&mut rng))
            .collect();

        let fit = line_fit(&x, &y, &vec![0.3; x.len()]).unwrap();

        approx::assert_relative_eq!(fit.slope(), -0.5, epsilon = 5. * fit.slope_std_error());
        approx::assert_relative_eq!(
            fit.intercept(),
            3.0,
            epsilon = 5. * fit.intercept_std_error()
        );
        assert!(fit.p_value() > 1e-4);
        approx::assert_relative_eq!(fit.evaluate(0.0), fit.intercept());
    }

    #[test]
    fn replacement_only_touches_zeros() {
        assert_eq!(
            replace_zero_uncertainties(&[0.0, 0.2, 0.0, 3.0]),
            vec![1.0, 0.2, 1.0, 3.0]
        );
    }

    proptest! {
        #[test]
        // The p-value is a probability
        fn p_value_lies_in_unit_interval(chi_square in 0.0..1e4f64, dof in 1..200usize) {
            let p = chi_square_p_value(chi_square, dof).unwrap();
            prop_assert!((0.0..=1.0).contains(&p));
        }
    }
}
