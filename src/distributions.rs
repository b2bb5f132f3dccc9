use num_traits::{Float, FloatConst};

#[derive(Clone, Copy, Debug)]
/// A normal distribution
///
/// The normal distribution is characterised by mean $\mu$, standard deviation $\sigma$
///
/// $$
///     f \left(x\right) = \frac{1}{\sqrt{2 \pi} \sigma} \exp\left[- \frac{1}{2} \left(\frac{x -
///     \mu}{\sigma}\right)^2 \right]
/// $$
pub struct NormalDistribution<T> {
    pub(crate) mean: T,
    pub(crate) standard_deviation: T,
}

impl<T: PartialEq> PartialEq for NormalDistribution<T> {
    fn eq(&self, other: &Self) -> bool {
        self.mean == other.mean && self.standard_deviation == other.standard_deviation
    }
}

impl<T: Copy> NormalDistribution<T> {
    pub(crate) const fn mean(&self) -> T {
        self.mean
    }

    pub(crate) const fn standard_deviation(&self) -> T {
        self.standard_deviation
    }
}

impl<T: Float + FloatConst> NormalDistribution<T> {
    /// Maximum likelihood estimate from a sample
    ///
    /// This is the naive mean and the population (not Bessel corrected) standard deviation.
    /// Returns `None` for an empty sample.
    pub(crate) fn from_sample(sample: &[T]) -> Option<Self> {
        if sample.is_empty() {
            return None;
        }
        let n = T::from(sample.len())?;
        let mean = sample.iter().fold(T::zero(), |acc, &x| acc + x) / n;
        let variance = sample
            .iter()
            .fold(T::zero(), |acc, &x| acc + (x - mean).powi(2))
            / n;

        Some(Self {
            mean,
            standard_deviation: variance.sqrt(),
        })
    }

    /// Probability density at `x`
    pub(crate) fn pdf(&self, x: T) -> T {
        let two = T::one() + T::one();
        let z = (x - self.mean) / self.standard_deviation;
        (-(z * z) / two).exp() / (self.standard_deviation * (two * T::PI()).sqrt())
    }

    /// Derivatives of the density at `x` with respect to $\mu$ and $\sigma$
    ///
    /// $$
    ///     \partial_\mu f = f \frac{x - \mu}{\sigma^2}, \quad
    ///     \partial_\sigma f = f \left[\frac{\left(x - \mu\right)^2}{\sigma^3} - \frac{1}{\sigma}\right]
    /// $$
    pub(crate) fn pdf_gradient(&self, x: T) -> [T; 2] {
        let density = self.pdf(x);
        let sigma = self.standard_deviation;
        let offset = x - self.mean;
        [
            density * offset / sigma.powi(2),
            density * (offset.powi(2) / sigma.powi(3) - sigma.recip()),
        ]
    }

    /// Whether `x` lies strictly inside `width` standard deviations of the mean
    pub(crate) fn contains(&self, x: T, width: T) -> bool {
        (x - self.mean).abs() < width * self.standard_deviation
    }
}
