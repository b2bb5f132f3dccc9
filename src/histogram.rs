use itertools::Itertools;

/// Equal-width histogram over a closed range, normalised to unit area
///
/// Observations outside `[lo, hi]` are ignored. Every bin is half-open except the last, which
/// also contains `hi`.
#[derive(Clone, Debug)]
pub(crate) struct DensityHistogram {
    edges: Vec<f64>,
    densities: Vec<f64>,
}

impl DensityHistogram {
    /// Bin `sample` into `bins` bins spanning `range`
    ///
    /// A zero-width range is widened to `[lo - 0.5, hi + 0.5]`. Returns `None` if no
    /// observation falls inside the range, or the range is not finite.
    pub(crate) fn build(sample: &[f64], bins: usize, range: (f64, f64)) -> Option<Self> {
        let bins = bins.max(1);
        let (mut lo, mut hi) = range;
        if !(lo.is_finite() && hi.is_finite()) || hi < lo {
            return None;
        }
        if lo == hi {
            lo -= 0.5;
            hi += 0.5;
        }

        let edges = linspace(lo, hi, bins + 1);
        let width = (hi - lo) / bins as f64;

        let mut counts = vec![0usize; bins];
        for &x in sample {
            if let Some(index) = bin_index(x, lo, hi, bins) {
                counts[index] += 1;
            }
        }

        let total: usize = counts.iter().sum();
        if total == 0 {
            return None;
        }

        let norm = total as f64 * width;
        let densities = counts.into_iter().map(|count| count as f64 / norm).collect();

        Some(Self { edges, densities })
    }

    pub(crate) fn centers(&self) -> Vec<f64> {
        self.edges
            .iter()
            .tuple_windows()
            .map(|(left, right)| 0.5 * (left + right))
            .collect()
    }

    pub(crate) fn densities(&self) -> &[f64] {
        &self.densities
    }

    #[cfg(test)]
    pub(crate) fn edges(&self) -> &[f64] {
        &self.edges
    }
}

/// `num` evenly spaced points from `start` to `stop` inclusive
pub(crate) fn linspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    match num {
        0 => vec![],
        1 => vec![start],
        _ => {
            let step = (stop - start) / (num - 1) as f64;
            (0..num)
                .map(|ii| if ii == num - 1 { stop } else { start + step * ii as f64 })
                .collect()
        }
    }
}

/// Index of the bin holding `x`, with the right edge of the last bin inclusive
pub(crate) fn bin_index(x: f64, lo: f64, hi: f64, bins: usize) -> Option<usize> {
    if !(lo..=hi).contains(&x) {
        return None;
    }
    if x == hi {
        return Some(bins - 1);
    }
    let index = ((x - lo) / (hi - lo) * bins as f64).floor() as usize;
    Some(index.min(bins - 1))
}

#[cfg(test)]
mod tests {
    use ndarray_rand::rand::SeedableRng;
    use ndarray_rand::rand_distr::{Distribution, Normal};
    use rand_isaac::Isaac64Rng;

    use super::{bin_index, linspace, DensityHistogram};

    #[test]
    fn densities_integrate_to_unity() {
        let seed = 40;
        let mut rng = Isaac64Rng::seed_from_u64(seed);
        let normal = Normal::new(1.0, 2.0).unwrap();
        let sample: Vec<f64> = (0..500).map(|_| normal.sample(&mut rng)).collect();

        let histogram = DensityHistogram::build(&sample, 22, (-5.0, 7.0)).unwrap();
        let width = histogram.edges()[1] - histogram.edges()[0];
        let area: f64 = histogram.densities().iter().map(|d| d * width).sum();

        approx::assert_relative_eq!(area, 1.0, max_relative = 1e-12);
    }

    #[test]
    fn out_of_range_observations_are_ignored() {
        let sample = [-10.0, 0.25, 0.75, 10.0];
        let histogram = DensityHistogram::build(&sample, 2, (0.0, 1.0)).unwrap();

        assert_eq!(histogram.densities(), &[1.0, 1.0]);
        assert_eq!(histogram.centers(), vec![0.25, 0.75]);
    }

    #[test]
    fn upper_edge_falls_in_last_bin() {
        assert_eq!(bin_index(1.0, 0.0, 1.0, 4), Some(3));
        assert_eq!(bin_index(0.0, 0.0, 1.0, 4), Some(0));
        assert_eq!(bin_index(0.5, 0.0, 1.0, 4), Some(2));
        assert_eq!(bin_index(1.0 + 1e-12, 0.0, 1.0, 4), None);
    }

    #[test]
    fn degenerate_range_is_widened() {
        let sample = [3.0; 5];
        let histogram = DensityHistogram::build(&sample, 1, (3.0, 3.0)).unwrap();

        assert_eq!(histogram.edges(), &[2.5, 3.5]);
        approx::assert_relative_eq!(histogram.densities()[0], 1.0);
    }

    #[test]
    fn empty_histogram_is_rejected() {
        assert!(DensityHistogram::build(&[5.0], 3, (0.0, 1.0)).is_none());
        assert!(DensityHistogram::build(&[0.5], 3, (f64::NAN, 1.0)).is_none());
    }

    #[test]
    fn linspace_hits_both_endpoints() {
        let points = linspace(-1.0, 2.0, 4);
        assert_eq!(points, vec![-1.0, 0.0, 1.0, 2.0]);
    }
}
