//! # Gaussian summary of a velocity distribution
//!
//! Per-track fitted velocities are binned into a [`Histogram`] and a Gaussian
//! `a·exp(-(x-μ)²/(2σ²))` is fitted to the bin counts at the bin centers, starting from
//! [`GAUSSIAN_P0`]. The fitted `μ` and `σ` summarise the population of track speeds.
use crate::{
    constants::GAUSSIAN_P0,
    fitting::{levenberg_marquardt, CurveModel, FitOptions, FitResult},
    motility_errors::MotilityError,
};

/// `a·exp(-(x-μ)²/(2σ²))`, parameters `[a, μ, σ]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Gaussian;

impl CurveModel for Gaussian {
    fn n_params(&self) -> usize {
        3
    }

    fn value(&self, x: f64, p: &[f64]) -> f64 {
        let z = (x - p[1]) / p[2];
        p[0] * (-0.5 * z * z).exp()
    }

    fn partials(&self, x: f64, p: &[f64], out: &mut [f64]) {
        let (a, mu, s) = (p[0], p[1], p[2]);
        let dx = x - mu;
        let e = (-0.5 * dx * dx / (s * s)).exp();
        out[0] = e;
        out[1] = a * e * dx / (s * s);
        out[2] = a * e * dx * dx / (s * s * s);
    }
}

/// Equal-width histogram over the data range.
///
/// Bins are half-open `[lo, hi)` except the last one, which is closed. When every value is
/// identical the range is widened to `value ± 0.5`.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

impl Histogram {
    /// Arguments
    /// -----------------
    /// * `values`: Finite samples.
    /// * `bins`: Number of bins, at least one.
    ///
    /// Return
    /// ----------
    /// * `Err(MotilityError::InsufficientData)` for no value, `InvalidAnalysisParameter` for
    ///   zero bins or non-finite values.
    pub fn new(values: &[f64], bins: usize) -> Result<Self, MotilityError> {
        if bins == 0 {
            return Err(MotilityError::InvalidAnalysisParameter(
                "histogram needs at least one bin".into(),
            ));
        }
        if values.is_empty() {
            return Err(MotilityError::InsufficientData(
                "cannot histogram an empty sample".into(),
            ));
        }
        if !values.iter().all(|v| v.is_finite()) {
            return Err(MotilityError::InvalidAnalysisParameter(
                "histogram values must be finite".into(),
            ));
        }

        let (mut lo, mut hi) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        if lo == hi {
            lo -= 0.5;
            hi += 0.5;
        }

        let width = (hi - lo) / bins as f64;
        let edges: Vec<f64> = (0..=bins).map(|i| lo + width * i as f64).collect();

        let mut counts = vec![0; bins];
        for &v in values {
            let idx = (((v - lo) / (hi - lo)) * bins as f64).floor() as usize;
            counts[idx.min(bins - 1)] += 1;
        }

        Ok(Histogram { edges, counts })
    }

    pub fn centers(&self) -> Vec<f64> {
        self.edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect()
    }

    #[inline]
    pub fn bin_count(&self) -> usize {
        self.counts.len()
    }

    /// Total number of binned values.
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

/// Fitted Gaussian with one-sigma uncertainties and the histogram it was fitted to.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianFit {
    pub amplitude: f64,
    pub mean: f64,
    /// Always reported positive (the model is even in `σ`).
    pub sigma: f64,
    pub amplitude_std: f64,
    pub mean_std: f64,
    pub sigma_std: f64,
    pub histogram: Histogram,
    pub fit: FitResult,
}

/// Fit a Gaussian to a histogram of `values`.
///
/// Arguments
/// -----------------
/// * `values`: Sample to summarise (e.g. per-track velocities in nm/s).
/// * `bins`: Number of histogram bins; at least three are needed to fit three parameters.
///
/// Return
/// ----------
/// * `Ok(GaussianFit)` on success, or the histogram / fit error.
pub fn fit_gaussian_histogram(values: &[f64], bins: usize) -> Result<GaussianFit, MotilityError> {
    let histogram = Histogram::new(values, bins)?;
    let centers = histogram.centers();
    let counts: Vec<f64> = histogram.counts.iter().map(|&c| c as f64).collect();

    let fit = levenberg_marquardt(
        &Gaussian,
        &centers,
        &counts,
        None,
        &GAUSSIAN_P0,
        &FitOptions::default(),
    )?;

    Ok(GaussianFit {
        amplitude: fit.parameters[0],
        mean: fit.parameters[1],
        sigma: fit.parameters[2].abs(),
        amplitude_std: fit.std_errors[0],
        mean_std: fit.std_errors[1],
        sigma_std: fit.std_errors[2],
        histogram,
        fit,
    })
}

#[cfg(test)]
mod gaussian_test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_histogram_edges_and_counts() {
        let h = Histogram::new(&[0.0, 1.0, 2.0, 3.0, 4.0], 4).unwrap();
        assert_eq!(h.edges, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        // last bin is closed on the right
        assert_eq!(h.counts, vec![1, 1, 1, 2]);
        assert_eq!(h.centers(), vec![0.5, 1.5, 2.5, 3.5]);
        assert_eq!(h.total(), 5);
    }

    #[test]
    fn test_histogram_constant_sample() {
        let h = Histogram::new(&[7.0, 7.0, 7.0], 2).unwrap();
        assert_eq!(h.edges, vec![6.5, 7.0, 7.5]);
        assert_eq!(h.counts, vec![0, 3]);
    }

    #[test]
    fn test_histogram_errors() {
        assert!(matches!(
            Histogram::new(&[], 10),
            Err(MotilityError::InsufficientData(_))
        ));
        assert!(matches!(
            Histogram::new(&[1.0], 0),
            Err(MotilityError::InvalidAnalysisParameter(_))
        ));
        assert!(matches!(
            Histogram::new(&[1.0, f64::NAN], 3),
            Err(MotilityError::InvalidAnalysisParameter(_))
        ));
    }

    #[test]
    fn test_gaussian_fit_on_exact_profile() {
        let xs: Vec<f64> = (0..15).map(|i| 2.0 + 1.5 * i as f64).collect();
        let ys: Vec<f64> = xs
            .iter()
            .map(|&x| Gaussian.value(x, &[12.0, 11.0, 4.0]))
            .collect();

        let opts = FitOptions::default();
        let fit = levenberg_marquardt(&Gaussian, &xs, &ys, None, &GAUSSIAN_P0, &opts).unwrap();
        assert_relative_eq!(fit.parameters[0], 12.0, epsilon = 1e-5);
        assert_relative_eq!(fit.parameters[1], 11.0, epsilon = 1e-5);
        assert_relative_eq!(fit.parameters[2].abs(), 4.0, epsilon = 1e-5);
    }

    #[test]
    fn test_histogram_fit_centres_on_the_bulk() {
        // symmetric, bell-shaped sample around 10
        let mut values = Vec::new();
        for (v, n) in [(4.0, 1), (6.0, 3), (8.0, 7), (10.0, 10), (12.0, 7), (14.0, 3), (16.0, 1)] {
            values.extend(std::iter::repeat(v).take(n));
        }
        let g = fit_gaussian_histogram(&values, 7).unwrap();

        assert_eq!(g.histogram.total(), values.len());
        assert_relative_eq!(g.mean, 10.0, epsilon = 1e-3);
        assert!(g.sigma > 1.0 && g.sigma < 5.0);
        assert!(g.amplitude > 5.0);
    }

    #[test]
    fn test_far_away_sample_fails_to_fit() {
        // the initial guess is blind to values this far away
        let values = [1.0e5, 1.1e5, 1.2e5, 1.1e5, 1.0e5];
        let err = fit_gaussian_histogram(&values, 3).unwrap_err();
        assert!(err.is_fit_failure());
    }
}
