//! # Lag-indexed curves
//!
//! Two value types shared by the MSD and autocorrelation engines:
//!
//! * [`LagCurve`] – one track's quantity as a function of the time lag (in frames). Lags are
//!   strictly increasing; a lag without data is absent, never stored as zero.
//! * [`AggregatedCurve`] – the ensemble view: for every lag, the values contributed by all
//!   tracks reaching it. Summaries ([`LagSummary`]) give the mean, population standard
//!   deviation, standard error and contributor count per lag.
//!
//! An [`AggregatedCurve`] is built fresh by each analysis call and owned by it; it is an
//! intermediate that is reduced to summaries and then dropped.
use std::collections::BTreeMap;

use crate::constants::Lag;

/// A quantity sampled at integer frame lags.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LagCurve {
    points: Vec<(Lag, f64)>,
}

impl LagCurve {
    /// Build a curve from points already ordered by strictly increasing lag.
    pub(crate) fn from_sorted(points: Vec<(Lag, f64)>) -> Self {
        debug_assert!(points.windows(2).all(|w| w[0].0 < w[1].0));
        LagCurve { points }
    }

    #[inline]
    pub fn points(&self) -> &[(Lag, f64)] {
        &self.points
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn lags(&self) -> impl Iterator<Item = Lag> + '_ {
        self.points.iter().map(|&(lag, _)| lag)
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|&(_, v)| v)
    }

    /// Value at `lag`, if the curve has it.
    pub fn get(&self, lag: Lag) -> Option<f64> {
        self.points
            .binary_search_by_key(&lag, |&(l, _)| l)
            .ok()
            .map(|i| self.points[i].1)
    }

    /// Lags converted to physical time.
    pub fn times(&self, frame_interval: f64) -> Vec<f64> {
        self.lags().map(|lag| lag as f64 * frame_interval).collect()
    }

    /// Largest lag of the curve.
    pub fn max_lag(&self) -> Option<Lag> {
        self.points.last().map(|&(lag, _)| lag)
    }
}

/// Per-lag summary of an [`AggregatedCurve`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LagSummary {
    pub lag: Lag,
    pub mean: f64,
    /// Population standard deviation (`ddof = 0`); zero for a single contributor.
    pub std: f64,
    /// Standard error of the mean, `std / sqrt(count)`.
    pub sem: f64,
    pub count: usize,
}

/// Values of many curves bucketed by lag.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AggregatedCurve {
    buckets: BTreeMap<Lag, Vec<f64>>,
}

impl AggregatedCurve {
    pub fn new() -> Self {
        Self::default()
    }

    /// An aggregation whose lag 0 holds the single value `0.0`.
    ///
    /// Used for displacement-like quantities: nothing moves at zero lag, and anchoring the
    /// curve at the origin lets fits and plots start there.
    pub fn with_origin() -> Self {
        let mut curve = Self::new();
        curve.push(0, 0.0);
        curve
    }

    pub fn push(&mut self, lag: Lag, value: f64) {
        self.buckets.entry(lag).or_default().push(value);
    }

    /// Append every point of a per-track curve to its lag bucket.
    pub fn extend_from_curve(&mut self, curve: &LagCurve) {
        for &(lag, value) in curve.points() {
            self.push(lag, value);
        }
    }

    /// Values contributed at `lag`.
    pub fn values_at(&self, lag: Lag) -> Option<&[f64]> {
        self.buckets.get(&lag).map(Vec::as_slice)
    }

    /// Populated lags, increasing.
    pub fn lags(&self) -> impl Iterator<Item = Lag> + '_ {
        self.buckets.keys().copied()
    }

    /// Number of populated lags.
    #[inline]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Mean, spread and count per populated lag, by increasing lag.
    pub fn summarize(&self) -> Vec<LagSummary> {
        self.buckets
            .iter()
            .map(|(&lag, values)| {
                let count = values.len();
                let n = count as f64;
                let mean = values.iter().sum::<f64>() / n;
                let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                let std = var.sqrt();
                LagSummary {
                    lag,
                    mean,
                    std,
                    sem: std / n.sqrt(),
                    count,
                }
            })
            .collect()
    }
}
