//! # Mean squared displacement
//!
//! Per-track MSD curves and their ensemble aggregation.
//!
//! ## Per-track curve
//! -----------------
//! For a track of `n` samples, `MSD(k)` is the mean squared Euclidean displacement over the
//! sample pairs `(i, i+k)`, for `k = 1 ..= n-1`. A pair is **valid** only when no frame is
//! missing between its two samples, i.e. `frame[i+k] - frame[i] == k`. Missing frames are
//! never interpolated: a gap only removes pairs, and a lag left without any valid pair is
//! omitted from the curve. A gap-free track yields exactly `n-1` lags; any gap removes at
//! least lag `n-1`, whose only pair spans the whole track.
//!
//! ## Ensemble curve
//! -----------------
//! [`ensemble_msd`] buckets, per lag, **one value per track**: the track's own per-lag mean.
//! Weighting is by track, not by pair count, so long lags reached by few tracks naturally
//! carry few values. Lag 0 holds a single injected `0.0`.
//!
//! ## Fit weights
//! -----------------
//! The ensemble fit weights each lag by its standard deviation across tracks
//! ([`ensemble_sigma`]). A lag with a single contributor has no spread; its sigma is copied
//! from lag 1. Only single-contributor lags are imputed.
use itertools::Itertools;

use crate::{
    constants::{Lag, TrackId},
    curves::{AggregatedCurve, LagCurve, LagSummary},
    trajectories::{Track, TrajectoryTable},
};

/// MSD curve of a single track, lags in frames.
///
/// Arguments
/// -----------------
/// * `track`: The trajectory.
///
/// Return
/// ----------
/// * A [`LagCurve`] over `1 ..= len-1` restricted to the lags having at least one valid
///   sample pair; empty for a one-sample track.
pub fn track_msd(track: &Track) -> LagCurve {
    let samples = track.samples();
    let n = samples.len();
    if n < 2 {
        return LagCurve::default();
    }

    let max_lag = n - 1;
    let mut sums = vec![0.0; max_lag + 1];
    let mut counts = vec![0usize; max_lag + 1];

    for (i, a) in samples.iter().enumerate() {
        for (lag, b) in (1..).zip(&samples[i + 1..]) {
            // frames strictly increase: once a gap is crossed, every later pair spans it too
            if (b.frame - a.frame) as usize != lag {
                break;
            }
            sums[lag] += a.squared_distance(b);
            counts[lag] += 1;
        }
    }

    let points = (1..=max_lag)
        .filter(|&lag| counts[lag] > 0)
        .map(|lag| (lag as Lag, sums[lag] / counts[lag] as f64))
        .collect();
    LagCurve::from_sorted(points)
}

/// Ensemble aggregation of already computed per-track MSD curves.
pub fn ensemble_from_curves<'a>(curves: impl IntoIterator<Item = &'a LagCurve>) -> AggregatedCurve {
    let mut aggregated = AggregatedCurve::with_origin();
    for curve in curves {
        aggregated.extend_from_curve(curve);
    }
    aggregated
}

/// Ensemble MSD of a whole table: one value per track and lag, plus the lag-0 origin.
pub fn ensemble_msd(table: &TrajectoryTable) -> AggregatedCurve {
    let curves: Vec<LagCurve> = table.tracks().iter().map(track_msd).collect();
    ensemble_from_curves(&curves)
}

/// Per-lag sigmas for the weighted ensemble fit.
///
/// Each lag takes its standard deviation across tracks, except lags with a single
/// contributor (lag 0 always, long lags often) which take lag 1's standard deviation.
///
/// Arguments
/// -----------------
/// * `summary`: Output of [`AggregatedCurve::summarize`] on an ensemble MSD curve.
///
/// Return
/// ----------
/// * `Some(sigmas)`, aligned with `summary`, when every sigma is finite and strictly positive.
/// * `None` when lag 1 is missing or the sigmas cannot weight a fit (e.g. a single track, or
///   tracks with identical motion); callers then fit with unit weights.
pub fn ensemble_sigma(summary: &[LagSummary]) -> Option<Vec<f64>> {
    let lag1_std = summary.iter().find(|s| s.lag == 1)?.std;

    let sigmas: Vec<f64> = summary
        .iter()
        .map(|s| if s.count == 1 { lag1_std } else { s.std })
        .collect();

    sigmas
        .iter()
        .all(|&s| s.is_finite() && s > 0.0)
        .then_some(sigmas)
}

/// Per-track MSD curves laid out on a common lag axis.
///
/// Column `j` holds track `track_ids[j]`; row `i` holds lag `lags[i]`. Tracks that do not
/// reach a lag have an empty (`None`) cell there.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MsdCurveTable {
    pub track_ids: Vec<TrackId>,
    pub lags: Vec<Lag>,
    pub columns: Vec<Vec<Option<f64>>>,
}

impl MsdCurveTable {
    /// Lay out `(track id, curve)` pairs on the union of their lags.
    pub fn from_curves<'a>(curves: impl IntoIterator<Item = (TrackId, &'a LagCurve)>) -> Self {
        let curves: Vec<(TrackId, &LagCurve)> = curves.into_iter().collect();
        let lags: Vec<Lag> = curves
            .iter()
            .flat_map(|(_, c)| c.lags())
            .sorted_unstable()
            .dedup()
            .collect();

        let columns = curves
            .iter()
            .map(|(_, curve)| lags.iter().map(|&lag| curve.get(lag)).collect())
            .collect();

        MsdCurveTable {
            track_ids: curves.iter().map(|&(id, _)| id).collect(),
            lags,
            columns,
        }
    }

    /// Lag axis in physical time.
    pub fn time_axis(&self, frame_interval: f64) -> Vec<f64> {
        self.lags
            .iter()
            .map(|&lag| lag as f64 * frame_interval)
            .collect()
    }

    /// Number of populated cells (i.e. of track/lag pairs with data).
    pub fn populated_cells(&self) -> usize {
        self.columns
            .iter()
            .map(|c| c.iter().filter(|v| v.is_some()).count())
            .sum()
    }
}
