//! # Directional persistence
//!
//! Normalized autocorrelation of a track's **step displacement vectors** (not of its raw
//! positions) as a function of the time lag, and its ensemble average.
//!
//! For a track with samples `0 … n-1` and steps `d_i = pos(i+1) - pos(i)` (see
//! [`kinematics::steps`]), the step pair `(i, i+k)` is **valid** when no frame is missing
//! between sample `i` and sample `i+k+1`, i.e. `frame[i+k+1] - frame[i] == k+1`:
//!
//! ```text
//! corr_0 = mean over valid pairs (i, i) of |d_i|²
//! corr(k) = mean over valid pairs (i, i+k) of (d_i · d_j) / corr_0
//! ```
//!
//! for `k = 0 ..= n-2`. Lags without any valid pair are omitted, the same gap policy as the
//! MSD: a gap-free track yields `n-1` lags and any gap removes at least lag `n-2`.
//! A track that never moves has `corr_0 = 0`; its correlation is reported as `0` at every
//! lag rather than `NaN`.
//!
//! Persistent directed motion keeps `corr(k)` close to 1; random motion decays towards 0.
//! No model is fitted to this curve.
use crate::{
    constants::Lag,
    curves::{AggregatedCurve, LagCurve, LagSummary},
    kinematics,
    trajectories::{Track, TrajectoryTable},
};

/// Normalized step autocorrelation of one track.
///
/// Return
/// ----------
/// * An empty curve for tracks with fewer than two samples or without any gap-free step;
///   otherwise a curve starting at lag 0 (value 1, or 0 for a motionless track).
pub fn track_autocorrelation(track: &Track) -> LagCurve {
    let samples = track.samples();
    let steps = kinematics::steps(track);
    let m = steps.len();
    if m == 0 {
        return LagCurve::default();
    }

    let max_lag = m - 1;
    let mut sums = vec![0.0; max_lag + 1];
    let mut counts = vec![0usize; max_lag + 1];

    for (i, a) in steps.iter().enumerate() {
        for (lag, b) in steps[i..].iter().enumerate() {
            // the pair covers samples i ..= i+lag+1; once a gap is inside, it stays inside
            if (samples[i + lag + 1].frame - samples[i].frame) as usize != lag + 1 {
                break;
            }
            sums[lag] += a.dot(b);
            counts[lag] += 1;
        }
    }

    // every step spans a gap
    if counts[0] == 0 {
        return LagCurve::default();
    }
    let corr_0 = sums[0] / counts[0] as f64;

    let points = (0..=max_lag)
        .filter(|&lag| counts[lag] > 0)
        .map(|lag| {
            let value = if corr_0 == 0.0 {
                0.0
            } else {
                sums[lag] / counts[lag] as f64 / corr_0
            };
            (lag as Lag, value)
        })
        .collect();
    LagCurve::from_sorted(points)
}

/// Ensemble aggregation of the per-track autocorrelation curves (one value per track and lag).
pub fn ensemble_autocorrelation(table: &TrajectoryTable) -> AggregatedCurve {
    let mut aggregated = AggregatedCurve::new();
    for track in table.tracks() {
        aggregated.extend_from_curve(&track_autocorrelation(track));
    }
    aggregated
}

/// Mean directional correlation per lag, with its spread, for reporting.
///
/// The ±`sem` band around `mean` and a zero reference line are what the presentation layer
/// overlays on this curve.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AutocorrelationTable {
    pub time: Vec<f64>,
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
    pub sem: Vec<f64>,
    pub count: Vec<usize>,
}

impl AutocorrelationTable {
    pub fn from_summary(summary: &[LagSummary], frame_interval: f64) -> Self {
        AutocorrelationTable {
            time: summary
                .iter()
                .map(|s| s.lag as f64 * frame_interval)
                .collect(),
            mean: summary.iter().map(|s| s.mean).collect(),
            std: summary.iter().map(|s| s.std).collect(),
            sem: summary.iter().map(|s| s.sem).collect(),
            count: summary.iter().map(|s| s.count).collect(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.time.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

#[cfg(test)]
mod autocorrelation_test {
    use super::*;
    use crate::trajectories::Sample;
    use approx::assert_relative_eq;

    fn track(pts: &[(u32, f64, f64)]) -> Track {
        Track::new(
            0,
            pts.iter().map(|&(f, x, y)| Sample::new(f, x, y)).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_straight_line_is_fully_persistent() {
        let t = track(&[(0, 0.0, 0.0), (1, 1.0, 1.0), (2, 2.0, 2.0), (3, 3.0, 3.0)]);
        let corr = track_autocorrelation(&t);

        assert_eq!(corr.lags().collect::<Vec<_>>(), vec![0, 1, 2]);
        for v in corr.values() {
            assert_relative_eq!(v, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_back_and_forth_anticorrelates() {
        let t = track(&[(0, 0.0, 0.0), (1, 1.0, 0.0), (2, 0.0, 0.0), (3, 1.0, 0.0)]);
        let corr = track_autocorrelation(&t);

        assert_relative_eq!(corr.get(0).unwrap(), 1.0);
        assert_relative_eq!(corr.get(1).unwrap(), -1.0);
        assert_relative_eq!(corr.get(2).unwrap(), 1.0);
    }

    #[test]
    fn test_motionless_track_reports_zero() {
        let t = track(&[(0, 2.0, 2.0), (1, 2.0, 2.0), (2, 2.0, 2.0)]);
        let corr = track_autocorrelation(&t);

        assert_eq!(corr.len(), 2);
        assert!(corr.values().all(|v| v == 0.0));
    }

    #[test]
    fn test_gap_omits_unpaired_lags() {
        // the first step spans frames 0 -> 3, only the second one is gap-free
        let t = track(&[(0, 0.0, 0.0), (3, 1.0, 0.0), (4, 2.0, 0.0)]);
        let corr = track_autocorrelation(&t);
        assert_eq!(corr.points(), &[(0, 1.0)]);
    }

    #[test]
    fn test_trailing_gap_removes_last_lag() {
        let t = track(&[(0, 0.0, 0.0), (1, 1.0, 0.0), (3, 3.0, 0.0)]);
        let corr = track_autocorrelation(&t);

        assert!(t.has_gaps());
        assert_eq!(corr.points(), &[(0, 1.0)]);
        assert!(corr.len() < t.len() - 1);
    }

    #[test]
    fn test_all_steps_across_gaps() {
        let t = track(&[(0, 0.0, 0.0), (2, 1.0, 0.0), (5, 2.0, 0.0)]);
        assert!(track_autocorrelation(&t).is_empty());
    }

    #[test]
    fn test_table_from_summary() {
        let mut agg = AggregatedCurve::new();
        agg.push(0, 1.0);
        agg.push(0, 1.0);
        agg.push(1, 0.5);
        agg.push(1, -0.5);

        let table = AutocorrelationTable::from_summary(&agg.summarize(), 3.0);
        assert_eq!(table.time, vec![0.0, 3.0]);
        assert_eq!(table.mean, vec![1.0, 0.0]);
        assert_eq!(table.sem[0], 0.0);
        assert_relative_eq!(table.sem[1], 0.5 / 2f64.sqrt());
        assert_eq!(table.count, vec![2, 2]);
    }
}
