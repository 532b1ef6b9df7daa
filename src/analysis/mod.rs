//! # Motility analysis pipeline
//!
//! This module defines [`AnalysisParams`], its validated builder, and [`analyze_table`], the
//! entry point that turns one [`TrajectoryTable`] into one [`AnalysisBundle`].
//!
//! ## Pipeline overview
//!
//! 1. **Track displacement** (`track_displacement`)
//!    Every step speed of every track, in nm/s.
//!
//! 2. **Single-track MSD** (`msd_single_track`)
//!    Each track's MSD curve is fitted with the drift–diffusion model on its first
//!    `clip` fraction. Tracks with at most `min_fit_lags` lags, or whose fit fails or yields a
//!    negative `V²`, are **skipped** and recorded; they never fail the analysis. The fitted
//!    velocities are then summarised by a Gaussian fitted to their `bins`-bin histogram.
//!
//! 3. **Weighted ensemble MSD** (`msd_weighted`)
//!    Per-lag mean of the per-track curves (one value per track, lag 0 anchored at 0),
//!    weighted by the per-lag spread and fitted on its first `clip` fraction. This fit is the
//!    headline result: **any failure here fails the whole analysis**.
//!
//! 4. **Directionality** (`directionality`)
//!    Ensemble step autocorrelation, mean and standard error per lag. No fit.
//!
//! Disabled analyses are skipped entirely and left as `None` in the bundle.
//!
//! ## Example
//!
//! ```rust,no_run
//! use motility::analysis::{analyze_table, AnalysisParams};
//! use motility::trajectories::trackmate_reader::read_trackmate_xml;
//! use camino::Utf8Path;
//!
//! let table = read_trackmate_xml(Utf8Path::new("cell_01_Tracks.xml")).unwrap();
//! let params = AnalysisParams::builder()
//!     .clip(0.3)
//!     .directionality(false)
//!     .build()
//!     .unwrap();
//!
//! let bundle = analyze_table(&table, &params).unwrap();
//! if let Some(ensemble) = &bundle.ensemble_msd {
//!     println!("V = {:.4} {}/{}", ensemble.fit.velocity, table.space_unit(), table.time_unit());
//! }
//! ```
use std::cmp::Ordering::{Equal, Greater, Less};
use std::fmt;

use tracing::{debug, info, warn};

use crate::{
    autocorrelation::{self, AutocorrelationTable},
    constants::{
        DEFAULT_CLIP, DEFAULT_FIT_CURVE_POINTS, DEFAULT_HISTOGRAM_BINS, DEFAULT_MIN_FIT_LAGS,
        DEFAULT_PLOT_EVERY, MICRON_UNITS, MIN_RELIABLE_FITTED_TRACKS, NM_PER_MICRON,
    },
    curves::LagCurve,
    fitting::{drift_diffusion::fit_drift_diffusion, gaussian::fit_gaussian_histogram},
    kinematics, msd,
    motility_errors::MotilityError,
    trajectories::TrajectoryTable,
};

pub mod bundle;

pub use bundle::{AnalysisBundle, EnsembleMsd, SingleTrackMsd, SkippedTrack, TrackFit};

/// Configuration of [`analyze_table`].
///
/// Fields
/// -----------------
/// * `clip` – fraction in `(0, 1]` of each MSD curve used for fitting, applied independently
///   to every per-track curve and to the ensemble curve.
/// * `plot_every` – stride selecting the per-track curves flagged for visualisation. Does not
///   affect numeric results.
/// * `bins` – number of bins of the fitted-velocity histogram.
/// * `min_fit_lags` – per-track curves need strictly more lags than this to be fitted.
/// * `fit_curve_points` – resolution of the resampled ensemble fit curve.
/// * `track_displacement`, `msd_weighted`, `msd_single_track`, `directionality` – analysis
///   switches.
///
/// Defaults
/// -----------------
/// * `clip`: 0.5
/// * `plot_every`: 10
/// * `bins`: 10
/// * `min_fit_lags`: 5
/// * `fit_curve_points`: 100
/// * every analysis enabled
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisParams {
    pub clip: f64,
    pub plot_every: usize,
    pub bins: usize,
    pub min_fit_lags: usize,
    pub fit_curve_points: usize,

    // --- Analysis switches ---
    pub track_displacement: bool,
    pub msd_weighted: bool,
    pub msd_single_track: bool,
    pub directionality: bool,
}

impl AnalysisParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an [`AnalysisParamsBuilder`] initialised with the defaults.
    pub fn builder() -> AnalysisParamsBuilder {
        AnalysisParamsBuilder::new()
    }

    /// Check the invariants enforced by [`AnalysisParamsBuilder::build`].
    pub fn validate(&self) -> Result<(), MotilityError> {
        if !(gt0(self.clip) && le(self.clip, 1.0)) {
            return Err(MotilityError::InvalidAnalysisParameter(format!(
                "clip must lie in (0, 1], got {}",
                self.clip
            )));
        }
        if self.plot_every == 0 {
            return Err(MotilityError::InvalidAnalysisParameter(
                "plot_every must be >= 1".into(),
            ));
        }
        if self.bins == 0 {
            return Err(MotilityError::InvalidAnalysisParameter(
                "bins must be >= 1".into(),
            ));
        }
        if self.fit_curve_points < 2 {
            return Err(MotilityError::InvalidAnalysisParameter(
                "fit_curve_points must be >= 2".into(),
            ));
        }
        if !self.any_enabled() {
            return Err(MotilityError::InvalidAnalysisParameter(
                "at least one analysis must be enabled".into(),
            ));
        }
        Ok(())
    }

    /// `true` when at least one analysis switch is on.
    pub fn any_enabled(&self) -> bool {
        self.track_displacement || self.msd_weighted || self.msd_single_track || self.directionality
    }
}

impl Default for AnalysisParams {
    fn default() -> Self {
        AnalysisParams {
            clip: DEFAULT_CLIP,
            plot_every: DEFAULT_PLOT_EVERY,
            bins: DEFAULT_HISTOGRAM_BINS,
            min_fit_lags: DEFAULT_MIN_FIT_LAGS,
            fit_curve_points: DEFAULT_FIT_CURVE_POINTS,
            track_displacement: true,
            msd_weighted: true,
            msd_single_track: true,
            directionality: true,
        }
    }
}

/// Return true iff x > 0.0 and comparable (i.e., not NaN).
#[inline]
fn gt0(x: f64) -> bool {
    x.partial_cmp(&0.0) == Some(Greater)
}

/// Return true iff a <= b and comparable (i.e., not NaN).
#[inline]
fn le(a: f64, b: f64) -> bool {
    matches!(a.partial_cmp(&b), Some(Less) | Some(Equal))
}

/// Builder for [`AnalysisParams`], with validation.
#[derive(Debug, Clone, Default)]
pub struct AnalysisParamsBuilder {
    params: AnalysisParams,
}

impl AnalysisParamsBuilder {
    pub fn new() -> Self {
        Self {
            params: AnalysisParams::default(),
        }
    }

    pub fn clip(mut self, v: f64) -> Self {
        self.params.clip = v;
        self
    }
    pub fn plot_every(mut self, v: usize) -> Self {
        self.params.plot_every = v;
        self
    }
    pub fn bins(mut self, v: usize) -> Self {
        self.params.bins = v;
        self
    }
    pub fn min_fit_lags(mut self, v: usize) -> Self {
        self.params.min_fit_lags = v;
        self
    }
    pub fn fit_curve_points(mut self, v: usize) -> Self {
        self.params.fit_curve_points = v;
        self
    }

    // --- Analysis switches ---
    pub fn track_displacement(mut self, v: bool) -> Self {
        self.params.track_displacement = v;
        self
    }
    pub fn msd_weighted(mut self, v: bool) -> Self {
        self.params.msd_weighted = v;
        self
    }
    pub fn msd_single_track(mut self, v: bool) -> Self {
        self.params.msd_single_track = v;
        self
    }
    pub fn directionality(mut self, v: bool) -> Self {
        self.params.directionality = v;
        self
    }

    /// Finalize the builder.
    ///
    /// Validation rules
    /// -----------------
    /// * `0 < clip ≤ 1`
    /// * `plot_every ≥ 1`, `bins ≥ 1`, `fit_curve_points ≥ 2`
    /// * at least one analysis enabled
    ///
    /// `min_fit_lags` is unconstrained: with `0` every track having a single lag is fitted
    /// (and then usually skipped for lack of points after clipping).
    pub fn build(self) -> Result<AnalysisParams, MotilityError> {
        self.params.validate()?;
        Ok(self.params)
    }
}

impl fmt::Display for AnalysisParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            const PARAM_COL: usize = 36;
            writeln!(f, "Motility Analysis Parameters")?;
            writeln!(f, "----------------------------")?;

            macro_rules! line {
                ($fmt:expr, $val:expr, $comment:expr) => {{
                    let s = format!($fmt, $val);
                    let pad = if s.len() < PARAM_COL {
                        " ".repeat(PARAM_COL - s.len())
                    } else {
                        " ".to_string()
                    };
                    writeln!(f, "  {}{}# {}", s, pad, $comment)
                }};
            }

            writeln!(f, "[Fitting]")?;
            line!("clip               = {:.3}", self.clip, "Fraction of each MSD curve fitted")?;
            line!("min_fit_lags       = {}", self.min_fit_lags, "Track lags required (exclusive)")?;
            line!("bins               = {}", self.bins, "Velocity histogram bins")?;
            line!("fit_curve_points   = {}", self.fit_curve_points, "Ensemble fit curve points")?;
            line!("plot_every         = {}", self.plot_every, "Per-track curve plotting stride")?;

            writeln!(f, "\n[Analyses]")?;
            line!("track_displacement = {}", self.track_displacement, "Step velocities")?;
            line!("msd_single_track   = {}", self.msd_single_track, "Per-track MSD fits")?;
            line!("msd_weighted       = {}", self.msd_weighted, "Weighted ensemble MSD fit")?;
            line!("directionality     = {}", self.directionality, "Step autocorrelation")?;

            Ok(())
        } else {
            let enabled = [
                (self.track_displacement, "displacement"),
                (self.msd_single_track, "single"),
                (self.msd_weighted, "weighted"),
                (self.directionality, "directionality"),
            ]
            .iter()
            .filter(|(on, _)| *on)
            .map(|(_, name)| *name)
            .collect::<Vec<_>>()
            .join("+");

            write!(
                f,
                "AnalysisParams(clip={:.2}, min_fit_lags={}, bins={}, plot_every={}, analyses={})",
                self.clip, self.min_fit_lags, self.bins, self.plot_every, enabled
            )
        }
    }
}

/// Run every enabled analysis on one trajectory table.
///
/// Arguments
/// -----------------
/// * `table`: The trajectories; positions are expected in microns for the nm/s outputs.
/// * `params`: Analysis configuration, re-validated on entry.
///
/// Return
/// ----------
/// * `Ok(AnalysisBundle)` holding one entry per enabled analysis.
/// * `Err(MotilityError::InvalidAnalysisParameter)` for invalid parameters.
/// * `Err(..)` from the ensemble MSD fit (`InsufficientData`, `FitNonConvergence`,
///   `NegativeSquaredVelocity`) when `msd_weighted` is enabled and that fit fails.
///
/// The result is a pure function of its inputs: two calls on the same table and parameters
/// return identical bundles.
pub fn analyze_table(
    table: &TrajectoryTable,
    params: &AnalysisParams,
) -> Result<AnalysisBundle, MotilityError> {
    params.validate()?;

    if let Some(stats) = table.track_length_stats() {
        info!(
            tracks = table.len(),
            samples = table.total_samples(),
            lengths = %stats,
            "Analysing trajectory table"
        );
    }
    let reports_nm = params.track_displacement || params.msd_single_track;
    if reports_nm && !MICRON_UNITS.contains(&table.space_unit()) {
        warn!(
            space_unit = table.space_unit(),
            "Velocities are rescaled to nm/s assuming positions in microns"
        );
    }

    let velocity_distribution = params
        .track_displacement
        .then(|| kinematics::velocity_distribution(table));

    let track_curves: Vec<LagCurve> = if params.msd_single_track || params.msd_weighted {
        table.tracks().iter().map(msd::track_msd).collect()
    } else {
        Vec::new()
    };

    let single_track = params
        .msd_single_track
        .then(|| single_track_msd(table, &track_curves, params));

    let ensemble_msd = if params.msd_weighted {
        Some(weighted_ensemble_msd(table, &track_curves, params)?)
    } else {
        None
    };

    let directionality = params.directionality.then(|| {
        let summary = autocorrelation::ensemble_autocorrelation(table).summarize();
        AutocorrelationTable::from_summary(&summary, table.frame_interval())
    });

    Ok(AnalysisBundle {
        frame_interval: table.frame_interval(),
        space_unit: table.space_unit().to_string(),
        time_unit: table.time_unit().to_string(),
        velocity_distribution,
        single_track,
        ensemble_msd,
        directionality,
    })
}

fn single_track_msd(
    table: &TrajectoryTable,
    curves: &[LagCurve],
    params: &AnalysisParams,
) -> SingleTrackMsd {
    let dt = table.frame_interval();
    let mut fits = Vec::new();
    let mut skipped = Vec::new();
    let mut plotted_tracks = Vec::new();

    for (index, (track, curve)) in table.tracks().iter().zip(curves).enumerate() {
        if index % params.plot_every == 0 {
            plotted_tracks.push(track.id());
        }

        if curve.len() <= params.min_fit_lags {
            skipped.push(SkippedTrack {
                id: track.id(),
                reason: MotilityError::InsufficientData(format!(
                    "{} MSD lags, more than {} required",
                    curve.len(),
                    params.min_fit_lags
                )),
            });
            continue;
        }

        let values: Vec<f64> = curve.values().collect();
        match fit_drift_diffusion(&curve.times(dt), &values, None, params.clip) {
            Ok(fit) => fits.push(TrackFit {
                id: track.id(),
                fit,
            }),
            Err(reason) => {
                debug!(track = track.id(), %reason, "Skipping track MSD fit");
                skipped.push(SkippedTrack {
                    id: track.id(),
                    reason,
                });
            }
        }
    }

    let fitted_velocities: Vec<f64> = fits
        .iter()
        .map(|f| f.fit.velocity * NM_PER_MICRON)
        .collect();

    if fitted_velocities.len() < MIN_RELIABLE_FITTED_TRACKS {
        warn!(
            fitted = fitted_velocities.len(),
            "Fewer than {} fitted tracks, the velocity histogram is not reliable",
            MIN_RELIABLE_FITTED_TRACKS
        );
    }

    let velocity_summary = if fitted_velocities.is_empty() {
        None
    } else {
        match fit_gaussian_histogram(&fitted_velocities, params.bins) {
            Ok(g) => Some(g),
            Err(reason) => {
                warn!(%reason, "Gaussian summary of the fitted velocities failed");
                None
            }
        }
    };

    debug!(
        fitted = fits.len(),
        skipped = skipped.len(),
        "Single-track MSD fits done"
    );

    SingleTrackMsd {
        curves: msd::MsdCurveTable::from_curves(
            table
                .tracks()
                .iter()
                .zip(curves)
                .filter(|(_, c)| !c.is_empty())
                .map(|(t, c)| (t.id(), c)),
        ),
        fits,
        skipped,
        fitted_velocities,
        velocity_summary,
        plotted_tracks,
    }
}

fn weighted_ensemble_msd(
    table: &TrajectoryTable,
    curves: &[LagCurve],
    params: &AnalysisParams,
) -> Result<EnsembleMsd, MotilityError> {
    let dt = table.frame_interval();
    let summary = msd::ensemble_from_curves(curves).summarize();
    let sigma = msd::ensemble_sigma(&summary);
    if sigma.is_none() {
        warn!(
            lags = summary.len(),
            "Ensemble MSD spread unusable as weights, fitting unweighted"
        );
    }

    let times: Vec<f64> = summary.iter().map(|s| s.lag as f64 * dt).collect();
    let means: Vec<f64> = summary.iter().map(|s| s.mean).collect();

    let fit = fit_drift_diffusion(&times, &means, sigma.as_deref(), params.clip)?;
    let t_max = times.last().copied().unwrap_or(0.0);
    let (fit_time, fit_msd) = fit.curve(t_max, params.fit_curve_points);

    info!(
        diffusion = fit.diffusion,
        velocity = fit.velocity,
        "Ensemble MSD fit"
    );

    Ok(EnsembleMsd {
        summary,
        sigma,
        fit,
        fit_time,
        fit_msd,
    })
}

#[cfg(test)]
mod analysis_test {
    use super::*;
    use crate::trajectories::{Sample, Track};
    use approx::assert_relative_eq;

    fn line_track(id: u32, n: u32, vx: f64) -> Track {
        Track::new(
            id,
            (0..n).map(|f| Sample::new(f, vx * f as f64, 0.0)).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_builder_defaults_and_validation() {
        let params = AnalysisParams::builder().build().unwrap();
        assert_eq!(params, AnalysisParams::default());
        assert_eq!(params.clip, 0.5);
        assert_eq!(params.min_fit_lags, 5);

        for bad in [0.0, 1.01, f64::NAN] {
            assert!(AnalysisParams::builder().clip(bad).build().is_err());
        }
        assert!(AnalysisParams::builder().clip(1.0).build().is_ok());
        assert!(AnalysisParams::builder().plot_every(0).build().is_err());
        assert!(AnalysisParams::builder().bins(0).build().is_err());
        assert!(AnalysisParams::builder().fit_curve_points(1).build().is_err());

        let none = AnalysisParams::builder()
            .track_displacement(false)
            .msd_weighted(false)
            .msd_single_track(false)
            .directionality(false)
            .build();
        assert!(matches!(none, Err(MotilityError::InvalidAnalysisParameter(_))));
    }

    #[test]
    fn test_analyze_table_revalidates() {
        let table =
            TrajectoryTable::new(vec![line_track(0, 4, 1.0)], 1.0, "micron", "sec").unwrap();
        let params = AnalysisParams {
            plot_every: 0,
            ..AnalysisParams::default()
        };
        assert!(matches!(
            analyze_table(&table, &params),
            Err(MotilityError::InvalidAnalysisParameter(_))
        ));
    }

    #[test]
    fn test_display_compact_and_pretty() {
        let params = AnalysisParams::builder().directionality(false).build().unwrap();
        let compact = format!("{params}");
        assert!(compact.starts_with("AnalysisParams(clip=0.50"));
        assert!(compact.contains("analyses=displacement+single+weighted)"));

        let pretty = format!("{params:#}");
        assert!(pretty.contains("[Analyses]"));
        assert!(pretty.contains("directionality     = false"));
    }

    #[test]
    fn test_disabled_analyses_are_absent() {
        let table =
            TrajectoryTable::new(vec![line_track(0, 12, 0.1)], 1.0, "micron", "sec").unwrap();
        let params = AnalysisParams::builder()
            .msd_weighted(false)
            .msd_single_track(false)
            .build()
            .unwrap();

        let bundle = analyze_table(&table, &params).unwrap();
        assert!(bundle.velocity_distribution.is_some());
        assert!(bundle.single_track.is_none());
        assert!(bundle.ensemble_msd.is_none());
        assert!(bundle.directionality.is_some());
    }

    #[test]
    fn test_single_track_fits_and_skips() {
        let tracks = vec![
            line_track(0, 12, 0.01),
            line_track(1, 6, 0.01),
            line_track(2, 7, 0.02),
        ];
        let table = TrajectoryTable::new(tracks, 0.5, "micron", "sec").unwrap();
        let params = AnalysisParams::builder().plot_every(2).build().unwrap();

        let single = analyze_table(&table, &params).unwrap().single_track.unwrap();

        // track 1 has exactly 5 lags: not strictly more than min_fit_lags
        assert_eq!(single.skipped.len(), 1);
        assert_eq!(single.skipped[0].id, 1);
        assert!(matches!(
            single.skipped[0].reason,
            MotilityError::InsufficientData(_)
        ));

        assert_eq!(single.fits.iter().map(|f| f.id).collect::<Vec<_>>(), vec![0, 2]);
        // 0.01 µm/frame at 0.5 s/frame = 20 nm/s
        assert_relative_eq!(single.fitted_velocities[0], 20.0, epsilon = 1e-5);
        assert_relative_eq!(single.fitted_velocities[1], 40.0, epsilon = 1e-5);
        assert_eq!(single.plotted_tracks, vec![0, 2]);
        assert_eq!(single.curves.track_ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_ensemble_failure_fails_the_analysis() {
        // only single-sample tracks: the ensemble curve is the lone origin point
        let tracks = vec![
            Track::new(0, vec![Sample::new(0, 0.0, 0.0)]).unwrap(),
            Track::new(1, vec![Sample::new(3, 1.0, 0.0)]).unwrap(),
        ];
        let table = TrajectoryTable::new(tracks, 1.0, "micron", "sec").unwrap();

        let err = analyze_table(&table, &AnalysisParams::default()).unwrap_err();
        assert!(matches!(err, MotilityError::InsufficientData(_)));
    }

    /// Back-and-forth along x with amplitude `amp`: MSD is `amp²` at odd lags, 0 at even ones.
    fn oscillating_track(id: u32, n: u32, amp: f64) -> Track {
        Track::new(
            id,
            (0..n)
                .map(|f| Sample::new(f, amp * (f % 2) as f64, 0.0))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_concave_track_is_skipped_others_fitted() {
        // speeds in nm/s at 1 s/frame, histogram counts 1-2-3-2-1 over 5 bins
        let speeds = [6.0, 8.0, 8.0, 10.0, 10.0, 10.0, 12.0, 12.0, 14.0];
        let mut tracks: Vec<Track> = speeds
            .iter()
            .enumerate()
            .map(|(id, v)| line_track(id as u32, 12, v / NM_PER_MICRON))
            .collect();
        tracks.push(oscillating_track(9, 12, 0.004));
        let table = TrajectoryTable::new(tracks, 1.0, "micron", "sec").unwrap();
        let params = AnalysisParams::builder().bins(5).build().unwrap();

        let bundle = analyze_table(&table, &params).unwrap();
        let single = bundle.single_track.as_ref().unwrap();

        assert_eq!(single.skipped.len(), 1);
        assert_eq!(single.skipped[0].id, 9);
        assert!(matches!(
            single.skipped[0].reason,
            MotilityError::NegativeSquaredVelocity(w) if w < 0.0
        ));

        assert_eq!(single.fits.len(), 9);
        for (v, expected) in single.fitted_velocities.iter().zip(speeds) {
            assert_relative_eq!(*v, expected, epsilon = 1e-5);
        }

        let summary = single.velocity_summary.as_ref().unwrap();
        assert_eq!(summary.histogram.counts, vec![1, 2, 3, 2, 1]);
        assert_relative_eq!(summary.mean, 10.0, epsilon = 1e-3);

        assert!(bundle.ensemble_msd.unwrap().fit.velocity > 0.0);
    }

    #[test]
    fn test_concave_ensemble_fails_the_analysis() {
        let tracks = vec![oscillating_track(0, 12, 1.0), oscillating_track(1, 12, 2.0)];
        let table = TrajectoryTable::new(tracks, 1.0, "micron", "sec").unwrap();

        let err = analyze_table(&table, &AnalysisParams::default()).unwrap_err();
        assert!(matches!(err, MotilityError::NegativeSquaredVelocity(w) if w < 0.0));

        // the per-track path on the same tracks only skips them
        let params = AnalysisParams::builder().msd_weighted(false).build().unwrap();
        let single = analyze_table(&table, &params).unwrap().single_track.unwrap();
        assert!(single.fits.is_empty());
        assert!(single
            .skipped
            .iter()
            .all(|s| matches!(s.reason, MotilityError::NegativeSquaredVelocity(_))));
        assert!(single.velocity_summary.is_none());
    }

    #[test]
    fn test_identical_tracks_fit_unweighted() {
        // same motion, different offsets: no spread at any lag
        let tracks = (0..4)
            .map(|id| {
                let samples = (0..12)
                    .map(|f| Sample::new(f, 0.02 * f as f64, id as f64))
                    .collect();
                Track::new(id, samples).unwrap()
            })
            .collect();
        let table = TrajectoryTable::new(tracks, 1.0, "micron", "sec").unwrap();

        let ensemble = analyze_table(&table, &AnalysisParams::default())
            .unwrap()
            .ensemble_msd
            .unwrap();
        assert!(ensemble.sigma.is_none());
        assert_relative_eq!(ensemble.fit.velocity, 0.02, epsilon = 1e-8);
    }
}
