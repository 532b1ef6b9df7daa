//! # Analysis results
//!
//! [`AnalysisBundle`] gathers everything [`analyze_table`](crate::analysis::analyze_table)
//! computed for one trajectory table, ready to be handed to a presentation layer (plots,
//! spreadsheets). Each analysis is an `Option`, `None` when it was disabled.
//!
//! ## Units
//!
//! * step velocities and per-track fitted velocities: **nm/s** (positions in microns);
//! * MSD values and fit parameters: table space and time units (`D` in space²/time, `V` in
//!   space/time);
//! * time axes: table time unit (`lag · frame_interval`).
use std::fmt;

use crate::{
    autocorrelation::AutocorrelationTable,
    constants::TrackId,
    curves::LagSummary,
    fitting::{drift_diffusion::DriftDiffusionFit, gaussian::GaussianFit},
    msd::MsdCurveTable,
    motility_errors::MotilityError,
};

/// Successful per-track drift–diffusion fit.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackFit {
    pub id: TrackId,
    pub fit: DriftDiffusionFit,
}

/// A track left out of the per-track fits, and why.
#[derive(Debug, PartialEq)]
pub struct SkippedTrack {
    pub id: TrackId,
    pub reason: MotilityError,
}

/// Per-track MSD analysis.
#[derive(Debug, PartialEq)]
pub struct SingleTrackMsd {
    /// Every non-empty per-track MSD curve on a common lag axis.
    pub curves: MsdCurveTable,
    /// Fitted tracks, in table order.
    pub fits: Vec<TrackFit>,
    pub skipped: Vec<SkippedTrack>,
    /// `V` of every fitted track, in nm/s, aligned with `fits`.
    pub fitted_velocities: Vec<f64>,
    /// Gaussian summary of `fitted_velocities`; `None` when there is nothing to summarise or
    /// the fit failed.
    pub velocity_summary: Option<GaussianFit>,
    /// Ids of the tracks selected by the `plot_every` stride.
    pub plotted_tracks: Vec<TrackId>,
}

/// Weighted ensemble MSD and its drift–diffusion fit.
#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleMsd {
    /// Per-lag mean / std / sem / count, lag 0 included.
    pub summary: Vec<LagSummary>,
    /// Fit weights, `None` when the fit ran unweighted.
    pub sigma: Option<Vec<f64>>,
    pub fit: DriftDiffusionFit,
    /// Dense time axis over `[0, t_max]` for overlaying the fitted curve.
    pub fit_time: Vec<f64>,
    pub fit_msd: Vec<f64>,
}

impl EnsembleMsd {
    pub fn times(&self, frame_interval: f64) -> Vec<f64> {
        self.summary
            .iter()
            .map(|s| s.lag as f64 * frame_interval)
            .collect()
    }
}

/// Output of one [`analyze_table`](crate::analysis::analyze_table) call.
#[derive(Debug, PartialEq)]
pub struct AnalysisBundle {
    pub frame_interval: f64,
    pub space_unit: String,
    pub time_unit: String,
    pub velocity_distribution: Option<Vec<f64>>,
    pub single_track: Option<SingleTrackMsd>,
    pub ensemble_msd: Option<EnsembleMsd>,
    pub directionality: Option<AutocorrelationTable>,
}

impl fmt::Display for AnalysisBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (space, time) = (&self.space_unit, &self.time_unit);

        if let Some(v) = &self.velocity_distribution {
            let mean = if v.is_empty() {
                f64::NAN
            } else {
                v.iter().sum::<f64>() / v.len() as f64
            };
            writeln!(f, "Step velocities : {} steps, mean {:.2} nm/s", v.len(), mean)?;
        }

        if let Some(s) = &self.single_track {
            write!(
                f,
                "Single-track MSD: {} fitted, {} skipped",
                s.fits.len(),
                s.skipped.len()
            )?;
            match &s.velocity_summary {
                Some(g) => writeln!(f, ", V = {:.2} ± {:.2} nm/s", g.mean, g.sigma)?,
                None => writeln!(f)?,
            }
        }

        if let Some(e) = &self.ensemble_msd {
            writeln!(
                f,
                "Ensemble MSD    : D = {:.4e} ± {:.1e} {space}²/{time}, V = {:.4e} ± {:.1e} {space}/{time}",
                e.fit.diffusion, e.fit.diffusion_std, e.fit.velocity, e.fit.velocity_std
            )?;
        }

        if let Some(d) = &self.directionality {
            writeln!(f, "Directionality  : {} lags", d.len())?;
        }
        Ok(())
    }
}
