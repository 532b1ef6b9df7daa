//! # Drift–diffusion MSD model
//!
//! `MSD(t) = D·t + V²·t²`
//!
//! The linear term is the diffusive contribution (`D` in space²/time, with the usual factor
//! `4` of 2-D diffusion absorbed in it) and the quadratic term the directed transport at speed
//! `V`. The model is linear in `(D, W = V²)`; `V` is recovered as `sqrt(W)` and a negative `W`
//! is rejected as non-physical.
use crate::{
    constants::DRIFT_DIFFUSION_P0,
    fitting::{clip_count, levenberg_marquardt, CurveModel, FitOptions, FitResult},
    motility_errors::MotilityError,
};

/// `D·t + W·t²`, parameters `[D, W]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DriftDiffusion;

impl CurveModel for DriftDiffusion {
    fn n_params(&self) -> usize {
        2
    }

    #[inline]
    fn value(&self, t: f64, p: &[f64]) -> f64 {
        p[0] * t + p[1] * t * t
    }

    #[inline]
    fn partials(&self, t: f64, _p: &[f64], out: &mut [f64]) {
        out[0] = t;
        out[1] = t * t;
    }
}

/// Drift–diffusion parameters with their one-sigma uncertainties.
#[derive(Debug, Clone, PartialEq)]
pub struct DriftDiffusionFit {
    pub diffusion: f64,
    pub diffusion_std: f64,
    /// `V = sqrt(W)`.
    pub velocity: f64,
    /// First-order propagation `σ_W / (2V)`; `sqrt(σ_W)` when `V = 0`.
    pub velocity_std: f64,
    pub velocity_squared: f64,
    pub velocity_squared_std: f64,
    pub fit: FitResult,
}

impl DriftDiffusionFit {
    fn from_fit(fit: FitResult) -> Result<Self, MotilityError> {
        let (d, w) = (fit.parameters[0], fit.parameters[1]);
        let (d_std, w_std) = (fit.std_errors[0], fit.std_errors[1]);

        if w < 0.0 {
            return Err(MotilityError::NegativeSquaredVelocity(w));
        }
        let velocity = w.sqrt();
        let velocity_std = if velocity > 0.0 {
            w_std / (2.0 * velocity)
        } else {
            w_std.sqrt()
        };

        Ok(DriftDiffusionFit {
            diffusion: d,
            diffusion_std: d_std,
            velocity,
            velocity_std,
            velocity_squared: w,
            velocity_squared_std: w_std,
            fit,
        })
    }

    /// Model value at time `t`.
    #[inline]
    pub fn value_at(&self, t: f64) -> f64 {
        DriftDiffusion.value(t, &[self.diffusion, self.velocity_squared])
    }

    /// Model sampled at `n_points` evenly spaced times over `[0, t_max]`.
    pub fn curve(&self, t_max: f64, n_points: usize) -> (Vec<f64>, Vec<f64>) {
        let times: Vec<f64> = match n_points {
            0 => Vec::new(),
            1 => vec![0.0],
            n => (0..n)
                .map(|i| t_max * i as f64 / (n - 1) as f64)
                .collect(),
        };
        let values = times.iter().map(|&t| self.value_at(t)).collect();
        (times, values)
    }
}

/// Fit the drift–diffusion model to the leading part of an MSD curve.
///
/// Arguments
/// -----------------
/// * `times`: Lag times, increasing.
/// * `msd`: MSD values aligned with `times`.
/// * `sigma`: Optional per-point uncertainties aligned with `times`.
/// * `clip`: Fraction in `(0, 1]` of the curve used for the fit; the first
///   `floor(len · clip)` points are kept.
///
/// Return
/// ----------
/// * `Ok(DriftDiffusionFit)` on success.
/// * `Err(MotilityError::InvalidAnalysisParameter)` for a clip outside `(0, 1]`.
/// * `Err(MotilityError::InsufficientData)` when fewer than two points remain.
/// * `Err(MotilityError::FitNonConvergence)` when the solver fails.
/// * `Err(MotilityError::NegativeSquaredVelocity)` when `V²` comes out negative.
pub fn fit_drift_diffusion(
    times: &[f64],
    msd: &[f64],
    sigma: Option<&[f64]>,
    clip: f64,
) -> Result<DriftDiffusionFit, MotilityError> {
    if !(clip > 0.0 && clip <= 1.0) {
        return Err(MotilityError::InvalidAnalysisParameter(format!(
            "clip must lie in (0, 1], got {clip}"
        )));
    }
    if msd.len() != times.len() || sigma.is_some_and(|s| s.len() != times.len()) {
        return Err(MotilityError::InvalidAnalysisParameter(
            "MSD times, values and sigmas must have the same length".into(),
        ));
    }

    let kept = clip_count(times.len(), clip);
    if kept < 2 {
        return Err(MotilityError::InsufficientData(format!(
            "clip {clip} keeps {kept} of {} MSD points, at least 2 are required",
            times.len()
        )));
    }

    let fit = levenberg_marquardt(
        &DriftDiffusion,
        &times[..kept],
        &msd[..kept],
        sigma.map(|s| &s[..kept]),
        &DRIFT_DIFFUSION_P0,
        &FitOptions::default(),
    )?;
    DriftDiffusionFit::from_fit(fit)
}
