//! # Constants and type definitions for motility
//!
//! This module centralizes the **unit conversion factors**, **analysis defaults**, and
//! **common type aliases** used throughout the crate.
//!
//! ## Overview
//!
//! - Unit conversions (microns → nanometres)
//! - Default knobs of the analysis pipeline (clip fraction, histogram bins, …)
//! - Initial guesses of the nonlinear fits
//! - Core type aliases for frames, lags and track identifiers

// -------------------------------------------------------------------------------------------------
// Unit conversions
// -------------------------------------------------------------------------------------------------

/// Microns → nanometres. Speeds are reported in nm/s when positions are in microns.
pub const NM_PER_MICRON: f64 = 1000.0;

/// Space unit spellings for which the nm/s rescaling is physically meaningful.
pub const MICRON_UNITS: [&str; 4] = ["micron", "microns", "um", "µm"];

// -------------------------------------------------------------------------------------------------
// Analysis defaults
// -------------------------------------------------------------------------------------------------

/// Fraction of each MSD curve used for fitting.
pub const DEFAULT_CLIP: f64 = 0.5;

/// Stride selecting which per-track MSD curves are flagged for plotting.
pub const DEFAULT_PLOT_EVERY: usize = 10;

/// Number of bins of the per-track velocity histogram.
pub const DEFAULT_HISTOGRAM_BINS: usize = 10;

/// A per-track MSD curve needs strictly more lags than this to be fitted.
pub const DEFAULT_MIN_FIT_LAGS: usize = 5;

/// Number of points of the resampled ensemble fit curve.
pub const DEFAULT_FIT_CURVE_POINTS: usize = 100;

/// Below this number of fitted tracks the single-track histogram is flagged as unreliable.
pub const MIN_RELIABLE_FITTED_TRACKS: usize = 10;

/// Initial guess `(D, V²)` of the drift–diffusion fit.
pub const DRIFT_DIFFUSION_P0: [f64; 2] = [1.0, 1.0];

/// Initial guess `(a, μ, σ)` of the Gaussian histogram fit.
pub const GAUSSIAN_P0: [f64; 3] = [10.0, 10.0, 10.0];

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Frame index of a detection.
pub type Frame = u32;

/// Time lag expressed in frames.
pub type Lag = u32;

/// Identifier of a track inside a [`TrajectoryTable`](crate::trajectories::TrajectoryTable).
pub type TrackId = u32;
