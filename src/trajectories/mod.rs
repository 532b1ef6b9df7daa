//! # Trajectories: data model and ingestion
//!
//! The central type is [`TrajectoryTable`], an ordered collection of [`Track`]s sharing a
//! frame interval and physical units. Every analysis of the crate consumes a table by
//! shared reference; nothing mutates it after construction.
//!
//! Modules
//! -----------------
//! * [`trackmate_reader`](crate::trajectories::trackmate_reader) – TrackMate "Tracks" XML ingestion.
//!
//! Data Model
//! -----------------
//! * **[`Sample`]** – one detection: integer frame index and `(x, y)` position in space units.
//! * **[`Track`]** – identifier plus samples ordered by **strictly increasing** frame index.
//!   Frames need not be contiguous; gaps are kept as-is and never interpolated.
//! * **[`TrajectoryTable`]** – tracks (in ingestion order) plus `frame_interval` (time units per
//!   frame), `space_unit` and `time_unit`.
//!
//! Validation
//! -----------------
//! Both [`Track::new`] and [`TrajectoryTable::new`] validate their invariants and return
//! [`MotilityError::MalformedInput`] on violation:
//! * a track has at least one sample, frames strictly increase, coordinates are finite;
//! * `frame_interval` is finite and strictly positive, units are non-empty, track ids are unique.
//!
//! Example
//! -----------------
//! ```rust
//! use motility::trajectories::{Sample, Track, TrajectoryTable};
//!
//! # fn main() -> Result<(), motility::motility_errors::MotilityError> {
//! let track = Track::new(0, vec![Sample::new(0, 0.0, 0.0), Sample::new(1, 0.1, 0.0)])?;
//! let table = TrajectoryTable::new(vec![track], 2.0, "micron", "sec")?;
//! assert_eq!(table.total_samples(), 2);
//! # Ok(()) }
//! ```
use std::fmt;

use ahash::AHashSet;

use crate::{
    constants::{Frame, TrackId},
    motility_errors::MotilityError,
};

pub mod trackmate_reader;

/// One detection of a tracked particle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub frame: Frame,
    pub x: f64,
    pub y: f64,
}

impl Sample {
    pub fn new(frame: Frame, x: f64, y: f64) -> Self {
        Sample { frame, x, y }
    }

    /// Squared Euclidean distance to another sample.
    #[inline]
    pub fn squared_distance(&self, other: &Sample) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        dx * dx + dy * dy
    }
}

/// A single particle trajectory.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    id: TrackId,
    samples: Vec<Sample>,
}

impl Track {
    /// Build a validated track.
    ///
    /// Arguments
    /// -----------------
    /// * `id`: Identifier of the track inside its table.
    /// * `samples`: Detections, ordered by frame.
    ///
    /// Return
    /// ----------
    /// * `Ok(Track)` when the track has at least one sample, strictly increasing frames and
    ///   finite coordinates.
    /// * `Err(MotilityError::MalformedInput)` otherwise.
    pub fn new(id: TrackId, samples: Vec<Sample>) -> Result<Self, MotilityError> {
        if samples.is_empty() {
            return Err(MotilityError::MalformedInput(format!(
                "track {id} has no samples"
            )));
        }
        if let Some(bad) = samples.iter().find(|s| !s.x.is_finite() || !s.y.is_finite()) {
            return Err(MotilityError::MalformedInput(format!(
                "track {id} has a non-finite position at frame {}",
                bad.frame
            )));
        }
        if let Some(w) = samples.windows(2).find(|w| w[1].frame <= w[0].frame) {
            return Err(MotilityError::MalformedInput(format!(
                "track {id} frames are not strictly increasing ({} then {})",
                w[0].frame, w[1].frame
            )));
        }
        Ok(Track { id, samples })
    }

    #[inline]
    pub fn id(&self) -> TrackId {
        self.id
    }

    #[inline]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Number of samples (always ≥ 1).
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always `false`; present for API symmetry with `len`.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// `true` when consecutive samples are not on consecutive frames somewhere.
    pub fn has_gaps(&self) -> bool {
        self.samples
            .windows(2)
            .any(|w| w[1].frame - w[0].frame != 1)
    }
}

/// A full set of trajectories sharing one acquisition setup.
///
/// Built once (by a reader or by hand) and then only borrowed by the analyses.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryTable {
    tracks: Vec<Track>,
    frame_interval: f64,
    space_unit: String,
    time_unit: String,
}

impl TrajectoryTable {
    /// Build a validated table.
    ///
    /// Arguments
    /// -----------------
    /// * `tracks`: The tracks, in the order they should be analysed and reported.
    /// * `frame_interval`: Time between two frames, in `time_unit`.
    /// * `space_unit`: Unit of the positions (e.g. `"micron"`).
    /// * `time_unit`: Unit of `frame_interval` (e.g. `"sec"`).
    ///
    /// Return
    /// ----------
    /// * `Err(MotilityError::MalformedInput)` if `frame_interval` is not a finite positive number,
    ///   a unit is empty, or two tracks share the same id.
    pub fn new(
        tracks: Vec<Track>,
        frame_interval: f64,
        space_unit: impl Into<String>,
        time_unit: impl Into<String>,
    ) -> Result<Self, MotilityError> {
        if !(frame_interval.is_finite() && frame_interval > 0.0) {
            return Err(MotilityError::MalformedInput(format!(
                "frame interval must be a finite positive number, got {frame_interval}"
            )));
        }
        let space_unit = space_unit.into();
        let time_unit = time_unit.into();
        if space_unit.trim().is_empty() || time_unit.trim().is_empty() {
            return Err(MotilityError::MalformedInput(
                "space and time units must be non-empty".into(),
            ));
        }

        let mut seen = AHashSet::with_capacity(tracks.len());
        for track in &tracks {
            if !seen.insert(track.id) {
                return Err(MotilityError::MalformedInput(format!(
                    "duplicate track id {}",
                    track.id
                )));
            }
        }

        Ok(TrajectoryTable {
            tracks,
            frame_interval,
            space_unit,
            time_unit,
        })
    }

    #[inline]
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    #[inline]
    pub fn frame_interval(&self) -> f64 {
        self.frame_interval
    }

    #[inline]
    pub fn space_unit(&self) -> &str {
        &self.space_unit
    }

    #[inline]
    pub fn time_unit(&self) -> &str {
        &self.time_unit
    }

    /// Number of tracks.
    #[inline]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Total number of samples across all tracks.
    pub fn total_samples(&self) -> usize {
        self.tracks.iter().map(Track::len).sum()
    }

    /// Distribution statistics of the number of samples per track.
    ///
    /// Percentiles use the *nearest-rank* method: index `round(q × (N-1))`, clamped.
    ///
    /// Return
    /// ----------
    /// * `None` if the table has no track.
    pub fn track_length_stats(&self) -> Option<TrackLengthStats> {
        let mut counts: Vec<usize> = self.tracks.iter().map(Track::len).collect();
        if counts.is_empty() {
            return None;
        }
        counts.sort_unstable();

        #[inline]
        fn q_index(n: usize, q: f64) -> usize {
            let pos = q * (n as f64 - 1.0);
            let idx = pos.round() as isize;
            idx.clamp(0, (n as isize) - 1) as usize
        }

        let n = counts.len();
        Some(TrackLengthStats {
            min: counts[0],
            p25: counts[q_index(n, 0.25)],
            median: counts[q_index(n, 0.50)],
            p95: counts[q_index(n, 0.95)],
            max: counts[n - 1],
        })
    }
}

/// Summary statistics of the number of samples per track.
///
/// Display
/// -----------------
/// * `format!("{}", stats)` – compact single line, e.g. `min=1, p25=3, median=8, p95=40, max=52`.
/// * `format!("{:#}", stats)` – multi-line table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackLengthStats {
    pub min: usize,
    pub p25: usize,
    pub median: usize,
    pub p95: usize,
    pub max: usize,
}

impl fmt::Display for TrackLengthStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            writeln!(f, "Samples per track - summary")?;
            writeln!(f, "---------------------------")?;
            writeln!(f, "min    : {}", self.min)?;
            writeln!(f, "p25    : {}", self.p25)?;
            writeln!(f, "median : {}", self.median)?;
            writeln!(f, "p95    : {}", self.p95)?;
            write!(f, "max    : {}", self.max)
        } else {
            write!(
                f,
                "min={}, p25={}, median={}, p95={}, max={}",
                self.min, self.p25, self.median, self.p95, self.max
            )
        }
    }
}
