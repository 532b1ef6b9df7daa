//! # Step kinematics
//!
//! Frame-to-frame displacements and instantaneous speeds of tracks.
//!
//! A **step** joins two samples that are consecutive *in storage order*. When a track skips
//! frames, the step simply spans the gap: its displacement is computed across the missing
//! frames without any interpolation, and its speed still divides by a single
//! `frame_interval`. A one-sample track has no step and contributes nothing.
//!
//! The table-wide [`velocity_distribution`] concatenates every step speed of every track (in
//! track order) and rescales it to **nm/s** with [`NM_PER_MICRON`], positions being expected in
//! microns.
use crate::{
    constants::{Frame, NM_PER_MICRON},
    trajectories::{Track, TrajectoryTable},
};

/// Displacement between two consecutive samples of a track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    /// Frame of the step's starting sample.
    pub frame: Frame,
    pub dx: f64,
    pub dy: f64,
}

impl Step {
    /// Euclidean length of the displacement.
    #[inline]
    pub fn length(&self) -> f64 {
        self.dx.hypot(self.dy)
    }

    /// Squared length, i.e. the dot product of the step with itself.
    #[inline]
    pub fn squared_length(&self) -> f64 {
        self.dx * self.dx + self.dy * self.dy
    }

    #[inline]
    pub fn dot(&self, other: &Step) -> f64 {
        self.dx * other.dx + self.dy * other.dy
    }

    /// Instantaneous speed, in space unit per time unit.
    #[inline]
    pub fn speed(&self, frame_interval: f64) -> f64 {
        self.length() / frame_interval
    }
}

/// All steps of a track, in storage order.
pub fn steps(track: &Track) -> Vec<Step> {
    track
        .samples()
        .windows(2)
        .map(|w| Step {
            frame: w[0].frame,
            dx: w[1].x - w[0].x,
            dy: w[1].y - w[0].y,
        })
        .collect()
}

/// Speed of each step of a track, in space unit per time unit.
pub fn step_speeds(track: &Track, frame_interval: f64) -> Vec<f64> {
    steps(track)
        .iter()
        .map(|s| s.speed(frame_interval))
        .collect()
}

/// Step speeds of every track of the table, in nm/s.
///
/// Arguments
/// -----------------
/// * `table`: The trajectories; positions are expected in microns.
///
/// Return
/// ----------
/// * A flat vector with one entry per step, ordered by track then by step.
pub fn velocity_distribution(table: &TrajectoryTable) -> Vec<f64> {
    table
        .tracks()
        .iter()
        .flat_map(|track| step_speeds(track, table.frame_interval()))
        .map(|v| v * NM_PER_MICRON)
        .collect()
}

#[cfg(test)]
mod kinematics_test {
    use super::*;
    use crate::trajectories::Sample;
    use approx::assert_relative_eq;

    #[test]
    fn test_single_sample_has_no_step() {
        let track = Track::new(0, vec![Sample::new(4, 1.0, 1.0)]).unwrap();
        assert!(steps(&track).is_empty());
        assert!(step_speeds(&track, 1.0).is_empty());
    }

    #[test]
    fn test_steps_span_gaps() {
        let track = Track::new(
            0,
            vec![
                Sample::new(0, 0.0, 0.0),
                Sample::new(1, 3.0, 4.0),
                Sample::new(5, 3.0, 5.0),
            ],
        )
        .unwrap();

        let s = steps(&track);
        assert_eq!(s.len(), 2);
        assert_eq!(s[0], Step { frame: 0, dx: 3.0, dy: 4.0 });
        assert_eq!(s[1], Step { frame: 1, dx: 0.0, dy: 1.0 });

        let v = step_speeds(&track, 0.5);
        assert_relative_eq!(v[0], 10.0);
        // the gap is not divided out
        assert_relative_eq!(v[1], 2.0);
    }

    #[test]
    fn test_velocity_distribution_in_nm_per_second() {
        let a = Track::new(0, vec![Sample::new(0, 0.0, 0.0), Sample::new(1, 0.002, 0.0)]).unwrap();
        let b = Track::new(1, vec![Sample::new(0, 1.0, 1.0)]).unwrap();
        let c = Track::new(
            2,
            vec![
                Sample::new(0, 0.0, 0.0),
                Sample::new(1, 0.0, 0.004),
                Sample::new(2, 0.0, 0.004),
            ],
        )
        .unwrap();
        let table = TrajectoryTable::new(vec![a, b, c], 2.0, "micron", "sec").unwrap();

        let dist = velocity_distribution(&table);
        assert_eq!(dist.len(), 3);
        assert_relative_eq!(dist[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(dist[1], 2.0, epsilon = 1e-12);
        assert_eq!(dist[2], 0.0);
    }
}
