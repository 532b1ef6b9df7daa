//! Progress reporting for batch runs (feature `progress`).
//!
//! [`BatchProgress`] drives an `indicatif` bar over the inputs of a batch. Each finished
//! input updates the message with the time spent on it, a smoothed time per input and the
//! running failure count. The smoothing is an exponential moving average seeded by the
//! first input, so a single slow file does not dominate the estimate.
use std::time::{Duration, Instant};

use indicatif::{HumanDuration, ProgressBar, ProgressStyle};

/// Weight of the newest input in the smoothed time per input.
const SMOOTHING: f64 = 0.2;

/// Exponential moving average of per-input durations, in seconds.
#[inline]
fn smooth(previous: Option<f64>, sample: f64) -> f64 {
    match previous {
        None => sample,
        Some(avg) => SMOOTHING * sample + (1.0 - SMOOTHING) * avg,
    }
}

pub struct BatchProgress {
    bar: ProgressBar,
    input_started: Instant,
    avg_secs: Option<f64>,
    failed: usize,
}

impl BatchProgress {
    pub fn new(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        let style = ProgressStyle::with_template(
            "{bar:40.cyan/blue} {pos}/{len} inputs | ETA {eta} | {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(200));

        BatchProgress {
            bar,
            input_started: Instant::now(),
            avg_secs: None,
            failed: 0,
        }
    }

    /// Record one finished input and start timing the next one.
    pub fn advance(&mut self, succeeded: bool) {
        if !succeeded {
            self.failed += 1;
        }
        let spent = self.input_started.elapsed();
        self.input_started = Instant::now();

        let avg = smooth(self.avg_secs, spent.as_secs_f64());
        self.avg_secs = Some(avg);

        self.bar.set_message(format!(
            "last input: {}, per input: {}, failed: {}",
            HumanDuration(spent),
            HumanDuration(Duration::from_secs_f64(avg)),
            self.failed
        ));
        self.bar.inc(1);
    }

    /// Number of inputs recorded as failed so far.
    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn finish(self) {
        self.bar.finish_and_clear();
    }
}
