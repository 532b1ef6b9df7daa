//! # Batch analysis over many trajectory files
//!
//! Run [`analyze_table`] over a list of inputs, each one in its **own failure scope**, and
//! collect a [`BatchReport`].
//!
//! ## Per-input pipeline
//! -----------------
//! ```text
//! load(input) -> TrajectoryTable -> analyze_table -> AnalysisBundle -> sink(input, bundle)
//! ```
//!
//! A failure at any stage (malformed file, failed ensemble fit, export error) is captured as
//! a [`BatchItemFailure`] carrying the input path and the error, logged, and the batch moves
//! on to the next input. The report keeps **one outcome per input, in input order**.
//!
//! ## Execution modes
//! -----------------
//! * default: inputs are loaded, analysed and sunk one after the other;
//! * feature `parallel`: loading and analysis run on the rayon thread pool, results are
//!   collected in input order and the sink still runs sequentially, so outputs are written
//!   exactly as in the sequential mode;
//! * feature `progress`: an `indicatif` bar tracks the sink loop (see [`progress_bar`]).
//!
//! ## Example
//! -----------------
//! ```rust,no_run
//! use camino::Utf8Path;
//! use motility::analysis::AnalysisParams;
//! use motility::batch::analyze_directory;
//!
//! let params = AnalysisParams::default();
//! let report = analyze_directory(Utf8Path::new("tracks/"), &params, None).unwrap();
//! println!("{report}");
//! for failure in report.failures() {
//!     eprintln!("{failure}");
//! }
//! ```
use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{error, info};

#[cfg(feature = "progress")]
pub mod progress_bar;

use crate::{
    analysis::{analyze_table, AnalysisBundle, AnalysisParams},
    export,
    motility_errors::MotilityError,
    trajectories::{trackmate_reader::read_trackmate_xml, TrajectoryTable},
};

/// File suffix picked up by [`analyze_directory`].
pub const DEFAULT_INPUT_SUFFIX: &str = ".xml";

/// Failure of one batch input.
#[derive(Error, Debug, PartialEq)]
#[error("{input}: {source}")]
pub struct BatchItemFailure {
    pub input: Utf8PathBuf,
    #[source]
    pub source: MotilityError,
}

/// Outcomes of a batch run, in input order.
#[derive(Debug, Default, PartialEq)]
pub struct BatchReport {
    pub outcomes: Vec<Result<Utf8PathBuf, BatchItemFailure>>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// Number of inputs analysed and sunk successfully.
    pub fn processed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.processed()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &BatchItemFailure> {
        self.outcomes.iter().filter_map(|o| o.as_ref().err())
    }

    pub fn processed_inputs(&self) -> impl Iterator<Item = &Utf8Path> {
        self.outcomes
            .iter()
            .filter_map(|o| o.as_ref().ok())
            .map(Utf8PathBuf::as_path)
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} input(s): {} processed, {} failed",
            self.total(),
            self.processed(),
            self.failed()
        )?;
        if f.alternate() {
            for failure in self.failures() {
                write!(f, "\n  - {failure}")?;
            }
        }
        Ok(())
    }
}

/// Files of `dir` whose name ends with `suffix`, sorted by file name.
pub fn discover_inputs(dir: &Utf8Path, suffix: &str) -> Result<Vec<Utf8PathBuf>, MotilityError> {
    let mut inputs = Vec::new();
    for entry in dir.read_dir_utf8()? {
        let entry = entry?;
        if entry.file_type()?.is_file() && entry.file_name().ends_with(suffix) {
            inputs.push(entry.into_path());
        }
    }
    inputs.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(inputs)
}

fn load_and_analyze<L>(
    input: &Utf8Path,
    params: &AnalysisParams,
    load: &L,
) -> Result<AnalysisBundle, MotilityError>
where
    L: Fn(&Utf8Path) -> Result<TrajectoryTable, MotilityError>,
{
    let table = load(input)?;
    analyze_table(&table, params)
}

/// Analyse every input, isolating failures per input.
///
/// Arguments
/// -----------------
/// * `inputs`: Input paths, processed and reported in this order.
/// * `params`: Analysis configuration shared by every input.
/// * `load`: Builds the trajectory table of an input (e.g. [`read_trackmate_xml`]).
/// * `sink`: Receives each successful bundle (e.g. the CSV exporter).
///
/// Return
/// ----------
/// * A [`BatchReport`]; invalid `params` make every input fail with the same error.
pub fn analyze_batch<L, S>(
    inputs: &[Utf8PathBuf],
    params: &AnalysisParams,
    load: L,
    mut sink: S,
) -> BatchReport
where
    L: Fn(&Utf8Path) -> Result<TrajectoryTable, MotilityError> + Sync,
    S: FnMut(&Utf8Path, &AnalysisBundle) -> Result<(), MotilityError>,
{
    info!(inputs = inputs.len(), %params, "Starting batch");

    #[cfg(feature = "parallel")]
    let analysed = {
        use rayon::prelude::*;
        inputs
            .par_iter()
            .map(|input| load_and_analyze(input, params, &load))
            .collect::<Vec<_>>()
    };
    #[cfg(not(feature = "parallel"))]
    let analysed = inputs
        .iter()
        .map(|input| load_and_analyze(input, params, &load));

    #[cfg(feature = "progress")]
    let mut progress = progress_bar::BatchProgress::new(inputs.len());

    let mut report = BatchReport::default();
    for (input, analysis) in inputs.iter().zip(analysed) {
        info!(input = %input, "Processing");

        let outcome = analysis
            .and_then(|bundle| sink(input, &bundle))
            .map(|_| input.clone())
            .map_err(|source| {
                error!(input = %input, error = %source, "Input failed, skipping");
                BatchItemFailure {
                    input: input.clone(),
                    source,
                }
            });

        #[cfg(feature = "progress")]
        progress.advance(outcome.is_ok());

        report.outcomes.push(outcome);
    }

    #[cfg(feature = "progress")]
    progress.finish();

    info!(
        processed = report.processed(),
        failed = report.failed(),
        "Batch complete"
    );
    report
}

/// Analyse every TrackMate file of `dir` and write the CSV tables.
///
/// Arguments
/// -----------------
/// * `dir`: Directory scanned for [`DEFAULT_INPUT_SUFFIX`] files.
/// * `params`: Analysis configuration.
/// * `out_dir`: Where to write the tables; next to each input when `None`.
///
/// Return
/// ----------
/// * `Err` only when `dir` cannot be listed; per-input failures are in the report.
pub fn analyze_directory(
    dir: &Utf8Path,
    params: &AnalysisParams,
    out_dir: Option<&Utf8Path>,
) -> Result<BatchReport, MotilityError> {
    let inputs = discover_inputs(dir, DEFAULT_INPUT_SUFFIX)?;
    if inputs.is_empty() {
        info!(dir = %dir, "No input file found");
    }
    Ok(analyze_batch(
        &inputs,
        params,
        read_trackmate_xml,
        |input, bundle| export::write_bundle(input, bundle, out_dir).map(|_| ()),
    ))
}
