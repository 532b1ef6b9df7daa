//! analyze-tracks - particle track motility analysis
//!
//! Analyses TrackMate "Tracks" XML exports and writes the result tables as CSV.

use std::process::ExitCode;

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use motility::analysis::AnalysisParams;
use motility::batch::{analyze_batch, discover_inputs, DEFAULT_INPUT_SUFFIX};
use motility::export::write_bundle;
use motility::trajectories::trackmate_reader::read_trackmate_xml;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Velocity, MSD and directionality analysis of particle trajectories.
#[derive(Parser, Debug)]
#[command(name = "analyze-tracks", version, about)]
struct Cli {
    /// TrackMate XML files, or directories scanned for `.xml` files
    #[arg(required = true)]
    inputs: Vec<Utf8PathBuf>,

    /// Fraction of each MSD curve used for fitting, in (0, 1]
    #[arg(long, default_value_t = motility::constants::DEFAULT_CLIP)]
    clip: f64,

    /// Flag every N-th per-track MSD curve for plotting
    #[arg(long, default_value_t = motility::constants::DEFAULT_PLOT_EVERY)]
    plot_every: usize,

    /// Bins of the fitted-velocity histogram
    #[arg(long, default_value_t = motility::constants::DEFAULT_HISTOGRAM_BINS)]
    bins: usize,

    /// Per-track MSD curves need strictly more lags than this to be fitted
    #[arg(long, default_value_t = motility::constants::DEFAULT_MIN_FIT_LAGS)]
    min_fit_lags: usize,

    /// Skip the step velocity distribution
    #[arg(long)]
    skip_track_displacement: bool,

    /// Skip the weighted ensemble MSD fit
    #[arg(long)]
    skip_msd_weighted: bool,

    /// Skip the per-track MSD fits
    #[arg(long)]
    skip_msd_single_track: bool,

    /// Skip the step autocorrelation
    #[arg(long)]
    skip_directionality: bool,

    /// Write the CSV tables here instead of next to each input
    #[arg(long)]
    out_dir: Option<Utf8PathBuf>,

    /// Enable debug output
    #[arg(short, long)]
    verbose: bool,
}

fn collect_inputs(args: &[Utf8PathBuf]) -> anyhow::Result<Vec<Utf8PathBuf>> {
    let mut inputs = Vec::new();
    for arg in args {
        if arg.is_dir() {
            let found = discover_inputs(arg, DEFAULT_INPUT_SUFFIX)
                .with_context(|| format!("cannot list {arg}"))?;
            if found.is_empty() {
                warn!(dir = %arg, "No {} file found", DEFAULT_INPUT_SUFFIX);
            }
            inputs.extend(found);
        } else {
            inputs.push(arg.clone());
        }
    }
    Ok(inputs)
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let params = AnalysisParams::builder()
        .clip(cli.clip)
        .plot_every(cli.plot_every)
        .bins(cli.bins)
        .min_fit_lags(cli.min_fit_lags)
        .track_displacement(!cli.skip_track_displacement)
        .msd_weighted(!cli.skip_msd_weighted)
        .msd_single_track(!cli.skip_msd_single_track)
        .directionality(!cli.skip_directionality)
        .build()
        .context("invalid analysis parameters")?;
    info!("\n{params:#}");

    let inputs = collect_inputs(&cli.inputs)?;
    let out_dir = cli.out_dir.as_deref();

    let report = analyze_batch(&inputs, &params, read_trackmate_xml, |input: &Utf8Path, bundle| {
        print!("{input}\n{bundle}");
        write_bundle(input, bundle, out_dir).map(|_| ())
    });

    println!("{report:#}");

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
