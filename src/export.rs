//! # CSV export of analysis bundles
//!
//! Writes one CSV file per enabled analysis, named after the input file:
//!
//! | file | content |
//! |---|---|
//! | `<stem>_vels_disp.csv` | step velocities (nm/s), one per line, no header |
//! | `<stem>_msd_weighted.csv` | `time, msd_mean, msd_std, count, x_fit, y_fit` |
//! | `<stem>_msd_single_vel_hist.csv` | fitted per-track velocities (nm/s), no header |
//! | `<stem>_all_single_msd_curves.csv` | `time, track_<id>…`, blank cells where a track has no lag |
//! | `<stem>_directionality.csv` | `time_axis, corr_mean, corr_sem, corr_std, count` |
//!
//! Files land next to the input, or in `out_dir` when given. Because every path derives from
//! its input's stem, the outputs of different inputs never collide.
use camino::{Utf8Path, Utf8PathBuf};
use csv::WriterBuilder;

use crate::{
    analysis::{AnalysisBundle, EnsembleMsd},
    autocorrelation::AutocorrelationTable,
    msd::MsdCurveTable,
    motility_errors::MotilityError,
};

/// Path prefix `<dir>/<stem>` shared by all the tables of one input.
pub fn output_stem(input: &Utf8Path, out_dir: Option<&Utf8Path>) -> Utf8PathBuf {
    let dir = out_dir
        .or_else(|| input.parent())
        .unwrap_or_else(|| Utf8Path::new("."));
    dir.join(input.file_stem().unwrap_or("tracks"))
}

fn table_path(stem: &Utf8Path, table: &str) -> Utf8PathBuf {
    Utf8PathBuf::from(format!("{stem}_{table}.csv"))
}

fn cell(v: Option<f64>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

/// Write every table of `bundle`.
///
/// Return
/// ----------
/// * The written paths, in the order of the table above.
pub fn write_bundle(
    input: &Utf8Path,
    bundle: &AnalysisBundle,
    out_dir: Option<&Utf8Path>,
) -> Result<Vec<Utf8PathBuf>, MotilityError> {
    if let Some(dir) = out_dir {
        std::fs::create_dir_all(dir)?;
    }
    let stem = output_stem(input, out_dir);
    let mut written = Vec::new();

    if let Some(v) = &bundle.velocity_distribution {
        let path = table_path(&stem, "vels_disp");
        write_column(&path, v)?;
        written.push(path);
    }
    if let Some(ensemble) = &bundle.ensemble_msd {
        let path = table_path(&stem, "msd_weighted");
        write_ensemble_msd(&path, ensemble, bundle.frame_interval)?;
        written.push(path);
    }
    if let Some(single) = &bundle.single_track {
        let path = table_path(&stem, "msd_single_vel_hist");
        write_column(&path, &single.fitted_velocities)?;
        written.push(path);

        let path = table_path(&stem, "all_single_msd_curves");
        write_msd_curves(&path, &single.curves, bundle.frame_interval)?;
        written.push(path);
    }
    if let Some(corr) = &bundle.directionality {
        let path = table_path(&stem, "directionality");
        write_directionality(&path, corr)?;
        written.push(path);
    }
    Ok(written)
}

/// One value per line, without header.
pub fn write_column(path: &Utf8Path, values: &[f64]) -> Result<(), MotilityError> {
    let mut wtr = WriterBuilder::new().has_headers(false).from_path(path)?;
    for v in values {
        wtr.write_record([v.to_string()])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Ensemble MSD next to the resampled fit; the two column groups have their own lengths.
pub fn write_ensemble_msd(
    path: &Utf8Path,
    ensemble: &EnsembleMsd,
    frame_interval: f64,
) -> Result<(), MotilityError> {
    let mut wtr = WriterBuilder::new().from_path(path)?;
    wtr.write_record(["time", "msd_mean", "msd_std", "count", "x_fit", "y_fit"])?;

    let times = ensemble.times(frame_interval);
    let rows = ensemble.summary.len().max(ensemble.fit_time.len());
    for i in 0..rows {
        let s = ensemble.summary.get(i);
        wtr.write_record([
            cell(times.get(i).copied()),
            cell(s.map(|s| s.mean)),
            cell(s.map(|s| s.std)),
            s.map(|s| s.count.to_string()).unwrap_or_default(),
            cell(ensemble.fit_time.get(i).copied()),
            cell(ensemble.fit_msd.get(i).copied()),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_msd_curves(
    path: &Utf8Path,
    curves: &MsdCurveTable,
    frame_interval: f64,
) -> Result<(), MotilityError> {
    let mut wtr = WriterBuilder::new().from_path(path)?;

    let header = std::iter::once("time".to_string())
        .chain(curves.track_ids.iter().map(|id| format!("track_{id}")));
    wtr.write_record(header)?;

    for (row, t) in curves.time_axis(frame_interval).into_iter().enumerate() {
        let record = std::iter::once(t.to_string())
            .chain(curves.columns.iter().map(|column| cell(column[row])));
        wtr.write_record(record)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_directionality(
    path: &Utf8Path,
    table: &AutocorrelationTable,
) -> Result<(), MotilityError> {
    let mut wtr = WriterBuilder::new().from_path(path)?;
    wtr.write_record(["time_axis", "corr_mean", "corr_sem", "corr_std", "count"])?;
    for i in 0..table.len() {
        wtr.write_record([
            table.time[i].to_string(),
            table.mean[i].to_string(),
            table.sem[i].to_string(),
            table.std[i].to_string(),
            table.count[i].to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
