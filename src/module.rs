//! Run orchestration: one pass over the discovered series groups.

use std::path::{Path, PathBuf};

use crate::process::{self, ProcessError};
use crate::report::{self, ReportError};
use crate::series::{SeriesIndex, SeriesScanError};
use crate::settings::{Settings, SettingsError};
use crate::uid::UidSource;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("input directory {} does not exist", .0.display())]
    InputDirMissing(PathBuf),

    #[error("output directory {} does not exist", .0.display())]
    OutputDirMissing(PathBuf),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Scan(#[from] SeriesScanError),

    #[error("failed to process slice: {0}")]
    Process(#[from] ProcessError),

    #[error("failed to create report: {0}")]
    Report(#[from] ReportError),
}

/// Counters for one completed run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub series: usize,
    pub slices: usize,
    pub reports: usize,
}

/// Verifies that both host-supplied directories exist.
pub fn check_directories(input_dir: &Path, output_dir: &Path) -> Result<(), ModuleError> {
    if !input_dir.is_dir() {
        return Err(ModuleError::InputDirMissing(input_dir.to_path_buf()));
    }
    if !output_dir.is_dir() {
        return Err(ModuleError::OutputDirMissing(output_dir.to_path_buf()));
    }
    Ok(())
}

/// Processes every series found in the input directory.
///
/// Per group: one fresh series UID for the smoothed slices, then a second
/// fresh series UID for the report derived from the group's first file.
/// Settings apply uniformly to all groups; any per-file failure aborts the
/// run, leaving earlier output files in place.
pub fn run(
    input_dir: &Path,
    output_dir: &Path,
    settings: &Settings,
    uids: &dyn UidSource,
) -> Result<RunSummary, ModuleError> {
    check_directories(input_dir, output_dir)?;

    let index = SeriesIndex::from_directory(input_dir)?;
    if index.is_empty() {
        log::info!("no DICOM series found in {}", input_dir.display());
    }

    let mut summary = RunSummary::default();
    for group in index.iter() {
        let series_uid = uids.fresh();
        log::info!(
            "series {}: {} slice(s) -> {}",
            group.uid,
            group.files.len(),
            series_uid
        );
        for file_name in &group.files {
            process::process_slice(
                input_dir,
                file_name,
                output_dir,
                &series_uid,
                settings,
                uids,
            )?;
            summary.slices += 1;
        }

        // Groups always hold at least one file; the first discovered slice
        // serves as the report's reference.
        let report_series_uid = uids.fresh();
        report::create_report(
            input_dir,
            group.reference_file(),
            output_dir,
            &report_series_uid,
            settings,
            uids,
        )?;
        summary.reports += 1;
        summary.series += 1;
    }

    Ok(summary)
}
