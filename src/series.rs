//! Series discovery based on the routing host's filename convention.
//!
//! Incoming slices are named `<seriesUID>#<sopUID>.dcm`, so the series a
//! file belongs to can be derived without opening it. The index is built
//! once per run; nothing re-scans the directory afterwards.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Filename suffix that marks a file as a DICOM slice.
pub const DICOM_EXTENSION: &str = ".dcm";

/// Separator between the series UID and the SOP UID in a filename.
pub const SERIES_SEPARATOR: char = '#';

#[derive(Debug, Error)]
pub enum SeriesScanError {
    #[error("cannot read input directory {}: {source}", path.display())]
    ReadDir {
        path: PathBuf,
        source: io::Error,
    },
}

/// All slices of one series, in discovery order.
#[derive(Debug)]
pub struct SeriesGroup {
    pub uid: String,
    pub files: Vec<String>,
}

impl SeriesGroup {
    /// The first discovered slice, used as the reference for the report.
    pub fn reference_file(&self) -> &str {
        &self.files[0]
    }
}

/// Ordered mapping from series UID to the filenames that carry it.
///
/// Groups appear in first-seen order; a group always holds at least one
/// file.
#[derive(Debug, Default)]
pub struct SeriesIndex {
    groups: Vec<SeriesGroup>,
}

impl SeriesIndex {
    /// Scans a directory once and partitions the matching filenames.
    ///
    /// Only regular files whose name ends in `.dcm` and contains the `#`
    /// separator participate; everything else (subdirectories, the task
    /// descriptor, stray files) is skipped.
    pub fn from_directory(dir: &Path) -> Result<Self, SeriesScanError> {
        let entries = fs::read_dir(dir).map_err(|source| SeriesScanError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut index = SeriesIndex::default();
        for entry in entries {
            let entry = entry.map_err(|source| SeriesScanError::ReadDir {
                path: dir.to_path_buf(),
                source,
            })?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.ends_with(DICOM_EXTENSION) {
                continue;
            }
            let is_file = entry.file_type().map(|ty| ty.is_file()).unwrap_or(false);
            if !is_file {
                continue;
            }
            let Some((series_uid, _)) = name.split_once(SERIES_SEPARATOR) else {
                log::warn!("skipping {name}: no series separator in filename");
                continue;
            };
            index.insert(series_uid, name.clone());
        }
        Ok(index)
    }

    fn insert(&mut self, series_uid: &str, file: String) {
        match self.groups.iter_mut().find(|group| group.uid == series_uid) {
            Some(group) => group.files.push(file),
            None => self.groups.push(SeriesGroup {
                uid: series_uid.to_owned(),
                files: vec![file],
            }),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &SeriesGroup> {
        self.groups.iter()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
