//! Module settings and task-descriptor loading.
//!
//! The routing host drops a `task.json` next to the incoming slices. Only
//! `process.settings.sigma` and `process.settings.series_offset` are
//! recognized; a descriptor that parses but lacks that nested shape counts
//! as "no overrides", while a missing or unparsable file aborts the run.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

/// Name of the task descriptor inside the input directory.
pub const TASK_FILENAME: &str = "task.json";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot read task descriptor {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        source: io::Error,
    },

    #[error("task descriptor {} is not valid JSON: {source}", path.display())]
    Unparsable {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Processing settings, loaded once per run and never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// Standard deviation of the Gaussian filter.
    pub sigma: i64,
    /// Offset added to the copied series number so the processed series
    /// does not collide with the original in a downstream archive.
    pub series_offset: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            sigma: 7,
            series_offset: 1000,
        }
    }
}

impl Settings {
    /// Loads settings from the task descriptor inside `input_dir`.
    pub fn load(input_dir: &Path) -> Result<Self, SettingsError> {
        let path = input_dir.join(TASK_FILENAME);
        let text = fs::read_to_string(&path).map_err(|source| SettingsError::Unreadable {
            path: path.clone(),
            source,
        })?;
        let task: Value =
            serde_json::from_str(&text).map_err(|source| SettingsError::Unparsable {
                path,
                source,
            })?;
        Ok(Self::from_task(&task))
    }

    /// Applies overrides from a parsed task descriptor on top of the
    /// defaults. Lookups are optional at every level, so any shape
    /// mismatch falls back to the default value for that key.
    pub fn from_task(task: &Value) -> Self {
        let mut settings = Settings::default();
        if let Some(overrides) = task.get("process").and_then(|p| p.get("settings")) {
            if let Some(sigma) = overrides.get("sigma").and_then(Value::as_i64) {
                settings.sigma = sigma;
            }
            if let Some(offset) = overrides.get("series_offset").and_then(Value::as_i64) {
                settings.series_offset = offset;
            }
        }
        settings
    }
}
