//! JSON persistence for the usage ledger.
//!
//! One record per installation. A missing file is not an error: a fresh ledger
//! is returned. A file that exists but does not decode is `StorageCorrupt`.
//! Saves write a sibling temp file and rename it over the record.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Local;

use crate::config;
use crate::core::ledger::Status;
use crate::error::AppError;

/// Location of the persisted ledger record. Clones share a write lock, so the
/// status ticker and the coordinator never interleave writes to the temp file.
#[derive(Debug, Clone)]
pub struct StatusStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl StatusStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// `<platform data dir>/traffic-ledger/status.json`, relative to the working
    /// directory when the platform has no data directory.
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_default()
            .join(config::APP_DIR_NAME)
            .join(config::STATUS_FILE_NAME)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the ledger, or build a fresh one with `default_threshold` if no
    /// record exists yet.
    pub fn load_or_default(&self, default_threshold: u64) -> Result<Status, AppError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(
                    "No ledger at {}, starting fresh (threshold {default_threshold} B)",
                    self.path.display()
                );
                return Ok(Status::new("", default_threshold, Local::now()));
            }
            Err(e) => {
                return Err(AppError::StorageUnavailable(format!(
                    "failed to read {}: {e}",
                    self.path.display()
                )))
            }
        };

        serde_json::from_str(&raw).map_err(|e| {
            AppError::StorageCorrupt(format!(
                "ledger at {} cannot be decoded: {e}",
                self.path.display()
            ))
        })
    }

    /// Write the ledger. Overwriting with identical values is harmless.
    pub fn save(&self, status: &Status) -> Result<(), AppError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut json = serde_json::to_vec_pretty(status)
            .map_err(|e| AppError::StorageUnavailable(e.to_string()))?;
        json.push(b'\n');

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
