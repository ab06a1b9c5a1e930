//! File-backed registry for the active index handle.
//!
//! Holds zero or one [`IndexHandle`] as a single JSON record. Last writer
//! wins; at most one build or delete is expected to run at a time.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::models::IndexHandle;

pub struct IndexRegistry {
    path: PathBuf,
}

impl IndexRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted handle, if any. A malformed record is a
    /// configuration error, not a silent miss.
    pub fn load(&self) -> Result<Option<IndexHandle>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        let handle: IndexHandle = serde_json::from_str(content.trim()).map_err(|e| {
            Error::Config(format!(
                "malformed index handle record at {}: {}",
                self.path.display(),
                e
            ))
        })?;
        Ok(Some(handle))
    }

    /// Persist `handle` as the new active record, overwriting any prior value.
    pub fn store(&self, handle: &IndexHandle) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(handle)
            .map_err(|e| Error::Config(format!("failed to encode index handle: {}", e)))?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    /// Remove the record. Missing file is fine — clearing is idempotent.
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
