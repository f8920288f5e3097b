//! Prescription persistence with file locking.
//!
//! The stored prescription lives at `<data_dir>/prescription.json` and is
//! replaced atomically so a reader never sees a half-written document.

use crate::prescription::Prescription;
use crate::{Error, Result};
use fs2::FileExt;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const PRESCRIPTION_FILE: &str = "prescription.json";

/// File-backed store for the active prescription
#[derive(Clone, Debug)]
pub struct PrescriptionStore {
    path: PathBuf,
}

impl PrescriptionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store rooted at a data directory
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(PRESCRIPTION_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored prescription with a shared lock.
    ///
    /// Returns `None` when nothing has been stored yet. An unreadable or
    /// corrupt file is logged and also treated as absent.
    pub fn load(&self) -> Result<Option<Prescription>> {
        let path = &self.path;
        if !path.exists() {
            tracing::info!("No stored prescription at {:?}", path);
            return Ok(None);
        }

        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!("Unable to open prescription file {:?}: {}", path, e);
                return Ok(None);
            }
        };

        if let Err(e) = file.lock_shared() {
            tracing::warn!("Unable to lock prescription file {:?}: {}", path, e);
            return Ok(None);
        }

        let mut contents = String::new();
        let mut reader = std::io::BufReader::new(&file);
        if let Err(e) = reader.read_to_string(&mut contents) {
            let _ = file.unlock();
            tracing::warn!("Failed to read prescription file {:?}: {}", path, e);
            return Ok(None);
        }

        file.unlock()?;

        match Prescription::from_json(&contents) {
            Ok(prescription) => {
                tracing::debug!("Loaded prescription from {:?}", path);
                Ok(Some(prescription))
            }
            Err(e) => {
                tracing::warn!("Failed to parse prescription file {:?}: {}", path, e);
                Ok(None)
            }
        }
    }

    /// Load the stored prescription or fail with [`Error::NoPrescription`]
    pub fn require(&self) -> Result<Prescription> {
        self.load()?.ok_or(Error::NoPrescription)
    }

    /// Validate and atomically replace the stored prescription
    pub fn save(&self, prescription: &Prescription) -> Result<()> {
        prescription.validate()?;

        let parent = self.path.parent().ok_or_else(|| {
            Error::Config(format!("prescription path {:?} has no parent", self.path))
        })?;
        std::fs::create_dir_all(parent)?;

        let temp = NamedTempFile::new_in(parent)?;
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string_pretty(prescription)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        tracing::info!("Saved prescription to {:?}", self.path);
        Ok(())
    }
}
