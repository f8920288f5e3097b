//! Append-only dose log.
//!
//! Each taken or missed dose is appended as one JSON line to
//! `<data_dir>/log/doses.wal` under an exclusive file lock.

use crate::questionnaire::MealEvaluation;
use crate::{MealSlot, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Path of the dose log under a data directory
pub fn dose_log_path(data_dir: &Path) -> PathBuf {
    data_dir.join("log").join("doses.wal")
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DoseStatus {
    Taken,
    Missed,
}

/// One logged dose event
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DoseRecord {
    pub id: Uuid,
    pub meal: MealSlot,
    pub insulin_name: String,
    pub insulin_class: String,
    pub prescribed_dose: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_dose: Option<f64>,
    pub status: DoseStatus,
    pub recorded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gap_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommended_dose: Option<f64>,
    #[serde(default)]
    pub advice: String,
}

impl DoseRecord {
    /// Build a log record from an evaluated meal.
    ///
    /// Only taken and missed outcomes are logged; unlogged, skipped and
    /// awaiting-time meals give `None`.
    pub fn from_evaluation(eval: &MealEvaluation, recorded_at: DateTime<Utc>) -> Option<Self> {
        let status = if eval.result.status.is_taken() {
            DoseStatus::Taken
        } else if eval.result.status.is_missed() {
            DoseStatus::Missed
        } else {
            return None;
        };

        Some(DoseRecord {
            id: Uuid::new_v4(),
            meal: eval.entry.meal,
            insulin_name: eval.entry.insulin_name.clone(),
            insulin_class: eval.entry.insulin_type.to_string(),
            prescribed_dose: eval.entry.prescribed_dose,
            actual_dose: eval.result.actual_dose,
            status,
            recorded_at,
            gap_minutes: eval.result.gap_minutes,
            recommended_dose: eval.result.recommended_dose,
            advice: eval.result.advice.clone(),
        })
    }
}

/// Destination for dose records
pub trait DoseLogSink {
    fn append(&mut self, record: &DoseRecord) -> Result<()>;
}

/// JSONL-based dose log with file locking
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl DoseLogSink for JsonlSink {
    fn append(&mut self, record: &DoseRecord) -> Result<()> {
        self.ensure_parent_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        file.lock_exclusive()?;

        let mut writer = std::io::BufWriter::new(&file);
        let line = serde_json::to_string(record)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        drop(writer);

        file.unlock()?;

        tracing::debug!("Appended {:?} dose for {} to log", record.status, record.meal);
        Ok(())
    }
}

/// Append every loggable evaluation, returning how many records were written
pub fn log_evaluations<S: DoseLogSink + ?Sized>(
    sink: &mut S,
    evaluations: &[MealEvaluation],
    recorded_at: DateTime<Utc>,
) -> Result<usize> {
    let mut written = 0;
    for record in evaluations
        .iter()
        .filter_map(|e| DoseRecord::from_evaluation(e, recorded_at))
    {
        sink.append(&record)?;
        written += 1;
    }
    Ok(written)
}

/// Read all records from a dose log, skipping lines that fail to parse
pub fn read_records(path: &Path) -> Result<Vec<DoseRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut records = Vec::new();

    // Lines are not guaranteed to be valid UTF-8
    for (line_num, line_result) in reader.split(b'\n').enumerate() {
        let line = line_result?;
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        match serde_json::from_slice::<DoseRecord>(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!("Failed to parse dose record at line {}: {}", line_num + 1, e);
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} dose records from log", records.len());
    Ok(records)
}
