//! Append-only dose log.
//!
//! Completed doses are appended to a JSONL (JSON Lines) file with file
//! locking to ensure safe concurrent access. The log is what answers
//! "was this dose taken" for the schedule engine and feeds the CSV
//! export.

use crate::{DoseSlot, DoseTaken, Result};
use chrono::{Duration, NaiveDate, Utc};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Dose sink trait for persisting completed doses
pub trait DoseSink {
    fn append(&mut self, entry: &DoseTaken) -> Result<()>;
}

/// JSONL-based dose sink with file locking
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    /// Create a new JSONL sink for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl DoseSink for JsonlSink {
    fn append(&mut self, entry: &DoseTaken) -> Result<()> {
        self.ensure_parent_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        // Exclusive lock serializes concurrent appenders
        file.lock_exclusive()?;

        let mut writer = std::io::BufWriter::new(&file);
        let line = serde_json::to_string(entry)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        file.unlock()?;

        tracing::debug!("Appended dose {} to log", entry.id);
        Ok(())
    }
}

/// Read all entries from a dose log file
///
/// Unparseable lines are logged and skipped rather than failing the
/// whole read (a partial last line after a crash must not poison the
/// log).
pub fn read_entries(path: &Path) -> Result<Vec<DoseTaken>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut entries = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<DoseTaken>(&line) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                tracing::warn!("Failed to parse dose log line {}: {}", line_num + 1, e);
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} entries from dose log", entries.len());
    Ok(entries)
}

/// Load entries taken within the last N days, newest first
pub fn load_recent_entries(path: &Path, days: i64) -> Result<Vec<DoseTaken>> {
    let cutoff = Utc::now() - Duration::days(days);
    let mut entries: Vec<DoseTaken> = read_entries(path)?
        .into_iter()
        .filter(|e| e.taken_at >= cutoff)
        .collect();

    entries.sort_by(|a, b| b.taken_at.cmp(&a.taken_at));

    tracing::debug!("Loaded {} entries from last {} days", entries.len(), days);
    Ok(entries)
}

/// Whether the log records a completion for this item's dose slot on a
/// given day
pub fn was_taken(entries: &[DoseTaken], item_id: Uuid, date: NaiveDate, slot: DoseSlot) -> bool {
    entries
        .iter()
        .any(|e| e.item_id == item_id && e.scheduled_for.date() == date && e.slot == slot)
}
