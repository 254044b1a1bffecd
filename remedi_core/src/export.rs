//! CSV export for the dose log.
//!
//! This is the data-export path behind the hard-paywall acknowledgement
//! flow: the append-only dose log is rolled into a durable CSV the user
//! keeps, then archived atomically so nothing is exported twice.

use crate::{DoseTaken, Result};
use std::fs::OpenOptions;
use std::path::Path;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow {
    id: String,
    item_id: String,
    slot: String,
    scheduled_for: String,
    taken_at: String,
}

impl From<&DoseTaken> for CsvRow {
    fn from(entry: &DoseTaken) -> Self {
        CsvRow {
            id: entry.id.to_string(),
            item_id: entry.item_id.to_string(),
            slot: entry.slot.to_string(),
            scheduled_for: entry.scheduled_for.format("%Y-%m-%dT%H:%M:%S").to_string(),
            taken_at: entry.taken_at.to_rfc3339(),
        }
    }
}

/// Roll the dose log into CSV and archive the log atomically
///
/// 1. Reads all entries from the log
/// 2. Appends them to the CSV file (writing headers when new)
/// 3. Syncs the CSV to disk
/// 4. Renames the log to .processed
/// 5. Returns the number of entries exported
///
/// The CSV is fsynced before the log is renamed, and the log is renamed
/// rather than deleted so manual recovery stays possible.
pub fn log_to_csv_and_archive(log_path: &Path, csv_path: &Path) -> Result<usize> {
    let entries = crate::doselog::read_entries(log_path)?;

    if entries.is_empty() {
        tracing::info!("No dose log entries to export");
        return Ok(0);
    }

    if let Some(parent) = csv_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(csv_path)?;

    let needs_headers = file.metadata()?.len() == 0;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(needs_headers)
        .from_writer(file);

    for entry in &entries {
        writer.serialize(CsvRow::from(entry))?;
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    file.sync_all()?;

    tracing::info!("Exported {} dose log entries to CSV", entries.len());

    let processed_path = log_path.with_extension("log.processed");
    std::fs::rename(log_path, &processed_path)?;

    tracing::info!("Archived dose log to {:?}", processed_path);

    Ok(entries.len())
}

/// Remove all .log.processed files in the given directory
pub fn cleanup_processed_logs(dir: &Path) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if let Some(extension) = path.extension() {
            if extension == "processed" {
                std::fs::remove_file(&path)?;
                tracing::debug!("Removed processed log: {:?}", path);
                count += 1;
            }
        }
    }

    if count > 0 {
        tracing::info!("Cleaned up {} processed log files", count);
    }

    Ok(count)
}
