//! Persistent stores with file locking.
//!
//! Reminder items and the sealed trial record are kept as JSON files,
//! written atomically (temp file + rename) under exclusive locks to
//! prevent concurrent-writer corruption.

use crate::integrity::SealedTrialRecord;
use crate::{Error, ReminderItem, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use uuid::Uuid;

/// All reminder items on this device
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct ItemStore {
    pub items: Vec<ReminderItem>,
}

impl ItemStore {
    /// Load the item store with shared locking
    ///
    /// Returns an empty store if the file doesn't exist. If the file is
    /// corrupted, logs a warning and returns an empty store.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No item store found, starting empty");
            return Ok(Self::default());
        }

        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!("Unable to open item store {:?}: {}. Starting empty.", path, e);
                return Ok(Self::default());
            }
        };

        // Shared lock for reading
        if let Err(e) = file.lock_shared() {
            tracing::warn!("Unable to lock item store {:?}: {}. Starting empty.", path, e);
            return Ok(Self::default());
        }

        let mut contents = String::new();
        let mut reader = std::io::BufReader::new(&file);
        if let Err(e) = reader.read_to_string(&mut contents) {
            let _ = file.unlock();
            tracing::warn!("Failed to read item store {:?}: {}. Starting empty.", path, e);
            return Ok(Self::default());
        }

        file.unlock()?;

        match serde_json::from_str::<ItemStore>(&contents) {
            Ok(store) => {
                tracing::debug!("Loaded {} items from {:?}", store.items.len(), path);
                Ok(store)
            }
            Err(e) => {
                tracing::warn!("Failed to parse item store {:?}: {}. Starting empty.", path, e);
                Ok(Self::default())
            }
        }
    }

    /// Save the item store atomically under an exclusive lock
    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self)?;
        tracing::debug!("Saved {} items to {:?}", self.items.len(), path);
        Ok(())
    }

    /// Load, modify, and save back atomically
    pub fn update<F>(path: &Path, f: F) -> Result<Self>
    where
        F: FnOnce(&mut ItemStore) -> Result<()>,
    {
        let mut store = Self::load(path)?;
        f(&mut store)?;
        store.save(path)?;
        Ok(store)
    }

    /// Look up an item by its user-facing name (case-insensitive)
    pub fn find_by_name(&self, name: &str) -> Option<&ReminderItem> {
        self.items
            .iter()
            .find(|item| item.name.eq_ignore_ascii_case(name))
    }

    /// Look up an item by id
    pub fn find_by_id(&self, id: Uuid) -> Option<&ReminderItem> {
        self.items.iter().find(|item| item.id == id)
    }
}

impl SealedTrialRecord {
    /// Load the sealed trial record, if one exists
    ///
    /// A missing file means no local trial. A file that doesn't parse is
    /// unusable as evidence either way, so it degrades to None with a
    /// warning and the backend copy decides.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            tracing::debug!("No local trial record at {:?}", path);
            return Ok(None);
        }

        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(
                    "Unable to read trial record {:?}: {}. Treating as absent.",
                    path,
                    e
                );
                return Ok(None);
            }
        };
        match serde_json::from_str::<SealedTrialRecord>(&contents) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                tracing::warn!(
                    "Failed to parse trial record {:?}: {}. Treating as absent.",
                    path,
                    e
                );
                Ok(None)
            }
        }
    }

    /// Save the sealed trial record atomically
    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self)?;
        tracing::debug!("Saved trial record for {} to {:?}", self.state.device_id, path);
        Ok(())
    }
}

/// Load the stable device identifier, generating one on first use
pub fn load_or_create_device_id(path: &Path) -> Result<String> {
    if let Ok(existing) = std::fs::read_to_string(path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return Ok(trimmed.to_string());
        }
        tracing::warn!("Empty device id file at {:?}, regenerating", path);
    }

    let id = Uuid::new_v4().to_string();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, &id)?;
    tracing::info!("Generated new device id at {:?}", path);

    Ok(id)
}

/// Atomically write a JSON value by:
/// 1. Writing to a locked temp file in the same directory
/// 2. Syncing to disk
/// 3. Renaming over the original
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let temp = NamedTempFile::new_in(path.parent().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::Other, "store path missing parent")
    })?)?;

    // Exclusive lock on the temp file serializes concurrent writers
    temp.as_file().lock_exclusive()?;

    {
        let mut writer = std::io::BufWriter::new(temp.as_file());
        let contents = serde_json::to_string(value)?;
        writer.write_all(contents.as_bytes())?;
        writer.flush()?;
    }

    temp.as_file().sync_all()?;
    temp.as_file().unlock()?;

    temp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}
