//! Backend trial-verification record loader.
//!
//! The sync agent drops the backend's view of a device's trial into a
//! JSON file; this module loads it to reconcile local trial state.
//! Network transport is the agent's concern - by the time this code
//! runs, either the file is there or it isn't.

use crate::{BackendTrialRecord, Result};
use std::path::Path;

/// Load the backend trial record from a JSON drop file
///
/// Returns None if the file doesn't exist or can't be parsed - backend
/// unavailability must never block the local flow, so both cases degrade
/// to "no backend copy" with a warning.
pub fn load_backend_record(path: &Path) -> Result<Option<BackendTrialRecord>> {
    if !path.exists() {
        tracing::debug!("No backend trial record at {:?}", path);
        return Ok(None);
    }

    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            tracing::warn!(
                "Failed to read backend trial record at {:?}: {}. Local state remains authoritative.",
                path,
                e
            );
            return Ok(None);
        }
    };

    let record: BackendTrialRecord = match serde_json::from_str(&contents) {
        Ok(record) => record,
        Err(e) => {
            tracing::warn!(
                "Failed to parse backend trial record at {:?}: {}. Local state remains authoritative.",
                path,
                e
            );
            return Ok(None);
        }
    };

    tracing::info!(
        "Loaded backend trial record: valid={}, expires {}",
        record.valid,
        record.expires_at
    );

    Ok(Some(record))
}
