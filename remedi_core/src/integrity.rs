//! Trial record integrity and local/backend reconciliation.
//!
//! The on-device trial record is paired with a SHA-256 verification hash
//! over `{device_id, started_at, expires_at, salt}`. A mismatch on load
//! means the record was edited (clock games, app-data tweaks) and the
//! backend copy becomes authoritative. This is tamper evidence against
//! casual file editing, not cryptographic protection.

use crate::{BackendTrialRecord, TrialState};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Compiled-in salt for the verification hash
pub const RECORD_SALT: &str = "remedi-trial-v1";

/// Compute the verification hash for a trial state
///
/// `last_prompt_shown` is deliberately outside the hash: prompt
/// bookkeeping must not require re-sealing the record.
pub fn record_hash(state: &TrialState, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(state.device_id.as_bytes());
    hasher.update(b"|");
    hasher.update(state.started_at.to_rfc3339().as_bytes());
    hasher.update(b"|");
    hasher.update(state.expires_at.to_rfc3339().as_bytes());
    hasher.update(b"|");
    hasher.update(salt.as_bytes());
    hex::encode(hasher.finalize())
}

/// On-disk representation of the trial record: state plus its hash
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SealedTrialRecord {
    pub state: TrialState,
    pub hash: String,
}

/// Pair a trial state with its freshly computed hash
pub fn seal(state: TrialState, salt: &str) -> SealedTrialRecord {
    let hash = record_hash(&state, salt);
    SealedTrialRecord { state, hash }
}

/// Result of checking a loaded record against its hash
#[derive(Clone, Debug, PartialEq)]
pub enum VerifyOutcome {
    Verified(TrialState),
    Tampered(TrialState),
}

/// Recompute and compare the hash of a loaded record
pub fn verify(record: SealedTrialRecord, salt: &str) -> VerifyOutcome {
    let expected = record_hash(&record.state, salt);
    if expected == record.hash {
        VerifyOutcome::Verified(record.state)
    } else {
        tracing::warn!(
            "Trial record hash mismatch for device {} - treating as tampered",
            record.state.device_id
        );
        VerifyOutcome::Tampered(record.state)
    }
}

/// Where the resolved trial state came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrialSource {
    Local,
    Backend,
}

/// Outcome of reconciling the local record with the backend copy
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedTrial {
    pub state: TrialState,
    pub source: TrialSource,
    /// Set when a tampered local record had to be kept because the
    /// backend was unavailable
    pub tamper_flagged: bool,
}

/// Reconcile the local record with the backend source of truth
///
/// A successful backend fetch always overwrites local state
/// (last-writer-wins from the backend's perspective), keeping only the
/// local prompt date, which the backend does not track. Without a
/// backend copy a verified local record stands, and a tampered one is
/// kept conservatively but flagged.
pub fn reconcile(
    device_id: &str,
    local: Option<VerifyOutcome>,
    backend: Option<&BackendTrialRecord>,
) -> Option<ResolvedTrial> {
    if let Some(record) = backend {
        let last_prompt_shown = match &local {
            Some(VerifyOutcome::Verified(state)) | Some(VerifyOutcome::Tampered(state)) => {
                state.last_prompt_shown
            }
            None => None,
        };

        tracing::info!("Backend trial record for {} is authoritative", device_id);
        return Some(ResolvedTrial {
            state: TrialState {
                device_id: device_id.to_string(),
                started_at: record.started_at,
                expires_at: record.expires_at,
                last_prompt_shown,
            },
            source: TrialSource::Backend,
            tamper_flagged: false,
        });
    }

    match local {
        Some(VerifyOutcome::Verified(state)) => Some(ResolvedTrial {
            state,
            source: TrialSource::Local,
            tamper_flagged: false,
        }),
        Some(VerifyOutcome::Tampered(state)) => {
            tracing::warn!(
                "Tampered local trial record for {} kept (backend unavailable), flagging",
                device_id
            );
            Some(ResolvedTrial {
                state,
                source: TrialSource::Local,
                tamper_flagged: true,
            })
        }
        None => None,
    }
}
