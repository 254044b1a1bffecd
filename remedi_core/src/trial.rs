//! Trial lifecycle rules.
//!
//! Pure functions over a `TrialState` snapshot and an explicit clock.
//! Persistence and backend registration are collaborator concerns; see
//! `store` and `backend`.

use crate::config::TrialConfig;
use crate::{Error, Result, TrialState};
use chrono::{DateTime, Duration, NaiveDate, Utc};

impl TrialState {
    /// Remember that the payment prompt was shown on `day`
    pub fn record_prompt_shown(&mut self, day: NaiveDate) {
        self.last_prompt_shown = Some(day);
    }
}

/// Begin a new trial for a device
///
/// Refuses when a still-valid record is supplied - the caller is expected
/// to pass whatever local or backend record exists. Duplicate prevention
/// across reinstalls is the backend collaborator's responsibility.
pub fn start_new_trial(
    device_id: &str,
    existing: Option<&TrialState>,
    now: DateTime<Utc>,
    config: &TrialConfig,
) -> Result<TrialState> {
    if let Some(existing) = existing {
        if is_valid(existing, now) {
            return Err(Error::Trial(format!(
                "device {} already has a trial valid until {}",
                device_id, existing.expires_at
            )));
        }
    }

    let state = TrialState {
        device_id: device_id.to_string(),
        started_at: now,
        expires_at: now + Duration::days(config.trial_duration_days),
        last_prompt_shown: None,
    };

    tracing::info!(
        "Started {}-day trial for device {}, expires {}",
        config.trial_duration_days,
        device_id,
        state.expires_at
    );

    Ok(state)
}

/// Whether the trial is still running
pub fn is_valid(state: &TrialState, now: DateTime<Utc>) -> bool {
    now < state.expires_at
}

/// Whole days elapsed since the trial started, clamped to zero
pub fn days_used(state: &TrialState, now: DateTime<Utc>) -> i64 {
    (now - state.started_at).num_days().max(0)
}

/// Whole days left before expiry, rounded up, clamped to zero
pub fn days_remaining(state: &TrialState, now: DateTime<Utc>) -> i64 {
    let remaining = state.expires_at - now;
    let seconds = remaining.num_seconds();
    if seconds <= 0 {
        0
    } else {
        (seconds + 86_399) / 86_400
    }
}

/// Whether the payment prompt should be surfaced right now
///
/// A UI-prompting heuristic, not a hard gate: true during the two days
/// leading into the final stretch (days N-3..=N-2 of an N-day trial),
/// while the trial is still valid and no prompt was shown yet today.
pub fn should_show_payment_modal(
    state: &TrialState,
    now: DateTime<Utc>,
    config: &TrialConfig,
) -> bool {
    if !is_valid(state, now) {
        return false;
    }

    let used = days_used(state, now);
    let window_start = config.trial_duration_days - 3;
    let window_end = config.trial_duration_days - 2;
    if used < window_start || used > window_end {
        return false;
    }

    if state.last_prompt_shown == Some(now.date_naive()) {
        tracing::debug!("Payment prompt already shown today, suppressing");
        return false;
    }

    true
}

/// Whether the paywall sheet may be dismissed
///
/// False once `days_remaining` reaches zero: on the final day and after
/// expiry the presenting UI must not allow dismissal without subscribing
/// or an explicit data-export acknowledgement.
pub fn is_dismissable(state: &TrialState, now: DateTime<Utc>) -> bool {
    days_remaining(state, now) > 0
}
