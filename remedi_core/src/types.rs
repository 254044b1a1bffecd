//! Core domain types for the Remedi reminder system.
//!
//! This module defines the fundamental types used throughout the system:
//! - Schedule specifications and resolved doses
//! - Reminder items (medications, supplements, diet entries)
//! - Dose log entries
//! - Trial and subscription state

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

// ============================================================================
// Schedule Types
// ============================================================================

/// A named daily slot with a configurable default clock time
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TimePeriod {
    Breakfast,
    Lunch,
    Dinner,
    Bedtime,
}

impl TimePeriod {
    /// Human-readable label for display
    pub fn label(&self) -> &'static str {
        match self {
            TimePeriod::Breakfast => "breakfast",
            TimePeriod::Lunch => "lunch",
            TimePeriod::Dinner => "dinner",
            TimePeriod::Bedtime => "bedtime",
        }
    }
}

/// The slot a resolved dose belongs to: a named period or a custom clock time
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DoseSlot {
    Period(TimePeriod),
    Custom(NaiveTime),
}

impl std::fmt::Display for DoseSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DoseSlot::Period(p) => write!(f, "{}", p.label()),
            DoseSlot::Custom(t) => write!(f, "custom@{}", t.format("%H:%M")),
        }
    }
}

/// Timing configuration for a reminder item
///
/// Immutable value except through the explicit mutation methods below.
/// `time_periods.len() + custom_times.len()` must equal `frequency_count`;
/// this is enforced by `schedule::validate`, never silently corrected.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleSpec {
    /// Doses per day, 1..=3
    pub frequency_count: u8,
    pub time_periods: Vec<TimePeriod>,
    pub custom_times: Vec<NaiveTime>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    /// Day-normalized dates on which the item is scheduled
    pub active_days: BTreeSet<NaiveDate>,
}

impl ScheduleSpec {
    /// Total number of configured time slots (named periods plus custom times)
    pub fn configured_slot_count(&self) -> usize {
        self.time_periods.len() + self.custom_times.len()
    }

    /// Regenerate `active_days` to cover the next `days_ahead` days from
    /// `start_date`, inclusive
    pub fn set_active_days_for_next(&mut self, days_ahead: u32) {
        self.active_days =
            crate::schedule::generate_default_active_days(self.start_date, days_ahead);
    }
}

/// A single resolved dose occurrence on a concrete day
///
/// Derived on demand from a `ScheduleSpec`; `is_taken` is the only
/// externally mutable field, filled in from the dose log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScheduledDose {
    pub time: NaiveDateTime,
    pub slot: DoseSlot,
    pub is_taken: bool,
}

/// Kind of tracked item
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Medication,
    Supplement,
    Diet,
}

/// A tracked reminder item owning a schedule
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReminderItem {
    pub id: Uuid,
    pub name: String,
    pub kind: ItemKind,
    pub spec: ScheduleSpec,
}

// ============================================================================
// Dose Log Types
// ============================================================================

/// A recorded dose completion, appended to the dose log
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DoseTaken {
    pub id: Uuid,
    pub item_id: Uuid,
    pub slot: DoseSlot,
    /// The dose time this entry completes (local schedule time)
    pub scheduled_for: NaiveDateTime,
    pub taken_at: DateTime<Utc>,
}

// ============================================================================
// Trial and Subscription Types
// ============================================================================

/// Per-device trial record
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrialState {
    pub device_id: String,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Day the payment prompt was last shown, if ever
    pub last_prompt_shown: Option<NaiveDate>,
}

/// Lifecycle state of a device's subscription
///
/// Transitions are one-directional except `Active -> Cancelled -> Active`
/// (resubscribe) and `Expired -> Active` (resubscribe after lapse).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubscriptionState {
    None,
    Trial {
        started_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    },
    Active {
        expires_at: DateTime<Utc>,
        auto_renew: bool,
    },
    Cancelled {
        access_until: DateTime<Utc>,
        refund_tier: RefundTier,
    },
    GracePeriod {
        until: DateTime<Utc>,
    },
    Expired,
}

/// Cancellation-driven refund eligibility bucket
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RefundTier {
    FirstTime,
    SecondTime,
    Blocked,
}

/// Outcome of a cancellation policy computation
#[derive(Clone, Debug, PartialEq)]
pub struct CancellationResult {
    pub tier: RefundTier,
    pub refund_amount: f64,
    pub access_until: DateTime<Utc>,
}

/// Billing facts supplied by the backend collaborator
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default)]
pub struct BillingHistory {
    pub refund_ever_issued: bool,
}

/// Trial record as reported by the backend verification service
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackendTrialRecord {
    pub valid: bool,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub sessions_used: u32,
    pub sessions_remaining: u32,
}
