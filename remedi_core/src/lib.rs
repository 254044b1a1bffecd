#![forbid(unsafe_code)]

//! Core domain model and business logic for the Remedi reminder system.
//!
//! This crate provides:
//! - Domain types (schedules, doses, reminder items, trial state)
//! - Schedule engine (dose resolution, validation, next-dose scan)
//! - Trial lifecycle and cancellation policy
//! - Trial record integrity (hash sealing, backend reconciliation)
//! - Persistence (item store, dose log, CSV export)

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod schedule;
pub mod trial;
pub mod billing;
pub mod integrity;
pub mod backend;
pub mod store;
pub mod doselog;
pub mod export;

// Re-export commonly used types
pub use error::{Error, Result, ScheduleError};
pub use types::*;
pub use config::Config;
pub use schedule::{
    doses_for_date, generate_default_active_days, is_scheduled_for_date, next_dose_time, validate,
};
pub use trial::{days_remaining, days_used, is_dismissable, is_valid, start_new_trial};
pub use billing::cancel_subscription;
pub use integrity::{seal, verify, SealedTrialRecord, VerifyOutcome};
pub use backend::load_backend_record;
pub use store::{load_or_create_device_id, ItemStore};
pub use doselog::{was_taken, DoseSink, JsonlSink};
