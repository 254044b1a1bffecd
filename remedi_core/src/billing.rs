//! Cancellation policy and subscription state transitions.
//!
//! `cancel_subscription` is a total function: every combination of
//! elapsed days and billing history maps to a defined refund tier. The
//! actual charge reversal and persistence belong to the billing
//! collaborator, which is invoked with the computed result.

use crate::config::TrialConfig;
use crate::{BillingHistory, CancellationResult, Error, RefundTier, Result, SubscriptionState};
use chrono::{DateTime, Duration, Utc};

/// Compute the refund tier and retained access for a cancellation
///
/// Tiers by days since the subscription started:
/// - below `free_cancellation_days`: still inside the trial window,
///   nothing was charged, so cancellation is free (`FirstTime`, zero
///   refund, access ends now) and does not consume the one first-time
///   refund
/// - up to but not including `refund_window_days`: half the monthly
///   price back if the account never received a refund (`FirstTime`),
///   otherwise nothing (`SecondTime`); either way access is retained
///   for `access_retention_days` past cancellation
/// - from `refund_window_days` on: `Blocked`, no refund, access until
///   the end of the current billing period
pub fn cancel_subscription(
    subscribed_at: DateTime<Utc>,
    now: DateTime<Utc>,
    history: &BillingHistory,
    config: &TrialConfig,
) -> CancellationResult {
    let days_since_start = (now - subscribed_at).num_days();

    let result = if days_since_start < config.free_cancellation_days {
        CancellationResult {
            tier: RefundTier::FirstTime,
            refund_amount: 0.0,
            access_until: now,
        }
    } else if days_since_start < config.refund_window_days {
        let (tier, refund_amount) = if history.refund_ever_issued {
            (RefundTier::SecondTime, 0.0)
        } else {
            (RefundTier::FirstTime, 0.5 * config.monthly_price)
        };
        CancellationResult {
            tier,
            refund_amount,
            access_until: now + Duration::days(config.access_retention_days),
        }
    } else {
        CancellationResult {
            tier: RefundTier::Blocked,
            refund_amount: 0.0,
            access_until: subscribed_at + Duration::days(config.billing_period_days),
        }
    };

    tracing::info!(
        "Cancellation at day {}: tier {:?}, refund {:.2}, access until {}",
        days_since_start,
        result.tier,
        result.refund_amount,
        result.access_until
    );

    result
}

impl SubscriptionState {
    /// Enter the trial from the initial state
    pub fn begin_trial(self, now: DateTime<Utc>, config: &TrialConfig) -> Result<Self> {
        match self {
            SubscriptionState::None => Ok(SubscriptionState::Trial {
                started_at: now,
                expires_at: now + Duration::days(config.trial_duration_days),
            }),
            other => Err(Error::State(format!(
                "cannot begin a trial from {:?}",
                other
            ))),
        }
    }

    /// Activate a paid subscription (initial purchase or resubscribe)
    pub fn subscribe(self, expires_at: DateTime<Utc>, auto_renew: bool) -> Result<Self> {
        match self {
            SubscriptionState::None
            | SubscriptionState::Trial { .. }
            | SubscriptionState::Cancelled { .. }
            | SubscriptionState::GracePeriod { .. }
            | SubscriptionState::Expired => Ok(SubscriptionState::Active {
                expires_at,
                auto_renew,
            }),
            SubscriptionState::Active { .. } => {
                Err(Error::State("subscription is already active".into()))
            }
        }
    }

    /// Cancel an active subscription with a computed policy result
    pub fn cancel(self, result: &CancellationResult) -> Result<Self> {
        match self {
            SubscriptionState::Active { .. } => Ok(SubscriptionState::Cancelled {
                access_until: result.access_until,
                refund_tier: result.tier,
            }),
            other => Err(Error::State(format!("cannot cancel from {:?}", other))),
        }
    }

    /// Enter the grace period after a failed renewal
    pub fn enter_grace_period(self, until: DateTime<Utc>) -> Result<Self> {
        match self {
            SubscriptionState::Active { .. } => Ok(SubscriptionState::GracePeriod { until }),
            other => Err(Error::State(format!(
                "cannot enter grace period from {:?}",
                other
            ))),
        }
    }

    /// Fall through to expired once the relevant window has passed
    pub fn lapse(self, now: DateTime<Utc>) -> Result<Self> {
        match self {
            SubscriptionState::Trial { expires_at, .. } if now >= expires_at => {
                Ok(SubscriptionState::Expired)
            }
            SubscriptionState::Active { expires_at, .. } if now >= expires_at => {
                Ok(SubscriptionState::Expired)
            }
            SubscriptionState::GracePeriod { until } if now >= until => {
                Ok(SubscriptionState::Expired)
            }
            SubscriptionState::Cancelled { access_until, .. } if now >= access_until => {
                Ok(SubscriptionState::Expired)
            }
            other => Err(Error::State(format!(
                "{:?} has not lapsed at {}",
                other, now
            ))),
        }
    }

    /// Whether the device currently has feature access
    pub fn has_access(&self, now: DateTime<Utc>) -> bool {
        match self {
            SubscriptionState::None | SubscriptionState::Expired => false,
            SubscriptionState::Trial { expires_at, .. } => now < *expires_at,
            SubscriptionState::Active { .. } => true,
            SubscriptionState::Cancelled { access_until, .. } => now < *access_until,
            SubscriptionState::GracePeriod { until } => now < *until,
        }
    }
}
