//! Schedule engine for resolving and validating dose timing.
//!
//! All functions here are pure over their inputs: the caller supplies the
//! spec, the target date and the clock. Nothing performs I/O or blocks.
//!
//! - `validate` checks a spec against configured safety limits
//! - `doses_for_date` resolves concrete dose times for a calendar day
//! - `next_dose_time` scans forward for the next untaken dose
//! - `generate_default_active_days` builds the default active-day window

use crate::config::{PeriodTimes, ScheduleConfig};
use crate::error::ScheduleError;
use crate::{DoseSlot, ScheduleSpec, ScheduledDose};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::collections::BTreeSet;

/// How many days ahead `next_dose_time` scans before giving up
pub const NEXT_DOSE_SCAN_DAYS: i64 = 7;

/// Validate a spec against the configured limits
///
/// Checks run in a fixed order and the first failure short-circuits:
/// 1. `FrequencyExceeded` - more doses per day than the configured maximum
/// 2. `TimeCountMismatch` - configured slots don't add up to the frequency
/// 3. `PastStartDate` - start day is before `today` (day granularity)
/// 4. `IntervalTooShort` - consecutive same-day doses closer than the
///    configured minimum (only checked when at least two doses exist)
///
/// Failures are reported, never silently corrected.
pub fn validate(
    spec: &ScheduleSpec,
    today: NaiveDate,
    schedule: &ScheduleConfig,
    periods: &PeriodTimes,
) -> Result<(), ScheduleError> {
    if spec.frequency_count > schedule.max_daily_frequency {
        return Err(ScheduleError::FrequencyExceeded {
            count: spec.frequency_count,
            max: schedule.max_daily_frequency,
        });
    }

    if spec.configured_slot_count() != spec.frequency_count as usize {
        return Err(ScheduleError::TimeCountMismatch {
            configured: spec.configured_slot_count(),
            expected: spec.frequency_count,
        });
    }

    if spec.start_date < today {
        return Err(ScheduleError::PastStartDate {
            start: spec.start_date,
        });
    }

    // Slots resolve to the same clock times on every day, so one
    // representative day is enough for the interval check.
    let doses = resolve_doses(spec, spec.start_date, periods);
    let minimum = Duration::hours(schedule.minimum_dose_interval_hours as i64);
    for pair in doses.windows(2) {
        let gap = pair[1].time - pair[0].time;
        if gap < minimum {
            return Err(ScheduleError::IntervalTooShort {
                interval_minutes: gap.num_minutes(),
                minimum_hours: schedule.minimum_dose_interval_hours,
            });
        }
    }

    Ok(())
}

/// Whether the item is scheduled on the given (day-normalized) date
pub fn is_scheduled_for_date(spec: &ScheduleSpec, date: NaiveDate) -> bool {
    if date < spec.start_date {
        return false;
    }
    if let Some(end) = spec.end_date {
        if date > end {
            return false;
        }
    }
    spec.active_days.contains(&date)
}

/// Resolve the dose times for a date, sorted ascending
///
/// Returns empty when the item is not scheduled that day. Coinciding
/// times are NOT deduplicated: a named period and a custom time resolving
/// to the same clock time both appear.
pub fn doses_for_date(
    spec: &ScheduleSpec,
    date: NaiveDate,
    periods: &PeriodTimes,
) -> Vec<ScheduledDose> {
    if !is_scheduled_for_date(spec, date) {
        return Vec::new();
    }
    resolve_doses(spec, date, periods)
}

/// Resolve slots onto a date without consulting the active-day window
fn resolve_doses(spec: &ScheduleSpec, date: NaiveDate, periods: &PeriodTimes) -> Vec<ScheduledDose> {
    let mut doses: Vec<ScheduledDose> = spec
        .time_periods
        .iter()
        .take(spec.frequency_count as usize)
        .map(|&period| ScheduledDose {
            time: date.and_time(periods.time_for(period)),
            slot: DoseSlot::Period(period),
            is_taken: false,
        })
        .collect();

    doses.extend(spec.custom_times.iter().map(|&time| ScheduledDose {
        time: date.and_time(time),
        slot: DoseSlot::Custom(time),
        is_taken: false,
    }));

    doses.sort_by_key(|d| d.time);
    doses
}

/// Find the next untaken dose strictly after `from`
///
/// Scans forward day-by-day for up to `NEXT_DOSE_SCAN_DAYS` days. The
/// `is_taken` predicate reports whether the dose in a given slot on a
/// given day was already completed (typically answered from the dose
/// log). Returns `None` when no dose falls inside the window - absence
/// is a valid, expected outcome, not an error.
pub fn next_dose_time<F>(
    spec: &ScheduleSpec,
    from: NaiveDateTime,
    periods: &PeriodTimes,
    is_taken: F,
) -> Option<NaiveDateTime>
where
    F: Fn(NaiveDate, DoseSlot) -> bool,
{
    for offset in 0..NEXT_DOSE_SCAN_DAYS {
        let day = from.date() + Duration::days(offset);
        for dose in doses_for_date(spec, day, periods) {
            if dose.time > from && !is_taken(day, dose.slot) {
                tracing::debug!("Next dose at {} ({})", dose.time, dose.slot);
                return Some(dose.time);
            }
        }
    }

    tracing::debug!(
        "No upcoming dose within {} days of {}",
        NEXT_DOSE_SCAN_DAYS,
        from
    );
    None
}

/// Produce `days_ahead` consecutive day-normalized dates from `start`,
/// inclusive
pub fn generate_default_active_days(start: NaiveDate, days_ahead: u32) -> BTreeSet<NaiveDate> {
    (0..days_ahead as i64)
        .map(|offset| start + Duration::days(offset))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TimePeriod;
    use chrono::NaiveTime;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn spec_with(
        time_periods: Vec<TimePeriod>,
        custom_times: Vec<NaiveTime>,
        start: NaiveDate,
    ) -> ScheduleSpec {
        let frequency_count = (time_periods.len() + custom_times.len()) as u8;
        ScheduleSpec {
            frequency_count,
            time_periods,
            custom_times,
            start_date: start,
            end_date: None,
            active_days: generate_default_active_days(start, 5),
        }
    }

    #[test]
    fn test_validate_accepts_three_named_periods() {
        let start = day(2025, 3, 10);
        let spec = spec_with(
            vec![TimePeriod::Breakfast, TimePeriod::Lunch, TimePeriod::Dinner],
            vec![],
            start,
        );

        let result = validate(&spec, start, &ScheduleConfig::default(), &PeriodTimes::default());
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_frequency_exceeded() {
        let start = day(2025, 3, 10);
        let mut spec = spec_with(
            vec![TimePeriod::Breakfast, TimePeriod::Lunch, TimePeriod::Dinner],
            vec![at(22, 0)],
            start,
        );
        spec.frequency_count = 4;

        let err = validate(&spec, start, &ScheduleConfig::default(), &PeriodTimes::default())
            .unwrap_err();
        assert_eq!(err, ScheduleError::FrequencyExceeded { count: 4, max: 3 });
    }

    #[test]
    fn test_validate_time_count_mismatch() {
        let start = day(2025, 3, 10);
        let mut spec = spec_with(vec![TimePeriod::Breakfast], vec![], start);
        spec.frequency_count = 2;

        let err = validate(&spec, start, &ScheduleConfig::default(), &PeriodTimes::default())
            .unwrap_err();
        assert_eq!(
            err,
            ScheduleError::TimeCountMismatch {
                configured: 1,
                expected: 2
            }
        );
    }

    #[test]
    fn test_validate_past_start_date() {
        let start = day(2025, 3, 9);
        let spec = spec_with(vec![TimePeriod::Breakfast], vec![], start);

        let err = validate(
            &spec,
            day(2025, 3, 10),
            &ScheduleConfig::default(),
            &PeriodTimes::default(),
        )
        .unwrap_err();
        assert_eq!(err, ScheduleError::PastStartDate { start });
    }

    #[test]
    fn test_validate_interval_boundaries() {
        let start = day(2025, 3, 10);

        // 10 hours apart passes the default 4-hour minimum
        let wide = spec_with(vec![], vec![at(8, 0), at(18, 0)], start);
        assert!(validate(&wide, start, &ScheduleConfig::default(), &PeriodTimes::default()).is_ok());

        // 2 hours apart fails it
        let tight = spec_with(vec![], vec![at(8, 0), at(10, 0)], start);
        let err = validate(&tight, start, &ScheduleConfig::default(), &PeriodTimes::default())
            .unwrap_err();
        assert_eq!(
            err,
            ScheduleError::IntervalTooShort {
                interval_minutes: 120,
                minimum_hours: 4
            }
        );
    }

    #[test]
    fn test_validate_interval_skipped_for_single_dose() {
        let start = day(2025, 3, 10);
        let spec = spec_with(vec![TimePeriod::Breakfast], vec![], start);
        assert!(validate(&spec, start, &ScheduleConfig::default(), &PeriodTimes::default()).is_ok());
    }

    #[test]
    fn test_validate_checks_run_in_order() {
        // Frequency failure wins even when the slot count is also wrong
        let start = day(2025, 3, 10);
        let mut spec = spec_with(vec![TimePeriod::Breakfast], vec![], start);
        spec.frequency_count = 5;

        let err = validate(&spec, start, &ScheduleConfig::default(), &PeriodTimes::default())
            .unwrap_err();
        assert!(matches!(err, ScheduleError::FrequencyExceeded { .. }));
    }

    #[test]
    fn test_doses_for_date_three_period_day() {
        let start = day(2025, 3, 10);
        let spec = spec_with(
            vec![TimePeriod::Breakfast, TimePeriod::Lunch, TimePeriod::Dinner],
            vec![],
            start,
        );

        let doses = doses_for_date(&spec, start, &PeriodTimes::default());
        assert_eq!(doses.len(), 3);
        assert_eq!(doses[0].time, start.and_time(at(8, 0)));
        assert_eq!(doses[1].time, start.and_time(at(14, 0)));
        assert_eq!(doses[2].time, start.and_time(at(19, 0)));
        assert!(doses.iter().all(|d| !d.is_taken));
    }

    #[test]
    fn test_doses_for_date_empty_off_active_days() {
        let start = day(2025, 3, 10);
        let spec = spec_with(vec![TimePeriod::Breakfast], vec![], start);

        // 5-day window ends 2025-03-14
        let doses = doses_for_date(&spec, day(2025, 3, 20), &PeriodTimes::default());
        assert!(doses.is_empty());
    }

    #[test]
    fn test_doses_for_date_respects_end_date() {
        let start = day(2025, 3, 10);
        let mut spec = spec_with(vec![TimePeriod::Breakfast], vec![], start);
        spec.end_date = Some(day(2025, 3, 11));

        assert!(doses_for_date(&spec, day(2025, 3, 12), &PeriodTimes::default()).is_empty());
        assert_eq!(
            doses_for_date(&spec, day(2025, 3, 11), &PeriodTimes::default()).len(),
            1
        );
    }

    #[test]
    fn test_doses_sorted_with_custom_time_first() {
        let start = day(2025, 3, 10);
        let spec = spec_with(vec![TimePeriod::Lunch], vec![at(6, 30)], start);

        let doses = doses_for_date(&spec, start, &PeriodTimes::default());
        assert_eq!(doses.len(), 2);
        assert_eq!(doses[0].slot, DoseSlot::Custom(at(6, 30)));
        assert_eq!(doses[1].slot, DoseSlot::Period(TimePeriod::Lunch));
    }

    #[test]
    fn test_duplicate_times_both_kept() {
        // A named period and a custom time resolving to the same clock
        // time intentionally both appear (no deduplication).
        let start = day(2025, 3, 10);
        let spec = spec_with(vec![TimePeriod::Breakfast], vec![at(8, 0)], start);

        let doses = doses_for_date(&spec, start, &PeriodTimes::default());
        assert_eq!(doses.len(), 2);
        assert_eq!(doses[0].time, doses[1].time);
    }

    #[test]
    fn test_next_dose_time_strictly_after() {
        let start = day(2025, 3, 10);
        let spec = spec_with(
            vec![TimePeriod::Breakfast, TimePeriod::Dinner],
            vec![],
            start,
        );

        // Standing exactly on a dose time skips it
        let from = start.and_time(at(8, 0));
        let next = next_dose_time(&spec, from, &PeriodTimes::default(), |_, _| false);
        assert_eq!(next, Some(start.and_time(at(19, 0))));
    }

    #[test]
    fn test_next_dose_time_skips_taken() {
        let start = day(2025, 3, 10);
        let spec = spec_with(
            vec![TimePeriod::Breakfast, TimePeriod::Dinner],
            vec![],
            start,
        );

        let from = start.and_time(at(6, 0));
        let next = next_dose_time(&spec, from, &PeriodTimes::default(), |date, slot| {
            date == start && slot == DoseSlot::Period(TimePeriod::Breakfast)
        });
        assert_eq!(next, Some(start.and_time(at(19, 0))));
    }

    #[test]
    fn test_next_dose_time_crosses_days() {
        let start = day(2025, 3, 10);
        let spec = spec_with(vec![TimePeriod::Breakfast], vec![], start);

        let from = start.and_time(at(23, 0));
        let next = next_dose_time(&spec, from, &PeriodTimes::default(), |_, _| false);
        assert_eq!(next, Some(day(2025, 3, 11).and_time(at(8, 0))));
    }

    #[test]
    fn test_next_dose_time_none_outside_window() {
        let start = day(2025, 3, 10);
        let mut spec = spec_with(vec![TimePeriod::Breakfast], vec![], start);
        // Only active day is beyond the 7-day scan window
        spec.active_days = [day(2025, 3, 20)].into_iter().collect();

        let from = start.and_time(at(6, 0));
        let next = next_dose_time(&spec, from, &PeriodTimes::default(), |_, _| false);
        assert_eq!(next, None);
    }

    #[test]
    fn test_generate_default_active_days() {
        let start = day(2025, 3, 10);
        let days = generate_default_active_days(start, 5);

        assert_eq!(days.len(), 5);
        assert!(days.contains(&start));
        assert!(days.contains(&day(2025, 3, 14)));
        assert!(!days.contains(&day(2025, 3, 15)));

        // Idempotent
        assert_eq!(days, generate_default_active_days(start, 5));
    }

    #[test]
    fn test_set_active_days_for_next() {
        let start = day(2025, 3, 10);
        let mut spec = spec_with(vec![TimePeriod::Breakfast], vec![], start);

        spec.set_active_days_for_next(3);
        assert_eq!(spec.active_days.len(), 3);
        assert!(spec.active_days.contains(&day(2025, 3, 12)));
    }
}
