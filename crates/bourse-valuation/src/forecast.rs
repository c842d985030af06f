//! Cap-lift forecasting for hard-capped regimes.
//!
//! Under a window-basis schedule that stops paying after `T` events, an
//! entity with more than `T` events in the window gets no credit for the
//! excess. Old days expire oldest-first, so the cap stops binding on the
//! expiry date of the day whose expiry brings the window back to `T`.

use bourse_types::{CapLiftForecast, EntityId};

use crate::error::ValuationError;
use crate::window::{DailyBuckets, DayWindow};

/// Predict when the hard cap `threshold` stops binding for an entity.
///
/// The cap binds while the in-window count exceeds `threshold`. When it
/// does not, the forecast has no lift date.
///
/// # Errors
///
/// Returns [`ValuationError::InvalidInput`] if `threshold` is zero, or
/// [`ValuationError::Overflow`] if an expiry date is unrepresentable.
pub fn forecast_cap_lift(
    entity_id: EntityId,
    buckets: &DailyBuckets,
    window: &DayWindow,
    threshold: u64,
) -> Result<CapLiftForecast, ValuationError> {
    if threshold == 0 {
        return Err(ValuationError::invalid("cap threshold must be at least 1"));
    }

    // Buckets built outside `aggregate` may hold days the window has
    // already dropped; those count toward neither the total nor the lift.
    let in_window = || buckets.iter().filter(|&(day, _)| window.contains_day(day));
    let current_count = in_window().fold(0_u64, |sum, (_, count)| sum.saturating_add(count));
    let mut forecast = CapLiftForecast {
        entity_id,
        as_of: window.as_of(),
        current_count,
        threshold,
        lift_date: None,
    };

    let Some(excess) = current_count.checked_sub(threshold).filter(|&n| n > 0) else {
        return Ok(forecast);
    };

    let mut expiring = 0_u64;
    for (day, count) in in_window() {
        expiring = expiring.saturating_add(count);
        if expiring >= excess {
            forecast.lift_date = Some(window.expiry_date(day)?);
            break;
        }
    }

    Ok(forecast)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, day).unwrap()
    }

    /// 30-day window ending 2025-07-30 12:00 UTC: first day is 07-01.
    fn window() -> DayWindow {
        let as_of = Utc.with_ymd_and_hms(2025, 7, 30, 12, 0, 0).single().unwrap();
        DayWindow::new(as_of, 30).unwrap()
    }

    #[test]
    fn oldest_day_alone_lifts_the_cap() {
        // 400 events vs T=300; the oldest day (07-03) holds 120 >= 100.
        let buckets =
            DailyBuckets::from_counts([(date(3), 120), (date(10), 180), (date(29), 100)]);
        let forecast = forecast_cap_lift(EntityId(1), &buckets, &window(), 300).unwrap();

        assert_eq!(forecast.current_count, 400);
        // 07-03 + 30 days = 08-02, which is 3 days after the as_of date.
        let expected = NaiveDate::from_ymd_opt(2025, 8, 2).unwrap();
        assert_eq!(forecast.lift_date, Some(expected));
        assert_eq!(forecast.days_until_lift(), Some(3));
    }

    #[test]
    fn exactly_enough_expiring_events_lift_the_cap() {
        let buckets = DailyBuckets::from_counts([(date(1), 100), (date(15), 300)]);
        let forecast = forecast_cap_lift(EntityId(1), &buckets, &window(), 300).unwrap();
        // 07-01 is the oldest in-window day; it expires on 07-31.
        assert_eq!(forecast.lift_date, Some(date(31)));
        assert_eq!(forecast.days_until_lift(), Some(1));
    }

    #[test]
    fn several_old_days_accumulate_oldest_first() {
        let buckets = DailyBuckets::from_counts([
            (date(2), 40),
            (date(5), 30),
            (date(9), 50),
            (date(20), 280),
        ]);
        // excess 100: 40 + 30 = 70 < 100, + 50 = 120 >= 100 at 07-09.
        let forecast = forecast_cap_lift(EntityId(1), &buckets, &window(), 300).unwrap();
        assert_eq!(forecast.lift_date, Some(NaiveDate::from_ymd_opt(2025, 8, 8).unwrap()));
    }

    #[test]
    fn at_or_below_threshold_is_not_capped() {
        let at_cap = DailyBuckets::from_counts([(date(3), 300)]);
        let forecast = forecast_cap_lift(EntityId(1), &at_cap, &window(), 300).unwrap();
        assert!(!forecast.is_capped());
        assert_eq!(forecast.lift_date, None);

        let below = DailyBuckets::from_counts([(date(3), 10)]);
        let forecast = forecast_cap_lift(EntityId(1), &below, &window(), 300).unwrap();
        assert!(!forecast.is_capped());
    }

    #[test]
    fn empty_history_is_not_capped() {
        let forecast =
            forecast_cap_lift(EntityId(1), &DailyBuckets::new(), &window(), 300).unwrap();
        assert_eq!(forecast.current_count, 0);
        assert_eq!(forecast.lift_date, None);
    }

    #[test]
    fn days_outside_the_window_do_not_count() {
        // 06-20 fell out of the window that starts on 07-01.
        let stale = NaiveDate::from_ymd_opt(2025, 6, 20).unwrap();
        let buckets = DailyBuckets::from_counts([(stale, 350), (date(10), 10)]);
        let forecast = forecast_cap_lift(EntityId(1), &buckets, &window(), 300).unwrap();

        assert_eq!(forecast.current_count, 10);
        assert!(!forecast.is_capped());
        assert_eq!(forecast.current_count > forecast.threshold, forecast.is_capped());
    }

    #[test]
    fn zero_threshold_is_invalid() {
        let result = forecast_cap_lift(EntityId(1), &DailyBuckets::new(), &window(), 0);
        assert!(matches!(result, Err(ValuationError::InvalidInput { .. })));
    }

    #[test]
    fn lift_date_agrees_with_window_membership() {
        let buckets = DailyBuckets::from_counts([(date(4), 200), (date(25), 200)]);
        let forecast = forecast_cap_lift(EntityId(1), &buckets, &window(), 300).unwrap();
        let lift = forecast.lift_date.unwrap();

        // Re-evaluate at midnight of the lift date: the window must now hold
        // no more than the threshold.
        let later = DayWindow::new(lift.and_hms_opt(0, 0, 0).unwrap().and_utc(), 30).unwrap();
        let remaining: u64 = buckets
            .iter()
            .filter(|&(day, _)| later.contains_day(day))
            .map(|(_, n)| n)
            .sum();
        assert!(remaining <= 300);

        // One second earlier it still exceeds it.
        let earlier_instant = lift.and_hms_opt(0, 0, 0).unwrap().and_utc()
            - chrono::TimeDelta::seconds(1);
        let earlier = DayWindow::new(earlier_instant, 30).unwrap();
        let before: u64 = buckets
            .iter()
            .filter(|&(day, _)| earlier.contains_day(day))
            .map(|(_, n)| n)
            .sum();
        assert!(before > 300);
    }
}
