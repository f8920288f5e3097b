//! Meal-zone resolution and clock arithmetic.
//!
//! Zones use fixed 24h boundaries (inclusive start, exclusive end):
//! breakfast 06-10, mid-morning 10-12, lunch 12-18, dinner 18-22,
//! snack 22-06 across midnight.

use crate::MealSlot;
use chrono::{NaiveTime, Timelike};

/// Meal zones share the slot vocabulary
pub type MealZone = MealSlot;

pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Map a wall-clock time to its meal zone
pub fn resolve_zone(time: NaiveTime) -> MealZone {
    match time.hour() {
        6..=9 => MealSlot::Breakfast,
        10..=11 => MealSlot::MidMorning,
        12..=17 => MealSlot::Lunch,
        18..=21 => MealSlot::Dinner,
        _ => MealSlot::Snack,
    }
}

/// Whether `meal` comes at or before the zone `now` falls in
pub fn is_past_or_current(meal: MealSlot, now: NaiveTime) -> bool {
    meal <= resolve_zone(now)
}

/// Nominal time a meal is scheduled at
pub fn scheduled_time(meal: MealSlot) -> NaiveTime {
    let minutes = match meal {
        MealSlot::Breakfast => 8 * 60,
        MealSlot::MidMorning => 10 * 60 + 30,
        MealSlot::Lunch => 13 * 60,
        MealSlot::Dinner => 19 * 60,
        MealSlot::Snack => 16 * 60,
    };
    NaiveTime::from_num_seconds_from_midnight_opt(minutes * 60, 0).unwrap_or(NaiveTime::MIN)
}

fn minute_of_day(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

/// Whole minutes from `earlier` to `now` on a circular 24h clock.
///
/// A reported time that appears later than `now` is taken to be from the
/// previous day, so the result is always in `0..1440`.
pub fn minutes_elapsed(earlier: NaiveTime, now: NaiveTime) -> u32 {
    let from = minute_of_day(earlier);
    let to = minute_of_day(now);
    (to + MINUTES_PER_DAY - from) % MINUTES_PER_DAY
}

/// Parse an `HH:MM` time of day
pub fn parse_clock_time(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").ok()
}

/// Format a time of day as `HH:MM`
pub fn format_clock_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_zone_boundaries() {
        assert_eq!(resolve_zone(t(6, 0)), MealSlot::Breakfast);
        assert_eq!(resolve_zone(t(9, 59)), MealSlot::Breakfast);
        assert_eq!(resolve_zone(t(10, 0)), MealSlot::MidMorning);
        assert_eq!(resolve_zone(t(11, 59)), MealSlot::MidMorning);
        assert_eq!(resolve_zone(t(12, 0)), MealSlot::Lunch);
        assert_eq!(resolve_zone(t(17, 59)), MealSlot::Lunch);
        assert_eq!(resolve_zone(t(18, 0)), MealSlot::Dinner);
        assert_eq!(resolve_zone(t(21, 59)), MealSlot::Dinner);
        assert_eq!(resolve_zone(t(22, 0)), MealSlot::Snack);
    }

    #[test]
    fn test_snack_wraps_midnight() {
        assert_eq!(resolve_zone(t(23, 30)), MealSlot::Snack);
        assert_eq!(resolve_zone(t(0, 0)), MealSlot::Snack);
        assert_eq!(resolve_zone(t(5, 59)), MealSlot::Snack);
    }

    #[test]
    fn test_every_minute_has_a_zone() {
        for minute in 0..MINUTES_PER_DAY {
            let time = NaiveTime::from_num_seconds_from_midnight_opt(minute * 60, 0).unwrap();
            // total function: must not panic and must be one of the five
            assert!(MealSlot::ALL.contains(&resolve_zone(time)));
        }
    }

    #[test]
    fn test_past_or_current() {
        let lunch_time = t(13, 0);
        assert!(is_past_or_current(MealSlot::Breakfast, lunch_time));
        assert!(is_past_or_current(MealSlot::Lunch, lunch_time));
        assert!(!is_past_or_current(MealSlot::Dinner, lunch_time));

        // after midnight everything counts as past
        assert!(is_past_or_current(MealSlot::Snack, t(2, 0)));
    }

    #[test]
    fn test_minutes_elapsed_same_day() {
        assert_eq!(minutes_elapsed(t(8, 0), t(9, 0)), 60);
        assert_eq!(minutes_elapsed(t(8, 0), t(8, 0)), 0);
    }

    #[test]
    fn test_minutes_elapsed_wraps_to_previous_day() {
        assert_eq!(minutes_elapsed(t(23, 0), t(0, 30)), 90);
        assert_eq!(minutes_elapsed(t(9, 1), t(9, 0)), MINUTES_PER_DAY - 1);
    }

    #[test]
    fn test_minutes_elapsed_ignores_seconds() {
        let now = NaiveTime::from_hms_opt(9, 0, 59).unwrap();
        assert_eq!(minutes_elapsed(t(8, 0), now), 60);
    }

    #[test]
    fn test_parse_clock_time() {
        assert_eq!(parse_clock_time("08:30"), Some(t(8, 30)));
        assert_eq!(parse_clock_time(" 23:05 "), Some(t(23, 5)));
        assert_eq!(parse_clock_time("8.30"), None);
        assert_eq!(parse_clock_time("25:00"), None);
    }

    #[test]
    fn test_scheduled_times() {
        assert_eq!(format_clock_time(scheduled_time(MealSlot::Breakfast)), "08:00");
        assert_eq!(format_clock_time(scheduled_time(MealSlot::MidMorning)), "10:30");
        assert_eq!(format_clock_time(scheduled_time(MealSlot::Snack)), "16:00");
    }
}
