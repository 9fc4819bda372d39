use chrono::NaiveDate;

use crate::models::StreakUpdate;

/// Streak fields of a profile as read from the store.
#[derive(Debug, Clone, Copy)]
pub struct StreakState {
    pub streak_days: i32,
    pub last_streak_date: Option<NaiveDate>,
}

/// Apply one qualifying activity to the streak. Comparisons are date-only;
/// time of day never matters here.
///
/// Transitions:
/// - no prior date: seed at 1
/// - same day: no-op, repeat activity never inflates the streak
/// - exactly one day later: increment
/// - two or more days later: reset to 1 (the activity itself is day one)
/// - earlier than the recorded date: no-op, late-arriving sync data is
///   tolerated rather than rejected
pub fn apply_activity(state: StreakState, activity_date: NaiveDate) -> StreakUpdate {
    let previous = state.streak_days;

    let Some(last) = state.last_streak_date else {
        return StreakUpdate {
            previous_streak: previous,
            new_streak: 1,
            updated: true,
        };
    };

    let gap = (activity_date - last).num_days();
    let (new_streak, updated) = match gap {
        d if d < 0 => (previous, false),
        0 => (previous, false),
        1 => (previous + 1, true),
        _ => (1, true),
    };

    StreakUpdate {
        previous_streak: previous,
        new_streak,
        updated,
    }
}

/// Whether the streak is still live going into `reference_date`: the last
/// qualifying day was that date or the day before. A lapsed streak keeps
/// its stored `streak_days` for display until the next activity resets it.
pub fn is_active(last_streak_date: Option<NaiveDate>, reference_date: NaiveDate) -> bool {
    match last_streak_date {
        Some(last) => {
            let gap = (reference_date - last).num_days();
            (0..=1).contains(&gap)
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn state(streak_days: i32, last: Option<NaiveDate>) -> StreakState {
        StreakState {
            streak_days,
            last_streak_date: last,
        }
    }

    #[test]
    fn first_activity_seeds_at_one() {
        let update = apply_activity(state(0, None), day(1));
        assert_eq!(update.previous_streak, 0);
        assert_eq!(update.new_streak, 1);
        assert!(update.updated);
    }

    #[test]
    fn same_day_is_idempotent() {
        let update = apply_activity(state(4, Some(day(10))), day(10));
        assert_eq!(update.new_streak, 4);
        assert!(!update.updated);
    }

    #[test]
    fn consecutive_days_grow_by_one() {
        let mut st = state(0, None);
        for (i, expected) in [(1, 1), (2, 2), (3, 3)] {
            let update = apply_activity(st, day(i));
            assert_eq!(update.new_streak, expected);
            st = state(update.new_streak, Some(day(i)));
        }
    }

    #[test]
    fn gap_resets_to_one() {
        let update = apply_activity(state(5, Some(day(1))), day(6));
        assert_eq!(update.new_streak, 1);
        assert!(update.updated);
    }

    #[test]
    fn backfilled_activity_is_a_noop() {
        let update = apply_activity(state(3, Some(day(12))), day(9));
        assert_eq!(update.new_streak, 3);
        assert!(!update.updated);
    }

    #[test]
    fn active_today_or_yesterday_only() {
        assert!(is_active(Some(day(10)), day(10)));
        assert!(is_active(Some(day(10)), day(11)));
        assert!(!is_active(Some(day(10)), day(12)));
        assert!(!is_active(None, day(10)));
    }

    #[test]
    fn future_last_date_is_not_active() {
        assert!(!is_active(Some(day(12)), day(10)));
    }
}
