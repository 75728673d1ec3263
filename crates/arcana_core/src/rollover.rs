//! crates/arcana_core/src/rollover.rs
//!
//! Daily/monthly rollover: the date-keyed recomputation performed once per
//! session start. Handles inactivity tier decay, the monthly bonus and
//! spend reset, the attendance streak, and the daily reading counter.

use chrono::{Datelike, NaiveDate};

use crate::domain::UserProfile;
use crate::ledger;
use crate::tier::Tier;

/// Days of absence per tier demotion step.
pub const INACTIVITY_STEP_DAYS: i64 = 15;

/// The attendance streak wraps back to day 1 after this many days.
pub const STREAK_LENGTH: u8 = 7;

/// Coin reward per streak day, indexed by `streak_day - 1`.
pub const STREAK_REWARDS: [u32; STREAK_LENGTH as usize] = [10, 15, 20, 25, 30, 40, 100];

/// What a rollover changed, for logging and the session-start notice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RolloverOutcome {
    pub demoted_steps: u32,
    pub monthly_bonus: u32,
    /// Set when today is a new login day: the streak position reached.
    pub streak_day: Option<u8>,
    pub streak_reward: u32,
}

/// Runs the rollover against today's date. Idempotent within a calendar
/// day: a second run on the same date changes nothing.
pub fn run(profile: &mut UserProfile, today: NaiveDate) -> RolloverOutcome {
    let mut outcome = RolloverOutcome::default();

    if let Some(last_login) = profile.last_login {
        let gap_days = (today - last_login).num_days();
        if gap_days >= INACTIVITY_STEP_DAYS {
            outcome.demoted_steps = (gap_days / INACTIVITY_STEP_DAYS) as u32;
            profile.tier = profile.tier.demoted_by(outcome.demoted_steps);
        }

        let month_changed =
            (last_login.year(), last_login.month()) != (today.year(), today.month());
        if month_changed {
            let before = profile.coins;
            profile.coins = profile.tier.apply_monthly_bonus(profile.coins);
            outcome.monthly_bonus = profile.coins - before;
            profile.monthly_spent = 0;
            profile.tier = Tier::Bronze;
        }
    }

    if profile.last_login != Some(today) {
        profile.streak_day = if profile.streak_day >= STREAK_LENGTH {
            1
        } else {
            profile.streak_day + 1
        };
        let reward = STREAK_REWARDS[(profile.streak_day - 1) as usize];
        ledger::earn(profile, reward);
        outcome.streak_day = Some(profile.streak_day);
        outcome.streak_reward = reward;
    }

    if profile.last_reading != Some(today) {
        profile.daily_readings = 0;
    }

    profile.last_login = Some(today);
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn returning_profile(last_login: NaiveDate) -> UserProfile {
        UserProfile {
            last_login: Some(last_login),
            ..UserProfile::default()
        }
    }

    #[test]
    fn inactivity_demotes_one_step_per_fifteen_day_block() {
        let cases = [(14, 0u32), (15, 1), (29, 1), (30, 2), (44, 2), (45, 3)];
        for (gap, steps) in cases {
            let last = date(2024, 6, 1);
            let mut profile = returning_profile(last);
            profile.tier = Tier::Diamond;
            let outcome = run(&mut profile, last + chrono::Duration::days(gap));
            assert_eq!(outcome.demoted_steps, steps, "gap={gap}");
            assert_eq!(profile.tier, Tier::Diamond.demoted_by(steps), "gap={gap}");
        }
    }

    #[test]
    fn demotion_is_clamped_at_bronze() {
        let mut profile = returning_profile(date(2024, 1, 1));
        profile.tier = Tier::Silver;
        run(&mut profile, date(2024, 12, 1));
        assert_eq!(profile.tier, Tier::Bronze);
    }

    #[test]
    fn month_change_applies_bonus_then_resets() {
        let mut profile = returning_profile(date(2024, 5, 31));
        profile.tier = Tier::Diamond;
        profile.coins = 100;
        profile.monthly_spent = 4_200;

        let outcome = run(&mut profile, date(2024, 6, 1));

        assert_eq!(outcome.monthly_bonus, 100);
        // 200 from the bonus plus the day-1 attendance reward.
        assert_eq!(profile.coins, 200 + STREAK_REWARDS[0]);
        assert_eq!(profile.monthly_spent, 0);
        assert_eq!(profile.tier, Tier::Bronze);
    }

    #[test]
    fn gold_bonus_is_one_and_a_half() {
        let mut profile = returning_profile(date(2024, 5, 15));
        profile.tier = Tier::Gold;
        profile.coins = 100;

        let outcome = run(&mut profile, date(2024, 6, 2));

        assert_eq!(outcome.monthly_bonus, 50);
    }

    #[test]
    fn decay_runs_before_the_monthly_bonus() {
        // 45 days of absence demote Diamond to Bronze before the bonus, so
        // no multiplier applies.
        let mut profile = returning_profile(date(2024, 4, 17));
        profile.tier = Tier::Diamond;
        profile.coins = 100;

        let outcome = run(&mut profile, date(2024, 6, 1));

        assert_eq!(outcome.demoted_steps, 3);
        assert_eq!(outcome.monthly_bonus, 0);
        assert_eq!(profile.tier, Tier::Bronze);
    }

    #[test]
    fn streak_advances_once_per_distinct_day() {
        let mut profile = UserProfile::default();
        let day = date(2024, 6, 10);

        let first = run(&mut profile, day);
        assert_eq!(first.streak_day, Some(1));
        assert_eq!(first.streak_reward, STREAK_REWARDS[0]);

        let again = run(&mut profile, day);
        assert_eq!(again.streak_day, None);
        assert_eq!(again.streak_reward, 0);
        assert_eq!(profile.streak_day, 1);
    }

    #[test]
    fn streak_wraps_after_the_final_day() {
        let mut profile = UserProfile::default();
        let start = date(2024, 6, 1);

        let mut last_outcome = RolloverOutcome::default();
        for offset in 0..STREAK_LENGTH as i64 {
            last_outcome = run(&mut profile, start + chrono::Duration::days(offset));
        }
        assert_eq!(profile.streak_day, STREAK_LENGTH);
        assert_eq!(
            last_outcome.streak_reward,
            STREAK_REWARDS[(STREAK_LENGTH - 1) as usize]
        );

        let wrapped = run(
            &mut profile,
            start + chrono::Duration::days(STREAK_LENGTH as i64),
        );
        assert_eq!(wrapped.streak_day, Some(1));
        assert_eq!(wrapped.streak_reward, STREAK_REWARDS[0]);
    }

    #[test]
    fn daily_reading_counter_resets_on_a_new_day() {
        let mut profile = returning_profile(date(2024, 6, 9));
        profile.daily_readings = 3;
        profile.last_reading = Some(date(2024, 6, 9));

        run(&mut profile, date(2024, 6, 10));
        assert_eq!(profile.daily_readings, 0);
    }

    #[test]
    fn daily_reading_counter_survives_same_day_restart() {
        let today = date(2024, 6, 10);
        let mut profile = returning_profile(today);
        profile.streak_day = 1;
        profile.daily_readings = 2;
        profile.last_reading = Some(today);

        run(&mut profile, today);
        assert_eq!(profile.daily_readings, 2);
    }
}
