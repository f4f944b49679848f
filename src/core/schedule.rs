use chrono::{Days, NaiveDate};
use thiserror::Error;

use super::types::{FIRST_DAY_AMOUNT, ROUNDING_UNIT, SavingsDay, SavingsSchedule};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("invalid schedule input: {0}")]
    InvalidScheduleInput(String),
}

fn invalid(msg: impl Into<String>) -> ScheduleError {
    ScheduleError::InvalidScheduleInput(msg.into())
}

/// Whole calendar days in `[start, end)`. Negative when the range is inverted.
pub fn day_span(start_date: NaiveDate, end_date: NaiveDate) -> i64 {
    end_date.signed_duration_since(start_date).num_days()
}

/// Builds the progressive deposit schedule for `[start_date, end_date)`.
///
/// Day `i` (1-based) owes `FIRST_DAY_AMOUNT + (i - 1) * k`, floored at
/// `FIRST_DAY_AMOUNT` and rounded half-up to the nearest `ROUNDING_UNIT`,
/// where `k` solves `target = n*x + k*n*(n-1)/2` rounded up. Whatever the
/// rounding leaves over is added to the last day so the schedule always sums
/// to `target_amount`. The last day is not re-floored or re-rounded after
/// that correction and can end up below `FIRST_DAY_AMOUNT`, even negative.
pub fn generate(
    target_amount: i64,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<SavingsSchedule, ScheduleError> {
    if target_amount <= 0 {
        return Err(invalid(format!(
            "target amount must be > 0, got {target_amount}"
        )));
    }

    let span = day_span(start_date, end_date);
    if span <= 1 {
        return Err(invalid(format!(
            "plan must span at least 2 days, {start_date} to {end_date} spans {span}"
        )));
    }
    let day_count =
        u32::try_from(span).map_err(|_| invalid(format!("plan spans too many days ({span})")))?;

    let n = i128::from(day_count);
    let first = i128::from(FIRST_DAY_AMOUNT);
    let target = i128::from(target_amount);
    let step = ceil_div(2 * (target - n * first), n * (n - 1));
    let step_increment =
        i64::try_from(step).map_err(|_| invalid("step increment does not fit an amount"))?;

    let mut daily_amounts = Vec::with_capacity(day_count as usize);
    let mut total_calculated: i128 = 0;

    for day in 1..=day_count {
        let offset = day - 1;
        let date = start_date
            .checked_add_days(Days::new(u64::from(offset)))
            .ok_or_else(|| invalid(format!("day {day} falls outside the calendar")))?;

        let raw = first + i128::from(offset) * step;
        let rounded = round_half_up(raw.max(first), i128::from(ROUNDING_UNIT));
        total_calculated += rounded;

        let amount = i64::try_from(rounded)
            .map_err(|_| invalid(format!("amount for day {day} does not fit an amount")))?;
        daily_amounts.push(SavingsDay { day, date, amount });
    }

    let diff = target - total_calculated;
    if diff != 0 {
        if let Some(last) = daily_amounts.last_mut() {
            let corrected = i128::from(last.amount) + diff;
            last.amount = i64::try_from(corrected)
                .map_err(|_| invalid("final-day correction does not fit an amount"))?;
        }
    }

    Ok(SavingsSchedule {
        daily_amounts,
        step_increment,
        first_day_amount: FIRST_DAY_AMOUNT,
    })
}

// `divisor` is always positive here, so euclidean division is floor division.
fn ceil_div(value: i128, divisor: i128) -> i128 {
    let quotient = value.div_euclid(divisor);
    if value.rem_euclid(divisor) == 0 {
        quotient
    } else {
        quotient + 1
    }
}

fn round_half_up(value: i128, unit: i128) -> i128 {
    (value + unit / 2).div_euclid(unit) * unit
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};
    use std::fs;
    use std::path::Path;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn amounts(schedule: &SavingsSchedule) -> Vec<i64> {
        schedule.daily_amounts.iter().map(|d| d.amount).collect()
    }

    fn assert_golden_snapshot(path: &str, actual: &str) {
        let update = matches!(
            std::env::var("UPDATE_GOLDEN").as_deref(),
            Ok("1") | Ok("true") | Ok("TRUE")
        );
        let snapshot_path = Path::new(path);

        if update {
            if let Some(parent) = snapshot_path.parent() {
                fs::create_dir_all(parent).expect("failed to create snapshot directory");
            }
            fs::write(snapshot_path, actual).expect("failed to write golden snapshot");
            return;
        }

        let expected = fs::read_to_string(snapshot_path).unwrap_or_else(|_| {
            panic!("missing golden snapshot at {path}; run with UPDATE_GOLDEN=1 to generate")
        });
        assert_eq!(
            actual, expected,
            "snapshot mismatch for {path}; run with UPDATE_GOLDEN=1 to refresh if expected"
        );
    }

    #[test]
    fn ten_day_plan_is_an_exact_progression() {
        let schedule = generate(1_000_000, date(2024, 1, 1), date(2024, 1, 11)).expect("valid");

        assert_eq!(schedule.day_count(), 10);
        assert_eq!(schedule.step_increment, 20_000);
        assert_eq!(schedule.first_day_amount, FIRST_DAY_AMOUNT);
        assert_eq!(schedule.total(), 1_000_000);
        assert_eq!(
            amounts(&schedule),
            vec![
                10_000, 30_000, 50_000, 70_000, 90_000, 110_000, 130_000, 150_000, 170_000,
                190_000
            ]
        );
        assert!(schedule.daily_amounts[0].amount >= FIRST_DAY_AMOUNT);
    }

    #[test]
    fn two_day_plan_at_floor_corrects_last_day_to_zero() {
        let schedule = generate(10_000, date(2024, 1, 1), date(2024, 1, 3)).expect("valid");

        assert_eq!(schedule.step_increment, -10_000);
        assert_eq!(amounts(&schedule), vec![10_000, 0]);
        assert_eq!(schedule.total(), 10_000);
    }

    #[test]
    fn negative_step_keeps_floor_and_last_day_absorbs_overshoot() {
        let schedule = generate(200_000, date(2024, 1, 1), date(2024, 1, 31)).expect("valid");

        assert_eq!(schedule.day_count(), 30);
        assert_eq!(schedule.step_increment, -229);
        let (last, rest) = schedule.daily_amounts.split_last().expect("non-empty");
        assert!(rest.iter().all(|d| d.amount == FIRST_DAY_AMOUNT));
        assert_eq!(last.amount, -90_000);
        assert_eq!(schedule.total(), 200_000);
    }

    #[test]
    fn rounding_drift_lands_on_last_day() {
        let schedule = generate(1_234_567, date(2024, 3, 1), date(2024, 3, 8)).expect("valid");

        assert_eq!(schedule.step_increment, 55_456);
        assert_eq!(
            amounts(&schedule),
            vec![10_000, 65_000, 121_000, 176_000, 232_000, 287_000, 343_567]
        );
    }

    #[test]
    fn half_thousand_rounds_up() {
        let schedule = generate(34_500, date(2024, 1, 1), date(2024, 1, 4)).expect("valid");

        assert_eq!(schedule.step_increment, 1_500);
        assert_eq!(amounts(&schedule), vec![10_000, 12_000, 12_500]);
    }

    #[test]
    fn dates_follow_day_index_across_month_and_leap_day() {
        let start = date(2024, 2, 27);
        let schedule = generate(100_000, start, date(2024, 3, 3)).expect("valid");

        let dates: Vec<NaiveDate> = schedule.daily_amounts.iter().map(|d| d.date).collect();
        assert_eq!(
            dates,
            vec![
                date(2024, 2, 27),
                date(2024, 2, 28),
                date(2024, 2, 29),
                date(2024, 3, 1),
                date(2024, 3, 2)
            ]
        );
    }

    #[test]
    fn rejects_degenerate_spans() {
        let d = date(2024, 6, 1);
        for end in [d, d + Duration::days(1), d - Duration::days(3)] {
            let err = generate(50_000, d, end).expect_err("must reject span <= 1");
            assert!(matches!(err, ScheduleError::InvalidScheduleInput(_)));
        }
    }

    #[test]
    fn rejects_non_positive_target() {
        for target in [0, -1, -1_000_000] {
            let err = generate(target, date(2024, 1, 1), date(2024, 2, 1))
                .expect_err("must reject non-positive target");
            assert!(err.to_string().contains("target amount"));
        }
    }

    #[test]
    fn day_lookup_is_one_based() {
        let schedule = generate(1_000_000, date(2024, 1, 1), date(2024, 1, 11)).expect("valid");

        assert_eq!(schedule.day(1).map(|d| d.amount), Some(10_000));
        assert_eq!(schedule.day(10).map(|d| d.amount), Some(190_000));
        assert!(schedule.day(0).is_none());
        assert!(schedule.day(11).is_none());
    }

    #[test]
    fn golden_snapshot_ten_day_schedule_json() {
        let schedule = generate(1_000_000, date(2024, 1, 1), date(2024, 1, 11)).expect("valid");
        let json = format!(
            "{}\n",
            serde_json::to_string(&schedule).expect("schedule should serialize")
        );

        assert_golden_snapshot("tests/golden/schedule_ten_days.json", &json);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_schedule_sums_to_target_with_ordered_days(
            target in 1i64..2_000_000_000,
            start_offset in 0i64..20_000,
            span in 2i64..800
        ) {
            let start = date(2000, 1, 1) + Duration::days(start_offset);
            let end = start + Duration::days(span);
            let schedule = generate(target, start, end).expect("valid inputs");

            prop_assert_eq!(schedule.total(), target);
            prop_assert_eq!(schedule.day_count() as i64, span);
            for (i, entry) in schedule.daily_amounts.iter().enumerate() {
                prop_assert_eq!(entry.day as usize, i + 1);
                prop_assert_eq!(entry.date, start + Duration::days(i as i64));
            }

            let (_, rest) = schedule.daily_amounts.split_last().expect("non-empty");
            for entry in rest {
                prop_assert!(entry.amount >= FIRST_DAY_AMOUNT);
                prop_assert_eq!(entry.amount % ROUNDING_UNIT, 0);
            }
        }

        #[test]
        fn prop_generation_is_deterministic(
            target in 1i64..50_000_000,
            span in 2i64..120
        ) {
            let start = date(2025, 1, 1);
            let end = start + Duration::days(span);
            let first = generate(target, start, end).expect("valid inputs");
            let second = generate(target, start, end).expect("valid inputs");
            prop_assert_eq!(first, second);
        }
    }
}
