use std::collections::BTreeSet;

use super::types::{ROUNDING_UNIT, SavingsProgress, SavingsSchedule};

/// Cross-references a schedule with the days a user has marked as saved.
///
/// Saved indices that are not part of the schedule (for example after the
/// plan was shortened) are ignored.
pub fn summarize(
    schedule: &SavingsSchedule,
    target_amount: i64,
    saved_days: &BTreeSet<u32>,
) -> SavingsProgress {
    let (saved_day_count, total_saved) = saved_days
        .iter()
        .filter_map(|day| schedule.day(*day))
        .fold((0u32, 0i64), |(count, total), entry| {
            (count + 1, total + entry.amount)
        });

    let day_count = u32::try_from(schedule.day_count()).unwrap_or(u32::MAX);

    SavingsProgress {
        total_saved,
        remaining_amount: target_amount - total_saved,
        daily_average: daily_average(target_amount, day_count),
        saved_day_count,
        unsaved_day_count: day_count - saved_day_count,
    }
}

// Average over the whole plan, rounded half-up to the nearest thousand.
fn daily_average(target_amount: i64, day_count: u32) -> i64 {
    if day_count == 0 {
        return 0;
    }
    let denom = i128::from(day_count) * i128::from(ROUNDING_UNIT);
    let units = (2 * i128::from(target_amount) + denom).div_euclid(2 * denom);
    i64::try_from(units * i128::from(ROUNDING_UNIT)).unwrap_or(i64::MAX)
}
