use chrono::NaiveDate;
use serde::Serialize;

/// Deposit required on the first day of every plan, in VND.
pub const FIRST_DAY_AMOUNT: i64 = 10_000;

/// Per-day amounts are rounded to this grid before the final correction.
pub const ROUNDING_UNIT: i64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsDay {
    pub day: u32,
    pub date: NaiveDate,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsSchedule {
    pub daily_amounts: Vec<SavingsDay>,
    pub step_increment: i64,
    pub first_day_amount: i64,
}

impl SavingsSchedule {
    pub fn day_count(&self) -> usize {
        self.daily_amounts.len()
    }

    pub fn total(&self) -> i64 {
        self.daily_amounts.iter().map(|d| d.amount).sum()
    }

    /// Looks up a day by its 1-based index.
    pub fn day(&self, day: u32) -> Option<&SavingsDay> {
        let idx = usize::try_from(day).ok()?.checked_sub(1)?;
        self.daily_amounts.get(idx)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsProgress {
    pub total_saved: i64,
    pub remaining_amount: i64,
    pub daily_average: i64,
    pub saved_day_count: u32,
    pub unsaved_day_count: u32,
}
