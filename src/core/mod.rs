mod format;
mod progress;
mod schedule;
mod types;

pub use format::format_vnd;
pub use progress::summarize;
pub use schedule::{ScheduleError, day_span, generate};
pub use types::{
    FIRST_DAY_AMOUNT, ROUNDING_UNIT, SavingsDay, SavingsProgress, SavingsSchedule,
};
