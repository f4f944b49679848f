use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::core::{SavingsSchedule, ScheduleError, generate};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub target_amount: i64,
    pub created_at: DateTime<Utc>,
}

impl PlanConfig {
    pub fn schedule(&self) -> Result<SavingsSchedule, ScheduleError> {
        generate(self.target_amount, self.start_date, self.end_date)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedDayRecord {
    pub day: u32,
    pub date: NaiveDate,
    pub amount: i64,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("No config found")]
    NoConfig,
    #[error("day {day} is not part of the plan (1..={day_count})")]
    DayOutOfRange { day: u32, day_count: usize },
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

#[derive(Debug, Default)]
struct UserLedger {
    config: Option<PlanConfig>,
    saved: BTreeMap<u32, SavedDayRecord>,
}

/// Per-user plan configuration and saved-day markers, kept in memory.
#[derive(Debug, Default)]
pub struct SavingsStore {
    ledgers: RwLock<HashMap<String, UserLedger>>,
}

impl SavingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the user's plan. Saved markers survive a config change;
    /// markers that no longer fall inside the plan are simply not counted.
    pub async fn save_config(
        &self,
        user: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        target_amount: i64,
        now: DateTime<Utc>,
    ) -> Result<PlanConfig, StoreError> {
        let config = PlanConfig {
            start_date,
            end_date,
            target_amount,
            created_at: now,
        };
        config.schedule()?;

        let mut ledgers = self.ledgers.write().await;
        ledgers.entry(user.to_string()).or_default().config = Some(config.clone());
        Ok(config)
    }

    pub async fn config(&self, user: &str) -> Option<PlanConfig> {
        let ledgers = self.ledgers.read().await;
        ledgers.get(user).and_then(|ledger| ledger.config.clone())
    }

    pub async fn has_config(&self, user: &str) -> bool {
        let ledgers = self.ledgers.read().await;
        ledgers.get(user).is_some_and(|ledger| ledger.config.is_some())
    }

    /// Marks `day` as saved, recording the date and amount the current plan
    /// assigns to it. Marking an already-saved day keeps the first record.
    pub async fn mark_saved(
        &self,
        user: &str,
        day: u32,
        now: DateTime<Utc>,
    ) -> Result<SavedDayRecord, StoreError> {
        let mut ledgers = self.ledgers.write().await;
        let ledger = ledgers.get_mut(user).ok_or(StoreError::NoConfig)?;
        let config = ledger.config.as_ref().ok_or(StoreError::NoConfig)?;
        let schedule = config.schedule()?;
        let entry = schedule.day(day).ok_or(StoreError::DayOutOfRange {
            day,
            day_count: schedule.day_count(),
        })?;

        let record = ledger.saved.entry(day).or_insert_with(|| SavedDayRecord {
            day,
            date: entry.date,
            amount: entry.amount,
            saved_at: now,
        });
        Ok(record.clone())
    }

    /// Returns whether a marker was removed. Unknown users and unsaved days
    /// are not errors.
    pub async fn unmark_saved(&self, user: &str, day: u32) -> bool {
        let mut ledgers = self.ledgers.write().await;
        ledgers
            .get_mut(user)
            .and_then(|ledger| ledger.saved.remove(&day))
            .is_some()
    }

    /// The plan and its saved day numbers, read under one lock so a
    /// concurrent reconfigure cannot pair one plan with another's markers.
    pub async fn plan_snapshot(&self, user: &str) -> (Option<PlanConfig>, BTreeSet<u32>) {
        let ledgers = self.ledgers.read().await;
        match ledgers.get(user) {
            Some(ledger) => (
                ledger.config.clone(),
                ledger.saved.keys().copied().collect(),
            ),
            None => (None, BTreeSet::new()),
        }
    }

    pub async fn saved_records(&self, user: &str) -> Vec<SavedDayRecord> {
        let ledgers = self.ledgers.read().await;
        ledgers
            .get(user)
            .map(|ledger| ledger.saved.values().cloned().collect())
            .unwrap_or_default()
    }
}
