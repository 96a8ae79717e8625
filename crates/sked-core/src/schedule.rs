//! Schedule model and storage contract.

use std::sync::Mutex;

use anyhow::{Result, anyhow};
use chrono::NaiveDateTime;

/// Display format for schedule timestamps in prompt context and listings.
pub const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M";

/// A single calendar entry.
///
/// Equality covers all three fields; update and delete locate entries by
/// full value, so a `Schedule` is its own identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub title: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Schedule {
    pub fn new(title: impl Into<String>, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            title: title.into(),
            start,
            end,
        }
    }
}

/// Storage contract for calendar entries.
///
/// Implementations are shared across concurrent requests. Each operation is
/// atomic on its own; no transaction spans multiple calls (see the update
/// path in [`crate::command::apply_command`]).
pub trait ScheduleStore: Send + Sync {
    /// Persists a new entry.
    ///
    /// # Errors
    /// Returns an error if the entry cannot be stored.
    fn save(&self, schedule: Schedule) -> Result<()>;

    /// Returns entries whose start time falls in `[from, to)`, ascending by
    /// start time.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read.
    fn fetch_range(&self, from: NaiveDateTime, to: NaiveDateTime) -> Result<Vec<Schedule>>;

    /// Deletes the entry equal to `schedule`. Absent entries are a no-op,
    /// not an error.
    ///
    /// # Errors
    /// Returns an error if the store cannot be written.
    fn delete(&self, schedule: &Schedule) -> Result<()>;
}

/// In-memory store used by the CLI and tests.
#[derive(Debug, Default)]
pub struct MemoryScheduleStore {
    entries: Mutex<Vec<Schedule>>,
}

impl MemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every entry, ascending by start time.
    pub fn all(&self) -> Vec<Schedule> {
        let Ok(entries) = self.entries.lock() else {
            return Vec::new();
        };
        let mut all = entries.clone();
        all.sort_by_key(|s| s.start);
        all
    }
}

impl ScheduleStore for MemoryScheduleStore {
    fn save(&self, schedule: Schedule) -> Result<()> {
        self.entries
            .lock()
            .map_err(|_| anyhow!("schedule store lock poisoned"))?
            .push(schedule);
        Ok(())
    }

    fn fetch_range(&self, from: NaiveDateTime, to: NaiveDateTime) -> Result<Vec<Schedule>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("schedule store lock poisoned"))?;
        let mut matched: Vec<Schedule> = entries
            .iter()
            .filter(|s| s.start >= from && s.start < to)
            .cloned()
            .collect();
        matched.sort_by_key(|s| s.start);
        Ok(matched)
    }

    fn delete(&self, schedule: &Schedule) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("schedule store lock poisoned"))?;
        if let Some(index) = entries.iter().position(|s| s == schedule) {
            entries.remove(index);
        }
        Ok(())
    }
}
