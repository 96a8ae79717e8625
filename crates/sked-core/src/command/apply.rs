//! Applies parsed schedule commands to the store.

use tracing::{error, info, warn};

use super::ScheduleCommand;
use crate::schedule::ScheduleStore;

/// Applies `command` against `store`.
///
/// Storage failures are diagnostics, not stream errors: a failed calendar
/// mutation does not fail the chat turn. The update path is delete-then-save
/// without rollback; when the delete fails the save is still attempted,
/// which can leave both the old and the new entry present.
pub fn apply_command(store: &dyn ScheduleStore, command: &ScheduleCommand) {
    match command {
        ScheduleCommand::Add { schedule } => {
            match store.save(schedule.clone()) {
                Ok(()) => info!(title = %schedule.title, "schedule added"),
                Err(err) => error!(title = %schedule.title, "failed to save schedule: {err:#}"),
            }
        }
        ScheduleCommand::Update { old, new } => {
            if let Err(err) = store.delete(old) {
                error!(title = %old.title, "failed to delete old schedule: {err:#}");
            }
            match store.save(new.clone()) {
                Ok(()) => info!(old = %old.title, new = %new.title, "schedule updated"),
                Err(err) => error!(title = %new.title, "failed to save new schedule: {err:#}"),
            }
        }
        ScheduleCommand::Delete { schedule } => {
            match store.delete(schedule) {
                Ok(()) => info!(title = %schedule.title, "schedule deleted"),
                Err(err) => error!(title = %schedule.title, "failed to delete schedule: {err:#}"),
            }
        }
        ScheduleCommand::Unknown { operation } => {
            warn!(%operation, "unknown schedule operation, nothing applied");
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::{Result, bail};
    use chrono::{NaiveDate, NaiveDateTime};

    use super::*;
    use crate::schedule::{MemoryScheduleStore, Schedule};

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 4, 2)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn add_saves_the_schedule() {
        let store = MemoryScheduleStore::new();
        apply_command(
            &store,
            &ScheduleCommand::Add {
                schedule: Schedule::new("Review", at(14), at(16)),
            },
        );
        assert_eq!(store.all(), vec![Schedule::new("Review", at(14), at(16))]);
    }

    #[test]
    fn update_replaces_the_old_entry() {
        let store = MemoryScheduleStore::new();
        let old = Schedule::new("Review", at(14), at(16));
        store.save(old.clone()).unwrap();

        let new = Schedule::new("Review (moved)", at(15), at(17));
        apply_command(
            &store,
            &ScheduleCommand::Update {
                old,
                new: new.clone(),
            },
        );
        assert_eq!(store.all(), vec![new]);
    }

    #[test]
    fn delete_removes_exactly_one_matching_entry() {
        let store = MemoryScheduleStore::new();
        let gym = Schedule::new("Gym", at(8), at(9));
        store.save(gym.clone()).unwrap();
        store.save(Schedule::new("Standup", at(10), at(11))).unwrap();

        apply_command(&store, &ScheduleCommand::Delete { schedule: gym });
        assert_eq!(store.all(), vec![Schedule::new("Standup", at(10), at(11))]);
    }

    #[test]
    fn unknown_touches_nothing() {
        let store = MemoryScheduleStore::new();
        store.save(Schedule::new("Gym", at(8), at(9))).unwrap();
        apply_command(
            &store,
            &ScheduleCommand::Unknown {
                operation: "archive".to_string(),
            },
        );
        assert_eq!(store.all().len(), 1);
    }

    /// Store whose deletes always fail; saves pass through.
    struct StuckDeleteStore(MemoryScheduleStore);

    impl ScheduleStore for StuckDeleteStore {
        fn save(&self, schedule: Schedule) -> Result<()> {
            self.0.save(schedule)
        }

        fn fetch_range(&self, from: NaiveDateTime, to: NaiveDateTime) -> Result<Vec<Schedule>> {
            self.0.fetch_range(from, to)
        }

        fn delete(&self, _schedule: &Schedule) -> Result<()> {
            bail!("delete rejected")
        }
    }

    #[test]
    fn update_still_saves_when_delete_fails() {
        let store = StuckDeleteStore(MemoryScheduleStore::new());
        let old = Schedule::new("Review", at(14), at(16));
        store.0.save(old.clone()).unwrap();

        let new = Schedule::new("Review (moved)", at(15), at(17));
        apply_command(
            &store,
            &ScheduleCommand::Update {
                old: old.clone(),
                new: new.clone(),
            },
        );

        // Both entries present: accepted consequence of the non-transactional
        // delete-then-save contract.
        assert_eq!(store.0.all(), vec![old, new]);
    }
}
