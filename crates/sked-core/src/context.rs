//! Prompt context from the user's recent and upcoming schedules.

use chrono::{Duration, NaiveDateTime};
use tracing::error;

use crate::schedule::{DISPLAY_FORMAT, ScheduleStore};

/// Days of schedule visibility on each side of `now`.
const CONTEXT_WINDOW_DAYS: i64 = 30;

const NO_SCHEDULES: &str = "The user currently has no scheduled events.";
const HEADING: &str = "The user's existing schedule:";

/// Renders the schedule context block prepended to every outbound prompt.
///
/// Window: `[now - 30d, now + 30d)`, one line per entry in store order
/// (ascending start time). A fetch failure degrades to the no-schedules
/// sentence; prompt construction never fails.
pub fn build_context(store: &dyn ScheduleStore, now: NaiveDateTime) -> String {
    let from = now - Duration::days(CONTEXT_WINDOW_DAYS);
    let to = now + Duration::days(CONTEXT_WINDOW_DAYS);

    let schedules = match store.fetch_range(from, to) {
        Ok(schedules) => schedules,
        Err(err) => {
            error!("failed to fetch schedules for prompt context: {err:#}");
            Vec::new()
        }
    };

    if schedules.is_empty() {
        return NO_SCHEDULES.to_string();
    }

    let mut context = String::from(HEADING);
    for schedule in &schedules {
        context.push_str(&format!(
            "\n- {}: {} to {}",
            schedule.title,
            schedule.start.format(DISPLAY_FORMAT),
            schedule.end.format(DISPLAY_FORMAT)
        ));
    }
    context
}
