//! Embedded schedule-command extraction.
//!
//! The assistant replies in prose; a calendar mutation, when present, rides
//! inside the reply as a JSON object. Extraction is opportunistic: any parse
//! or validation failure leaves the reply as plain prose.

mod apply;

pub use apply::apply_command;

use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::schedule::Schedule;

/// Timestamp pattern used by the embedded command JSON.
const COMMAND_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A parsed calendar mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleCommand {
    Add {
        schedule: Schedule,
    },
    Update {
        old: Schedule,
        new: Schedule,
    },
    Delete {
        schedule: Schedule,
    },
    /// Operation name the contract does not recognize; logged, never applied.
    Unknown {
        operation: String,
    },
}

/// Locates and parses a schedule command in the full response text.
///
/// Takes the substring from the first `{` to the last `}` (inclusive) and
/// decodes it. Returns `None` on any failure (absent braces, malformed
/// JSON, missing fields, unparsable timestamps, empty title, non-positive
/// duration). Never raises.
pub fn extract_command(text: &str) -> Option<ScheduleCommand> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if start >= end {
        return None;
    }

    let raw: RawCommand = serde_json::from_str(&text[start..=end]).ok()?;
    let operation = raw.operation.or(raw.action)?;

    match operation.as_str() {
        "add" => Some(ScheduleCommand::Add {
            schedule: raw.schedule?.validate()?,
        }),
        "update" => Some(ScheduleCommand::Update {
            old: raw.old_schedule?.validate()?,
            new: raw.new_schedule?.validate()?,
        }),
        "delete" => Some(ScheduleCommand::Delete {
            schedule: raw.schedule?.validate()?,
        }),
        _ => Some(ScheduleCommand::Unknown { operation }),
    }
}

#[derive(Debug, Deserialize)]
struct RawCommand {
    #[serde(default)]
    operation: Option<String>,
    /// Accepted alias for `operation`.
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    schedule: Option<RawSchedule>,
    #[serde(default, rename = "oldSchedule")]
    old_schedule: Option<RawSchedule>,
    #[serde(default, rename = "newSchedule")]
    new_schedule: Option<RawSchedule>,
}

#[derive(Debug, Deserialize)]
struct RawSchedule {
    #[serde(default)]
    title: Option<String>,
    #[serde(default, rename = "startTime")]
    start_time: Option<String>,
    #[serde(default, rename = "endTime")]
    end_time: Option<String>,
}

impl RawSchedule {
    /// Upgrades raw fields into a validated `Schedule`: non-empty title,
    /// both timestamps in the command format, positive duration.
    fn validate(self) -> Option<Schedule> {
        let title = self.title?;
        if title.is_empty() {
            return None;
        }
        let start =
            NaiveDateTime::parse_from_str(self.start_time.as_deref()?, COMMAND_TIME_FORMAT).ok()?;
        let end =
            NaiveDateTime::parse_from_str(self.end_time.as_deref()?, COMMAND_TIME_FORMAT).ok()?;
        if end <= start {
            return None;
        }
        Some(Schedule { title, start, end })
    }
}
