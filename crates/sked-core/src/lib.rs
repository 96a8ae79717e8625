//! Core sked library (streaming client, schedule commands, history, context).

pub mod command;
pub mod context;
pub mod events;
pub mod history;
pub mod prompts;
pub mod provider;
pub mod schedule;
