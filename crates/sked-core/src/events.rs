//! Assistant event contract.
//!
//! This module defines the events emitted while a request streams. Events
//! are serializable for future JSON output mode support.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::provider::ProviderErrorKind;

/// Events emitted by the client during one streaming request.
///
/// `TextDelta` events fire in frame-arrival order; exactly one of
/// `Completed`/`Failed` follows them, strictly last. Command application
/// happens before `Completed` is delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssistantEvent {
    /// UI spinner hint. Advisory only, not correctness-critical.
    Loading { active: bool },

    /// Incremental text chunk from the assistant.
    TextDelta { text: String },

    /// Stream finished; carries the full accumulated text.
    Completed { text: String },

    /// Stream failed; nothing was committed to history.
    Failed { kind: ErrorKind, message: String },
}

/// Error categories for `AssistantEvent::Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// HTTP status error (4xx, 5xx)
    HttpStatus,
    /// Connection/request timeout
    Timeout,
    /// Response parsing failed
    Parse,
    /// Caller canceled the in-flight stream
    Canceled,
    /// Internal/unknown error
    Internal,
}

impl From<ProviderErrorKind> for ErrorKind {
    fn from(kind: ProviderErrorKind) -> Self {
        match kind {
            ProviderErrorKind::HttpStatus => ErrorKind::HttpStatus,
            ProviderErrorKind::Timeout => ErrorKind::Timeout,
            ProviderErrorKind::Parse => ErrorKind::Parse,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::HttpStatus => write!(f, "http_status"),
            ErrorKind::Timeout => write!(f, "timeout"),
            ErrorKind::Parse => write!(f, "parse"),
            ErrorKind::Canceled => write!(f, "canceled"),
            ErrorKind::Internal => write!(f, "internal"),
        }
    }
}

/// Channel-based event sender (async, bounded).
pub type AssistantEventTx = mpsc::Sender<AssistantEvent>;

/// Channel-based event receiver (async, bounded).
pub type AssistantEventRx = mpsc::Receiver<AssistantEvent>;

/// Default channel capacity for event streams.
///
/// Set higher (128) to accommodate best-effort delta sends without blocking.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 128;

/// Creates a bounded event channel with the default capacity.
pub fn create_event_channel() -> (AssistantEventTx, AssistantEventRx) {
    mpsc::channel(DEFAULT_EVENT_CHANNEL_CAPACITY)
}

/// Event sender wrapper that provides best-effort and reliable send modes.
///
/// Use `send_delta()` for high-volume events (`TextDelta`, `Loading`) that
/// can be dropped if the consumer is slow. Use `send_important()` for the
/// terminal events that must be delivered.
#[derive(Clone)]
pub struct EventSender {
    tx: AssistantEventTx,
}

impl EventSender {
    /// Creates a new `EventSender` wrapping the given channel sender.
    pub fn new(tx: AssistantEventTx) -> Self {
        Self { tx }
    }

    /// Best-effort send: never awaits, drops if channel is full.
    pub fn send_delta(&self, ev: AssistantEvent) {
        let _ = self.tx.try_send(ev);
    }

    /// Reliable send: awaits delivery.
    pub async fn send_important(&self, ev: AssistantEvent) {
        let _ = self.tx.send(ev).await;
    }
}
