//! Frame-to-delta reduction and completion detection.

use serde::Deserialize;
use tracing::debug;

use super::sse::DecodedFrame;

/// Terminal sentinel in `output.finish_reason`.
const FINISH_SENTINEL: &str = "stop";

/// Updates produced by the reducer for the client loop to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamUpdate {
    /// New text fragment, already appended to the accumulated response.
    Delta(String),
    /// The finish sentinel arrived; the stream is semantically complete.
    Finished,
}

/// Per-request reducer state.
///
/// Owned by exactly one in-flight request; created when the request starts
/// and consumed when its terminal event fires.
#[derive(Debug, Default)]
pub struct StreamReducer {
    accumulated: String,
    finished: bool,
}

impl StreamReducer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn into_text(self) -> String {
        self.accumulated
    }

    /// Folds one decoded frame into the response.
    ///
    /// The payload must decode to `{"output": {...}}`; any other shape skips
    /// the frame. Frames arriving after the finish sentinel are no-ops.
    pub fn on_frame(&mut self, frame: &DecodedFrame) -> Vec<StreamUpdate> {
        if self.finished {
            return Vec::new();
        }

        let Ok(payload) = serde_json::from_str::<ChunkPayload>(&frame.data) else {
            debug!(
                event = frame.event.as_deref(),
                "skipping frame with unexpected payload"
            );
            return Vec::new();
        };
        let Some(output) = payload.output else {
            debug!(
                event = frame.event.as_deref(),
                "skipping frame without output object"
            );
            return Vec::new();
        };

        let mut updates = Vec::new();
        if let Some(text) = output.text {
            self.accumulated.push_str(&text);
            updates.push(StreamUpdate::Delta(text));
        }
        if output.finish_reason.as_deref() == Some(FINISH_SENTINEL) {
            self.finished = true;
            updates.push(StreamUpdate::Finished);
        }
        updates
    }
}

#[derive(Debug, Deserialize)]
struct ChunkPayload {
    #[serde(default)]
    output: Option<ChunkOutput>,
}

#[derive(Debug, Deserialize)]
struct ChunkOutput {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    finish_reason: Option<String>,
}
