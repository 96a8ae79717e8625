//! DashScope app-completion streaming client.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;
use chrono::Local;
use futures_util::StreamExt;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::sse::{DecodedFrame, FrameDecoder};
use super::stream::{StreamReducer, StreamUpdate};
use crate::command::{apply_command, extract_command};
use crate::context::build_context;
use crate::events::{AssistantEvent, ErrorKind, EventSender};
use crate::history::{History, Role};
use crate::prompts;
use crate::provider::{
    ProviderError, USER_AGENT, classify_reqwest_error, resolve_api_key, resolve_base_url,
};
use crate::schedule::ScheduleStore;

/// Default base URL for the DashScope API.
pub const DEFAULT_BASE_URL: &str = "https://dashscope.aliyuncs.com";

/// Header that switches the completion endpoint into SSE mode.
const SSE_HEADER: &str = "X-DashScope-SSE";

/// Configuration for the DashScope client.
#[derive(Debug, Clone)]
pub struct DashScopeConfig {
    /// Bearer credential.
    pub api_key: String,
    pub base_url: String,
    /// Application id baked into the completion URL.
    pub app_id: String,
    /// Whole-request timeout, enforced by the transport.
    pub request_timeout: Duration,
    /// Advisory no-bytes warning window. Log-only; never aborts the stream.
    pub liveness_warn: Duration,
}

impl DashScopeConfig {
    /// Creates a config from the environment.
    ///
    /// Authentication resolution order:
    /// 1. `config_api_key` parameter (from config)
    /// 2. `DASHSCOPE_API_KEY` environment variable
    ///
    /// Base URL resolution order:
    /// 1. `DASHSCOPE_BASE_URL` env var (if set and non-empty)
    /// 2. `config_base_url` parameter (if Some and non-empty)
    /// 3. Default: `https://dashscope.aliyuncs.com`
    ///
    /// # Errors
    /// Returns an error if no API key is available or a URL is malformed.
    pub fn from_env(
        app_id: String,
        config_base_url: Option<&str>,
        config_api_key: Option<&str>,
    ) -> Result<Self> {
        let api_key = resolve_api_key(config_api_key, "DASHSCOPE_API_KEY", "dashscope")?;
        let base_url = resolve_base_url(
            config_base_url,
            "DASHSCOPE_BASE_URL",
            DEFAULT_BASE_URL,
            "DashScope",
        )?;

        Ok(Self {
            api_key,
            base_url,
            app_id,
            request_timeout: Duration::from_secs(60),
            liveness_warn: Duration::from_secs(5),
        })
    }
}

/// Outbound completion payload.
#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    input: CompletionInput<'a>,
    parameters: CompletionParameters,
    debug: Empty,
}

#[derive(Debug, Serialize)]
struct CompletionInput<'a> {
    prompt: &'a str,
}

#[derive(Debug, Serialize)]
struct CompletionParameters {
    incremental_output: bool,
}

/// Serializes to `{}`.
#[derive(Debug, Serialize)]
struct Empty {}

enum Outcome {
    /// Stream reached a terminal state; carries the accumulated text.
    Completed(String),
    Canceled,
}

/// Streaming client for the scheduling assistant.
///
/// One instance owns the conversation history; one call to
/// [`Self::send_message_stream`] drives one request pipeline. The schedule
/// store is injected at construction and shared with the rest of the app.
pub struct AssistantClient<S> {
    config: DashScopeConfig,
    http: reqwest::Client,
    store: Arc<S>,
    history: History,
}

impl<S: ScheduleStore> AssistantClient<S> {
    /// Creates a new client with the given configuration.
    ///
    /// # Panics
    /// - In test builds (`#[cfg(test)]`), panics if `base_url` is the production API.
    /// - At runtime, panics if `SKED_BLOCK_REAL_API=1` and `base_url` is the production API.
    ///
    /// This prevents tests from accidentally making real network requests.
    /// Use `DASHSCOPE_BASE_URL` env var or config to point to a mock server.
    pub fn new(config: DashScopeConfig, store: Arc<S>) -> Self {
        #[cfg(test)]
        if config.base_url == DEFAULT_BASE_URL {
            panic!(
                "Tests must not use the production DashScope API!\n\
                 Set DASHSCOPE_BASE_URL to a mock server (e.g., wiremock).\n\
                 Found base_url: {}",
                config.base_url
            );
        }

        #[cfg(not(test))]
        if std::env::var("SKED_BLOCK_REAL_API").is_ok_and(|v| v == "1")
            && config.base_url == DEFAULT_BASE_URL
        {
            panic!(
                "SKED_BLOCK_REAL_API=1 but trying to use production DashScope API!\n\
                 Set DASHSCOPE_BASE_URL to a mock server.\n\
                 Found base_url: {}",
                config.base_url
            );
        }

        Self {
            config,
            http: reqwest::Client::new(),
            store,
            history: History::new(),
        }
    }

    /// Read-only view of the conversation log.
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Clears the conversation log.
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Sends `prompt` and drives the stream to completion.
    ///
    /// Emits `TextDelta` events in frame order, then exactly one of
    /// `Completed`/`Failed`. An embedded schedule command is extracted and
    /// applied before `Completed` is delivered; transport errors and
    /// cancellation skip extraction. The assistant turn is appended to
    /// history only on success.
    pub async fn send_message_stream(
        &mut self,
        prompt: &str,
        events: &EventSender,
        cancel: &CancellationToken,
    ) {
        events.send_delta(AssistantEvent::Loading { active: true });

        match self.run_stream(prompt, events, cancel).await {
            Ok(Outcome::Completed(text)) => {
                self.history.append(Role::Assistant, text.clone());
                events.send_important(AssistantEvent::Loading { active: false }).await;
                events.send_important(AssistantEvent::Completed { text }).await;
            }
            Ok(Outcome::Canceled) => {
                events.send_important(AssistantEvent::Loading { active: false }).await;
                events
                    .send_important(AssistantEvent::Failed {
                        kind: ErrorKind::Canceled,
                        message: "stream canceled".to_string(),
                    })
                    .await;
            }
            Err(err) => {
                let kind = err
                    .downcast_ref::<ProviderError>()
                    .map_or(ErrorKind::Internal, |e| e.kind.into());
                events.send_important(AssistantEvent::Loading { active: false }).await;
                events
                    .send_important(AssistantEvent::Failed {
                        kind,
                        message: format!("{err:#}"),
                    })
                    .await;
            }
        }
    }

    async fn run_stream(
        &mut self,
        prompt: &str,
        events: &EventSender,
        cancel: &CancellationToken,
    ) -> Result<Outcome> {
        self.history.append(Role::User, prompt);

        let context = build_context(self.store.as_ref(), Local::now().naive_local());
        let full_prompt = prompts::build_prompt(&context, prompt);

        let request = CompletionRequest {
            input: CompletionInput {
                prompt: &full_prompt,
            },
            parameters: CompletionParameters {
                incremental_output: true,
            },
            debug: Empty {},
        };

        let url = format!(
            "{}/api/v1/apps/{}/completion",
            self.config.base_url, self.config.app_id
        );

        let response = self
            .http
            .post(&url)
            .timeout(self.config.request_timeout)
            .header("content-type", "application/json")
            .header("accept", "*/*")
            .header("authorization", format!("Bearer {}", self.config.api_key))
            .header(SSE_HEADER, "enable")
            .header("user-agent", USER_AGENT)
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::http_status(status.as_u16(), &body).into());
        }

        let received_any = Arc::new(AtomicBool::new(false));
        spawn_liveness_probe(self.config.liveness_warn, Arc::clone(&received_any));

        let mut byte_stream = response.bytes_stream();
        let mut decoder = FrameDecoder::new();
        let mut reducer = StreamReducer::new();

        loop {
            let chunk = tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(Outcome::Canceled),
                chunk = byte_stream.next() => chunk,
            };

            match chunk {
                Some(Ok(bytes)) => {
                    received_any.store(true, Ordering::Relaxed);
                    for frame in decoder.feed(&bytes) {
                        if forward_updates(&mut reducer, &frame, events) {
                            let text = reducer.into_text();
                            self.apply_embedded_command(&text);
                            return Ok(Outcome::Completed(text));
                        }
                    }
                }
                Some(Err(err)) => {
                    // Transport error: accumulated text never reaches the
                    // command-extraction path.
                    return Err(classify_reqwest_error(&err).into());
                }
                None => break,
            }
        }

        // Clean close without a finish frame: flush the buffered remainder,
        // then complete with whatever was accumulated. Extraction stays tied
        // to the explicit finish sentinel.
        for frame in decoder.finalize() {
            if forward_updates(&mut reducer, &frame, events) {
                let text = reducer.into_text();
                self.apply_embedded_command(&text);
                return Ok(Outcome::Completed(text));
            }
        }
        Ok(Outcome::Completed(reducer.into_text()))
    }

    fn apply_embedded_command(&self, text: &str) {
        if let Some(command) = extract_command(text) {
            apply_command(self.store.as_ref(), &command);
        }
    }
}

/// Forwards reducer updates for one frame; returns true on the finish
/// sentinel.
fn forward_updates(reducer: &mut StreamReducer, frame: &DecodedFrame, events: &EventSender) -> bool {
    let mut finished = false;
    for update in reducer.on_frame(frame) {
        match update {
            StreamUpdate::Delta(text) => events.send_delta(AssistantEvent::TextDelta { text }),
            StreamUpdate::Finished => finished = true,
        }
    }
    finished
}

/// Logs a single warning if the endpoint stays silent past the window.
///
/// Advisory telemetry only: the stream stays open until the transport's own
/// timeout fires.
fn spawn_liveness_probe(window: Duration, received_any: Arc<AtomicBool>) {
    tokio::spawn(async move {
        tokio::time::sleep(window).await;
        if !received_any.load(Ordering::Relaxed) {
            warn!(
                window_secs = window.as_secs(),
                "no bytes received from completion endpoint yet"
            );
        }
    });
}
