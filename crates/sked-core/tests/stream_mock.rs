//! End-to-end streaming tests against a mock SSE endpoint.

use std::sync::Arc;
use std::time::Duration;

use sked_core::events::{AssistantEvent, ErrorKind, EventSender, create_event_channel};
use sked_core::provider::dashscope::{AssistantClient, DashScopeConfig};
use sked_core::schedule::{MemoryScheduleStore, Schedule, ScheduleStore};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const COMPLETION_PATH: &str = "/api/v1/apps/app-test/completion";

fn sse_response(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body.to_string())
}

fn test_config(base_url: &str) -> DashScopeConfig {
    DashScopeConfig {
        api_key: "test-api-key".to_string(),
        base_url: base_url.to_string(),
        app_id: "app-test".to_string(),
        request_timeout: Duration::from_secs(5),
        liveness_warn: Duration::from_secs(5),
    }
}

/// Drives one request to completion and returns every emitted event.
async fn collect_events(
    client: &mut AssistantClient<MemoryScheduleStore>,
    prompt: &str,
    cancel: &CancellationToken,
) -> Vec<AssistantEvent> {
    let (tx, mut rx) = create_event_channel();
    let events = EventSender::new(tx);

    let send = async {
        client.send_message_stream(prompt, &events, cancel).await;
        drop(events);
    };
    let collect = async {
        let mut out = Vec::new();
        while let Some(event) = rx.recv().await {
            out.push(event);
        }
        out
    };

    let ((), collected) = tokio::join!(send, collect);
    collected
}

fn terminal_events(events: &[AssistantEvent]) -> Vec<&AssistantEvent> {
    events
        .iter()
        .filter(|e| matches!(e, AssistantEvent::Completed { .. } | AssistantEvent::Failed { .. }))
        .collect()
}

#[tokio::test]
async fn streams_deltas_in_order_then_completes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETION_PATH))
        .respond_with(sse_response(
            "data: {\"output\":{\"text\":\"Hi\"}}\n\n\
             data: {\"output\":{\"text\":\" there\"}}\n\n\
             data: {\"output\":{\"finish_reason\":\"stop\"}}\n\n",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryScheduleStore::new());
    let mut client = AssistantClient::new(test_config(&server.uri()), Arc::clone(&store));
    let events = collect_events(&mut client, "say hi", &CancellationToken::new()).await;

    assert_eq!(
        events,
        vec![
            AssistantEvent::Loading { active: true },
            AssistantEvent::TextDelta {
                text: "Hi".to_string(),
            },
            AssistantEvent::TextDelta {
                text: " there".to_string(),
            },
            AssistantEvent::Loading { active: false },
            AssistantEvent::Completed {
                text: "Hi there".to_string(),
            },
        ]
    );

    // No braces in the reply: no command was applied.
    assert!(store.all().is_empty());

    // Both turns made it into the history.
    assert_eq!(client.history().len(), 2);
}

#[tokio::test]
async fn request_carries_the_wire_shape_and_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETION_PATH))
        .and(header("x-dashscope-sse", "enable"))
        .and(header("authorization", "Bearer test-api-key"))
        .and(header("content-type", "application/json"))
        .and(body_string_contains("\"incremental_output\":true"))
        .and(body_string_contains("User request: add gym tomorrow"))
        .respond_with(sse_response(
            "data: {\"output\":{\"text\":\"ok\",\"finish_reason\":\"stop\"}}\n\n",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryScheduleStore::new());
    let mut client = AssistantClient::new(test_config(&server.uri()), store);
    let events = collect_events(&mut client, "add gym tomorrow", &CancellationToken::new()).await;

    assert_eq!(terminal_events(&events).len(), 1);
}

#[tokio::test]
async fn embedded_delete_command_is_applied_exactly_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETION_PATH))
        .respond_with(sse_response(
            "data: {\"output\":{\"text\":\"Sure! \"}}\n\n\
             data: {\"output\":{\"text\":\"{\\\"operation\\\":\\\"delete\\\",\\\"schedule\\\":{\\\"title\\\":\\\"Gym\\\",\\\"startTime\\\":\\\"2024-04-02T08:00:00\\\",\\\"endTime\\\":\\\"2024-04-02T09:00:00\\\"}}\"}}\n\n\
             data: {\"output\":{\"finish_reason\":\"stop\"}}\n\n",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryScheduleStore::new());
    let gym = Schedule::new(
        "Gym",
        chrono::NaiveDateTime::parse_from_str("2024-04-02T08:00:00", "%Y-%m-%dT%H:%M:%S").unwrap(),
        chrono::NaiveDateTime::parse_from_str("2024-04-02T09:00:00", "%Y-%m-%dT%H:%M:%S").unwrap(),
    );
    store.save(gym).unwrap();

    let mut client = AssistantClient::new(test_config(&server.uri()), Arc::clone(&store));
    let events = collect_events(&mut client, "cancel my gym session", &CancellationToken::new()).await;

    // The mutation was applied before the terminal event.
    assert!(store.all().is_empty());

    // The terminal event still carries the full original text, prose + JSON.
    let [terminal] = terminal_events(&events)[..] else {
        panic!("expected exactly one terminal event");
    };
    let AssistantEvent::Completed { text } = terminal else {
        panic!("expected Completed, got {terminal:?}");
    };
    assert!(text.starts_with("Sure! "));
    assert!(text.contains("\"operation\":\"delete\""));
}

#[tokio::test]
async fn zero_byte_close_completes_once_with_empty_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETION_PATH))
        .respond_with(sse_response(""))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryScheduleStore::new());
    let mut client = AssistantClient::new(test_config(&server.uri()), store);
    let events = collect_events(&mut client, "hello?", &CancellationToken::new()).await;

    assert_eq!(
        terminal_events(&events),
        vec![&AssistantEvent::Completed {
            text: String::new(),
        }]
    );
}

#[tokio::test]
async fn unterminated_final_frame_is_flushed_on_close() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETION_PATH))
        .respond_with(sse_response("data: {\"output\":{\"text\":\"tail\"}}"))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryScheduleStore::new());
    let mut client = AssistantClient::new(test_config(&server.uri()), store);
    let events = collect_events(&mut client, "hi", &CancellationToken::new()).await;

    assert_eq!(
        terminal_events(&events),
        vec![&AssistantEvent::Completed {
            text: "tail".to_string(),
        }]
    );
}

#[tokio::test]
async fn http_error_fails_once_and_skips_history() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETION_PATH))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_string(r#"{"code":"InternalError","message":"something broke"}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryScheduleStore::new());
    let mut client = AssistantClient::new(test_config(&server.uri()), store);
    let events = collect_events(&mut client, "hello", &CancellationToken::new()).await;

    let [terminal] = terminal_events(&events)[..] else {
        panic!("expected exactly one terminal event");
    };
    let AssistantEvent::Failed { kind, message } = terminal else {
        panic!("expected Failed, got {terminal:?}");
    };
    assert_eq!(*kind, ErrorKind::HttpStatus);
    assert!(message.contains("HTTP 500"));

    assert!(!events.iter().any(|e| matches!(e, AssistantEvent::TextDelta { .. })));

    // Only the user turn was recorded.
    assert_eq!(client.history().len(), 1);
}

#[tokio::test]
async fn cancellation_fails_once_with_canceled_kind() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETION_PATH))
        .respond_with(sse_response(
            "data: {\"output\":{\"text\":\"never rendered\"}}\n\n",
        ))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryScheduleStore::new());
    let mut client = AssistantClient::new(test_config(&server.uri()), Arc::clone(&store));

    let cancel = CancellationToken::new();
    cancel.cancel();
    let events = collect_events(&mut client, "hello", &cancel).await;

    assert_eq!(
        terminal_events(&events),
        vec![&AssistantEvent::Failed {
            kind: ErrorKind::Canceled,
            message: "stream canceled".to_string(),
        }]
    );
    assert!(!events.iter().any(|e| matches!(e, AssistantEvent::TextDelta { .. })));
    assert!(store.all().is_empty());
}
