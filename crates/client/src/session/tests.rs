use std::time::Duration;

use async_trait::async_trait;
use cinescout_catalog::{InMemoryCatalog, MediaListItem};
use cinescout_core::event::Emitter;
use cinescout_core::{DriverBuilder, EventStream as CoreEventStream};
use cinescout_test_model::{PresetEvent, PresetResponse, TestModelProvider};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

use super::*;
use crate::LocalTransport;
use crate::transport::EventStream;

/// Hands every opened stream to the test, which plays the server.
struct ScriptedTransport {
    opened: mpsc::UnboundedSender<(ChatRequest, Emitter)>,
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn open(
        &self,
        request: ChatRequest,
    ) -> Result<EventStream, TransportError> {
        let (emitter, rx) = Emitter::channel();
        self.opened.send((request, emitter)).unwrap();
        Ok(CoreEventStream::from_receiver(rx).map(Ok).boxed())
    }
}

struct FailingTransport;

#[async_trait]
impl ChatTransport for FailingTransport {
    async fn open(
        &self,
        _request: ChatRequest,
    ) -> Result<EventStream, TransportError> {
        Err(TransportError::Status(500))
    }
}

fn scripted_session()
-> (ChatSession, mpsc::UnboundedReceiver<(ChatRequest, Emitter)>) {
    let (opened, opened_rx) = mpsc::unbounded_channel();
    (ChatSession::new(ScriptedTransport { opened }), opened_rx)
}

async fn wait_for(
    session: &ChatSession,
    f: impl FnMut(&ConversationState) -> bool,
) -> ConversationState {
    let mut state_rx = session.subscribe();
    let state = timeout(Duration::from_secs(30), state_rx.wait_for(f))
        .await
        .expect("timed out")
        .expect("session closed");
    state.clone()
}

async fn wait_idle(session: &ChatSession) -> ConversationState {
    wait_for(session, |state| !state.is_streaming).await
}

fn item(id: u64, title: &str) -> MediaListItem {
    serde_json::from_value(json!({
        "id": id,
        "media_type": "movie",
        "title": title,
        "overview": ""
    }))
    .unwrap()
}

fn delta(text: &str) -> StreamingEvent {
    StreamingEvent::TextDelta {
        delta: text.to_owned(),
    }
}

fn thinking(text: &str) -> StreamingEvent {
    StreamingEvent::Thinking {
        summary: text.to_owned(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_streaming_answer() {
    let (session, mut opened) = scripted_session();
    session.send_message("  Find action movies ").await.unwrap();

    let messages = session.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, ChatRole::User);
    assert_eq!(messages[0].content, "Find action movies");
    assert_eq!(messages[0].status, MessageStatus::Complete);
    assert_eq!(messages[1].role, ChatRole::Assistant);
    assert_eq!(messages[1].status, MessageStatus::Streaming);
    assert!(session.is_streaming());

    let (request, emitter) = opened.recv().await.unwrap();
    assert_eq!(request.messages.len(), 1);
    assert_eq!(request.messages[0].content, "Find action movies");
    assert_eq!(request.locale, Locale::En);

    emitter.emit(thinking("Looking for action"));
    emitter.emit(delta("Here "));
    emitter.emit(delta("you go"));
    let state = wait_for(&session, |state| {
        state.messages[1].thinking.as_deref() == Some("Looking for action")
    })
    .await;
    assert_eq!(state.messages[1].content, "");

    // The buffer is shown once the deltas stop for a while.
    sleep(DEBOUNCE_INTERVAL / 2).await;
    assert_eq!(session.messages()[1].content, "");
    sleep(DEBOUNCE_INTERVAL).await;
    assert_eq!(session.messages()[1].content, "Here you go");

    emitter.emit(StreamingEvent::Results {
        items: vec![item(155, "The Dark Knight")],
    });
    emitter.emit(StreamingEvent::Done);
    let state = wait_idle(&session).await;
    let answer = &state.messages[1];
    assert_eq!(answer.status, MessageStatus::Complete);
    assert_eq!(answer.content, "Here you go");
    assert_eq!(answer.thinking, None);
    assert_eq!(answer.results.as_ref().unwrap()[0].title, "The Dark Knight");
    assert_eq!(state.error, None);
}

#[tokio::test(start_paused = true)]
async fn test_terminal_event_flushes_buffer() {
    let (session, mut opened) = scripted_session();
    session.send_message("Hi").await.unwrap();
    let (_, emitter) = opened.recv().await.unwrap();

    let start = tokio::time::Instant::now();
    emitter.emit(delta("Hel"));
    emitter.emit(delta("lo!"));
    emitter.emit(StreamingEvent::Results { items: vec![] });
    emitter.emit(StreamingEvent::Done);

    let state = wait_idle(&session).await;
    assert!(start.elapsed() < DEBOUNCE_INTERVAL);
    assert_eq!(state.messages[1].content, "Hello!");
    assert_eq!(state.messages[1].results, Some(vec![]));
    assert_eq!(state.messages[1].status, MessageStatus::Complete);
}

#[tokio::test(start_paused = true)]
async fn test_stall_indicator() {
    let (session, mut opened) = scripted_session();
    session.send_message("Hi").await.unwrap();
    let (_, emitter) = opened.recv().await.unwrap();

    sleep(STALL_TIMEOUT + Duration::from_millis(1)).await;
    assert_eq!(
        session.messages()[1].thinking.as_deref(),
        Some(STALL_THINKING)
    );

    emitter.emit(thinking("Comparing genres"));
    wait_for(&session, |state| {
        state.messages[1].thinking.as_deref() == Some("Comparing genres")
    })
    .await;
    emitter.emit(StreamingEvent::Done);
    let state = wait_idle(&session).await;
    assert_eq!(state.messages[1].thinking, None);
}

#[tokio::test(start_paused = true)]
async fn test_progress_cancels_stall_timer() {
    let (session, mut opened) = scripted_session();
    session.send_message("Hi").await.unwrap();
    let (_, emitter) = opened.recv().await.unwrap();

    emitter.emit(delta("Hi"));
    sleep(STALL_TIMEOUT * 2).await;
    let messages = session.messages();
    assert_eq!(messages[1].thinking, None);
    assert_eq!(messages[1].content, "Hi");
    assert!(session.is_streaming());
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_error() {
    let (session, mut opened) = scripted_session();
    session.send_message("Hi").await.unwrap();
    let (_, emitter) = opened.recv().await.unwrap();

    emitter.emit(delta("Par"));
    emitter.emit(StreamingEvent::Error {
        message: "model request failed: 429".to_owned(),
        code: Some(code::RATE_LIMIT.to_owned()),
    });
    let state = wait_idle(&session).await;
    let answer = &state.messages[1];
    assert_eq!(answer.status, MessageStatus::Error);
    assert_eq!(answer.content, "Par");
    assert_eq!(answer.error.as_deref(), Some(RATE_LIMIT_MESSAGE));
    assert_eq!(state.error.as_deref(), Some(RATE_LIMIT_MESSAGE));
}

#[tokio::test(start_paused = true)]
async fn test_unterminated_stream() {
    let (session, mut opened) = scripted_session();
    session.send_message("Hi").await.unwrap();
    let (_, emitter) = opened.recv().await.unwrap();

    emitter.emit(delta("Partial"));
    drop(emitter);
    let state = wait_idle(&session).await;
    let answer = &state.messages[1];
    assert_eq!(answer.status, MessageStatus::Error);
    assert_eq!(answer.content, "Partial");
    assert_eq!(answer.error.as_deref(), Some(UNTERMINATED_MESSAGE));
}

#[tokio::test(start_paused = true)]
async fn test_transport_failure() {
    let session = ChatSession::new(FailingTransport);
    session.send_message("Hi").await.unwrap();
    let state = wait_idle(&session).await;
    assert_eq!(state.messages[1].status, MessageStatus::Error);
    assert_eq!(state.error.as_deref(), Some("server returned status 500"));
}

#[tokio::test(start_paused = true)]
async fn test_new_send_cancels_previous() {
    let (session, mut opened) = scripted_session();
    session.send_message("First").await.unwrap();
    let (_, first) = opened.recv().await.unwrap();

    first.emit(delta("Part"));
    first.emit(thinking("Hmm"));
    wait_for(&session, |state| state.messages[1].thinking.is_some()).await;

    session.send_message("Second").await.unwrap();
    let messages = session.messages();
    assert_eq!(messages.len(), 4);
    let stale = &messages[1];
    assert_eq!(stale.status, MessageStatus::Complete);
    assert_eq!(stale.content, "Part");
    assert_eq!(stale.thinking, None);
    assert_eq!(stale.error, None);
    assert_eq!(messages[3].status, MessageStatus::Streaming);

    // The aborted request can't touch the conversation anymore.
    first.emit(delta("late"));
    first.emit(StreamingEvent::Error {
        message: "too late".to_owned(),
        code: None,
    });

    let (request, second) = opened.recv().await.unwrap();
    let replayed = request
        .messages
        .iter()
        .map(|msg| msg.content.as_str())
        .collect::<Vec<_>>();
    assert_eq!(replayed, ["First", "Part", "Second"]);

    second.emit(delta("Done"));
    second.emit(StreamingEvent::Done);
    let state = wait_idle(&session).await;
    assert_eq!(state.messages[1].content, "Part");
    assert_eq!(state.messages[1].status, MessageStatus::Complete);
    assert_eq!(state.messages[3].content, "Done");
    assert_eq!(state.error, None);
}

#[tokio::test(start_paused = true)]
async fn test_clear_conversation() {
    let (session, mut opened) = scripted_session();
    session.send_message("Hi").await.unwrap();
    let (_, emitter) = opened.recv().await.unwrap();

    session.clear_conversation().await.unwrap();
    assert!(session.messages().is_empty());
    assert!(!session.is_streaming());

    emitter.emit(delta("late"));
    emitter.emit(StreamingEvent::Done);
    sleep(DEBOUNCE_INTERVAL * 2).await;
    assert!(session.messages().is_empty());
    assert_eq!(session.error(), None);
}

#[tokio::test(start_paused = true)]
async fn test_input_validation() {
    let (session, mut opened) = scripted_session();

    assert_eq!(
        session.send_message("   ").await,
        Err(ClientError::EmptyMessage)
    );
    assert_eq!(session.error().as_deref(), Some("message is empty"));

    let long = "a".repeat(MAX_INPUT_CHARS + 1);
    assert_eq!(
        session.send_message(&long).await,
        Err(ClientError::MessageTooLong {
            len: MAX_INPUT_CHARS + 1,
            max: MAX_INPUT_CHARS,
        })
    );
    // Counted in characters, not bytes.
    let wide = "好".repeat(MAX_INPUT_CHARS);
    session.send_message(&wide).await.unwrap();

    assert!(session.error().is_none());
    let (request, _) = opened.recv().await.unwrap();
    assert_eq!(request.messages[0].content, wide);
    assert!(opened.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_conversation_limit() {
    let (session, mut opened) = scripted_session();
    for i in 0..MAX_MESSAGES / 2 {
        session.send_message(&format!("Question {i}")).await.unwrap();
        let (request, emitter) = opened.recv().await.unwrap();
        assert_eq!(request.messages.len(), 2 * i + 1);
        emitter.emit(delta("Answer"));
        emitter.emit(StreamingEvent::Done);
        wait_idle(&session).await;
    }

    assert_eq!(
        session.send_message("One more").await,
        Err(ClientError::ConversationLimit {
            count: MAX_MESSAGES + 1,
            max: MAX_MESSAGES,
        })
    );
    assert_eq!(session.error().as_deref(), Some(CONVERSATION_LIMIT_MESSAGE));
    assert_eq!(session.messages().len(), MAX_MESSAGES);
    assert!(!session.is_streaming());
    assert!(opened.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_conversation_limit_counts_failed_answers() {
    let session = ChatSession::new(FailingTransport);
    for i in 0..MAX_MESSAGES / 2 {
        session.send_message(&format!("Question {i}")).await.unwrap();
        let state = wait_idle(&session).await;
        assert_eq!(state.messages.len(), 2 * i + 2);
        assert_eq!(state.messages[2 * i + 1].status, MessageStatus::Error);
    }

    assert_eq!(
        session.send_message("One more").await,
        Err(ClientError::ConversationLimit {
            count: MAX_MESSAGES + 1,
            max: MAX_MESSAGES,
        })
    );
    assert_eq!(session.error().as_deref(), Some(CONVERSATION_LIMIT_MESSAGE));
    assert_eq!(session.messages().len(), MAX_MESSAGES);
}

#[tokio::test(start_paused = true)]
async fn test_retry_last_message() {
    let (session, mut opened) = scripted_session();
    assert_eq!(
        session.retry_last_message().await,
        Err(ClientError::NothingToRetry)
    );

    session.send_message("Hi").await.unwrap();
    let (_, emitter) = opened.recv().await.unwrap();
    emitter.emit(StreamingEvent::Error {
        message: "model response failed".to_owned(),
        code: None,
    });
    let failed = wait_idle(&session).await;
    assert_eq!(failed.messages[1].status, MessageStatus::Error);
    assert_eq!(failed.error.as_deref(), Some("model response failed"));

    session.retry_last_message().await.unwrap();
    let messages = session.messages();
    assert_eq!(messages.len(), 2);
    assert_ne!(messages[0].id, failed.messages[0].id);
    assert_eq!(messages[0].content, "Hi");
    assert_eq!(messages[1].status, MessageStatus::Streaming);
    assert_eq!(session.error(), None);

    let (request, emitter) = opened.recv().await.unwrap();
    assert_eq!(request.messages.len(), 1);
    emitter.emit(delta("Hello"));
    emitter.emit(StreamingEvent::Done);
    let state = wait_idle(&session).await;
    assert_eq!(state.messages[1].content, "Hello");
    assert_eq!(state.messages[1].status, MessageStatus::Complete);
}

#[tokio::test]
async fn test_local_transport() {
    let mut model_provider = TestModelProvider::default();
    model_provider.add_response(PresetResponse::with_events([
        PresetEvent::Reasoning("Action it is.".to_owned()),
        PresetEvent::tool_call(
            "call_1",
            "discover_movies",
            json!({ "genres": [28] }),
        ),
    ]));
    model_provider.add_response(PresetResponse::with_events([
        PresetEvent::tool_call("call_2", "present_results", json!({})),
    ]));
    model_provider.add_response(PresetResponse::with_json(&json!({
        "message": "Here are some action movies.",
        "items": [{
            "id": 155,
            "media_type": "movie",
            "title": "The Dark Knight",
            "overview": ""
        }]
    })));
    let driver = DriverBuilder::with_model_provider(
        model_provider,
        InMemoryCatalog::sample(),
    )
    .build();

    let session = ChatSession::new(LocalTransport::new(driver));
    session.send_message("Find action movies").await.unwrap();
    let state = wait_idle(&session).await;
    let answer = &state.messages[1];
    assert_eq!(answer.status, MessageStatus::Complete);
    assert_eq!(answer.content, "Here are some action movies.");
    assert_eq!(answer.thinking, None);
    assert_eq!(answer.results.as_ref().unwrap().len(), 1);
    assert_eq!(state.error, None);
}
