use std::future::pending;
use std::time::Duration;

use cinescout::server;
use cinescout_catalog::InMemoryCatalog;
use cinescout_client::{
    ChatSession, ConversationState, HttpTransport, MessageStatus,
};
use cinescout_core::DriverBuilder;
use cinescout_test_model::{PresetEvent, PresetResponse, TestModelProvider};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::time::timeout;

async fn wait_idle(session: &ChatSession) -> ConversationState {
    let mut state_rx = session.subscribe();
    let state = timeout(
        Duration::from_secs(10),
        state_rx.wait_for(|state| !state.is_streaming),
    )
    .await
    .expect("timed out")
    .expect("session closed");
    state.clone()
}

#[tokio::test]
async fn test_chat_over_http() {
    let mut model_provider = TestModelProvider::default();
    model_provider.add_response(PresetResponse::with_events([
        PresetEvent::Reasoning("Something scary from space.".to_owned()),
        PresetEvent::tool_call(
            "call_1",
            "search_media",
            json!({ "query": "alien" }),
        ),
        PresetEvent::tool_call("call_2", "present_results", json!({})),
    ]));
    model_provider.add_response(PresetResponse::with_json(&json!({
        "message": "Alien is a must.",
        "items": [{
            "id": 348,
            "media_type": "movie",
            "title": "Alien",
            "overview": "",
            "release_date": "1979-05-25"
        }]
    })));
    let driver = DriverBuilder::with_model_provider(
        model_provider.clone(),
        InMemoryCatalog::sample(),
    )
    .build();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server::serve(listener, driver, pending()));

    let session =
        ChatSession::new(HttpTransport::new(&format!("http://{addr}/")));
    session.send_message("Sci-fi horror please").await.unwrap();
    let state = wait_idle(&session).await;

    let answer = &state.messages[1];
    assert_eq!(answer.status, MessageStatus::Complete);
    assert_eq!(answer.content, "Alien is a must.");
    let results = answer.results.as_ref().unwrap();
    assert_eq!(results[0].id, 348);
    assert_eq!(results[0].release_year(), Some(1979));
    assert_eq!(state.error, None);
    assert_eq!(model_provider.request_count(), 2);
}

#[tokio::test]
async fn test_unreachable_server() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let transport = HttpTransport::new(&format!("http://{addr}"));
    let session = ChatSession::new(transport);
    session.send_message("Hi").await.unwrap();
    let state = wait_idle(&session).await;
    assert_eq!(state.messages[1].status, MessageStatus::Error);
    assert!(state.error.is_some());
}
