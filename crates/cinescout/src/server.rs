//! The HTTP server exposing a [`Driver`].
//!
//! - `POST /api/chat` streams the answer as server-sent events.
//! - `POST /api/chat/complete` answers with a single JSON document.
//! - `GET /health` answers `ok`.

use std::convert::Infallible;
use std::io;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use cinescout_core::event::code;
use cinescout_core::{
    ChatRequest, Driver, DriverError, FinalAnswer, StreamingEvent,
};
use futures_util::{Stream, StreamExt};
use serde::Serialize;
use tokio::net::TcpListener;

/// Creates the router serving `driver`.
pub fn router(driver: Driver) -> Router {
    Router::new()
        .route("/api/chat", post(chat_stream))
        .route("/api/chat/complete", post(chat_complete))
        .route("/health", get(health))
        .with_state(driver)
}

/// Serves `driver` on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    driver: Driver,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> io::Result<()> {
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, router(driver))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn health() -> &'static str {
    "ok"
}

async fn chat_stream(
    State(driver): State<Driver>,
    Json(request): Json<ChatRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("streaming an answer to {} messages", request.messages.len());
    let events = driver
        .stream(request)
        .map(|event| Ok::<_, Infallible>(to_sse_event(&event)));
    Sse::new(events).keep_alive(KeepAlive::default())
}

fn to_sse_event(event: &StreamingEvent) -> Event {
    Event::default().json_data(event).unwrap_or_else(|err| {
        error!("failed to encode {event:?}: {err}");
        Event::default().data(r#"{"type":"error","message":"internal error"}"#)
    })
}

async fn chat_complete(
    State(driver): State<Driver>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<FinalAnswer>, ApiError> {
    debug!("answering {} messages", request.messages.len());
    let answer = driver.run(request).await?;
    Ok(Json(FinalAnswer {
        message: answer.message,
        items: answer.items,
    }))
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
}

struct ApiError(DriverError);

impl From<DriverError> for ApiError {
    #[inline]
    fn from(err: DriverError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.0.code();
        let status = match code {
            Some(code::MESSAGE_LIMIT) => StatusCode::BAD_REQUEST,
            Some(code::RATE_LIMIT) => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::BAD_GATEWAY,
        };
        error!("request failed with {status}: {}", self.0);
        let body = ErrorBody {
            error: self.0.to_string(),
            code,
        };
        (status, Json(body)).into_response()
    }
}
