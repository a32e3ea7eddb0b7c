use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::future::poll_fn;
use std::pin::pin;
use std::sync::Arc;

use cinescout_model::{
    ErrorKind, ModelProvider, ModelProviderError, ModelRequest, ModelResponse,
    ModelResponseEvent, ModelResponseStatus, ToolCallRequest,
};
use futures_util::future::BoxFuture;
use tracing::Instrument;

/// Callback invoked with every event as it arrives.
pub(crate) type OnEvent = Box<dyn FnMut(&ModelResponseEvent) + Send + 'static>;

/// A provider failure with the provider's concrete type erased.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelError {
    /// The kind reported by the provider.
    pub kind: ErrorKind,
    /// The provider's error message.
    pub message: String,
}

impl ModelError {
    fn from_provider<E: ModelProviderError>(err: &E) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl StdError for ModelError {}

type SendRequestResult = Result<ModelClientResponse, ModelError>;
#[rustfmt::skip]
type HandlerFn = Arc<
    dyn Fn(ModelRequest, OnEvent) -> BoxFuture<'static, SendRequestResult>
        + Send + Sync
>;

/// A wrapper around a model provider that provides a type-erased
/// interface for the other modules.
#[derive(Clone)]
pub(crate) struct ModelClient {
    handler_fn: HandlerFn,
}

impl ModelClient {
    #[inline]
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        // We have to erase the type `P`, since `ModelClient` doesn't have a
        // generic parameter and we don't want it either.
        let handler_fn: HandlerFn = Arc::new(move |req, on_event| {
            trace!("sending a request: {req:?}");
            let fut = provider.send_request(&req);
            Box::pin(
                async move {
                    let resp_or_err = fut.await;
                    handle_response::<P>(resp_or_err, on_event).await
                }
                .instrument(trace_span!("model client req")),
            )
        });
        Self { handler_fn }
    }

    /// Sends a request and collects the whole response.
    ///
    /// `on_event` sees every event before it is folded into the returned
    /// response, so callers can relay progress while the model is still
    /// generating.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. The response stops streaming further
    /// events when this operation is cancelled.
    #[inline]
    pub async fn send_request(
        &self,
        req: ModelRequest,
        on_event: impl FnMut(&ModelResponseEvent) + Send + 'static,
    ) -> SendRequestResult {
        (self.handler_fn)(req, Box::new(on_event)).await
    }
}

/// A completely received response from the model client.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct ModelClientResponse {
    /// The concatenated message text.
    pub text: String,
    /// The concatenated reasoning summary.
    pub reasoning_summary: String,
    /// Tool calls requested by the model, in the order they were emitted.
    pub tool_calls: Vec<ToolCallRequest>,
    /// The status the model reported, `None` if it never reported one.
    pub status: Option<ModelResponseStatus>,
}

async fn handle_response<P: ModelProvider + 'static>(
    resp_or_err: Result<P::Response, P::Error>,
    mut on_event: OnEvent,
) -> SendRequestResult {
    let resp = match resp_or_err {
        Ok(resp) => resp,
        Err(err) => {
            error!("got an error: {err:?}");
            return Err(ModelError::from_provider(&err));
        }
    };

    let mut collected = ModelClientResponse::default();

    trace!("start receiving events");

    let mut pinned_resp = pin!(resp);
    loop {
        let event_or_err =
            poll_fn(|cx| pinned_resp.as_mut().poll_next_event(cx)).await;
        let event = match event_or_err {
            Ok(Some(event)) => event,
            Ok(None) => break,
            Err(err) => {
                error!("got an error: {err:?}");
                return Err(ModelError::from_provider(&err));
            }
        };
        trace!("got an event: {event:?}");
        on_event(&event);

        match event {
            ModelResponseEvent::ReasoningDelta(delta) => {
                collected.reasoning_summary.push_str(&delta);
            }
            ModelResponseEvent::MessageDelta(delta) => {
                collected.text.push_str(&delta);
            }
            ModelResponseEvent::ToolCall(req) => {
                collected.tool_calls.push(req);
            }
            ModelResponseEvent::Finished(status) => {
                collected.status = Some(status);
            }
        }
    }

    trace!("finished a request");

    Ok(collected)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use cinescout_model::ModelMessage;
    use cinescout_test_model::{
        PresetEvent, PresetResponse, TestModelProvider,
    };
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_send_request() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_response(PresetResponse::with_events([
            PresetEvent::Reasoning("Looking ".to_owned()),
            PresetEvent::Reasoning("around".to_owned()),
            PresetEvent::MessageDelta("Let me ".to_owned()),
            PresetEvent::MessageDelta("check.".to_owned()),
            PresetEvent::tool_call("call_1", "get_trending", json!({})),
        ]));

        let model_client = ModelClient::new(model_provider);
        let seen = Arc::new(Mutex::new(vec![]));
        let resp = model_client
            .send_request(
                ModelRequest::streaming(
                    vec![ModelMessage::User("Hi".to_owned())],
                    vec![],
                ),
                {
                    let seen = Arc::clone(&seen);
                    move |event| seen.lock().unwrap().push(event.clone())
                },
            )
            .await
            .unwrap();

        assert_eq!(resp.text, "Let me check.");
        assert_eq!(resp.reasoning_summary, "Looking around");
        assert_eq!(resp.tool_calls.len(), 1);
        assert_eq!(resp.tool_calls[0].name, "get_trending");
        assert_eq!(resp.status, Some(ModelResponseStatus::Completed));
        assert_eq!(seen.lock().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_error_handling() {
        let model_provider = TestModelProvider::default();
        let model_client = ModelClient::new(model_provider);
        let err = model_client
            .send_request(ModelRequest::streaming(vec![], vec![]), |_| {})
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Other);
    }
}
