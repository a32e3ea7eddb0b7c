use std::collections::VecDeque;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::task::{self, Poll, ready};
use std::time::Duration;

use cinescout_model::{
    ErrorKind, ModelMessage, ModelProvider, ModelProviderError, ModelRequest,
    ModelResponse, ModelResponseEvent, ModelResponseStatus, OutputSchema,
};
use serde_json::json;
use tokio::time::{Sleep, sleep};

#[derive(Debug)]
struct FakeModelProviderError(ErrorKind);

impl Display for FakeModelProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Error for FakeModelProviderError {}

impl ModelProviderError for FakeModelProviderError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

/// Thinks out loud about the input, then echoes it word by word.
#[derive(Debug)]
struct FakeModelResponse {
    fake_events: VecDeque<ModelResponseEvent>,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl FakeModelResponse {
    fn new(input: &str, structured: bool) -> Self {
        let mut fake_events = VecDeque::new();
        fake_events.push_back(ModelResponseEvent::ReasoningDelta(
            "Reading the request".to_owned(),
        ));
        if structured {
            fake_events.push_back(ModelResponseEvent::MessageDelta(
                json!({ "echo": input }).to_string(),
            ));
        } else {
            let words = format!("You said {input}");
            let mut words = words.split(' ').peekable();
            while let Some(word) = words.next() {
                let mut word = word.to_owned();
                if words.peek().is_some() {
                    word.push(' ');
                }
                fake_events.push_back(ModelResponseEvent::MessageDelta(word));
            }
        }
        fake_events.push_back(ModelResponseEvent::Finished(
            ModelResponseStatus::Completed,
        ));
        Self {
            fake_events,
            sleep: None,
        }
    }
}

impl ModelResponse for FakeModelResponse {
    type Error = FakeModelProviderError;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        // SAFETY: This type does not require to be pinned.
        let this = unsafe { self.get_unchecked_mut() };
        if let Some(sleep) = &mut this.sleep {
            let sleep = sleep.as_mut();
            ready!(sleep.poll(cx));
            this.sleep = None;
            return Poll::Ready(Ok(this.fake_events.pop_front()));
        }
        this.sleep = Some(Box::pin(sleep(Duration::from_millis(1))));
        Pin::new(this).poll_next_event(cx)
    }
}

struct FakeModelProvider;

impl ModelProvider for FakeModelProvider {
    type Error = FakeModelProviderError;
    type Response = FakeModelResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let result = 'blk: {
            let Some(last) = req.messages.last() else {
                break 'blk Err(FakeModelProviderError(
                    ErrorKind::InvalidRequest,
                ));
            };
            let content = match last {
                ModelMessage::User(text) => text.as_str(),
                _ => unreachable!("unexpected message: {last:?}"),
            };
            Ok(FakeModelResponse::new(content, req.output_schema.is_some()))
        };
        ready(result)
    }
}

mod tests {
    use std::future::poll_fn;

    use super::*;

    async fn collect(
        mut resp: FakeModelResponse,
    ) -> (String, String, Option<ModelResponseStatus>) {
        let mut message = String::new();
        let mut reasoning = String::new();
        let mut status = None;
        loop {
            let resp_fut =
                poll_fn(|cx| Pin::new(&mut resp).poll_next_event(cx));
            match resp_fut.await {
                Ok(Some(event)) => match event {
                    ModelResponseEvent::ReasoningDelta(delta) => {
                        reasoning.push_str(&delta);
                    }
                    ModelResponseEvent::MessageDelta(delta) => {
                        message.push_str(&delta);
                    }
                    ModelResponseEvent::Finished(s) => status = Some(s),
                    _ => unreachable!("unexpected event: {event:?}"),
                },
                Ok(None) => break,
                Err(err) => unreachable!("unexpected error: {err:?}"),
            }
        }
        (message, reasoning, status)
    }

    #[tokio::test]
    async fn test_streaming_completion() {
        let provider = FakeModelProvider;
        let req = ModelRequest::streaming(
            vec![ModelMessage::User("Good morning".to_string())],
            vec![],
        );
        assert!(req.stream);
        let resp = provider.send_request(&req).await.unwrap();
        let (message, reasoning, status) = collect(resp).await;

        assert_eq!(message, "You said Good morning");
        assert_eq!(reasoning, "Reading the request");
        assert_eq!(status, Some(ModelResponseStatus::Completed));
        assert!(status.unwrap().is_completed());
    }

    #[tokio::test]
    async fn test_structured_completion() {
        let provider = FakeModelProvider;
        let req = ModelRequest::structured(
            vec![ModelMessage::User("hello".to_string())],
            OutputSchema {
                name: "echo".to_owned(),
                schema: json!({ "type": "object" }),
            },
        );
        assert!(!req.stream);
        assert!(req.tools.is_empty());
        let resp = provider.send_request(&req).await.unwrap();
        let (message, _, _) = collect(resp).await;
        let value: serde_json::Value = serde_json::from_str(&message).unwrap();
        assert_eq!(value["echo"], "hello");
    }

    #[tokio::test]
    async fn test_error() {
        let provider = FakeModelProvider;
        let req = ModelRequest::streaming(vec![], vec![]);
        let result = provider.send_request(&req).await;
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ModelResponseStatus::Failed.to_string(), "failed");
        assert!(!ModelResponseStatus::Incomplete.is_completed());
    }
}
