use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use cinescout_model::{
    ErrorKind, ModelResponse, ModelResponseEvent, ModelResponseStatus,
    ToolCallRequest,
};
use futures_util::future::BoxFuture;
use pin_project_lite::pin_project;

use crate::Error;
use crate::io::Sse;
use crate::proto::{
    OutputContent, OutputItem, ResponseError, ResponseObject, StreamEvent,
};

struct StreamState {
    sse: Sse,
    // Set once a terminal event has been delivered. Anything after it on
    // the wire is ignored.
    finished: bool,
}

type NextEvent = Result<(Option<ModelResponseEvent>, StreamState), Error>;

pin_project! {
    /// A response from the Responses API.
    ///
    /// Streaming responses decode events lazily from the server-sent event
    /// stream; buffered responses have all events prepared up front.
    pub struct OpenAIResponse {
        next_event_fut: Option<BoxFuture<'static, NextEvent>>,
        buffered: VecDeque<ModelResponseEvent>,
    }
}

impl OpenAIResponse {
    #[inline]
    pub fn from_sse(sse: Sse) -> Self {
        let state = StreamState {
            sse,
            finished: false,
        };
        Self {
            next_event_fut: Some(Box::pin(next_event(state))),
            buffered: VecDeque::new(),
        }
    }

    /// Creates a response from a complete (non-streaming) response object.
    pub fn from_object(object: ResponseObject) -> Result<Self, Error> {
        let status = object.status();
        if let ModelResponseStatus::Failed = status {
            if let Some(err) = &object.error {
                return Err(error_from_response(err));
            }
        }

        let mut buffered = VecDeque::new();
        for item in object.output {
            match item {
                OutputItem::Reasoning { summary } => {
                    buffered.extend(summary.into_iter().map(|part| {
                        ModelResponseEvent::ReasoningDelta(part.text)
                    }));
                }
                OutputItem::Message { content } => {
                    for part in content {
                        match part {
                            OutputContent::OutputText { text } => buffered
                                .push_back(ModelResponseEvent::MessageDelta(
                                    text,
                                )),
                            OutputContent::Refusal { refusal } => {
                                return Err(Error::new(
                                    refusal,
                                    ErrorKind::Moderated,
                                ));
                            }
                            OutputContent::Other => {}
                        }
                    }
                }
                OutputItem::FunctionCall {
                    call_id,
                    name,
                    arguments,
                } => buffered.push_back(ModelResponseEvent::ToolCall(
                    ToolCallRequest {
                        id: call_id,
                        name,
                        arguments,
                    },
                )),
                OutputItem::Other => {}
            }
        }
        buffered.push_back(ModelResponseEvent::Finished(status));

        Ok(Self {
            next_event_fut: None,
            buffered,
        })
    }
}

impl ModelResponse for OpenAIResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.project();
        if let Some(event) = this.buffered.pop_front() {
            return Poll::Ready(Ok(Some(event)));
        }
        let Some(next_event_fut) = this.next_event_fut else {
            return Poll::Ready(Ok(None));
        };
        let (event, state) = match ready!(next_event_fut.as_mut().poll(cx)) {
            Ok((Some(event), state)) => (event, state),
            Ok((None, _)) => {
                *this.next_event_fut = None;
                return Poll::Ready(Ok(None));
            }
            Err(err) => {
                *this.next_event_fut = None;
                return Poll::Ready(Err(err));
            }
        };

        *this.next_event_fut = Some(Box::pin(next_event(state)));
        Poll::Ready(Ok(Some(event)))
    }
}

async fn next_event(mut state: StreamState) -> NextEvent {
    if state.finished {
        return Ok((None, state));
    }

    loop {
        let data = match state.sse.next_event().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                return Err(Error::new(
                    "stream ended before the response finished",
                    ErrorKind::Transport,
                ));
            }
            Err(err) => {
                let reason = format!("{err:?}");
                return Err(Error::new(reason, ErrorKind::Transport));
            }
        };
        trace!("got sse event: {data}");

        let event = serde_json::from_str::<StreamEvent>(&data)
            .map_err(|err| Error::new(format!("{err}"), ErrorKind::Transport))?;
        let event = match event {
            StreamEvent::ReasoningSummaryDelta { delta } => {
                ModelResponseEvent::ReasoningDelta(delta)
            }
            StreamEvent::OutputTextDelta { delta } => {
                ModelResponseEvent::MessageDelta(delta)
            }
            StreamEvent::OutputItemDone {
                item:
                    OutputItem::FunctionCall {
                        call_id,
                        name,
                        arguments,
                    },
            } => ModelResponseEvent::ToolCall(ToolCallRequest {
                id: call_id,
                name,
                arguments,
            }),
            // Text and reasoning already arrived as deltas.
            StreamEvent::OutputItemDone { .. } | StreamEvent::Ignored => {
                continue;
            }
            StreamEvent::Completed { response }
            | StreamEvent::Incomplete { response } => {
                state.finished = true;
                ModelResponseEvent::Finished(response.status())
            }
            StreamEvent::Failed { response } => {
                if let Some(err) = &response.error {
                    return Err(error_from_response(err));
                }
                state.finished = true;
                ModelResponseEvent::Finished(ModelResponseStatus::Failed)
            }
            StreamEvent::Error { code, message } => {
                return Err(Error::new(
                    message,
                    error_kind_from_code(code.as_deref()),
                ));
            }
        };
        return Ok((Some(event), state));
    }
}

fn error_from_response(err: &ResponseError) -> Error {
    Error::new(err.message.clone(), error_kind_from_code(err.code.as_deref()))
}

fn error_kind_from_code(code: Option<&str>) -> ErrorKind {
    match code {
        Some(code) if code.contains("rate_limit") => {
            ErrorKind::RateLimitExceeded
        }
        Some("content_filter") => ErrorKind::Moderated,
        Some("invalid_prompt") => ErrorKind::InvalidRequest,
        _ => ErrorKind::Other,
    }
}
