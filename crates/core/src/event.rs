//! Events relayed to the client while a conversation turn is answered.

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use cinescout_catalog::MediaListItem;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Error codes carried by [`StreamingEvent::Error`].
pub mod code {
    /// The model provider is rate limiting requests.
    pub const RATE_LIMIT: &str = "rate_limit";
    /// The conversation has too many messages.
    pub const MESSAGE_LIMIT: &str = "message_limit";
}

/// The lifecycle stage of a tool call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    /// The model asked for the call.
    Started,
    /// The call's handler finished successfully.
    Completed,
}

/// An event on the wire.
///
/// A stream is a sequence of non-terminal events closed by exactly one
/// terminal event ([`StreamingEvent::Done`] or [`StreamingEvent::Error`]).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamingEvent {
    /// The model's reasoning summary so far.
    Thinking {
        /// The whole summary, not a delta.
        summary: String,
    },
    /// A tool call changed status.
    ToolCall {
        /// The tool's name.
        name: String,
        /// The new status.
        status: ToolCallStatus,
    },
    /// A piece of the answer text.
    TextDelta {
        /// Text to append.
        delta: String,
    },
    /// The recommended titles.
    Results {
        /// The titles, in presentation order.
        items: Vec<MediaListItem>,
    },
    /// The answer is complete.
    Done,
    /// The answer failed.
    Error {
        /// A human-readable description.
        message: String,
        /// One of the [`code`] constants for failures the client handles
        /// specially.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
}

impl StreamingEvent {
    /// Returns `true` for events that close the stream.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamingEvent::Done | StreamingEvent::Error { .. })
    }
}

/// The sending half of an event stream.
///
/// Clones share the terminal state: once any clone has emitted a terminal
/// event, every later emission is refused.
#[derive(Clone, Debug)]
pub struct Emitter {
    tx: mpsc::UnboundedSender<StreamingEvent>,
    terminated: Arc<AtomicBool>,
}

impl Emitter {
    /// Creates an emitter and the receiver its events go to.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StreamingEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let emitter = Self {
            tx,
            terminated: Arc::new(AtomicBool::new(false)),
        };
        (emitter, rx)
    }

    /// Emits an event.
    ///
    /// Returns `false` if the event was dropped, either because the stream
    /// was already terminated or because the receiver is gone.
    pub fn emit(&self, event: StreamingEvent) -> bool {
        if event.is_terminal() {
            if self.terminated.swap(true, Ordering::AcqRel) {
                debug!("dropping a second terminal event: {event:?}");
                return false;
            }
        } else if self.terminated.load(Ordering::Acquire) {
            debug!("dropping an event after termination: {event:?}");
            return false;
        }
        self.tx.send(event).is_ok()
    }

    /// Returns `true` once a terminal event has been emitted.
    #[inline]
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }
}

/// The events of one answer, as produced by a background task.
///
/// Dropping the stream aborts the task producing it.
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<StreamingEvent>,
    task: Option<JoinHandle<()>>,
}

impl EventStream {
    pub(crate) fn new(
        rx: mpsc::UnboundedReceiver<StreamingEvent>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            rx,
            task: Some(task),
        }
    }

    /// Creates a stream over events pushed by an [`Emitter`] that isn't
    /// tied to a task.
    pub fn from_receiver(rx: mpsc::UnboundedReceiver<StreamingEvent>) -> Self {
        Self { rx, task: None }
    }

    /// Receives the next event, `None` once the stream has ended.
    #[inline]
    pub async fn next_event(&mut self) -> Option<StreamingEvent> {
        self.rx.recv().await
    }
}

impl Stream for EventStream {
    type Item = StreamingEvent;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use cinescout_catalog::MediaType;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_wire_shape() {
        let events = [
            (
                StreamingEvent::Thinking {
                    summary: "Hmm".to_owned(),
                },
                json!({"type": "thinking", "summary": "Hmm"}),
            ),
            (
                StreamingEvent::ToolCall {
                    name: "discover_movies".to_owned(),
                    status: ToolCallStatus::Started,
                },
                json!({
                    "type": "tool_call",
                    "name": "discover_movies",
                    "status": "started"
                }),
            ),
            (
                StreamingEvent::TextDelta {
                    delta: "Hello".to_owned(),
                },
                json!({"type": "text_delta", "delta": "Hello"}),
            ),
            (
                StreamingEvent::Results {
                    items: vec![MediaListItem {
                        id: 1,
                        media_type: MediaType::Tv,
                        title: "Twin Peaks".to_owned(),
                        overview: String::new(),
                        release_date: None,
                        poster_path: None,
                        vote_average: None,
                        genre_ids: vec![],
                    }],
                },
                json!({"type": "results", "items": [{
                    "id": 1,
                    "media_type": "tv",
                    "title": "Twin Peaks",
                    "overview": ""
                }]}),
            ),
            (StreamingEvent::Done, json!({"type": "done"})),
            (
                StreamingEvent::Error {
                    message: "Oops".to_owned(),
                    code: None,
                },
                json!({"type": "error", "message": "Oops"}),
            ),
            (
                StreamingEvent::Error {
                    message: "Slow down".to_owned(),
                    code: Some(code::RATE_LIMIT.to_owned()),
                },
                json!({
                    "type": "error",
                    "message": "Slow down",
                    "code": "rate_limit"
                }),
            ),
        ];
        for (event, expected) in events {
            assert_eq!(serde_json::to_value(&event).unwrap(), expected);
            assert_eq!(
                serde_json::from_value::<StreamingEvent>(expected).unwrap(),
                event
            );
        }
    }

    #[test]
    fn test_single_terminal_event() {
        let (emitter, mut rx) = Emitter::channel();
        let other = emitter.clone();

        assert!(emitter.emit(StreamingEvent::TextDelta {
            delta: "Hi".to_owned()
        }));
        assert!(other.emit(StreamingEvent::Done));
        assert!(emitter.is_terminated());
        assert!(!emitter.emit(StreamingEvent::Error {
            message: "late".to_owned(),
            code: None,
        }));
        assert!(!other.emit(StreamingEvent::TextDelta {
            delta: "late".to_owned()
        }));
        drop((emitter, other));

        let mut received = vec![];
        while let Ok(event) = rx.try_recv() {
            received.push(event);
        }
        assert_eq!(
            received,
            vec![
                StreamingEvent::TextDelta {
                    delta: "Hi".to_owned()
                },
                StreamingEvent::Done
            ]
        );
    }
}
