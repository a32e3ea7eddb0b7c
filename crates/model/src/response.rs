use std::fmt::{self, Display};
use std::pin::Pin;
use std::task::{self, Poll};

use serde::{Deserialize, Serialize};

use crate::provider::ModelProviderError;

/// A response from the model provider.
pub trait ModelResponse: Sized + Send + 'static {
    /// The error type that may be returned by the provider.
    type Error: ModelProviderError;

    /// Attempts to pull out the next event from the response.
    ///
    /// # Return value
    ///
    /// There are several possible return values, each indicating a
    /// distinct response state:
    ///
    /// - `Poll::Pending` means that this response is still waiting for
    ///   the next event. Implementations will ensure that the current
    ///   task will be notified when the next event may be ready.
    /// - `Poll::Ready(Ok(Some(event)))` means the response has an event
    ///   to deliver, and may produce further events on subsequent
    ///   `poll_next_event` calls.
    /// - `Poll::Ready(Ok(None))` means the response has completed.
    /// - `Poll::Ready(Err(error))` means an error occurred while
    ///   processing the response.
    ///
    /// Calling this method after completion should always return `None`.
    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>>;
}

/// The final status the model reported for a response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelResponseStatus {
    /// The model finished normally.
    Completed,
    /// The output was cut short (token limit, content filter, ...).
    Incomplete,
    /// The model failed to produce a response.
    Failed,
    /// The response was cancelled on the provider side.
    Cancelled,
}

impl ModelResponseStatus {
    /// Returns `true` if the model finished normally.
    #[inline]
    pub fn is_completed(self) -> bool {
        self == ModelResponseStatus::Completed
    }
}

impl Display for ModelResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelResponseStatus::Completed => write!(f, "completed"),
            ModelResponseStatus::Incomplete => write!(f, "incomplete"),
            ModelResponseStatus::Failed => write!(f, "failed"),
            ModelResponseStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Describes a function call request from the model.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// The unique identifier for the call, echoed back with its output.
    pub id: String,
    /// The name of the tool to call.
    pub name: String,
    /// The serialized JSON arguments, exactly as the model produced them.
    pub arguments: String,
}

/// The event from a model response.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelResponseEvent {
    /// Received a piece of the model's reasoning summary.
    ReasoningDelta(String),
    /// Received a message delta.
    MessageDelta(String),
    /// Received a complete function call request.
    ToolCall(ToolCallRequest),
    /// The response has finished with the given status.
    Finished(ModelResponseStatus),
}
