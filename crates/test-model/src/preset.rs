use cinescout_model::{ErrorKind, ModelResponseStatus, ToolCallRequest};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The events in a preset response.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PresetEvent {
    #[serde(rename = "reasoning")]
    Reasoning(String),
    #[serde(rename = "message_delta")]
    MessageDelta(String),
    #[serde(rename = "tool_call")]
    ToolCall(ToolCallRequest),
}

impl PresetEvent {
    /// Creates a tool call event, serializing `arguments` the way a model
    /// would send them.
    pub fn tool_call(id: &str, name: &str, arguments: Value) -> Self {
        PresetEvent::ToolCall(ToolCallRequest {
            id: id.to_owned(),
            name: name.to_owned(),
            arguments: arguments.to_string(),
        })
    }
}

/// The preset response for one request.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetResponse {
    /// Events in this response.
    pub events: Vec<PresetEvent>,
    /// The status reported after the last event.
    pub status: ModelResponseStatus,
    /// If set, the request itself fails with an error of this kind and
    /// no event is delivered.
    #[serde(skip)]
    pub failure: Option<ErrorKind>,
}

impl PresetResponse {
    /// Creates a `PresetResponse` with the specified events.
    #[inline]
    pub fn with_events(events: impl Into<Vec<PresetEvent>>) -> Self {
        Self {
            events: events.into(),
            status: ModelResponseStatus::Completed,
            failure: None,
        }
    }

    /// Creates a structured answer response whose text is `value`
    /// serialized as JSON.
    #[inline]
    pub fn with_json(value: &Value) -> Self {
        Self::with_events([PresetEvent::MessageDelta(value.to_string())])
    }

    /// Sets the status reported at the end of the response.
    #[inline]
    pub fn with_status(mut self, status: ModelResponseStatus) -> Self {
        self.status = status;
        self
    }

    /// Makes the request fail with the given error kind.
    #[inline]
    pub fn with_failure(mut self, kind: ErrorKind) -> Self {
        self.failure = Some(kind);
        self
    }
}
