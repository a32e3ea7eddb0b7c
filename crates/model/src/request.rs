use serde_json::Value;

use crate::response::ToolCallRequest;

/// A request to be sent to the model provider.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModelRequest {
    /// The transcript so far.
    pub messages: Vec<ModelMessage>,
    /// Tools that are available to the model.
    pub tools: Vec<ModelTool>,
    /// If set, the model must answer with a JSON document matching the
    /// schema instead of free text.
    pub output_schema: Option<OutputSchema>,
    /// Whether the response should be delivered incrementally.
    ///
    /// Structured output and incremental delivery are mutually exclusive
    /// for most providers, so requests with an `output_schema` are
    /// usually sent with this set to `false`.
    pub stream: bool,
}

impl ModelRequest {
    /// Creates a streaming request with the given transcript and tools.
    #[inline]
    pub fn streaming(
        messages: Vec<ModelMessage>,
        tools: Vec<ModelTool>,
    ) -> Self {
        Self {
            messages,
            tools,
            output_schema: None,
            stream: true,
        }
    }

    /// Creates a buffered request asking for output matching `schema`.
    #[inline]
    pub fn structured(
        messages: Vec<ModelMessage>,
        schema: OutputSchema,
    ) -> Self {
        Self {
            messages,
            tools: vec![],
            output_schema: Some(schema),
            stream: false,
        }
    }
}

/// A complete turn in the transcript.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ModelMessage {
    /// Instructions from the application developer.
    Developer(String),
    /// A user input text.
    User(String),
    /// An assistant text.
    Assistant(String),
    /// A function call previously requested by the model.
    FunctionCall(ToolCallRequest),
    /// The output of a function call.
    FunctionCallOutput(ToolCallResult),
}

/// The result of calling a tool.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ToolCallResult {
    /// The identifier of the tool call request this result belongs to.
    pub id: String,
    /// The serialized result of the tool call.
    pub content: String,
}

/// Describes a tool that can be used by the model.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModelTool {
    /// Name of the tool.
    pub name: String,
    /// Description of the tool.
    pub description: String,
    /// Parameters definition of the tool.
    ///
    /// For most model providers, the parameters should typically be
    /// defined by a [JSON schema](https://json-schema.org/).
    pub parameters: Value,
}

/// A named JSON schema the model output must conform to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OutputSchema {
    /// Name of the schema, some providers require it to be an identifier.
    pub name: String,
    /// The JSON schema.
    pub schema: Value,
}
