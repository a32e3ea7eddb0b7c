use cinescout_model::{
    ModelMessage, ModelRequest, ModelResponseStatus, ModelTool, OutputSchema,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::OpenAIConfig;

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    #[serde(rename = "response.reasoning_summary_text.delta")]
    ReasoningSummaryDelta { delta: String },
    #[serde(rename = "response.output_text.delta")]
    OutputTextDelta { delta: String },
    #[serde(rename = "response.output_item.done")]
    OutputItemDone { item: OutputItem },
    #[serde(rename = "response.completed")]
    Completed { response: ResponseObject },
    #[serde(rename = "response.incomplete")]
    Incomplete { response: ResponseObject },
    #[serde(rename = "response.failed")]
    Failed { response: ResponseObject },
    #[serde(rename = "error")]
    Error {
        code: Option<String>,
        #[serde(default)]
        message: String,
    },
    #[serde(other)]
    Ignored,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ResponseObject {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub output: Vec<OutputItem>,
    #[serde(default)]
    pub error: Option<ResponseError>,
}

impl ResponseObject {
    pub fn status(&self) -> ModelResponseStatus {
        match self.status.as_deref() {
            Some("completed") => ModelResponseStatus::Completed,
            Some("incomplete") => ModelResponseStatus::Incomplete,
            Some("cancelled") => ModelResponseStatus::Cancelled,
            // Anything else (`failed`, or a response still `in_progress`
            // after the stream ended) can't be used as an answer.
            _ => ModelResponseStatus::Failed,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ResponseError {
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputItem {
    Message {
        #[serde(default)]
        content: Vec<OutputContent>,
    },
    FunctionCall {
        call_id: String,
        name: String,
        #[serde(default)]
        arguments: String,
    },
    Reasoning {
        #[serde(default)]
        summary: Vec<SummaryText>,
    },
    #[serde(other)]
    Other,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputContent {
    OutputText { text: String },
    Refusal { refusal: String },
    #[serde(other)]
    Other,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SummaryText {
    pub text: String,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
enum Role {
    Developer,
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InputItem {
    Message {
        role: Role,
        content: String,
    },
    FunctionCall {
        call_id: String,
        name: String,
        arguments: String,
    },
    FunctionCallOutput {
        call_id: String,
        output: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
struct Tool {
    r#type: &'static str,
    name: String,
    description: String,
    parameters: Value,
    strict: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
struct Reasoning {
    effort: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<&'static str>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
struct TextConfig {
    format: TextFormat,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
struct TextFormat {
    r#type: &'static str,
    name: String,
    schema: Value,
    strict: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ResponsesRequest {
    model: String,
    input: Vec<InputItem>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
    reasoning: Reasoning,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<TextConfig>,
    stream: bool,
    store: bool,
}

// -----------
// Conversions
// -----------

#[inline]
pub fn create_request(
    req: &ModelRequest,
    config: &OpenAIConfig,
) -> ResponsesRequest {
    ResponsesRequest {
        model: config.model.clone(),
        input: req.messages.iter().map(create_input_item).collect(),
        tools: req.tools.iter().map(create_tool).collect(),
        reasoning: Reasoning {
            effort: config.reasoning_effort.as_str(),
            summary: config.reasoning_summary.then_some("auto"),
        },
        text: req.output_schema.as_ref().map(create_text_config),
        stream: req.stream,
        store: false,
    }
}

#[inline]
fn create_input_item(msg: &ModelMessage) -> InputItem {
    let message = |role, content: &String| InputItem::Message {
        role,
        content: content.clone(),
    };
    match msg {
        ModelMessage::Developer(content) => message(Role::Developer, content),
        ModelMessage::User(content) => message(Role::User, content),
        ModelMessage::Assistant(content) => message(Role::Assistant, content),
        ModelMessage::FunctionCall(call) => InputItem::FunctionCall {
            call_id: call.id.clone(),
            name: call.name.clone(),
            arguments: call.arguments.clone(),
        },
        ModelMessage::FunctionCallOutput(result) => {
            InputItem::FunctionCallOutput {
                call_id: result.id.clone(),
                output: result.content.clone(),
            }
        }
    }
}

#[inline]
fn create_tool(tool: &ModelTool) -> Tool {
    Tool {
        r#type: "function",
        name: tool.name.clone(),
        description: tool.description.clone(),
        parameters: tool.parameters.clone(),
        strict: false,
    }
}

#[inline]
fn create_text_config(schema: &OutputSchema) -> TextConfig {
    TextConfig {
        format: TextFormat {
            r#type: "json_schema",
            name: schema.name.clone(),
            schema: schema.schema.clone(),
            strict: false,
        },
    }
}
