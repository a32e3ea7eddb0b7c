//! The conversation driver.
//!
//! Answering a message takes two phases. In the tool-calling phase the
//! model is called repeatedly with the tool catalog, and the calls it asks
//! for are executed and folded back into the transcript. In the extraction
//! phase the model is asked once more, without tools and without streaming,
//! for an answer matching the [`FinalAnswer`] schema.

mod builder;
mod error;

use std::sync::Arc;

use cinescout_catalog::MediaListItem;
use cinescout_model::{
    ModelMessage, ModelRequest, ModelResponseEvent, ModelResponseStatus,
    ModelTool, OutputSchema, ToolCallResult,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::Instrument;

pub use builder::DriverBuilder;
pub use error::DriverError;

use crate::event::{
    Emitter, EventStream, StreamingEvent, ToolCallStatus, code,
};
use crate::message::ChatRequest;
use crate::model_client::{ModelClient, ModelClientResponse};
use crate::tool::{Dispatcher, ToolName, inject_default_language};

/// Instructions used when none are configured.
pub const DEFAULT_INSTRUCTIONS: &str = "\
You are CineScout, a movie and TV recommendation assistant. \
Use the tools to look up real titles before recommending anything; never \
invent titles. Prefer a few well-matched recommendations over long lists. \
When the results you have gathered answer the request, call \
`present_results`. If the user is just chatting, answer without tools.";

const FINAL_ANSWER_INSTRUCTIONS: &str = "\
Write the final answer now. Put a short reply to the user in `message` \
and the titles you recommend in `items`, copied exactly from the tool \
results. Use an empty `items` list if nothing fits or no titles were \
looked up.";

/// Number of characters per `text_delta` event.
const TEXT_CHUNK_CHARS: usize = 5;

/// The structured answer the extraction phase asks for.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FinalAnswer {
    /// The reply shown to the user.
    pub message: String,
    /// The recommended titles, in presentation order.
    #[serde(default)]
    pub items: Vec<MediaListItem>,
}

/// How the tool-calling phase ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ToolPhaseOutcome {
    /// The model called `present_results`.
    Completed,
    /// The model answered without calling any tool.
    NoToolCalls,
    /// The iteration limit was reached while the model still called tools.
    IterationLimit,
}

/// The result of a non-streaming run.
#[derive(Clone, Debug, PartialEq)]
pub struct Answer {
    /// The reply shown to the user.
    pub message: String,
    /// The recommended titles.
    pub items: Vec<MediaListItem>,
    /// How the tool-calling phase ended.
    pub outcome: ToolPhaseOutcome,
}

pub(crate) struct DriverInner {
    pub(crate) model_client: ModelClient,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) instructions: String,
    pub(crate) max_tool_iterations: usize,
    pub(crate) max_messages: usize,
}

/// Answers conversation turns against a model and the media catalog.
///
/// The driver holds no per-conversation state, clones share the same
/// model client and catalog.
#[derive(Clone)]
pub struct Driver {
    inner: Arc<DriverInner>,
}

impl Driver {
    pub(crate) fn from_inner(inner: DriverInner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Answers the last message of `request`.
    pub async fn run(
        &self,
        request: ChatRequest,
    ) -> Result<Answer, DriverError> {
        self.answer(request, None)
            .instrument(debug_span!("driver run"))
            .await
    }

    /// Answers the last message of `request`, relaying progress as events.
    ///
    /// The work happens on a spawned task, so this must be called within a
    /// tokio runtime. The stream always ends with exactly one `done` or
    /// `error` event. Dropping the stream cancels the work.
    pub fn stream(&self, request: ChatRequest) -> EventStream {
        let (emitter, rx) = Emitter::channel();
        let driver = self.clone();
        let task = tokio::spawn(
            async move {
                match driver.answer(request, Some(&emitter)).await {
                    Ok(answer) => {
                        let chunks =
                            chunk_chars(&answer.message, TEXT_CHUNK_CHARS);
                        for delta in chunks {
                            emitter.emit(StreamingEvent::TextDelta { delta });
                        }
                        emitter.emit(StreamingEvent::Results {
                            items: answer.items,
                        });
                        emitter.emit(StreamingEvent::Done);
                    }
                    Err(err) => {
                        error!("driver failed: {err}");
                        emitter.emit(StreamingEvent::Error {
                            message: err.to_string(),
                            code: err.code().map(str::to_owned),
                        });
                    }
                }
            }
            .instrument(debug_span!("driver stream")),
        );
        EventStream::new(rx, task)
    }

    async fn answer(
        &self,
        request: ChatRequest,
        emitter: Option<&Emitter>,
    ) -> Result<Answer, DriverError> {
        let inner = &self.inner;
        let count = request.messages.len();
        if count > inner.max_messages {
            return Err(DriverError::MessageLimit {
                count,
                max: inner.max_messages,
            });
        }

        let mut transcript = Vec::with_capacity(count + 1);
        transcript.push(ModelMessage::Developer(format!(
            "{}\n\nAlways reply in {}.",
            inner.instructions,
            request.locale.display_name()
        )));
        transcript
            .extend(request.messages.iter().map(|m| m.to_model_message()));

        let outcome = self
            .run_tool_phase(&mut transcript, &request, emitter)
            .await?;
        debug!("tool phase ended: {outcome:?}");

        transcript.push(ModelMessage::Developer(
            FINAL_ANSWER_INSTRUCTIONS.to_owned(),
        ));
        let schema = OutputSchema {
            name: "final_answer".to_owned(),
            schema: schemars::schema_for!(FinalAnswer).to_value(),
        };
        let resp = inner
            .model_client
            .send_request(
                ModelRequest::structured(transcript, schema),
                thinking_relay(emitter),
            )
            .await?;
        check_status(&resp)?;

        let answer: FinalAnswer = serde_json::from_str(resp.text.trim())
            .map_err(|err| {
                warn!("malformed final answer: {}", resp.text);
                DriverError::MalformedAnswer(err.to_string())
            })?;
        Ok(Answer {
            message: answer.message,
            items: answer.items,
            outcome,
        })
    }

    async fn run_tool_phase(
        &self,
        transcript: &mut Vec<ModelMessage>,
        request: &ChatRequest,
        emitter: Option<&Emitter>,
    ) -> Result<ToolPhaseOutcome, DriverError> {
        let tools = self.inner.dispatcher.definitions();
        let max_iterations = self.inner.max_tool_iterations;

        for iteration in 0..max_iterations {
            let outcome = self
                .run_tool_iteration(transcript, &tools, request, emitter)
                .instrument(debug_span!("tool iteration", iteration))
                .await?;
            if let Some(outcome) = outcome {
                return Ok(outcome);
            }
        }

        warn!(
            "tool iteration limit ({max_iterations}) reached, answering with \
             what we have"
        );
        Ok(ToolPhaseOutcome::IterationLimit)
    }

    /// Runs one model round-trip and the tool calls it asks for.
    ///
    /// Returns the outcome if the phase ended with this iteration.
    async fn run_tool_iteration(
        &self,
        transcript: &mut Vec<ModelMessage>,
        tools: &[ModelTool],
        request: &ChatRequest,
        emitter: Option<&Emitter>,
    ) -> Result<Option<ToolPhaseOutcome>, DriverError> {
        let inner = &self.inner;
        let on_event = {
            let mut relay = thinking_relay(emitter);
            let emitter = emitter.cloned();
            move |event: &ModelResponseEvent| {
                relay(event);
                if let (Some(emitter), ModelResponseEvent::ToolCall(call)) =
                    (&emitter, event)
                {
                    emitter.emit(StreamingEvent::ToolCall {
                        name: call.name.clone(),
                        status: ToolCallStatus::Started,
                    });
                }
            }
        };
        let resp = inner
            .model_client
            .send_request(
                ModelRequest::streaming(transcript.clone(), tools.to_vec()),
                on_event,
            )
            .await?;
        check_status(&resp)?;
        trace!("reasoning summary: {:?}", resp.reasoning_summary);

        if !resp.text.is_empty() {
            transcript.push(ModelMessage::Assistant(resp.text.clone()));
        }
        if resp.tool_calls.is_empty() {
            return Ok(Some(ToolPhaseOutcome::NoToolCalls));
        }

        let completion = resp.tool_calls.iter().any(|call| {
            call.name
                .parse::<ToolName>()
                .is_ok_and(ToolName::is_completion)
        });
        let calls = resp
            .tool_calls
            .iter()
            .map(|call| inject_default_language(call, request.locale))
            .collect::<Vec<_>>();
        let outputs = inner
            .dispatcher
            .execute_all(&calls, |call| {
                if let Some(emitter) = emitter {
                    emitter.emit(StreamingEvent::ToolCall {
                        name: call.name.clone(),
                        status: ToolCallStatus::Completed,
                    });
                }
            })
            .await;

        // The transcript keeps the calls exactly as the model made them.
        for (call, output) in resp.tool_calls.into_iter().zip(outputs) {
            transcript.push(ModelMessage::FunctionCall(call));
            transcript.push(ModelMessage::FunctionCallOutput(ToolCallResult {
                id: output.call_id,
                content: output.result.to_string(),
            }));
        }

        Ok(completion.then_some(ToolPhaseOutcome::Completed))
    }
}

/// Returns an event callback that emits `thinking` whenever the reasoning
/// summary of the current response grows.
fn thinking_relay(
    emitter: Option<&Emitter>,
) -> impl FnMut(&ModelResponseEvent) + Send + 'static {
    let emitter = emitter.cloned();
    let mut summary = String::new();
    move |event| {
        let (Some(emitter), ModelResponseEvent::ReasoningDelta(delta)) =
            (&emitter, event)
        else {
            return;
        };
        if delta.is_empty() {
            return;
        }
        summary.push_str(delta);
        emitter.emit(StreamingEvent::Thinking {
            summary: summary.clone(),
        });
    }
}

fn check_status(resp: &ModelClientResponse) -> Result<(), DriverError> {
    match resp.status {
        Some(status) if status.is_completed() => Ok(()),
        Some(status) => Err(DriverError::ModelStatus(status)),
        // A response without a final status never finished.
        None => Err(DriverError::ModelStatus(ModelResponseStatus::Incomplete)),
    }
}

fn chunk_chars(text: &str, size: usize) -> Vec<String> {
    let chars = text.chars().collect::<Vec<_>>();
    chars.chunks(size).map(|c| c.iter().collect()).collect()
}

impl DriverError {
    /// Returns the wire error code for failures the client handles
    /// specially.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            DriverError::MessageLimit { .. } => Some(code::MESSAGE_LIMIT),
            _ if self.is_rate_limit() => Some(code::RATE_LIMIT),
            _ => None,
        }
    }
}
