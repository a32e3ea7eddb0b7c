//! The conversation state machine.
//!
//! Each session is an actor. Public operations, stream events and timers
//! all arrive as messages, so the state is only ever touched by one handler
//! at a time, and every change is published as a [`ConversationState`]
//! snapshot.

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::Duration;

use cinescout_actor::{Actor, Message as ActorMessage, TaskHandle};
use cinescout_core::event::code;
use cinescout_core::{
    ChatRequest, ChatRole, Locale, MAX_MESSAGES, StreamingEvent,
};
use futures_util::StreamExt;
use tokio::sync::{oneshot, watch};
use uuid::Uuid;

use crate::message::{ConversationState, Message, MessageStatus};
use crate::transport::ChatTransport;
use crate::{ClientError, TransportError};

/// The longest message accepted, in characters.
pub const MAX_INPUT_CHARS: usize = 1000;

/// Quiet period after the last text delta before buffered text is shown.
pub const DEBOUNCE_INTERVAL: Duration = Duration::from_millis(200);

/// How long to wait for the first sign of progress before showing a
/// placeholder.
pub const STALL_TIMEOUT: Duration = Duration::from_secs(5);

const STALL_THINKING: &str = "Still working on it...";
const RATE_LIMIT_MESSAGE: &str =
    "Too many requests right now. Please wait a moment and try again.";
const CONVERSATION_LIMIT_MESSAGE: &str = "This conversation has reached its \
     message limit. Clear it to start a new one.";
const UNTERMINATED_MESSAGE: &str =
    "The connection closed before the answer was complete.";

/// A conversation with the assistant.
///
/// Must be created within a tokio runtime. Dropping the session cancels
/// the answer in progress.
pub struct ChatSession {
    actor: Actor<SessionState>,
    state_rx: watch::Receiver<ConversationState>,
}

impl ChatSession {
    /// Creates an empty session answering in English.
    #[inline]
    pub fn new<T: ChatTransport + 'static>(transport: T) -> Self {
        Self::with_locale(transport, Locale::default())
    }

    /// Creates an empty session answering in `locale`.
    pub fn with_locale<T: ChatTransport + 'static>(
        transport: T,
        locale: Locale,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(ConversationState::default());
        let state = SessionState {
            transport: Arc::new(transport),
            locale,
            messages: vec![],
            error: None,
            inflight: None,
            next_request_id: 0,
            state_tx,
        };
        Self {
            actor: Actor::spawn(state, Some("chat session")),
            state_rx,
        }
    }

    /// Sends a user message and starts streaming the answer.
    ///
    /// An answer still in progress is cancelled first. Returns once the
    /// message has been accepted, not when the answer is complete.
    pub async fn send_message(&self, text: &str) -> Result<(), ClientError> {
        self.request(|reply| SendMessage {
            text: text.to_owned(),
            reply,
        })
        .await
    }

    /// Cancels the answer in progress and removes every message.
    pub async fn clear_conversation(&self) -> Result<(), ClientError> {
        self.request(|reply| ClearConversation { reply }).await
    }

    /// Removes the last exchange and sends its user message again.
    pub async fn retry_last_message(&self) -> Result<(), ClientError> {
        self.request(|reply| RetryLastMessage { reply }).await
    }

    /// Returns the messages, oldest first.
    pub fn messages(&self) -> Vec<Message> {
        self.state_rx.borrow().messages.clone()
    }

    /// Returns `true` while an answer is streaming.
    pub fn is_streaming(&self) -> bool {
        self.state_rx.borrow().is_streaming
    }

    /// Returns the last failure.
    pub fn error(&self) -> Option<String> {
        self.state_rx.borrow().error.clone()
    }

    /// Returns a receiver of every published state.
    #[inline]
    pub fn subscribe(&self) -> watch::Receiver<ConversationState> {
        self.state_rx.clone()
    }

    async fn request<M>(
        &self,
        make_msg: impl FnOnce(Reply) -> M,
    ) -> Result<(), ClientError>
    where
        M: ActorMessage<SessionState> + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.actor
            .send(make_msg(tx))
            .map_err(|_| ClientError::SessionClosed)?;
        rx.await.map_err(|_| ClientError::SessionClosed)?
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.actor.try_kill();
    }
}

type Reply = oneshot::Sender<Result<(), ClientError>>;

struct SessionState {
    transport: Arc<dyn ChatTransport>,
    locale: Locale,
    messages: Vec<Message>,
    error: Option<String>,
    inflight: Option<Inflight>,
    next_request_id: u64,
    state_tx: watch::Sender<ConversationState>,
}

/// The answer being streamed. Dropping it stops the stream and both
/// timers.
struct Inflight {
    request_id: u64,
    message_id: Uuid,
    buffer: String,
    _stream_task: TaskHandle,
    debounce: Option<TaskHandle>,
    stall: Option<TaskHandle>,
}

impl SessionState {
    fn publish(&self) {
        self.state_tx.send_replace(ConversationState {
            messages: self.messages.clone(),
            is_streaming: self.inflight.is_some(),
            error: self.error.clone(),
        });
    }

    fn message_mut(&mut self, id: Uuid) -> Option<&mut Message> {
        self.messages.iter_mut().rev().find(|msg| msg.id == id)
    }

    /// Returns the answer in progress if `request_id` belongs to it.
    fn inflight_for(&mut self, request_id: u64) -> Option<&mut Inflight> {
        match &mut self.inflight {
            Some(inflight) if inflight.request_id == request_id => {
                Some(inflight)
            }
            _ => {
                trace!("discarding a message of stale request {request_id}");
                None
            }
        }
    }

    /// Moves buffered text into the streaming message.
    fn flush(&mut self) {
        let Some(inflight) = &mut self.inflight else {
            return;
        };
        inflight.debounce = None;
        if inflight.buffer.is_empty() {
            return;
        }
        let text = std::mem::take(&mut inflight.buffer);
        let id = inflight.message_id;
        if let Some(msg) = self.message_mut(id) {
            msg.content.push_str(&text);
        }
    }

    /// Ends the answer in progress, leaving its message with `status`.
    fn finish(&mut self, status: MessageStatus, error: Option<String>) {
        self.flush();
        let Some(inflight) = self.inflight.take() else {
            return;
        };
        if let Some(msg) = self.message_mut(inflight.message_id) {
            msg.thinking = None;
            msg.status = status;
            msg.error = error.clone();
        }
        if error.is_some() {
            self.error = error;
        }
    }

    /// Stops the answer in progress. Its message keeps what arrived so far
    /// and counts as complete.
    fn cancel(&mut self) {
        if let Some(inflight) = &self.inflight {
            debug!("cancelling request {}", inflight.request_id);
            self.finish(MessageStatus::Complete, None);
        }
    }

    fn send(
        &mut self,
        text: &str,
        actor: &Actor<SessionState>,
    ) -> Result<(), ClientError> {
        let result = self.start(text, actor);
        if let Err(err) = &result {
            self.error = Some(match err {
                ClientError::ConversationLimit { .. } => {
                    CONVERSATION_LIMIT_MESSAGE.to_owned()
                }
                err => err.to_string(),
            });
        }
        self.publish();
        result
    }

    fn start(
        &mut self,
        text: &str,
        actor: &Actor<SessionState>,
    ) -> Result<(), ClientError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ClientError::EmptyMessage);
        }
        let len = text.chars().count();
        if len > MAX_INPUT_CHARS {
            return Err(ClientError::MessageTooLong {
                len,
                max: MAX_INPUT_CHARS,
            });
        }

        self.cancel();

        // Failed and cancelled answers still count towards the limit.
        let count = self.messages.len() + 1;
        if count > MAX_MESSAGES {
            warn!("refusing to send a conversation of {count} messages");
            return Err(ClientError::ConversationLimit {
                count,
                max: MAX_MESSAGES,
            });
        }
        let mut history = self
            .messages
            .iter()
            .filter_map(Message::to_chat_message)
            .collect::<Vec<_>>();

        let user = Message::user(text.to_owned());
        history.extend(user.to_chat_message());
        let assistant = Message::assistant_placeholder();
        let message_id = assistant.id;
        self.messages.push(user);
        self.messages.push(assistant);
        self.error = None;

        let request_id = self.next_request_id;
        self.next_request_id += 1;
        let request = ChatRequest::new(history).with_locale(self.locale);
        debug!("starting request {request_id}");

        let stream_task = actor.spawn_task(read_stream(
            Arc::clone(&self.transport),
            request,
            request_id,
            actor.clone(),
        ));
        let stall = actor.send_after(STALL_TIMEOUT, Stalled { request_id });
        self.inflight = Some(Inflight {
            request_id,
            message_id,
            buffer: String::new(),
            _stream_task: stream_task,
            debounce: None,
            stall: Some(stall),
        });
        Ok(())
    }

    fn handle_event(
        &mut self,
        request_id: u64,
        event: StreamingEvent,
        actor: &Actor<SessionState>,
    ) {
        let Some(inflight) = self.inflight_for(request_id) else {
            return;
        };
        let message_id = inflight.message_id;
        match event {
            StreamingEvent::Thinking { summary } => {
                inflight.stall = None;
                if let Some(msg) = self.message_mut(message_id) {
                    msg.thinking = Some(summary);
                }
            }
            StreamingEvent::ToolCall { name, status } => {
                debug!("tool {name} {status:?}");
                return;
            }
            StreamingEvent::TextDelta { delta } => {
                inflight.stall = None;
                inflight.buffer.push_str(&delta);
                // Replacing the handle restarts the quiet period.
                let flush = FlushBuffer { request_id };
                inflight.debounce =
                    Some(actor.send_after(DEBOUNCE_INTERVAL, flush));
                return;
            }
            StreamingEvent::Results { items } => {
                self.flush();
                if let Some(msg) = self.message_mut(message_id) {
                    msg.results = Some(items);
                }
            }
            StreamingEvent::Done => {
                debug!("request {request_id} done");
                self.finish(MessageStatus::Complete, None);
            }
            StreamingEvent::Error { message, code } => {
                error!("request {request_id} failed: {message}");
                let message = match code.as_deref() {
                    Some(code::RATE_LIMIT) => RATE_LIMIT_MESSAGE.to_owned(),
                    Some(code::MESSAGE_LIMIT) => {
                        CONVERSATION_LIMIT_MESSAGE.to_owned()
                    }
                    _ => message,
                };
                self.finish(MessageStatus::Error, Some(message));
            }
        }
        self.publish();
    }
}

/// Reads one answer and forwards it to the session.
async fn read_stream(
    transport: Arc<dyn ChatTransport>,
    request: ChatRequest,
    request_id: u64,
    actor: Actor<SessionState>,
) {
    let mut stream = match transport.open(request).await {
        Ok(stream) => stream,
        Err(err) => {
            actor.send(StreamFailed { request_id, err }).ok();
            return;
        }
    };
    while let Some(item) = stream.next().await {
        let msg = match item {
            Ok(event) => {
                let terminal = event.is_terminal();
                if actor.send(StreamEvent { request_id, event }).is_err() {
                    return;
                }
                if terminal {
                    return;
                }
                continue;
            }
            Err(err) => StreamFailed { request_id, err },
        };
        actor.send(msg).ok();
        return;
    }
    actor
        .send(StreamFailed {
            request_id,
            err: TransportError::Connection(UNTERMINATED_MESSAGE.to_owned()),
        })
        .ok();
}

#[derive(Debug)]
struct SendMessage {
    text: String,
    reply: Reply,
}

impl ActorMessage<SessionState> for SendMessage {
    fn handle(self, state: &mut SessionState, handle: &Actor<SessionState>) {
        let result = state.send(&self.text, handle);
        self.reply.send(result).ok();
    }
}

#[derive(Debug)]
struct ClearConversation {
    reply: Reply,
}

impl ActorMessage<SessionState> for ClearConversation {
    fn handle(self, state: &mut SessionState, _handle: &Actor<SessionState>) {
        state.cancel();
        state.messages.clear();
        state.error = None;
        state.publish();
        self.reply.send(Ok(())).ok();
    }
}

#[derive(Debug)]
struct RetryLastMessage {
    reply: Reply,
}

impl ActorMessage<SessionState> for RetryLastMessage {
    fn handle(self, state: &mut SessionState, handle: &Actor<SessionState>) {
        state.cancel();
        let assistant_last = state
            .messages
            .last()
            .is_some_and(|msg| msg.role == ChatRole::Assistant);
        let user_idx = state.messages.len() - usize::from(assistant_last);
        let result = match user_idx
            .checked_sub(1)
            .and_then(|idx| state.messages.get(idx))
        {
            Some(msg) if msg.role == ChatRole::User => {
                let text = msg.content.clone();
                state.messages.truncate(user_idx - 1);
                state.send(&text, handle)
            }
            _ => {
                state.publish();
                Err(ClientError::NothingToRetry)
            }
        };
        self.reply.send(result).ok();
    }
}

#[derive(Debug)]
struct StreamEvent {
    request_id: u64,
    event: StreamingEvent,
}

impl ActorMessage<SessionState> for StreamEvent {
    fn handle(self, state: &mut SessionState, handle: &Actor<SessionState>) {
        state.handle_event(self.request_id, self.event, handle);
    }
}

#[derive(Debug)]
struct StreamFailed {
    request_id: u64,
    err: TransportError,
}

impl ActorMessage<SessionState> for StreamFailed {
    fn handle(self, state: &mut SessionState, _handle: &Actor<SessionState>) {
        if state.inflight_for(self.request_id).is_none() {
            return;
        }
        error!("request {} failed: {}", self.request_id, self.err);
        let message = match self.err {
            TransportError::Connection(message) => message,
            err => err.to_string(),
        };
        state.finish(MessageStatus::Error, Some(message));
        state.publish();
    }
}

#[derive(Debug)]
struct FlushBuffer {
    request_id: u64,
}

impl ActorMessage<SessionState> for FlushBuffer {
    fn handle(self, state: &mut SessionState, _handle: &Actor<SessionState>) {
        if state.inflight_for(self.request_id).is_none() {
            return;
        }
        state.flush();
        state.publish();
    }
}

#[derive(Debug)]
struct Stalled {
    request_id: u64,
}

impl ActorMessage<SessionState> for Stalled {
    fn handle(self, state: &mut SessionState, _handle: &Actor<SessionState>) {
        let Some(inflight) = state.inflight_for(self.request_id) else {
            return;
        };
        inflight.stall = None;
        let message_id = inflight.message_id;
        if let Some(msg) = state.message_mut(message_id) {
            if msg.thinking.is_none() {
                msg.thinking = Some(STALL_THINKING.to_owned());
            }
        }
        state.publish();
    }
}
