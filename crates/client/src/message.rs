use cinescout_catalog::MediaListItem;
use cinescout_core::{ChatMessage, ChatRole};
use serde::Serialize;
use uuid::Uuid;

/// The lifecycle of a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// The answer is still arriving.
    Streaming,
    /// The message is final.
    Complete,
    /// The answer failed, see [`Message::error`].
    Error,
}

/// A message of the conversation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Message {
    /// Assigned at creation, never changes.
    pub id: Uuid,
    /// Who wrote the message.
    pub role: ChatRole,
    /// The text received so far.
    pub content: String,
    /// The model's reasoning summary while the answer is streaming.
    pub thinking: Option<String>,
    /// The recommended titles.
    pub results: Option<Vec<MediaListItem>>,
    /// The lifecycle status.
    pub status: MessageStatus,
    /// What went wrong, only set when `status` is [`MessageStatus::Error`].
    pub error: Option<String>,
}

impl Message {
    pub(crate) fn user(content: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: ChatRole::User,
            content,
            thinking: None,
            results: None,
            status: MessageStatus::Complete,
            error: None,
        }
    }

    pub(crate) fn assistant_placeholder() -> Self {
        Self {
            id: Uuid::new_v4(),
            role: ChatRole::Assistant,
            content: String::new(),
            thinking: None,
            results: None,
            status: MessageStatus::Streaming,
            error: None,
        }
    }

    /// Returns the message as part of a request, `None` if it shouldn't
    /// be replayed to the server.
    pub(crate) fn to_chat_message(&self) -> Option<ChatMessage> {
        if self.status != MessageStatus::Complete {
            return None;
        }
        if self.content.is_empty() && self.results.is_none() {
            return None;
        }
        Some(ChatMessage {
            role: self.role,
            content: self.content.clone(),
            results: self.results.clone(),
        })
    }
}

/// A snapshot of a session, published after every change.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ConversationState {
    /// The messages, oldest first.
    pub messages: Vec<Message>,
    /// `true` while an answer is streaming.
    pub is_streaming: bool,
    /// The last failure, cleared by the next successful send.
    pub error: Option<String>,
}
