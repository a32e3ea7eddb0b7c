//! The conversation as the client submits it.

use cinescout_catalog::MediaListItem;
use cinescout_model::ModelMessage;
use serde::{Deserialize, Serialize};

/// The maximum number of messages a single request may carry.
pub const MAX_MESSAGES: usize = 20;

/// Who wrote a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// The person using the assistant.
    User,
    /// The assistant.
    Assistant,
}

/// A message from an earlier turn of the conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who wrote the message.
    pub role: ChatRole,
    /// The message text.
    pub content: String,
    /// Titles the assistant recommended in this message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<MediaListItem>>,
}

impl ChatMessage {
    /// Creates a user message.
    #[inline]
    pub fn user<S: Into<String>>(content: S) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            results: None,
        }
    }

    /// Creates an assistant message.
    #[inline]
    pub fn assistant<S: Into<String>>(
        content: S,
        results: Option<Vec<MediaListItem>>,
    ) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            results,
        }
    }

    pub(crate) fn to_model_message(&self) -> ModelMessage {
        match self.role {
            ChatRole::User => ModelMessage::User(self.content.clone()),
            ChatRole::Assistant => {
                let mut text = self.content.clone();
                if let Some(rendered) =
                    self.results.as_deref().and_then(render_results)
                {
                    if !text.is_empty() {
                        text.push_str("\n\n");
                    }
                    text.push_str("Recommended: ");
                    text.push_str(&rendered);
                }
                ModelMessage::Assistant(text)
            }
        }
    }
}

#[derive(Serialize)]
struct CompactItem<'a> {
    id: u64,
    media_type: &'a str,
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    year: Option<u32>,
}

fn render_results(items: &[MediaListItem]) -> Option<String> {
    if items.is_empty() {
        return None;
    }
    let compact = items
        .iter()
        .map(|item| CompactItem {
            id: item.id,
            media_type: item.media_type.as_str(),
            title: &item.title,
            year: item.release_year(),
        })
        .collect::<Vec<_>>();
    serde_json::to_string(&compact).ok()
}

/// The language the user is talking in.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    /// English.
    #[default]
    En,
    /// Simplified Chinese.
    Zh,
}

impl Locale {
    /// Returns the language tag catalog queries are made with.
    #[inline]
    pub fn language_tag(self) -> &'static str {
        match self {
            Locale::En => "en-US",
            Locale::Zh => "zh-CN",
        }
    }

    #[inline]
    pub(crate) fn display_name(self) -> &'static str {
        match self {
            Locale::En => "English",
            Locale::Zh => "Simplified Chinese",
        }
    }
}

/// A request to answer the last message of a conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The whole conversation, oldest first.
    pub messages: Vec<ChatMessage>,
    /// The language to answer in.
    #[serde(default)]
    pub locale: Locale,
}

impl ChatRequest {
    /// Creates a request for `messages` in the default locale.
    #[inline]
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            locale: Locale::default(),
        }
    }

    /// Sets the locale.
    #[inline]
    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }
}
