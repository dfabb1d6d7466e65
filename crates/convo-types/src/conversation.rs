use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ConversationId, MessageId};
use crate::message::{Message, Sender};

/// Who opens the conversation. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    UserInitiated,
    /// The service posts a greeting before the user says anything
    AiInitiated,
}

impl Mode {
    pub fn default_title(&self) -> &'static str {
        match self {
            Mode::UserInitiated => "New conversation",
            Mode::AiInitiated => "AI conversation",
        }
    }

    pub fn all() -> &'static [Mode] {
        &[Mode::UserInitiated, Mode::AiInitiated]
    }
}

/// A conversation as held by the client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub title: String,
    #[serde(default)]
    mode: Mode,
    #[serde(
        default,
        with = "crate::timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new(id: impl Into<ConversationId>, title: impl Into<String>, mode: Mode) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            mode,
            created_at: Some(Utc::now()),
            messages: Vec::new(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message(&self, id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id() == id)
    }

    pub fn message_mut(&mut self, id: &MessageId) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id() == id)
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Append at the end; the timestamp is raised to the previous one if the
    /// clocks disagree.
    pub fn push_message(&mut self, mut message: Message) -> &Message {
        if let Some(prev) = self.messages.last() {
            message.clamp_timestamp(prev.timestamp());
        }
        self.messages.push(message);
        &self.messages[self.messages.len() - 1]
    }

    pub fn has_user_messages(&self) -> bool {
        self.messages.iter().any(|m| m.sender() == Sender::User)
    }

    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            mode: self.mode,
            message_count: self.messages.len(),
            last_message_at: self.messages.last().map(|m| m.timestamp()),
        }
    }
}

/// Display-oriented view of a list entry, derived from the stored conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: ConversationId,
    pub title: String,
    pub mode: Mode,
    pub message_count: usize,
    #[serde(
        default,
        with = "crate::timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_message_at: Option<DateTime<Utc>>,
}

/// Body of `POST /conversations`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewConversation {
    pub title: String,
    pub mode: Mode,
}

impl NewConversation {
    pub fn with_mode(mode: Mode) -> Self {
        Self {
            title: mode.default_title().to_string(),
            mode,
        }
    }
}

/// Body of `POST /conversations/{id}/messages`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
    pub stream: bool,
}

/// One-shot reply payload
#[derive(Debug, Clone, Deserialize)]
pub struct ReplyPayload {
    pub content: String,
    #[serde(default)]
    pub suggestions: Option<Vec<String>>,
}
