use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::MessageId;
use crate::{ClientError, Result};

/// Who wrote a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
}

/// Whether an ai message may still grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageState {
    Composing,
    #[default]
    Final,
}

/// A single message in a conversation.
///
/// `sender` and `timestamp` are fixed at construction. `content` can only be
/// appended to while the message is still composing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    sender: Sender,
    content: String,
    #[serde(with = "crate::timestamp")]
    timestamp: DateTime<Utc>,
    /// Follow-up prompts offered by the service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    suggestions: Option<Vec<String>>,
    /// Messages coming off the wire are always complete.
    #[serde(skip)]
    state: MessageState,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: MessageId::local(),
            sender: Sender::User,
            content: text.into(),
            timestamp: Utc::now(),
            suggestions: None,
            state: MessageState::Final,
        }
    }

    /// A complete ai reply, created in one step.
    pub fn ai(content: impl Into<String>, suggestions: Option<Vec<String>>) -> Self {
        Self {
            id: MessageId::local(),
            sender: Sender::Ai,
            content: content.into(),
            timestamp: Utc::now(),
            suggestions,
            state: MessageState::Final,
        }
    }

    /// An ai reply that will keep growing until finalized.
    pub fn ai_composing(first_fragment: impl Into<String>) -> Self {
        Self {
            state: MessageState::Composing,
            ..Self::ai(first_fragment, None)
        }
    }

    /// Rebuild a message with explicit fields, e.g. from a service payload.
    pub fn from_parts(
        id: MessageId,
        sender: Sender,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            sender,
            content: content.into(),
            timestamp,
            suggestions: None,
            state: MessageState::Final,
        }
    }

    pub fn id(&self) -> &MessageId {
        &self.id
    }

    pub fn sender(&self) -> Sender {
        self.sender
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn suggestions(&self) -> &[String] {
        self.suggestions.as_deref().unwrap_or_default()
    }

    pub fn state(&self) -> MessageState {
        self.state
    }

    pub fn is_final(&self) -> bool {
        self.state == MessageState::Final
    }

    /// Apply `f` to the content of a composing message.
    pub fn mutate_content<F: FnOnce(&mut String)>(&mut self, f: F) -> Result<()> {
        if self.is_final() {
            return Err(ClientError::InvalidState(format!(
                "message {} is finalized",
                self.id
            )));
        }
        f(&mut self.content);
        Ok(())
    }

    /// Mark the content complete. Idempotent.
    pub fn finalize(&mut self) {
        self.state = MessageState::Final;
    }

    /// Keep storage order and timestamp order in agreement.
    pub(crate) fn clamp_timestamp(&mut self, not_before: DateTime<Utc>) {
        if self.timestamp < not_before {
            self.timestamp = not_before;
        }
    }
}
