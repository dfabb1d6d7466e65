use serde::{Deserialize, Serialize};

use crate::ids::{ConversationId, MessageId};

/// Events emitted by the client core.
/// The UI drains these for reactive updates; it never writes back through them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// The conversation list was (re)loaded
    ConversationsLoaded { count: usize },

    /// A conversation became the active one (or none did)
    ActiveChanged { conversation_id: Option<ConversationId> },

    /// A conversation left the local cache
    ConversationRemoved { conversation_id: ConversationId },

    /// A user message was appended optimistically and the request is on its way
    ExchangeStarted {
        conversation_id: ConversationId,
        user_message_id: MessageId,
    },

    /// The first byte of the reply arrived; the ai is no longer composing
    ReplyStarted {
        conversation_id: ConversationId,
        message_id: MessageId,
    },

    /// A streamed fragment was appended to the reply
    ReplyDelta {
        conversation_id: ConversationId,
        message_id: MessageId,
        fragment: String,
    },

    /// The reply is complete and immutable
    ReplyFinalized {
        conversation_id: ConversationId,
        message_id: MessageId,
    },

    /// The exchange reached a terminal state; loading is over
    ExchangeEnded {
        conversation_id: ConversationId,
        failed: bool,
    },

    /// One-time notice the user should see
    Notice { message: String },
}
