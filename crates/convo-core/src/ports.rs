//! Port traits at the hexagonal architecture boundary.
//!
//! The service port is defined here in `convo-core` (pure Rust).
//! The HTTP implementation lives in `convo-platform`.
//! The core never imports platform code; it only depends on this trait.

use std::pin::Pin;
use async_trait::async_trait;
use futures::Stream;
use convo_types::{
    Result,
    conversation::{Conversation, NewConversation, SendMessageRequest},
    ids::ConversationId,
};

/// Raw response body, delivered chunk by chunk as it arrives.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>>>>;

/// Response to a send-message request, before protocol negotiation.
pub struct ReplyResponse {
    /// Declared content type, if the service sent one
    pub content_type: Option<String>,
    pub body: ByteStream,
}

impl ReplyResponse {
    pub fn new(content_type: Option<String>, body: ByteStream) -> Self {
        Self { content_type, body }
    }
}

// ─── Conversation Service Port ───────────────────────────────

/// The remote conversation service.
///
/// Implementations map a missing conversation to `ClientError::NotFound`
/// and transport failures to `ClientError::Network`.
#[async_trait(?Send)]
pub trait ConversationServicePort {
    /// `GET /conversations`
    async fn list_conversations(&self) -> Result<Vec<Conversation>>;

    /// `POST /conversations`
    async fn create_conversation(&self, req: NewConversation) -> Result<Conversation>;

    /// `GET /conversations/{id}`
    async fn fetch_conversation(&self, id: &ConversationId) -> Result<Conversation>;

    /// `PATCH /conversations/{id}?title=...`
    async fn rename_conversation(&self, id: &ConversationId, title: &str) -> Result<Conversation>;

    /// `DELETE /conversations/{id}`. An already-deleted conversation may
    /// report `NotFound`; callers treat that as success.
    async fn delete_conversation(&self, id: &ConversationId) -> Result<()>;

    /// `POST /conversations/{id}/messages`
    async fn send_message(
        &self,
        id: &ConversationId,
        req: SendMessageRequest,
    ) -> Result<ReplyResponse>;

    /// Name of this backend (for logging/debug)
    fn backend_name(&self) -> &str;
}
