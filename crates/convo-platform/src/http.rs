//! Conversation service adapter over browser `fetch()` via gloo-net.

use async_trait::async_trait;
use gloo_net::http::{Request, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use convo_core::ports::*;
use convo_types::{
    ClientError, Result,
    config::ServiceConfig,
    conversation::{Conversation, NewConversation, SendMessageRequest},
    ids::ConversationId,
};
use crate::{body, routes};

/// Talks to the conversation service's REST API.
pub struct HttpConversationService {
    config: ServiceConfig,
}

impl HttpConversationService {
    pub fn new(config: ServiceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Attach the pass-through headers intermediaries require.
    fn prepare(&self, mut builder: RequestBuilder) -> RequestBuilder {
        for h in &self.config.pass_through_headers {
            builder = builder.header(&h.name, &h.value);
        }
        builder
    }
}

#[async_trait(?Send)]
impl ConversationServicePort for HttpConversationService {
    async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        let url = routes::list_url(&self.config);
        let response = self
            .prepare(Request::get(&url))
            .send()
            .await
            .map_err(network)?;
        let response = ensure_ok(response, "conversation list").await?;
        parse(response).await
    }

    async fn create_conversation(&self, req: NewConversation) -> Result<Conversation> {
        let url = routes::collection_url(&self.config);
        let response = self
            .prepare(Request::post(&url))
            .json(&req)
            .map_err(network)?
            .send()
            .await
            .map_err(network)?;
        let response = ensure_ok(response, "new conversation").await?;
        parse(response).await
    }

    async fn fetch_conversation(&self, id: &ConversationId) -> Result<Conversation> {
        let url = routes::conversation_url(&self.config, id);
        let response = self
            .prepare(Request::get(&url))
            .send()
            .await
            .map_err(network)?;
        let response = ensure_ok(response, &subject(id)).await?;
        parse(response).await
    }

    async fn rename_conversation(&self, id: &ConversationId, title: &str) -> Result<Conversation> {
        let url = routes::rename_url(&self.config, id, title);
        let response = self
            .prepare(Request::patch(&url))
            .send()
            .await
            .map_err(network)?;
        let response = ensure_ok(response, &subject(id)).await?;
        parse(response).await
    }

    async fn delete_conversation(&self, id: &ConversationId) -> Result<()> {
        let url = routes::conversation_url(&self.config, id);
        let response = self
            .prepare(Request::delete(&url))
            .send()
            .await
            .map_err(network)?;
        match ensure_ok(response, &subject(id)).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                log::debug!("Delete of {}: already gone", id);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn send_message(
        &self,
        id: &ConversationId,
        req: SendMessageRequest,
    ) -> Result<ReplyResponse> {
        let url = routes::messages_url(&self.config, id);
        let response = self
            .prepare(Request::post(&url))
            .json(&req)
            .map_err(network)?
            .send()
            .await
            .map_err(network)?;
        let response = ensure_ok(response, &subject(id)).await?;

        let content_type = response.headers().get("content-type");
        log::debug!(
            "Reply for {}: HTTP {} ({})",
            id,
            response.status(),
            content_type.as_deref().unwrap_or("no content type")
        );
        let body = match response.body() {
            Some(stream) => body::byte_stream(stream),
            None => body::empty(),
        };
        Ok(ReplyResponse::new(content_type, body))
    }

    fn backend_name(&self) -> &str {
        "http"
    }
}

fn network(e: gloo_net::Error) -> ClientError {
    ClientError::Network(e.to_string())
}

fn subject(id: &ConversationId) -> String {
    format!("conversation {}", id)
}

async fn ensure_ok(response: Response, subject: &str) -> Result<Response> {
    if response.ok() {
        return Ok(response);
    }
    let status = response.status();
    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string());
    log::warn!("{}: HTTP {}", subject, status);
    Err(routes::status_error(status, subject, text))
}

async fn parse<T: DeserializeOwned>(response: Response) -> Result<T> {
    response
        .json()
        .await
        .map_err(|e| ClientError::Serialization(e.to_string()))
}
