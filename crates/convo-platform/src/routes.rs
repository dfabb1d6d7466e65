//! URL building and status mapping for the conversation service.

use convo_types::{ClientError, config::ServiceConfig, ids::ConversationId};

/// `GET /conversations?skip=0&limit=N`
pub fn list_url(config: &ServiceConfig) -> String {
    format!(
        "{}?skip=0&limit={}",
        collection_url(config),
        config.list_limit
    )
}

pub fn collection_url(config: &ServiceConfig) -> String {
    format!("{}/conversations", config.base_url())
}

pub fn conversation_url(config: &ServiceConfig, id: &ConversationId) -> String {
    format!(
        "{}/{}",
        collection_url(config),
        urlencoding::encode(id.as_str())
    )
}

/// The title travels as a query parameter, not in the body.
pub fn rename_url(config: &ServiceConfig, id: &ConversationId, title: &str) -> String {
    format!(
        "{}?title={}",
        conversation_url(config, id),
        urlencoding::encode(title)
    )
}

pub fn messages_url(config: &ServiceConfig, id: &ConversationId) -> String {
    format!("{}/messages", conversation_url(config, id))
}

/// Map a non-2xx status. 404 means the conversation is gone.
pub fn status_error(status: u16, subject: &str, body: String) -> ClientError {
    match status {
        404 => ClientError::NotFound(subject.to_string()),
        _ => ClientError::Http { status, body },
    }
}
