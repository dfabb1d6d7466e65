//! Browser adapters for convo-core.
//!
//! `HttpConversationService` implements the service port over `fetch`
//! (gloo-net). Streamed reply bodies are read from the response's
//! `ReadableStream` chunk by chunk.

pub mod body;
pub mod http;
pub mod routes;
