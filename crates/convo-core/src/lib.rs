//! Conversation client core.
//!
//! Keeps the local conversation cache in step with the remote service:
//! optimistic sends, one-shot or streamed replies, and recovery when a
//! conversation disappears server-side. No platform code lives here.

pub mod client;
pub mod decoder;
pub mod dispatcher;
pub mod event_bus;
pub mod ports;
pub mod store;
