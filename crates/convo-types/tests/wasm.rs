//! WASM-target tests for convo-types.
//!
//! Checks the pieces that touch wasm-specific code paths (uuid via
//! `crypto.getRandomValues`, chrono via `js-sys`) under
//! wasm32-unknown-unknown via `wasm-pack test --node`.

#![cfg(target_arch = "wasm32")]

use wasm_bindgen_test::*;

use convo_types::config::ClientConfig;
use convo_types::conversation::*;
use convo_types::event::ClientEvent;
use convo_types::ids::*;
use convo_types::message::*;

// ─── Message Tests ───────────────────────────────────────

#[wasm_bindgen_test]
fn local_message_ids_are_unique() {
    let a = Message::user("one");
    let b = Message::user("two");
    assert!(a.id().is_local());
    assert_ne!(a.id(), b.id());
}

#[wasm_bindgen_test]
fn message_timestamp_is_recent() {
    let msg = Message::ai("hi", None);
    assert!(msg.timestamp().timestamp() > 1_600_000_000);
    assert!(msg.is_final());
}

#[wasm_bindgen_test]
fn composing_message_grows_then_freezes() {
    let mut msg = Message::ai_composing("Hel");
    msg.mutate_content(|c| c.push_str("lo")).unwrap();
    msg.finalize();
    assert_eq!(msg.content(), "Hello");
    assert!(msg.mutate_content(|c| c.push('!')).is_err());
}

// ─── Wire Tests ──────────────────────────────────────────

#[wasm_bindgen_test]
fn conversation_from_service_payload() {
    let json = r#"{
        "id": 4,
        "title": "Nouvelle conversation",
        "mode": "user_initiated",
        "created_at": "2024-05-01T10:00:00",
        "messages": [
            {"id": 1, "sender": "user", "content": "Hi", "timestamp": "2024-05-01T10:00:01"},
            {"id": 2, "sender": "ai", "content": "Hello", "timestamp": "2024-05-01T10:00:02",
             "suggestions": ["Tell me more"]}
        ]
    }"#;
    let conv: Conversation = serde_json::from_str(json).unwrap();
    assert_eq!(conv.id, ConversationId::from(4));
    assert_eq!(conv.messages().len(), 2);
    assert_eq!(conv.messages()[1].suggestions(), ["Tell me more".to_string()]);
    assert!(conv.has_user_messages());
}

#[wasm_bindgen_test]
fn event_serializes_with_type_tag() {
    let event = ClientEvent::Notice {
        message: "gone".to_string(),
    };
    let json = serde_json::to_string(&event).unwrap();
    assert!(json.contains("\"type\":\"Notice\""));
}

#[wasm_bindgen_test]
fn config_from_partial_json() {
    let config = ClientConfig::from_json(r#"{"service": {"api_base": "https://x.test/"}}"#).unwrap();
    assert_eq!(config.service.base_url(), "https://x.test");
    assert!(config.exchange.prefer_stream);
}
