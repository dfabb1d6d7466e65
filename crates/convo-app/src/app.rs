//! JavaScript-facing handle.
//!
//! Commands return immediately and run on the browser's event loop. The UI
//! polls `snapshot()` and `drain_events()` to render; it never writes to the
//! store directly.

use std::future::Future;
use std::rc::Rc;

use wasm_bindgen::prelude::*;

use convo_core::client::ConversationClient;
use convo_core::dispatcher::ExchangeOutcome;
use convo_core::event_bus::EventBus;
use convo_core::ports::ConversationServicePort;
use convo_platform::http::HttpConversationService;
use convo_types::{
    ClientError, Result,
    config::ClientConfig,
    conversation::Mode,
    event::ClientEvent,
    ids::ConversationId,
};

#[wasm_bindgen]
pub struct ConvoApp {
    client: Rc<ConversationClient>,
    service: Rc<dyn ConversationServicePort>,
}

#[wasm_bindgen]
impl ConvoApp {
    /// `config_json` is an optional JSON `ClientConfig`; missing fields use defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> std::result::Result<ConvoApp, JsValue> {
        let config = match config_json {
            Some(json) => ClientConfig::from_json(&json).map_err(to_js)?,
            None => ClientConfig::default(),
        };
        log::info!("Conversation service at {}", config.service.base_url());

        let service: Rc<dyn ConversationServicePort> =
            Rc::new(HttpConversationService::new(config.service.clone()));
        let client = Rc::new(ConversationClient::new(config, EventBus::new()));
        Ok(Self { client, service })
    }

    pub fn load(&self) {
        self.run("load conversations", |client, service| async move {
            client.load_conversations(service.as_ref()).await.map(|_| ())
        });
    }

    /// `mode` is `"user_initiated"` or `"ai_initiated"`.
    pub fn create(&self, mode: &str) -> std::result::Result<(), JsValue> {
        let mode = parse_mode(mode).map_err(to_js)?;
        self.run("create conversation", move |client, service| async move {
            client
                .create_conversation(service.as_ref(), mode)
                .await
                .map(|_| ())
        });
        Ok(())
    }

    pub fn open(&self, id: String) {
        let id = ConversationId::new(id);
        self.run("open conversation", move |client, service| async move {
            client.open_conversation(service.as_ref(), &id).await.map(|_| ())
        });
    }

    pub fn close(&self) {
        self.client.close_conversation();
    }

    pub fn rename(&self, id: String, title: String) {
        let id = ConversationId::new(id);
        self.run("rename conversation", move |client, service| async move {
            client
                .rename_conversation(service.as_ref(), &id, &title)
                .await
                .map(|_| ())
        });
    }

    pub fn delete(&self, id: String) {
        let id = ConversationId::new(id);
        self.run("delete conversation", move |client, service| async move {
            client.delete_conversation(service.as_ref(), &id).await
        });
    }

    pub fn set_draft(&self, text: String) {
        self.client.set_draft(text);
    }

    /// Send the draft to the active conversation.
    pub fn send(&self) {
        let client = self.client.clone();
        let service = self.service.clone();
        wasm_bindgen_futures::spawn_local(async move {
            let outcome = client.send_draft(service.as_ref()).await;
            log_outcome(&outcome);
        });
    }

    /// Store snapshot as JSON.
    pub fn snapshot(&self) -> std::result::Result<String, JsValue> {
        serde_json::to_string(&self.client.snapshot()).map_err(|e| to_js(e.into()))
    }

    /// Pending client events as a JSON array.
    pub fn drain_events(&self) -> std::result::Result<String, JsValue> {
        serde_json::to_string(&self.client.events().drain()).map_err(|e| to_js(e.into()))
    }
}

impl ConvoApp {
    /// Run a facade call in the background; failures become a notice.
    fn run<F, Fut>(&self, what: &'static str, f: F)
    where
        F: FnOnce(Rc<ConversationClient>, Rc<dyn ConversationServicePort>) -> Fut,
        Fut: Future<Output = Result<()>> + 'static,
    {
        let events = self.client.events().clone();
        let task = f(self.client.clone(), self.service.clone());
        wasm_bindgen_futures::spawn_local(async move {
            if let Err(e) = task.await {
                log::error!("Failed to {}: {}", what, e);
                events.emit(ClientEvent::Notice {
                    message: format!("Could not {}: {}", what, e),
                });
            }
        });
    }
}

pub(crate) fn parse_mode(raw: &str) -> Result<Mode> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .map_err(|_| ClientError::Validation(format!("unknown conversation mode {:?}", raw)))
}

fn log_outcome(outcome: &ExchangeOutcome) {
    match outcome {
        ExchangeOutcome::Failed { error, .. } => log::warn!("Send failed: {}", error),
        ExchangeOutcome::Truncated { error, .. } => log::warn!("Reply truncated: {}", error),
        other => log::debug!("Send finished: {:?}", other),
    }
}

fn to_js(e: ClientError) -> JsValue {
    JsValue::from_str(&e.to_string())
}
