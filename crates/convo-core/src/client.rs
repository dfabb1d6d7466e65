//! Conversation client, the facade the UI talks to.
//!
//! Owns the store handle, the event bus, and the dispatcher. The service port
//! is passed to every async operation rather than stored, so the same client
//! runs against the HTTP adapter in the browser and against mocks in tests.

use convo_types::{
    ClientError, Result,
    config::ClientConfig,
    conversation::{Mode, NewConversation},
    event::ClientEvent,
    ids::ConversationId,
};
use crate::dispatcher::{purge_missing_conversation, ExchangeOutcome, MessageDispatcher};
use crate::event_bus::EventBus;
use crate::ports::ConversationServicePort;
use crate::store::{StoreCommand, StoreHandle, StoreSnapshot};

pub struct ConversationClient {
    config: ClientConfig,
    store: StoreHandle,
    events: EventBus,
    dispatcher: MessageDispatcher,
}

impl ConversationClient {
    pub fn new(config: ClientConfig, events: EventBus) -> Self {
        let store = StoreHandle::new();
        let dispatcher =
            MessageDispatcher::new(store.clone(), events.clone(), config.exchange.clone());
        Self {
            config,
            store,
            events,
            dispatcher,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.store.snapshot()
    }

    /// Reload the conversation list. Returns how many conversations the service listed.
    pub async fn load_conversations(&self, service: &dyn ConversationServicePort) -> Result<usize> {
        let list = service.list_conversations().await?;
        let count = list.len();
        let active_before = self.store.read(|s| s.active_id().cloned());
        self.store.apply(StoreCommand::ReplaceSummaries(list))?;

        log::info!("Loaded {} conversations from {}", count, service.backend_name());
        self.events.emit(ClientEvent::ConversationsLoaded { count });
        let active_after = self.store.read(|s| s.active_id().cloned());
        if active_before != active_after {
            self.events.emit(ClientEvent::ActiveChanged {
                conversation_id: active_after,
            });
        }
        Ok(count)
    }

    /// Create a conversation and make it active.
    ///
    /// An active conversation the user never wrote in is superseded: it is
    /// deleted on the service and dropped from the list first. If the service
    /// refuses the delete, the old conversation stays listed.
    pub async fn create_conversation(
        &self,
        service: &dyn ConversationServicePort,
        mode: Mode,
    ) -> Result<ConversationId> {
        if let Some(stale) = self.superseded_conversation() {
            log::info!("Cleaning up unused conversation {}", stale);
            match service.delete_conversation(&stale).await {
                Ok(()) => self.remove_locally(&stale),
                Err(e) if e.is_not_found() => self.remove_locally(&stale),
                // Still on the service, so it stays in the list
                Err(e) => log::warn!("Cleanup of {} failed on the service: {}", stale, e),
            }
        }

        let conv = service
            .create_conversation(NewConversation::with_mode(mode))
            .await?;
        let id = conv.id.clone();
        self.store.apply_all([
            StoreCommand::UpsertSummary(conv),
            StoreCommand::SetActive(Some(id.clone())),
        ])?;
        log::info!("Created conversation {} ({:?})", id, mode);
        self.events.emit(ClientEvent::ActiveChanged {
            conversation_id: Some(id.clone()),
        });
        Ok(id)
    }

    /// Fetch a conversation in full and make it active.
    /// Returns `false` if the service no longer has it (it is purged locally).
    pub async fn open_conversation(
        &self,
        service: &dyn ConversationServicePort,
        id: &ConversationId,
    ) -> Result<bool> {
        match service.fetch_conversation(id).await {
            Ok(conv) => {
                self.store.apply_all([
                    StoreCommand::UpsertSummary(conv),
                    StoreCommand::SetActive(Some(id.clone())),
                ])?;
                self.events.emit(ClientEvent::ActiveChanged {
                    conversation_id: Some(id.clone()),
                });
                Ok(true)
            }
            Err(e) if e.is_not_found() => {
                purge_missing_conversation(&self.store, &self.events, id);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Deselect the active conversation without touching the list.
    pub fn close_conversation(&self) {
        if self.store.read(|s| s.active_id().is_some()) {
            // Setting None cannot fail
            let _ = self.store.apply(StoreCommand::SetActive(None));
            self.events.emit(ClientEvent::ActiveChanged {
                conversation_id: None,
            });
        }
    }

    /// Rename on the service and mirror the result.
    /// Returns `false` if the service no longer has the conversation.
    pub async fn rename_conversation(
        &self,
        service: &dyn ConversationServicePort,
        id: &ConversationId,
        title: &str,
    ) -> Result<bool> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ClientError::Validation("title must not be blank".to_string()));
        }

        match service.rename_conversation(id, title).await {
            Ok(updated) => {
                self.store.apply(StoreCommand::UpsertSummary(updated))?;
                Ok(true)
            }
            Err(e) if e.is_not_found() => {
                purge_missing_conversation(&self.store, &self.events, id);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Delete on the service, then locally. Deleting twice is fine.
    pub async fn delete_conversation(
        &self,
        service: &dyn ConversationServicePort,
        id: &ConversationId,
    ) -> Result<()> {
        match service.delete_conversation(id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
        self.remove_locally(id);
        Ok(())
    }

    pub fn set_draft(&self, text: impl Into<String>) {
        let _ = self.store.apply(StoreCommand::SetDraft(text.into()));
    }

    pub fn draft(&self) -> String {
        self.store.read(|s| s.draft().to_string())
    }

    /// Send `text` to `conversation_id`. See [`MessageDispatcher::send_user_message`].
    pub async fn send_message(
        &self,
        service: &dyn ConversationServicePort,
        conversation_id: &ConversationId,
        text: &str,
    ) -> ExchangeOutcome {
        self.dispatcher
            .send_user_message(service, conversation_id, text)
            .await
    }

    /// Send whatever is in the draft to the active conversation.
    pub async fn send_draft(&self, service: &dyn ConversationServicePort) -> ExchangeOutcome {
        let (active, draft) = self.store.read(|s| (s.active_id().cloned(), s.draft().to_string()));
        match active {
            Some(id) => self.send_message(service, &id, &draft).await,
            None => ExchangeOutcome::Ignored,
        }
    }

    /// The active conversation, if it holds no user message and nothing is in flight.
    fn superseded_conversation(&self) -> Option<ConversationId> {
        self.store.read(|s| {
            let active = s.active()?;
            let unused = !active.has_user_messages() && !s.is_loading(&active.id);
            unused.then(|| active.id.clone())
        })
    }

    fn remove_locally(&self, id: &ConversationId) {
        let was_active = self.store.read(|s| s.active_id() == Some(id));
        let removed = self.store.read(|s| s.contains(id))
            && self
                .store
                .apply(StoreCommand::RemoveConversation(id.clone()))
                .is_ok();
        if removed {
            self.events.emit(ClientEvent::ConversationRemoved {
                conversation_id: id.clone(),
            });
        }
        if was_active {
            self.events.emit(ClientEvent::ActiveChanged {
                conversation_id: None,
            });
        }
    }
}
