//! Conversation store: the client's authoritative in-memory cache.
//!
//! Holds every known conversation in list order plus a pointer to the active
//! one. The active conversation *is* its list entry (the pointer is an id),
//! so a write to one can never leave the other behind.
//!
//! All writes go through [`StoreCommand`]s applied via [`StoreHandle::apply`].
//! The handle never keeps a borrow alive across an await point, so fragment
//! arrivals cannot interleave with reads.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde::Serialize;
use convo_types::{
    ClientError, Result,
    conversation::{Conversation, ConversationSummary},
    ids::{ConversationId, MessageId},
    message::Message,
};

// ─── Exchange bookkeeping ────────────────────────────────────

/// Phase of the send/receive exchange of one conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangePhase {
    #[default]
    Idle,
    AwaitingResponse,
    OneShotReceived,
    Streaming,
    Finalized,
    Failed,
}

impl ExchangePhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, ExchangePhase::Finalized | ExchangePhase::Failed)
    }

    /// An exchange occupies the conversation until it reaches a terminal state.
    pub fn is_in_flight(self) -> bool {
        !self.is_terminal() && self != ExchangePhase::Idle
    }

    pub fn can_advance_to(self, next: ExchangePhase) -> bool {
        use ExchangePhase::*;
        match (self, next) {
            (Idle | Finalized | Failed, AwaitingResponse) => true,
            (AwaitingResponse, OneShotReceived | Streaming | Failed) => true,
            (OneShotReceived | Streaming, Finalized | Failed) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct ExchangeStatus {
    phase: ExchangePhase,
    /// The ai has not produced its first byte yet
    composing: bool,
}

// ─── Commands ────────────────────────────────────────────────

/// Every mutation the store accepts.
#[derive(Debug, Clone)]
pub enum StoreCommand {
    ReplaceSummaries(Vec<Conversation>),
    UpsertSummary(Conversation),
    SetActive(Option<ConversationId>),
    AppendMessage {
        conversation_id: ConversationId,
        message: Message,
    },
    AppendContent {
        conversation_id: ConversationId,
        message_id: MessageId,
        fragment: String,
    },
    FinalizeMessage {
        conversation_id: ConversationId,
        message_id: MessageId,
    },
    RemoveConversation(ConversationId),
    BeginExchange(ConversationId),
    AdvanceExchange {
        conversation_id: ConversationId,
        phase: ExchangePhase,
    },
    SetComposing {
        conversation_id: ConversationId,
        composing: bool,
    },
    SetDraft(String),
}

// ─── Store ───────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct ConversationStore {
    conversations: Vec<Conversation>,
    active: Option<ConversationId>,
    exchanges: HashMap<ConversationId, ExchangeStatus>,
    /// Pending input the user has typed but not sent
    draft: String,
}

/// Serializable view handed to the UI
#[derive(Debug, Clone, Serialize)]
pub struct StoreSnapshot {
    pub conversations: Vec<ConversationSummary>,
    pub active: Option<Conversation>,
    pub loading: bool,
    pub composing: bool,
    pub draft: String,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, cmd: StoreCommand) -> Result<()> {
        match cmd {
            StoreCommand::ReplaceSummaries(list) => {
                self.replace_summaries(list);
                Ok(())
            }
            StoreCommand::UpsertSummary(conv) => {
                self.upsert_summary(conv);
                Ok(())
            }
            StoreCommand::SetActive(id) => self.set_active(id.as_ref()),
            StoreCommand::AppendMessage {
                conversation_id,
                message,
            } => self.append_message(&conversation_id, message).map(|_| ()),
            StoreCommand::AppendContent {
                conversation_id,
                message_id,
                fragment,
            } => self.mutate_message_content(&conversation_id, &message_id, |content| {
                content.push_str(&fragment)
            }),
            StoreCommand::FinalizeMessage {
                conversation_id,
                message_id,
            } => self.finalize_message(&conversation_id, &message_id),
            StoreCommand::RemoveConversation(id) => {
                self.remove_conversation(&id);
                Ok(())
            }
            StoreCommand::BeginExchange(id) => self.begin_exchange(&id),
            StoreCommand::AdvanceExchange {
                conversation_id,
                phase,
            } => self.advance_exchange(&conversation_id, phase),
            StoreCommand::SetComposing {
                conversation_id,
                composing,
            } => {
                self.exchanges.entry(conversation_id).or_default().composing = composing;
                Ok(())
            }
            StoreCommand::SetDraft(text) => {
                self.draft = text;
                Ok(())
            }
        }
    }

    // ── Reads ────────────────────────────────────────────────

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn summaries(&self) -> Vec<ConversationSummary> {
        self.conversations.iter().map(Conversation::summary).collect()
    }

    pub fn conversation(&self, id: &ConversationId) -> Option<&Conversation> {
        self.conversations.iter().find(|c| &c.id == id)
    }

    pub fn contains(&self, id: &ConversationId) -> bool {
        self.conversation(id).is_some()
    }

    pub fn active_id(&self) -> Option<&ConversationId> {
        self.active.as_ref()
    }

    pub fn active(&self) -> Option<&Conversation> {
        self.active.as_ref().and_then(|id| self.conversation(id))
    }

    pub fn exchange_phase(&self, id: &ConversationId) -> ExchangePhase {
        self.exchanges.get(id).map(|s| s.phase).unwrap_or_default()
    }

    pub fn is_loading(&self, id: &ConversationId) -> bool {
        self.exchange_phase(id).is_in_flight()
    }

    pub fn is_composing(&self, id: &ConversationId) -> bool {
        self.exchanges.get(id).is_some_and(|s| s.composing)
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let active = self.active().cloned();
        let (loading, composing) = match &self.active {
            Some(id) => (self.is_loading(id), self.is_composing(id)),
            None => (false, false),
        };
        StoreSnapshot {
            conversations: self.summaries(),
            active,
            loading,
            composing,
            draft: self.draft.clone(),
        }
    }

    // ── Writes ───────────────────────────────────────────────

    /// Replace the list with a fresh copy from the service.
    ///
    /// Conversations with an exchange in flight keep their local messages:
    /// the service copy may not contain the optimistic user message or the
    /// reply that is still arriving.
    pub fn replace_summaries(&mut self, incoming: Vec<Conversation>) {
        let previous = std::mem::take(&mut self.conversations);
        let mut in_flight: Vec<Conversation> = previous
            .into_iter()
            .filter(|c| self.is_loading(&c.id))
            .collect();

        let mut merged = Vec::with_capacity(incoming.len() + in_flight.len());
        for conv in incoming {
            match in_flight.iter().position(|c| c.id == conv.id) {
                Some(i) => {
                    let mut kept = in_flight.remove(i);
                    kept.title = conv.title;
                    merged.push(kept);
                }
                None => merged.push(conv),
            }
        }
        // In flight but unknown to the service listing; the exchange decides its fate.
        // They stay ahead of the reloaded list, in their previous order.
        in_flight.extend(merged);
        self.conversations = in_flight;

        if let Some(id) = &self.active {
            if !self.contains(id) {
                log::debug!("Active conversation {} not in reloaded list", id);
                self.active = None;
            }
        }
    }

    /// Insert a conversation at the head of the list, or replace the entry with
    /// the same id in place.
    pub fn upsert_summary(&mut self, conv: Conversation) {
        let in_flight = self.is_loading(&conv.id);
        match self.conversations.iter().position(|c| c.id == conv.id) {
            Some(i) if in_flight => self.conversations[i].title = conv.title,
            Some(i) => self.conversations[i] = conv,
            None => self.conversations.insert(0, conv),
        }
    }

    pub fn set_active(&mut self, id: Option<&ConversationId>) -> Result<()> {
        match id {
            Some(id) if !self.contains(id) => Err(ClientError::NotFound(format!(
                "conversation {} is not cached",
                id
            ))),
            _ => {
                self.active = id.cloned();
                Ok(())
            }
        }
    }

    pub fn append_message(
        &mut self,
        conversation_id: &ConversationId,
        message: Message,
    ) -> Result<MessageId> {
        let conv = self.conversation_mut(conversation_id)?;
        Ok(conv.push_message(message).id().clone())
    }

    /// Run `f` over the content of a message that is still composing.
    pub fn mutate_message_content<F: FnOnce(&mut String)>(
        &mut self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
        f: F,
    ) -> Result<()> {
        self.message_mut(conversation_id, message_id)?.mutate_content(f)
    }

    /// Idempotent.
    pub fn finalize_message(
        &mut self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
    ) -> Result<()> {
        self.message_mut(conversation_id, message_id)?.finalize();
        Ok(())
    }

    /// Returns whether anything was removed. Clears the active pointer if it
    /// pointed at the removed conversation, and forgets its exchange state.
    pub fn remove_conversation(&mut self, id: &ConversationId) -> bool {
        let before = self.conversations.len();
        self.conversations.retain(|c| &c.id != id);
        self.exchanges.remove(id);
        if self.active.as_ref() == Some(id) {
            self.active = None;
        }
        self.conversations.len() != before
    }

    pub fn begin_exchange(&mut self, id: &ConversationId) -> Result<()> {
        let status = self.exchanges.entry(id.clone()).or_default();
        if status.phase.is_in_flight() {
            return Err(ClientError::ExchangeInFlight(id.to_string()));
        }
        status.phase = ExchangePhase::AwaitingResponse;
        status.composing = true;
        Ok(())
    }

    pub fn advance_exchange(&mut self, id: &ConversationId, next: ExchangePhase) -> Result<()> {
        let status = self.exchanges.get_mut(id).ok_or_else(|| {
            ClientError::InvalidState(format!("no exchange for {} to advance", id))
        })?;
        if !status.phase.can_advance_to(next) {
            return Err(ClientError::InvalidState(format!(
                "exchange for {} cannot go from {:?} to {:?}",
                id, status.phase, next
            )));
        }
        status.phase = next;
        if next.is_terminal() {
            status.composing = false;
        }
        Ok(())
    }

    fn conversation_mut(&mut self, id: &ConversationId) -> Result<&mut Conversation> {
        self.conversations
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| ClientError::NotFound(format!("conversation {} is not cached", id)))
    }

    fn message_mut(
        &mut self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
    ) -> Result<&mut Message> {
        self.conversation_mut(conversation_id)?
            .message_mut(message_id)
            .ok_or_else(|| {
                ClientError::NotFound(format!(
                    "message {} in conversation {}",
                    message_id, conversation_id
                ))
            })
    }
}

// ─── Shared handle ───────────────────────────────────────────

/// Clone-cheap handle to the single store instance.
///
/// `apply` is the only way to write. `read` hands out a shared borrow for the
/// duration of a closure, so callers cannot hold it across an await.
#[derive(Clone, Default)]
pub struct StoreHandle {
    inner: Rc<RefCell<ConversationStore>>,
}

impl StoreHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&self, cmd: StoreCommand) -> Result<()> {
        self.inner.borrow_mut().apply(cmd)
    }

    /// Apply several commands as one logical step: no reader can run between them.
    pub fn apply_all<I: IntoIterator<Item = StoreCommand>>(&self, cmds: I) -> Result<()> {
        let mut store = self.inner.borrow_mut();
        for cmd in cmds {
            store.apply(cmd)?;
        }
        Ok(())
    }

    pub fn read<R>(&self, f: impl FnOnce(&ConversationStore) -> R) -> R {
        f(&self.inner.borrow())
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.read(ConversationStore::snapshot)
    }
}
