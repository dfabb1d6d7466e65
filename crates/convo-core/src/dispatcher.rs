//! Message dispatcher: runs one send/receive exchange end to end.
//!
//! 1. Append the user message optimistically and mark the conversation loading
//! 2. Send it to the service, asking for a streamed reply
//! 3. Decide once, from the declared content type, whether the reply is
//!    one-shot JSON or a text stream
//! 4. Grow a single ai message from the stream, or create it whole
//! 5. Finalize and clear loading
//!
//! Failures never escape: they end up as a purged conversation, a cleared
//! loading flag, or a retained partial reply.

use futures::StreamExt;
use convo_types::{
    ClientError, Result,
    config::ExchangeConfig,
    conversation::{ReplyPayload, SendMessageRequest},
    event::ClientEvent,
    ids::{ConversationId, MessageId},
    message::Message,
};
use crate::decoder::StreamDecoder;
use crate::event_bus::EventBus;
use crate::ports::{ByteStream, ConversationServicePort, ReplyResponse};
use crate::store::{ExchangePhase, StoreCommand, StoreHandle};

/// The reply protocol, decided once per exchange.
pub enum Reply {
    OneShot(ReplyPayload),
    Streamed(StreamDecoder<ByteStream>),
}

impl Reply {
    /// Pick the protocol from the declared content type. A JSON body is read
    /// to the end and parsed here; anything else is handed to the decoder.
    pub async fn negotiate(response: ReplyResponse) -> Result<Reply> {
        if !is_json(response.content_type.as_deref()) {
            return Ok(Reply::Streamed(StreamDecoder::new(response.body)));
        }

        let mut body = Vec::new();
        let mut chunks = response.body;
        while let Some(chunk) = chunks.next().await {
            body.extend_from_slice(&chunk?);
        }
        let payload: ReplyPayload = serde_json::from_slice(&body)
            .map_err(|e| ClientError::Decode(format!("one-shot reply: {}", e)))?;
        Ok(Reply::OneShot(payload))
    }
}

/// `application/json` or any `+json` type, parameters ignored.
pub fn is_json(content_type: Option<&str>) -> bool {
    let Some(ct) = content_type else {
        return false;
    };
    let essence = ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    essence == "application/json" || essence.ends_with("+json")
}

/// How an exchange ended, as seen by the caller.
#[derive(Debug, Clone)]
pub enum ExchangeOutcome {
    /// Blank input or a conversation that is not active: nothing happened
    Ignored,
    /// An exchange is already in flight for this conversation
    Busy,
    /// The reply arrived in full
    Completed { reply_id: MessageId },
    /// The reply stream broke off with undecodable bytes; what arrived is kept
    Truncated { reply_id: MessageId, error: ClientError },
    /// The exchange failed; the user message and any partial reply are kept
    Failed {
        error: ClientError,
        partial_reply: Option<MessageId>,
    },
    /// The service no longer knows the conversation; it was purged locally
    ConversationGone,
}

pub struct MessageDispatcher {
    store: StoreHandle,
    events: EventBus,
    config: ExchangeConfig,
}

impl MessageDispatcher {
    pub fn new(store: StoreHandle, events: EventBus, config: ExchangeConfig) -> Self {
        Self {
            store,
            events,
            config,
        }
    }

    /// Run one exchange for `conversation_id`.
    ///
    /// The exchange stays bound to that id: fragments are written there even
    /// if another conversation becomes active while they arrive.
    pub async fn send_user_message(
        &self,
        service: &dyn ConversationServicePort,
        conversation_id: &ConversationId,
        text: &str,
    ) -> ExchangeOutcome {
        let text = text.trim();
        if text.is_empty() {
            log::debug!("Ignoring blank message for {}", conversation_id);
            return ExchangeOutcome::Ignored;
        }
        if self.store.read(|s| s.active_id() != Some(conversation_id)) {
            log::warn!("Ignoring send to inactive conversation {}", conversation_id);
            return ExchangeOutcome::Ignored;
        }

        let user_message_id = match self.begin(conversation_id, text) {
            Ok(id) => id,
            Err(ClientError::ExchangeInFlight(_)) => {
                log::debug!("Exchange already running for {}", conversation_id);
                return ExchangeOutcome::Busy;
            }
            Err(e) => return self.fail(conversation_id, e, None),
        };
        self.events.emit(ClientEvent::ExchangeStarted {
            conversation_id: conversation_id.clone(),
            user_message_id,
        });

        let req = SendMessageRequest {
            content: text.to_string(),
            stream: self.config.prefer_stream,
        };
        let response = match service.send_message(conversation_id, req).await {
            Ok(r) => r,
            Err(e) => return self.fail(conversation_id, e, None),
        };

        match Reply::negotiate(response).await {
            Ok(Reply::OneShot(payload)) => self.receive_one_shot(conversation_id, payload),
            Ok(Reply::Streamed(decoder)) => self.receive_stream(conversation_id, decoder).await,
            Err(e) => self.fail(conversation_id, e, None),
        }
    }

    /// Optimistic step: loading on, user message in, draft cleared.
    fn begin(&self, conversation_id: &ConversationId, text: &str) -> Result<MessageId> {
        self.store
            .apply(StoreCommand::BeginExchange(conversation_id.clone()))?;

        let message = Message::user(text);
        let id = message.id().clone();
        self.store.apply_all([
            StoreCommand::AppendMessage {
                conversation_id: conversation_id.clone(),
                message,
            },
            StoreCommand::SetDraft(String::new()),
        ])?;
        log::debug!("Exchange {}: Idle -> AwaitingResponse", conversation_id);
        Ok(id)
    }

    fn receive_one_shot(
        &self,
        conversation_id: &ConversationId,
        payload: ReplyPayload,
    ) -> ExchangeOutcome {
        let reply = Message::ai(payload.content, payload.suggestions);
        let reply_id = reply.id().clone();

        // One step: no reader sees the exchange between received and finalized
        let applied = self.store.apply_all([
            advance(conversation_id, ExchangePhase::OneShotReceived),
            StoreCommand::AppendMessage {
                conversation_id: conversation_id.clone(),
                message: reply,
            },
            advance(conversation_id, ExchangePhase::Finalized),
        ]);
        if let Err(e) = applied {
            return self.fail(conversation_id, e, None);
        }

        log::debug!("Exchange {}: one-shot reply finalized", conversation_id);
        self.events.emit(ClientEvent::ReplyFinalized {
            conversation_id: conversation_id.clone(),
            message_id: reply_id.clone(),
        });
        self.end(conversation_id, false);
        ExchangeOutcome::Completed { reply_id }
    }

    async fn receive_stream(
        &self,
        conversation_id: &ConversationId,
        mut decoder: StreamDecoder<ByteStream>,
    ) -> ExchangeOutcome {
        if let Err(e) = self.store.apply(advance(conversation_id, ExchangePhase::Streaming)) {
            return self.fail(conversation_id, e, None);
        }
        log::debug!("Exchange {}: AwaitingResponse -> Streaming", conversation_id);

        let mut reply_id: Option<MessageId> = None;
        let mut stream_error: Option<ClientError> = None;

        while let Some(item) = decoder.next().await {
            let fragment = match item {
                Ok(f) => f,
                Err(e) => {
                    stream_error = Some(e);
                    break;
                }
            };
            if let Err(e) = self.apply_fragment(conversation_id, &mut reply_id, &fragment) {
                // The conversation left the store mid-stream; drop the rest
                return self.fail(conversation_id, e, reply_id);
            }
        }

        match stream_error {
            Some(e) if e.is_transport() => {
                if let Some(id) = &reply_id {
                    if let Err(gone) = self.finalize_reply(conversation_id, id) {
                        return self.fail(conversation_id, gone, reply_id);
                    }
                }
                self.fail(conversation_id, e, reply_id)
            }
            other => {
                let reply_id = match reply_id {
                    Some(id) => id,
                    None => match self.append_empty_reply(conversation_id) {
                        Ok(id) => id,
                        Err(e) => return self.fail(conversation_id, e, None),
                    },
                };
                if let Err(e) = self.finalize_reply(conversation_id, &reply_id) {
                    return self.fail(conversation_id, e, Some(reply_id));
                }
                if let Err(e) = self
                    .store
                    .apply(advance(conversation_id, ExchangePhase::Finalized))
                {
                    log::warn!("Exchange {}: {}", conversation_id, e);
                }
                self.end(conversation_id, false);
                match other {
                    Some(error) => {
                        log::warn!(
                            "Exchange {}: reply truncated after {} fragments: {}",
                            conversation_id,
                            decoder.fragments_yielded(),
                            error
                        );
                        ExchangeOutcome::Truncated { reply_id, error }
                    }
                    None => {
                        log::debug!(
                            "Exchange {}: stream finished after {} fragments",
                            conversation_id,
                            decoder.fragments_yielded()
                        );
                        ExchangeOutcome::Completed { reply_id }
                    }
                }
            }
        }
    }

    /// First fragment creates the reply; later ones grow it in place.
    fn apply_fragment(
        &self,
        conversation_id: &ConversationId,
        reply_id: &mut Option<MessageId>,
        fragment: &str,
    ) -> Result<()> {
        let message_id = match reply_id {
            Some(id) => {
                self.store.apply(StoreCommand::AppendContent {
                    conversation_id: conversation_id.clone(),
                    message_id: id.clone(),
                    fragment: fragment.to_string(),
                })?;
                id.clone()
            }
            None => {
                let message = Message::ai_composing(fragment);
                let id = message.id().clone();
                self.store.apply_all([
                    StoreCommand::AppendMessage {
                        conversation_id: conversation_id.clone(),
                        message,
                    },
                    StoreCommand::SetComposing {
                        conversation_id: conversation_id.clone(),
                        composing: false,
                    },
                ])?;
                self.events.emit(ClientEvent::ReplyStarted {
                    conversation_id: conversation_id.clone(),
                    message_id: id.clone(),
                });
                *reply_id = Some(id.clone());
                id
            }
        };
        self.events.emit(ClientEvent::ReplyDelta {
            conversation_id: conversation_id.clone(),
            message_id,
            fragment: fragment.to_string(),
        });
        Ok(())
    }

    /// A stream that closed without a byte still counts as one reply.
    fn append_empty_reply(&self, conversation_id: &ConversationId) -> Result<MessageId> {
        let message = Message::ai(String::new(), None);
        let id = message.id().clone();
        self.store.apply(StoreCommand::AppendMessage {
            conversation_id: conversation_id.clone(),
            message,
        })?;
        Ok(id)
    }

    /// Fails if the conversation left the store while the reply was arriving.
    fn finalize_reply(&self, conversation_id: &ConversationId, message_id: &MessageId) -> Result<()> {
        self.store.apply(StoreCommand::FinalizeMessage {
            conversation_id: conversation_id.clone(),
            message_id: message_id.clone(),
        })?;
        self.events.emit(ClientEvent::ReplyFinalized {
            conversation_id: conversation_id.clone(),
            message_id: message_id.clone(),
        });
        Ok(())
    }

    fn fail(
        &self,
        conversation_id: &ConversationId,
        error: ClientError,
        partial_reply: Option<MessageId>,
    ) -> ExchangeOutcome {
        if let Err(e) = self
            .store
            .apply(advance(conversation_id, ExchangePhase::Failed))
        {
            log::debug!("Exchange {}: {}", conversation_id, e);
        }

        if error.is_not_found() {
            log::warn!("Conversation {} vanished on the service", conversation_id);
            purge_missing_conversation(&self.store, &self.events, conversation_id);
            self.end(conversation_id, true);
            return ExchangeOutcome::ConversationGone;
        }

        log::warn!("Exchange {} failed: {}", conversation_id, error);
        self.end(conversation_id, true);
        ExchangeOutcome::Failed {
            error,
            partial_reply,
        }
    }

    fn end(&self, conversation_id: &ConversationId, failed: bool) {
        self.events.emit(ClientEvent::ExchangeEnded {
            conversation_id: conversation_id.clone(),
            failed,
        });
    }
}

fn advance(conversation_id: &ConversationId, phase: ExchangePhase) -> StoreCommand {
    StoreCommand::AdvanceExchange {
        conversation_id: conversation_id.clone(),
        phase,
    }
}

/// Drop a conversation the service no longer has and tell the user once.
/// Returns whether it was still cached.
pub(crate) fn purge_missing_conversation(
    store: &StoreHandle,
    events: &EventBus,
    conversation_id: &ConversationId,
) -> bool {
    let was_active = store.read(|s| s.active_id() == Some(conversation_id));
    let removed = store.read(|s| s.contains(conversation_id))
        && store
            .apply(StoreCommand::RemoveConversation(conversation_id.clone()))
            .is_ok();
    if !removed {
        return false;
    }

    events.emit(ClientEvent::ConversationRemoved {
        conversation_id: conversation_id.clone(),
    });
    if was_active {
        events.emit(ClientEvent::ActiveChanged {
            conversation_id: None,
        });
    }
    events.emit(ClientEvent::Notice {
        message: "This conversation no longer exists and was removed.".to_string(),
    });
    true
}
