//! Streaming exchange engine.
//!
//! Drives one request/response exchange with the remote chat service and
//! feeds decoded stream records into the [`Conversation`] store. The engine
//! suspends at two points: awaiting the response headers and awaiting each
//! stream event. Exactly one exchange is in flight at a time; a `send` issued
//! while another is outstanding is rejected, and serializing sends is the
//! caller's job.

use std::time::Duration;

use futures::StreamExt;
use reqwest_eventsource::{Event, EventSource};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{
    conversation::Conversation,
    error::{Error, Result},
    events::EngineEvent,
    wire::{self, ConversationRequest, StreamRecord},
};

/// Default conversation endpoint of the remote service
pub const DEFAULT_ENDPOINT: &str = "https://chat.openai.com/backend-api/conversation";

/// Referrer metadata the service expects alongside the request
const REFERER: &str = "https://chat.openai.com/chat";

/// Default model identifier sent with every request
pub const DEFAULT_MODEL: &str = "text-davinci-002-render";

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Conversation endpoint URL
    pub endpoint: String,
    /// Model identifier sent with every request
    pub model: String,
    /// Bearer credential for the service
    pub token: String,
    /// How long to wait between stream events before treating the
    /// connection as stalled
    pub idle_timeout: Duration,
}

impl EngineConfig {
    /// Create a config with the default endpoint and model
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            token: token.into(),
            idle_timeout: Duration::from_secs(90),
        }
    }

    /// Override the model identifier
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the conversation endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

/// Where the current exchange stands. `Completed` and `TransportFailed`
/// collapse back to `Idle` when `send` returns; the machine only exists for
/// the duration of one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    /// No exchange in flight
    Idle,
    /// Request issued, awaiting response headers
    Sending,
    /// Response open, decoding stream records
    StreamOpen,
}

/// The streaming exchange engine: owns the conversation store and the
/// protocol conversation with the remote service.
pub struct Engine {
    config: EngineConfig,
    client: reqwest::Client,
    conversation: Conversation,
    state: ExchangeState,
    event_tx: broadcast::Sender<EngineEvent>,
}

impl Engine {
    /// Create a new engine with an empty conversation
    pub fn new(config: EngineConfig) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            config,
            client: reqwest::Client::new(),
            conversation: Conversation::new(),
            state: ExchangeState::Idle,
            event_tx,
        }
    }

    /// Subscribe to engine events for incremental rendering
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.event_tx.subscribe()
    }

    /// Read access to the conversation for rendering
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Current exchange state
    pub fn state(&self) -> ExchangeState {
        self.state
    }

    /// Check if an exchange is currently in flight
    pub fn is_busy(&self) -> bool {
        self.state != ExchangeState::Idle
    }

    /// Send one user message and decode the streamed reply into the store.
    ///
    /// Returns the outgoing message id of the turn this created. The turn
    /// exists in the store even when the transport fails; it just keeps
    /// empty received fields. `AuthExpired` and `RemoteFailure` conditions
    /// are broadcast as events and never abort the stream.
    pub async fn send(&mut self, text: impl Into<String>) -> Result<String> {
        if self.state != ExchangeState::Idle {
            return Err(Error::ConcurrentSend);
        }
        let text = text.into();

        let parent_message_id = self.parent_message_id();
        let outgoing_id = Uuid::new_v4().to_string();
        self.conversation
            .create_turn(outgoing_id.as_str(), text.as_str())?;
        let _ = self.event_tx.send(EngineEvent::ExchangeStart {
            turn_id: outgoing_id.clone(),
        });

        self.state = ExchangeState::Sending;
        let result = self
            .run_exchange(&outgoing_id, &text, &parent_message_id)
            .await;
        // Back to Idle on every exit path; the EventSource is dropped inside
        // run_exchange, releasing the connection.
        self.state = ExchangeState::Idle;
        result?;

        self.conversation.select_turn(outgoing_id.as_str());
        let _ = self.event_tx.send(EngineEvent::ExchangeEnd {
            turn_id: outgoing_id.clone(),
        });
        Ok(outgoing_id)
    }

    /// Clear the conversation. Only valid while idle.
    pub fn reset_conversation(&mut self) -> Result<()> {
        if self.state != ExchangeState::Idle {
            return Err(Error::ResetWhileBusy);
        }
        self.conversation.reset();
        Ok(())
    }

    /// Parent linkage for the next outgoing turn: the last turn's assistant
    /// message id, or a fresh synthetic root when no prior assistant message
    /// exists (fresh conversation, or last turn never got a reply). The
    /// synthetic root keeps the very first request syntactically valid even
    /// though the server has never seen that id.
    fn parent_message_id(&self) -> String {
        self.conversation
            .last_turn()
            .and_then(|turn| turn.received_message_id())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string())
    }

    async fn run_exchange(
        &mut self,
        outgoing_id: &str,
        text: &str,
        parent_message_id: &str,
    ) -> Result<()> {
        let request = ConversationRequest::next(
            outgoing_id,
            text,
            self.conversation.conversation_id(),
            parent_message_id,
            &self.config.model,
        );
        tracing::debug!(
            outgoing_id,
            parent_message_id,
            conversation_id = ?self.conversation.conversation_id(),
            "opening exchange"
        );

        let builder = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.token)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .header(reqwest::header::REFERER, REFERER)
            .json(&request);

        let mut source = EventSource::new(builder)
            .map_err(|e| Error::Stream(format!("failed to open event source: {e}")))?;

        let mut auth_notice_sent = false;
        loop {
            let event = match tokio::time::timeout(self.config.idle_timeout, source.next()).await {
                Ok(event) => event,
                Err(_) => {
                    source.close();
                    return Err(Error::Timeout);
                }
            };
            let Some(event) = event else {
                break;
            };
            match event {
                Ok(Event::Open) => {
                    self.state = ExchangeState::StreamOpen;
                }
                Ok(Event::Message(message)) => {
                    let Some(record) = wire::parse_record(&message.data) else {
                        // Skip-malformed-record policy: partial fragments and
                        // heartbeats are expected mid-stream, not errors.
                        tracing::debug!(outgoing_id, "skipping undecodable stream record");
                        continue;
                    };
                    self.apply_record(outgoing_id, record, &mut auth_notice_sent)?;
                }
                // Clean EOF. An EOF mid-record also lands here: whatever
                // partial text was last applied simply stays, no rollback.
                Err(reqwest_eventsource::Error::StreamEnded) => break,
                Err(reqwest_eventsource::Error::InvalidStatusCode(status, _)) => {
                    source.close();
                    return Err(Error::BadStatus { status });
                }
                Err(e) => {
                    source.close();
                    return Err(Error::Stream(e.to_string()));
                }
            }
        }

        Ok(())
    }

    /// Apply one decoded record to the store, broadcasting side-channel
    /// notices. Error details never terminate the decode loop; auth expiry
    /// is surfaced at most once per exchange.
    fn apply_record(
        &mut self,
        outgoing_id: &str,
        record: StreamRecord,
        auth_notice_sent: &mut bool,
    ) -> Result<()> {
        if let Some(detail) = &record.detail {
            if detail.is_auth_expired() {
                if !*auth_notice_sent {
                    *auth_notice_sent = true;
                    tracing::warn!(outgoing_id, "credential rejected mid-stream");
                    let _ = self.event_tx.send(EngineEvent::AuthExpired);
                }
            } else {
                let message = detail.message();
                tracing::warn!(outgoing_id, %message, "service reported an error mid-stream");
                let _ = self.event_tx.send(EngineEvent::RemoteFailure { message });
            }
        }

        if let Some(id) = &record.conversation_id {
            // First write wins; the store ignores later ids.
            self.conversation.set_conversation_id(id.clone());
        }

        if let Some(message) = record.message {
            if let Some(text) = message.text() {
                // Growing snapshots: each record's text replaces the
                // previous partial text for this turn.
                self.conversation
                    .apply_event(outgoing_id, text, message.id.as_str())?;
                let _ = self.event_tx.send(EngineEvent::TurnUpdated {
                    turn_id: outgoing_id.to_string(),
                    text: text.to_string(),
                });
            }
        }

        Ok(())
    }
}
