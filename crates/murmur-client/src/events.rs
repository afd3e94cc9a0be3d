//! Engine event types
//!
//! Side-channel notifications for the presentation layer. None of these is
//! terminal for the decode loop except [`EngineEvent::ExchangeEnd`]; in
//! particular `AuthExpired` and `RemoteFailure` do not stop decoding.

use serde::{Deserialize, Serialize};

/// Events broadcast while an exchange is in flight
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A turn was created and the request is about to go out
    ExchangeStart { turn_id: String },

    /// A stream record replaced the turn's reply snapshot
    TurnUpdated { turn_id: String, text: String },

    /// The service reported the credential is no longer valid.
    /// Actionable: the user should update their token.
    AuthExpired,

    /// The service reported a generic error mid-stream
    RemoteFailure { message: String },

    /// The exchange completed and the turn was selected as active
    ExchangeEnd { turn_id: String },
}

impl EngineEvent {
    /// Check if this event ends the exchange
    pub fn is_terminal(&self) -> bool {
        matches!(self, EngineEvent::ExchangeEnd { .. })
    }
}
