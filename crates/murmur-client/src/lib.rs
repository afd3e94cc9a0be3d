//! murmur-client: streaming conversation session manager
//!
//! This crate holds the two pieces with real protocol content: the
//! [`Conversation`] store (ordered turns, pinned conversation id, turn-taking
//! invariants) and the [`Engine`] that drives one streamed exchange at a time
//! with the remote chat service, applying decoded records to the store as
//! they arrive.

pub mod conversation;
pub mod engine;
pub mod error;
pub mod events;
pub mod wire;

pub use conversation::{Conversation, Turn};
pub use engine::{Engine, EngineConfig, ExchangeState};
pub use error::{Error, Result};
pub use events::EngineEvent;
