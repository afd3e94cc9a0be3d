//! Conversation state: ordered turns, the pinned conversation id, and UI focus.
//!
//! This is pure data plus invariant enforcement. All I/O lives in
//! [`crate::engine`]; the store is only ever mutated from within the single
//! active exchange, so it carries no locking of its own.

use crate::error::{Error, Result};

/// One exchange unit: a user message and the assistant's (possibly partial)
/// reply, keyed by the locally generated outgoing message id.
#[derive(Debug, Clone)]
pub struct Turn {
    outgoing_id: String,
    sent_text: String,
    received_text: String,
    received_message_id: Option<String>,
}

impl Turn {
    fn new(outgoing_id: String, sent_text: String) -> Self {
        Self {
            outgoing_id,
            sent_text,
            received_text: String::new(),
            received_message_id: None,
        }
    }

    /// Locally generated id of the outgoing user message (the turn's key)
    pub fn outgoing_id(&self) -> &str {
        &self.outgoing_id
    }

    /// The user's message text, immutable once the turn is created
    pub fn sent_text(&self) -> &str {
        &self.sent_text
    }

    /// The assistant's reply so far. Each decoded stream event overwrites
    /// this with a fresh snapshot; empty until the first event lands.
    pub fn received_text(&self) -> &str {
        &self.received_text
    }

    /// Server-assigned id of the assistant message, used as the parent
    /// linkage for the next outgoing turn. Absent until the first event.
    pub fn received_message_id(&self) -> Option<&str> {
        self.received_message_id.as_deref()
    }
}

/// A linear conversation: turns in creation order plus the server-assigned
/// conversation id, pinned first-write-wins for the session.
#[derive(Debug, Default)]
pub struct Conversation {
    conversation_id: Option<String>,
    turns: Vec<Turn>,
    active_turn_id: Option<String>,
}

impl Conversation {
    /// Create an empty conversation
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new turn with empty received fields.
    ///
    /// Fails with [`Error::DuplicateTurn`] if a turn with this outgoing id
    /// already exists; that is a caller defect, not a recoverable condition.
    pub fn create_turn(
        &mut self,
        outgoing_id: impl Into<String>,
        sent_text: impl Into<String>,
    ) -> Result<()> {
        let outgoing_id = outgoing_id.into();
        if self.get(&outgoing_id).is_some() {
            return Err(Error::DuplicateTurn { id: outgoing_id });
        }
        self.turns.push(Turn::new(outgoing_id, sent_text.into()));
        Ok(())
    }

    /// Overwrite the addressed turn's received text and message id.
    ///
    /// The wire protocol sends growing snapshots, not deltas, so replacing
    /// the previous partial text is the correct behavior here.
    pub fn apply_event(
        &mut self,
        outgoing_id: &str,
        received_text: impl Into<String>,
        received_message_id: impl Into<String>,
    ) -> Result<()> {
        let turn = self
            .turns
            .iter_mut()
            .find(|t| t.outgoing_id == outgoing_id)
            .ok_or_else(|| Error::UnknownTurn {
                id: outgoing_id.to_string(),
            })?;
        turn.received_text = received_text.into();
        turn.received_message_id = Some(received_message_id.into());
        Ok(())
    }

    /// Pin the server-assigned conversation id. First write wins: once set,
    /// later calls are silent no-ops even with a different id.
    pub fn set_conversation_id(&mut self, id: impl Into<String>) {
        if self.conversation_id.is_none() {
            self.conversation_id = Some(id.into());
        }
    }

    /// The pinned conversation id, absent until the server assigns one
    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    /// The most recently created turn, or `None` for a fresh conversation
    pub fn last_turn(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Look up a turn by its outgoing id
    pub fn get(&self, outgoing_id: &str) -> Option<&Turn> {
        self.turns.iter().find(|t| t.outgoing_id == outgoing_id)
    }

    /// All turns in creation order (this is the display order)
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Mark a turn as selected/focused. UI state only, not a protocol concept.
    pub fn select_turn(&mut self, outgoing_id: impl Into<String>) {
        self.active_turn_id = Some(outgoing_id.into());
    }

    /// The currently selected turn id, if any
    pub fn active_turn_id(&self) -> Option<&str> {
        self.active_turn_id.as_deref()
    }

    /// Clear all state. Afterward the conversation behaves as brand-new:
    /// no turns, no pinned conversation id, no selection.
    pub fn reset(&mut self) {
        self.conversation_id = None;
        self.turns.clear();
        self.active_turn_id = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turns_keep_creation_order() {
        let mut conv = Conversation::new();
        conv.create_turn("u1", "first").unwrap();
        conv.create_turn("u2", "second").unwrap();
        conv.create_turn("u3", "third").unwrap();

        let ids: Vec<_> = conv.turns().iter().map(|t| t.outgoing_id()).collect();
        assert_eq!(ids, vec!["u1", "u2", "u3"]);
        assert_eq!(conv.len(), 3);
        assert_eq!(conv.last_turn().unwrap().outgoing_id(), "u3");
    }

    #[test]
    fn test_duplicate_turn_rejected() {
        let mut conv = Conversation::new();
        conv.create_turn("u1", "hi").unwrap();
        let err = conv.create_turn("u1", "again").unwrap_err();
        assert!(matches!(err, Error::DuplicateTurn { id } if id == "u1"));
        assert_eq!(conv.len(), 1);
    }

    #[test]
    fn test_apply_event_unknown_turn_rejected() {
        let mut conv = Conversation::new();
        let err = conv.apply_event("nope", "text", "m1").unwrap_err();
        assert!(matches!(err, Error::UnknownTurn { id } if id == "nope"));
    }

    #[test]
    fn test_apply_event_replaces_not_appends() {
        let mut conv = Conversation::new();
        conv.create_turn("u1", "hi").unwrap();
        conv.apply_event("u1", "Hel", "m1").unwrap();
        conv.apply_event("u1", "Hello", "m1").unwrap();

        let turn = conv.get("u1").unwrap();
        assert_eq!(turn.received_text(), "Hello");
        assert_eq!(turn.received_message_id(), Some("m1"));
    }

    #[test]
    fn test_sent_text_survives_events() {
        let mut conv = Conversation::new();
        conv.create_turn("u1", "hi").unwrap();
        conv.apply_event("u1", "Hello", "m1").unwrap();
        assert_eq!(conv.get("u1").unwrap().sent_text(), "hi");
    }

    #[test]
    fn test_conversation_id_first_write_wins() {
        let mut conv = Conversation::new();
        assert_eq!(conv.conversation_id(), None);
        conv.set_conversation_id("c1");
        conv.set_conversation_id("c2");
        assert_eq!(conv.conversation_id(), Some("c1"));
    }

    #[test]
    fn test_fresh_turn_has_empty_received_fields() {
        let mut conv = Conversation::new();
        conv.create_turn("u1", "hi").unwrap();
        let turn = conv.get("u1").unwrap();
        assert_eq!(turn.received_text(), "");
        assert_eq!(turn.received_message_id(), None);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut conv = Conversation::new();
        conv.create_turn("u1", "hi").unwrap();
        conv.apply_event("u1", "Hello", "m1").unwrap();
        conv.set_conversation_id("c1");
        conv.select_turn("u1");

        conv.reset();

        assert!(conv.is_empty());
        assert_eq!(conv.conversation_id(), None);
        assert_eq!(conv.active_turn_id(), None);
        assert_eq!(conv.last_turn().map(|t| t.outgoing_id()), None);

        // Behaves as brand-new: the old key is usable again.
        conv.create_turn("u1", "hi again").unwrap();
        conv.set_conversation_id("c9");
        assert_eq!(conv.conversation_id(), Some("c9"));
    }

    #[test]
    fn test_select_turn_tracks_focus() {
        let mut conv = Conversation::new();
        conv.create_turn("u1", "hi").unwrap();
        conv.select_turn("u1");
        assert_eq!(conv.active_turn_id(), Some("u1"));
    }
}
