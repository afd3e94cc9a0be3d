//! Wire types for the remote conversation endpoint.
//!
//! The inbound side is deliberately lenient: the stream interleaves
//! heartbeat and partial fragments with complete JSON objects, so a record
//! that fails to parse is skipped rather than treated as a framing error.

use serde::{Deserialize, Serialize};

/// Sentinel the service emits as the last stream record
pub const DONE_SENTINEL: &str = "[DONE]";

// Request types

/// Outbound request body, one per exchange
#[derive(Debug, Serialize)]
pub struct ConversationRequest {
    pub action: String,
    pub messages: Vec<OutgoingMessage>,
    /// Omitted entirely for a new conversation; the server distinguishes
    /// new-vs-continuation by field presence, not by a null sentinel.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    pub parent_message_id: String,
    pub model: String,
}

#[derive(Debug, Serialize)]
pub struct OutgoingMessage {
    pub id: String,
    pub role: String,
    pub content: OutgoingContent,
}

#[derive(Debug, Serialize)]
pub struct OutgoingContent {
    pub content_type: String,
    pub parts: Vec<String>,
}

impl ConversationRequest {
    /// Build a "next" request carrying one plain-text user message
    pub fn next(
        outgoing_id: &str,
        text: &str,
        conversation_id: Option<&str>,
        parent_message_id: &str,
        model: &str,
    ) -> Self {
        Self {
            action: "next".to_string(),
            messages: vec![OutgoingMessage {
                id: outgoing_id.to_string(),
                role: "user".to_string(),
                content: OutgoingContent {
                    content_type: "text".to_string(),
                    parts: vec![text.to_string()],
                },
            }],
            conversation_id: conversation_id.map(str::to_string),
            parent_message_id: parent_message_id.to_string(),
            model: model.to_string(),
        }
    }
}

// Stream record types (only the fields actually consumed)

/// One decoded JSON object from the streamed response body
#[derive(Debug, Clone, Deserialize)]
pub struct StreamRecord {
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
    #[serde(default)]
    pub detail: Option<Detail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub id: String,
    pub content: IncomingContent,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingContent {
    #[serde(default)]
    pub parts: Vec<String>,
}

impl IncomingMessage {
    /// The reply snapshot carried by this record, if any
    pub fn text(&self) -> Option<&str> {
        self.content.parts.first().map(String::as_str)
    }
}

/// Error payload embedded in a stream record. The service sends either a
/// structured object or a bare message string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Detail {
    Structured {
        #[serde(default)]
        code: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },
    Text(String),
}

impl Detail {
    /// Check if this detail says the credential is no longer valid
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Detail::Structured { code: Some(code), .. } if code == "token_expired")
    }

    /// Best-effort human-readable message for surfacing to the caller
    pub fn message(&self) -> String {
        match self {
            Detail::Structured { message, code } => message
                .clone()
                .or_else(|| code.clone())
                .unwrap_or_else(|| "unspecified service error".to_string()),
            Detail::Text(text) => text.clone(),
        }
    }
}

/// Decode one stream record.
///
/// Strips an optional `data: ` prefix, ignores the `[DONE]` sentinel and
/// empty framing, and returns `None` for anything that is not a well-formed
/// JSON object. Skip-on-parse-failure is load-bearing here: a strict parser
/// would abort a usable stream over a single malformed fragment.
pub fn parse_record(data: &str) -> Option<StreamRecord> {
    let payload = data.strip_prefix("data: ").unwrap_or(data).trim();
    if payload.is_empty() || payload == DONE_SENTINEL {
        return None;
    }
    serde_json::from_str(payload).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_omits_absent_conversation_id() {
        let request = ConversationRequest::next("u1", "Hi", None, "root", "test-model");
        let value = serde_json::to_value(&request).unwrap();
        let body = value.as_object().unwrap();

        assert_eq!(body["action"], "next");
        assert_eq!(body["parent_message_id"], "root");
        assert_eq!(body["model"], "test-model");
        assert!(!body.contains_key("conversation_id"));
    }

    #[test]
    fn test_request_carries_pinned_conversation_id() {
        let request = ConversationRequest::next("u1", "Hi", Some("c1"), "m1", "test-model");
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["conversation_id"], "c1");
    }

    #[test]
    fn test_request_message_shape() {
        let request = ConversationRequest::next("u1", "Hi there", None, "root", "test-model");
        let value = serde_json::to_value(&request).unwrap();
        let message = &value["messages"][0];

        assert_eq!(message["id"], "u1");
        assert_eq!(message["role"], "user");
        assert_eq!(message["content"]["content_type"], "text");
        assert_eq!(message["content"]["parts"][0], "Hi there");
    }

    #[test]
    fn test_parse_record_with_data_prefix() {
        let record = parse_record(
            r#"data: {"conversation_id":"c1","message":{"id":"m1","content":{"parts":["Hello"]}}}"#,
        )
        .unwrap();
        assert_eq!(record.conversation_id.as_deref(), Some("c1"));
        let message = record.message.unwrap();
        assert_eq!(message.id, "m1");
        assert_eq!(message.text(), Some("Hello"));
    }

    #[test]
    fn test_parse_record_without_prefix() {
        // reqwest-eventsource already strips the field name from SSE data.
        let record = parse_record(r#"{"conversation_id":"c1"}"#).unwrap();
        assert_eq!(record.conversation_id.as_deref(), Some("c1"));
    }

    #[test]
    fn test_parse_record_skips_malformed() {
        assert!(parse_record(r#"{"message":{"id":"m1","#).is_none());
        assert!(parse_record("not json at all").is_none());
        assert!(parse_record("data: {truncated").is_none());
    }

    #[test]
    fn test_parse_record_skips_framing() {
        assert!(parse_record("").is_none());
        assert!(parse_record("   ").is_none());
        assert!(parse_record("data: ").is_none());
        assert!(parse_record("data: [DONE]").is_none());
        assert!(parse_record("[DONE]").is_none());
    }

    #[test]
    fn test_malformed_record_between_valid_ones() {
        let lines = [
            r#"data: {"message":{"id":"m1","content":{"parts":["Hel"]}}}"#,
            r#"data: {"message":{"id":"m1","content":{"pa"#,
            r#"data: {"message":{"id":"m1","content":{"parts":["Hello"]}}}"#,
        ];
        let records: Vec<_> = lines.iter().filter_map(|l| parse_record(l)).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].message.as_ref().unwrap().text(), Some("Hel"));
        assert_eq!(records[1].message.as_ref().unwrap().text(), Some("Hello"));
    }

    #[test]
    fn test_detail_token_expired_code() {
        let record = parse_record(r#"{"detail":{"code":"token_expired"}}"#).unwrap();
        let detail = record.detail.unwrap();
        assert!(detail.is_auth_expired());
        assert_eq!(detail.message(), "token_expired");
    }

    #[test]
    fn test_detail_structured_message() {
        let record =
            parse_record(r#"{"detail":{"code":"server_error","message":"Something broke"}}"#)
                .unwrap();
        let detail = record.detail.unwrap();
        assert!(!detail.is_auth_expired());
        assert_eq!(detail.message(), "Something broke");
    }

    #[test]
    fn test_detail_bare_string() {
        let record = parse_record(r#"{"detail":"Too many requests"}"#).unwrap();
        let detail = record.detail.unwrap();
        assert!(!detail.is_auth_expired());
        assert_eq!(detail.message(), "Too many requests");
    }

    #[test]
    fn test_record_with_empty_parts_has_no_text() {
        let record = parse_record(r#"{"message":{"id":"m1","content":{"parts":[]}}}"#).unwrap();
        assert_eq!(record.message.unwrap().text(), None);
    }
}
