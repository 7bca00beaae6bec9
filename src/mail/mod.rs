//! Mail collaborator.
//!
//! The pipeline lists incoming messages through `MailSource` and dispatches
//! notifications through `MailSender`. The crate ships a drop-folder mailbox
//! (one JSON envelope per message) and an outbox that writes outgoing mail to
//! disk for a transport to pick up.

pub mod dropbox;
pub mod outbox;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use dropbox::DropFolderMailbox;
pub use outbox::OutboxSender;

// ============================================================================
// Incoming
// ============================================================================

/// A file attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    #[serde(with = "base64_bytes")]
    pub content: Vec<u8>,
}

/// One received message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailMessage {
    #[serde(default)]
    pub sender_name: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub cc: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
    pub received_time: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_on: Option<NaiveDateTime>,
    /// In the order they appear on the message.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl MailMessage {
    pub fn attachment_names(&self) -> Vec<String> {
        self.attachments.iter().map(|a| a.name.clone()).collect()
    }
}

/// Lists received messages in a folder.
pub trait MailSource {
    /// Messages whose received time falls within `[start, stop]`, ordered by
    /// received time.
    fn list_messages(
        &self,
        folder: &str,
        start: NaiveDateTime,
        stop: NaiveDateTime,
        sort_descending: bool,
    ) -> Result<Vec<MailMessage>>;
}

// ============================================================================
// Outgoing
// ============================================================================

/// Optional properties of an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailOptions {
    /// Leave the message for review instead of sending it.
    pub display: bool,
    /// 0 = low, 1 = normal, 2 = high.
    pub importance: u8,
    /// 0 = normal, 1 = personal, 2 = private, 3 = confidential.
    pub sensitivity: u8,
}

impl Default for MailOptions {
    fn default() -> Self {
        Self {
            display: true,
            importance: 1,
            sensitivity: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMail {
    pub html_body: String,
    pub recipients: Vec<String>,
    #[serde(default)]
    pub cc: Vec<String>,
    pub subject: String,
    #[serde(default)]
    pub options: MailOptions,
}

/// Dispatches outgoing messages.
pub trait MailSender {
    fn send_message(&self, mail: &OutgoingMail) -> Result<()>;
}

/// Serde adapter storing bytes as standard base64 text.
mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(text.trim())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_decodes_base64_attachment() {
        let json = r#"{
            "senderName": "Branch A",
            "subject": "Internal Fraud Data A001 20240131",
            "receivedTime": "2024-01-31T09:30:00",
            "attachments": [{ "name": "data.json", "content": "aGVsbG8=" }]
        }"#;
        let msg: MailMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.attachments[0].content, b"hello");
        assert_eq!(msg.attachment_names(), vec!["data.json"]);
        assert!(msg.creation_time.is_none());
        assert_eq!(msg.cc, "");
    }

    #[test]
    fn test_bad_base64_rejected() {
        let json = r#"{
            "receivedTime": "2024-01-31T09:30:00",
            "attachments": [{ "name": "x.xlsx", "content": "***" }]
        }"#;
        assert!(serde_json::from_str::<MailMessage>(json).is_err());
    }
}
