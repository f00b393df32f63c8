//! Gmail API integration
//!
//! This module provides:
//! - The narrow [`MailApi`] transport interface and its HTTP implementation
//! - Parsing of full messages into [`ParsedEmail`](crate::models::ParsedEmail)
//! - [`MailReader`], the operations the sync needs (list unread, parse, mark read)
//! - [`InMemoryMailbox`], a fake transport for tests

mod client;
mod memory;
mod parse;
mod reader;

pub use client::GmailClient;
pub use memory::{InMemoryMailbox, plain_text_message};
pub use parse::{ParseError, normalize_date, parse_message};
pub use reader::MailReader;

use anyhow::Result;

use crate::models::MessageId;

/// Label IDs used by Gmail for system states
pub mod labels {
    pub const INBOX: &str = "INBOX";
    pub const UNREAD: &str = "UNREAD";
}

/// The Gmail operations the sync depends on
pub trait MailApi: Send + Sync {
    /// List one page of messages carrying every label in `label_ids`
    fn list_messages(
        &self,
        label_ids: &[&str],
        page_token: Option<&str>,
    ) -> Result<api::ListMessagesResponse>;

    /// Fetch a message in `full` format
    fn get_message(&self, id: &MessageId) -> Result<api::GmailMessage>;

    /// Add and remove labels on a single message
    fn modify_labels(&self, id: &MessageId, add: &[&str], remove: &[&str]) -> Result<()>;
}

/// Gmail API request and response types
pub mod api {
    use serde::{Deserialize, Serialize};

    /// Response from listing messages
    #[derive(Debug, Clone, Default, Deserialize, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ListMessagesResponse {
        pub messages: Option<Vec<MessageRef>>,
        pub next_page_token: Option<String>,
        pub result_size_estimate: Option<u32>,
    }

    /// Reference to a message (just ID and thread ID)
    #[derive(Debug, Clone, Deserialize, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessageRef {
        #[serde(default)]
        pub id: String,
        pub thread_id: Option<String>,
    }

    /// Full message from Gmail API
    #[derive(Debug, Clone, Default, Deserialize, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GmailMessage {
        pub id: String,
        pub thread_id: Option<String>,
        pub label_ids: Option<Vec<String>>,
        pub snippet: Option<String>,
        pub payload: Option<MessagePart>,
    }

    /// A MIME part. The top-level payload is itself a part.
    #[derive(Debug, Clone, Default, Deserialize, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessagePart {
        pub part_id: Option<String>,
        pub mime_type: Option<String>,
        pub filename: Option<String>,
        pub headers: Option<Vec<Header>>,
        pub body: Option<MessageBody>,
        pub parts: Option<Vec<MessagePart>>,
    }

    /// Email header (name-value pair)
    #[derive(Debug, Clone, Deserialize, Serialize)]
    pub struct Header {
        pub name: String,
        pub value: String,
    }

    /// Part body; `data` is base64url encoded
    #[derive(Debug, Clone, Default, Deserialize, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessageBody {
        pub attachment_id: Option<String>,
        pub size: Option<u32>,
        pub data: Option<String>,
    }

    /// Body of `users.messages.modify`
    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ModifyMessageRequest<'a> {
        pub add_label_ids: &'a [&'a str],
        pub remove_label_ids: &'a [&'a str],
    }
}
