//! In-memory mailbox
//!
//! A [`MailApi`] implementation backed by a vector of messages, used by tests
//! to run the sync without network access. Failures can be injected per
//! message for `get_message` and `modify_labels`.

use anyhow::{Result, anyhow};
use base64::prelude::*;
use std::collections::HashSet;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::MailApi;
use super::api::{
    GmailMessage, Header, ListMessagesResponse, MessageBody, MessagePart, MessageRef,
};
use super::labels::{INBOX, UNREAD};
use crate::models::MessageId;

pub struct InMemoryMailbox {
    messages: RwLock<Vec<GmailMessage>>,
    page_size: usize,
    failing_gets: RwLock<HashSet<String>>,
    failing_modifies: RwLock<HashSet<String>>,
    list_calls: AtomicUsize,
    get_calls: AtomicUsize,
    modify_calls: AtomicUsize,
}

impl Default for InMemoryMailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryMailbox {
    pub fn new() -> Self {
        Self::with_page_size(100)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            messages: RwLock::new(Vec::new()),
            page_size: page_size.max(1),
            failing_gets: RwLock::new(HashSet::new()),
            failing_modifies: RwLock::new(HashSet::new()),
            list_calls: AtomicUsize::new(0),
            get_calls: AtomicUsize::new(0),
            modify_calls: AtomicUsize::new(0),
        }
    }

    /// Add a message, replacing any existing message with the same ID
    pub fn insert(&self, message: GmailMessage) {
        let mut messages = self.messages.write().unwrap();
        messages.retain(|m| m.id != message.id);
        messages.push(message);
    }

    pub fn set_labels(&self, id: &str, labels: &[&str]) {
        let mut messages = self.messages.write().unwrap();
        if let Some(message) = messages.iter_mut().find(|m| m.id == id) {
            message.label_ids = Some(labels.iter().map(|l| l.to_string()).collect());
        }
    }

    /// Make `get_message` fail for this ID
    pub fn fail_get(&self, id: &str) {
        self.failing_gets.write().unwrap().insert(id.to_string());
    }

    /// Make `modify_labels` fail for this ID
    pub fn fail_modify(&self, id: &str) {
        self.failing_modifies.write().unwrap().insert(id.to_string());
    }

    pub fn labels(&self, id: &str) -> Vec<String> {
        self.messages
            .read()
            .unwrap()
            .iter()
            .find(|m| m.id == id)
            .and_then(|m| m.label_ids.clone())
            .unwrap_or_default()
    }

    pub fn is_unread(&self, id: &str) -> bool {
        self.labels(id).iter().any(|l| l == UNREAD)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of `get_message` calls, failed ones included
    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn modify_calls(&self) -> usize {
        self.modify_calls.load(Ordering::SeqCst)
    }
}

impl MailApi for InMemoryMailbox {
    fn list_messages(
        &self,
        label_ids: &[&str],
        page_token: Option<&str>,
    ) -> Result<ListMessagesResponse> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let offset: usize = match page_token {
            Some(token) => token
                .parse()
                .map_err(|_| anyhow!("Invalid page token: {}", token))?,
            None => 0,
        };

        let messages = self.messages.read().unwrap();
        let matching: Vec<MessageRef> = messages
            .iter()
            .filter(|m| {
                let labels = m.label_ids.as_deref().unwrap_or_default();
                label_ids.iter().all(|wanted| labels.iter().any(|l| l == wanted))
            })
            .map(|m| MessageRef {
                id: m.id.clone(),
                thread_id: m.thread_id.clone(),
            })
            .collect();

        let total = matching.len();
        let page: Vec<MessageRef> = matching
            .into_iter()
            .skip(offset)
            .take(self.page_size)
            .collect();
        let next = offset + page.len();

        Ok(ListMessagesResponse {
            messages: if page.is_empty() { None } else { Some(page) },
            next_page_token: (next < total).then(|| next.to_string()),
            result_size_estimate: Some(total as u32),
        })
    }

    fn get_message(&self, id: &MessageId) -> Result<GmailMessage> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);

        if self.failing_gets.read().unwrap().contains(id.as_str()) {
            return Err(anyhow!("Failed to fetch message {}: injected failure", id));
        }

        self.messages
            .read()
            .unwrap()
            .iter()
            .find(|m| m.id == id.as_str())
            .cloned()
            .ok_or_else(|| anyhow!("Message {} not found", id))
    }

    fn modify_labels(&self, id: &MessageId, add: &[&str], remove: &[&str]) -> Result<()> {
        self.modify_calls.fetch_add(1, Ordering::SeqCst);

        if self.failing_modifies.read().unwrap().contains(id.as_str()) {
            return Err(anyhow!("Failed to modify labels on message {}: injected failure", id));
        }

        let mut messages = self.messages.write().unwrap();
        let message = messages
            .iter_mut()
            .find(|m| m.id == id.as_str())
            .ok_or_else(|| anyhow!("Message {} not found", id))?;

        let labels = message.label_ids.get_or_insert_with(Vec::new);
        labels.retain(|l| !remove.contains(&l.as_str()));
        for label in add {
            if !labels.iter().any(|l| l == label) {
                labels.push(label.to_string());
            }
        }
        Ok(())
    }
}

/// Build an unread inbox message with a single text/plain payload.
///
/// An empty `date` omits the Date header entirely.
pub fn plain_text_message(id: &str, from: &str, subject: &str, date: &str, body: &str) -> GmailMessage {
    let mut headers = vec![
        Header {
            name: "From".to_string(),
            value: from.to_string(),
        },
        Header {
            name: "Subject".to_string(),
            value: subject.to_string(),
        },
    ];
    if !date.is_empty() {
        headers.push(Header {
            name: "Date".to_string(),
            value: date.to_string(),
        });
    }

    GmailMessage {
        id: id.to_string(),
        thread_id: Some(format!("t-{}", id)),
        label_ids: Some(vec![INBOX.to_string(), UNREAD.to_string()]),
        snippet: Some(body.chars().take(100).collect()),
        payload: Some(MessagePart {
            mime_type: Some("multipart/alternative".to_string()),
            headers: Some(headers),
            parts: Some(vec![MessagePart {
                part_id: Some("0".to_string()),
                mime_type: Some("text/plain".to_string()),
                body: Some(MessageBody {
                    size: Some(body.len() as u32),
                    data: Some(BASE64_URL_SAFE_NO_PAD.encode(body)),
                    ..Default::default()
                }),
                ..Default::default()
            }]),
            ..Default::default()
        }),
    }
}
