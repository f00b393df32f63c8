//! Mail Reader: the Gmail operations a sync run performs

use anyhow::{Context, Result};
use log::debug;
use std::sync::Arc;

use super::labels::{INBOX, UNREAD};
use super::{MailApi, parse_message};
use crate::models::{MessageId, ParsedEmail};

pub struct MailReader {
    api: Arc<dyn MailApi>,
}

impl MailReader {
    pub fn new(api: Arc<dyn MailApi>) -> Self {
        Self { api }
    }

    /// List every unread inbox message, following page tokens until the
    /// listing is exhausted. Order is whatever Gmail returns.
    pub fn list_unread(&self) -> Result<Vec<MessageId>> {
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let response = self
                .api
                .list_messages(&[INBOX, UNREAD], page_token.as_deref())
                .with_context(|| format!("Failed to list unread messages (page {})", pages + 1))?;
            pages += 1;

            ids.extend(
                response
                    .messages
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|m| !m.id.is_empty())
                    .map(|m| MessageId::new(m.id)),
            );

            match response.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!("Listed {} unread messages across {} page(s)", ids.len(), pages);
        Ok(ids)
    }

    /// Fetch and parse a single message
    pub fn parse(&self, id: &MessageId) -> Result<ParsedEmail> {
        let message = self.api.get_message(id)?;
        let email = parse_message(id, &message)?;
        Ok(email)
    }

    /// Remove the UNREAD label. Already-read messages are unaffected.
    pub fn mark_read(&self, id: &MessageId) -> Result<()> {
        self.api.modify_labels(id, &[], &[UNREAD])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gmail::{InMemoryMailbox, plain_text_message};

    fn reader_with(mailbox: &Arc<InMemoryMailbox>) -> MailReader {
        MailReader::new(mailbox.clone())
    }

    #[test]
    fn test_list_unread_follows_pagination() {
        let mailbox = Arc::new(InMemoryMailbox::with_page_size(2));
        for i in 1..=5 {
            mailbox.insert(plain_text_message(&format!("m{}", i), "a@example.com", "s", "", "b"));
        }

        let ids = reader_with(&mailbox).list_unread().unwrap();
        let ids: Vec<&str> = ids.iter().map(|id| id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2", "m3", "m4", "m5"]);
        assert_eq!(mailbox.list_calls(), 3);
    }

    #[test]
    fn test_list_unread_skips_read_and_archived() {
        let mailbox = Arc::new(InMemoryMailbox::new());
        mailbox.insert(plain_text_message("m1", "a@example.com", "s", "", "b"));
        mailbox.insert(plain_text_message("m2", "a@example.com", "s", "", "b"));
        mailbox.set_labels("m2", &[INBOX]);
        mailbox.insert(plain_text_message("m3", "a@example.com", "s", "", "b"));
        mailbox.set_labels("m3", &[UNREAD]);

        let ids = reader_with(&mailbox).list_unread().unwrap();
        assert_eq!(ids, vec![MessageId::new("m1")]);
    }

    #[test]
    fn test_list_unread_empty_mailbox() {
        let mailbox = Arc::new(InMemoryMailbox::new());
        assert!(reader_with(&mailbox).list_unread().unwrap().is_empty());
    }

    #[test]
    fn test_mark_read_is_idempotent() {
        let mailbox = Arc::new(InMemoryMailbox::new());
        mailbox.insert(plain_text_message("m1", "a@example.com", "s", "", "b"));
        let reader = reader_with(&mailbox);

        reader.mark_read(&MessageId::new("m1")).unwrap();
        reader.mark_read(&MessageId::new("m1")).unwrap();

        assert!(!mailbox.is_unread("m1"));
        assert!(mailbox.labels("m1").contains(&INBOX.to_string()));
    }

    #[test]
    fn test_parse_reports_fetch_failure() {
        let mailbox = Arc::new(InMemoryMailbox::new());
        mailbox.insert(plain_text_message("m1", "a@example.com", "s", "", "b"));
        mailbox.fail_get("m1");

        assert!(reader_with(&mailbox).parse(&MessageId::new("m1")).is_err());
    }
}
