//! Gmail API HTTP client
//!
//! Uses synchronous HTTP (ureq); every call blocks the calling thread until
//! it completes or the agent's timeout elapses.

use anyhow::{Context, Result};
use std::sync::Arc;

use super::MailApi;
use super::api::{GmailMessage, ListMessagesResponse, ModifyMessageRequest};
use crate::auth::AccessTokenSource;
use crate::http::bearer;
use crate::models::MessageId;

/// Gmail API client for the authenticated user (`me`)
pub struct GmailClient {
    auth: Arc<dyn AccessTokenSource>,
    agent: ureq::Agent,
}

impl GmailClient {
    /// Gmail API base URL
    const BASE_URL: &'static str = "https://gmail.googleapis.com/gmail/v1";

    /// Largest page size the list endpoint accepts
    const PAGE_SIZE: usize = 500;

    pub fn new(auth: Arc<dyn AccessTokenSource>, agent: ureq::Agent) -> Self {
        Self { auth, agent }
    }

    fn list_url(label_ids: &[&str], page_token: Option<&str>) -> String {
        let mut url = format!(
            "{}/users/me/messages?maxResults={}",
            Self::BASE_URL,
            Self::PAGE_SIZE
        );
        for label in label_ids {
            url.push_str(&format!("&labelIds={}", urlencoding::encode(label)));
        }
        if let Some(token) = page_token {
            url.push_str(&format!("&pageToken={}", urlencoding::encode(token)));
        }
        url
    }
}

impl MailApi for GmailClient {
    fn list_messages(
        &self,
        label_ids: &[&str],
        page_token: Option<&str>,
    ) -> Result<ListMessagesResponse> {
        let access_token = self.auth.access_token()?;
        let url = Self::list_url(label_ids, page_token);

        let mut response = self
            .agent
            .get(&url)
            .header("Authorization", &bearer(&access_token))
            .call()
            .context("Failed to send list messages request")?;

        let list: ListMessagesResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse list messages response")?;

        Ok(list)
    }

    fn get_message(&self, id: &MessageId) -> Result<GmailMessage> {
        let access_token = self.auth.access_token()?;

        let url = format!(
            "{}/users/me/messages/{}?format=full",
            Self::BASE_URL,
            urlencoding::encode(id.as_str())
        );

        let mut response = self
            .agent
            .get(&url)
            .header("Authorization", &bearer(&access_token))
            .call()
            .with_context(|| format!("Failed to fetch message {}", id))?;

        let message: GmailMessage = response
            .body_mut()
            .read_json()
            .with_context(|| format!("Failed to parse message {}", id))?;

        Ok(message)
    }

    fn modify_labels(&self, id: &MessageId, add: &[&str], remove: &[&str]) -> Result<()> {
        let access_token = self.auth.access_token()?;

        let url = format!(
            "{}/users/me/messages/{}/modify",
            Self::BASE_URL,
            urlencoding::encode(id.as_str())
        );

        self.agent
            .post(&url)
            .header("Authorization", &bearer(&access_token))
            .send_json(&ModifyMessageRequest {
                add_label_ids: add,
                remove_label_ids: remove,
            })
            .with_context(|| format!("Failed to modify labels on message {}", id))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_url_repeats_label_filter() {
        let url = GmailClient::list_url(&["INBOX", "UNREAD"], None);
        assert_eq!(
            url,
            "https://gmail.googleapis.com/gmail/v1/users/me/messages?maxResults=500&labelIds=INBOX&labelIds=UNREAD"
        );
    }

    #[test]
    fn test_list_url_with_page_token() {
        let url = GmailClient::list_url(&["UNREAD"], Some("abc+/="));
        assert!(url.ends_with("&labelIds=UNREAD&pageToken=abc%2B%2F%3D"));
    }

    #[test]
    fn test_modify_request_shape() {
        let body = serde_json::to_value(ModifyMessageRequest {
            add_label_ids: &[],
            remove_label_ids: &["UNREAD"],
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "addLabelIds": [], "removeLabelIds": ["UNREAD"] })
        );
    }
}
