//! Gmail message parsing
//!
//! Converts a full-format Gmail message into a [`ParsedEmail`].

use base64::prelude::*;
use chrono::{DateTime, NaiveDateTime};

use super::api::{GmailMessage, MessagePart};
use crate::models::{MessageId, ParsedEmail};

/// Output format for normalized dates, e.g. `2024-01-15 10:30:00+00:00`
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%:z";

/// Output format for dates that carry no usable zone
const NAIVE_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Zone-less RFC 2822 layouts, with and without the weekday
const NAIVE_INPUT_FORMATS: [&str; 2] = ["%a, %d %b %Y %H:%M:%S", "%d %b %Y %H:%M:%S"];

/// Reasons a message cannot be turned into a record
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Message {0} has no payload")]
    MissingPayload(MessageId),
    #[error("Invalid Date header {value:?}: {source}")]
    InvalidDate {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    #[error("Plain text body of message {id} is not valid base64url: {source}")]
    InvalidBase64 {
        id: MessageId,
        #[source]
        source: base64::DecodeError,
    },
    #[error("Plain text body of message {id} is not valid UTF-8: {source}")]
    InvalidUtf8 {
        id: MessageId,
        #[source]
        source: std::string::FromUtf8Error,
    },
}

/// Parse a full-format message.
///
/// `From`, `Subject` and `Date` default to empty strings when absent, as does
/// the body when no text/plain part exists.
pub fn parse_message(id: &MessageId, message: &GmailMessage) -> Result<ParsedEmail, ParseError> {
    let payload = message
        .payload
        .as_ref()
        .ok_or_else(|| ParseError::MissingPayload(id.clone()))?;

    let sender = extract_header(payload, "From").unwrap_or_default();
    let subject = extract_header(payload, "Subject").unwrap_or_default();
    let date = normalize_date(&extract_header(payload, "Date").unwrap_or_default())?;

    let body = match find_plain_text_part(payload) {
        Some(part) => decode_body(id, part)?,
        None => String::new(),
    };

    Ok(ParsedEmail {
        id: id.clone(),
        sender,
        subject,
        date,
        body,
    })
}

/// Normalize an RFC 2822 `Date` header, keeping its UTC offset.
///
/// An empty header stays empty. A trailing zone comment such as `(UTC)` is
/// ignored, and RFC 3339 is accepted as a fallback. A header without a zone,
/// or with the "unknown zone" marker `-0000`, is rendered without an offset.
pub fn normalize_date(raw: &str) -> Result<String, ParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(String::new());
    }

    let value = strip_trailing_comment(trimmed);
    if let Some(local) = value.strip_suffix("-0000")
        && let Some(date) = format_naive(local.trim_end())
    {
        return Ok(date);
    }

    DateTime::parse_from_rfc2822(value)
        .or_else(|e| DateTime::parse_from_rfc3339(value).map_err(|_| e))
        .map(|dt| dt.format(DATE_FORMAT).to_string())
        .or_else(|source| {
            format_naive(value).ok_or_else(|| ParseError::InvalidDate {
                value: raw.to_string(),
                source,
            })
        })
}

fn format_naive(value: &str) -> Option<String> {
    NAIVE_INPUT_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|dt| dt.format(NAIVE_DATE_FORMAT).to_string())
}

fn strip_trailing_comment(value: &str) -> &str {
    if value.ends_with(')')
        && let Some(open) = value.rfind('(')
    {
        return value[..open].trim_end();
    }
    value
}

/// Extract a header value by name (first match, case-insensitive)
fn extract_header(payload: &MessagePart, name: &str) -> Option<String> {
    payload.headers.as_ref()?.iter().find_map(|h| {
        if h.name.eq_ignore_ascii_case(name) {
            Some(h.value.clone())
        } else {
            None
        }
    })
}

/// Depth-first search for the first inline text/plain part.
///
/// Parts with a filename are attachments and are skipped.
fn find_plain_text_part(part: &MessagePart) -> Option<&MessagePart> {
    let is_plain = part
        .mime_type
        .as_ref()
        .is_some_and(|m| m.eq_ignore_ascii_case("text/plain"));
    let is_attachment = part.filename.as_ref().is_some_and(|f| !f.is_empty());

    if is_plain && !is_attachment {
        return Some(part);
    }

    part.parts
        .as_ref()?
        .iter()
        .find_map(find_plain_text_part)
}

/// Decode a part's base64url body; padded and unpadded input are both accepted
fn decode_body(id: &MessageId, part: &MessagePart) -> Result<String, ParseError> {
    let data = part
        .body
        .as_ref()
        .and_then(|b| b.data.as_deref())
        .unwrap_or_default();

    let bytes = BASE64_URL_SAFE_NO_PAD
        .decode(data.trim_end_matches('='))
        .map_err(|source| ParseError::InvalidBase64 {
            id: id.clone(),
            source,
        })?;

    String::from_utf8(bytes).map_err(|source| ParseError::InvalidUtf8 {
        id: id.clone(),
        source,
    })
}
