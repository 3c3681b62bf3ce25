//! Message identifiers and the per-message metadata record.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::attachment::AttachmentRecord;
use crate::error::PolicyMailError;

/// Prefix shared by every message id.
const ID_PREFIX: &str = "email_";

/// Sequential message identifier, rendered fixed-width as `email_000042`.
///
/// Ids are assigned in archive walk order, starting at 1. Because the
/// rendering is zero-padded, lexical and numeric order agree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId(pub u64);

impl MessageId {
    /// The numeric sequence value.
    pub fn sequence(self) -> u64 {
        self.0
    }

    /// The id that follows this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{ID_PREFIX}{:06}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = PolicyMailError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.strip_prefix(ID_PREFIX)
            .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|digits| digits.parse::<u64>().ok())
            .map(MessageId)
            .ok_or_else(|| PolicyMailError::InvalidMessageId(s.to_string()))
    }
}

impl Serialize for MessageId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MessageId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Metadata record persisted as `metadata/<id>.json`.
///
/// Every field is optional on read: records written by older tools, or
/// by archives that lacked an accessor, simply leave fields out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageMetadata {
    pub id: MessageId,

    /// `/`-joined folder path from the archive root.
    pub folder: String,

    pub subject: Option<String>,
    pub sender_name: Option<String>,
    pub sender_email: Option<String>,
    #[serde(deserialize_with = "lenient_time")]
    pub delivery_time: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "lenient_time")]
    pub creation_time: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "lenient_time")]
    pub modification_time: Option<DateTime<Utc>>,

    /// Message size as reported by the archive.
    pub size: Option<u64>,

    /// Attachment count as resolved from the archive (may exceed
    /// `attachments.len()` when some attachments could not be read).
    pub attachment_count: Option<usize>,

    pub attachments: Vec<AttachmentRecord>,

    /// Synthesized container path relative to the store root.
    pub eml_file: Option<String>,

    /// Characters in the plain body (or in its HTML-derived substitute).
    pub plain_text_length: usize,

    /// Characters in the HTML body.
    pub html_content_length: usize,

    #[serde(deserialize_with = "lenient_time")]
    pub extraction_date: Option<DateTime<Utc>>,
}

/// Timestamps without an offset are read as UTC. Anything else that does
/// not parse is treated as unknown rather than rejecting the record.
fn lenient_time<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<DateTime<Utc>>, D::Error> {
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(serde_json::Value::as_str).and_then(parse_time))
}

fn parse_time(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

impl MessageMetadata {
    /// Subject line, or the empty string when unknown.
    pub fn subject(&self) -> &str {
        self.subject.as_deref().unwrap_or("")
    }
}
