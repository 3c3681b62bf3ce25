//! Attachment records.
//!
//! The bytes live under `attachments/<id>/` in the store; only the
//! record describing them is kept in the message metadata.

/// One extracted attachment as listed in a message's metadata record.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AttachmentRecord {
    /// Filename as read from the archive (before any collision suffix).
    pub filename: String,

    /// Size in bytes of the written file.
    pub size: u64,

    /// Path of the written file relative to the store root,
    /// e.g. `attachments/email_000001/slip.xlsx`.
    pub path: String,
}
