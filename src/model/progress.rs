//! Resumable extraction progress.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use super::message::MessageId;

/// Persisted as `progress.json`. Authoritative for resume decisions: a
/// message exists in the store iff its id is in `processed_emails`.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ProgressState {
    /// Ids whose container, metadata and attachments were fully written.
    pub processed_emails: BTreeSet<MessageId>,

    /// Number of entries in `processed_emails` at the last checkpoint.
    pub total_processed: usize,

    /// When the first run against this store started.
    pub start_time: Option<DateTime<Utc>>,

    /// When the state was last checkpointed.
    pub last_update: Option<DateTime<Utc>>,
}

impl ProgressState {
    /// Whether `id` has been fully persisted.
    pub fn contains(&self, id: MessageId) -> bool {
        self.processed_emails.contains(&id)
    }

    /// Record `id` as fully persisted.
    pub fn mark_processed(&mut self, id: MessageId) {
        self.processed_emails.insert(id);
    }

    /// Number of persisted messages.
    pub fn len(&self) -> usize {
        self.processed_emails.len()
    }

    /// Whether no message has been persisted yet.
    pub fn is_empty(&self) -> bool {
        self.processed_emails.is_empty()
    }

    /// Set `start_time` if this is the first run.
    pub fn begin_run(&mut self, now: DateTime<Utc>) {
        if self.start_time.is_none() {
            self.start_time = Some(now);
        }
    }

    /// Refresh the derived counters before the state is written.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.total_processed = self.processed_emails.len();
        self.last_update = Some(now);
    }
}
