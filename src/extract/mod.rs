//! Resumable extraction of an archive into the store.
//!
//! The walk is depth-first: a folder's messages in index order, then its
//! subfolders in index order. Ids are handed out in that order, once per
//! discovered message, so the same archive always maps message to id the
//! same way and a rerun can skip everything already in `progress.json`.

pub mod container;

use std::ops::ControlFlow;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::archive::strategy::{self, attachment_name, probe, probe_text};
use crate::archive::{self as archive_mod, Archive, ArchiveFolder, ArchiveMessage, BodyPayload};
use crate::error::{PolicyMailError, Result};
use crate::model::attachment::AttachmentRecord;
use crate::model::message::{MessageId, MessageMetadata};
use crate::model::progress::ProgressState;
use crate::parser::mime::html_to_text;
use crate::store::StoreWriter;

use container::ContainerHeaders;

/// Default number of persisted messages between checkpoints.
pub const DEFAULT_CHECKPOINT_INTERVAL: usize = 10;

/// Default cap on the indexed-scan count strategy.
pub const DEFAULT_MAX_SCAN: usize = 10_000;

/// Tunables of an extraction run.
#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions {
    /// Persisted messages between two progress checkpoints.
    pub checkpoint_interval: usize,
    /// Upper bound for counting children by indexed scan.
    pub max_scan: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            max_scan: DEFAULT_MAX_SCAN,
        }
    }
}

/// Stages a message passes through. A failure before `Persisted` drops
/// the message; `Checkpointed` means its id is recorded in the progress
/// state and will be on disk after the next checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageState {
    Discovered,
    BodyExtracted,
    AttachmentsExtracted,
    Persisted,
    Checkpointed,
}

/// What happened to one discovered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Already in the progress state from an earlier run.
    AlreadyProcessed,
    Extracted {
        attachments: usize,
        attachments_skipped: usize,
    },
    Failed {
        /// Last state reached before the failure.
        state: MessageState,
        reason: String,
    },
}

/// Event passed to the progress callback.
#[derive(Debug)]
pub enum ExtractEvent<'a> {
    Folder { path: &'a str },
    Message { id: MessageId, outcome: &'a MessageOutcome },
}

/// Totals of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractSummary {
    pub discovered: usize,
    pub extracted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub attachments_written: usize,
    pub attachments_skipped: usize,
    pub folders: usize,
    pub interrupted: bool,
}

struct MessageFailure {
    state: MessageState,
    error: PolicyMailError,
}

type ProgressCallback<'a> = &'a dyn Fn(&ExtractEvent<'_>);

/// Walks an archive and persists every message not yet in the store.
pub struct Extractor<'a> {
    writer: StoreWriter,
    progress: ProgressState,
    options: ExtractOptions,
    cancel: Option<&'a AtomicBool>,
    on_event: Option<ProgressCallback<'a>>,
    next_id: MessageId,
    since_checkpoint: usize,
    summary: ExtractSummary,
}

impl<'a> Extractor<'a> {
    /// Prepare a run against the store rooted at `output_dir`, loading the
    /// progress of any earlier run.
    pub fn new(output_dir: impl AsRef<Path>, options: ExtractOptions) -> Result<Self> {
        let writer = StoreWriter::create(output_dir.as_ref())?;
        let mut progress = writer.load_progress();
        progress.begin_run(Utc::now());
        if !progress.is_empty() {
            info!(processed = progress.len(), "Resuming from previous progress");
        }
        Ok(Self {
            writer,
            progress,
            options,
            cancel: None,
            on_event: None,
            next_id: MessageId(1),
            since_checkpoint: 0,
            summary: ExtractSummary::default(),
        })
    }

    /// Stop at the next message once `flag` is set.
    pub fn with_cancel_flag(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Call `callback` for every visited folder and discovered message.
    pub fn with_progress(mut self, callback: ProgressCallback<'a>) -> Self {
        self.on_event = Some(callback);
        self
    }

    /// Open the archive at `path` and extract it.
    pub fn extract_path(self, path: &Path) -> Result<ExtractSummary> {
        match archive_mod::open(path) {
            Ok(archive) => self.extract(archive.as_ref()),
            Err(e) => self.abort(e),
        }
    }

    /// Extract every message of `archive` not yet in the store.
    pub fn extract(mut self, archive: &dyn Archive) -> Result<ExtractSummary> {
        let root = match archive.root() {
            Ok(root) => root,
            Err(e) => return self.abort(e),
        };

        let flow = self.walk_folder(root.as_ref(), "");
        self.summary.interrupted = flow.is_break();
        if self.summary.interrupted {
            warn!(
                discovered = self.summary.discovered,
                "Extraction interrupted, saving progress"
            );
        }

        self.writer.save_progress(&mut self.progress)?;
        info!(
            discovered = self.summary.discovered,
            extracted = self.summary.extracted,
            skipped = self.summary.skipped,
            failed = self.summary.failed,
            "Extraction finished"
        );
        Ok(self.summary)
    }

    /// Save progress and surface a fatal error.
    fn abort(mut self, e: PolicyMailError) -> Result<ExtractSummary> {
        error!(error = %e, "Cannot read archive, aborting run");
        if let Err(save) = self.writer.save_progress(&mut self.progress) {
            warn!(error = %save, "Could not save progress");
        }
        Err(e)
    }

    fn cancelled(&self) -> bool {
        self.cancel.is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    fn emit(&self, event: ExtractEvent<'_>) {
        if let Some(callback) = self.on_event {
            callback(&event);
        }
    }

    fn walk_folder(&mut self, folder: &dyn ArchiveFolder, parent: &str) -> ControlFlow<()> {
        let path = match probe_text("folder.name", folder.name()) {
            Some(name) if parent.is_empty() => name,
            Some(name) => format!("{parent}/{name}"),
            None => parent.to_string(),
        };
        self.summary.folders += 1;
        self.emit(ExtractEvent::Folder { path: &path });

        let messages = strategy::resolve_count(
            "message_count",
            || folder.message_count(),
            || folder.message_count_property(),
            |i| matches!(folder.message(i), Ok(Some(_))),
            self.options.max_scan,
        );
        debug!(folder = %path, messages = messages.count, "Walking folder");

        for index in 0..messages.count {
            if self.cancelled() {
                return ControlFlow::Break(());
            }
            match folder.message(index) {
                Ok(Some(message)) => self.process_message(message.as_ref(), &path),
                Ok(None) => debug!(folder = %path, index, "Message slot empty"),
                Err(e) => {
                    // Counted so later ids keep their position.
                    let id = self.discover();
                    if self.progress.contains(id) {
                        self.summary.skipped += 1;
                        continue;
                    }
                    warn!(id = %id, folder = %path, index, error = %e, "Cannot retrieve message");
                    self.fail(id, MessageState::Discovered, e);
                }
            }
        }

        let subfolders = strategy::resolve_count(
            "subfolder_count",
            || folder.subfolder_count(),
            || folder.subfolder_count_property(),
            |i| matches!(folder.subfolder(i), Ok(Some(_))),
            self.options.max_scan,
        );
        for index in 0..subfolders.count {
            match probe("subfolder", folder.subfolder(index)) {
                Some(sub) => {
                    if self.walk_folder(sub.as_ref(), &path).is_break() {
                        return ControlFlow::Break(());
                    }
                }
                None => debug!(folder = %path, index, "Subfolder unavailable"),
            }
        }

        ControlFlow::Continue(())
    }

    /// Assign the next id to a newly discovered message.
    fn discover(&mut self) -> MessageId {
        let id = self.next_id;
        self.next_id = id.next();
        self.summary.discovered += 1;
        id
    }

    fn process_message(&mut self, message: &dyn ArchiveMessage, folder: &str) {
        let id = self.discover();

        if self.progress.contains(id) {
            self.summary.skipped += 1;
            self.emit(ExtractEvent::Message {
                id,
                outcome: &MessageOutcome::AlreadyProcessed,
            });
            return;
        }

        // Leftovers of a run that crashed mid-message.
        self.writer.discard_message(id);

        match self.extract_message(id, message, folder) {
            Ok(metadata) => {
                self.progress.mark_processed(id);
                trace_state(id, MessageState::Checkpointed);
                let written = metadata.attachments.len();
                let skipped = metadata
                    .attachment_count
                    .unwrap_or(written)
                    .saturating_sub(written);
                self.summary.extracted += 1;
                self.summary.attachments_written += written;
                self.summary.attachments_skipped += skipped;
                self.checkpoint_if_due();
                self.emit(ExtractEvent::Message {
                    id,
                    outcome: &MessageOutcome::Extracted {
                        attachments: written,
                        attachments_skipped: skipped,
                    },
                });
            }
            Err(failure) => {
                self.writer.discard_message(id);
                self.fail(id, failure.state, failure.error);
            }
        }
    }

    fn fail(&mut self, id: MessageId, state: MessageState, error: PolicyMailError) {
        warn!(id = %id, state = ?state, error = %error, "Message extraction failed");
        self.summary.failed += 1;
        self.emit(ExtractEvent::Message {
            id,
            outcome: &MessageOutcome::Failed {
                state,
                reason: error.to_string(),
            },
        });
    }

    fn checkpoint_if_due(&mut self) {
        self.since_checkpoint += 1;
        if self.since_checkpoint < self.options.checkpoint_interval.max(1) {
            return;
        }
        match self.writer.save_progress(&mut self.progress) {
            Ok(()) => self.since_checkpoint = 0,
            Err(e) => warn!(error = %e, "Checkpoint failed, will retry"),
        }
    }

    fn extract_message(
        &self,
        id: MessageId,
        message: &dyn ArchiveMessage,
        folder: &str,
    ) -> std::result::Result<MessageMetadata, MessageFailure> {
        let subject = probe_text("subject", message.subject());
        let sender_name = probe_text("sender_name", message.sender_name());
        let sender_email = probe_text("sender_email", message.sender_email());
        let delivery_time = probe("delivery_time", message.delivery_time());

        let html = body_text("html_body", message.html_body());
        let plain = body_text("plain_body", message.plain_body())
            .or_else(|| html.as_deref().map(html_to_text));
        trace_state(id, MessageState::BodyExtracted);

        let (attachments, attachment_count) = self.extract_attachments(id, message);
        let state = MessageState::AttachmentsExtracted;
        trace_state(id, state);

        let headers = ContainerHeaders {
            subject: subject.as_deref(),
            sender_name: sender_name.as_deref(),
            sender_email: sender_email.as_deref(),
            date: delivery_time,
        };
        let eml_file = container::synthesize(&headers, plain.as_deref(), html.as_deref())
            .and_then(|raw| self.writer.write_container(id, &raw))
            .map_err(|error| MessageFailure { state, error })?;

        let metadata = MessageMetadata {
            id,
            folder: folder.to_string(),
            subject,
            sender_name,
            sender_email,
            delivery_time,
            creation_time: probe("creation_time", message.creation_time()),
            modification_time: probe("modification_time", message.modification_time()),
            size: probe("size", message.size()),
            attachment_count: Some(attachment_count),
            attachments,
            eml_file: Some(eml_file),
            plain_text_length: plain.as_deref().map_or(0, |p| p.chars().count()),
            html_content_length: html.as_deref().map_or(0, |h| h.chars().count()),
            extraction_date: Some(Utc::now()),
        };
        self.writer
            .write_metadata(&metadata)
            .map_err(|error| MessageFailure { state, error })?;
        trace_state(id, MessageState::Persisted);

        Ok(metadata)
    }

    /// Write every readable attachment; returns the records and the count
    /// the archive reported.
    fn extract_attachments(
        &self,
        id: MessageId,
        message: &dyn ArchiveMessage,
    ) -> (Vec<AttachmentRecord>, usize) {
        let resolved = strategy::resolve_count(
            "attachment_count",
            || message.attachment_count(),
            || message.attachment_count_property(),
            |i| matches!(message.attachment(i), Ok(Some(_))),
            self.options.max_scan,
        );

        let mut records = Vec::with_capacity(resolved.count);
        for index in 0..resolved.count {
            let Some(attachment) = probe("attachment", message.attachment(index)) else {
                warn!(id = %id, index, "Attachment unavailable, skipping");
                continue;
            };
            let filename = attachment_name(attachment.as_ref(), index);
            let len = probe("attachment.size", attachment.size()).unwrap_or(u64::MAX);
            let Some(data) = probe("attachment.read", attachment.read(len)) else {
                warn!(id = %id, attachment = %filename, "Attachment unreadable, skipping");
                continue;
            };
            match self.writer.write_attachment(id, &filename, &data) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    id = %id,
                    attachment = %filename,
                    error = %e,
                    "Cannot write attachment, skipping"
                ),
            }
        }
        (records, resolved.count)
    }
}

/// Decode a body accessor result, treating blank bodies as absent.
fn body_text(accessor: &str, result: crate::archive::Probe<BodyPayload>) -> Option<String> {
    probe(accessor, result)
        .map(BodyPayload::into_text)
        .filter(|text| !text.trim().is_empty())
}

fn trace_state(id: MessageId, state: MessageState) {
    debug!(id = %id, state = ?state, "Message state");
}
