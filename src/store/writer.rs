//! Append-only store writer used by the extraction pipeline.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::{PolicyMailError, Result};
use crate::model::attachment::AttachmentRecord;
use crate::model::message::{MessageId, MessageMetadata};
use crate::model::progress::ProgressState;
use crate::store::json;
use crate::store::layout::StoreLayout;

/// Longest attachment filename kept on disk, in characters.
const MAX_FILENAME_CHARS: usize = 150;
const MAX_EXTENSION_CHARS: usize = 10;

/// Writes extracted messages into the store.
///
/// Per message, attachments and the container are written first and the
/// metadata record last; the caller records the id in [`ProgressState`]
/// only after [`StoreWriter::write_metadata`] succeeded.
pub struct StoreWriter {
    layout: StoreLayout,
}

impl StoreWriter {
    /// Open (creating if needed) the store rooted at `root`.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let layout = StoreLayout::new(root);
        for dir in [
            layout.emails_dir(),
            layout.attachments_dir(),
            layout.metadata_dir(),
        ] {
            std::fs::create_dir_all(&dir).map_err(|e| PolicyMailError::io(&dir, e))?;
        }
        Ok(Self { layout })
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Load the progress state of a previous run, if any.
    pub fn load_progress(&self) -> ProgressState {
        self.layout.load_progress()
    }

    /// Durably checkpoint `state`.
    pub fn save_progress(&self, state: &mut ProgressState) -> Result<()> {
        state.touch(Utc::now());
        let path = self.layout.progress_path();
        json::write_json_atomic(&path, state)?;
        debug!(path = %path.display(), processed = state.total_processed, "Progress saved");
        Ok(())
    }

    /// Remove every output of `id`. Used before re-extracting an id that a
    /// crashed run left half-written, and after a failed extraction.
    pub fn discard_message(&self, id: MessageId) {
        let dir = self.layout.message_attachments_dir(id);
        if dir.exists() {
            if let Err(e) = std::fs::remove_dir_all(&dir) {
                warn!(id = %id, path = %dir.display(), error = %e, "Could not remove attachments");
            }
        }
        for path in [self.layout.eml_path(id), self.layout.metadata_path(id)] {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(&path) {
                    warn!(id = %id, path = %path.display(), error = %e, "Could not remove file");
                }
            }
        }
    }

    /// Write one attachment under `attachments/<id>/`.
    ///
    /// A second attachment with the same name never overwrites the first:
    /// it gets a `_1`, `_2`, … suffix before the extension.
    pub fn write_attachment(
        &self,
        id: MessageId,
        filename: &str,
        data: &[u8],
    ) -> Result<AttachmentRecord> {
        let dir = self.layout.message_attachments_dir(id);
        std::fs::create_dir_all(&dir).map_err(|e| PolicyMailError::io(&dir, e))?;

        let path = free_path(&dir, &safe_filename(filename));
        std::fs::write(&path, data).map_err(|e| PolicyMailError::io(&path, e))?;

        Ok(AttachmentRecord {
            filename: filename.to_string(),
            size: data.len() as u64,
            path: self.layout.relative(&path),
        })
    }

    /// Write the synthesized container and return its store-relative path.
    pub fn write_container(&self, id: MessageId, data: &[u8]) -> Result<String> {
        let path = self.layout.eml_path(id);
        std::fs::write(&path, data).map_err(|e| PolicyMailError::io(&path, e))?;
        Ok(self.layout.relative(&path))
    }

    /// Atomically write the metadata record. This is the last write of a
    /// message.
    pub fn write_metadata(&self, metadata: &MessageMetadata) -> Result<()> {
        let path = self.layout.metadata_path(metadata.id);
        json::write_json_atomic(&path, metadata)?;
        info!(id = %metadata.id, attachments = metadata.attachments.len(), "Message stored");
        Ok(())
    }
}

/// Make an archive-provided name safe to use as a single path component.
///
/// Path separators, reserved characters and control characters become `_`.
/// Spaces and accents are kept: attachment classification matches on
/// words in the filename.
pub fn safe_filename(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = truncate_keeping_extension(cleaned);

    match cleaned.as_str() {
        "" | "." | ".." => "attachment".to_string(),
        _ => cleaned,
    }
}

/// Long names lose the end of their stem; a short extension survives so
/// the file is still recognized by type.
fn truncate_keeping_extension(name: String) -> String {
    if name.chars().count() <= MAX_FILENAME_CHARS {
        return name;
    }
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && ext.chars().count() <= MAX_EXTENSION_CHARS => {
            let keep = MAX_FILENAME_CHARS - ext.chars().count() - 1;
            let stem: String = stem.chars().take(keep).collect();
            format!("{}.{ext}", stem.trim_end())
        }
        _ => name.chars().take(MAX_FILENAME_CHARS).collect(),
    }
}

/// `dir/name`, or the first free `<stem>_<n>.<ext>` next to it.
fn free_path(dir: &Path, name: &str) -> PathBuf {
    let first = dir.join(name);
    if !first.exists() {
        return first;
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };
    (1u32..)
        .map(|n| match ext {
            Some(ext) => dir.join(format!("{stem}_{n}.{ext}")),
            None => dir.join(format!("{stem}_{n}")),
        })
        .find(|candidate| !candidate.exists())
        .unwrap_or(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_filename() {
        assert_eq!(safe_filename("SLIP RC.xlsx"), "SLIP RC.xlsx");
        assert_eq!(safe_filename("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(safe_filename("a:b*c?.pdf"), "a_b_c_.pdf");
        assert_eq!(safe_filename("  "), "attachment");
        assert_eq!(safe_filename(".."), "attachment");
        assert_eq!(safe_filename("Póliza 1.pdf"), "Póliza 1.pdf");
    }

    #[test]
    fn test_long_filename_keeps_extension() {
        let long = format!("{} SLIP.xlsx", "ñ".repeat(160));
        let safe = safe_filename(&long);
        assert_eq!(safe.chars().count(), MAX_FILENAME_CHARS);
        assert!(safe.ends_with(".xlsx"));
        assert!(safe.starts_with("ñññ"));

        let no_ext = "x".repeat(200);
        assert_eq!(safe_filename(&no_ext).len(), MAX_FILENAME_CHARS);

        let odd_ext = format!("a.{}", "b".repeat(200));
        assert_eq!(safe_filename(&odd_ext).chars().count(), MAX_FILENAME_CHARS);
    }

    #[test]
    fn test_duplicate_names_are_preserved() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = StoreWriter::create(tmp.path()).unwrap();
        let id = MessageId(1);

        let first = writer.write_attachment(id, "cot.pdf", b"one").unwrap();
        let second = writer.write_attachment(id, "cot.pdf", b"two").unwrap();
        let third = writer.write_attachment(id, "cot.pdf", b"three").unwrap();

        assert_eq!(first.path, "attachments/email_000001/cot.pdf");
        assert_eq!(second.path, "attachments/email_000001/cot_1.pdf");
        assert_eq!(third.path, "attachments/email_000001/cot_2.pdf");
        assert_eq!(second.filename, "cot.pdf");
        let bare = writer.write_attachment(id, "README", b"a").unwrap();
        let bare_again = writer.write_attachment(id, "README", b"b").unwrap();
        assert_eq!(bare.path, "attachments/email_000001/README");
        assert_eq!(bare_again.path, "attachments/email_000001/README_1");
        assert_eq!(
            std::fs::read(tmp.path().join(&second.path)).unwrap(),
            b"two"
        );
    }

    #[test]
    fn test_discard_message_removes_all_outputs() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = StoreWriter::create(tmp.path()).unwrap();
        let id = MessageId(4);

        writer.write_attachment(id, "a.pdf", b"x").unwrap();
        writer.write_container(id, b"Subject: x\r\n\r\n").unwrap();
        writer
            .write_metadata(&MessageMetadata {
                id,
                ..Default::default()
            })
            .unwrap();

        writer.discard_message(id);

        let layout = writer.layout();
        assert!(!layout.message_attachments_dir(id).exists());
        assert!(!layout.eml_path(id).exists());
        assert!(!layout.metadata_path(id).exists());
    }

    #[test]
    fn test_save_progress_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = StoreWriter::create(tmp.path()).unwrap();
        let mut state = ProgressState::default();
        state.mark_processed(MessageId(1));
        writer.save_progress(&mut state).unwrap();

        let loaded = writer.load_progress();
        assert!(loaded.contains(MessageId(1)));
        assert_eq!(loaded.total_processed, 1);
        assert!(loaded.last_update.is_some());
    }
}
