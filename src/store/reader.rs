//! Read-only view of the store with an id index and an LRU body cache.

use std::collections::{BTreeMap, BTreeSet};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use lru::LruCache;
use tracing::{debug, warn};

use crate::error::{PolicyMailError, Result};
use crate::model::message::{MessageId, MessageMetadata};
use crate::parser::mime::{self, MessageBody};
use crate::store::json;
use crate::store::layout::StoreLayout;

/// Default number of parsed bodies kept in the LRU cache.
pub const DEFAULT_CACHE_SIZE: usize = 50;

/// Reads committed messages from the store.
///
/// Only ids listed in `progress.json` are visible. The `id → metadata path`
/// index is built once on open; a committed id without a metadata file is
/// still listed by [`StoreReader::ids`] so that callers can report it.
pub struct StoreReader {
    layout: StoreLayout,
    committed: BTreeSet<MessageId>,
    index: BTreeMap<MessageId, PathBuf>,
    cache: LruCache<MessageId, MessageBody>,
}

impl StoreReader {
    /// Open the store rooted at `root`. A store without `progress.json` is
    /// empty.
    pub fn open(root: impl Into<PathBuf>, cache_size: usize) -> Result<Self> {
        let layout = StoreLayout::new(root);
        if !layout.root().is_dir() {
            return Err(PolicyMailError::io(
                layout.root(),
                std::io::Error::new(std::io::ErrorKind::NotFound, "store directory not found"),
            ));
        }

        let committed = layout.load_progress().processed_emails;
        let index: BTreeMap<MessageId, PathBuf> = committed
            .iter()
            .map(|&id| (id, layout.metadata_path(id)))
            .filter(|(id, path)| {
                let present = path.is_file();
                if !present {
                    warn!(id = %id, "Committed message has no metadata record");
                }
                present
            })
            .collect();
        debug!(
            committed = committed.len(),
            indexed = index.len(),
            "Store index built"
        );

        let cache_size = NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN);
        Ok(Self {
            layout,
            committed,
            index,
            cache: LruCache::new(cache_size),
        })
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Every committed id, ascending.
    pub fn ids(&self) -> Vec<MessageId> {
        self.committed.iter().copied().collect()
    }

    /// Number of committed messages.
    pub fn len(&self) -> usize {
        self.committed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.committed.is_empty()
    }

    /// Load the metadata record of a committed message.
    pub fn metadata(&self, id: MessageId) -> Result<MessageMetadata> {
        let path = self
            .index
            .get(&id)
            .ok_or(PolicyMailError::MetadataNotFound(id))?;
        json::read_json(path)
    }

    /// Parsed bodies of the stored container. A missing or unreadable
    /// container yields empty bodies.
    pub fn body(&mut self, id: MessageId) -> &MessageBody {
        let path = self.layout.eml_path(id);
        self.cache.get_or_insert(id, || load_body(id, &path))
    }

    /// Attachment files stored for `id`, sorted by file name.
    pub fn attachment_files(&self, id: MessageId) -> Vec<PathBuf> {
        let dir = self.layout.message_attachments_dir(id);
        let Ok(entries) = std::fs::read_dir(&dir) else {
            return Vec::new();
        };
        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .collect();
        files.sort();
        files
    }
}

fn load_body(id: MessageId, path: &Path) -> MessageBody {
    match std::fs::read(path) {
        Ok(raw) => mime::parse_message_body(&raw),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(id = %id, "No stored container, using empty body");
            MessageBody::default()
        }
        Err(e) => {
            warn!(id = %id, path = %path.display(), error = %e, "Cannot read container");
            MessageBody::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::progress::ProgressState;
    use crate::store::StoreWriter;

    fn committed_store(ids: &[u64]) -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        let writer = StoreWriter::create(tmp.path()).unwrap();
        let mut progress = ProgressState::default();
        for &n in ids {
            let id = MessageId(n);
            writer
                .write_metadata(&MessageMetadata {
                    id,
                    subject: Some(format!("Mensaje {n}")),
                    ..Default::default()
                })
                .unwrap();
            writer
                .write_container(id, b"Subject: x\r\n\r\nHola mundo\r\n")
                .unwrap();
            progress.mark_processed(id);
        }
        writer.save_progress(&mut progress).unwrap();
        tmp
    }

    #[test]
    fn test_only_committed_ids_are_visible() {
        let tmp = committed_store(&[1, 2]);
        // Leftover of an interrupted run.
        let writer = StoreWriter::create(tmp.path()).unwrap();
        writer
            .write_metadata(&MessageMetadata {
                id: MessageId(3),
                ..Default::default()
            })
            .unwrap();

        let reader = StoreReader::open(tmp.path(), 4).unwrap();
        assert_eq!(reader.ids(), vec![MessageId(1), MessageId(2)]);
        assert!(matches!(
            reader.metadata(MessageId(3)),
            Err(PolicyMailError::MetadataNotFound(_))
        ));
        assert_eq!(reader.metadata(MessageId(2)).unwrap().subject(), "Mensaje 2");
    }

    #[test]
    fn test_missing_metadata_is_reported() {
        let tmp = committed_store(&[1]);
        std::fs::remove_file(StoreLayout::new(tmp.path()).metadata_path(MessageId(1))).unwrap();

        let reader = StoreReader::open(tmp.path(), 4).unwrap();
        assert_eq!(reader.len(), 1);
        assert!(matches!(
            reader.metadata(MessageId(1)),
            Err(PolicyMailError::MetadataNotFound(MessageId(1)))
        ));
    }

    #[test]
    fn test_body_is_cached_and_tolerates_missing_container() {
        let tmp = committed_store(&[1]);
        let mut reader = StoreReader::open(tmp.path(), 1).unwrap();
        assert_eq!(reader.body(MessageId(1)).text().trim(), "Hola mundo");
        assert_eq!(reader.body(MessageId(9)).text(), "");
    }

    #[test]
    fn test_attachment_files_sorted() {
        let tmp = committed_store(&[1]);
        let writer = StoreWriter::create(tmp.path()).unwrap();
        writer.write_attachment(MessageId(1), "b.pdf", b"b").unwrap();
        writer.write_attachment(MessageId(1), "a.pdf", b"a").unwrap();

        let reader = StoreReader::open(tmp.path(), 4).unwrap();
        let names: Vec<_> = reader
            .attachment_files(MessageId(1))
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.pdf", "b.pdf"]);
        assert!(reader.attachment_files(MessageId(2)).is_empty());
    }
}
