//! Canonical store paths.
//!
//! These paths are read by the presentation layer and must not change.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::model::message::MessageId;
use crate::model::progress::ProgressState;
use crate::store::json;

/// File name of the aggregated classification results.
pub const RESULTS_FILE: &str = "classification_results.json";

/// File name of the human-readable classification report.
pub const REPORT_FILE: &str = "classification_report.txt";

/// Resolves every path of the store below a root directory.
#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn emails_dir(&self) -> PathBuf {
        self.root.join("emails")
    }

    pub fn attachments_dir(&self) -> PathBuf {
        self.root.join("attachments")
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.root.join("metadata")
    }

    pub fn classification_dir(&self) -> PathBuf {
        self.root.join("classification")
    }

    pub fn progress_path(&self) -> PathBuf {
        self.root.join("progress.json")
    }

    /// `emails/<id>.eml`
    pub fn eml_path(&self, id: MessageId) -> PathBuf {
        self.emails_dir().join(format!("{id}.eml"))
    }

    /// `attachments/<id>/`
    pub fn message_attachments_dir(&self, id: MessageId) -> PathBuf {
        self.attachments_dir().join(id.to_string())
    }

    /// `metadata/<id>.json`
    pub fn metadata_path(&self, id: MessageId) -> PathBuf {
        self.metadata_dir().join(format!("{id}.json"))
    }

    /// `classification/classification_results.json`
    pub fn results_path(&self) -> PathBuf {
        self.classification_dir().join(RESULTS_FILE)
    }

    /// `classification/classification_report.txt`
    pub fn report_path(&self) -> PathBuf {
        self.classification_dir().join(REPORT_FILE)
    }

    /// `classification/classification_results_backup_<stamp>.json`
    pub fn results_backup_path(&self, stamp: &str) -> PathBuf {
        self.classification_dir()
            .join(format!("classification_results_backup_{stamp}.json"))
    }

    /// Render `path` relative to the store root with `/` separators,
    /// as stored in metadata records.
    pub fn relative(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Load the persisted progress state.
    ///
    /// A missing file is an empty store. A corrupt file is logged and also
    /// treated as empty: extraction then rewrites every message, which is
    /// safe because per-message writes are idempotent.
    pub fn load_progress(&self) -> ProgressState {
        let path = self.progress_path();
        if !path.exists() {
            return ProgressState::default();
        }
        match json::read_json::<ProgressState>(&path) {
            Ok(state) => state,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable progress file, starting empty");
                ProgressState::default()
            }
        }
    }
}
