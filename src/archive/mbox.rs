//! File-backed archive: MBOX files, single `.eml` messages and
//! directories of both.
//!
//! - A `.eml` file is a root folder holding one message.
//! - Any other file is read as MBOX; each message is one archive message.
//! - A directory is a folder. Its subdirectories and MBOX files become
//!   subfolders and its `.eml` files become messages, all in name order.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::{Archive, ArchiveAttachment, ArchiveFolder, ArchiveMessage, BodyPayload, Probe};
use crate::error::{PolicyMailError, Result};
use crate::parser::mbox::{MboxScanner, MessageSpan};
use crate::parser::mime::{self, ParsedAttachment, ParsedMail};

/// Archive rooted at a file or directory on disk.
pub struct MboxArchive {
    root: PathBuf,
}

impl MboxArchive {
    /// Open the archive at `path`. Nothing is parsed until the tree is walked.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        if !root.exists() {
            return Err(PolicyMailError::ArchiveNotFound(root));
        }
        Ok(Self { root })
    }
}

impl Archive for MboxArchive {
    fn root(&self) -> Result<Box<dyn ArchiveFolder + '_>> {
        let folder = FsFolder::load(&self.root).map_err(|e| PolicyMailError::ArchiveOpen {
            path: self.root.clone(),
            reason: e.to_string(),
        })?;
        Ok(Box::new(folder))
    }
}

/// Where the bytes of one message live.
enum MessageSource {
    Eml(PathBuf),
    Mbox {
        scanner: Arc<MboxScanner>,
        span: MessageSpan,
    },
}

struct FsFolder {
    name: String,
    subfolders: Vec<PathBuf>,
    messages: Vec<MessageSource>,
}

impl FsFolder {
    fn load(path: &Path) -> Result<Self> {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        if path.is_dir() {
            return Self::load_dir(path, name);
        }
        if is_eml(path) {
            return Ok(Self {
                name,
                subfolders: Vec::new(),
                messages: vec![MessageSource::Eml(path.to_path_buf())],
            });
        }

        let scanner = Arc::new(MboxScanner::new(path)?);
        let spans = scanner.scan()?;
        let messages = spans
            .into_iter()
            .map(|span| MessageSource::Mbox {
                scanner: Arc::clone(&scanner),
                span,
            })
            .collect();
        Ok(Self {
            name,
            subfolders: Vec::new(),
            messages,
        })
    }

    fn load_dir(path: &Path, name: String) -> Result<Self> {
        let mut entries: Vec<PathBuf> = std::fs::read_dir(path)
            .map_err(|e| PolicyMailError::io(path, e))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                !p.file_name()
                    .is_some_and(|n| n.to_string_lossy().starts_with('.'))
            })
            .collect();
        entries.sort();

        let mut subfolders = Vec::new();
        let mut messages = Vec::new();
        for entry in entries {
            if entry.is_dir() || is_mbox(&entry) {
                subfolders.push(entry);
            } else if is_eml(&entry) {
                messages.push(MessageSource::Eml(entry));
            }
        }
        Ok(Self {
            name,
            subfolders,
            messages,
        })
    }
}

impl ArchiveFolder for FsFolder {
    fn name(&self) -> Probe<String> {
        Ok(Some(self.name.clone()).filter(|n| !n.is_empty()))
    }

    fn subfolder_count(&self) -> Probe<usize> {
        Ok(Some(self.subfolders.len()))
    }

    fn subfolder(&self, index: usize) -> Probe<Box<dyn ArchiveFolder + '_>> {
        let Some(path) = self.subfolders.get(index) else {
            return Ok(None);
        };
        let folder = FsFolder::load(path).map_err(|e| PolicyMailError::accessor("subfolder", e))?;
        Ok(Some(Box::new(folder)))
    }

    fn message_count(&self) -> Probe<usize> {
        Ok(Some(self.messages.len()))
    }

    fn message(&self, index: usize) -> Probe<Box<dyn ArchiveMessage + '_>> {
        let Some(source) = self.messages.get(index) else {
            return Ok(None);
        };
        let (raw, file_mtime) = match source {
            MessageSource::Eml(path) => {
                let raw = std::fs::read(path).map_err(|e| PolicyMailError::accessor("message", e))?;
                let mtime = std::fs::metadata(path)
                    .and_then(|m| m.modified())
                    .ok()
                    .map(DateTime::<Utc>::from);
                (raw, mtime)
            }
            MessageSource::Mbox { scanner, span } => (
                scanner
                    .read_message(*span)
                    .map_err(|e| PolicyMailError::accessor("message", e))?,
                None,
            ),
        };
        let mail = mime::parse_mail(&raw)
            .ok_or_else(|| PolicyMailError::accessor("message", "unparseable message"))?;
        Ok(Some(Box::new(FsMessage { mail, file_mtime })))
    }
}

struct FsMessage {
    mail: ParsedMail,
    file_mtime: Option<DateTime<Utc>>,
}

impl ArchiveMessage for FsMessage {
    fn subject(&self) -> Probe<String> {
        Ok(self.mail.subject.clone())
    }

    fn sender_name(&self) -> Probe<String> {
        Ok(self.mail.from_name.clone())
    }

    fn sender_email(&self) -> Probe<String> {
        Ok(self.mail.from_address.clone())
    }

    fn delivery_time(&self) -> Probe<DateTime<Utc>> {
        Ok(self.mail.date)
    }

    // MIME carries no creation time.
    fn creation_time(&self) -> Probe<DateTime<Utc>> {
        Ok(None)
    }

    fn modification_time(&self) -> Probe<DateTime<Utc>> {
        Ok(self.file_mtime)
    }

    fn size(&self) -> Probe<u64> {
        Ok(Some(self.mail.size))
    }

    fn plain_body(&self) -> Probe<BodyPayload> {
        Ok(self.mail.body.plain.clone().map(BodyPayload::Text))
    }

    fn html_body(&self) -> Probe<BodyPayload> {
        Ok(self.mail.body.html.clone().map(BodyPayload::Text))
    }

    fn attachment_count(&self) -> Probe<usize> {
        Ok(Some(self.mail.attachments.len()))
    }

    fn attachment(&self, index: usize) -> Probe<Box<dyn ArchiveAttachment + '_>> {
        Ok(self
            .mail
            .attachments
            .get(index)
            .map(|a| Box::new(FsAttachment(a)) as Box<dyn ArchiveAttachment + '_>))
    }
}

struct FsAttachment<'a>(&'a ParsedAttachment);

impl ArchiveAttachment for FsAttachment<'_> {
    fn name(&self) -> Probe<String> {
        Ok(self.0.name.clone())
    }

    fn size(&self) -> Probe<u64> {
        Ok(Some(self.0.data.len() as u64))
    }

    fn read(&self, len: u64) -> Probe<Vec<u8>> {
        let end = usize::try_from(len)
            .unwrap_or(usize::MAX)
            .min(self.0.data.len());
        Ok(Some(self.0.data[..end].to_vec()))
    }
}

fn has_extension(path: &Path, wanted: &[&str]) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|e| wanted.contains(&e.as_str()))
}

fn is_eml(path: &Path) -> bool {
    has_extension(path, &["eml"])
}

fn is_mbox(path: &Path) -> bool {
    has_extension(path, &["mbox", "mbx"])
}

#[cfg(test)]
mod tests {
    use super::*;

    const MBOX: &str = "From a@b.com Thu Jan 01 00:00:00 2024\n\
From: Ana <ana@agencia.mx>\n\
Subject: COTIZACION AGENTE 5\n\
Date: Mon, 12 Feb 2024 10:00:00 +0000\n\
\n\
Cuerpo uno\n\
\n\
From c@d.com Thu Jan 01 00:00:00 2024\n\
From: luis@agencia.mx\n\
Subject: RENOVACION POLIZA 9\n\
\n\
Cuerpo dos\n";

    #[test]
    fn test_single_mbox_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("Inbox.mbox");
        std::fs::write(&path, MBOX).unwrap();

        let archive = MboxArchive::open(&path).unwrap();
        let root = archive.root().unwrap();
        assert_eq!(root.name().unwrap().as_deref(), Some("Inbox"));
        assert_eq!(root.message_count().unwrap(), Some(2));

        let first = root.message(0).unwrap().unwrap();
        assert_eq!(first.subject().unwrap().as_deref(), Some("COTIZACION AGENTE 5"));
        assert_eq!(first.sender_name().unwrap().as_deref(), Some("Ana"));
        assert!(first.delivery_time().unwrap().is_some());

        let second = root.message(1).unwrap().unwrap();
        assert_eq!(second.sender_email().unwrap().as_deref(), Some("luis@agencia.mx"));
        assert!(root.message(2).unwrap().is_none());
    }

    #[test]
    fn test_directory_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("archive");
        std::fs::create_dir_all(dir.join("Sub")).unwrap();
        std::fs::write(dir.join("b.eml"), "Subject: B\r\n\r\nbody\r\n").unwrap();
        std::fs::write(dir.join("a.eml"), "Subject: A\r\n\r\nbody\r\n").unwrap();
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();
        std::fs::write(dir.join("Sub").join("c.eml"), "Subject: C\r\n\r\nbody\r\n").unwrap();

        let archive = MboxArchive::open(&dir).unwrap();
        let root = archive.root().unwrap();
        assert_eq!(root.message_count().unwrap(), Some(2));
        assert_eq!(root.subfolder_count().unwrap(), Some(1));
        let a = root.message(0).unwrap().unwrap();
        assert_eq!(a.subject().unwrap().as_deref(), Some("A"));
        assert!(a.modification_time().unwrap().is_some());

        let sub = root.subfolder(0).unwrap().unwrap();
        assert_eq!(sub.name().unwrap().as_deref(), Some("Sub"));
        assert_eq!(sub.message_count().unwrap(), Some(1));
    }

    #[test]
    fn test_missing_archive() {
        assert!(matches!(
            MboxArchive::open("/no/such/archive.mbox"),
            Err(PolicyMailError::ArchiveNotFound(_))
        ));
    }
}
