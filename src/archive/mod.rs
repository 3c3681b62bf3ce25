//! The archive capability consumed by extraction.
//!
//! Archive implementations expose their folder/message/attachment tree
//! inconsistently: an accessor may be missing on one archive and raise on
//! another. Every accessor therefore returns a [`Probe`]:
//!
//! - `Ok(Some(value))`: available
//! - `Ok(None)`: not offered by this archive (or empty)
//! - `Err(_)`: the accessor raised
//!
//! Callers never treat `Ok(None)` or `Err` as fatal; see [`strategy`] for
//! the declared fallback order used to count children.

pub mod mbox;
pub mod memory;
pub mod strategy;

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::parser::mime::decode_lossy;

pub use mbox::MboxArchive;
pub use memory::MemoryArchive;

/// Outcome of calling one archive accessor.
pub type Probe<T> = Result<Option<T>>;

/// A message body as handed out by the archive.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyPayload {
    Text(String),
    Bytes(Vec<u8>),
}

impl BodyPayload {
    /// Decode into text; byte payloads are decoded lossily.
    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Bytes(bytes) => decode_lossy(&bytes),
        }
    }
}

/// An opened archive.
pub trait Archive {
    /// The top of the folder tree. Failure here is fatal for a run.
    fn root(&self) -> Result<Box<dyn ArchiveFolder + '_>>;
}

/// A folder of the archive tree.
pub trait ArchiveFolder {
    fn name(&self) -> Probe<String>;

    /// Primary subfolder count accessor.
    fn subfolder_count(&self) -> Probe<usize>;

    /// Property-style subfolder count, offered by some archives only.
    fn subfolder_count_property(&self) -> Probe<usize> {
        Ok(None)
    }

    fn subfolder(&self, index: usize) -> Probe<Box<dyn ArchiveFolder + '_>>;

    /// Primary message count accessor.
    fn message_count(&self) -> Probe<usize>;

    /// Property-style message count, offered by some archives only.
    fn message_count_property(&self) -> Probe<usize> {
        Ok(None)
    }

    fn message(&self, index: usize) -> Probe<Box<dyn ArchiveMessage + '_>>;
}

/// A message of the archive.
pub trait ArchiveMessage {
    fn subject(&self) -> Probe<String>;
    fn sender_name(&self) -> Probe<String>;
    fn sender_email(&self) -> Probe<String>;
    fn delivery_time(&self) -> Probe<DateTime<Utc>>;
    fn creation_time(&self) -> Probe<DateTime<Utc>>;
    fn modification_time(&self) -> Probe<DateTime<Utc>>;
    fn size(&self) -> Probe<u64>;
    fn plain_body(&self) -> Probe<BodyPayload>;
    fn html_body(&self) -> Probe<BodyPayload>;

    /// Primary attachment count accessor.
    fn attachment_count(&self) -> Probe<usize>;

    /// Property-style attachment count, offered by some archives only.
    fn attachment_count_property(&self) -> Probe<usize> {
        Ok(None)
    }

    fn attachment(&self, index: usize) -> Probe<Box<dyn ArchiveAttachment + '_>>;
}

/// An attachment of an archive message.
pub trait ArchiveAttachment {
    fn name(&self) -> Probe<String>;

    /// Alternate long filename, used when `name` is unavailable.
    fn long_filename(&self) -> Probe<String> {
        Ok(None)
    }

    fn size(&self) -> Probe<u64>;

    /// Read up to `len` bytes of content.
    fn read(&self, len: u64) -> Probe<Vec<u8>>;
}

/// Open the archive at `path` with the built-in file backend.
pub fn open(path: &Path) -> Result<Box<dyn Archive>> {
    Ok(Box::new(MboxArchive::open(path)?))
}
