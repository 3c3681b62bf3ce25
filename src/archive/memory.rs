//! In-memory archive with per-accessor fault injection.
//!
//! Used to exercise extraction against archives that lack accessors or
//! whose accessors raise, without needing a real archive file.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use super::{Archive, ArchiveAttachment, ArchiveFolder, ArchiveMessage, BodyPayload, Probe};
use crate::error::{PolicyMailError, Result};

/// How an injected accessor behaves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Access {
    /// Returns its value.
    #[default]
    Available,
    /// Reports nothing (`Ok(None)`).
    Missing,
    /// Raises.
    Raises,
}

impl Access {
    fn apply<T>(self, accessor: &'static str, value: impl FnOnce() -> Option<T>) -> Probe<T> {
        match self {
            Self::Available => Ok(value()),
            Self::Missing => Ok(None),
            Self::Raises => Err(PolicyMailError::accessor(accessor, "injected failure")),
        }
    }
}

/// Archive whose whole tree lives in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryArchive {
    root: MemoryFolder,
    root_fails: bool,
}

impl MemoryArchive {
    pub fn new(root: MemoryFolder) -> Self {
        Self {
            root,
            root_fails: false,
        }
    }

    /// An archive whose root folder cannot be retrieved.
    pub fn unreadable() -> Self {
        Self {
            root: MemoryFolder::default(),
            root_fails: true,
        }
    }
}

impl Archive for MemoryArchive {
    fn root(&self) -> Result<Box<dyn ArchiveFolder + '_>> {
        if self.root_fails {
            return Err(PolicyMailError::accessor("root", "injected failure"));
        }
        Ok(Box::new(&self.root))
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryFolder {
    name: Option<String>,
    subfolders: Vec<MemoryFolder>,
    messages: Vec<MemoryMessage>,
    count_method: Access,
    count_property: Access,
}

impl MemoryFolder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// A folder whose name accessor reports nothing.
    pub fn unnamed() -> Self {
        Self::default()
    }

    pub fn with_subfolder(mut self, folder: MemoryFolder) -> Self {
        self.subfolders.push(folder);
        self
    }

    pub fn with_message(mut self, message: MemoryMessage) -> Self {
        self.messages.push(message);
        self
    }

    /// Control the subfolder and message count accessors. The property
    /// accessor is missing unless set here.
    pub fn with_counts(mut self, method: Access, property: Access) -> Self {
        self.count_method = method;
        self.count_property = property;
        self
    }
}

impl ArchiveFolder for &MemoryFolder {
    fn name(&self) -> Probe<String> {
        Ok(self.name.clone())
    }

    fn subfolder_count(&self) -> Probe<usize> {
        self.count_method
            .apply("subfolder_count", || Some(self.subfolders.len()))
    }

    fn subfolder_count_property(&self) -> Probe<usize> {
        match self.count_property {
            Access::Available if self.count_method != Access::Available => {
                Ok(Some(self.subfolders.len()))
            }
            Access::Raises => Err(PolicyMailError::accessor(
                "subfolder_count_property",
                "injected failure",
            )),
            _ => Ok(None),
        }
    }

    fn subfolder(&self, index: usize) -> Probe<Box<dyn ArchiveFolder + '_>> {
        Ok(self
            .subfolders
            .get(index)
            .map(|f| Box::new(f) as Box<dyn ArchiveFolder + '_>))
    }

    fn message_count(&self) -> Probe<usize> {
        self.count_method
            .apply("message_count", || Some(self.messages.len()))
    }

    fn message_count_property(&self) -> Probe<usize> {
        match self.count_property {
            Access::Available if self.count_method != Access::Available => {
                Ok(Some(self.messages.len()))
            }
            Access::Raises => Err(PolicyMailError::accessor(
                "message_count_property",
                "injected failure",
            )),
            _ => Ok(None),
        }
    }

    fn message(&self, index: usize) -> Probe<Box<dyn ArchiveMessage + '_>> {
        Ok(self
            .messages
            .get(index)
            .map(|m| Box::new(m) as Box<dyn ArchiveMessage + '_>))
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryMessage {
    subject: Option<String>,
    sender_name: Option<String>,
    sender_email: Option<String>,
    delivery_time: Option<DateTime<Utc>>,
    creation_time: Option<DateTime<Utc>>,
    modification_time: Option<DateTime<Utc>>,
    size: Option<u64>,
    plain: Option<BodyPayload>,
    html: Option<BodyPayload>,
    attachments: Vec<MemoryAttachment>,
    attachment_count: Access,
    attachment_count_property: Access,
    raising: HashSet<&'static str>,
}

impl MemoryMessage {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: Some(subject.into()),
            ..Default::default()
        }
    }

    pub fn sender(mut self, name: Option<&str>, email: Option<&str>) -> Self {
        self.sender_name = name.map(String::from);
        self.sender_email = email.map(String::from);
        self
    }

    pub fn delivered(mut self, at: DateTime<Utc>) -> Self {
        self.delivery_time = Some(at);
        self.creation_time = Some(at);
        self.modification_time = Some(at);
        self
    }

    pub fn size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn plain(mut self, text: impl Into<String>) -> Self {
        self.plain = Some(BodyPayload::Text(text.into()));
        self
    }

    pub fn plain_bytes(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.plain = Some(BodyPayload::Bytes(bytes.into()));
        self
    }

    pub fn html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(BodyPayload::Text(html.into()));
        self
    }

    pub fn attachment(mut self, attachment: MemoryAttachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Control the attachment count accessors.
    pub fn with_attachment_counts(mut self, method: Access, property: Access) -> Self {
        self.attachment_count = method;
        self.attachment_count_property = property;
        self
    }

    /// Make the named accessor raise (`"subject"`, `"sender_name"`,
    /// `"sender_email"`, `"delivery_time"`, `"creation_time"`,
    /// `"modification_time"`, `"size"`, `"plain_body"`, `"html_body"`).
    pub fn raising(mut self, accessor: &'static str) -> Self {
        self.raising.insert(accessor);
        self
    }

    fn field<T: Clone>(&self, accessor: &'static str, value: &Option<T>) -> Probe<T> {
        if self.raising.contains(accessor) {
            return Err(PolicyMailError::accessor(accessor, "injected failure"));
        }
        Ok(value.clone())
    }
}

impl ArchiveMessage for &MemoryMessage {
    fn subject(&self) -> Probe<String> {
        self.field("subject", &self.subject)
    }

    fn sender_name(&self) -> Probe<String> {
        self.field("sender_name", &self.sender_name)
    }

    fn sender_email(&self) -> Probe<String> {
        self.field("sender_email", &self.sender_email)
    }

    fn delivery_time(&self) -> Probe<DateTime<Utc>> {
        self.field("delivery_time", &self.delivery_time)
    }

    fn creation_time(&self) -> Probe<DateTime<Utc>> {
        self.field("creation_time", &self.creation_time)
    }

    fn modification_time(&self) -> Probe<DateTime<Utc>> {
        self.field("modification_time", &self.modification_time)
    }

    fn size(&self) -> Probe<u64> {
        self.field("size", &self.size)
    }

    fn plain_body(&self) -> Probe<BodyPayload> {
        self.field("plain_body", &self.plain)
    }

    fn html_body(&self) -> Probe<BodyPayload> {
        self.field("html_body", &self.html)
    }

    fn attachment_count(&self) -> Probe<usize> {
        self.attachment_count
            .apply("attachment_count", || Some(self.attachments.len()))
    }

    fn attachment_count_property(&self) -> Probe<usize> {
        match self.attachment_count_property {
            Access::Available if self.attachment_count != Access::Available => {
                Ok(Some(self.attachments.len()))
            }
            Access::Raises => Err(PolicyMailError::accessor(
                "attachment_count_property",
                "injected failure",
            )),
            _ => Ok(None),
        }
    }

    fn attachment(&self, index: usize) -> Probe<Box<dyn ArchiveAttachment + '_>> {
        Ok(self
            .attachments
            .get(index)
            .map(|a| Box::new(a) as Box<dyn ArchiveAttachment + '_>))
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryAttachment {
    name: Option<String>,
    long_filename: Option<String>,
    data: Vec<u8>,
    unreadable: bool,
}

impl MemoryAttachment {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: Some(name.into()),
            data: data.into(),
            ..Default::default()
        }
    }

    /// An attachment known only by its long filename.
    pub fn long_named(long_filename: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            long_filename: Some(long_filename.into()),
            data: data.into(),
            ..Default::default()
        }
    }

    /// An attachment with no name at all.
    pub fn nameless(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            ..Default::default()
        }
    }

    /// Reading the content raises.
    pub fn unreadable(mut self) -> Self {
        self.unreadable = true;
        self
    }
}

impl ArchiveAttachment for &MemoryAttachment {
    fn name(&self) -> Probe<String> {
        Ok(self.name.clone())
    }

    fn long_filename(&self) -> Probe<String> {
        Ok(self.long_filename.clone())
    }

    fn size(&self) -> Probe<u64> {
        Ok(Some(self.data.len() as u64))
    }

    fn read(&self, len: u64) -> Probe<Vec<u8>> {
        if self.unreadable {
            return Err(PolicyMailError::accessor("attachment.read", "injected failure"));
        }
        let end = usize::try_from(len).unwrap_or(usize::MAX).min(self.data.len());
        Ok(Some(self.data[..end].to_vec()))
    }
}
