//! Streaming MBOX scanner.
//!
//! One pass over the file records the byte span of every message; the
//! bytes themselves are read back later, one message at a time. The file
//! is never held in memory as a whole.

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{PolicyMailError, Result};

const READ_BUFFER_SIZE: usize = 1024 * 1024;
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Location of one message inside an MBOX file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageSpan {
    /// Byte offset of the `From ` separator line.
    pub offset: u64,
    /// Length in bytes, up to the next separator or EOF.
    pub length: u64,
}

/// Splits an MBOX file into message spans.
///
/// Mixed line endings, a leading BOM, a missing blank line before a
/// separator and a truncated final message are all accepted. A file whose
/// first line is not a separator is one message.
#[derive(Debug)]
pub struct MboxScanner {
    path: PathBuf,
    len: u64,
}

impl MboxScanner {
    /// Fails with [`PolicyMailError::ArchiveNotFound`] when `path` does not
    /// exist. The contents are not validated here.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let len = match std::fs::metadata(&path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PolicyMailError::ArchiveNotFound(path))
            }
            Err(e) => return Err(PolicyMailError::io(&path, e)),
        };
        Ok(Self { path, len })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every message span, in file order.
    pub fn scan(&self) -> Result<Vec<MessageSpan>> {
        if self.len == 0 {
            return Ok(Vec::new());
        }
        let file = File::open(&self.path).map_err(|e| PolicyMailError::io(&self.path, e))?;
        let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);

        let mut starts: Vec<u64> = Vec::new();
        let mut line = Vec::with_capacity(4096);
        let mut pos: u64 = 0;
        let mut after_blank = true;

        loop {
            line.clear();
            let read = reader
                .read_until(b'\n', &mut line)
                .map_err(|e| PolicyMailError::io(&self.path, e))?;
            if read == 0 {
                break;
            }

            let content = if pos == 0 {
                line.strip_prefix(UTF8_BOM).unwrap_or(&line)
            } else {
                &line[..]
            };
            if content.starts_with(b"From ") {
                if pos > 0 && !after_blank {
                    warn!(path = %self.path.display(), offset = pos, "Separator without preceding blank line");
                }
                starts.push(pos);
            } else if pos == 0 {
                starts.push(0);
            }

            after_blank = content.iter().all(u8::is_ascii_whitespace);
            pos += read as u64;
        }

        let ends = starts.iter().skip(1).copied().chain(std::iter::once(pos));
        let spans: Vec<MessageSpan> = starts
            .iter()
            .zip(ends)
            .map(|(&offset, end)| MessageSpan {
                offset,
                length: end - offset,
            })
            .collect();
        debug!(path = %self.path.display(), messages = spans.len(), "Scanned MBOX");
        Ok(spans)
    }

    /// Bytes of one message, read by seeking straight to its span.
    pub fn read_message(&self, span: MessageSpan) -> Result<Vec<u8>> {
        let io_err = |e| PolicyMailError::io(&self.path, e);
        let mut file = File::open(&self.path).map_err(io_err)?;
        file.seek(SeekFrom::Start(span.offset)).map_err(io_err)?;
        let mut buffer = Vec::with_capacity(span.length as usize);
        file.take(span.length)
            .read_to_end(&mut buffer)
            .map_err(io_err)?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_mbox(contents: &[u8]) -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("box.mbox");
        std::fs::write(&path, contents).unwrap();
        (tmp, path)
    }

    #[test]
    fn test_scan_and_read() {
        let first = "From a@b.com Thu Jan 01 00:00:00 2024\nSubject: Uno\n\n>From the start\n\n";
        let second = "From c@d.com Thu Jan 01 00:00:00 2024\nSubject: Dos\n\nBody\n";
        let (_tmp, path) = write_mbox(format!("{first}{second}").as_bytes());

        let scanner = MboxScanner::new(&path).unwrap();
        let spans = scanner.scan().unwrap();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].offset, 0);
        assert_eq!(spans[0].length, first.len() as u64);
        assert_eq!(spans[1].offset, first.len() as u64);

        let raw = scanner.read_message(spans[1]).unwrap();
        assert_eq!(raw, second.as_bytes());
    }

    #[test]
    fn test_lowercase_and_quoted_from_do_not_split() {
        let (_tmp, path) = write_mbox(
            b"From a@b.com Mon Jan 01 00:00:00 2024\r\nSubject: x\r\n\r\nfrom here\r\n>From there\r\n",
        );
        assert_eq!(MboxScanner::new(&path).unwrap().scan().unwrap().len(), 1);
    }

    #[test]
    fn test_bom_and_headerless_file() {
        let (_tmp, path) = write_mbox(b"\xEF\xBB\xBFFrom a@b.com Mon Jan 01 00:00:00 2024\nSubject: x\n\nhi\n");
        let spans = MboxScanner::new(&path).unwrap().scan().unwrap();
        assert_eq!(spans.len(), 1);

        let bare = b"Subject: bare\n\nno separator\n";
        let (_tmp, path) = write_mbox(bare);
        let spans = MboxScanner::new(&path).unwrap().scan().unwrap();
        assert_eq!(
            spans,
            vec![MessageSpan {
                offset: 0,
                length: bare.len() as u64
            }]
        );
    }

    #[test]
    fn test_scan_empty_file() {
        let (_tmp, path) = write_mbox(b"");
        assert!(MboxScanner::new(&path).unwrap().scan().unwrap().is_empty());
    }

    #[test]
    fn test_missing_file() {
        let err = MboxScanner::new("/definitely/not/here.mbox").unwrap_err();
        assert!(matches!(err, PolicyMailError::ArchiveNotFound(_)));
    }
}
