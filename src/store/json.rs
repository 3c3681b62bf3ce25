//! JSON persistence helpers.

use std::io::Write;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{PolicyMailError, Result};

/// Serialize `value` as pretty JSON and atomically replace `path` with it.
///
/// The document is written to a temporary file in the same directory and
/// renamed over the target, so readers see either the old or the new
/// content, never a torn write.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| PolicyMailError::io(dir, e))?;
    serde_json::to_writer_pretty(&mut tmp, value).map_err(|e| PolicyMailError::json(path, e))?;
    tmp.write_all(b"\n").map_err(|e| PolicyMailError::io(path, e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| PolicyMailError::io(path, e))?;
    tmp.persist(path)
        .map_err(|e| PolicyMailError::io(path, e.error))?;
    Ok(())
}

/// Read and deserialize a JSON document.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data = std::fs::read(path).map_err(|e| PolicyMailError::io(path, e))?;
    serde_json::from_slice(&data).map_err(|e| PolicyMailError::json(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_write_replaces_content() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("doc.json");

        write_json_atomic(&path, &serde_json::json!({"a": 1})).unwrap();
        write_json_atomic(&path, &serde_json::json!({"a": 2})).unwrap();

        let value: serde_json::Value = read_json(&path).unwrap();
        assert_eq!(value["a"], 2);

        // No temporary files left behind
        let entries = std::fs::read_dir(tmp.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_non_ascii_is_written_verbatim() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("doc.json");
        write_json_atomic(&path, &serde_json::json!({"s": "Cotización"})).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("Cotización"));
    }
}
