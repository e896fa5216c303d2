//! Crash-safe JSON files.
//!
//! Writes go to a uniquely named sibling temp file, are synced, and then
//! renamed over the target, so readers see either the old or the new document.

use crate::error::{IndexScopeError, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Read and parse a JSON file. `Ok(None)` when the file does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(IndexScopeError::io_with_path(e, path)),
    };

    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|e| IndexScopeError::Json {
            message: format!("Failed to parse {}: {}", path.display(), e),
            source: Some(e),
        })
}

/// Serialize `data` as pretty JSON and atomically replace `path` with it.
///
/// With `keep_backup`, an existing file is first copied to `<name>.bak`; a
/// failed backup is logged and does not stop the write.
pub fn write_json<T: Serialize>(path: &Path, data: &T, keep_backup: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| IndexScopeError::io_with_path(e, parent))?;
        }
    }

    let serialized = serde_json::to_string_pretty(data)?;
    let temp_path = sibling(path, &format!(".{}.tmp", Uuid::new_v4().simple()));

    let written = write_synced(&temp_path, serialized.as_bytes());
    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    if keep_backup && path.exists() {
        let backup = backup_path(path);
        match fs::copy(path, &backup) {
            Ok(_) => debug!("Created backup {}", backup.display()),
            Err(e) => warn!("Failed to create backup {}: {}", backup.display(), e),
        }
    }

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(IndexScopeError::io_with_path(e, path));
    }

    debug!("Atomically wrote {}", path.display());
    Ok(())
}

/// Where [`write_json`] keeps the previous version of `path`.
pub fn backup_path(path: &Path) -> PathBuf {
    sibling(path, ".bak")
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| IndexScopeError::io_with_path(e, path))?;
    file.write_all(bytes)
        .and_then(|()| file.flush())
        .and_then(|()| file.sync_all())
        .map_err(|e| IndexScopeError::io_with_path(e, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        name: String,
        value: i32,
    }

    #[test]
    fn test_write_then_read() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.json");
        let data = Sample {
            name: "first".into(),
            value: 1,
        };

        write_json(&path, &data, false).unwrap();
        assert_eq!(read_json::<Sample>(&path).unwrap(), Some(data));
        assert_eq!(fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }

    #[test]
    fn test_backup_keeps_previous_version() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        let first = Sample {
            name: "first".into(),
            value: 1,
        };
        let second = Sample {
            name: "second".into(),
            value: 2,
        };

        write_json(&path, &first, true).unwrap();
        assert!(!backup_path(&path).exists());
        write_json(&path, &second, true).unwrap();

        assert_eq!(backup_path(&path), temp_dir.path().join("config.json.bak"));
        assert_eq!(read_json::<Sample>(&backup_path(&path)).unwrap(), Some(first));
        assert_eq!(read_json::<Sample>(&path).unwrap(), Some(second));
    }

    #[test]
    fn test_read_missing_and_malformed() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        assert!(read_json::<Sample>(&path).unwrap().is_none());

        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            read_json::<Sample>(&path),
            Err(IndexScopeError::Json { .. })
        ));
    }
}
