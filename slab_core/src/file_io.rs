//! # File I/O Operations
//!
//! - **Atomic writes**: artifacts are written to a `.tmp` sibling, synced, then
//!   renamed over the destination so a reader never sees a partial file
//! - **Directory locks**: an fs2 advisory lock on a lock file inside a
//!   directory, held while a caller inspects and reserves names in it
//! - **Context loading**: project context from TOML or JSON

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::context::ProjectContext;
use crate::errors::{DesignError, DesignResult};

/// Name of the lock file placed in a locked directory.
pub const LOCK_FILE_NAME: &str = ".allocation.lock";

/// Exclusive advisory lock on a directory, released when dropped.
///
/// Blocks until the lock is available. Other processes using the same
/// lock file wait; unrelated readers are unaffected.
pub struct DirLock {
    lock_path: PathBuf,
    lock_file: File,
}

impl DirLock {
    pub fn acquire(dir: &Path) -> DesignResult<Self> {
        let lock_path = dir.join(LOCK_FILE_NAME);
        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| DesignError::file_error("create lock", lock_path.display().to_string(), e.to_string()))?;

        lock_file
            .lock_exclusive()
            .map_err(|e| DesignError::file_error("lock", lock_path.display().to_string(), e.to_string()))?;

        Ok(DirLock { lock_path, lock_file })
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        // The lock file stays; other processes may be waiting on it.
        let _ = FileExt::unlock(&self.lock_file);
    }
}

/// Write bytes with atomic replace semantics.
///
/// 1. Write to `<path>.tmp`
/// 2. Sync to disk
/// 3. Rename over `path`
pub fn write_atomic(path: &Path, bytes: &[u8]) -> DesignResult<()> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let mut tmp_file = File::create(&tmp_path)
        .map_err(|e| DesignError::file_error("create temp file", tmp_path.display().to_string(), e.to_string()))?;

    tmp_file
        .write_all(bytes)
        .map_err(|e| DesignError::file_error("write temp file", tmp_path.display().to_string(), e.to_string()))?;

    tmp_file
        .sync_all()
        .map_err(|e| DesignError::file_error("sync temp file", tmp_path.display().to_string(), e.to_string()))?;

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        DesignError::file_error("rename to final", path.display().to_string(), e.to_string())
    })?;

    Ok(())
}

/// Load a project context. `.json` files are read as JSON, anything else as TOML.
pub fn load_context(path: &Path) -> DesignResult<ProjectContext> {
    let text = fs::read_to_string(path)
        .map_err(|e| DesignError::file_error("read", path.display().to_string(), e.to_string()))?;

    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if is_json {
        serde_json::from_str(&text).map_err(|e| DesignError::serialization(e.to_string()))
    } else {
        toml::from_str(&text).map_err(|e| DesignError::serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_write_leaves_no_tmp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("record.json");
        write_atomic(&path, b"{}").unwrap();
        write_atomic(&path, b"{\"v\":2}").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"v\":2}");
        assert!(!dir.path().join("record.json.tmp").exists());
    }

    #[test]
    fn test_dir_lock_reacquire_after_drop() {
        let dir = tempfile::tempdir().unwrap();
        let lock = DirLock::acquire(dir.path()).unwrap();
        assert!(lock.lock_path().exists());
        drop(lock);
        let again = DirLock::acquire(dir.path()).unwrap();
        assert!(again.lock_path().ends_with(LOCK_FILE_NAME));
    }

    #[test]
    fn test_load_context_formats() {
        let dir = tempfile::tempdir().unwrap();

        let toml_path = dir.path().join("context.toml");
        fs::write(&toml_path, "bridgeName = \"Bundan\"\neffectiveSpan = 15.0\nbridgeType = \"Culvert\"\n").unwrap();
        let ctx = load_context(&toml_path).unwrap();
        assert_eq!(ctx.bridge_name, "Bundan");
        assert_eq!(ctx.bridge_type, "Culvert");

        let json_path = dir.path().join("context.json");
        fs::write(&json_path, r#"{"numberOfSpans": 5}"#).unwrap();
        assert_eq!(load_context(&json_path).unwrap().number_of_spans, 5);

        let missing = load_context(&dir.path().join("nope.toml")).unwrap_err();
        assert_eq!(missing.error_code(), "FILE_ERROR");
    }
}
