//! The on-disk card store.

use crate::error::{ServerError, ServerResult};
use cardsync_protocol::UNKNOWN_TIMESTAMP;
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::debug;

/// A flat directory of serialized card files, one per resource.
///
/// A single process-wide lock serializes every read and write across
/// all connections; no store operation proceeds concurrently with
/// another. This is a deliberate trade of throughput for correctness.
pub struct CardStore {
    root: PathBuf,
    lock: Mutex<()>,
}

impl CardStore {
    /// Opens (creating if needed) the store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> ServerResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            lock: Mutex::new(()),
        })
    }

    /// Returns the store directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Enumerates resources whose name contains `filter`, as
    /// `(timestamp, name)` pairs ordered by name.
    pub fn list(&self, filter: Option<&str>) -> ServerResult<Vec<(i64, String)>> {
        let _guard = self.lock.lock();
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(_) => continue,
            };
            if let Some(filter) = filter {
                if !name.contains(filter) {
                    continue;
                }
            }
            entries.push((mtime_millis(&entry.path()), name));
        }
        entries.sort_by(|a, b| a.1.cmp(&b.1));
        Ok(entries)
    }

    /// Returns the resource's timestamp, or `-1` when absent.
    pub fn timestamp(&self, name: &str) -> ServerResult<i64> {
        let path = self.resource_path(name)?;
        let _guard = self.lock.lock();
        if path.is_file() {
            Ok(mtime_millis(&path))
        } else {
            Ok(UNKNOWN_TIMESTAMP)
        }
    }

    /// Reads a resource: its timestamp and serialized content.
    pub fn read(&self, name: &str) -> ServerResult<(i64, String)> {
        let path = self.resource_path(name)?;
        let _guard = self.lock.lock();
        if !path.is_file() {
            return Err(ServerError::ResourceMissing { name: name.into() });
        }
        let content = fs::read_to_string(&path)?;
        Ok((mtime_millis(&path), content))
    }

    /// Writes a resource and returns its new timestamp.
    pub fn write(&self, name: &str, content: &str) -> ServerResult<i64> {
        let path = self.resource_path(name)?;
        let _guard = self.lock.lock();
        fs::write(&path, content)?;
        debug!(resource = name, bytes = content.len(), "stored resource");
        Ok(mtime_millis(&path))
    }

    /// Deletes a resource; reports `false` when it did not exist.
    pub fn delete(&self, name: &str) -> ServerResult<bool> {
        let path = self.resource_path(name)?;
        let _guard = self.lock.lock();
        if !path.is_file() {
            return Ok(false);
        }
        fs::remove_file(&path)?;
        debug!(resource = name, "deleted resource");
        Ok(true)
    }

    /// Validates a resource name and resolves it inside the store.
    ///
    /// Names must be plain file names; anything that could traverse out
    /// of the data directory is rejected.
    fn resource_path(&self, name: &str) -> ServerResult<PathBuf> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\', '\0']);
        if !valid {
            return Err(ServerError::InvalidResource { name: name.into() });
        }
        Ok(self.root.join(name))
    }
}

fn mtime_millis(path: &Path) -> i64 {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(UNKNOWN_TIMESTAMP)
}
