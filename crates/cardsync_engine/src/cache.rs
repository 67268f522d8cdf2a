//! Client-side cache directories.

use crate::error::SyncResult;
use cardsync_protocol::{format_timestamp, parse_timestamp, UNKNOWN_TIMESTAMP};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const CURRENT_DIR: &str = "current";
const ORIGINAL_DIR: &str = "original";
const TIMESTAMPS_DIR: &str = "timestamps";

/// The three sibling cache directories, keyed by resource name:
/// `current/` holds the live local serialization, `original/` the
/// baseline as of the last successful sync, and `timestamps/` a
/// one-line file with the last known server timestamp.
///
/// The directories are plain, unguarded files; concurrent syncs of the
/// same cache root from multiple threads are not supported.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    /// Opens (creating if needed) the cache rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> SyncResult<Self> {
        let root = root.into();
        for dir in [CURRENT_DIR, ORIGINAL_DIR, TIMESTAMPS_DIR] {
            fs::create_dir_all(root.join(dir))?;
        }
        Ok(Self { root })
    }

    /// Returns the path of the live local mirror for `resource`.
    pub fn current_path(&self, resource: &str) -> PathBuf {
        self.root.join(CURRENT_DIR).join(resource)
    }

    /// Reads the live local mirror, if one exists.
    pub fn read_current(&self, resource: &str) -> SyncResult<Option<String>> {
        read_optional(&self.current_path(resource))
    }

    /// Writes the live local mirror.
    pub fn write_current(&self, resource: &str, content: &str) -> SyncResult<()> {
        fs::write(self.current_path(resource), content)?;
        Ok(())
    }

    /// Reads the sync baseline, if one exists.
    pub fn read_original(&self, resource: &str) -> SyncResult<Option<String>> {
        read_optional(&self.root.join(ORIGINAL_DIR).join(resource))
    }

    /// Writes the sync baseline.
    pub fn write_original(&self, resource: &str, content: &str) -> SyncResult<()> {
        fs::write(self.root.join(ORIGINAL_DIR).join(resource), content)?;
        Ok(())
    }

    /// Reads the cached server timestamp, `-1` when never synced.
    pub fn read_timestamp(&self, resource: &str) -> SyncResult<i64> {
        match read_optional(&self.root.join(TIMESTAMPS_DIR).join(resource))? {
            Some(text) => Ok(parse_timestamp(&text)?),
            None => Ok(UNKNOWN_TIMESTAMP),
        }
    }

    /// Writes the cached server timestamp.
    pub fn write_timestamp(&self, resource: &str, millis: i64) -> SyncResult<()> {
        fs::write(
            self.root.join(TIMESTAMPS_DIR).join(resource),
            format_timestamp(millis) + "\n",
        )?;
        Ok(())
    }
}

fn read_optional(path: &Path) -> SyncResult<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_entries_read_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStore::open(dir.path()).unwrap();

        assert_eq!(cache.read_current("addresses").unwrap(), None);
        assert_eq!(cache.read_original("addresses").unwrap(), None);
        assert_eq!(cache.read_timestamp("addresses").unwrap(), UNKNOWN_TIMESTAMP);
    }

    #[test]
    fn three_directories_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStore::open(dir.path()).unwrap();

        cache.write_current("addresses", "live").unwrap();
        cache.write_original("addresses", "baseline").unwrap();
        cache.write_timestamp("addresses", 1234).unwrap();

        assert_eq!(cache.read_current("addresses").unwrap().unwrap(), "live");
        assert_eq!(
            cache.read_original("addresses").unwrap().unwrap(),
            "baseline"
        );
        assert_eq!(cache.read_timestamp("addresses").unwrap(), 1234);
    }

    #[test]
    fn timestamp_file_is_one_line() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStore::open(dir.path()).unwrap();
        cache.write_timestamp("addresses", 42).unwrap();

        let raw = fs::read_to_string(dir.path().join("timestamps/addresses")).unwrap();
        assert_eq!(raw, "42\n");
    }
}
