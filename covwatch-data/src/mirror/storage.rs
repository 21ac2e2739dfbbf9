//! String key/value storage backends.

use std::collections::BTreeMap;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

/// Errors raised by [`KeyValueStorage`] backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The write would exceed the backend's byte quota.
    #[error("storage quota exceeded writing {key:?}: {needed} bytes needed, {available} available")]
    QuotaExceeded {
        /// Key being written.
        key: String,
        /// Bytes the write needs.
        needed: u64,
        /// Bytes still available under the quota.
        available: u64,
    },
    /// A backend I/O operation failed.
    #[error("failed to {operation} {path:?}")]
    Io {
        /// Operation label.
        operation: &'static str,
        /// Path involved.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// A stored value was not valid UTF-8.
    #[error("stored value for {key:?} is not valid UTF-8")]
    NotUtf8 {
        /// Key read.
        key: String,
    },
}

/// Minimal string key/value store, the contract of the local-storage mirror.
pub trait KeyValueStorage {
    /// Value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::QuotaExceeded`] when the write does not fit.
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`, reporting whether it existed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the backend cannot be written.
    fn remove(&mut self, key: &str) -> Result<bool, StorageError>;
}

fn check_quota(key: &str, quota: Option<u64>, used: u64, needed: u64) -> Result<(), StorageError> {
    let Some(quota) = quota else {
        return Ok(());
    };
    let available = quota.saturating_sub(used);
    if needed > available {
        return Err(StorageError::QuotaExceeded {
            key: key.to_owned(),
            needed,
            available,
        });
    }
    Ok(())
}

fn byte_len(text: &str) -> u64 {
    u64::try_from(text.len()).unwrap_or(u64::MAX)
}

/// In-process storage, optionally bounded by a byte quota over keys and values.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: BTreeMap<String, String>,
    quota: Option<u64>,
}

impl MemoryStorage {
    /// Unbounded storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage holding at most `quota` bytes.
    #[must_use]
    pub fn with_quota(quota: u64) -> Self {
        Self {
            entries: BTreeMap::new(),
            quota: Some(quota),
        }
    }

    fn used_excluding(&self, key: &str) -> u64 {
        self.entries
            .iter()
            .filter(|(existing, _)| existing.as_str() != key)
            .map(|(existing, value)| byte_len(existing) + byte_len(value))
            .sum()
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        check_quota(
            key,
            self.quota,
            self.used_excluding(key),
            byte_len(key) + byte_len(value),
        )?;
        self.entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool, StorageError> {
        Ok(self.entries.remove(key).is_some())
    }
}

/// One `<key>.json` file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: Utf8PathBuf,
    quota: Option<u64>,
}

impl FileStorage {
    /// Storage rooted at `dir`; the directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            quota: None,
        }
    }

    /// Bound the total size of the directory's files.
    #[must_use]
    pub fn with_quota(mut self, quota: Option<u64>) -> Self {
        self.quota = quota;
        self
    }

    /// Directory holding the files.
    #[must_use]
    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Utf8PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn io_error(operation: &'static str, path: &Utf8Path, source: io::Error) -> StorageError {
        StorageError::Io {
            operation,
            path: path.to_path_buf(),
            source,
        }
    }

    fn existing_len(path: &Utf8Path) -> Result<u64, StorageError> {
        match covwatch_fs::file_facts(path) {
            Ok(facts) => Ok(facts.len),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(source) => Err(Self::io_error("inspect", path, source)),
        }
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key);
        let bytes = match covwatch_fs::read_bytes(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(Self::io_error("read", &path, source)),
        };
        String::from_utf8(bytes)
            .map(Some)
            .map_err(|_| StorageError::NotUtf8 {
                key: key.to_owned(),
            })
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        if self.quota.is_some() {
            let usage = covwatch_fs::dir_usage(&self.dir)
                .map_err(|source| Self::io_error("measure", &self.dir, source))?;
            let used = usage.saturating_sub(Self::existing_len(&path)?);
            check_quota(key, self.quota, used, byte_len(value))?;
        }
        covwatch_fs::write_bytes(&path, value.as_bytes())
            .map_err(|source| Self::io_error("write", &path, source))
    }

    fn remove(&mut self, key: &str) -> Result<bool, StorageError> {
        let path = self.path_for(key);
        let existed = covwatch_fs::file_is_file(&path).unwrap_or(false);
        covwatch_fs::remove_if_exists(&path)
            .map_err(|source| Self::io_error("remove", &path, source))?;
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn file_storage() -> (TempDir, FileStorage) {
        let dir = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().join("mirror")).expect("utf-8 path");
        (dir, FileStorage::new(root))
    }

    fn exercise(storage: &mut dyn KeyValueStorage) {
        assert_eq!(storage.get("a").expect("get missing"), None);
        storage.set("a", "one").expect("set");
        storage.set("a", "two").expect("overwrite");
        assert_eq!(storage.get("a").expect("get").as_deref(), Some("two"));
        assert!(storage.remove("a").expect("remove"));
        assert!(!storage.remove("a").expect("remove again"));
        assert_eq!(storage.get("a").expect("get removed"), None);
    }

    #[rstest]
    fn memory_storage_contract() {
        exercise(&mut MemoryStorage::new());
    }

    #[rstest]
    fn file_storage_contract(file_storage: (TempDir, FileStorage)) {
        let (_guard, mut storage) = file_storage;
        exercise(&mut storage);
    }

    #[rstest]
    fn memory_quota_counts_keys_and_values() {
        let mut storage = MemoryStorage::with_quota(10);
        storage.set("k", "123456789").expect("fits exactly");
        let err = storage.set("x", "1").expect_err("over quota");
        assert!(matches!(err, StorageError::QuotaExceeded { available: 0, .. }));
        storage.set("k", "12345678").expect("overwrite frees old value");
    }

    #[rstest]
    fn file_quota_rejects_oversized_values(file_storage: (TempDir, FileStorage)) {
        let (_guard, storage) = file_storage;
        let mut storage = storage.with_quota(Some(8));
        storage.set("a", "12345").expect("fits");
        let err = storage.set("b", "12345").expect_err("over quota");
        assert!(matches!(err, StorageError::QuotaExceeded { needed: 5, available: 3, .. }));
        storage.set("a", "12345678").expect("replacing own value fits");
    }
}
