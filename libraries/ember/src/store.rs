//! # Local key-value store
//! The device-side half of the sync engine. A [`Backend`] does the actual storage and may fail;
//! [`LocalStore`] wraps it so that callers never see those failures as errors.

use std::{
    collections::BTreeMap,
    fs,
    io::{ErrorKind, Write as _},
    path::{Path, PathBuf},
    sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

/// Every record on the device, keyed by record key. Values are serialized JSON.
pub type Records = BTreeMap<String, String>;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage quota exceeded: {needed} bytes needed, {quota} allowed")]
    QuotaExceeded { needed: usize, quota: usize },
    #[error("storage is unavailable: {0}")]
    Unavailable(String),
    #[error("invalid key `{0}`")]
    InvalidKey(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The outcome of an operation that is not allowed to fail loudly.
///
/// `Absent` is a normal answer ("not set yet"); `Degraded` means the underlying storage failed and
/// the operation had no effect.
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use]
pub enum StoreResult<T> {
    Done(T),
    Absent,
    Degraded(String),
}

impl<T> StoreResult<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            StoreResult::Done(value) => Some(value),
            StoreResult::Absent | StoreResult::Degraded(_) => None,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, StoreResult::Done(_))
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, StoreResult::Degraded(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> StoreResult<U> {
        match self {
            StoreResult::Done(value) => StoreResult::Done(f(value)),
            StoreResult::Absent => StoreResult::Absent,
            StoreResult::Degraded(reason) => StoreResult::Degraded(reason),
        }
    }
}

/// Durable per-device storage.
pub trait Backend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Returns whether the key existed.
    fn delete(&self, key: &str) -> Result<bool, StorageError>;

    fn entries(&self) -> Result<Records, StorageError>;
}

/// An in-memory backend with an optional byte quota. Useful for tests and for
/// sessions where durable storage is disabled.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: Mutex<Records>,
    quota: Option<usize>,
    disabled: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits the total size of keys plus values.
    pub fn with_quota(quota: usize) -> Self {
        Self {
            quota: Some(quota),
            ..Self::default()
        }
    }

    /// Simulates storage being switched off (e.g. private browsing).
    pub fn set_disabled(&self, disabled: bool) {
        self.disabled.store(disabled, Ordering::SeqCst);
    }

    fn records(&self) -> Result<std::sync::MutexGuard<'_, Records>, StorageError> {
        if self.disabled.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("storage is disabled".to_string()));
        }
        self.records
            .lock()
            .map_err(|_| StorageError::Unavailable("storage lock poisoned".to_string()))
    }
}

impl Backend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.records()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut records = self.records()?;
        if let Some(quota) = self.quota {
            let used: usize = records
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = used + key.len() + value.len();
            if needed > quota {
                return Err(StorageError::QuotaExceeded { needed, quota });
            }
        }
        records.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.records()?.remove(key).is_some())
    }

    fn entries(&self) -> Result<Records, StorageError> {
        Ok(self.records()?.clone())
    }
}

const TEMP_SUFFIX: &str = ".tmp";

/// Stores each record as its own file inside a directory.
#[derive(Debug, Clone)]
pub struct FileBackend {
    directory: PathBuf,
}

impl FileBackend {
    pub fn open(directory: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let directory = directory.into();
        fs::create_dir_all(&directory)?;
        Ok(Self { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && !key.ends_with(TEMP_SUFFIX)
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.directory.join(key))
    }
}

impl Backend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)?) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        // write-then-rename so a crash never leaves a half-written record behind
        let temp_path = self.directory.join(format!("{key}{TEMP_SUFFIX}"));
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(value.as_bytes())?;
        file.sync_all()?;
        fs::rename(&temp_path, &path)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, StorageError> {
        match fs::remove_file(self.path_for(key)?) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn entries(&self) -> Result<Records, StorageError> {
        let mut records = Records::new();
        for entry in fs::read_dir(&self.directory)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Some(key) = entry.file_name().to_str().map(str::to_string) else {
                log::warn!("Skipping non UTF-8 record file {:?}", entry.path());
                continue;
            };
            if key.starts_with('.') || key.ends_with(TEMP_SUFFIX) {
                continue;
            }
            records.insert(key, fs::read_to_string(entry.path())?);
        }
        Ok(records)
    }
}

/// The key-value facade the rest of the app talks to.
///
/// None of these methods fail: a storage error is logged and reported as
/// [`StoreResult::Degraded`], and a failed write is dropped rather than retried.
pub struct LocalStore {
    backend: Box<dyn Backend>,
}

impl LocalStore {
    pub fn new(backend: impl Backend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    pub async fn get(&self, key: &str) -> StoreResult<String> {
        match self.backend.get(key) {
            Ok(Some(value)) => StoreResult::Done(value),
            Ok(None) => StoreResult::Absent,
            Err(e) => {
                log::warn!("Failed to read `{key}` from local storage: {e}");
                StoreResult::Degraded(e.to_string())
            }
        }
    }

    pub async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        match self.backend.set(key, value) {
            Ok(()) => StoreResult::Done(()),
            Err(e) => {
                log::warn!("Failed to write `{key}` to local storage: {e}");
                StoreResult::Degraded(e.to_string())
            }
        }
    }

    pub async fn delete(&self, key: &str) -> StoreResult<()> {
        match self.backend.delete(key) {
            Ok(true) => StoreResult::Done(()),
            Ok(false) => StoreResult::Absent,
            Err(e) => {
                log::warn!("Failed to delete `{key}` from local storage: {e}");
                StoreResult::Degraded(e.to_string())
            }
        }
    }

    /// Every record currently on the device.
    pub async fn snapshot(&self) -> StoreResult<Records> {
        match self.backend.entries() {
            Ok(records) if records.is_empty() => StoreResult::Absent,
            Ok(records) => StoreResult::Done(records),
            Err(e) => {
                log::warn!("Failed to list local storage: {e}");
                StoreResult::Degraded(e.to_string())
            }
        }
    }

    /// Writes every record, returning how many were stored.
    pub async fn write_all(&self, records: &Records) -> usize {
        let mut written = 0;
        for (key, value) in records {
            if self.set(key, value).await.is_done() {
                written += 1;
            }
        }
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_set_delete() {
        let store = LocalStore::in_memory();
        assert_eq!(store.get("shine-moods").await, StoreResult::Absent);

        assert!(store.set("shine-moods", r#"{"2025-01-01":3}"#).await.is_done());
        assert_eq!(
            store.get("shine-moods").await,
            StoreResult::Done(r#"{"2025-01-01":3}"#.to_string())
        );

        assert_eq!(store.delete("shine-moods").await, StoreResult::Done(()));
        assert_eq!(store.delete("shine-moods").await, StoreResult::Absent);
        assert_eq!(store.get("shine-moods").await, StoreResult::Absent);
    }

    #[tokio::test]
    async fn test_quota_exceeded_is_degraded_and_keeps_old_value() {
        let store = LocalStore::new(MemoryBackend::with_quota(24));
        assert!(store.set("shine-streak", "3").await.is_done());

        let result = store.set("shine-journal", "a much longer value").await;
        assert!(result.is_degraded());
        assert_eq!(store.get("shine-journal").await, StoreResult::Absent);
        assert_eq!(store.get("shine-streak").await.ok().as_deref(), Some("3"));

        // overwriting an existing key only counts the new value
        assert!(store.set("shine-streak", "4").await.is_done());
    }

    #[tokio::test]
    async fn test_disabled_storage_never_errors() {
        let backend = MemoryBackend::new();
        backend.set("shine-premium", "true").unwrap();
        backend.set_disabled(true);
        let store = LocalStore::new(backend);

        assert!(store.get("shine-premium").await.is_degraded());
        assert!(store.set("shine-premium", "false").await.is_degraded());
        assert!(store.delete("shine-premium").await.is_degraded());
        assert!(store.snapshot().await.is_degraded());
    }

    #[tokio::test]
    async fn test_snapshot_of_empty_store_is_absent() {
        let store = LocalStore::in_memory();
        assert_eq!(store.snapshot().await, StoreResult::Absent);
    }

    #[tokio::test]
    async fn test_write_all_counts_stored_records() {
        let store = LocalStore::new(MemoryBackend::with_quota(20));
        let mut records = Records::new();
        records.insert("a".to_string(), "1".to_string());
        records.insert("b".to_string(), "x".repeat(40));
        assert_eq!(store.write_all(&records).await, 1);
    }

    #[test]
    fn test_file_backend_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path().join("records")).unwrap();

        assert_eq!(backend.get("shine-moods").unwrap(), None);
        backend.set("shine-moods", "{}").unwrap();
        backend.set("shine-wins-2025-01-01", r#"["a","b","c"]"#).unwrap();
        backend.set("shine-moods", r#"{"2025-01-01":5}"#).unwrap();

        let entries = backend.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries["shine-moods"], r#"{"2025-01-01":5}"#);

        assert!(backend.delete("shine-moods").unwrap());
        assert!(!backend.delete("shine-moods").unwrap());

        // a fresh handle on the same directory sees the same records
        let reopened = FileBackend::open(backend.directory()).unwrap();
        assert_eq!(
            reopened.get("shine-wins-2025-01-01").unwrap().as_deref(),
            Some(r#"["a","b","c"]"#)
        );
    }

    #[test]
    fn test_file_backend_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();
        for key in ["", "../escape", ".hidden", "a/b", "x.tmp"] {
            assert!(
                matches!(backend.set(key, "1"), Err(StorageError::InvalidKey(_))),
                "key {key:?} should be rejected"
            );
        }
    }
}
