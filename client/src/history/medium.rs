//! Keyed string storage behind the history.

use std::collections::HashMap;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::HistoryError;

pub trait StorageMedium: Send + Sync {
    /// `Ok(None)` when nothing was ever stored under `key`.
    fn read(&self, key: &str) -> impl Future<Output = Result<Option<String>, HistoryError>> + Send;

    fn write(&self, key: &str, value: &str) -> impl Future<Output = Result<(), HistoryError>> + Send;

    /// Removing a missing key succeeds.
    fn remove(&self, key: &str) -> impl Future<Output = Result<(), HistoryError>> + Send;
}

impl<M: StorageMedium> StorageMedium for Arc<M> {
    async fn read(&self, key: &str) -> Result<Option<String>, HistoryError> {
        (**self).read(key).await
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), HistoryError> {
        (**self).write(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), HistoryError> {
        (**self).remove(key).await
    }
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileMedium {
    dir: PathBuf,
}

impl FileMedium {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{name}.json"))
    }
}

impl StorageMedium for FileMedium {
    async fn read(&self, key: &str) -> Result<Option<String>, HistoryError> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(HistoryError::Unavailable(format!("{}: {}", path.display(), e))),
        }
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), HistoryError> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        let unavailable = |e: std::io::Error| HistoryError::Unavailable(format!("{}: {}", path.display(), e));

        tokio::fs::create_dir_all(&self.dir).await.map_err(unavailable)?;
        tokio::fs::write(&tmp, value).await.map_err(unavailable)?;
        tokio::fs::rename(&tmp, &path).await.map_err(unavailable)?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), HistoryError> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(HistoryError::Unavailable(format!("{}: {}", path.display(), e))),
        }
    }
}

/// In-process medium. Can be switched off to behave like an unreachable store.
#[derive(Debug)]
pub struct MemoryMedium {
    records: Mutex<HashMap<String, String>>,
    available: AtomicBool,
}

impl Default for MemoryMedium {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Raw access for seeding a record, bypassing the availability switch.
    pub fn insert_raw(&self, key: &str, value: &str) {
        if let Ok(mut records) = self.records.lock() {
            records.insert(key.to_string(), value.to_string());
        }
    }

    fn records(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, HistoryError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(HistoryError::Unavailable("memory medium switched off".to_string()));
        }
        self.records
            .lock()
            .map_err(|_| HistoryError::Unavailable("memory medium lock poisoned".to_string()))
    }
}

impl StorageMedium for MemoryMedium {
    async fn read(&self, key: &str) -> Result<Option<String>, HistoryError> {
        tokio::task::yield_now().await;
        Ok(self.records()?.get(key).cloned())
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), HistoryError> {
        tokio::task::yield_now().await;
        self.records()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), HistoryError> {
        tokio::task::yield_now().await;
        self.records()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_medium_reads_back_what_it_wrote() {
        let dir = tempfile::tempdir().unwrap();
        let medium = FileMedium::new(dir.path().join("nested"));

        assert_eq!(medium.read("cassava_history").await.unwrap(), None);
        medium.write("cassava_history", "[]").await.unwrap();
        assert_eq!(medium.read("cassava_history").await.unwrap().as_deref(), Some("[]"));
        assert!(dir.path().join("nested/cassava_history.json").exists());

        medium.remove("cassava_history").await.unwrap();
        medium.remove("cassava_history").await.unwrap();
        assert_eq!(medium.read("cassava_history").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_medium_sanitises_keys() {
        let dir = tempfile::tempdir().unwrap();
        let medium = FileMedium::new(dir.path());
        medium.write("@cassava/history", "x").await.unwrap();
        assert!(dir.path().join("_cassava_history.json").exists());
    }

    #[tokio::test]
    async fn unreadable_directory_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "file").unwrap();
        let medium = FileMedium::new(&blocker);

        assert!(matches!(medium.write("k", "v").await, Err(HistoryError::Unavailable(_))));
        assert!(matches!(medium.read("k").await, Err(HistoryError::Unavailable(_))));
    }

    #[tokio::test]
    async fn memory_medium_switch() {
        let medium = MemoryMedium::new();
        medium.write("k", "v").await.unwrap();
        medium.set_available(false);
        assert!(medium.read("k").await.is_err());
        medium.set_available(true);
        assert_eq!(medium.read("k").await.unwrap().as_deref(), Some("v"));
    }
}
