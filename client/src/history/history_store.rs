use tokio::sync::RwLock;

use crate::error::HistoryError;
use crate::history::medium::StorageMedium;
use crate::history::models::AnalysisEntry;

pub const HISTORY_KEY: &str = "cassava_history";
pub const HISTORY_CAPACITY: usize = 50;

/// Newest-first list of past analyses, capped at [`HISTORY_CAPACITY`].
///
/// The whole list lives in one record of the medium. Writers take the lock
/// exclusively for the full read-modify-write, so overlapping appends cannot
/// drop each other's entries.
pub struct HistoryStore<M> {
    medium: RwLock<M>,
}

impl<M: StorageMedium> HistoryStore<M> {
    pub fn new(medium: M) -> Self {
        Self {
            medium: RwLock::new(medium),
        }
    }

    pub async fn append(&self, entry: AnalysisEntry) -> Result<(), HistoryError> {
        let medium = self.medium.write().await;
        let mut entries = load(&*medium).await?;

        let id = entry.id();
        entries.insert(0, entry);
        if entries.len() > HISTORY_CAPACITY {
            let evicted = entries.len() - HISTORY_CAPACITY;
            entries.truncate(HISTORY_CAPACITY);
            log::debug!("History full, evicted {} oldest entries", evicted);
        }

        let json = serde_json::to_string(&entries)
            .map_err(|e| HistoryError::Corrupt(format!("cannot encode history: {e}")))?;
        medium.write(HISTORY_KEY, &json).await?;
        log::info!("Saved analysis {} to history ({} entries)", id, entries.len());
        Ok(())
    }

    pub async fn list_all(&self) -> Result<Vec<AnalysisEntry>, HistoryError> {
        let medium = self.medium.read().await;
        load(&*medium).await
    }

    pub async fn clear(&self) -> Result<(), HistoryError> {
        let medium = self.medium.write().await;
        medium.remove(HISTORY_KEY).await?;
        log::info!("History cleared");
        Ok(())
    }
}

async fn load<M: StorageMedium>(medium: &M) -> Result<Vec<AnalysisEntry>, HistoryError> {
    match medium.read(HISTORY_KEY).await? {
        Some(json) => serde_json::from_str(&json).map_err(|e| {
            log::error!("History record cannot be decoded: {}", e);
            HistoryError::Corrupt(e.to_string())
        }),
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use super::*;
    use crate::history::medium::MemoryMedium;
    use crate::history::models::SingleEntry;
    use shared::{ClassLabel, PredictionResult, PredictionSource};

    fn entry(n: usize) -> AnalysisEntry {
        let result = PredictionResult::new(ClassLabel::Healthy, 60.0 + (n % 40) as f64, PredictionSource::Remote)
            .unwrap();
        SingleEntry::new(Path::new(&format!("/photos/{n}.jpg")), result).into()
    }

    #[tokio::test]
    async fn keeps_newest_fifty() {
        let store = HistoryStore::new(MemoryMedium::new());
        let mut appended = Vec::new();
        for n in 1..=51 {
            let e = entry(n);
            appended.push(e.clone());
            store.append(e).await.unwrap();
        }

        let listed = store.list_all().await.unwrap();
        assert_eq!(listed.len(), 50);
        assert_eq!(listed[0], appended[50]);
        assert_eq!(listed[49], appended[1]);
        assert!(!listed.contains(&appended[0]));
    }

    #[tokio::test]
    async fn clear_is_idempotent() {
        let store = HistoryStore::new(MemoryMedium::new());
        store.append(entry(1)).await.unwrap();
        store.clear().await.unwrap();
        assert!(store.list_all().await.unwrap().is_empty());
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn empty_and_unreadable_are_distinguishable() {
        let medium = Arc::new(MemoryMedium::new());
        let store = HistoryStore::new(medium.clone());
        assert_eq!(store.list_all().await, Ok(Vec::new()));

        medium.set_available(false);
        assert!(matches!(store.list_all().await, Err(HistoryError::Unavailable(_))));
        assert!(matches!(store.append(entry(1)).await, Err(HistoryError::Unavailable(_))));
        assert!(matches!(store.clear().await, Err(HistoryError::Unavailable(_))));
    }

    #[tokio::test]
    async fn corrupt_record_is_reported() {
        let medium = Arc::new(MemoryMedium::new());
        medium.insert_raw(HISTORY_KEY, "{not json");
        let store = HistoryStore::new(medium);
        assert!(matches!(store.list_all().await, Err(HistoryError::Corrupt(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_appends_lose_nothing() {
        let store = Arc::new(HistoryStore::new(MemoryMedium::new()));
        let mut handles = Vec::new();
        for n in 0..40 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.append(entry(n)).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(store.list_all().await.unwrap().len(), 40);

        let mut handles = Vec::new();
        for n in 40..70 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.append(entry(n)).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(store.list_all().await.unwrap().len(), HISTORY_CAPACITY);
    }
}
