use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::ForgeError;
use crate::utils::now_millis;

pub const HISTORY_KEY: &str = "monsterHistory";
pub const HISTORY_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub prompt: String,
    pub image_url: String,
    pub timestamp: i64,
}

/// Newest first, never longer than [`HISTORY_LIMIT`].
pub type HistoryLog = Vec<HistoryEntry>;

/// Narrow string key/value storage the history lives in.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: Arc<DashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.values.get(key).map(|v| v.clone()))
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Read-modify-write access to the persisted generation log.
#[derive(Clone)]
pub struct HistoryStore {
    store: Arc<dyn KeyValueStore>,
}

impl HistoryStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// The persisted log; missing or unreadable data reads as empty.
    pub async fn read_all(&self) -> HistoryLog {
        match self.load().await {
            Ok(log) => log,
            Err(e) => {
                warn!(error = %e, "history read failed, treating as empty");
                HistoryLog::new()
            }
        }
    }

    /// Like [`read_all`](Self::read_all), but a failing store is an error
    /// instead of an empty log. Malformed data still reads as empty.
    async fn load(&self) -> Result<HistoryLog, ForgeError> {
        let raw = match self.store.get(HISTORY_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Ok(HistoryLog::new()),
            Err(e) => return Err(ForgeError::Storage(format!("read {HISTORY_KEY}: {e}"))),
        };
        match serde_json::from_str::<HistoryLog>(&raw) {
            Ok(mut log) => {
                log.truncate(HISTORY_LIMIT);
                Ok(log)
            }
            Err(e) => {
                warn!(error = %e, "malformed history, treating as empty");
                Ok(HistoryLog::new())
            }
        }
    }

    /// Prepends a new entry stamped now and drops whatever falls past the cap.
    ///
    /// A store that cannot be read aborts the write; the existing log is left
    /// as it was.
    pub async fn append(
        &self,
        prompt: &str,
        image_url: &str,
    ) -> Result<HistoryEntry, ForgeError> {
        let entry = HistoryEntry {
            prompt: prompt.to_string(),
            image_url: image_url.to_string(),
            timestamp: now_millis(),
        };

        let mut log = self.load().await?;
        log.insert(0, entry.clone());
        log.truncate(HISTORY_LIMIT);

        let json = serde_json::to_string(&log).map_err(|e| ForgeError::Storage(e.to_string()))?;
        self.store
            .set(HISTORY_KEY, &json)
            .await
            .map_err(|e| ForgeError::Storage(e.to_string()))?;
        debug!(len = log.len(), "history saved");
        Ok(entry)
    }

    pub async fn get(&self, index: usize) -> Option<HistoryEntry> {
        self.read_all().await.into_iter().nth(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct BrokenStore;

    /// Memory store whose next `get` fails once when armed.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_next_get: AtomicBool,
    }

    #[async_trait]
    impl KeyValueStore for FlakyStore {
        async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
            if self.fail_next_get.swap(false, Ordering::SeqCst) {
                anyhow::bail!("database is locked");
            }
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
            self.inner.set(key, value).await
        }
    }

    #[async_trait]
    impl KeyValueStore for BrokenStore {
        async fn get(&self, _key: &str) -> anyhow::Result<Option<String>> {
            anyhow::bail!("disk on fire")
        }

        async fn set(&self, _key: &str, _value: &str) -> anyhow::Result<()> {
            anyhow::bail!("disk on fire")
        }
    }

    #[tokio::test]
    async fn keeps_fifty_newest_first() {
        let history = HistoryStore::new(Arc::new(MemoryStore::new()));
        for i in 1..=51 {
            history.append(&format!("p{i}"), &format!("u{i}")).await.unwrap();
        }

        let log = history.read_all().await;
        assert_eq!(log.len(), 50);
        assert_eq!(log[0].prompt, "p51");
        assert_eq!(log[49].prompt, "p2");
        assert!(log.iter().all(|e| e.prompt != "p1"));
        assert!(log.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
    }

    #[tokio::test]
    async fn empty_or_malformed_storage_reads_as_empty() {
        let store = Arc::new(MemoryStore::new());
        let history = HistoryStore::new(store.clone());
        assert!(history.read_all().await.is_empty());

        for junk in ["{not json", "null", "{\"prompt\":\"x\"}", "[1,2,3]"] {
            store.set(HISTORY_KEY, junk).await.unwrap();
            assert!(history.read_all().await.is_empty(), "{junk}");
        }

        assert!(HistoryStore::new(Arc::new(BrokenStore)).read_all().await.is_empty());
    }

    #[tokio::test]
    async fn append_over_malformed_data_starts_fresh() {
        let store = Arc::new(MemoryStore::new());
        store.set(HISTORY_KEY, "garbage").await.unwrap();
        let history = HistoryStore::new(store);

        history.append("p", "u").await.unwrap();
        assert_eq!(history.read_all().await.len(), 1);
    }

    #[tokio::test]
    async fn persisted_format_uses_camel_case_keys() {
        let store = Arc::new(MemoryStore::new());
        let history = HistoryStore::new(store.clone());
        let entry = history.append("a prompt", "https://cdn/a.png").await.unwrap();

        let raw = store.get(HISTORY_KEY).await.unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value[0]["imageUrl"], "https://cdn/a.png");
        assert_eq!(value[0]["timestamp"], entry.timestamp);
        assert_eq!(history.get(0).await, Some(entry));
        assert_eq!(history.get(1).await, None);
    }

    #[tokio::test]
    async fn failed_write_is_a_storage_error() {
        let history = HistoryStore::new(Arc::new(BrokenStore));
        let err = history.append("p", "u").await.unwrap_err();
        assert!(matches!(err, ForgeError::Storage(_)));
    }

    #[tokio::test]
    async fn unreadable_store_aborts_append_and_keeps_log() {
        let store = Arc::new(FlakyStore::default());
        let history = HistoryStore::new(store.clone());
        for i in 1..=20 {
            history.append(&format!("p{i}"), &format!("u{i}")).await.unwrap();
        }

        store.fail_next_get.store(true, Ordering::SeqCst);
        let err = history.append("new", "u-new").await.unwrap_err();
        assert!(matches!(err, ForgeError::Storage(_)));

        let log = history.read_all().await;
        assert_eq!(log.len(), 20);
        assert_eq!(log[0].prompt, "p20");

        history.append("new", "u-new").await.unwrap();
        assert_eq!(history.read_all().await.len(), 21);
    }
}
