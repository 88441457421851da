//! Filesystem-backed document store: one JSON file per detail record, keyed
//! by a store-generated UUID.

use async_trait::async_trait;
use std::path::PathBuf;
use uuid::Uuid;

use crate::data_model::DocumentDetail;
use crate::stores::{DetailStore, StoreError};

#[derive(Clone)]
pub struct JsonDetailStore {
    dir: PathBuf,
}

impl JsonDetailStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(JsonDetailStore { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// Number of detail records currently stored. Used by tests and the
    /// reconciliation tooling; not on the hot path.
    pub fn len(&self) -> Result<usize, StoreError> {
        let mut count = 0;
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.path().extension().map(|e| e == "json").unwrap_or(false) {
                count += 1;
            }
        }
        Ok(count)
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl DetailStore for JsonDetailStore {
    async fn ping(&self) -> Result<(), StoreError> {
        let metadata = tokio::fs::metadata(&self.dir).await?;
        if !metadata.is_dir() {
            return Err(StoreError::Connection(format!(
                "{} is not a directory",
                self.dir.display()
            )));
        }
        Ok(())
    }

    async fn insert(&self, detail: &DocumentDetail) -> Result<String, StoreError> {
        let key = Uuid::new_v4().to_string();
        let payload = serde_json::to_vec_pretty(detail)?;
        tokio::fs::write(self.path_for(&key), payload).await?;
        Ok(key)
    }

    async fn get(&self, key: &str) -> Result<Option<DocumentDetail>, StoreError> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap;

    fn detail(record_id: i64) -> DocumentDetail {
        DocumentDetail {
            cross_store_ref: record_id,
            text: "Invoice No: INV-1".to_string(),
            document_type: "invoice".to_string(),
            entities: Vec::new(),
            confidence: HashMap::new(),
            raw_metadata: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn insert_then_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDetailStore::open(dir.path()).unwrap();

        let key = store.insert(&detail(42)).await.unwrap();
        let loaded = store.get(&key).await.unwrap().unwrap();
        assert_eq!(loaded.cross_store_ref, 42);
        assert_eq!(loaded.document_type, "invoice");
        assert_eq!(store.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn get_unknown_key_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDetailStore::open(dir.path()).unwrap();
        assert!(store.get("no-such-key").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn ping_fails_when_dir_is_gone() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDetailStore::open(dir.path().join("details")).unwrap();
        store.ping().await.unwrap();

        std::fs::remove_dir_all(dir.path().join("details")).unwrap();
        assert!(store.ping().await.is_err());
    }
}
