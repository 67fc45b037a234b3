//! Record-store implementations. The real system keeps document metadata
//! in a relational store behind this boundary; these two cover tests and
//! single-machine CLI runs.

use crate::error::StoreError;
use crate::models::DocumentRecord;
use crate::traits::RecordStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Cloning yields a handle to the same underlying map.
#[derive(Clone, Default)]
pub struct MemoryRecords {
    records: Arc<RwLock<HashMap<String, DocumentRecord>>>,
}

impl MemoryRecords {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecords {
    async fn create(&self, record: &DocumentRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        records.insert(record.document_id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, document_id: &str) -> Result<Option<DocumentRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records.get(document_id).cloned())
    }
}

/// Flat-file record store: the whole map serialized as one JSON document.
/// Good enough for a single CLI process; no cross-process locking.
pub struct JsonFileRecords {
    path: PathBuf,
}

impl JsonFileRecords {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn load(&self) -> Result<HashMap<String, DocumentRecord>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(error) => Err(StoreError::Request(format!(
                "cannot read {}: {error}",
                self.path.display()
            ))),
        }
    }
}

#[async_trait]
impl RecordStore for JsonFileRecords {
    async fn create(&self, record: &DocumentRecord) -> Result<(), StoreError> {
        let mut records = self.load().await?;
        records.insert(record.document_id.clone(), record.clone());

        let serialized = serde_json::to_vec_pretty(&records)?;
        tokio::fs::write(&self.path, serialized)
            .await
            .map_err(|error| {
                StoreError::Request(format!("cannot write {}: {error}", self.path.display()))
            })
    }

    async fn get(&self, document_id: &str) -> Result<Option<DocumentRecord>, StoreError> {
        Ok(self.load().await?.remove(document_id))
    }
}

#[cfg(test)]
mod tests {
    use super::{JsonFileRecords, MemoryRecords};
    use crate::models::DocumentRecord;
    use crate::traits::RecordStore;
    use chrono::Utc;
    use tempfile::tempdir;

    fn record(document_id: &str, owner_id: &str) -> DocumentRecord {
        DocumentRecord {
            document_id: document_id.to_string(),
            owner_id: owner_id.to_string(),
            file_name: "report.pdf".to_string(),
            checksum: "abc".to_string(),
            block_count: 3,
            uploaded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn memory_records_round_trip() {
        let records = MemoryRecords::new();
        records.create(&record("doc-1", "alice")).await.unwrap();

        let found = records.get("doc-1").await.unwrap().unwrap();
        assert_eq!(found.owner_id, "alice");
        assert!(records.get("doc-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn json_file_records_persist_across_instances() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("records.json");

        let writer = JsonFileRecords::new(&path);
        writer.create(&record("doc-1", "alice")).await.unwrap();
        writer.create(&record("doc-2", "bob")).await.unwrap();

        let reader = JsonFileRecords::new(&path);
        let found = reader.get("doc-2").await.unwrap().unwrap();
        assert_eq!(found.owner_id, "bob");
        assert!(reader.get("doc-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = tempdir().unwrap();
        let records = JsonFileRecords::new(dir.path().join("absent.json"));
        assert!(records.get("doc-1").await.unwrap().is_none());
    }
}
