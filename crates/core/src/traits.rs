use crate::error::StoreError;
use crate::models::{DocumentRecord, IndexedDocument, SearchHit};
use async_trait::async_trait;

/// An embedding-searchable document store. Implementations treat the
/// backing store as externally synchronized; the pipeline issues plain
/// sequential calls against it.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Check-then-create the index schema. Idempotent; safe under
    /// concurrent first-time calls (a creation race reads as success).
    async fn ensure_schema(&self) -> Result<(), StoreError>;

    /// Write each document as a discrete index entry. Documents with
    /// empty content are never written, regardless of what the caller
    /// passed in.
    async fn upsert(&self, documents: &[IndexedDocument]) -> Result<(), StoreError>;

    /// Cosine k-NN over the embedding field. When `document_id` is set the
    /// filter is applied at the store level, before ranking. Hits come
    /// back score-descending, without embedding vectors.
    async fn search(
        &self,
        query_vector: &[f32],
        document_id: Option<&str>,
        top_k: usize,
    ) -> Result<Vec<SearchHit>, StoreError>;
}

/// Metadata store for uploaded documents, keyed by document id. An
/// external collaborator; the pipeline only needs create and lookup.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn create(&self, record: &DocumentRecord) -> Result<(), StoreError>;

    async fn get(&self, document_id: &str) -> Result<Option<DocumentRecord>, StoreError>;
}
