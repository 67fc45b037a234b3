//! In-memory vector index: brute-force cosine search over a Vec. Backs
//! unit tests and offline CLI runs; not a production store.

use crate::error::StoreError;
use crate::models::{IndexedDocument, SearchHit};
use crate::traits::VectorIndex;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Cloning yields a handle to the same underlying store.
#[derive(Clone)]
pub struct MemoryIndex {
    documents: Arc<RwLock<Vec<IndexedDocument>>>,
    schema_ready: Arc<AtomicBool>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self {
            documents: Arc::new(RwLock::new(Vec::new())),
            schema_ready: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn schema_ready(&self) -> bool {
        self.schema_ready.load(Ordering::SeqCst)
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
        if a.len() != b.len() {
            return 0.0;
        }

        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }

        f64::from(dot / (norm_a * norm_b))
    }
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        // swap-or-not, either outcome means the schema exists
        self.schema_ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn upsert(&self, documents: &[IndexedDocument]) -> Result<(), StoreError> {
        let mut store = self.documents.write().await;
        for document in documents {
            if document.content.trim().is_empty() {
                continue;
            }
            store.push(document.clone());
        }
        debug!(total = store.len(), "memory index upsert");
        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        document_id: Option<&str>,
        top_k: usize,
    ) -> Result<Vec<SearchHit>, StoreError> {
        let store = self.documents.read().await;

        let mut scored: Vec<(f64, &IndexedDocument)> = store
            .iter()
            .filter(|document| {
                document_id.map_or(true, |id| document.document_id == id)
            })
            .map(|document| {
                (
                    Self::cosine_similarity(query_vector, &document.embedding),
                    document,
                )
            })
            .collect();

        scored.sort_by(|left, right| right.0.total_cmp(&left.0));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(score, document)| SearchHit {
                document_id: document.document_id.clone(),
                kind: document.kind,
                page_number: document.page_number,
                block_index: document.block_index,
                content: document.content.clone(),
                score,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryIndex;
    use crate::models::{BlockKind, ContentBlock, IndexedDocument};
    use crate::traits::VectorIndex;

    fn doc(document_id: &str, content: &str, embedding: Vec<f32>) -> IndexedDocument {
        let block = ContentBlock::new(BlockKind::Text, 0, 0, content.to_string());
        IndexedDocument::from_block(&block, document_id, embedding)
    }

    #[tokio::test]
    async fn ensure_schema_is_idempotent() {
        let index = MemoryIndex::new();
        for _ in 0..3 {
            index.ensure_schema().await.unwrap();
        }
        assert!(index.schema_ready());
    }

    #[tokio::test]
    async fn empty_content_is_never_stored() {
        let index = MemoryIndex::new();
        index
            .upsert(&[
                doc("doc-1", "  ", vec![1.0, 0.0]),
                doc("doc-1", "real content", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();
        assert_eq!(index.len().await, 1);
    }

    #[tokio::test]
    async fn scoped_search_never_leaks_other_documents() {
        let index = MemoryIndex::new();
        index
            .upsert(&[
                doc("doc-1", "alpha", vec![1.0, 0.0]),
                doc("doc-2", "beta", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let hits = index.search(&[1.0, 0.0], Some("doc-2"), 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits.iter().all(|hit| hit.document_id == "doc-2"));
    }

    #[tokio::test]
    async fn hits_are_ranked_by_similarity_descending() {
        let index = MemoryIndex::new();
        index
            .upsert(&[
                doc("doc-1", "far", vec![0.0, 1.0]),
                doc("doc-1", "near", vec![1.0, 0.1]),
            ])
            .await
            .unwrap();

        let hits = index.search(&[1.0, 0.0], None, 2).await.unwrap();
        assert_eq!(hits[0].content, "near");
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn top_k_truncates_the_result() {
        let index = MemoryIndex::new();
        index
            .upsert(&[
                doc("doc-1", "a", vec![1.0, 0.0]),
                doc("doc-1", "b", vec![0.9, 0.1]),
                doc("doc-1", "c", vec![0.8, 0.2]),
            ])
            .await
            .unwrap();

        let hits = index.search(&[1.0, 0.0], None, 2).await.unwrap();
        assert_eq!(hits.len(), 2);
    }
}
