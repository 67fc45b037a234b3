use crate::embeddings::EmbeddingProvider;
use crate::error::{IngestError, SearchError};
use crate::extractor::ContentExtractor;
use crate::models::{DocumentRecord, IndexedDocument, SearchHit, SearchQuery};
use crate::traits::{RecordStore, VectorIndex};
use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Sequences extraction, embedding, metadata persistence, and indexing for
/// uploads, and embedding plus filtered k-NN for searches. All collaborators
/// are constructor-injected so tests can substitute fakes.
pub struct PdfPipeline<X, E, V, R>
where
    X: ContentExtractor,
    E: EmbeddingProvider,
    V: VectorIndex,
    R: RecordStore,
{
    extractor: X,
    embedder: E,
    index: V,
    records: R,
}

impl<X, E, V, R> PdfPipeline<X, E, V, R>
where
    X: ContentExtractor,
    E: EmbeddingProvider,
    V: VectorIndex,
    R: RecordStore,
{
    pub fn new(extractor: X, embedder: E, index: V, records: R) -> Self {
        Self {
            extractor,
            embedder,
            index,
            records,
        }
    }

    /// Upload path. An embedding or index failure aborts the whole call:
    /// a document is either fully indexed or not searchable at all, so a
    /// scoped search never returns a silently incomplete view.
    pub async fn ingest(
        &self,
        pdf_bytes: &[u8],
        content_type: &str,
        file_name: &str,
        owner_id: &str,
    ) -> Result<DocumentRecord, IngestError> {
        if content_type != PDF_CONTENT_TYPE {
            return Err(IngestError::InvalidInput(format!(
                "unsupported content type: {content_type}"
            )));
        }

        let blocks = self.extractor.extract(pdf_bytes)?;
        let document_id = Uuid::new_v4().to_string();

        // Error-tagged blocks are embedded too; their (possibly empty)
        // content is filtered at the indexing boundary, not here.
        let mut documents = Vec::with_capacity(blocks.len());
        for block in &blocks {
            let embedding = self.embedder.embed(&block.content).await?;
            documents.push(IndexedDocument::from_block(block, &document_id, embedding));
        }

        let record = DocumentRecord {
            document_id: document_id.clone(),
            owner_id: owner_id.to_string(),
            file_name: file_name.to_string(),
            checksum: digest_bytes(pdf_bytes),
            block_count: blocks.len(),
            uploaded_at: Utc::now(),
        };

        // Metadata goes in first so any document_id a search can see is
        // guaranteed to resolve in the record store.
        self.records
            .create(&record)
            .await
            .map_err(|error| IngestError::RecordStore(error.to_string()))?;

        self.index.ensure_schema().await?;

        let indexable: Vec<IndexedDocument> = documents
            .into_iter()
            .filter(|document| !document.content.trim().is_empty())
            .collect();

        if let Err(error) = self.index.upsert(&indexable).await {
            // Writes already accepted by the store stay in place; the
            // caller sees the failure and decides whether to retry.
            warn!(%document_id, %error, "index write failed mid-batch, no rollback");
            return Err(error.into());
        }

        info!(
            %document_id,
            owner = owner_id,
            blocks = record.block_count,
            indexed = indexable.len(),
            "document ingested"
        );

        Ok(record)
    }

    /// Search path. A scoped query is authorized against the record store
    /// before any embedding work; a missing record and a foreign owner are
    /// deliberately indistinguishable to the caller.
    pub async fn search(
        &self,
        query: &SearchQuery,
        caller_id: &str,
    ) -> Result<Vec<SearchHit>, SearchError> {
        if query.text.trim().is_empty() {
            return Err(SearchError::InvalidInput("query text is empty".to_string()));
        }

        if let Some(document_id) = &query.document_id {
            let record = self
                .records
                .get(document_id)
                .await
                .map_err(|error| SearchError::RecordStore(error.to_string()))?;

            match record {
                Some(record) if record.owner_id == caller_id => {}
                _ => return Err(SearchError::NotFound(document_id.clone())),
            }
        }

        let query_vector = self.embedder.embed(&query.text).await?;
        let hits = self
            .index
            .search(&query_vector, query.document_id.as_deref(), query.top_k)
            .await?;

        Ok(hits)
    }
}

fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
