use crate::embeddings::EMBEDDING_DIMENSIONS;
use crate::error::StoreError;
use crate::models::{BlockKind, IndexedDocument, SearchHit};
use crate::traits::VectorIndex;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Typed declaration of the index mapping. Serializes to the body expected
/// by the index-creation endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct IndexSchema {
    pub mappings: Mappings,
}

#[derive(Debug, Clone, Serialize)]
pub struct Mappings {
    pub properties: Properties,
}

#[derive(Debug, Clone, Serialize)]
pub struct Properties {
    pub document_id: FieldMapping,
    #[serde(rename = "type")]
    pub kind: FieldMapping,
    pub content: FieldMapping,
    pub page_number: FieldMapping,
    pub block_index: FieldMapping,
    pub embedding: FieldMapping,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldMapping {
    #[serde(rename = "type")]
    pub field_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dims: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<&'static str>,
}

impl FieldMapping {
    fn plain(field_type: &'static str) -> Self {
        Self {
            field_type,
            dims: None,
            index: None,
            similarity: None,
        }
    }
}

impl Default for IndexSchema {
    fn default() -> Self {
        Self {
            mappings: Mappings {
                properties: Properties {
                    document_id: FieldMapping::plain("keyword"),
                    kind: FieldMapping::plain("keyword"),
                    content: FieldMapping::plain("text"),
                    page_number: FieldMapping::plain("integer"),
                    block_index: FieldMapping::plain("integer"),
                    embedding: FieldMapping {
                        field_type: "dense_vector",
                        dims: Some(EMBEDDING_DIMENSIONS),
                        index: Some(true),
                        similarity: Some("cosine"),
                    },
                },
            },
        }
    }
}

/// Elasticsearch-backed vector index over the HTTP API.
pub struct ElasticStore {
    client: Arc<Client>,
    endpoint: String,
    index_name: String,
    api_key: Option<String>,
}

impl ElasticStore {
    pub fn new(endpoint: &str, index_name: impl Into<String>) -> Result<Self, StoreError> {
        let parsed = Url::parse(endpoint)?;

        Ok(Self {
            client: Arc::new(Client::new()),
            endpoint: parsed.as_str().trim_end_matches('/').to_string(),
            index_name: index_name.into(),
            api_key: None,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("Authorization", format!("ApiKey {key}")),
            None => builder,
        }
    }

    fn index_url(&self) -> String {
        format!("{}/{}", self.endpoint, self.index_name)
    }
}

/// Classifies the index-creation response. Losing the check-then-create
/// race to a concurrent upload surfaces as a 400 naming
/// `resource_already_exists_exception`; the index exists, which is all
/// `ensure_schema` promises.
fn interpret_creation(status: StatusCode, body: &str) -> Result<(), StoreError> {
    if status.is_success() || body.contains("resource_already_exists_exception") {
        return Ok(());
    }

    Err(StoreError::Request(format!(
        "index setup failed with {status}: {body}"
    )))
}

/// Candidate pool handed to the approximate search so it has room to
/// re-rank before the top-k cut.
fn candidate_pool(top_k: usize) -> usize {
    (top_k * 10).max(50)
}

#[derive(Debug, Deserialize)]
struct HitSource {
    document_id: String,
    #[serde(rename = "type")]
    kind: BlockKind,
    page_number: u32,
    block_index: u32,
    content: String,
}

#[async_trait]
impl VectorIndex for ElasticStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        let response = self.request(self.client.head(self.index_url())).send().await?;

        if response.status() == StatusCode::OK {
            return Ok(());
        }

        if !response.status().is_client_error() {
            return Err(StoreError::BackendResponse {
                backend: "elasticsearch".to_string(),
                details: response.status().to_string(),
            });
        }

        let response = self
            .request(self.client.put(self.index_url()))
            .json(&IndexSchema::default())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        interpret_creation(status, &body)
    }

    async fn upsert(&self, documents: &[IndexedDocument]) -> Result<(), StoreError> {
        let mut written = 0usize;

        for document in documents {
            if document.content.trim().is_empty() {
                continue;
            }

            let response = self
                .request(self.client.post(format!("{}/_doc", self.index_url())))
                .json(document)
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(StoreError::BackendResponse {
                    backend: "elasticsearch".to_string(),
                    details: response.status().to_string(),
                });
            }

            written += 1;
        }

        debug!(written, index = %self.index_name, "indexed documents");
        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        document_id: Option<&str>,
        top_k: usize,
    ) -> Result<Vec<SearchHit>, StoreError> {
        let mut knn = json!({
            "field": "embedding",
            "query_vector": query_vector,
            "k": top_k,
            "num_candidates": candidate_pool(top_k),
        });

        if let Some(id) = document_id {
            knn["filter"] = json!({ "term": { "document_id": id } });
        }

        let body = json!({
            "knn": knn,
            "size": top_k,
            "_source": { "excludes": ["embedding"] },
        });

        let response = self
            .request(self.client.post(format!("{}/_search", self.index_url())))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "elasticsearch".to_string(),
                details: response.status().to_string(),
            });
        }

        let response_json: Value = response.json().await?;
        let raw_hits = response_json
            .pointer("/hits/hits")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut hits = Vec::with_capacity(raw_hits.len());
        for raw in raw_hits {
            let score = raw.pointer("/_score").and_then(Value::as_f64).unwrap_or(0.0);
            let source = raw.pointer("/_source").cloned().unwrap_or(Value::Null);
            let source: HitSource = serde_json::from_value(source)?;

            hits.push(SearchHit {
                document_id: source.document_id,
                kind: source.kind,
                page_number: source.page_number,
                block_index: source.block_index,
                content: source.content,
                score,
            });
        }

        Ok(hits)
    }
}
