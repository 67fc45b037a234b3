use crate::error::EmbedError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

/// Dimension of the sentence-transformer family this system indexes with.
/// The index mapping is declared against this value; a provider returning
/// anything else is a configuration error, not one to tolerate at runtime.
pub const EMBEDDING_DIMENSIONS: usize = 384;

/// Maps text to a fixed-dimension dense vector. Deterministic for a fixed
/// model version.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn dimensions(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;
}

/// Local hashing embedder: character trigrams FNV-hashed into a fixed
/// number of buckets, L2-normalized. Deterministic and dependency-free,
/// used when no serving endpoint is configured and throughout tests.
#[derive(Debug, Clone, Copy)]
pub struct HashEmbedder {
    pub dimensions: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self {
            dimensions: EMBEDDING_DIMENSIONS,
        }
    }
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x1000_0000_01b3;

impl HashEmbedder {
    /// Bucket counts over character trigrams, hashed with FNV-1a,
    /// then L2-normalized so cosine scores are comparable across inputs.
    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let dims = self.dimensions.max(1);
        let mut buckets = vec![0f32; dims];
        let lowered: Vec<char> = text.to_lowercase().chars().collect();

        for trigram in lowered.windows(3) {
            let mut hash = FNV_OFFSET;
            let mut utf8 = [0u8; 4];
            for ch in trigram {
                for byte in ch.encode_utf8(&mut utf8).bytes() {
                    hash ^= u64::from(byte);
                    hash = hash.wrapping_mul(FNV_PRIME);
                }
            }
            buckets[(hash % dims as u64) as usize] += 1.0;
        }

        let norm = buckets.iter().map(|count| count * count).sum::<f32>().sqrt();
        if norm > 0.0 {
            for bucket in &mut buckets {
                *bucket /= norm;
            }
        }

        buckets
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        Ok(self.embed_sync(text))
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// Client for a sentence-transformer serving endpoint. The returned vector
/// length is validated against the configured dimension on every call.
pub struct HttpEmbedder {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
    dimensions: usize,
}

impl HttpEmbedder {
    pub fn new(endpoint: &str, api_key: Option<String>) -> Result<Self, EmbedError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|error| EmbedError::Provider(format!("bad endpoint url: {error}")))?;

        Ok(Self {
            client: Client::new(),
            endpoint,
            api_key,
            dimensions: EMBEDDING_DIMENSIONS,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut request = self
            .client
            .post(self.endpoint.clone())
            .json(&EmbedRequest { text });

        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(EmbedError::Provider(format!(
                "embedding endpoint returned {}",
                response.status()
            )));
        }

        let payload: EmbedResponse = response.json().await?;

        if payload.embedding.len() != self.dimensions {
            return Err(EmbedError::Dimensions {
                expected: self.dimensions,
                actual: payload.embedding.len(),
            });
        }

        Ok(payload.embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::{EmbeddingProvider, HashEmbedder, HttpEmbedder, EMBEDDING_DIMENSIONS};

    #[tokio::test]
    async fn hash_embedder_is_deterministic() {
        let embedder = HashEmbedder::default();
        let first = embedder.embed("quarterly revenue grew").await.unwrap();
        let second = embedder.embed("quarterly revenue grew").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn hash_embedder_outputs_index_dimension() {
        let embedder = HashEmbedder::default();
        let vector = embedder.embed("abc").await.unwrap();
        assert_eq!(vector.len(), EMBEDDING_DIMENSIONS);
        assert_eq!(embedder.dimensions(), EMBEDDING_DIMENSIONS);
    }

    #[tokio::test]
    async fn hash_embedder_maps_empty_text_to_a_zero_vector() {
        let embedder = HashEmbedder::default();
        let vector = embedder.embed("").await.unwrap();
        assert!(vector.iter().all(|value| *value == 0.0));
    }

    #[tokio::test]
    async fn hash_embedder_normalizes_nonempty_text() {
        let embedder = HashEmbedder::default();
        let vector = embedder.embed("hello world").await.unwrap();
        let magnitude: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-5);
    }

    #[test]
    fn http_embedder_rejects_malformed_endpoint() {
        assert!(HttpEmbedder::new("not a url", None).is_err());
    }
}
