use thiserror::Error;

/// Failures on the upload path. Every variant aborts the ingest call;
/// per-block extraction problems are carried on the blocks themselves.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbedError),

    #[error("index write failed: {0}")]
    IndexWrite(#[from] StoreError),

    #[error("record store error: {0}")]
    RecordStore(String),
}

/// Failures on the query path.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("document not found: {0}")]
    NotFound(String),

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbedError),

    #[error("search backend failed: {0}")]
    Backend(#[from] StoreError),

    #[error("record store error: {0}")]
    RecordStore(String),
}

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    Dimensions { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("store request failed: {0}")]
    Request(String),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
