pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod models;
pub mod ocr;
pub mod pipeline;
pub mod stores;
pub mod tables;
pub mod traits;

pub use embeddings::{EmbeddingProvider, HashEmbedder, HttpEmbedder, EMBEDDING_DIMENSIONS};
pub use error::{EmbedError, IngestError, SearchError, StoreError};
pub use extractor::{ContentExtractor, LopdfExtractor};
pub use models::{
    BlockKind, ContentBlock, DocumentRecord, IndexedDocument, SearchHit, SearchQuery,
    DEFAULT_TOP_K,
};
pub use ocr::{OcrEngine, OcrError, TesseractOcr};
pub use pipeline::{PdfPipeline, PDF_CONTENT_TYPE};
pub use stores::{ElasticStore, IndexSchema, JsonFileRecords, MemoryIndex, MemoryRecords};
pub use tables::{detect_tables, format_table_content, parse_table, TableRegion};
pub use traits::{RecordStore, VectorIndex};
