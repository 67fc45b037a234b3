use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of extracted page content. Serialized lowercase so the wire form
/// matches the index's `type` keyword field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Text,
    Table,
    Image,
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockKind::Text => write!(f, "text"),
            BlockKind::Table => write!(f, "table"),
            BlockKind::Image => write!(f, "image"),
        }
    }
}

/// One extracted unit of page content. Created once during extraction and
/// never mutated; a re-upload produces a fresh set of blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentBlock {
    pub kind: BlockKind,
    /// Zero-based page index.
    pub page_number: u32,
    /// Position within (page, kind); restarts at 0 for each kind on each page.
    pub block_index: u32,
    pub content: String,
    /// Set when extraction of this block partially failed but the block is
    /// still emitted with best-effort content.
    pub error: Option<String>,
}

impl ContentBlock {
    pub fn new(kind: BlockKind, page_number: u32, block_index: u32, content: String) -> Self {
        Self {
            kind,
            page_number,
            block_index,
            content,
            error: None,
        }
    }

    pub fn failed(kind: BlockKind, page_number: u32, block_index: u32, error: String) -> Self {
        Self {
            kind,
            page_number,
            block_index,
            content: String::new(),
            error: Some(error),
        }
    }
}

/// A content block ready for the vector index: owning document attached and
/// embedding computed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub document_id: String,
    #[serde(rename = "type")]
    pub kind: BlockKind,
    pub page_number: u32,
    pub block_index: u32,
    pub content: String,
    pub embedding: Vec<f32>,
}

impl IndexedDocument {
    pub fn from_block(block: &ContentBlock, document_id: &str, embedding: Vec<f32>) -> Self {
        Self {
            document_id: document_id.to_string(),
            kind: block.kind,
            page_number: block.page_number,
            block_index: block.block_index,
            content: block.content.clone(),
            embedding,
        }
    }
}

/// Metadata record for an uploaded document, persisted by the record store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub document_id: String,
    pub owner_id: String,
    pub file_name: String,
    pub checksum: String,
    pub block_count: usize,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchQuery {
    pub text: String,
    /// When set, results are restricted to this document at the store level.
    pub document_id: Option<String>,
    pub top_k: usize,
}

pub const DEFAULT_TOP_K: usize = 5;

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            document_id: None,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn scoped_to(mut self, document_id: impl Into<String>) -> Self {
        self.document_id = Some(document_id.into());
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }
}

/// One ranked search result. There is no embedding field on this type;
/// raw vectors never travel back to a caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub document_id: String,
    #[serde(rename = "type")]
    pub kind: BlockKind,
    pub page_number: u32,
    pub block_index: u32,
    pub content: String,
    pub score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&BlockKind::Text).unwrap(), "\"text\"");
        assert_eq!(
            serde_json::to_string(&BlockKind::Table).unwrap(),
            "\"table\""
        );
        assert_eq!(
            serde_json::to_string(&BlockKind::Image).unwrap(),
            "\"image\""
        );
    }

    #[test]
    fn indexed_document_uses_type_field_on_the_wire() {
        let block = ContentBlock::new(BlockKind::Table, 0, 1, "Headers: a.".to_string());
        let doc = IndexedDocument::from_block(&block, "doc-1", vec![0.0; 4]);
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["type"], "table");
        assert_eq!(value["page_number"], 0);
        assert_eq!(value["block_index"], 1);
    }

    #[test]
    fn search_query_builder_defaults() {
        let query = SearchQuery::new("quarterly revenue");
        assert_eq!(query.top_k, DEFAULT_TOP_K);
        assert!(query.document_id.is_none());

        let scoped = SearchQuery::new("quarterly revenue")
            .scoped_to("doc-1")
            .with_top_k(10);
        assert_eq!(scoped.document_id.as_deref(), Some("doc-1"));
        assert_eq!(scoped.top_k, 10);
    }
}
