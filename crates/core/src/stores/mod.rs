pub mod elasticsearch;
pub mod memory;
pub mod records;

pub use elasticsearch::{ElasticStore, IndexSchema};
pub use memory::MemoryIndex;
pub use records::{JsonFileRecords, MemoryRecords};
