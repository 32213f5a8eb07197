pub mod chunk;
pub mod search;
pub mod vector;

pub use chunk::ChunkPolicy;
pub use search::{SearchHit, SearchOptions, SemanticSearch};
