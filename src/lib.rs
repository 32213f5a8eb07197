//! Local proposal cache for a governor DAO: subgraph sync, a SQLite store,
//! and semantic search over embedded proposal text.

pub mod config;
pub mod db;
pub mod embeddings;
pub mod error;
pub mod indexer;
pub mod models;
pub mod rag;
pub mod status;
pub mod subgraph;
pub mod sync;
pub mod tools;

pub use error::{CacheError, Result};
