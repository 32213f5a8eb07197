use crate::config::{Config, EmbeddingProviderKind};
use crate::error::{CacheError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::time::{timeout, Duration};

mod hashing;
mod openai;

pub use hashing::HashingEmbedder;
pub use openai::OpenAiEmbedder;

/// Turns text into a fixed-dimension vector. Indexing and search must use the
/// same implementation, or stored vectors and query vectors will not compare.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn model_name(&self) -> &str;
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

pub fn from_config(config: &Config) -> Arc<dyn Embedder> {
    match config.embedding_provider {
        EmbeddingProviderKind::OpenAi => Arc::new(OpenAiEmbedder::new(config)),
        EmbeddingProviderKind::Hashing => Arc::new(HashingEmbedder::new(config.embedding_dimensions)),
    }
}

/// Bounds a provider call; a hung provider surfaces as an embedding error.
pub async fn embed_with_timeout(embedder: &dyn Embedder, text: &str, secs: u64) -> Result<Vec<f32>> {
    let vector = timeout(Duration::from_secs(secs), embedder.embed(text))
        .await
        .map_err(|_| {
            CacheError::EmbeddingProvider(format!(
                "{} timed out after {}s",
                embedder.model_name(),
                secs
            ))
        })??;

    if vector.is_empty() {
        return Err(CacheError::EmbeddingProvider(format!(
            "{} returned an empty vector",
            embedder.model_name()
        )));
    }
    Ok(vector)
}
