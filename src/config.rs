use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    /// Any OpenAI-compatible `/embeddings` endpoint.
    OpenAi,
    /// Offline feature-hashing vectors; no network.
    Hashing,
}

impl FromStr for EmbeddingProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(EmbeddingProviderKind::OpenAi),
            "hashing" => Ok(EmbeddingProviderKind::Hashing),
            other => Err(anyhow::anyhow!(
                "EMBEDDING_PROVIDER must be 'openai' or 'hashing', got '{}'",
                other
            )),
        }
    }
}

#[derive(Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub subgraph_url: Option<String>,
    pub dao_address: Option<String>,
    pub subgraph_timeout_secs: u64,
    // Sync settings
    pub sync_page_size: usize,
    pub sync_recent_window: usize,
    pub sync_votes_page_size: usize,
    // Embedding settings
    pub embedding_provider: EmbeddingProviderKind,
    pub embedding_url: String,
    pub embedding_model: String,
    pub embedding_api_key: Option<String>,
    pub embedding_dimensions: usize,
    pub embedding_timeout_secs: u64,
    pub chunk_max_chars: usize,
    pub chunk_overlap_chars: usize,
    // Search defaults
    pub search_default_limit: usize,
    pub search_default_threshold: f32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();
        Self::build()
    }

    fn build() -> anyhow::Result<Self> {
        let config = Config {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "data/proposals.db".to_string()),
            subgraph_url: env::var("SUBGRAPH_URL").ok().filter(|v| !v.trim().is_empty()),
            dao_address: env::var("DAO_ADDRESS")
                .ok()
                .map(|v| v.trim().to_lowercase())
                .filter(|v| !v.is_empty()),
            subgraph_timeout_secs: parse_or("SUBGRAPH_TIMEOUT_SECS", 30),
            sync_page_size: parse_or("SYNC_PAGE_SIZE", 200),
            sync_recent_window: parse_or("SYNC_RECENT_WINDOW", 200),
            sync_votes_page_size: parse_or("SYNC_VOTES_PAGE_SIZE", 1000),
            embedding_provider: env::var("EMBEDDING_PROVIDER")
                .unwrap_or_else(|_| "openai".to_string())
                .parse()?,
            embedding_url: env::var("EMBEDDING_URL")
                .unwrap_or_else(|_| "http://localhost:8080/v1".to_string()),
            embedding_model: env::var("EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
            embedding_api_key: env::var("EMBEDDING_API_KEY").ok(),
            embedding_dimensions: parse_or("EMBEDDING_DIMENSIONS", 384),
            embedding_timeout_secs: parse_or("EMBEDDING_TIMEOUT_SECS", 30),
            chunk_max_chars: parse_or("CHUNK_MAX_CHARS", 1500),
            chunk_overlap_chars: parse_or("CHUNK_OVERLAP_CHARS", 200),
            search_default_limit: parse_or("SEARCH_DEFAULT_LIMIT", 5),
            search_default_threshold: parse_or("SEARCH_DEFAULT_THRESHOLD", 0.3),
        };

        if config.sync_page_size == 0 || config.sync_votes_page_size == 0 {
            return Err(anyhow::anyhow!(
                "SYNC_PAGE_SIZE and SYNC_VOTES_PAGE_SIZE must be positive"
            ));
        }
        if config.chunk_max_chars == 0 || config.chunk_overlap_chars >= config.chunk_max_chars {
            return Err(anyhow::anyhow!(
                "CHUNK_OVERLAP_CHARS must be smaller than a positive CHUNK_MAX_CHARS"
            ));
        }

        Ok(config)
    }

    /// The subgraph endpoint and DAO address, both required before a sync.
    pub fn subgraph_target(&self) -> anyhow::Result<(&str, &str)> {
        let url = self
            .subgraph_url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("SUBGRAPH_URL must be set to sync"))?;
        let dao = self
            .dao_address
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("DAO_ADDRESS must be set to sync"))?;
        Ok((url, dao))
    }
}

fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &self.database_url)
            .field("subgraph_url", &self.subgraph_url)
            .field("dao_address", &self.dao_address)
            .field("subgraph_timeout_secs", &self.subgraph_timeout_secs)
            .field("sync_page_size", &self.sync_page_size)
            .field("sync_recent_window", &self.sync_recent_window)
            .field("sync_votes_page_size", &self.sync_votes_page_size)
            .field("embedding_provider", &self.embedding_provider)
            .field("embedding_url", &self.embedding_url)
            .field("embedding_model", &self.embedding_model)
            .field(
                "embedding_api_key",
                &self.embedding_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("embedding_dimensions", &self.embedding_dimensions)
            .field("embedding_timeout_secs", &self.embedding_timeout_secs)
            .field("chunk_max_chars", &self.chunk_max_chars)
            .field("chunk_overlap_chars", &self.chunk_overlap_chars)
            .field("search_default_limit", &self.search_default_limit)
            .field("search_default_threshold", &self.search_default_threshold)
            .finish()
    }
}
