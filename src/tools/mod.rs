use crate::config::Config;
use crate::db::Database;
use crate::embeddings::Embedder;
use crate::rag::{ChunkPolicy, SearchOptions};
use crate::subgraph::ProposalSource;
use crate::sync::SyncOptions;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

pub mod builtin;
pub mod executor;

pub use executor::ToolExecutor;

/// A JSON-in, JSON-out operation over the proposal cache.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> Value;
    async fn execute(&self, params: Value) -> anyhow::Result<Value>;
}

/// Everything the built-in tools share.
#[derive(Clone)]
pub struct ToolContext {
    pub db: Database,
    pub embedder: Arc<dyn Embedder>,
    /// `None` when no subgraph is configured; syncing then fails with a
    /// configuration error while read tools keep working.
    pub source: Option<Arc<dyn ProposalSource>>,
    pub sync_options: SyncOptions,
    pub chunk_policy: ChunkPolicy,
    pub embedding_timeout_secs: u64,
    pub search_defaults: SearchOptions,
}

impl ToolContext {
    pub fn new(
        config: &Config,
        db: Database,
        embedder: Arc<dyn Embedder>,
        source: Option<Arc<dyn ProposalSource>>,
    ) -> Self {
        Self {
            db,
            embedder,
            source,
            sync_options: SyncOptions::from(config),
            chunk_policy: ChunkPolicy::new(config.chunk_max_chars, config.chunk_overlap_chars),
            embedding_timeout_secs: config.embedding_timeout_secs,
            search_defaults: SearchOptions::default()
                .with_limit(config.search_default_limit)
                .with_threshold(config.search_default_threshold),
        }
    }
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in tool.
    pub fn with_builtins(ctx: &ToolContext) -> Self {
        let mut registry = Self::new();
        builtin::register_all(&mut registry, ctx);
        registry
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn list_tools(&self) -> Vec<Arc<dyn Tool>> {
        self.tools.values().cloned().collect()
    }

    pub fn get_definitions(&self) -> Vec<Value> {
        self.tools
            .values()
            .map(|tool| {
                serde_json::json!({
                    "name": tool.name(),
                    "description": tool.description(),
                    "parameters": tool.parameters_schema()
                })
            })
            .collect()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lists_builtins() {
        let db = Database::open_in_memory().unwrap();
        let registry = ToolRegistry::with_builtins(&test_support::context(&db, None));

        let names: Vec<String> = registry
            .list_tools()
            .iter()
            .map(|t| t.name().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "cache_status",
                "get_proposal",
                "get_vote_summary",
                "get_votes",
                "index_embeddings",
                "list_proposals",
                "search_proposals",
                "sync_proposals",
            ]
        );

        for definition in registry.get_definitions() {
            assert_eq!(definition["parameters"]["type"], "object");
        }
        assert!(registry.get("send_message").is_none());
    }
}
