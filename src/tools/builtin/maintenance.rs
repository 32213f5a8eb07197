use super::{opt_bool, opt_str};
use crate::db::Database;
use crate::embeddings::Embedder;
use crate::indexer::EmbeddingIndexer;
use crate::rag::ChunkPolicy;
use crate::subgraph::ProposalSource;
use crate::sync::{SyncEngine, SyncOptions};
use crate::tools::{Tool, ToolContext};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub struct SyncProposalsTool {
    db: Database,
    source: Option<Arc<dyn ProposalSource>>,
    options: SyncOptions,
}

impl SyncProposalsTool {
    pub fn new(ctx: &ToolContext) -> Self {
        Self {
            db: ctx.db.clone(),
            source: ctx.source.clone(),
            options: ctx.sync_options,
        }
    }
}

#[async_trait]
impl Tool for SyncProposalsTool {
    fn name(&self) -> &str {
        "sync_proposals"
    }

    fn description(&self) -> &str {
        "Pull proposals and votes from the subgraph into the local cache. An incremental pass re-reads the most recent proposals; a full pass re-reads everything."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "full": { "type": "boolean", "default": false }
            }
        })
    }

    async fn execute(&self, params: Value) -> anyhow::Result<Value> {
        let full = opt_bool(&params, "full")?.unwrap_or(false);
        let source = self.source.clone().ok_or_else(|| {
            anyhow::anyhow!("No proposal source configured; set SUBGRAPH_URL and DAO_ADDRESS")
        })?;

        let engine = SyncEngine::new(self.db.clone(), source, self.options);
        let summary = engine.sync(full).await?;
        Ok(serde_json::to_value(summary)?)
    }
}

pub struct IndexEmbeddingsTool {
    db: Database,
    embedder: Arc<dyn Embedder>,
    policy: ChunkPolicy,
    timeout_secs: u64,
}

impl IndexEmbeddingsTool {
    pub fn new(ctx: &ToolContext) -> Self {
        Self {
            db: ctx.db.clone(),
            embedder: ctx.embedder.clone(),
            policy: ctx.chunk_policy,
            timeout_secs: ctx.embedding_timeout_secs,
        }
    }

    pub fn indexer(&self) -> EmbeddingIndexer {
        EmbeddingIndexer::new(
            self.db.clone(),
            self.embedder.clone(),
            self.policy,
            self.timeout_secs,
        )
    }
}

#[async_trait]
impl Tool for IndexEmbeddingsTool {
    fn name(&self) -> &str {
        "index_embeddings"
    }

    fn description(&self) -> &str {
        "Embed proposal text for semantic search. By default embeds proposals that have no vectors yet; `stale` also refreshes edited proposals, `proposal` re-embeds a single one."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "stale": { "type": "boolean", "default": false },
                "proposal": {
                    "type": "string",
                    "description": "Proposal id or number to re-embed"
                }
            }
        })
    }

    async fn execute(&self, params: Value) -> anyhow::Result<Value> {
        let indexer = self.indexer();

        let summary = if let Some(key) = opt_str(&params, "proposal") {
            indexer.reindex_proposal(key).await?
        } else if opt_bool(&params, "stale")?.unwrap_or(false) {
            let mut summary = indexer.index_stale().await?;
            let missing = indexer.index_missing().await?;
            summary.proposals_indexed += missing.proposals_indexed;
            summary.chunks_written += missing.chunks_written;
            summary.skipped += missing.skipped;
            summary.failed += missing.failed;
            summary
        } else {
            indexer.index_missing().await?
        };
        Ok(serde_json::to_value(summary)?)
    }
}

pub struct CacheStatusTool {
    pub db: Database,
}

#[async_trait]
impl Tool for CacheStatusTool {
    fn name(&self) -> &str {
        "cache_status"
    }

    fn description(&self) -> &str {
        "Report when the cache last synced and how much of it is embedded."
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _params: Value) -> anyhow::Result<Value> {
        let (last_sync, stats) = self
            .db
            .run_blocking(|db| Ok((db.get_last_sync_time()?, db.get_embedding_stats()?)))
            .await?;

        let last_sync_json = match last_sync {
            Some(ts) => {
                let at = UNIX_EPOCH + Duration::from_secs(ts.max(0) as u64);
                let age = SystemTime::now()
                    .duration_since(at)
                    .map(|d| humantime::format_duration(Duration::from_secs(d.as_secs())).to_string())
                    .unwrap_or_else(|_| "0s".to_string());
                json!({
                    "timestamp": ts,
                    "at": humantime::format_rfc3339_seconds(at).to_string(),
                    "age": age
                })
            }
            None => Value::Null,
        };

        Ok(json!({
            "lastSync": last_sync_json,
            "embeddings": stats,
            "pendingProposals": stats.total_proposals.saturating_sub(stats.embedded_proposals)
        }))
    }
}
