use super::{opt_parse, opt_str};
use crate::models::ProposalStatus;
use crate::rag::{SearchOptions, SemanticSearch};
use crate::tools::{Tool, ToolContext};
use async_trait::async_trait;
use serde_json::{json, Value};

pub struct SearchProposalsTool {
    search: SemanticSearch,
    defaults: SearchOptions,
}

impl SearchProposalsTool {
    pub fn new(ctx: &ToolContext) -> Self {
        Self {
            search: SemanticSearch::new(
                ctx.db.clone(),
                ctx.embedder.clone(),
                ctx.embedding_timeout_secs,
            ),
            defaults: ctx.search_defaults.clone(),
        }
    }
}

#[async_trait]
impl Tool for SearchProposalsTool {
    fn name(&self) -> &str {
        "search_proposals"
    }

    fn description(&self) -> &str {
        "Semantic search over proposal titles and descriptions. Returns the best-matching proposals with a similarity score and the matching text."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Free-text description of what to look for"
                },
                "status": { "type": "string" },
                "limit": { "type": "integer", "minimum": 1 },
                "threshold": {
                    "type": "number",
                    "description": "Minimum cosine similarity, between -1 and 1"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value) -> anyhow::Result<Value> {
        let query = opt_str(&params, "query").ok_or_else(|| anyhow::anyhow!("Missing query"))?;

        let mut options = self.defaults.clone();
        if let Some(status) = opt_parse::<ProposalStatus>(&params, "status")? {
            options = options.with_status(status);
        }
        if let Some(limit) = opt_parse::<usize>(&params, "limit")? {
            options = options.with_limit(limit.max(1));
        }
        if let Some(threshold) = opt_parse::<f32>(&params, "threshold")? {
            options = options.with_threshold(threshold);
        }

        let hits = self.search.search(query, &options).await?;
        Ok(json!({ "query": query, "count": hits.len(), "results": hits }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::proposal;
    use crate::db::Database;
    use crate::indexer::EmbeddingIndexer;
    use crate::tools::test_support::context;

    #[tokio::test]
    async fn test_search_tool_ranks_indexed_proposals() {
        let db = Database::open_in_memory().unwrap();
        let mut ramp = proposal(42, "Fund a new ramp", ProposalStatus::Active);
        ramp.description = "Build a skate ramp at the park".to_string();
        let mut treasury = proposal(43, "Treasury diversification", ProposalStatus::Active);
        treasury.description = "Swap part of the treasury into stablecoins".to_string();
        db.upsert_proposals(&[ramp, treasury]).unwrap();

        let ctx = context(&db, None);
        EmbeddingIndexer::new(db.clone(), ctx.embedder.clone(), ctx.chunk_policy, 5)
            .index_missing()
            .await
            .unwrap();

        let tool = SearchProposalsTool::new(&ctx);
        let result = tool
            .execute(json!({"query": "skate ramp", "limit": 1, "threshold": 0.1}))
            .await
            .unwrap();
        assert_eq!(result["count"], 1);
        assert_eq!(result["results"][0]["proposalNumber"], 42);

        let filtered = tool
            .execute(json!({"query": "skate ramp", "status": "EXECUTED", "threshold": 0.0}))
            .await
            .unwrap();
        assert_eq!(filtered["count"], 0);

        assert!(tool.execute(json!({"query": "   "})).await.is_err());
    }
}
