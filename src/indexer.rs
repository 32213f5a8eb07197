use crate::db::{ChunkEmbedding, Database};
use crate::embeddings::{embed_with_timeout, Embedder};
use crate::error::{CacheError, Result};
use crate::models::{Proposal, SortOrder};
use crate::rag::ChunkPolicy;
use serde::Serialize;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSummary {
    pub proposals_indexed: usize,
    pub chunks_written: usize,
    /// Proposals with no text to embed.
    pub skipped: usize,
    /// Proposals whose embedding calls failed; retried on the next run.
    pub failed: usize,
}

enum Outcome {
    Indexed(usize),
    Skipped,
}

pub struct EmbeddingIndexer {
    db: Database,
    embedder: Arc<dyn Embedder>,
    policy: ChunkPolicy,
    timeout_secs: u64,
}

impl EmbeddingIndexer {
    pub fn new(
        db: Database,
        embedder: Arc<dyn Embedder>,
        policy: ChunkPolicy,
        timeout_secs: u64,
    ) -> Self {
        Self {
            db,
            embedder,
            policy,
            timeout_secs,
        }
    }

    /// Re-runs `index_missing` every `interval` until the task is dropped.
    pub async fn run(self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match self.index_missing().await {
                Ok(summary) if summary.proposals_indexed == 0 => {
                    debug!("Embedding indexer: no proposals to index")
                }
                Ok(summary) => info!(
                    "Embedding indexer: indexed {} proposals ({} chunks)",
                    summary.proposals_indexed, summary.chunks_written
                ),
                Err(e) => error!("Embedding indexer error: {}", e),
            }
        }
    }

    /// Embeds every proposal that has no stored chunks.
    pub async fn index_missing(&self) -> Result<IndexSummary> {
        let pending = self
            .db
            .run_blocking(|db| db.get_proposals_without_embeddings())
            .await?;
        info!("Embedding indexer: {} proposals without embeddings", pending.len());
        self.index_all(pending).await
    }

    /// Re-embeds proposals whose stored chunk text no longer matches what the
    /// current title, description and chunk policy produce.
    pub async fn index_stale(&self) -> Result<IndexSummary> {
        let policy = self.policy;
        let stale = self
            .db
            .run_blocking(move |db| {
                let mut stale = Vec::new();
                let mut offset = 0;
                loop {
                    let page = db.list_proposals(None, 500, offset, SortOrder::Asc)?;
                    if page.items.is_empty() {
                        break;
                    }
                    offset += page.items.len();
                    for proposal in page.items {
                        let stored = db.get_embedding_chunks(&proposal.id)?;
                        if stored.is_empty() {
                            continue;
                        }
                        if stored != policy.chunk_text(&proposal.searchable_text()) {
                            stale.push(proposal);
                        }
                    }
                }
                Ok(stale)
            })
            .await?;
        info!("Embedding indexer: {} proposals with stale chunks", stale.len());
        self.index_all(stale).await
    }

    /// Replaces the chunks of one proposal. Unknown proposals are an input
    /// error; any embedding failure is returned rather than counted.
    pub async fn reindex_proposal(&self, id_or_number: &str) -> Result<IndexSummary> {
        let key = id_or_number.to_string();
        let proposal = self
            .db
            .run_blocking(move |db| db.get_proposal(&key))
            .await?
            .ok_or_else(|| {
                CacheError::InvalidInput(format!("proposal {} is not cached", id_or_number))
            })?;

        let mut summary = IndexSummary::default();
        let expected = self.db.run_blocking(|db| db.embedding_dimension()).await?;
        match self.index_one(&proposal, expected).await? {
            Outcome::Indexed(chunks) => {
                summary.proposals_indexed = 1;
                summary.chunks_written = chunks;
            }
            Outcome::Skipped => {
                // Blank text leaves nothing searchable; drop old chunks too.
                let id = proposal.id.clone();
                self.db.run_blocking(move |db| db.delete_embeddings(&id)).await?;
                summary.skipped = 1;
            }
        }
        Ok(summary)
    }

    async fn index_all(&self, proposals: Vec<Proposal>) -> Result<IndexSummary> {
        let mut summary = IndexSummary::default();
        let mut expected = self.db.run_blocking(|db| db.embedding_dimension()).await?;

        for proposal in proposals {
            match self.index_one(&proposal, expected).await {
                Ok(Outcome::Indexed(chunks)) => {
                    summary.proposals_indexed += 1;
                    summary.chunks_written += chunks;
                    if expected.is_none() {
                        expected = self.db.run_blocking(|db| db.embedding_dimension()).await?;
                    }
                }
                Ok(Outcome::Skipped) => {
                    debug!(
                        "Embedding indexer: proposal #{} has no text, skipping",
                        proposal.proposal_number
                    );
                    summary.skipped += 1;
                }
                Err(CacheError::EmbeddingProvider(message)) => {
                    warn!(
                        "Embedding indexer: failed to embed proposal #{}: {}",
                        proposal.proposal_number, message
                    );
                    summary.failed += 1;
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            "Embedding indexer: {} indexed, {} chunks, {} skipped, {} failed",
            summary.proposals_indexed, summary.chunks_written, summary.skipped, summary.failed
        );
        Ok(summary)
    }

    /// Embeds all chunks first, then swaps them in with one transaction.
    async fn index_one(&self, proposal: &Proposal, expected: Option<usize>) -> Result<Outcome> {
        let chunks = self.policy.chunk_text(&proposal.searchable_text());
        if chunks.is_empty() {
            return Ok(Outcome::Skipped);
        }

        let mut embedded = Vec::with_capacity(chunks.len());
        let mut dimension = expected;
        for (chunk_index, chunk_text) in chunks.into_iter().enumerate() {
            let embedding =
                embed_with_timeout(self.embedder.as_ref(), &chunk_text, self.timeout_secs).await?;
            match dimension {
                Some(d) if d != embedding.len() => {
                    return Err(CacheError::DimensionMismatch {
                        expected: d,
                        got: embedding.len(),
                    });
                }
                Some(_) => {}
                None => dimension = Some(embedding.len()),
            }
            embedded.push(ChunkEmbedding {
                chunk_index,
                chunk_text,
                embedding,
            });
        }

        let id = proposal.id.clone();
        let written = self
            .db
            .run_blocking(move |db| db.replace_embeddings(&id, &embedded))
            .await?;
        Ok(Outcome::Indexed(written))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::proposal;
    use crate::embeddings::HashingEmbedder;
    use crate::models::ProposalStatus;
    use async_trait::async_trait;

    /// Fails on any text containing `poison`.
    struct PickyEmbedder {
        inner: HashingEmbedder,
        poison: &'static str,
    }

    #[async_trait]
    impl Embedder for PickyEmbedder {
        fn model_name(&self) -> &str {
            "picky"
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if text.contains(self.poison) {
                return Err(CacheError::EmbeddingProvider("HTTP 500".to_string()));
            }
            Ok(self.inner.embed_sync(text))
        }
    }

    fn indexer(db: &Database, embedder: Arc<dyn Embedder>) -> EmbeddingIndexer {
        EmbeddingIndexer::new(db.clone(), embedder, ChunkPolicy::default(), 5)
    }

    fn seeded(count: i64) -> Database {
        let db = Database::open_in_memory().unwrap();
        let proposals: Vec<_> = (1..=count)
            .map(|n| proposal(n, &format!("Proposal {}", n), ProposalStatus::Active))
            .collect();
        db.upsert_proposals(&proposals).unwrap();
        db
    }

    #[tokio::test]
    async fn test_index_missing_drains_queue() {
        let db = seeded(3);
        let indexer = indexer(&db, Arc::new(HashingEmbedder::new(64)));

        let summary = indexer.index_missing().await.unwrap();
        assert_eq!(summary.proposals_indexed, 3);
        assert_eq!(summary.chunks_written, 3);
        assert!(db.get_proposals_without_embeddings().unwrap().is_empty());
        assert_eq!(db.get_embedding_stats().unwrap().embedded_proposals, 3);

        let again = indexer.index_missing().await.unwrap();
        assert_eq!(again, IndexSummary::default());
    }

    #[tokio::test]
    async fn test_blank_proposal_is_skipped() {
        let db = Database::open_in_memory().unwrap();
        let mut blank = proposal(1, "  ", ProposalStatus::Active);
        blank.description = "\n\n".to_string();
        db.upsert_proposal(&blank).unwrap();

        let summary = indexer(&db, Arc::new(HashingEmbedder::new(16)))
            .index_missing()
            .await
            .unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.chunks_written, 0);
        assert!(!db.has_embeddings(&blank.id).unwrap());
    }

    #[tokio::test]
    async fn test_one_failure_does_not_abort_run() {
        let db = seeded(3);
        let embedder = Arc::new(PickyEmbedder {
            inner: HashingEmbedder::new(32),
            poison: "Proposal 2",
        });

        let summary = indexer(&db, embedder).index_missing().await.unwrap();
        assert_eq!(summary.proposals_indexed, 2);
        assert_eq!(summary.failed, 1);

        let remaining = db.get_proposals_without_embeddings().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].proposal_number, 2);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_aborts() {
        let db = seeded(2);
        indexer(&db, Arc::new(HashingEmbedder::new(32)))
            .reindex_proposal("1")
            .await
            .unwrap();

        let err = indexer(&db, Arc::new(HashingEmbedder::new(64)))
            .index_missing()
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CacheError::DimensionMismatch {
                expected: 32,
                got: 64
            }
        ));
    }

    #[tokio::test]
    async fn test_reindex_removes_stale_chunks() {
        let db = Database::open_in_memory().unwrap();
        let mut long = proposal(7, "Ramp", ProposalStatus::Active);
        long.description = vec!["x".repeat(40); 3].join("\n\n");
        db.upsert_proposal(&long).unwrap();

        let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::new(16));
        let small = EmbeddingIndexer::new(db.clone(), embedder, ChunkPolicy::new(50, 5), 5);
        let first = small.index_missing().await.unwrap();
        assert!(first.chunks_written > 1);

        long.description = "Short now".to_string();
        db.upsert_proposal(&long).unwrap();

        let stale = small.index_stale().await.unwrap();
        assert_eq!(stale.proposals_indexed, 1);
        assert_eq!(stale.chunks_written, 1);
        assert_eq!(
            db.get_embedding_chunks(&long.id).unwrap(),
            vec!["Ramp\n\nShort now".to_string()]
        );

        let clean = small.index_stale().await.unwrap();
        assert_eq!(clean.proposals_indexed, 0);
    }

    #[tokio::test]
    async fn test_reindex_unknown_proposal() {
        let db = Database::open_in_memory().unwrap();
        let err = indexer(&db, Arc::new(HashingEmbedder::new(8)))
            .reindex_proposal("#99")
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::InvalidInput(_)));
    }

    /// Removes the proposal mid-run so its chunk write has no parent row.
    struct DeletingEmbedder {
        db: Database,
        inner: HashingEmbedder,
    }

    #[async_trait]
    impl Embedder for DeletingEmbedder {
        fn model_name(&self) -> &str {
            "deleting"
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.db
                .conn()
                .execute("DELETE FROM proposals WHERE proposal_number = 1", [])?;
            Ok(self.inner.embed_sync(text))
        }
    }

    #[tokio::test]
    async fn test_store_errors_abort_run() {
        let db = seeded(2);
        let embedder = Arc::new(DeletingEmbedder {
            db: db.clone(),
            inner: HashingEmbedder::new(16),
        });

        let err = indexer(&db, embedder).index_missing().await.unwrap_err();
        assert!(matches!(err, CacheError::StoreIntegrity(_)));
        assert_eq!(db.get_embedding_stats().unwrap().total_chunks, 0);
    }
}
