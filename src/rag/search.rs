use crate::db::Database;
use crate::embeddings::{embed_with_timeout, Embedder};
use crate::error::{CacheError, Result};
use crate::models::{EmbeddingRecord, ProposalStatus};
use crate::rag::vector::cosine_similarity;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

pub const DEFAULT_LIMIT: usize = 5;
pub const DEFAULT_THRESHOLD: f32 = 0.3;

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub status: Option<ProposalStatus>,
    pub limit: usize,
    pub threshold: f32,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            status: None,
            limit: DEFAULT_LIMIT,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl SearchOptions {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_status(mut self, status: ProposalStatus) -> Self {
        self.status = Some(status);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub proposal_id: String,
    pub proposal_number: i64,
    pub title: String,
    pub status: ProposalStatus,
    pub score: f32,
    /// The chunk that produced `score`.
    pub chunk_text: String,
}

pub struct SemanticSearch {
    db: Database,
    embedder: Arc<dyn Embedder>,
    timeout_secs: u64,
}

impl SemanticSearch {
    pub fn new(db: Database, embedder: Arc<dyn Embedder>, timeout_secs: u64) -> Self {
        Self {
            db,
            embedder,
            timeout_secs,
        }
    }

    pub async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchHit>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(CacheError::InvalidInput("search query is empty".to_string()));
        }

        let records = self.db.run_blocking(|db| db.get_all_embeddings()).await?;
        if records.is_empty() {
            debug!("Search: embedding table is empty");
            return Ok(Vec::new());
        }

        let query_vector =
            embed_with_timeout(self.embedder.as_ref(), query, self.timeout_secs).await?;
        let hits = rank(&query_vector, &records, options)?;

        info!(
            "Search: '{}' scored {} chunks, returning {} proposals",
            query,
            records.len(),
            hits.len()
        );
        Ok(hits)
    }
}

/// Brute-force ranking. A proposal scores the best of its chunks; proposals
/// below `threshold` or with the wrong status are dropped; ties go to the
/// higher proposal number.
pub fn rank(
    query: &[f32],
    records: &[EmbeddingRecord],
    options: &SearchOptions,
) -> Result<Vec<SearchHit>> {
    let mut best: HashMap<&str, SearchHit> = HashMap::new();

    for record in records {
        if record.embedding.len() != query.len() {
            return Err(CacheError::DimensionMismatch {
                expected: record.embedding.len(),
                got: query.len(),
            });
        }
        if options.status.is_some_and(|s| s != record.status) {
            continue;
        }

        let score = cosine_similarity(query, &record.embedding);
        let hit = best
            .entry(record.proposal_id.as_str())
            .or_insert_with(|| SearchHit {
                proposal_id: record.proposal_id.clone(),
                proposal_number: record.proposal_number,
                title: record.title.clone(),
                status: record.status,
                score: f32::NEG_INFINITY,
                chunk_text: String::new(),
            });
        if score > hit.score {
            hit.score = score;
            hit.chunk_text = record.chunk_text.clone();
        }
    }

    let mut hits: Vec<SearchHit> = best
        .into_values()
        .filter(|hit| hit.score >= options.threshold)
        .collect();
    hits.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| b.proposal_number.cmp(&a.proposal_number))
    });
    hits.truncate(options.limit);
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::proposal;
    use crate::embeddings::HashingEmbedder;

    fn record(number: i64, chunk_index: usize, status: ProposalStatus, embedding: Vec<f32>) -> EmbeddingRecord {
        EmbeddingRecord {
            proposal_id: format!("0x{}", number),
            proposal_number: number,
            title: format!("Proposal {}", number),
            status,
            chunk_index,
            chunk_text: format!("chunk {}-{}", number, chunk_index),
            embedding,
        }
    }

    #[test]
    fn test_rank_takes_best_chunk_per_proposal() {
        let records = vec![
            record(2, 0, ProposalStatus::Active, vec![0.0, 1.0]),
            record(2, 1, ProposalStatus::Active, vec![1.0, 0.1]),
            record(1, 0, ProposalStatus::Active, vec![1.0, 1.0]),
        ];
        let hits = rank(&[1.0, 0.0], &records, &SearchOptions::default()).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].proposal_number, 2);
        assert_eq!(hits[0].chunk_text, "chunk 2-1");
        assert!(hits[0].score > 0.99);
        assert_eq!(hits[1].proposal_number, 1);
    }

    #[test]
    fn test_rank_ties_prefer_newest() {
        let records = vec![
            record(3, 0, ProposalStatus::Active, vec![1.0, 0.0]),
            record(9, 0, ProposalStatus::Active, vec![2.0, 0.0]),
            record(5, 0, ProposalStatus::Active, vec![3.0, 0.0]),
        ];
        let hits = rank(&[1.0, 0.0], &records, &SearchOptions::default()).unwrap();
        let numbers: Vec<i64> = hits.iter().map(|h| h.proposal_number).collect();
        assert_eq!(numbers, vec![9, 5, 3]);
    }

    #[test]
    fn test_rank_threshold_status_and_limit() {
        let records = vec![
            record(1, 0, ProposalStatus::Active, vec![1.0, 0.0]),
            record(2, 0, ProposalStatus::Executed, vec![1.0, 0.05]),
            record(3, 0, ProposalStatus::Active, vec![0.0, 1.0]),
            record(4, 0, ProposalStatus::Active, vec![0.0, 0.0]),
        ];
        let hits = rank(&[1.0, 0.0], &records, &SearchOptions::default()).unwrap();
        let numbers: Vec<i64> = hits.iter().map(|h| h.proposal_number).collect();
        assert_eq!(numbers, vec![1, 2]);

        let options = SearchOptions::default().with_status(ProposalStatus::Executed);
        let hits = rank(&[1.0, 0.0], &records, &options).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].proposal_number, 2);

        let options = SearchOptions::default().with_limit(1);
        assert_eq!(rank(&[1.0, 0.0], &records, &options).unwrap().len(), 1);
    }

    #[test]
    fn test_rank_dimension_mismatch_is_fatal() {
        let records = vec![record(1, 0, ProposalStatus::Active, vec![1.0, 0.0, 0.0])];
        let err = rank(&[1.0, 0.0], &records, &SearchOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            CacheError::DimensionMismatch { expected: 3, got: 2 }
        ));
    }

    async fn indexed_db(embedder: &HashingEmbedder) -> Database {
        let db = Database::open_in_memory().unwrap();
        let mut a = proposal(1, "Skateboarding event funding", ProposalStatus::Active);
        a.description = String::new();
        let mut b = proposal(2, "Treasury diversification", ProposalStatus::Active);
        b.description = String::new();
        db.upsert_proposals(&[a.clone(), b.clone()]).unwrap();
        for p in [&a, &b] {
            let vector = embedder.embed(&p.title).await.unwrap();
            db.upsert_embedding(&p.id, 0, &p.title, &vector).unwrap();
        }
        db
    }

    #[tokio::test]
    async fn test_search_ranks_related_text_first() {
        let embedder = Arc::new(HashingEmbedder::new(384));
        let db = indexed_db(&embedder).await;
        let search = SemanticSearch::new(db, embedder, 5);

        let options = SearchOptions::default().with_threshold(-1.0);
        let hits = search.search("skate park", &options).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].proposal_number, 1);
        assert!(hits[0].score > hits[1].score);

        let strict = SearchOptions::default().with_threshold(0.99);
        assert!(search.search("skate park", &strict).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_empty_table_and_blank_query() {
        let embedder = Arc::new(HashingEmbedder::new(32));
        let search = SemanticSearch::new(Database::open_in_memory().unwrap(), embedder, 5);
        assert!(search
            .search("anything", &SearchOptions::default())
            .await
            .unwrap()
            .is_empty());
        assert!(matches!(
            search.search("   ", &SearchOptions::default()).await,
            Err(CacheError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_search_rejects_provider_with_other_dimension() {
        let db = indexed_db(&HashingEmbedder::new(384)).await;
        let search = SemanticSearch::new(db, Arc::new(HashingEmbedder::new(128)), 5);
        let err = search
            .search("skate park", &SearchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::DimensionMismatch { .. }));
    }
}
