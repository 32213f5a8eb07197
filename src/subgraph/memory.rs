use super::{ProposalSource, SubgraphPage, SubgraphProposal, SubgraphVote};
use crate::error::{CacheError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;

/// Serves a fixed set of proposals with the same paging contract as the
/// subgraph. Backs offline imports of a saved `proposals` query result.
pub struct MemorySource {
    proposals: Vec<SubgraphProposal>,
}

impl MemorySource {
    pub fn new(mut proposals: Vec<SubgraphProposal>) -> Self {
        proposals.sort_by(|a, b| {
            b.time_created
                .cmp(&a.time_created)
                .then_with(|| b.proposal_number.cmp(&a.proposal_number))
        });
        for proposal in proposals.iter_mut() {
            proposal.votes.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));
        }
        Self { proposals }
    }

    /// Reads either a bare JSON array of proposals or a GraphQL response body
    /// of the form `{"data": {"proposals": [...]}}`.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Dump {
            Bare(Vec<SubgraphProposal>),
            Wrapped { data: Data },
        }
        #[derive(Deserialize)]
        struct Data {
            proposals: Vec<SubgraphProposal>,
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            CacheError::InvalidInput(format!("cannot read {}: {}", path.display(), e))
        })?;
        let dump: Dump = serde_json::from_str(&content).map_err(|e| {
            CacheError::InvalidInput(format!("cannot parse {}: {}", path.display(), e))
        })?;

        Ok(match dump {
            Dump::Bare(proposals) => Self::new(proposals),
            Dump::Wrapped { data } => Self::new(data.proposals),
        })
    }

    pub fn len(&self) -> usize {
        self.proposals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proposals.is_empty()
    }
}

fn window<T: Clone>(items: &[T], skip: usize, first: usize) -> Vec<T> {
    items.iter().skip(skip).take(first).cloned().collect()
}

#[async_trait]
impl ProposalSource for MemorySource {
    async fn fetch_proposals_page(
        &self,
        skip: usize,
        first: usize,
        votes_first: usize,
    ) -> Result<SubgraphPage<SubgraphProposal>> {
        let mut items = window(&self.proposals, skip, first);
        for proposal in items.iter_mut() {
            proposal.votes.truncate(votes_first);
        }
        Ok(SubgraphPage::from_items(items, first))
    }

    async fn fetch_votes_page(
        &self,
        proposal_id: &str,
        skip: usize,
        first: usize,
    ) -> Result<SubgraphPage<SubgraphVote>> {
        let votes = self
            .proposals
            .iter()
            .find(|p| p.proposal_id.eq_ignore_ascii_case(proposal_id))
            .map(|p| window(&p.votes, skip, first))
            .unwrap_or_default();
        Ok(SubgraphPage::from_items(votes, first))
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::proposal;
    use super::*;

    #[tokio::test]
    async fn test_pages_newest_first() {
        let source = MemorySource::new(vec![
            proposal(1, "one", 0),
            proposal(3, "three", 0),
            proposal(2, "two", 0),
        ]);
        let page = source.fetch_proposals_page(0, 2, 10).await.unwrap();
        let numbers: Vec<i64> = page.items.iter().map(|p| p.proposal_number).collect();
        assert_eq!(numbers, vec![3, 2]);
        assert!(page.has_more);

        let last = source.fetch_proposals_page(2, 2, 10).await.unwrap();
        assert_eq!(last.items.len(), 1);
        assert!(!last.has_more);
    }

    #[tokio::test]
    async fn test_nested_votes_are_capped() {
        let source = MemorySource::new(vec![proposal(1, "one", 5)]);
        let page = source.fetch_proposals_page(0, 10, 2).await.unwrap();
        assert_eq!(page.items[0].votes.len(), 2);

        let id = page.items[0].proposal_id.clone();
        let rest = source.fetch_votes_page(&id, 2, 10).await.unwrap();
        assert_eq!(rest.items.len(), 3);
        assert!(!rest.has_more);
    }

    #[test]
    fn test_from_json_file_accepts_wrapped_response() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.json");
        let body = serde_json::json!({
            "data": { "proposals": [{
                "proposalId": "0x1", "proposalNumber": "1", "title": "t", "description": "d",
                "proposer": "0xp", "timeCreated": "1", "voteStart": "2", "voteEnd": "3",
                "snapshotBlockNumber": "4", "forVotes": "0", "againstVotes": "0",
                "abstainVotes": "0", "quorumVotes": "0", "transactionHash": "0xt"
            }]}
        });
        std::fs::write(&path, body.to_string()).unwrap();

        let source = MemorySource::from_json_file(&path).unwrap();
        assert_eq!(source.len(), 1);
        assert!(MemorySource::from_json_file(&dir.path().join("missing.json")).is_err());
    }
}
