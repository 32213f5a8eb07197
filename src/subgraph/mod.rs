//! GraphQL access to the DAO subgraph.

use crate::error::{CacheError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

mod memory;
mod types;

#[cfg(test)]
pub(crate) use memory::fixtures;
pub use memory::MemorySource;
pub use types::{SubgraphProposal, SubgraphVote};

const VOTE_FIELDS: &str = "id voter support weight reason timestamp transactionHash";

const PROPOSALS_QUERY: &str = "
query Proposals($dao: String!, $first: Int!, $skip: Int!, $votesFirst: Int!) {
  proposals(
    where: { dao: $dao }
    first: $first
    skip: $skip
    orderBy: timeCreated
    orderDirection: desc
  ) {
    proposalId
    proposalNumber
    title
    description
    proposer
    timeCreated
    voteStart
    voteEnd
    snapshotBlockNumber
    forVotes
    againstVotes
    abstainVotes
    quorumVotes
    executed
    canceled
    vetoed
    queued
    transactionHash
    expiresAt
    executableFrom
    votes(first: $votesFirst, orderBy: timestamp, orderDirection: desc) {
      __VOTE_FIELDS__
    }
  }
}";

const VOTES_QUERY: &str = "
query Votes($proposal: String!, $first: Int!, $skip: Int!) {
  proposalVotes(
    where: { proposal: $proposal }
    first: $first
    skip: $skip
    orderBy: timestamp
    orderDirection: desc
  ) {
    __VOTE_FIELDS__
  }
}";

/// One page of an ordered, re-fetchable listing.
#[derive(Debug, Clone)]
pub struct SubgraphPage<T> {
    pub items: Vec<T>,
    /// `true` when the page came back full, so another page may follow.
    pub has_more: bool,
}

impl<T> SubgraphPage<T> {
    pub fn from_items(items: Vec<T>, requested: usize) -> Self {
        let has_more = requested > 0 && items.len() >= requested;
        Self { items, has_more }
    }
}

/// Paginated proposal and vote listings, newest first.
#[async_trait]
pub trait ProposalSource: Send + Sync {
    /// Proposals ordered by `timeCreated` descending, each carrying up to
    /// `votes_first` of its newest votes.
    async fn fetch_proposals_page(
        &self,
        skip: usize,
        first: usize,
        votes_first: usize,
    ) -> Result<SubgraphPage<SubgraphProposal>>;

    async fn fetch_votes_page(
        &self,
        proposal_id: &str,
        skip: usize,
        first: usize,
    ) -> Result<SubgraphPage<SubgraphVote>>;
}

#[derive(Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: Value,
}

#[derive(Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ProposalsData {
    proposals: Vec<SubgraphProposal>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VotesData {
    proposal_votes: Vec<SubgraphVote>,
}

pub struct SubgraphClient {
    http: reqwest::Client,
    url: String,
    dao_address: String,
}

impl SubgraphClient {
    pub fn new(url: &str, dao_address: &str, timeout_secs: u64) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| CacheError::InvalidInput(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            url: url.to_string(),
            dao_address: dao_address.to_lowercase(),
        })
    }

    async fn post<T: DeserializeOwned>(&self, query: &str, variables: Value, offset: usize) -> Result<T> {
        let upstream = |message: String| CacheError::UpstreamFetch {
            offset,
            pages_committed: 0,
            message,
        };

        let query = query.replace("__VOTE_FIELDS__", VOTE_FIELDS);
        let response = self
            .http
            .post(&self.url)
            .json(&GraphQlRequest {
                query: &query,
                variables,
            })
            .send()
            .await
            .map_err(|e| upstream(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| upstream(e.to_string()))?;
        if !status.is_success() {
            return Err(upstream(format!("HTTP {}: {}", status, truncate(&body, 200))));
        }

        parse_response(&body).map_err(upstream)
    }
}

fn parse_response<T: DeserializeOwned>(body: &str) -> std::result::Result<T, String> {
    let parsed: GraphQlResponse<T> =
        serde_json::from_str(body).map_err(|e| format!("malformed response: {}", e))?;

    if !parsed.errors.is_empty() {
        let messages: Vec<&str> = parsed.errors.iter().map(|e| e.message.as_str()).collect();
        return Err(format!("GraphQL errors: {}", messages.join("; ")));
    }
    parsed
        .data
        .ok_or_else(|| "response carried no data".to_string())
}

fn truncate(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        out.push_str("...");
    }
    out
}

#[async_trait]
impl ProposalSource for SubgraphClient {
    async fn fetch_proposals_page(
        &self,
        skip: usize,
        first: usize,
        votes_first: usize,
    ) -> Result<SubgraphPage<SubgraphProposal>> {
        debug!("Subgraph: fetching proposals skip={} first={}", skip, first);
        let variables = json!({
            "dao": self.dao_address,
            "first": first,
            "skip": skip,
            "votesFirst": votes_first,
        });
        let data: ProposalsData = self.post(PROPOSALS_QUERY, variables, skip).await?;
        Ok(SubgraphPage::from_items(data.proposals, first))
    }

    async fn fetch_votes_page(
        &self,
        proposal_id: &str,
        skip: usize,
        first: usize,
    ) -> Result<SubgraphPage<SubgraphVote>> {
        debug!(
            "Subgraph: fetching votes for {} skip={} first={}",
            proposal_id, skip, first
        );
        let variables = json!({
            "proposal": proposal_id,
            "first": first,
            "skip": skip,
        });
        let data: VotesData = self.post(VOTES_QUERY, variables, skip).await?;
        Ok(SubgraphPage::from_items(data.proposal_votes, first))
    }
}
