use crate::models::{Proposal, Vote, VoteSupport};
use crate::status::{derive_status, RawProposalState};
use serde::{Deserialize, Deserializer};

/// A subgraph BigInt arrives as a JSON string; some deployments send numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumOrStr {
    Num(i64),
    Str(String),
}

fn de_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumOrStr::deserialize(deserializer)? {
        NumOrStr::Num(n) => Ok(n),
        NumOrStr::Str(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid integer '{}'", s))),
    }
}

fn de_opt_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumOrStr>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumOrStr::Num(n)) => Ok(Some(n)),
        Some(NumOrStr::Str(s)) if s.trim().is_empty() => Ok(None),
        Some(NumOrStr::Str(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid integer '{}'", s))),
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubgraphProposal {
    pub proposal_id: String,
    #[serde(deserialize_with = "de_i64")]
    pub proposal_number: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub proposer: String,
    #[serde(deserialize_with = "de_i64")]
    pub time_created: i64,
    #[serde(deserialize_with = "de_i64")]
    pub vote_start: i64,
    #[serde(deserialize_with = "de_i64")]
    pub vote_end: i64,
    #[serde(rename = "snapshotBlockNumber", deserialize_with = "de_i64")]
    pub snapshot_block: i64,
    #[serde(deserialize_with = "de_i64")]
    pub for_votes: i64,
    #[serde(deserialize_with = "de_i64")]
    pub against_votes: i64,
    #[serde(deserialize_with = "de_i64")]
    pub abstain_votes: i64,
    #[serde(deserialize_with = "de_i64")]
    pub quorum_votes: i64,
    #[serde(default)]
    pub executed: bool,
    #[serde(default)]
    pub canceled: bool,
    #[serde(default)]
    pub vetoed: bool,
    #[serde(default)]
    pub queued: bool,
    pub transaction_hash: String,
    #[serde(default, deserialize_with = "de_opt_i64")]
    pub expires_at: Option<i64>,
    #[serde(default, deserialize_with = "de_opt_i64")]
    pub executable_from: Option<i64>,
    #[serde(default)]
    pub votes: Vec<SubgraphVote>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubgraphVote {
    pub id: String,
    pub voter: String,
    pub support: VoteSupport,
    #[serde(deserialize_with = "de_i64")]
    pub weight: i64,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(deserialize_with = "de_i64")]
    pub timestamp: i64,
    pub transaction_hash: String,
}

impl SubgraphProposal {
    /// Builds the cache record, deriving `status` as of `now` (unix seconds).
    /// `updated_at` is left for the store to assign.
    pub fn to_proposal(&self, now: i64) -> Proposal {
        let raw = RawProposalState {
            vote_start: self.vote_start,
            vote_end: self.vote_end,
            for_votes: self.for_votes,
            against_votes: self.against_votes,
            quorum_votes: self.quorum_votes,
            executed: self.executed,
            canceled: self.canceled,
            vetoed: self.vetoed,
            queued: self.queued,
            expires_at: self.expires_at,
        };

        Proposal {
            id: self.proposal_id.to_lowercase(),
            proposal_number: self.proposal_number,
            title: self.title.clone().unwrap_or_default(),
            description: self.description.clone().unwrap_or_default(),
            proposer: self.proposer.to_lowercase(),
            status: derive_status(&raw, now),
            time_created: self.time_created,
            vote_start: self.vote_start,
            vote_end: self.vote_end,
            snapshot_block: self.snapshot_block,
            for_votes: self.for_votes,
            against_votes: self.against_votes,
            abstain_votes: self.abstain_votes,
            quorum_votes: self.quorum_votes,
            executed: self.executed,
            canceled: self.canceled,
            vetoed: self.vetoed,
            queued: self.queued,
            transaction_hash: self.transaction_hash.clone(),
            expires_at: self.expires_at,
            executable_from: self.executable_from,
            updated_at: 0,
        }
    }
}

impl SubgraphVote {
    pub fn to_vote(&self, proposal: &Proposal) -> Vote {
        Vote {
            id: self.id.clone(),
            proposal_id: proposal.id.clone(),
            proposal_number: proposal.proposal_number,
            voter: self.voter.to_lowercase(),
            support: self.support,
            weight: self.weight,
            reason: self.reason.clone().filter(|r| !r.trim().is_empty()),
            timestamp: self.timestamp,
            transaction_hash: self.transaction_hash.clone(),
        }
    }
}
