use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProposalStatus {
    Pending,
    Active,
    Cancelled,
    Defeated,
    Succeeded,
    Queued,
    Expired,
    Executed,
    Vetoed,
}

impl ProposalStatus {
    pub const ALL: [ProposalStatus; 9] = [
        ProposalStatus::Pending,
        ProposalStatus::Active,
        ProposalStatus::Cancelled,
        ProposalStatus::Defeated,
        ProposalStatus::Succeeded,
        ProposalStatus::Queued,
        ProposalStatus::Expired,
        ProposalStatus::Executed,
        ProposalStatus::Vetoed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Pending => "PENDING",
            ProposalStatus::Active => "ACTIVE",
            ProposalStatus::Cancelled => "CANCELLED",
            ProposalStatus::Defeated => "DEFEATED",
            ProposalStatus::Succeeded => "SUCCEEDED",
            ProposalStatus::Queued => "QUEUED",
            ProposalStatus::Expired => "EXPIRED",
            ProposalStatus::Executed => "EXECUTED",
            ProposalStatus::Vetoed => "VETOED",
        }
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProposalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        // "CANCELED" shows up in some subgraph deployments.
        if upper == "CANCELED" {
            return Ok(ProposalStatus::Cancelled);
        }
        ProposalStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == upper)
            .ok_or_else(|| format!("unknown proposal status '{}'", s))
    }
}

impl ToSql for ProposalStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ProposalStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        text.parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

/// How a vote was cast. The numeric encoding follows the governor contract:
/// 0 = against, 1 = for, 2 = abstain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VoteSupport {
    Against,
    For,
    Abstain,
}

impl VoteSupport {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteSupport::Against => "AGAINST",
            VoteSupport::For => "FOR",
            VoteSupport::Abstain => "ABSTAIN",
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(VoteSupport::Against),
            1 => Some(VoteSupport::For),
            2 => Some(VoteSupport::Abstain),
            _ => None,
        }
    }
}

impl fmt::Display for VoteSupport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoteSupport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(code) = trimmed.parse::<i64>() {
            return VoteSupport::from_code(code)
                .ok_or_else(|| format!("unknown vote support code {}", code));
        }
        match trimmed.to_ascii_uppercase().as_str() {
            "AGAINST" => Ok(VoteSupport::Against),
            "FOR" => Ok(VoteSupport::For),
            "ABSTAIN" => Ok(VoteSupport::Abstain),
            _ => Err(format!("unknown vote support '{}'", s)),
        }
    }
}

impl<'de> Deserialize<'de> for VoteSupport {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Code(i64),
            Name(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Code(code) => VoteSupport::from_code(code)
                .ok_or_else(|| serde::de::Error::custom(format!("unknown vote support code {}", code))),
            Raw::Name(name) => name.parse().map_err(serde::de::Error::custom),
        }
    }
}

impl ToSql for VoteSupport {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for VoteSupport {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        text.parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(format!("unknown sort order '{}'", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub id: String,
    pub proposal_number: i64,
    pub title: String,
    pub description: String,
    pub proposer: String,
    pub status: ProposalStatus,
    pub time_created: i64,
    pub vote_start: i64,
    pub vote_end: i64,
    pub snapshot_block: i64,
    pub for_votes: i64,
    pub against_votes: i64,
    pub abstain_votes: i64,
    pub quorum_votes: i64,
    pub executed: bool,
    pub canceled: bool,
    pub vetoed: bool,
    pub queued: bool,
    pub transaction_hash: String,
    pub expires_at: Option<i64>,
    pub executable_from: Option<i64>,
    /// Local write time (unix seconds), assigned by the store.
    pub updated_at: i64,
}

impl Proposal {
    /// Text used for embedding: the title followed by the description.
    pub fn searchable_text(&self) -> String {
        format!("{}\n\n{}", self.title.trim(), self.description.trim())
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub id: String,
    pub proposal_id: String,
    pub proposal_number: i64,
    pub voter: String,
    pub support: VoteSupport,
    pub weight: i64,
    pub reason: Option<String>,
    pub timestamp: i64,
    pub transaction_hash: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteSummary {
    pub total_voters: usize,
    pub for_voters: usize,
    pub against_voters: usize,
    pub abstain_voters: usize,
}

/// One stored chunk joined with the owning proposal's metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingRecord {
    pub proposal_id: String,
    pub proposal_number: i64,
    pub title: String,
    pub status: ProposalStatus,
    pub chunk_index: usize,
    pub chunk_text: String,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingStats {
    pub total_proposals: usize,
    pub embedded_proposals: usize,
    pub total_chunks: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parsing() {
        assert_eq!("active".parse::<ProposalStatus>().unwrap(), ProposalStatus::Active);
        assert_eq!("CANCELED".parse::<ProposalStatus>().unwrap(), ProposalStatus::Cancelled);
        assert!("OPEN".parse::<ProposalStatus>().is_err());
        for status in ProposalStatus::ALL {
            assert_eq!(status.as_str().parse::<ProposalStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_support_accepts_names_and_codes() {
        assert_eq!("FOR".parse::<VoteSupport>().unwrap(), VoteSupport::For);
        assert_eq!("0".parse::<VoteSupport>().unwrap(), VoteSupport::Against);
        assert_eq!("2".parse::<VoteSupport>().unwrap(), VoteSupport::Abstain);
        assert!("3".parse::<VoteSupport>().is_err());

        let from_code: VoteSupport = serde_json::from_str("1").unwrap();
        assert_eq!(from_code, VoteSupport::For);
        let from_name: VoteSupport = serde_json::from_str("\"ABSTAIN\"").unwrap();
        assert_eq!(from_name, VoteSupport::Abstain);
    }

    #[test]
    fn test_searchable_text_handles_empty_description() {
        let proposal = Proposal {
            id: "0x1".to_string(),
            proposal_number: 1,
            title: "Fund a new ramp".to_string(),
            description: String::new(),
            proposer: "0xabc".to_string(),
            status: ProposalStatus::Active,
            time_created: 0,
            vote_start: 0,
            vote_end: 0,
            snapshot_block: 0,
            for_votes: 0,
            against_votes: 0,
            abstain_votes: 0,
            quorum_votes: 0,
            executed: false,
            canceled: false,
            vetoed: false,
            queued: false,
            transaction_hash: String::new(),
            expires_at: None,
            executable_from: None,
            updated_at: 0,
        };
        assert_eq!(proposal.searchable_text(), "Fund a new ramp");
    }
}
