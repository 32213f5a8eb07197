use super::{opt_parse, page_window, proposal_number};
use crate::db::Database;
use crate::models::VoteSupport;
use crate::tools::Tool;
use async_trait::async_trait;
use serde_json::{json, Value};

pub struct GetVotesTool {
    pub db: Database,
}

#[async_trait]
impl Tool for GetVotesTool {
    fn name(&self) -> &str {
        "get_votes"
    }

    fn description(&self) -> &str {
        "List the votes cast on a proposal, newest first, optionally filtered by support (FOR, AGAINST, ABSTAIN)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "proposal_number": { "type": "integer" },
                "support": { "type": "string", "enum": ["FOR", "AGAINST", "ABSTAIN"] },
                "limit": { "type": "integer", "minimum": 1, "maximum": super::MAX_PAGE_SIZE },
                "offset": { "type": "integer", "minimum": 0 }
            },
            "required": ["proposal_number"]
        })
    }

    async fn execute(&self, params: Value) -> anyhow::Result<Value> {
        let number = proposal_number(&params, "proposal_number")?;
        let support = opt_parse::<VoteSupport>(&params, "support")?;
        let (limit, offset) = page_window(&params)?;

        let page = self
            .db
            .run_blocking(move |db| db.get_votes(number, support, limit, offset))
            .await?;
        Ok(serde_json::to_value(page)?)
    }
}

pub struct GetVoteSummaryTool {
    pub db: Database,
}

#[async_trait]
impl Tool for GetVoteSummaryTool {
    fn name(&self) -> &str {
        "get_vote_summary"
    }

    fn description(&self) -> &str {
        "Count distinct voters on a proposal, in total and per support value."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "proposal_number": { "type": "integer" }
            },
            "required": ["proposal_number"]
        })
    }

    async fn execute(&self, params: Value) -> anyhow::Result<Value> {
        let number = proposal_number(&params, "proposal_number")?;
        let summary = self
            .db
            .run_blocking(move |db| db.get_vote_summary(number))
            .await?;
        Ok(json!({ "proposalNumber": number, "summary": summary }))
    }
}
