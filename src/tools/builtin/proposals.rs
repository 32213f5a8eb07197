use super::{opt_parse, opt_str, page_window};
use crate::db::Database;
use crate::models::{ProposalStatus, SortOrder};
use crate::tools::Tool;
use async_trait::async_trait;
use serde_json::{json, Value};

pub struct ListProposalsTool {
    pub db: Database,
}

#[async_trait]
impl Tool for ListProposalsTool {
    fn name(&self) -> &str {
        "list_proposals"
    }

    fn description(&self) -> &str {
        "List cached proposals, newest first by default. Returns a page of proposals and the total matching count."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "status": {
                    "type": "string",
                    "enum": ProposalStatus::ALL.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
                    "description": "Only return proposals with this status"
                },
                "limit": { "type": "integer", "minimum": 1, "maximum": super::MAX_PAGE_SIZE },
                "offset": { "type": "integer", "minimum": 0 },
                "order": { "type": "string", "enum": ["asc", "desc"] }
            }
        })
    }

    async fn execute(&self, params: Value) -> anyhow::Result<Value> {
        let status = opt_parse::<ProposalStatus>(&params, "status")?;
        let order = opt_parse::<SortOrder>(&params, "order")?.unwrap_or_default();
        let (limit, offset) = page_window(&params)?;

        let page = self
            .db
            .run_blocking(move |db| db.list_proposals(status, limit, offset, order))
            .await?;
        Ok(serde_json::to_value(page)?)
    }
}

pub struct GetProposalTool {
    pub db: Database,
}

#[async_trait]
impl Tool for GetProposalTool {
    fn name(&self) -> &str {
        "get_proposal"
    }

    fn description(&self) -> &str {
        "Fetch one cached proposal by chain id (0x...) or proposal number. `proposal` is null when it is not cached."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": {
                    "type": "string",
                    "description": "Proposal id or number, e.g. \"0xabc...\" or \"#42\""
                }
            },
            "required": ["id"]
        })
    }

    async fn execute(&self, params: Value) -> anyhow::Result<Value> {
        let key = match &params["id"] {
            Value::Number(n) => n.to_string(),
            _ => opt_str(&params, "id")
                .ok_or_else(|| anyhow::anyhow!("Missing id"))?
                .to_string(),
        };

        let proposal = self
            .db
            .run_blocking({
                let key = key.clone();
                move |db| db.get_proposal(&key)
            })
            .await?;
        Ok(json!({ "found": proposal.is_some(), "proposal": proposal }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::proposal;

    fn seeded() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.upsert_proposals(&[
            proposal(1, "Grant", ProposalStatus::Executed),
            proposal(2, "Ramp", ProposalStatus::Active),
            proposal(3, "Party", ProposalStatus::Active),
        ])
        .unwrap();
        db
    }

    #[tokio::test]
    async fn test_list_filters_and_pages() {
        let tool = ListProposalsTool { db: seeded() };

        let active = tool
            .execute(json!({"status": "ACTIVE", "limit": 1}))
            .await
            .unwrap();
        assert_eq!(active["total"], 2);
        assert_eq!(active["items"].as_array().unwrap().len(), 1);
        assert_eq!(active["items"][0]["proposalNumber"], 3);

        let oldest = tool.execute(json!({"order": "asc"})).await.unwrap();
        assert_eq!(oldest["items"][0]["title"], "Grant");

        assert!(tool.execute(json!({"status": "OPEN"})).await.is_err());
    }

    #[tokio::test]
    async fn test_get_proposal_found_and_missing() {
        let tool = GetProposalTool { db: seeded() };

        let found = tool.execute(json!({"id": 2})).await.unwrap();
        assert_eq!(found["found"], true);
        assert_eq!(found["proposal"]["title"], "Ramp");

        let by_hash = tool.execute(json!({"id": "#3"})).await.unwrap();
        assert_eq!(by_hash["proposal"]["status"], "ACTIVE");

        let missing = tool.execute(json!({"id": "0xnope"})).await.unwrap();
        assert_eq!(missing["found"], false);
        assert!(missing["proposal"].is_null());

        assert!(tool.execute(json!({})).await.is_err());
    }
}
