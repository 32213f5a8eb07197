use crate::tools::{ToolContext, ToolRegistry};
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;

pub mod maintenance;
pub mod proposals;
pub mod search;
pub mod votes;

/// Largest page a listing tool will return.
pub const MAX_PAGE_SIZE: usize = 100;
const DEFAULT_PAGE_SIZE: usize = 20;

pub fn register_all(registry: &mut ToolRegistry, ctx: &ToolContext) {
    registry.register(Arc::new(proposals::ListProposalsTool { db: ctx.db.clone() }));
    registry.register(Arc::new(proposals::GetProposalTool { db: ctx.db.clone() }));
    registry.register(Arc::new(votes::GetVotesTool { db: ctx.db.clone() }));
    registry.register(Arc::new(votes::GetVoteSummaryTool { db: ctx.db.clone() }));
    registry.register(Arc::new(search::SearchProposalsTool::new(ctx)));
    registry.register(Arc::new(maintenance::SyncProposalsTool::new(ctx)));
    registry.register(Arc::new(maintenance::IndexEmbeddingsTool::new(ctx)));
    registry.register(Arc::new(maintenance::CacheStatusTool { db: ctx.db.clone() }));
}

pub(crate) fn opt_str<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params[key].as_str().map(str::trim).filter(|s| !s.is_empty())
}

pub(crate) fn opt_bool(params: &Value, key: &str) -> anyhow::Result<Option<bool>> {
    match &params[key] {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(*b)),
        other => Err(anyhow::anyhow!("{} must be a boolean, got {}", key, other)),
    }
}

/// Accepts a JSON number or a numeric string, since CLI callers pass strings.
pub(crate) fn opt_parse<T>(params: &Value, key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = match &params[key] {
        Value::Null => return Ok(None),
        Value::String(s) if s.trim().is_empty() => return Ok(None),
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        other => return Err(anyhow::anyhow!("{} has an unexpected type: {}", key, other)),
    };
    raw.parse::<T>()
        .map(Some)
        .map_err(|e| anyhow::anyhow!("invalid {} '{}': {}", key, raw, e))
}

/// A proposal number given as `42`, `"42"` or `"#42"`.
pub(crate) fn proposal_number(params: &Value, key: &str) -> anyhow::Result<i64> {
    let number = match &params[key] {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().trim_start_matches('#').parse().ok(),
        _ => None,
    };
    number.ok_or_else(|| anyhow::anyhow!("Missing or invalid {}", key))
}

pub(crate) fn page_window(params: &Value) -> anyhow::Result<(usize, usize)> {
    let limit = opt_parse::<usize>(params, "limit")?
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let offset = opt_parse::<usize>(params, "offset")?.unwrap_or(0);
    Ok((limit, offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProposalStatus;
    use serde_json::json;

    #[test]
    fn test_param_helpers() {
        let params = json!({
            "status": "active",
            "limit": "500",
            "offset": 3,
            "number": "#42",
            "full": true,
            "blank": "  "
        });

        assert_eq!(
            opt_parse::<ProposalStatus>(&params, "status").unwrap(),
            Some(ProposalStatus::Active)
        );
        assert_eq!(page_window(&params).unwrap(), (MAX_PAGE_SIZE, 3));
        assert_eq!(proposal_number(&params, "number").unwrap(), 42);
        assert_eq!(opt_bool(&params, "full").unwrap(), Some(true));
        assert_eq!(opt_str(&params, "blank"), None);
        assert_eq!(opt_parse::<usize>(&params, "missing").unwrap(), None);

        assert!(opt_parse::<usize>(&json!({"limit": "many"}), "limit").is_err());
        assert!(proposal_number(&json!({}), "number").is_err());
        assert!(opt_bool(&json!({"full": "yes"}), "full").is_err());
    }
}
