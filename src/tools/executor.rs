use crate::tools::ToolRegistry;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub async fn execute(&self, name: &str, params: Value) -> anyhow::Result<Value> {
        let tool = self
            .registry
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("Tool not found: {}", name))?;

        let params = if params.is_null() {
            Value::Object(Default::default())
        } else {
            params
        };

        let started = Instant::now();
        let result = tool.execute(params).await;
        match &result {
            Ok(_) => debug!("Tool {} finished in {:?}", name, started.elapsed()),
            Err(e) => warn!("Tool {} failed: {:#}", name, e),
        }
        result
    }
}
