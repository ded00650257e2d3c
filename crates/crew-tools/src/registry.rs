//! Tool registry

use crate::Tool;
use crew_core::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Named set of tools available to one agent
///
/// Iteration order is alphabetical so the tool list sent to the model is
/// stable between runs.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<BTreeMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool; names must be unique
    pub fn register(&self, tool: Arc<dyn Tool>) -> Result<()> {
        let mut tools = self.tools.write().unwrap_or_else(PoisonError::into_inner);
        let name = tool.name().to_string();
        if tools.contains_key(&name) {
            return Err(Error::InvalidDefinition(format!(
                "tool '{name}' is already registered"
            )));
        }
        debug!(tool = %name, "Registered tool");
        tools.insert(name, tool);
        Ok(())
    }

    /// Builder-style registration
    pub fn with_tool(self, tool: Arc<dyn Tool>) -> Result<Self> {
        self.register(tool)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        let tools = self.tools.read().unwrap_or_else(PoisonError::into_inner);
        tools.get(name).cloned()
    }

    /// All tools, sorted by name
    pub fn list_tools(&self) -> Vec<Arc<dyn Tool>> {
        let tools = self.tools.read().unwrap_or_else(PoisonError::into_inner);
        tools.values().cloned().collect()
    }

    /// Look up `name` and run it
    pub async fn execute(&self, name: &str, params: Value) -> Result<Value> {
        let tool = self
            .get(name)
            .ok_or_else(|| Error::tool(name, "no such tool is available"))?;
        tool.execute(params).await
    }

    pub fn len(&self) -> usize {
        self.tools.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tools = self.tools.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("ToolRegistry")
            .field("tools", &tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct Echo(&'static str);

    #[async_trait]
    impl Tool for Echo {
        async fn execute(&self, params: Value) -> Result<Value> {
            Ok(json!({ "tool": self.0, "params": params }))
        }

        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "Echo the arguments back"
        }

        fn input_schema(&self) -> Value {
            json!({ "type": "object" })
        }
    }

    #[test]
    fn test_register_and_list_sorted() {
        let registry = ToolRegistry::new()
            .with_tool(Arc::new(Echo("news_search")))
            .unwrap()
            .with_tool(Arc::new(Echo("calculator")))
            .unwrap();

        let names: Vec<String> = registry
            .list_tools()
            .iter()
            .map(|t| t.name().to_string())
            .collect();
        assert_eq!(names, vec!["calculator", "news_search"]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(Echo("news_search"))).unwrap();
        assert!(registry.register(Arc::new(Echo("news_search"))).is_err());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_execute_by_name() {
        let registry = ToolRegistry::new()
            .with_tool(Arc::new(Echo("news_search")))
            .unwrap();

        let out = registry
            .execute("news_search", json!({"query": "AAPL"}))
            .await
            .unwrap();
        assert_eq!(out["params"]["query"], "AAPL");

        let err = registry.execute("stock_price", json!({})).await.unwrap_err();
        assert!(matches!(err, Error::Tool { tool, .. } if tool == "stock_price"));
    }
}
