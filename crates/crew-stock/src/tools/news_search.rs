//! Tool for searching market news

use crate::api::WebSearch;
use async_trait::async_trait;
use crew_tools::Tool;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::debug;

pub const TOOL_NAME: &str = "news_search";

/// Hard cap on hits per call, whatever the model asks for
const MAX_RESULTS: usize = 25;

#[derive(Debug, Deserialize)]
struct SearchParams {
    query: String,
    #[serde(default)]
    count: Option<usize>,
}

/// Lets the news analyst search the web
pub struct NewsSearchTool {
    search: Arc<dyn WebSearch>,
    default_count: usize,
}

impl NewsSearchTool {
    pub fn new(search: Arc<dyn WebSearch>, default_count: usize) -> Self {
        Self {
            search,
            default_count,
        }
    }
}

#[async_trait]
impl Tool for NewsSearchTool {
    async fn execute(&self, params: Value) -> crew_core::Result<Value> {
        let params: SearchParams = serde_json::from_value(params)
            .map_err(|e| crew_core::Error::tool(TOOL_NAME, format!("Invalid parameters: {e}")))?;

        let query = params.query.trim();
        if query.is_empty() {
            return Err(crew_core::Error::tool(TOOL_NAME, "query must not be empty"));
        }
        let count = params.count.unwrap_or(self.default_count).clamp(1, MAX_RESULTS);

        let hits = self
            .search
            .search(query, count)
            .await
            .map_err(|e| e.into_tool_error(TOOL_NAME))?;
        debug!(query, hits = hits.len(), "News search finished");

        Ok(json!({
            "query": query,
            "result_count": hits.len(),
            "results": hits,
        }))
    }

    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Search recent financial news. Returns a list of results with title, snippet \
         (publisher, date and related tickers) and source URL. Search each asset \
         separately by its ticker, and search the broad market (e.g. 'S&P 500') as well."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query, e.g. 'AAPL' or 'AAPL earnings'"
                },
                "count": {
                    "type": "integer",
                    "description": "Maximum number of results",
                    "default": self.default_count
                }
            },
            "required": ["query"]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{MockWebSearch, SearchHit};
    use crate::error::StockError;

    fn hit(title: &str) -> SearchHit {
        SearchHit {
            title: title.to_string(),
            snippet: format!("{title} snippet"),
            source: "https://example.com".to_string(),
        }
    }

    #[tokio::test]
    async fn test_search_with_default_count() {
        let mut search = MockWebSearch::new();
        search.expect_search().times(1).returning(|query, count| {
            assert_eq!(query, "AAPL stock news");
            assert_eq!(count, 10);
            Ok(vec![hit("Apple beats estimates"), hit("iPhone sales")])
        });

        let tool = NewsSearchTool::new(Arc::new(search), 10);
        let result = tool.execute(json!({"query": " AAPL stock news "})).await.unwrap();

        assert_eq!(result["result_count"], 2);
        assert_eq!(result["results"][0]["title"], "Apple beats estimates");
    }

    #[tokio::test]
    async fn test_count_is_clamped() {
        let mut search = MockWebSearch::new();
        search.expect_search().returning(|_, count| {
            assert_eq!(count, MAX_RESULTS);
            Ok(vec![])
        });

        let tool = NewsSearchTool::new(Arc::new(search), 10);
        let result = tool
            .execute(json!({"query": "S&P 500", "count": 1000}))
            .await
            .unwrap();
        assert_eq!(result["result_count"], 0);
    }

    #[tokio::test]
    async fn test_failures_are_tool_errors() {
        let mut search = MockWebSearch::new();
        search.expect_search().returning(|_, _| {
            Err(StockError::RateLimitExceeded {
                provider: "duckduckgo".into(),
            })
        });
        let tool = NewsSearchTool::new(Arc::new(search), 10);

        let err = tool.execute(json!({"query": "AAPL"})).await.unwrap_err();
        assert!(matches!(err, crew_core::Error::Tool { ref tool, .. } if tool == "news_search"));

        let err = tool.execute(json!({"query": "  "})).await.unwrap_err();
        assert!(matches!(err, crew_core::Error::Tool { .. }));
    }
}
