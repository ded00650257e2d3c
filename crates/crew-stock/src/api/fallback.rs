//! Search that falls back to a second backend

use super::{SearchHit, WebSearch};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Ask `primary` first; if it fails or finds nothing, ask `fallback`
///
/// A fallback error is returned only when both backends failed.
pub struct FallbackSearch {
    primary: Arc<dyn WebSearch>,
    fallback: Arc<dyn WebSearch>,
}

impl FallbackSearch {
    pub fn new(primary: Arc<dyn WebSearch>, fallback: Arc<dyn WebSearch>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl WebSearch for FallbackSearch {
    async fn search(&self, query: &str, count: usize) -> Result<Vec<SearchHit>> {
        match self.primary.search(query, count).await {
            Ok(hits) if !hits.is_empty() => return Ok(hits),
            Ok(_) => debug!(query, "Primary search found nothing"),
            Err(e) => warn!(query, error = %e, "Primary search failed"),
        }
        self.fallback.search(query, count).await
    }
}
