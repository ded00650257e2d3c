//! External capabilities consumed by the newsletter crew
//!
//! Both are traits so the pipeline can be exercised without network access.

pub mod fallback;
pub mod news;
pub mod search;
pub mod yahoo;

use crate::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use governor::RateLimiter;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use fallback::FallbackSearch;
pub use news::YahooNewsSearch;
pub use search::DuckDuckGoSearch;
pub use yahoo::YahooMarketData;

pub(crate) type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// One daily bar of a price series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// One web search result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub snippet: String,
    /// URL the hit points to
    pub source: String,
}

/// Market Data capability
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Daily bars for `symbol` in `[start, end)`, oldest first
    ///
    /// Fails with `DataUnavailable` for unknown symbols, empty series and
    /// ranges where `start >= end`.
    async fn download(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<PriceBar>>;
}

/// Web Search capability
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WebSearch: Send + Sync {
    /// At most `count` results for `query`, most relevant first
    async fn search(&self, query: &str, count: usize) -> Result<Vec<SearchHit>>;
}
