//! DuckDuckGo web search
//!
//! The instant-answer API returns encyclopedia abstracts and related topics,
//! not news. It serves as the fallback behind Yahoo news search.

use super::{SearchHit, SharedRateLimiter, WebSearch};
use crate::error::{Result, StockError};
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

pub const DEFAULT_DUCKDUCKGO_URL: &str = "https://api.duckduckgo.com/";

/// Longest title derived from a result's text
const MAX_TITLE_CHARS: usize = 80;

/// Instant-answer response; only the fields that carry results
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstantAnswer {
    #[serde(default)]
    heading: String,
    #[serde(default)]
    abstract_text: String,
    #[serde(default, rename = "AbstractURL")]
    abstract_url: String,
    #[serde(default)]
    results: Vec<Topic>,
    #[serde(default)]
    related_topics: Vec<Topic>,
}

/// A topic is either a result or a named group of results
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Topic {
    #[serde(default)]
    text: String,
    #[serde(default, rename = "FirstURL")]
    first_url: String,
    #[serde(default)]
    topics: Vec<Topic>,
}

/// [`WebSearch`] backed by the DuckDuckGo instant-answer API
pub struct DuckDuckGoSearch {
    client: Client,
    base_url: String,
    rate_limiter: SharedRateLimiter,
}

impl DuckDuckGoSearch {
    /// Create a client allowing `per_second` requests per second
    pub fn new(per_second: u32) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("stock-crew/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let quota = Quota::per_second(NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN));

        Ok(Self {
            client,
            base_url: DEFAULT_DUCKDUCKGO_URL.to_string(),
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl WebSearch for DuckDuckGoSearch {
    #[instrument(skip(self), fields(provider = "duckduckgo"))]
    async fn search(&self, query: &str, count: usize) -> Result<Vec<SearchHit>> {
        self.rate_limiter.until_ready().await;

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(StockError::RateLimitExceeded {
                provider: "duckduckgo".to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StockError::ApiError(format!(
                "DuckDuckGo API error {status}: {body}"
            )));
        }

        // the API answers with content-type application/x-javascript
        let body = response.text().await?;
        let answer: InstantAnswer = serde_json::from_str(&body)?;
        let hits = collect_hits(answer, count);
        debug!(hits = hits.len(), "Search completed");
        Ok(hits)
    }
}

fn collect_hits(answer: InstantAnswer, count: usize) -> Vec<SearchHit> {
    let mut hits = Vec::new();

    if !answer.abstract_text.trim().is_empty() {
        hits.push(SearchHit {
            title: answer.heading,
            snippet: answer.abstract_text,
            source: answer.abstract_url,
        });
    }

    let mut pending: Vec<Topic> = answer.results;
    pending.extend(answer.related_topics);
    flatten(pending, &mut hits);

    hits.truncate(count);
    hits
}

fn flatten(topics: Vec<Topic>, hits: &mut Vec<SearchHit>) {
    for topic in topics {
        if !topic.topics.is_empty() {
            flatten(topic.topics, hits);
            continue;
        }
        if topic.text.trim().is_empty() {
            continue;
        }
        hits.push(SearchHit {
            title: title_of(&topic.text),
            snippet: topic.text,
            source: topic.first_url,
        });
    }
}

/// Result texts read "Title - description"; keep the part before the dash
fn title_of(text: &str) -> String {
    let head = text.split(" - ").next().unwrap_or(text);
    head.chars().take(MAX_TITLE_CHARS).collect()
}
