//! Yahoo Finance news search

use super::{SearchHit, SharedRateLimiter, WebSearch};
use crate::error::{Result, StockError};
use async_trait::async_trait;
use chrono::DateTime;
use governor::{Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

pub const DEFAULT_YAHOO_SEARCH_URL: &str = "https://query2.finance.yahoo.com/v1/finance/search";

/// Yahoo turns away clients that do not look like a browser
const USER_AGENT: &str = concat!(
    "Mozilla/5.0 (compatible; stock-crew/",
    env!("CARGO_PKG_VERSION"),
    ")"
);

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    news: Vec<NewsItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewsItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    publisher: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    provider_publish_time: Option<i64>,
    #[serde(default)]
    related_tickers: Vec<String>,
}

impl NewsItem {
    fn into_hit(self) -> SearchHit {
        let mut byline = self.publisher;
        if let Some(published) = self
            .provider_publish_time
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
        {
            let date = published.format("%Y-%m-%d").to_string();
            byline = if byline.is_empty() {
                date
            } else {
                format!("{byline}, {date}")
            };
        }
        if !self.related_tickers.is_empty() {
            byline = format!("{byline} [{}]", self.related_tickers.join(", "));
        }

        let snippet = if byline.trim().is_empty() {
            self.title.clone()
        } else {
            format!("{}: {}", byline.trim(), self.title)
        };
        SearchHit {
            title: self.title,
            snippet,
            source: self.link,
        }
    }
}

/// [`WebSearch`] over the news section of Yahoo Finance search
///
/// Needs no API key. Queries are matched against headlines and tickers, so
/// a bare symbol (`AAPL`) or index name finds more than a sentence does.
pub struct YahooNewsSearch {
    client: Client,
    base_url: String,
    rate_limiter: SharedRateLimiter,
}

impl YahooNewsSearch {
    /// Create a client allowing `per_second` requests per second
    pub fn new(per_second: u32) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()?;
        let quota = Quota::per_second(NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN));

        Ok(Self {
            client,
            base_url: DEFAULT_YAHOO_SEARCH_URL.to_string(),
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl WebSearch for YahooNewsSearch {
    #[instrument(skip(self), fields(provider = "yahoo"))]
    async fn search(&self, query: &str, count: usize) -> Result<Vec<SearchHit>> {
        self.rate_limiter.until_ready().await;

        let news_count = count.to_string();
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("q", query),
                ("quotesCount", "0"),
                ("newsCount", news_count.as_str()),
                ("enableFuzzyQuery", "false"),
            ])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(StockError::RateLimitExceeded {
                provider: "yahoo".to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StockError::ApiError(format!(
                "Yahoo search API error {status}: {body}"
            )));
        }

        let body = response.text().await?;
        let hits = parse_news(&body, count)?;
        debug!(hits = hits.len(), "News search completed");
        Ok(hits)
    }
}

fn parse_news(body: &str, count: usize) -> Result<Vec<SearchHit>> {
    let response: SearchResponse = serde_json::from_str(body)?;
    Ok(response
        .news
        .into_iter()
        .filter(|item| !item.title.trim().is_empty())
        .take(count)
        .map(NewsItem::into_hit)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "explains": [],
        "count": 3,
        "quotes": [],
        "news": [
            {
                "uuid": "6f1c0a2e-1111-3a4b-9c1d-0e2f3a4b5c6d",
                "title": "Apple beats quarterly estimates on strong iPhone demand",
                "publisher": "Reuters",
                "link": "https://finance.yahoo.com/news/apple-beats-estimates.html",
                "providerPublishTime": 1722988800,
                "type": "STORY",
                "thumbnail": {"resolutions": []},
                "relatedTickers": ["AAPL", "MSFT"]
            },
            {
                "uuid": "7a2d1b3f-2222-4b5c-8d2e-1f3a4b5c6d7e",
                "title": "",
                "publisher": "Motley Fool",
                "link": "https://finance.yahoo.com/m/empty.html",
                "providerPublishTime": 1722902400,
                "type": "STORY"
            },
            {
                "uuid": "8b3e2c4a-3333-5c6d-9e3f-2a4b5c6d7e8f",
                "title": "Stocks slide as jobs report stokes growth fears",
                "publisher": "Bloomberg",
                "link": "https://finance.yahoo.com/news/stocks-slide.html",
                "type": "STORY"
            }
        ],
        "nav": [],
        "lists": [],
        "totalTime": 41
    }"#;

    #[test]
    fn test_parse_news() {
        let hits = parse_news(SAMPLE, 10).unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(
            hits[0].title,
            "Apple beats quarterly estimates on strong iPhone demand"
        );
        assert_eq!(
            hits[0].snippet,
            "Reuters, 2024-08-07 [AAPL, MSFT]: Apple beats quarterly estimates on strong iPhone demand"
        );
        assert_eq!(
            hits[0].source,
            "https://finance.yahoo.com/news/apple-beats-estimates.html"
        );
        assert_eq!(
            hits[1].snippet,
            "Bloomberg: Stocks slide as jobs report stokes growth fears"
        );
    }

    #[test]
    fn test_parse_news_respects_count() {
        assert_eq!(parse_news(SAMPLE, 1).unwrap().len(), 1);
        assert!(parse_news(r#"{"quotes": []}"#, 10).unwrap().is_empty());
        assert!(matches!(
            parse_news("<html>", 10),
            Err(StockError::JsonError(_))
        ));
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_live_news() {
        let search = YahooNewsSearch::new(1).unwrap();
        let hits = search.search("AAPL", 5).await.unwrap();
        assert!(hits.len() <= 5);
    }
}
