//! Yahoo Finance market data

use super::{MarketData, PriceBar};
use crate::error::{Result, StockError};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime};
use time::OffsetDateTime;
use tracing::{debug, instrument};
use yahoo_finance_api as yahoo;

/// Error texts Yahoo uses when a symbol or range simply has no data
const NO_DATA_MARKERS: &[&str] = &[
    "no data",
    "no quotes",
    "no result",
    "empty data",
    "not found",
    "404",
    "delisted",
];

/// [`MarketData`] backed by the Yahoo Finance chart API
pub struct YahooMarketData {
    connector: yahoo::YahooConnector,
}

impl YahooMarketData {
    pub fn new() -> Result<Self> {
        let connector = yahoo::YahooConnector::new()
            .map_err(|e| StockError::YahooFinanceError(e.to_string()))?;
        Ok(Self { connector })
    }
}

#[async_trait]
impl MarketData for YahooMarketData {
    #[instrument(skip(self), fields(provider = "yahoo"))]
    async fn download(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<PriceBar>> {
        if start >= end {
            return Err(StockError::data_unavailable(
                symbol,
                format!("empty date range {start} .. {end}"),
            ));
        }

        let response = self
            .connector
            .get_quote_history(symbol, to_offset(start)?, to_offset(end)?)
            .await
            .map_err(|e| classify(symbol, &e))?;

        let quotes = response.quotes().map_err(|e| classify(symbol, &e))?;
        let bars: Vec<PriceBar> = quotes
            .iter()
            .filter_map(|q| {
                to_bar(
                    i64::try_from(q.timestamp).ok()?,
                    [q.open, q.high, q.low, q.close],
                    q.volume,
                )
            })
            .collect();

        if bars.is_empty() {
            return Err(StockError::data_unavailable(
                symbol,
                format!("no trading data between {start} and {end}"),
            ));
        }

        debug!(bars = bars.len(), "Downloaded price history");
        Ok(bars)
    }
}

fn to_offset(date: NaiveDate) -> Result<OffsetDateTime> {
    let timestamp = date.and_time(NaiveTime::MIN).and_utc().timestamp();
    OffsetDateTime::from_unix_timestamp(timestamp)
        .map_err(|e| StockError::YahooFinanceError(format!("Invalid date {date}: {e}")))
}

fn to_bar(timestamp: i64, [open, high, low, close]: [f64; 4], volume: u64) -> Option<PriceBar> {
    if !close.is_finite() {
        return None;
    }
    Some(PriceBar {
        date: DateTime::from_timestamp(timestamp, 0)?.date_naive(),
        open,
        high,
        low,
        close,
        volume,
    })
}

/// Missing-data failures are final; anything else may be transient
fn classify(symbol: &str, err: &impl std::fmt::Display) -> StockError {
    let message = err.to_string();
    let lowered = message.to_lowercase();
    if NO_DATA_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        StockError::data_unavailable(symbol, message)
    } else {
        StockError::YahooFinanceError(message)
    }
}
