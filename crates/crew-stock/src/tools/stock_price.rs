//! Tool for summarising a ticker's price history

use crate::api::{MarketData, PriceBar};
use crate::cache::{SeriesKey, StockCache};
use crate::config::{HistoryWindow, MAX_HISTORY_DAYS};
use crate::error::{Result, StockError};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use crew_tools::Tool;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

pub const TOOL_NAME: &str = "stock_price_history";

/// Bars echoed verbatim at the end of a summary
const RECENT_BARS: usize = 10;

type SeriesCache = StockCache<SeriesKey, Arc<Vec<PriceBar>>>;

#[derive(Debug, Deserialize)]
struct PriceParams {
    ticker: String,
    #[serde(default)]
    start: Option<NaiveDate>,
    #[serde(default)]
    end: Option<NaiveDate>,
}

/// Condensed view of a price series, small enough for a prompt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSummary {
    pub symbol: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub trading_days: usize,
    pub first_close: f64,
    pub last_close: f64,
    pub change_pct: f64,
    pub period_high: f64,
    pub period_low: f64,
    pub average_volume: u64,
    pub recent_bars: Vec<PriceBar>,
}

impl PriceSummary {
    /// Summarise a non-empty series
    pub fn from_bars(symbol: &str, bars: &[PriceBar]) -> Option<Self> {
        let first = bars.first()?;
        let last = bars.last()?;

        let change_pct = if first.close == 0.0 {
            0.0
        } else {
            round2((last.close - first.close) / first.close * 100.0)
        };
        let total_volume: u64 = bars.iter().map(|b| b.volume).sum();

        Some(Self {
            symbol: symbol.to_string(),
            start: first.date,
            end: last.date,
            trading_days: bars.len(),
            first_close: round2(first.close),
            last_close: round2(last.close),
            change_pct,
            period_high: round2(bars.iter().map(|b| b.high).fold(f64::MIN, f64::max)),
            period_low: round2(bars.iter().map(|b| b.low).fold(f64::MAX, f64::min)),
            average_volume: total_volume / bars.len() as u64,
            recent_bars: bars[bars.len().saturating_sub(RECENT_BARS)..].to_vec(),
        })
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Gives the price analyst the ticker's history over the configured window
pub struct StockPriceTool {
    market: Arc<dyn MarketData>,
    cache: SeriesCache,
    window: HistoryWindow,
    today: Option<NaiveDate>,
}

impl StockPriceTool {
    pub fn new(market: Arc<dyn MarketData>, window: HistoryWindow, cache_ttl: Duration) -> Self {
        Self {
            market,
            cache: StockCache::new(cache_ttl),
            window,
            today: None,
        }
    }

    /// Pin the date trailing windows end on
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    async fn summarize(&self, params: PriceParams) -> Result<PriceSummary> {
        let symbol = params.ticker.trim().to_uppercase();
        let today = self.today.unwrap_or_else(|| Utc::now().date_naive());
        let (start, end) = match (params.start, params.end) {
            (Some(start), Some(end)) => (start, end),
            (None, None) => self.window.resolve(today)?,
            _ => {
                return Err(StockError::InvalidRequest(
                    "give both start and end, or neither".to_string(),
                ));
            }
        };
        if start >= end {
            return Err(StockError::InvalidRequest(format!(
                "start {start} must be before end {end}"
            )));
        }
        if (end - start).num_days() > i64::from(MAX_HISTORY_DAYS) {
            return Err(StockError::InvalidRequest(format!(
                "range {start}..{end} is longer than {MAX_HISTORY_DAYS} days"
            )));
        }

        let key = SeriesKey::new(&symbol, start, end);
        let bars = self
            .cache
            .get_or_fetch(key, || async {
                self.market.download(&symbol, start, end).await.map(Arc::new)
            })
            .await?;

        PriceSummary::from_bars(&symbol, &bars)
            .ok_or_else(|| StockError::data_unavailable(&symbol, "empty price series"))
    }
}

#[async_trait]
impl Tool for StockPriceTool {
    async fn execute(&self, params: Value) -> crew_core::Result<Value> {
        let params: PriceParams = serde_json::from_value(params)
            .map_err(|e| crew_core::Error::tool(TOOL_NAME, format!("Invalid parameters: {e}")))?;

        let summary = self
            .summarize(params)
            .await
            .map_err(|e| e.into_tool_error(TOOL_NAME))?;
        serde_json::to_value(summary).map_err(|e| crew_core::Error::Serialization(e.to_string()))
    }

    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Fetch the daily price history of a stock ticker from Yahoo Finance and summarise it: \
         first and last close, percentage change, period high and low, average volume and \
         the most recent bars. Defaults to the last year."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "ticker": {
                    "type": "string",
                    "description": "Ticker symbol, e.g. 'AAPL' or 'ITUB3.SA'"
                },
                "start": {
                    "type": "string",
                    "description": "First day, YYYY-MM-DD (optional, with end)"
                },
                "end": {
                    "type": "string",
                    "description": "Day after the last day, YYYY-MM-DD (optional, with start)"
                }
            },
            "required": ["ticker"]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockMarketData;

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    fn bar(date: NaiveDate, close: f64, volume: u64) -> PriceBar {
        PriceBar {
            date,
            open: close - 1.0,
            high: close + 2.0,
            low: close - 2.0,
            close,
            volume,
        }
    }

    fn series() -> Vec<PriceBar> {
        vec![
            bar(day(8, 5), 200.0, 100),
            bar(day(8, 6), 210.0, 200),
            bar(day(8, 7), 220.0, 300),
        ]
    }

    #[test]
    fn test_summary() {
        let summary = PriceSummary::from_bars("AAPL", &series()).unwrap();
        assert_eq!(summary.trading_days, 3);
        assert_eq!(summary.change_pct, 10.0);
        assert_eq!(summary.period_high, 222.0);
        assert_eq!(summary.period_low, 198.0);
        assert_eq!(summary.average_volume, 200);
        assert_eq!(summary.recent_bars.len(), 3);

        assert!(PriceSummary::from_bars("AAPL", &[]).is_none());
    }

    #[tokio::test]
    async fn test_execute_uses_window_and_cache() {
        let mut market = MockMarketData::new();
        market.expect_download().times(1).returning(|symbol, start, end| {
            assert_eq!(symbol, "AAPL");
            assert_eq!(start, day(7, 9));
            assert_eq!(end, day(8, 8));
            Ok(series())
        });

        let tool = StockPriceTool::new(
            Arc::new(market),
            HistoryWindow::Trailing { days: 30 },
            Duration::from_secs(60),
        )
        .with_today(day(8, 8));

        let first = tool.execute(json!({"ticker": " aapl "})).await.unwrap();
        assert_eq!(first["symbol"], "AAPL");
        assert_eq!(first["last_close"], 220.0);

        // served from the cache; the mock allows a single download
        let second = tool.execute(json!({"ticker": "AAPL"})).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_unknown_ticker_is_data_unavailable() {
        let mut market = MockMarketData::new();
        market
            .expect_download()
            .returning(|symbol, _, _| Err(StockError::data_unavailable(symbol, "404 Not Found")));

        let tool = StockPriceTool::new(Arc::new(market), HistoryWindow::default(), Duration::from_secs(60));
        let err = tool.execute(json!({"ticker": "ZZZZ"})).await.unwrap_err();
        assert!(matches!(err, crew_core::Error::DataUnavailable { ref symbol, .. } if symbol == "ZZZZ"));
    }

    #[tokio::test]
    async fn test_bad_parameters() {
        let market = MockMarketData::new();
        let tool = StockPriceTool::new(Arc::new(market), HistoryWindow::default(), Duration::from_secs(60));

        let err = tool.execute(json!({"symbol": "AAPL"})).await.unwrap_err();
        assert!(matches!(err, crew_core::Error::Tool { .. }));

        let err = tool
            .execute(json!({"ticker": "AAPL", "start": "2024-01-01"}))
            .await
            .unwrap_err();
        assert!(matches!(err, crew_core::Error::Tool { .. }));
    }

    #[tokio::test]
    async fn test_bad_ranges_never_reach_the_market() {
        let mut market = MockMarketData::new();
        market.expect_download().times(0);
        let tool = StockPriceTool::new(Arc::new(market), HistoryWindow::default(), Duration::from_secs(60));

        for (start, end) in [
            ("2024-08-08", "2024-01-01"),
            ("2024-08-08", "2024-08-08"),
            ("1900-01-01", "2024-01-01"),
        ] {
            let err = tool
                .execute(json!({"ticker": "AAPL", "start": start, "end": end}))
                .await
                .unwrap_err();
            assert!(
                matches!(err, crew_core::Error::Tool { ref message, .. } if message.contains("Invalid request")),
                "{start}..{end}: {err:?}"
            );
        }
    }
}
