//! Error types for the stock capabilities

use crew_utils::ConfigError;
use thiserror::Error;

/// Stock capability errors
#[derive(Debug, Error)]
pub enum StockError {
    /// API request failed
    #[error("API error: {0}")]
    ApiError(String),

    /// The caller asked for something the capability will not serve
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Data not available for the requested symbol
    #[error("Data not available for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    /// Rate limit exceeded for API
    #[error("Rate limit exceeded for {provider}")]
    RateLimitExceeded { provider: String },

    /// Network or HTTP error
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Yahoo Finance API error
    #[error("Yahoo Finance error: {0}")]
    YahooFinanceError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type alias for stock operations
pub type Result<T> = std::result::Result<T, StockError>;

impl StockError {
    pub fn data_unavailable(symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DataUnavailable {
            symbol: symbol.into(),
            reason: reason.into(),
        }
    }

    /// Convert into the error a tool reports to the agent loop
    ///
    /// Missing data and configuration problems keep their meaning; anything
    /// else is a failed capability call attributed to `tool`.
    pub fn into_tool_error(self, tool: &str) -> crew_core::Error {
        match self {
            Self::DataUnavailable { symbol, reason } => {
                crew_core::Error::DataUnavailable { symbol, reason }
            }
            Self::ConfigError(msg) => crew_core::Error::Configuration(msg),
            other => crew_core::Error::tool(tool, other.to_string()),
        }
    }
}

impl From<ConfigError> for StockError {
    fn from(err: ConfigError) -> Self {
        Self::ConfigError(err.to_string())
    }
}

impl From<StockError> for crew_core::Error {
    fn from(err: StockError) -> Self {
        err.into_tool_error("stock")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StockError::data_unavailable("AAPL", "No data found");
        assert_eq!(err.to_string(), "Data not available for AAPL: No data found");

        let err = StockError::RateLimitExceeded {
            provider: "duckduckgo".into(),
        };
        assert_eq!(err.to_string(), "Rate limit exceeded for duckduckgo");
    }

    #[test]
    fn test_tool_error_conversion() {
        let err = StockError::data_unavailable("ZZZZ", "unknown symbol").into_tool_error("stock_price_history");
        assert!(matches!(err, crew_core::Error::DataUnavailable { ref symbol, .. } if symbol == "ZZZZ"));

        let err = StockError::ApiError("503".into()).into_tool_error("news_search");
        match err {
            crew_core::Error::Tool { tool, message } => {
                assert_eq!(tool, "news_search");
                assert!(message.contains("503"));
            }
            other => panic!("Expected Tool variant, got {other:?}"),
        }

        let err: crew_core::Error = StockError::from(ConfigError::Missing {
            names: vec!["OPENAI_API_KEY".into()],
        })
        .into();
        assert!(matches!(err, crew_core::Error::Configuration(_)));
    }
}
