//! Configuration for the newsletter crew
//!
//! Built once at startup and shared by `Arc`. Values come from, in priority
//! order: explicit builder calls (CLI flags), the environment (including a
//! merged `.env` file), then the defaults below.

use crate::error::{Result, StockError};
use chrono::{Duration as ChronoDuration, NaiveDate};
use crew_llm::providers::openai::{API_KEY_VARS, OpenAIConfig};
use crew_prompt::Language;
use crew_utils::EnvSource;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_HISTORY_DAYS: u32 = 365;
/// Longest price history a run may ask for, in days
pub const MAX_HISTORY_DAYS: u32 = 36_500;
pub const DEFAULT_SEARCH_RESULTS: usize = 10;
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(180);
pub const DEFAULT_MAX_AGENT_TURNS: usize = 8;

/// Environment variable names read by [`StockConfigBuilder::from_env`]
pub mod env {
    pub const MODEL: &str = "OPENAI_MODEL";
    pub const LANGUAGE: &str = "NEWSLETTER_LANGUAGE";
    pub const HISTORY_DAYS: &str = "NEWSLETTER_HISTORY_DAYS";
    pub const SEARCH_RESULTS: &str = "NEWSLETTER_SEARCH_RESULTS";
    pub const STEP_TIMEOUT_SECS: &str = "NEWSLETTER_STEP_TIMEOUT_SECS";
    pub const MAX_AGENT_TURNS: &str = "NEWSLETTER_MAX_AGENT_TURNS";
}

/// Price history window handed to the market data capability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryWindow {
    /// The last `days` days, ending today
    Trailing { days: u32 },
    /// A fixed `[start, end)` range
    Range { start: NaiveDate, end: NaiveDate },
}

impl HistoryWindow {
    /// Concrete `(start, end)` dates relative to `today`
    pub fn resolve(&self, today: NaiveDate) -> Result<(NaiveDate, NaiveDate)> {
        match *self {
            Self::Trailing { days } => today
                .checked_sub_signed(ChronoDuration::days(i64::from(days)))
                .map(|start| (start, today))
                .ok_or_else(|| {
                    StockError::ConfigError(format!(
                        "a history window of {days} days starts before the supported calendar"
                    ))
                }),
            Self::Range { start, end } => Ok((start, end)),
        }
    }
}

impl Default for HistoryWindow {
    fn default() -> Self {
        Self::Trailing {
            days: DEFAULT_HISTORY_DAYS,
        }
    }
}

/// Attempt budgets of the three pipeline steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepBudgets {
    pub price_analyst: usize,
    pub news_analyst: usize,
    pub newsletter_writer: usize,
}

impl Default for StepBudgets {
    fn default() -> Self {
        Self {
            price_analyst: 5,
            news_analyst: 10,
            newsletter_writer: 5,
        }
    }
}

/// Configuration for the newsletter crew
#[derive(Debug, Clone)]
pub struct StockConfig {
    /// LLM endpoint and credential
    pub llm: OpenAIConfig,

    pub model: String,

    /// Language of the agent profiles and of the newsletter
    pub language: Language,

    pub history: HistoryWindow,

    /// Default number of hits per news search
    pub search_results: usize,

    /// Per-attempt time limit for each step
    pub step_timeout: Duration,

    /// LLM calls allowed within one agent attempt
    pub max_agent_turns: usize,

    pub budgets: StepBudgets,

    /// How long a downloaded price series stays cached
    pub price_cache_ttl: Duration,

    /// News searches allowed per second
    pub search_rate_per_sec: u32,
}

impl StockConfig {
    /// Create a new configuration builder
    pub fn builder() -> StockConfigBuilder {
        StockConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.llm.api_key.trim().is_empty() {
            return Err(StockError::ConfigError("LLM API key must not be empty".to_string()));
        }
        if self.model.trim().is_empty() {
            return Err(StockError::ConfigError("model name must not be empty".to_string()));
        }
        if self.search_results == 0 {
            return Err(StockError::ConfigError(
                "search_results must be greater than 0".to_string(),
            ));
        }
        if self.step_timeout.is_zero() {
            return Err(StockError::ConfigError(
                "step_timeout must be greater than 0".to_string(),
            ));
        }
        if self.max_agent_turns == 0 {
            return Err(StockError::ConfigError(
                "max_agent_turns must be greater than 0".to_string(),
            ));
        }
        let budgets = self.budgets;
        if [budgets.price_analyst, budgets.news_analyst, budgets.newsletter_writer].contains(&0) {
            return Err(StockError::ConfigError(
                "step budgets must be greater than 0".to_string(),
            ));
        }
        if self.search_rate_per_sec == 0 {
            return Err(StockError::ConfigError(
                "search_rate_per_sec must be greater than 0".to_string(),
            ));
        }
        match self.history {
            HistoryWindow::Trailing { days: 0 } => Err(StockError::ConfigError(
                "history window must cover at least one day".to_string(),
            )),
            HistoryWindow::Trailing { days } if days > MAX_HISTORY_DAYS => {
                Err(StockError::ConfigError(format!(
                    "history window of {days} days exceeds the {MAX_HISTORY_DAYS} day limit"
                )))
            }
            HistoryWindow::Range { start, end } if start >= end => Err(StockError::ConfigError(
                format!("history start {start} must be before end {end}"),
            )),
            HistoryWindow::Range { start, end }
                if (end - start).num_days() > i64::from(MAX_HISTORY_DAYS) =>
            {
                Err(StockError::ConfigError(format!(
                    "history range {start}..{end} exceeds the {MAX_HISTORY_DAYS} day limit"
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Builder for StockConfig
#[derive(Debug, Default)]
pub struct StockConfigBuilder {
    llm: Option<OpenAIConfig>,
    model: Option<String>,
    language: Option<Language>,
    history: Option<HistoryWindow>,
    search_results: Option<usize>,
    step_timeout: Option<Duration>,
    max_agent_turns: Option<usize>,
    budgets: Option<StepBudgets>,
    price_cache_ttl: Option<Duration>,
    search_rate_per_sec: Option<u32>,
}

impl StockConfigBuilder {
    /// Seed a builder from the environment
    ///
    /// The LLM key is read from `OPENAI_API_KEY` or `OPEN_API_KEY`; its
    /// absence is an error here so startup fails before any run.
    pub fn from_env(env: &impl EnvSource) -> Result<Self> {
        let api_key = env.required(API_KEY_VARS)?;
        let mut llm = OpenAIConfig::new(api_key);
        if let Some(base) = env.first_of(&["OPENAI_API_BASE"]) {
            llm = llm.with_api_base(base);
        }

        let language = env
            .first_of(&[env::LANGUAGE])
            .map(|raw| raw.parse::<Language>())
            .transpose()
            .map_err(|e| StockError::ConfigError(e.to_string()))?;

        Ok(Self {
            llm: Some(llm),
            model: env.first_of(&[env::MODEL]),
            language,
            history: env
                .parsed::<u32>(env::HISTORY_DAYS)?
                .map(|days| HistoryWindow::Trailing { days }),
            search_results: env.parsed(env::SEARCH_RESULTS)?,
            step_timeout: env
                .parsed::<u64>(env::STEP_TIMEOUT_SECS)?
                .map(Duration::from_secs),
            max_agent_turns: env.parsed(env::MAX_AGENT_TURNS)?,
            ..Self::default()
        })
    }

    /// Set the LLM API key, keeping any configured base URL
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.llm = Some(match self.llm.take() {
            Some(mut llm) => {
                llm.api_key = key;
                llm
            }
            None => OpenAIConfig::new(key),
        });
        self
    }

    pub fn llm(mut self, llm: OpenAIConfig) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn language(mut self, language: Language) -> Self {
        self.language = Some(language);
        self
    }

    pub fn history(mut self, window: HistoryWindow) -> Self {
        self.history = Some(window);
        self
    }

    pub fn search_results(mut self, count: usize) -> Self {
        self.search_results = Some(count);
        self
    }

    pub fn step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = Some(timeout);
        self
    }

    pub fn max_agent_turns(mut self, turns: usize) -> Self {
        self.max_agent_turns = Some(turns);
        self
    }

    pub fn budgets(mut self, budgets: StepBudgets) -> Self {
        self.budgets = Some(budgets);
        self
    }

    pub fn price_cache_ttl(mut self, ttl: Duration) -> Self {
        self.price_cache_ttl = Some(ttl);
        self
    }

    pub fn search_rate_per_sec(mut self, rate: u32) -> Self {
        self.search_rate_per_sec = Some(rate);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<StockConfig> {
        let llm = self.llm.ok_or_else(|| {
            StockError::ConfigError(format!(
                "missing required setting: {}",
                API_KEY_VARS.join(" or ")
            ))
        })?;

        let config = StockConfig {
            llm,
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            language: self.language.unwrap_or_default(),
            history: self.history.unwrap_or_default(),
            search_results: self.search_results.unwrap_or(DEFAULT_SEARCH_RESULTS),
            step_timeout: self.step_timeout.unwrap_or(DEFAULT_STEP_TIMEOUT),
            max_agent_turns: self.max_agent_turns.unwrap_or(DEFAULT_MAX_AGENT_TURNS),
            budgets: self.budgets.unwrap_or_default(),
            price_cache_ttl: self.price_cache_ttl.unwrap_or(Duration::from_secs(300)),
            search_rate_per_sec: self.search_rate_per_sec.unwrap_or(1),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = StockConfig::builder().api_key("sk-test").build().unwrap();
        assert_eq!(config.model, "gpt-3.5-turbo");
        assert_eq!(config.language, Language::English);
        assert_eq!(config.history, HistoryWindow::Trailing { days: 365 });
        assert_eq!(config.search_results, 10);
        assert_eq!(config.step_timeout, Duration::from_secs(180));
        assert_eq!(config.max_agent_turns, 8);
        assert_eq!(config.budgets.news_analyst, 10);
    }

    #[test]
    fn test_missing_key_is_a_config_error() {
        assert!(matches!(
            StockConfig::builder().build(),
            Err(StockError::ConfigError(_))
        ));
        assert!(matches!(
            StockConfigBuilder::from_env(&env(&[])),
            Err(StockError::ConfigError(_))
        ));
    }

    #[test]
    fn test_from_env() {
        let config = StockConfigBuilder::from_env(&env(&[
            ("OPEN_API_KEY", "sk-legacy"),
            ("OPENAI_MODEL", "gpt-4o-mini"),
            ("NEWSLETTER_LANGUAGE", "pt-br"),
            ("NEWSLETTER_HISTORY_DAYS", "30"),
        ]))
        .unwrap()
        .search_results(5)
        .build()
        .unwrap();

        assert_eq!(config.llm.api_key, "sk-legacy");
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.language, Language::Portuguese);
        assert_eq!(config.history, HistoryWindow::Trailing { days: 30 });
        assert_eq!(config.search_results, 5);
    }

    #[test]
    fn test_from_env_rejects_garbage() {
        let result = StockConfigBuilder::from_env(&env(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("NEWSLETTER_STEP_TIMEOUT_SECS", "soon"),
        ]));
        assert!(matches!(result, Err(StockError::ConfigError(_))));

        let result = StockConfigBuilder::from_env(&env(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("NEWSLETTER_LANGUAGE", "klingon"),
        ]));
        assert!(matches!(result, Err(StockError::ConfigError(_))));
    }

    #[test]
    fn test_validation() {
        let zero_turns = StockConfig::builder().api_key("k").max_agent_turns(0).build();
        assert!(zero_turns.is_err());

        let blank_model = StockConfig::builder().api_key("k").model(" ").build();
        assert!(blank_model.is_err());

        let day = |d| NaiveDate::from_ymd_opt(2024, 8, d).unwrap();
        let backwards = StockConfig::builder()
            .api_key("k")
            .history(HistoryWindow::Range {
                start: day(8),
                end: day(1),
            })
            .build();
        assert!(backwards.is_err());
    }

    #[test]
    fn test_history_window() {
        let today = NaiveDate::from_ymd_opt(2024, 8, 8).unwrap();
        let (start, end) = HistoryWindow::default().resolve(today).unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2023, 8, 9).unwrap());
        assert_eq!(end, today);
    }

    #[test]
    fn test_huge_history_window_is_an_error() {
        let today = NaiveDate::from_ymd_opt(2024, 8, 8).unwrap();
        let huge = HistoryWindow::Trailing { days: u32::MAX };
        assert!(matches!(huge.resolve(today), Err(StockError::ConfigError(_))));

        let result = StockConfigBuilder::from_env(&env(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("NEWSLETTER_HISTORY_DAYS", "200000000"),
        ]))
        .unwrap()
        .build();
        assert!(matches!(result, Err(StockError::ConfigError(_))));

        let century = StockConfig::builder()
            .api_key("k")
            .history(HistoryWindow::Trailing { days: MAX_HISTORY_DAYS })
            .build()
            .unwrap();
        assert!(century.history.resolve(today).is_ok());
    }
}
