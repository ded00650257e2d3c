//! Newsletter pipeline assembly
//!
//! Three agent steps share one context:
//!
//! 1. `price_analyst` reads `ticket` and writes `price_trend`
//! 2. `news_analyst` reads `ticket` and `current_date` and writes `news_summary`
//! 3. `newsletter_writer` reads all of the above and writes `newsletter`

use crate::api::{
    DuckDuckGoSearch, FallbackSearch, MarketData, WebSearch, YahooMarketData, YahooNewsSearch,
};
use crate::config::StockConfig;
use crate::interface::RunLauncher;
use crate::prompts;
use crate::tools::{NewsSearchTool, StockPriceTool};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use crew_core::{Context, Error, Result, StepSpec};
use crew_llm::LLMProvider;
use crew_llm::providers::OpenAIProvider;
use crew_prompt::AgentProfile;
use crew_runtime::{AgentExecutor, AgentStep, ExecutorConfig};
use crew_tools::{Tool, ToolRegistry};
use crew_workflow::{CancellationToken, PipelineGraph, RunOptions, RunResult, Runner};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Context keys of the newsletter pipeline
pub mod keys {
    pub const TICKET: &str = "ticket";
    pub const CURRENT_DATE: &str = "current_date";
    pub const PRICE_TREND: &str = "price_trend";
    pub const NEWS_SUMMARY: &str = "news_summary";
    pub const NEWSLETTER: &str = "newsletter";
}

/// External services the crew talks to
#[derive(Clone)]
pub struct Capabilities {
    pub llm: Arc<dyn LLMProvider>,
    pub market: Arc<dyn MarketData>,
    pub search: Arc<dyn WebSearch>,
}

impl Capabilities {
    /// Production backends: OpenAI, Yahoo Finance, and Yahoo news search
    /// backed up by DuckDuckGo
    pub fn from_config(config: &StockConfig) -> Result<Self> {
        let llm = OpenAIProvider::with_config(config.llm.clone())
            .map_err(|e| Error::Configuration(e.to_string()))?;
        let market = YahooMarketData::new().map_err(|e| Error::Configuration(e.to_string()))?;
        let news = YahooNewsSearch::new(config.search_rate_per_sec)
            .map_err(|e| Error::Configuration(e.to_string()))?;
        let web = DuckDuckGoSearch::new(config.search_rate_per_sec)
            .map_err(|e| Error::Configuration(e.to_string()))?;

        Ok(Self {
            llm: Arc::new(llm),
            market: Arc::new(market),
            search: Arc::new(FallbackSearch::new(Arc::new(news), Arc::new(web))),
        })
    }
}

/// Seed context for one run
pub fn initial_context(ticker: &str, today: NaiveDate) -> Result<Context> {
    Context::new()
        .with(keys::TICKET, ticker)?
        .with(keys::CURRENT_DATE, today.format("%Y-%m-%d").to_string())
}

/// Build and validate the three-step newsletter graph
pub fn build_pipeline(config: &StockConfig, capabilities: &Capabilities) -> Result<PipelineGraph> {
    let price_tool = StockPriceTool::new(
        Arc::clone(&capabilities.market),
        config.history,
        config.price_cache_ttl,
    );
    let news_tool = NewsSearchTool::new(Arc::clone(&capabilities.search), config.search_results);

    let price_analyst = agent_step(
        config,
        capabilities,
        StepSpec::builder(prompts::PRICE_ANALYST)
            .input(keys::TICKET)
            .output(keys::PRICE_TREND)
            .max_iterations(config.budgets.price_analyst)
            .build()?,
        prompts::price_analyst()?,
        vec![Arc::new(price_tool)],
        &[],
    )?;

    let news_analyst = agent_step(
        config,
        capabilities,
        StepSpec::builder(prompts::NEWS_ANALYST)
            .inputs([keys::TICKET, keys::CURRENT_DATE])
            .output(keys::NEWS_SUMMARY)
            .max_iterations(config.budgets.news_analyst)
            .build()?,
        prompts::news_analyst()?,
        vec![Arc::new(news_tool)],
        &[],
    )?;

    let writer = agent_step(
        config,
        capabilities,
        StepSpec::builder(prompts::NEWSLETTER_WRITER)
            .inputs([keys::TICKET, keys::PRICE_TREND, keys::NEWS_SUMMARY])
            .output(keys::NEWSLETTER)
            .max_iterations(config.budgets.newsletter_writer)
            .build()?,
        prompts::newsletter_writer()?,
        vec![],
        &[keys::PRICE_TREND, keys::NEWS_SUMMARY],
    )?;

    let graph = PipelineGraph::builder()
        .initial_keys([keys::TICKET, keys::CURRENT_DATE])
        .step(Arc::new(price_analyst))
        .step(Arc::new(news_analyst))
        .step(Arc::new(writer))
        .build();
    graph.validate()?;
    Ok(graph)
}

fn agent_step(
    config: &StockConfig,
    capabilities: &Capabilities,
    spec: StepSpec,
    profile: AgentProfile,
    tools: Vec<Arc<dyn Tool>>,
    context_keys: &[&str],
) -> Result<AgentStep> {
    let registry = ToolRegistry::new();
    for tool in tools {
        registry.register(tool)?;
    }

    let executor = AgentExecutor::builder()
        .provider(Arc::clone(&capabilities.llm))
        .tool_registry(Arc::new(registry))
        .config(ExecutorConfig {
            max_turns: config.max_agent_turns,
            model: config.model.clone(),
            ..ExecutorConfig::default()
        })
        .build()?;

    AgentStep::builder(spec, profile, executor)
        .language(config.language)
        .context_from(context_keys.iter().copied())
        .build()
}

/// Runs the newsletter pipeline for one ticker at a time
///
/// The graph is built once; every launch gets a fresh runner and context.
pub struct NewsletterLauncher {
    graph: Arc<PipelineGraph>,
    step_timeout: Duration,
    today: Option<NaiveDate>,
}

impl NewsletterLauncher {
    pub fn new(config: &StockConfig, capabilities: &Capabilities) -> Result<Self> {
        Ok(Self {
            graph: Arc::new(build_pipeline(config, capabilities)?),
            step_timeout: config.step_timeout,
            today: None,
        })
    }

    /// Launcher wired to the production backends
    pub fn from_config(config: &StockConfig) -> Result<Self> {
        Self::new(config, &Capabilities::from_config(config)?)
    }

    /// Pin the `current_date` handed to the agents
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn graph(&self) -> &PipelineGraph {
        &self.graph
    }
}

#[async_trait]
impl RunLauncher for NewsletterLauncher {
    async fn launch(&self, ticker: &str, cancellation: CancellationToken) -> Result<RunResult> {
        let today = self.today.unwrap_or_else(|| Utc::now().date_naive());
        info!(ticker, %today, "Launching newsletter run");

        let options = RunOptions::default()
            .with_step_timeout(Some(self.step_timeout))
            .with_cancellation(cancellation);
        let mut runner = Runner::new(Arc::clone(&self.graph))?.with_options(options);
        runner.run(initial_context(ticker, today)?).await
    }
}
