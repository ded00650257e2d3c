//! Stock newsletter crew
//!
//! Three LLM agents collaborate on a short investor newsletter for one
//! ticker:
//!
//! - the price analyst reads a year of daily prices from Yahoo Finance and
//!   calls the trend
//! - the news analyst searches the web for ticker and broad-market news and
//!   scores fear and greed
//! - the writer turns both analyses into a three-paragraph markdown
//!   newsletter
//!
//! The crew runs as a linear [`crew_workflow`] pipeline; see [`pipeline`]
//! for the assembly and [`interface`] for the input boundary.
//!
//! # Example
//!
//! ```rust,ignore
//! use crew_stock::config::StockConfigBuilder;
//! use crew_stock::{NewsletterLauncher, TickerForm};
//! use crew_utils::ProcessEnv;
//! use crew_workflow::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = StockConfigBuilder::from_env(&ProcessEnv)?.build()?;
//!     let launcher = NewsletterLauncher::from_config(&config)?;
//!
//!     let newsletter = TickerForm::submit("AAPL", &launcher, CancellationToken::new()).await?;
//!     println!("{}", newsletter.text);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod interface;
pub mod pipeline;
pub mod prompts;
pub mod tools;

pub use config::{HistoryWindow, StepBudgets, StockConfig};
pub use error::{Result, StockError};
pub use interface::{Newsletter, PresentationError, RunLauncher, TickerForm};
pub use pipeline::{Capabilities, NewsletterLauncher, build_pipeline, initial_context};

pub use crew_prompt::Language;
