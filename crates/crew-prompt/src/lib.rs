//! Prompt templates and agent profiles for stock-crew
//!
//! Every agent in a pipeline is described by an [`AgentProfile`]: an
//! immutable record of role, goal, backstory, task and expected output,
//! validated when it is built. Fields are Jinja templates ([`JinjaTemplate`])
//! with one variant per [`Language`].
//!
//! # Quick Start
//!
//! ```
//! use crew_prompt::{AgentProfile, Language, ProfileText};
//! use serde_json::json;
//!
//! let profile = AgentProfile::builder("price_analyst")
//!     .variant(
//!         Language::English,
//!         ProfileText {
//!             role: "Stock Price Analyst".into(),
//!             goal: "Find the {{ ticket }} stock price and analyze trends".into(),
//!             backstory: "You are highly experienced in analyzing stock prices.".into(),
//!             task: "Analyze the {{ ticket }} price history".into(),
//!             expected_output: "The current trend: up, down or sideways".into(),
//!         },
//!     )
//!     .build()
//!     .unwrap();
//!
//! let rendered = profile.render(Language::English, &json!({ "ticket": "AAPL" })).unwrap();
//! assert_eq!(rendered.task, "Analyze the AAPL price history");
//! ```

mod error;
mod jinja;
mod language;
mod profile;
mod template;

pub use error::{PromptError, Result};
pub use jinja::{JinjaTemplate, JinjaTemplateBuilder};
pub use language::Language;
pub use profile::{AgentProfile, AgentProfileBuilder, ProfileText, RenderedProfile};
pub use template::PromptTemplate;
