//! Shared utilities for stock-crew
//!
//! This crate provides common functionality used across the stock-crew workspace,
//! including logging setup and environment-backed configuration helpers.

pub mod config;
pub mod logging;

pub use config::{ConfigError, EnvSource, ProcessEnv, load_dotenv};
pub use logging::{LogFormat, init_tracing, init_tracing_with};
