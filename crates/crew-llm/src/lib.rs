//! LLM capability for stock-crew
//!
//! Provider-agnostic chat types plus an OpenAI-compatible implementation:
//!
//! - [`Message`] and [`ContentBlock`] for conversations with tool calls
//! - [`CompletionRequest`] / [`CompletionResponse`]
//! - [`ToolDefinition`] and JSON-schema helpers for function calling
//! - the [`LLMProvider`] trait and [`providers::OpenAIProvider`]

pub mod completion;
pub mod error;
pub mod messages;
pub mod provider;
pub mod providers;
pub mod tools;

pub use completion::{CompletionRequest, CompletionResponse, StopReason, TokenUsage};
pub use error::{InferenceError, Result};
pub use messages::{ContentBlock, Message, MessageContent, Role};
pub use provider::{LLMProvider, complete_text};
pub use tools::ToolDefinition;

