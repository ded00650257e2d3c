//! Tool framework for stock-crew
//!
//! Tools are the functions an agent may call while working on a step: fetch
//! price history, search the news, and so on. Each step gets its own
//! [`ToolRegistry`] holding only the tools it is allowed to use.

pub mod registry;
pub mod tool;

pub use registry::ToolRegistry;
pub use tool::Tool;
