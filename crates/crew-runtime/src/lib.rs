//! Agent runtime for stock-crew
//!
//! [`AgentExecutor`] runs the bounded LLM → tool → LLM loop for one task;
//! [`AgentStep`] wraps it in the pipeline [`Step`](crew_core::Step) contract
//! so an agent can be scheduled by the workflow runner like any other step.

pub mod executor;
pub mod step;

pub use executor::{AgentExecutor, AgentExecutorBuilder, AgentOutcome, ExecutorConfig};
pub use step::{AgentStep, AgentStepBuilder};
