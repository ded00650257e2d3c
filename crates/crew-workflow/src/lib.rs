//! Pipeline orchestration for stock-crew
//!
//! A [`PipelineGraph`] declares which steps run and what data flows between
//! them; [`PipelineGraph::validate`] rejects graphs whose steps read keys
//! nobody produces. A [`Runner`] executes a validated graph once, giving each
//! step a bounded number of attempts and returning a serializable
//! [`RunResult`].

pub mod graph;
pub mod runner;

pub use graph::{PipelineGraph, PipelineGraphBuilder};
pub use runner::{
    DEFAULT_STEP_TIMEOUT, RunFailure, RunOptions, RunResult, RunState, RunStatus, Runner,
    StepReport, StepStatus,
};
pub use tokio_util::sync::CancellationToken;
