//! Core abstractions for stock-crew
//!
//! This crate defines the fundamental types every pipeline is built from:
//! the shared [`Context`] store, the [`Step`] contract with its declared
//! inputs and outputs, and the error taxonomy used across the workspace.

pub mod context;
pub mod error;
pub mod step;

pub use context::{Context, ContextSnapshot};
pub use error::{DependencyError, Error, Result, StepError, StepResult};
pub use step::{FnStep, Step, StepOutput, StepSpec, StepSpecBuilder};
