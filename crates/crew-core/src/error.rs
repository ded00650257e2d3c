//! Error types for crew-core

use std::time::Duration;
use thiserror::Error;

/// Result type alias for crew-core
pub type Result<T> = std::result::Result<T, Error>;

/// Result type returned by a single step attempt
pub type StepResult<T> = std::result::Result<T, StepError>;

/// Top-level error taxonomy
///
/// `Configuration` and `Dependency` are raised before any run starts.
/// `Execution` and `DataUnavailable` end the current run only.
#[derive(Error, Debug)]
pub enum Error {
    /// A required setting (typically the LLM credential) is missing or invalid
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The pipeline graph violates its dependency invariants
    #[error("Dependency error: {0}")]
    Dependency(#[from] DependencyError),

    /// A step failed, after its attempt budget or by explicit failure
    #[error("Step '{step}' failed: {source}")]
    Execution {
        step: String,
        #[source]
        source: StepError,
    },

    /// Market data for a symbol could not be obtained
    #[error("Data not available for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    /// A step definition is malformed
    #[error("Invalid step definition: {0}")]
    InvalidDefinition(String),

    /// A key was written twice into an append-only context
    #[error("Context key '{0}' is already set")]
    ContextConflict(String),

    /// A context value could not be (de)serialized
    #[error("Context value error: {0}")]
    Serialization(String),

    /// A tool invocation failed
    #[error("Tool '{tool}' failed: {message}")]
    Tool { tool: String, message: String },

    /// The run was cancelled
    #[error("Run cancelled")]
    Cancelled,

    /// An operation was attempted in the wrong lifecycle state
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl Error {
    /// Shorthand for a tool failure
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

/// Violations of the pipeline graph invariants, detected by validation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DependencyError {
    /// The graph has no steps
    #[error("pipeline has no steps")]
    Empty,

    /// Two steps share a name
    #[error("duplicate step name '{0}'")]
    DuplicateStep(String),

    /// A step reads a key nobody produces
    #[error("step '{step}' requires '{key}', which is neither an initial input nor produced by any step")]
    UnsatisfiedInput { step: String, key: String },

    /// Two steps declare the same output key
    #[error("key '{key}' is produced by both '{first}' and '{second}'")]
    DuplicateProducer {
        key: String,
        first: String,
        second: String,
    },

    /// A step would overwrite part of the initial input
    #[error("step '{step}' declares output '{key}', which is an initial input")]
    ShadowsInitialInput { step: String, key: String },

    /// A step reads a key that only a later step produces
    #[error("step '{step}' requires '{key}', which is produced later by '{producer}'")]
    OutOfOrder {
        step: String,
        key: String,
        producer: String,
    },

    /// The data dependencies form a cycle
    #[error("dependency cycle between steps: {}", .0.join(", "))]
    Cycle(Vec<String>),

    /// The run was started without one of the graph's initial keys
    #[error("initial input '{0}' was not provided")]
    MissingInitialInput(String),
}

/// Why a single step attempt failed
///
/// Retryable failures consume one unit of the step's iteration budget and
/// the runner tries again; the others halt the run at once.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StepError {
    /// An external capability call (LLM, search, market data) failed
    #[error("capability call failed: {0}")]
    Capability(String),

    /// The attempt exceeded the per-attempt time limit
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// An inner iterative loop (agent turns) ran out of budget
    #[error("iteration budget of {limit} exhausted without a final answer")]
    BudgetExhausted { limit: usize },

    /// Market data is empty or the range is invalid; retrying will not help
    #[error("data not available for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    /// A declared input key is missing from the snapshot
    #[error("missing input '{0}'")]
    MissingInput(String),

    /// The step returned keys other than exactly its declared outputs
    #[error("output contract violated: {0}")]
    OutputContract(String),

    /// The step gave up explicitly
    #[error("{0}")]
    Fatal(String),
}

impl StepError {
    /// Whether another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Capability(_) | Self::Timeout(_) | Self::BudgetExhausted { .. }
        )
    }

    /// Short machine-friendly label
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Capability(_) => "capability",
            Self::Timeout(_) => "timeout",
            Self::BudgetExhausted { .. } => "budget_exhausted",
            Self::DataUnavailable { .. } => "data_unavailable",
            Self::MissingInput(_) => "missing_input",
            Self::OutputContract(_) => "output_contract",
            Self::Fatal(_) => "fatal",
        }
    }
}

impl From<Error> for StepError {
    fn from(err: Error) -> Self {
        match err {
            Error::DataUnavailable { symbol, reason } => {
                StepError::DataUnavailable { symbol, reason }
            }
            Error::Execution { source, .. } => source,
            tool @ Error::Tool { .. } => StepError::Capability(tool.to_string()),
            other => StepError::Fatal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(StepError::Capability("boom".into()).is_retryable());
        assert!(StepError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(StepError::BudgetExhausted { limit: 3 }.is_retryable());

        assert!(
            !StepError::DataUnavailable {
                symbol: "XYZ".into(),
                reason: "no bars".into()
            }
            .is_retryable()
        );
        assert!(!StepError::MissingInput("ticket".into()).is_retryable());
        assert!(!StepError::OutputContract("extra".into()).is_retryable());
        assert!(!StepError::Fatal("nope".into()).is_retryable());
    }

    #[test]
    fn test_data_unavailable_stays_fatal() {
        let err = Error::DataUnavailable {
            symbol: "ZZZZ".into(),
            reason: "unknown ticker".into(),
        };
        let step_err = StepError::from(err);
        assert_eq!(step_err.kind(), "data_unavailable");
        assert!(!step_err.is_retryable());
    }

    #[test]
    fn test_dependency_error_display() {
        let err = DependencyError::UnsatisfiedInput {
            step: "writer".into(),
            key: "news_summary".into(),
        };
        assert_eq!(
            err.to_string(),
            "step 'writer' requires 'news_summary', which is neither an initial input nor produced by any step"
        );

        let err = DependencyError::Cycle(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "dependency cycle between steps: a, b");
    }

    #[test]
    fn test_tool_error_is_capability_failure() {
        let step_err: StepError = Error::tool("news_search", "rate limited").into();
        assert!(step_err.is_retryable());
    }
}
