//! Pipeline runner
//!
//! Executes a validated [`PipelineGraph`] step by step against a fresh
//! [`Context`]. Each step gets a snapshot of its declared inputs, a bounded
//! number of attempts, and a per-attempt time limit. Retryable failures are
//! tried again until the step's budget is spent; anything else halts the run.

use crate::graph::PipelineGraph;
use chrono::{DateTime, Utc};
use crew_core::{Context, DependencyError, Error, Result, Step, StepError, StepOutput};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Default per-attempt time limit
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(180);

/// Per-run knobs
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Upper bound for a single step attempt; `None` disables the limit
    pub step_timeout: Option<Duration>,
    /// Cancels the run between attempts and interrupts the running attempt
    pub cancellation: CancellationToken,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            step_timeout: Some(DEFAULT_STEP_TIMEOUT),
            cancellation: CancellationToken::new(),
        }
    }
}

impl RunOptions {
    pub fn with_step_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.step_timeout = timeout;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }
}

/// Lifecycle of a [`Runner`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running,
    Succeeded,
    Failed,
}

/// Terminal outcome of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    Failed,
    Cancelled,
}

/// What happened to one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    pub name: String,
    pub status: StepStatus,
    pub attempts: usize,
    pub duration_ms: u64,
    /// One message per failed attempt
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// The step that halted a run, and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFailure {
    pub step_name: String,
    /// `StepError::kind`, or `"cancelled"`
    pub kind: String,
    pub message: String,
    #[serde(skip)]
    cause: Option<StepError>,
}

impl RunFailure {
    fn from_step_error(step_name: &str, err: StepError) -> Self {
        Self {
            step_name: step_name.to_string(),
            kind: err.kind().to_string(),
            message: err.to_string(),
            cause: Some(err),
        }
    }

    fn cancelled(step_name: &str) -> Self {
        Self {
            step_name: step_name.to_string(),
            kind: "cancelled".to_string(),
            message: "run cancelled".to_string(),
            cause: None,
        }
    }

    /// The step error behind the failure; `None` for cancellations
    pub fn cause(&self) -> Option<&StepError> {
        self.cause.as_ref()
    }

    pub fn is_cancellation(&self) -> bool {
        self.kind == "cancelled"
    }
}

/// Everything a caller learns about a finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: Uuid,
    pub status: RunStatus,
    /// Initial input plus the outputs of every step that succeeded
    pub final_context: Context,
    pub failure: Option<RunFailure>,
    pub steps: Vec<StepReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunResult {
    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    /// A string output from the final context
    pub fn output(&self, key: &str) -> Option<&str> {
        self.final_context.get_str(key)
    }

    /// Convert a failed run into the matching crate error
    ///
    /// A result read back from JSON has lost the typed cause; its failure
    /// is reported as a fatal error carrying the recorded message.
    pub fn into_error(self) -> Option<Error> {
        let failure = self.failure?;
        if failure.is_cancellation() {
            return Some(Error::Cancelled);
        }
        Some(match failure.cause {
            Some(StepError::DataUnavailable { symbol, reason }) => {
                Error::DataUnavailable { symbol, reason }
            }
            Some(source) => Error::Execution {
                step: failure.step_name,
                source,
            },
            None => Error::Execution {
                step: failure.step_name,
                source: StepError::Fatal(failure.message),
            },
        })
    }
}

enum AttemptError {
    Step(StepError),
    Cancelled,
}

/// Drives one run of a pipeline graph
///
/// A runner is single use: it moves from `Idle` to `Running` and then to
/// exactly one terminal state. Build a new runner for every run.
pub struct Runner {
    graph: Arc<PipelineGraph>,
    options: RunOptions,
    state: RunState,
}

impl Runner {
    /// Validate the graph and prepare a runner for it
    pub fn new(graph: Arc<PipelineGraph>) -> Result<Self> {
        graph.validate()?;
        Ok(Self {
            graph,
            options: RunOptions::default(),
            state: RunState::Idle,
        })
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn graph(&self) -> &PipelineGraph {
        &self.graph
    }

    /// Execute every step in order
    ///
    /// Returns `Err` only when the run cannot start: the runner was already
    /// used, or the initial context does not match the graph. Step failures
    /// are reported in the returned [`RunResult`].
    pub async fn run(&mut self, initial: Context) -> Result<RunResult> {
        if self.state != RunState::Idle {
            return Err(Error::InvalidState(format!(
                "runner is {:?}; a runner can only be used once",
                self.state
            )));
        }
        self.check_initial(&initial)?;

        self.state = RunState::Running;
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, steps = self.graph.len(), "Starting pipeline run");

        let mut context = initial;
        let mut reports = Vec::with_capacity(self.graph.len());
        let mut failure = None;

        for step in self.graph.steps() {
            let (report, outcome) = self.run_step(step.as_ref(), &context).await;
            reports.push(report);

            match outcome {
                Ok(output) => {
                    if let Err(err) = context.merge(output) {
                        let err = StepError::OutputContract(err.to_string());
                        error!(%run_id, step = step.name(), error = %err, "Could not merge step output");
                        failure = Some(RunFailure::from_step_error(step.name(), err));
                        break;
                    }
                }
                Err(f) => {
                    error!(
                        %run_id,
                        step = %f.step_name,
                        kind = %f.kind,
                        error = %f.message,
                        "Pipeline run halted"
                    );
                    failure = Some(f);
                    break;
                }
            }
        }

        let status = if failure.is_none() {
            RunStatus::Succeeded
        } else {
            RunStatus::Failed
        };
        self.state = match status {
            RunStatus::Succeeded => RunState::Succeeded,
            RunStatus::Failed => RunState::Failed,
        };

        let finished_at = Utc::now();
        info!(
            %run_id,
            ?status,
            completed = reports.iter().filter(|r| r.status == StepStatus::Succeeded).count(),
            elapsed_ms = (finished_at - started_at).num_milliseconds(),
            "Pipeline run finished"
        );

        Ok(RunResult {
            run_id,
            status,
            final_context: context,
            failure,
            steps: reports,
            started_at,
            finished_at,
        })
    }

    fn check_initial(&self, initial: &Context) -> Result<()> {
        if let Some(key) = self
            .graph
            .initial_keys()
            .iter()
            .find(|k| !initial.contains_key(k))
        {
            return Err(DependencyError::MissingInitialInput(key.clone()).into());
        }

        for step in self.graph.steps() {
            if let Some(key) = step
                .spec()
                .output_keys()
                .iter()
                .find(|k| initial.contains_key(k))
            {
                return Err(DependencyError::ShadowsInitialInput {
                    step: step.name().to_string(),
                    key: key.clone(),
                }
                .into());
            }
        }
        Ok(())
    }

    async fn run_step(
        &self,
        step: &dyn Step,
        context: &Context,
    ) -> (StepReport, std::result::Result<StepOutput, RunFailure>) {
        let spec = step.spec();
        let name = spec.name();
        let budget = spec.max_iterations();
        let snapshot = context.snapshot(spec.input_keys());
        let started = Instant::now();
        let mut attempts = 0;
        let mut errors = Vec::new();

        info!(step = name, budget, "Running step");

        let outcome = loop {
            if self.options.cancellation.is_cancelled() {
                break Err(RunFailure::cancelled(name));
            }
            attempts += 1;

            let err = match self.attempt(step, &snapshot).await {
                Ok(output) => match output.check_contract(spec.output_keys()) {
                    Ok(()) => break Ok(output),
                    Err(err) => err,
                },
                Err(AttemptError::Cancelled) => break Err(RunFailure::cancelled(name)),
                Err(AttemptError::Step(err)) => err,
            };

            errors.push(err.to_string());
            if err.is_retryable() && attempts < budget {
                warn!(step = name, attempt = attempts, budget, error = %err, "Step attempt failed, retrying");
                continue;
            }
            break Err(RunFailure::from_step_error(name, err));
        };

        let status = match &outcome {
            Ok(_) => StepStatus::Succeeded,
            Err(f) if f.is_cancellation() => StepStatus::Cancelled,
            Err(_) => StepStatus::Failed,
        };
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        debug!(step = name, ?status, attempts, duration_ms, "Step finished");

        let report = StepReport {
            name: name.to_string(),
            status,
            attempts,
            duration_ms,
            errors,
        };
        (report, outcome)
    }

    async fn attempt(
        &self,
        step: &dyn Step,
        snapshot: &crew_core::ContextSnapshot,
    ) -> std::result::Result<StepOutput, AttemptError> {
        let execution = async {
            match self.options.step_timeout {
                Some(limit) => tokio::time::timeout(limit, step.execute(snapshot))
                    .await
                    .unwrap_or(Err(StepError::Timeout(limit))),
                None => step.execute(snapshot).await,
            }
        };

        tokio::select! {
            _ = self.options.cancellation.cancelled() => Err(AttemptError::Cancelled),
            result = execution => result.map_err(AttemptError::Step),
        }
    }
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("graph", &self.graph)
            .field("state", &self.state)
            .finish()
    }
}
