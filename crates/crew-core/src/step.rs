//! The step contract
//!
//! A step is one unit of pipeline work. It declares which context keys it
//! reads, which keys it writes, and how many attempts it may take, and it
//! exposes one async operation that turns a [`ContextSnapshot`] into a
//! [`StepOutput`].

use crate::context::ContextSnapshot;
use crate::error::{Error, Result, StepError, StepResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::pin::Pin;

/// Static declaration of a step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSpec {
    name: String,
    input_keys: BTreeSet<String>,
    output_keys: BTreeSet<String>,
    max_iterations: usize,
}

impl StepSpec {
    /// Start building a spec for a step called `name`
    pub fn builder(name: impl Into<String>) -> StepSpecBuilder {
        StepSpecBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input_keys(&self) -> &BTreeSet<String> {
        &self.input_keys
    }

    pub fn output_keys(&self) -> &BTreeSet<String> {
        &self.output_keys
    }

    /// Attempt budget for this step, always at least 1
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }
}

/// Builder for [`StepSpec`]
///
/// # Example
///
/// ```
/// use crew_core::StepSpec;
///
/// let spec = StepSpec::builder("price_analyst")
///     .input("ticket")
///     .output("price_trend")
///     .max_iterations(5)
///     .build()
///     .unwrap();
///
/// assert_eq!(spec.max_iterations(), 5);
/// ```
#[derive(Debug, Clone)]
pub struct StepSpecBuilder {
    name: String,
    input_keys: BTreeSet<String>,
    output_keys: BTreeSet<String>,
    max_iterations: usize,
}

impl StepSpecBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input_keys: BTreeSet::new(),
            output_keys: BTreeSet::new(),
            max_iterations: 1,
        }
    }

    pub fn input(mut self, key: impl Into<String>) -> Self {
        self.input_keys.insert(key.into());
        self
    }

    pub fn inputs<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.input_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn output(mut self, key: impl Into<String>) -> Self {
        self.output_keys.insert(key.into());
        self
    }

    pub fn outputs<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Validate and build the spec
    pub fn build(self) -> Result<StepSpec> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidDefinition("step name must not be empty".into()));
        }
        if self.max_iterations == 0 {
            return Err(Error::InvalidDefinition(format!(
                "step '{}': max_iterations must be greater than zero",
                self.name
            )));
        }
        if self.output_keys.is_empty() {
            return Err(Error::InvalidDefinition(format!(
                "step '{}' declares no outputs",
                self.name
            )));
        }
        if let Some(key) = self.input_keys.intersection(&self.output_keys).next() {
            return Err(Error::InvalidDefinition(format!(
                "step '{}' both reads and writes '{key}'",
                self.name
            )));
        }

        Ok(StepSpec {
            name: self.name,
            input_keys: self.input_keys,
            output_keys: self.output_keys,
            max_iterations: self.max_iterations,
        })
    }
}

/// Values produced by one successful step attempt
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepOutput(BTreeMap<String, serde_json::Value>);

impl StepOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check that the produced keys are exactly `declared`
    pub fn check_contract(&self, declared: &BTreeSet<String>) -> StepResult<()> {
        let missing: Vec<&str> = declared
            .iter()
            .filter(|k| !self.0.contains_key(*k))
            .map(String::as_str)
            .collect();
        let extra: Vec<&str> = self
            .0
            .keys()
            .filter(|k| !declared.contains(*k))
            .map(String::as_str)
            .collect();

        if missing.is_empty() && extra.is_empty() {
            return Ok(());
        }

        let mut detail = Vec::new();
        if !missing.is_empty() {
            detail.push(format!("missing [{}]", missing.join(", ")));
        }
        if !extra.is_empty() {
            detail.push(format!("undeclared [{}]", extra.join(", ")));
        }
        Err(StepError::OutputContract(detail.join("; ")))
    }

    pub fn into_inner(self) -> BTreeMap<String, serde_json::Value> {
        self.0
    }
}

impl<K: Into<String>, V: Into<serde_json::Value>> FromIterator<(K, V)> for StepOutput {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// A unit of pipeline work
///
/// Implementations must not keep state between attempts that changes their
/// observable behavior; the runner may call `execute` up to
/// `spec().max_iterations()` times for one run.
#[async_trait]
pub trait Step: Send + Sync {
    /// Static declaration used for graph validation and scheduling
    fn spec(&self) -> &StepSpec;

    /// Run one attempt against the step's input snapshot
    async fn execute(&self, input: &ContextSnapshot) -> StepResult<StepOutput>;

    /// Convenience accessor for the step name
    fn name(&self) -> &str {
        self.spec().name()
    }
}

type BoxedStepFuture = Pin<Box<dyn Future<Output = StepResult<StepOutput>> + Send>>;

/// Step backed by a closure
///
/// Handy for deterministic pipelines and for tests. The closure receives an
/// owned copy of the snapshot so the returned future can be `'static`.
pub struct FnStep<F> {
    spec: StepSpec,
    func: F,
}

impl<F, Fut> FnStep<F>
where
    F: Fn(ContextSnapshot) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = StepResult<StepOutput>> + Send + 'static,
{
    pub fn new(spec: StepSpec, func: F) -> Self {
        Self { spec, func }
    }

    fn call(&self, input: &ContextSnapshot) -> BoxedStepFuture {
        Box::pin((self.func)(input.clone()))
    }
}

impl<F> std::fmt::Debug for FnStep<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStep").field("spec", &self.spec).finish_non_exhaustive()
    }
}

#[async_trait]
impl<F, Fut> Step for FnStep<F>
where
    F: Fn(ContextSnapshot) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = StepResult<StepOutput>> + Send + 'static,
{
    fn spec(&self) -> &StepSpec {
        &self.spec
    }

    async fn execute(&self, input: &ContextSnapshot) -> StepResult<StepOutput> {
        self.call(input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use serde_json::json;

    fn spec(name: &str) -> StepSpecBuilder {
        StepSpec::builder(name)
    }

    #[test]
    fn test_builder_defaults() {
        let spec = spec("writer").output("newsletter").build().unwrap();
        assert_eq!(spec.name(), "writer");
        assert!(spec.input_keys().is_empty());
        assert_eq!(spec.max_iterations(), 1);
    }

    #[test]
    fn test_builder_rejects_invalid_definitions() {
        assert!(matches!(
            spec("").output("x").build(),
            Err(Error::InvalidDefinition(_))
        ));
        assert!(matches!(
            spec("a").output("x").max_iterations(0).build(),
            Err(Error::InvalidDefinition(_))
        ));
        assert!(matches!(
            spec("a").input("x").build(),
            Err(Error::InvalidDefinition(_))
        ));
        assert!(matches!(
            spec("a").input("x").output("x").build(),
            Err(Error::InvalidDefinition(_))
        ));
    }

    #[test]
    fn test_output_contract() {
        let declared: BTreeSet<String> = ["price_trend".to_string()].into();

        assert!(StepOutput::new()
            .with("price_trend", "up")
            .check_contract(&declared)
            .is_ok());

        let err = StepOutput::new().check_contract(&declared).unwrap_err();
        assert_eq!(err, StepError::OutputContract("missing [price_trend]".into()));

        let err = StepOutput::new()
            .with("price_trend", "up")
            .with("bonus", 1)
            .check_contract(&declared)
            .unwrap_err();
        assert_eq!(err, StepError::OutputContract("undeclared [bonus]".into()));
    }

    #[test]
    fn test_output_from_iter() {
        let out: StepOutput = vec![("a", json!(1)), ("b", json!("two"))].into_iter().collect();
        assert_eq!(out.len(), 2);
        assert_eq!(out.get("b"), Some(&json!("two")));
    }

    #[tokio::test]
    async fn test_fn_step_executes_closure() {
        let step = FnStep::new(
            spec("echo").input("ticket").output("echo").build().unwrap(),
            |input: ContextSnapshot| async move {
                let ticket = input.require_str("ticket")?.to_string();
                Ok(StepOutput::new().with("echo", format!("{ticket}!")))
            },
        );

        let ctx = Context::new().with("ticket", "AAPL").unwrap();
        let snapshot = ctx.snapshot(step.spec().input_keys());
        let out = step.execute(&snapshot).await.unwrap();

        assert_eq!(step.name(), "echo");
        assert_eq!(out.get("echo"), Some(&json!("AAPL!")));
    }

    #[test]
    fn test_fn_step_missing_input() {
        let step = FnStep::new(
            spec("echo").input("ticket").output("echo").build().unwrap(),
            |input: ContextSnapshot| async move {
                input.require("ticket")?;
                Ok(StepOutput::new())
            },
        );

        let result = tokio_test::block_on(step.execute(&ContextSnapshot::default()));
        assert_eq!(result.unwrap_err(), StepError::MissingInput("ticket".into()));
    }
}
