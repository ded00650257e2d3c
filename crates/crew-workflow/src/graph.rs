//! Pipeline graph definition and validation
//!
//! A graph is an ordered list of steps plus the set of keys the caller seeds
//! the context with. Validation is a pure function of that definition: it
//! never touches a context and can be called any number of times.

use crew_core::{DependencyError, Step};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Ordered set of steps with declared data dependencies
///
/// # Example
///
/// ```
/// use crew_core::{FnStep, StepOutput, StepSpec};
/// use crew_workflow::PipelineGraph;
/// use std::sync::Arc;
///
/// let echo = FnStep::new(
///     StepSpec::builder("echo").input("ticket").output("echo").build().unwrap(),
///     |_| async { Ok(StepOutput::new().with("echo", "hi")) },
/// );
///
/// let graph = PipelineGraph::builder()
///     .initial_key("ticket")
///     .step(Arc::new(echo))
///     .build();
/// assert!(graph.validate().is_ok());
/// ```
#[derive(Clone)]
pub struct PipelineGraph {
    initial_keys: BTreeSet<String>,
    steps: Vec<Arc<dyn Step>>,
}

impl PipelineGraph {
    pub fn builder() -> PipelineGraphBuilder {
        PipelineGraphBuilder::default()
    }

    /// Keys the caller must provide when starting a run
    pub fn initial_keys(&self) -> &BTreeSet<String> {
        &self.initial_keys
    }

    /// Steps in execution order
    pub fn steps(&self) -> &[Arc<dyn Step>] {
        &self.steps
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Check the dependency invariants
    ///
    /// Every input of every step must be an initial key or an output of a
    /// step declared before it. Step names must be unique, each key must
    /// have at most one producer, and no step may overwrite an initial key.
    pub fn validate(&self) -> Result<(), DependencyError> {
        let producers = check_structure(&self.initial_keys, &self.steps)?;

        let mut available: HashSet<&str> = self.initial_keys.iter().map(String::as_str).collect();
        for step in &self.steps {
            let spec = step.spec();
            for key in spec.input_keys() {
                if available.contains(key.as_str()) {
                    continue;
                }
                return Err(match producers.get(key.as_str()) {
                    Some(producer) => DependencyError::OutOfOrder {
                        step: spec.name().to_string(),
                        key: key.clone(),
                        producer: (*producer).to_string(),
                    },
                    None => DependencyError::UnsatisfiedInput {
                        step: spec.name().to_string(),
                        key: key.clone(),
                    },
                });
            }
            available.extend(spec.output_keys().iter().map(String::as_str));
        }

        debug!(steps = self.steps.len(), "Pipeline graph validated");
        Ok(())
    }
}

impl std::fmt::Debug for PipelineGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineGraph")
            .field("initial_keys", &self.initial_keys)
            .field("steps", &self.step_names())
            .finish()
    }
}

/// Structural checks shared by validation and ordering; returns key → producer
fn check_structure<'a>(
    initial_keys: &BTreeSet<String>,
    steps: &'a [Arc<dyn Step>],
) -> Result<BTreeMap<&'a str, &'a str>, DependencyError> {
    if steps.is_empty() {
        return Err(DependencyError::Empty);
    }

    let mut names = HashSet::new();
    let mut producers: BTreeMap<&str, &str> = BTreeMap::new();

    for step in steps {
        let spec = step.spec();
        if !names.insert(spec.name()) {
            return Err(DependencyError::DuplicateStep(spec.name().to_string()));
        }

        for key in spec.output_keys() {
            if initial_keys.contains(key) {
                return Err(DependencyError::ShadowsInitialInput {
                    step: spec.name().to_string(),
                    key: key.clone(),
                });
            }
            if let Some(first) = producers.insert(key.as_str(), spec.name()) {
                return Err(DependencyError::DuplicateProducer {
                    key: key.clone(),
                    first: first.to_string(),
                    second: spec.name().to_string(),
                });
            }
        }
    }

    for step in steps {
        let spec = step.spec();
        if let Some(key) = spec
            .input_keys()
            .iter()
            .find(|k| !initial_keys.contains(*k) && !producers.contains_key(k.as_str()))
        {
            return Err(DependencyError::UnsatisfiedInput {
                step: spec.name().to_string(),
                key: key.clone(),
            });
        }
    }

    Ok(producers)
}

/// Kahn's algorithm; ties go to the step declared first, so the order is
/// deterministic for a given step list
fn topological_order(
    initial_keys: &BTreeSet<String>,
    steps: &[Arc<dyn Step>],
) -> Result<Vec<usize>, DependencyError> {
    let producers = check_structure(initial_keys, steps)?;
    let index_of: BTreeMap<&str, usize> = steps
        .iter()
        .enumerate()
        .map(|(i, s)| (s.name(), i))
        .collect();

    let mut indegree = vec![0usize; steps.len()];
    let mut dependents: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); steps.len()];
    for (i, step) in steps.iter().enumerate() {
        let upstream: BTreeSet<usize> = step
            .spec()
            .input_keys()
            .iter()
            .filter_map(|k| producers.get(k.as_str()))
            .filter_map(|name| index_of.get(name).copied())
            .collect();
        for producer in upstream {
            if dependents[producer].insert(i) {
                indegree[i] += 1;
            }
        }
    }

    let mut ready: BTreeSet<usize> = (0..steps.len()).filter(|&i| indegree[i] == 0).collect();
    let mut order = Vec::with_capacity(steps.len());
    while let Some(next) = ready.pop_first() {
        order.push(next);
        for &dependent in &dependents[next] {
            indegree[dependent] -= 1;
            if indegree[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    if order.len() < steps.len() {
        let stuck = (0..steps.len())
            .filter(|&i| indegree[i] > 0)
            .map(|i| steps[i].name().to_string())
            .collect();
        return Err(DependencyError::Cycle(stuck));
    }
    Ok(order)
}

/// Builder for [`PipelineGraph`]
#[derive(Default)]
pub struct PipelineGraphBuilder {
    initial_keys: BTreeSet<String>,
    steps: Vec<Arc<dyn Step>>,
}

impl PipelineGraphBuilder {
    pub fn initial_key(mut self, key: impl Into<String>) -> Self {
        self.initial_keys.insert(key.into());
        self
    }

    pub fn initial_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.initial_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Append a step; declaration order is execution order
    pub fn step(mut self, step: Arc<dyn Step>) -> Self {
        self.steps.push(step);
        self
    }

    /// Keep the declared order; call [`PipelineGraph::validate`] to check it
    pub fn build(self) -> PipelineGraph {
        PipelineGraph {
            initial_keys: self.initial_keys,
            steps: self.steps,
        }
    }

    /// Reorder the steps so every producer precedes its consumers
    ///
    /// Fails on cycles and on any structural problem `validate` would report.
    pub fn build_sorted(self) -> Result<PipelineGraph, DependencyError> {
        let order = topological_order(&self.initial_keys, &self.steps)?;
        let steps = order.into_iter().map(|i| Arc::clone(&self.steps[i])).collect();
        Ok(PipelineGraph {
            initial_keys: self.initial_keys,
            steps,
        })
    }
}
