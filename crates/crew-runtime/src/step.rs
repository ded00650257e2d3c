//! Pipeline step backed by an LLM agent

use crate::executor::AgentExecutor;
use async_trait::async_trait;
use crew_core::{ContextSnapshot, Error, Result, Step, StepError, StepOutput, StepResult, StepSpec};
use crew_prompt::{AgentProfile, Language};
use tracing::{debug, instrument};

/// A [`Step`] whose work is done by an [`AgentExecutor`]
///
/// Each attempt renders the profile against the input snapshot, hands the
/// outputs of upstream steps to the agent as context, and stores the agent's
/// final answer under the step's single output key.
pub struct AgentStep {
    spec: StepSpec,
    profile: AgentProfile,
    language: Language,
    context_keys: Vec<String>,
    output_key: String,
    executor: AgentExecutor,
}

impl AgentStep {
    pub fn builder(spec: StepSpec, profile: AgentProfile, executor: AgentExecutor) -> AgentStepBuilder {
        AgentStepBuilder {
            spec,
            profile,
            executor,
            language: Language::default(),
            context_keys: Vec::new(),
        }
    }

    pub fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn executor(&self) -> &AgentExecutor {
        &self.executor
    }

    fn upstream_context(&self, input: &ContextSnapshot) -> StepResult<Vec<(String, String)>> {
        self.context_keys
            .iter()
            .map(|key| {
                let text = match input.require(key)? {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Ok((key.clone(), text))
            })
            .collect()
    }
}

#[async_trait]
impl Step for AgentStep {
    fn spec(&self) -> &StepSpec {
        &self.spec
    }

    #[instrument(skip_all, fields(step = %self.spec.name()))]
    async fn execute(&self, input: &ContextSnapshot) -> StepResult<StepOutput> {
        let rendered = self.profile.render(self.language, &input.to_json())?;
        let context = self.upstream_context(input)?;
        let system_prompt = rendered.system_prompt()?;
        let task_prompt = rendered.task_prompt(&context)?;
        debug!(
            role = %rendered.role,
            context_items = context.len(),
            task_length = task_prompt.len(),
            "Rendered agent prompts"
        );

        let outcome = self.executor.run(&system_prompt, &task_prompt).await?;
        if outcome.text.trim().is_empty() {
            return Err(StepError::Capability("agent returned an empty answer".into()));
        }

        Ok(StepOutput::new().with(self.output_key.clone(), outcome.text))
    }
}

/// Builder for [`AgentStep`]
pub struct AgentStepBuilder {
    spec: StepSpec,
    profile: AgentProfile,
    executor: AgentExecutor,
    language: Language,
    context_keys: Vec<String>,
}

impl AgentStepBuilder {
    /// Language the profile is rendered in
    pub fn language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    /// Input keys whose values are shown to the agent as upstream results
    pub fn context_from<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.context_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Build the step
    ///
    /// The spec must declare exactly one output, and every context key must
    /// be a declared input.
    pub fn build(self) -> Result<AgentStep> {
        let name = self.spec.name().to_string();

        let mut outputs = self.spec.output_keys().iter();
        let output_key = match (outputs.next(), outputs.next()) {
            (Some(key), None) => key.clone(),
            _ => {
                return Err(Error::InvalidDefinition(format!(
                    "agent step '{name}' must declare exactly one output"
                )));
            }
        };

        if let Some(key) = self
            .context_keys
            .iter()
            .find(|k| !self.spec.input_keys().contains(*k))
        {
            return Err(Error::InvalidDefinition(format!(
                "agent step '{name}' uses '{key}' as context but does not declare it as an input"
            )));
        }

        Ok(AgentStep {
            spec: self.spec,
            profile: self.profile,
            language: self.language,
            context_keys: self.context_keys,
            output_key,
            executor: self.executor,
        })
    }
}
