//! Agent executor for running agent loops
//!
//! The AgentExecutor implements the core agent loop pattern:
//! 1. Call the LLM with the conversation so far and the available tools
//! 2. If it asked for tools, run them and append the results
//! 3. Repeat until it answers, or the turn budget is spent
//!
//! Unlike a chat assistant, a pipeline agent must produce a usable answer:
//! running out of turns, a truncated answer or an empty answer are all
//! errors, never placeholder text.

use crew_core::{StepError, StepResult};
use crew_llm::{
    CompletionRequest, CompletionResponse, ContentBlock, LLMProvider, Message, StopReason,
    TokenUsage, ToolDefinition,
};
use crew_tools::ToolRegistry;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Configuration for agent execution
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum LLM calls per run
    pub max_turns: usize,

    pub model: String,

    /// Max tokens per completion
    pub max_tokens: usize,

    pub temperature: Option<f32>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_turns: 8,
            model: "gpt-3.5-turbo".to_string(),
            max_tokens: 2048,
            temperature: Some(0.2),
        }
    }
}

/// What one agent run produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentOutcome {
    pub text: String,
    /// LLM calls made
    pub turns: usize,
    pub tool_calls: usize,
    pub usage: TokenUsage,
}

/// Executes an agent loop: LLM → tool calls → execution → loop back
pub struct AgentExecutor {
    provider: Arc<dyn LLMProvider>,
    tool_registry: Arc<ToolRegistry>,
    config: ExecutorConfig,
}

impl AgentExecutor {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        tool_registry: Arc<ToolRegistry>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            provider,
            tool_registry,
            config,
        }
    }

    pub fn builder() -> AgentExecutorBuilder {
        AgentExecutorBuilder::new()
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn tool_registry(&self) -> &ToolRegistry {
        &self.tool_registry
    }

    /// Run the loop for one task
    ///
    /// # Arguments
    ///
    /// * `system_prompt` - The agent's persona
    /// * `task_prompt` - The assignment, sent as the first user message
    pub async fn run(&self, system_prompt: &str, task_prompt: &str) -> StepResult<AgentOutcome> {
        let request = CompletionRequest::builder(&self.config.model)
            .system(system_prompt)
            .add_message(Message::user(task_prompt))
            .max_tokens(self.config.max_tokens);
        let request = match self.config.temperature {
            Some(t) => request.temperature(t),
            None => request,
        };

        if self.tool_registry.is_empty() {
            // A tool-free agent answers in exactly one turn
            let response = self.provider.complete(request.build()).await?;
            let text = final_answer(&response)?;
            info!(
                turns = 1,
                response_length = text.len(),
                total_tokens = response.usage.total(),
                "Agent answered"
            );
            return Ok(AgentOutcome {
                text,
                turns: 1,
                tool_calls: 0,
                usage: response.usage,
            });
        }

        let tools = self.build_tool_definitions();
        let mut conversation = vec![Message::user(task_prompt)];
        let mut usage = TokenUsage::default();
        let mut tool_calls = 0;

        for turn in 1..=self.config.max_turns {
            debug!(
                turn,
                max_turns = self.config.max_turns,
                tool_count = tools.len(),
                "Sending request to LLM"
            );

            let response = self
                .provider
                .complete(
                    request
                        .clone()
                        .messages(conversation.clone())
                        .tools(tools.clone())
                        .build(),
                )
                .await?;
            usage.add(response.usage);

            debug!(
                turn,
                stop_reason = ?response.stop_reason,
                input_tokens = response.usage.input_tokens,
                output_tokens = response.usage.output_tokens,
                "LLM response received"
            );

            if response.message.has_tool_uses() {
                let results = self.execute_tools(&response.message).await?;
                tool_calls += results.len();
                conversation.push(response.message);
                conversation.push(Message::tool_results(results));
                continue;
            }

            if response.stop_reason == StopReason::ToolUse {
                warn!(turn, "Stop reason was tool use but no tool calls were sent");
            }

            let text = final_answer(&response)?;
            info!(
                turns = turn,
                tool_calls,
                total_tokens = usage.total(),
                response_length = text.len(),
                "Agent answered"
            );
            return Ok(AgentOutcome {
                text,
                turns: turn,
                tool_calls,
                usage,
            });
        }

        warn!(max_turns = self.config.max_turns, "Agent turn budget exhausted");
        Err(StepError::BudgetExhausted {
            limit: self.config.max_turns,
        })
    }

    fn build_tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tool_registry
            .list_tools()
            .iter()
            .map(|tool| ToolDefinition::new(tool.name(), tool.description(), tool.input_schema()))
            .collect()
    }

    /// Run every tool call in `message`, in order
    ///
    /// Failures, including calls to tools that do not exist, are returned to
    /// the model as error results so it can correct itself. Missing market
    /// data is the exception: no later turn can recover it, so it ends the loop.
    async fn execute_tools(&self, message: &Message) -> StepResult<Vec<ContentBlock>> {
        let mut results = Vec::new();

        for (id, name, input) in message.tool_uses() {
            let input_preview: String = input.to_string().chars().take(200).collect();
            info!(tool_name = %name, tool_id = %id, input = %input_preview, "Executing tool");

            let start = Instant::now();
            match self.tool_registry.execute(name, input.clone()).await {
                Ok(result) => {
                    let result_str = match result {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    };
                    debug!(
                        tool_name = %name,
                        duration_ms = start.elapsed().as_millis() as u64,
                        result_length = result_str.len(),
                        "Tool execution succeeded"
                    );
                    results.push(ContentBlock::tool_result(id, result_str));
                }
                Err(e @ crew_core::Error::DataUnavailable { .. }) => {
                    warn!(tool_name = %name, error = %e, "Tool reported missing data");
                    return Err(StepError::from(e));
                }
                Err(e) => {
                    warn!(
                        tool_name = %name,
                        duration_ms = start.elapsed().as_millis() as u64,
                        error = %e,
                        "Tool execution failed"
                    );
                    results.push(ContentBlock::tool_error(id, format!("Error: {e}")));
                }
            }
        }

        Ok(results)
    }
}

fn final_answer(response: &CompletionResponse) -> StepResult<String> {
    response.final_text().map_err(StepError::from)
}

/// Builder for AgentExecutor
pub struct AgentExecutorBuilder {
    provider: Option<Arc<dyn LLMProvider>>,
    tool_registry: Arc<ToolRegistry>,
    config: ExecutorConfig,
}

impl AgentExecutorBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            tool_registry: Arc::new(ToolRegistry::new()),
            config: ExecutorConfig::default(),
        }
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn tool_registry(mut self, registry: Arc<ToolRegistry>) -> Self {
        self.tool_registry = registry;
        self
    }

    pub fn config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn max_turns(mut self, max: usize) -> Self {
        self.config.max_turns = max;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    /// Build the executor
    pub fn build(self) -> crew_core::Result<AgentExecutor> {
        let provider = self
            .provider
            .ok_or_else(|| crew_core::Error::Configuration("LLM provider not set".to_string()))?;
        if self.config.max_turns == 0 {
            return Err(crew_core::Error::Configuration(
                "max_turns must be greater than zero".to_string(),
            ));
        }

        Ok(AgentExecutor::new(provider, self.tool_registry, self.config))
    }
}

impl Default for AgentExecutorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
