//! Tool trait definition

use async_trait::async_trait;
use crew_core::Result;
use serde_json::Value;

/// A function an agent can call
///
/// Each tool provides a name, a description the model reads to decide when
/// to use it, and a JSON schema for its arguments.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Execute the tool with the model-supplied arguments
    ///
    /// Failures should be reported as [`crew_core::Error::Tool`] so the agent
    /// loop can feed them back to the model.
    async fn execute(&self, params: Value) -> Result<Value>;

    /// Unique within a registry
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema of the arguments
    ///
    /// ```
    /// use serde_json::json;
    ///
    /// let schema = json!({
    ///     "type": "object",
    ///     "properties": {
    ///         "ticker": { "type": "string" }
    ///     },
    ///     "required": ["ticker"]
    /// });
    /// # let _ = schema;
    /// ```
    fn input_schema(&self) -> Value;
}
