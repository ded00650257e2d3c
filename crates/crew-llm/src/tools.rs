//! Tool definitions advertised to the model

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Function the model may call
///
/// `input_schema` is a JSON Schema object describing the arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Must match the name the tool is registered under
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// Helpers to build JSON schemas for tool arguments
pub mod schema {
    use serde_json::{Value, json};

    /// Object schema with the given properties
    ///
    /// # Example
    ///
    /// ```
    /// use crew_llm::tools::schema;
    /// use serde_json::json;
    ///
    /// let schema = schema::object(
    ///     json!({
    ///         "ticker": schema::string("Stock symbol"),
    ///         "days": schema::integer("Days of history"),
    ///     }),
    ///     &["ticker"],
    /// );
    /// assert_eq!(schema["required"], json!(["ticker"]));
    /// ```
    pub fn object(properties: Value, required: &[&str]) -> Value {
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    pub fn string(description: &str) -> Value {
        json!({
            "type": "string",
            "description": description,
        })
    }

    pub fn integer(description: &str) -> Value {
        json!({
            "type": "integer",
            "description": description,
        })
    }
}
