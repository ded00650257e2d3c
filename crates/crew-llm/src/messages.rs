//! Message types for LLM conversations
//!
//! A conversation is a list of [`Message`]s. Plain turns carry text; turns
//! that involve function calling carry [`ContentBlock`]s so a single
//! assistant message can hold several tool calls and a single user message
//! can hold their results.

use serde::{Deserialize, Serialize};

/// Message role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    /// Usually sent through [`CompletionRequest::system`](crate::CompletionRequest)
    System,
}

/// Content block in a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },

    /// Tool call requested by the assistant
    ToolUse {
        /// Provider-assigned call id, echoed back in the result
        id: String,
        name: String,
        input: serde_json::Value,
    },

    /// Tool output sent back to the assistant
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

/// Message content: either simple text or structured blocks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

impl Message {
    /// Create a user message with text
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    /// Create an assistant message with text
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(text.into()),
        }
    }

    /// Assistant message built from blocks (text and/or tool calls)
    pub fn assistant_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Blocks(blocks),
        }
    }

    /// User message carrying the results of one round of tool calls
    pub fn tool_results(results: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Blocks(results),
        }
    }

    /// Concatenated text content, ignoring tool blocks
    pub fn text(&self) -> String {
        match &self.content {
            MessageContent::Text(s) => s.clone(),
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Tool calls requested in this message, as `(id, name, input)`
    pub fn tool_uses(&self) -> Vec<(&str, &str, &serde_json::Value)> {
        match &self.content {
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::ToolUse { id, name, input } => {
                        Some((id.as_str(), name.as_str(), input))
                    }
                    _ => None,
                })
                .collect(),
            MessageContent::Text(_) => Vec::new(),
        }
    }

    pub fn has_tool_uses(&self) -> bool {
        !self.tool_uses().is_empty()
    }
}

impl ContentBlock {
    /// Successful tool output
    pub fn tool_result(tool_use_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    /// Failed tool output, reported to the model instead of aborting the loop
    pub fn tool_error(tool_use_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: error.into(),
            is_error: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_messages() {
        let msg = Message::user("Analyze AAPL");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.text(), "Analyze AAPL");
        assert!(!msg.has_tool_uses());
    }

    #[test]
    fn test_tool_uses_extracted_from_blocks() {
        let msg = Message::assistant_blocks(vec![
            ContentBlock::Text {
                text: "Let me look that up.".into(),
            },
            ContentBlock::ToolUse {
                id: "call_1".into(),
                name: "news_search".into(),
                input: json!({"query": "AAPL"}),
            },
        ]);

        let uses = msg.tool_uses();
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].1, "news_search");
        assert_eq!(msg.text(), "Let me look that up.");
    }

    #[test]
    fn test_tool_result_serialization() {
        let ok = serde_json::to_value(ContentBlock::tool_result("call_1", "done")).unwrap();
        assert_eq!(
            ok,
            json!({"type": "tool_result", "tool_use_id": "call_1", "content": "done"})
        );

        let err = serde_json::to_value(ContentBlock::tool_error("call_2", "boom")).unwrap();
        assert_eq!(err["is_error"], json!(true));
    }
}
