//! LLM provider trait definition

use crate::{CompletionRequest, CompletionResponse, Result};
use async_trait::async_trait;

/// A chat model reachable over some API
///
/// The agent loop only needs one operation: send the conversation so far,
/// get the next assistant turn back.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate the next assistant turn
    ///
    /// # Arguments
    ///
    /// * `request` - The conversation, tools, and sampling parameters
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Provider name (e.g. "openai")
    fn name(&self) -> &str;
}

/// One tool-free turn: prompt in, text out
///
/// The request's system prompt plays the role context. Truncated, filtered
/// or empty answers are errors.
pub async fn complete_text(provider: &dyn LLMProvider, request: CompletionRequest) -> Result<String> {
    let response = provider.complete(request).await?;
    response.final_text()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Message, StopReason, TokenUsage};

    fn reply(text: &str, stop_reason: StopReason) -> CompletionResponse {
        CompletionResponse {
            message: Message::assistant(text),
            stop_reason,
            usage: TokenUsage::default(),
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest::builder("gpt-3.5-turbo")
            .system("You are a stock analyst")
            .add_message(Message::user("How is AAPL doing?"))
            .build()
    }

    #[tokio::test]
    async fn test_complete_text() {
        let mut mock = MockLLMProvider::new();
        mock.expect_complete()
            .withf(|req| req.system.as_deref() == Some("You are a stock analyst"))
            .times(1)
            .returning(|_| Ok(reply("AAPL, price UP", StopReason::EndTurn)));

        let text = complete_text(&mock, request()).await.unwrap();
        assert_eq!(text, "AAPL, price UP");
    }

    #[tokio::test]
    async fn test_complete_text_rejects_unusable_answers() {
        for (text, stop) in [("   ", StopReason::EndTurn), ("AAPL is", StopReason::MaxTokens)] {
            let mut mock = MockLLMProvider::new();
            mock.expect_complete()
                .times(1)
                .returning(move |_| Ok(reply(text, stop)));
            assert!(complete_text(&mock, request()).await.is_err());
        }
    }
}
