//! LLM provider abstraction
//!
//! Provides:
//! - A chat-completion client trait with typed failures
//! - An OpenAI-compatible HTTP implementation with bounded timeout
//! - A scripted mock for tests
//! - Token estimation helpers (approximation, not a tokenizer)

use crate::config::LlmConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

/// Fraction of the context window reserved for the model's response
pub const RESPONSE_RESERVE: f32 = 0.25;

/// Message role in a chat completion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// A single chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Parameters for a completion call
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: usize,
    pub temperature: f32,
}

/// Trait for chat-completion providers
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a completion; failures are typed (timeout, quota,
    /// network all surface as [`AppError::Generation`])
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;

    /// Get the model name
    fn model_name(&self) -> &str;

    /// Model context window in tokens
    fn context_window(&self) -> usize;
}

/// Estimate token count for text (~4 characters per token for English)
pub fn estimate_tokens(text: &str) -> usize {
    text.len() / 4
}

/// Whether `text` fits the usable part of a context window, keeping
/// [`RESPONSE_RESERVE`] of it free for the response
pub fn fits_context(context_window: usize, text: &str) -> bool {
    let available = (context_window as f32 * (1.0 - RESPONSE_RESERVE)) as usize;
    estimate_tokens(text) <= available
}

/// Chat client for OpenAI-compatible `/chat/completions` endpoints
pub struct ChatCompletionsClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    context_window: usize,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: usize,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl ChatCompletionsClient {
    /// Create a new client from configuration
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| AppError::Configuration {
            message: "llm.api_key is required for the openai-compat provider".to_string(),
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            base_url: config
                .api_base
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            context_window: config.context_window,
        })
    }
}

#[async_trait]
impl LlmClient for ChatCompletionsClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = ChatRequest {
            model: self.model.clone(),
            messages: request.messages.clone(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Generation {
                message: if e.is_timeout() {
                    "LLM request timed out".to_string()
                } else {
                    format!("LLM request failed: {}", e)
                },
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Generation {
                message: format!("LLM API error {}: {}", status, body),
            });
        }

        let chat_response: ChatResponse =
            response.json().await.map_err(|e| AppError::Generation {
                message: format!("Failed to parse LLM response: {}", e),
            })?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AppError::Generation {
                message: "Empty response from LLM".to_string(),
            })
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn context_window(&self) -> usize {
        self.context_window
    }
}

/// Scripted mock LLM for tests
///
/// Replays queued replies in order, repeating the last one once the
/// queue is drained. `MockLlm::failing()` fails every call.
pub struct MockLlm {
    replies: Mutex<VecDeque<String>>,
    last: Mutex<String>,
    fail: bool,
    context_window: usize,
}

impl MockLlm {
    pub fn new(reply: impl Into<String>) -> Self {
        Self::with_replies(vec![reply.into()])
    }

    pub fn with_replies(replies: Vec<String>) -> Self {
        let last = replies.last().cloned().unwrap_or_default();
        Self {
            replies: Mutex::new(replies.into()),
            last: Mutex::new(last),
            fail: false,
            context_window: 8000,
        }
    }

    pub fn failing() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            last: Mutex::new(String::new()),
            fail: true,
            context_window: 8000,
        }
    }

    pub fn with_context_window(mut self, context_window: usize) -> Self {
        self.context_window = context_window;
        self
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
        if self.fail {
            return Err(AppError::Generation {
                message: "mock LLM configured to fail".to_string(),
            });
        }

        let mut replies = self.replies.lock().unwrap();
        match replies.pop_front() {
            Some(reply) => {
                *self.last.lock().unwrap() = reply.clone();
                Ok(reply)
            }
            None => Ok(self.last.lock().unwrap().clone()),
        }
    }

    fn model_name(&self) -> &str {
        "mock-llm"
    }

    fn context_window(&self) -> usize {
        self.context_window
    }
}

/// Create an LLM client based on configuration
pub fn create_llm(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    match config.provider.as_str() {
        "openai-compat" => Ok(Arc::new(ChatCompletionsClient::new(config)?)),
        "mock" => Ok(Arc::new(MockLlm::new("mock completion"))),
        other => Err(AppError::Configuration {
            message: format!("Unknown LLM provider: {}", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(content: &str) -> CompletionRequest {
        CompletionRequest {
            messages: vec![ChatMessage::user(content)],
            max_tokens: 64,
            temperature: 0.0,
        }
    }

    #[tokio::test]
    async fn test_mock_replay_order() {
        let llm = MockLlm::with_replies(vec!["first".to_string(), "second".to_string()]);
        assert_eq!(llm.complete(&request("a")).await.unwrap(), "first");
        assert_eq!(llm.complete(&request("b")).await.unwrap(), "second");
        // Drained queue repeats the last reply
        assert_eq!(llm.complete(&request("c")).await.unwrap(), "second");
    }

    #[tokio::test]
    async fn test_mock_failing() {
        let llm = MockLlm::failing();
        let err = llm.complete(&request("a")).await.unwrap_err();
        assert!(matches!(err, AppError::Generation { .. }));
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens("abcdefgh"), 2);
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn test_fits_context_reserves_response_room() {
        // 100-token window -> 75 usable tokens -> 300 chars
        assert!(fits_context(100, &"x".repeat(300)));
        assert!(!fits_context(100, &"x".repeat(304)));
    }

    #[test]
    fn test_message_role_serialization() {
        let msg = ChatMessage::system("hello");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"role\":\"system\""));
    }
}
