//! Completion backends for answer generation.
//!
//! `OpenAiCompletion` talks to a chat-completions endpoint;
//! `TemplateCompletion` renders the prompt context directly and keeps the
//! whole pipeline runnable offline. The `Completion` enum lets callers
//! pick a backend at startup without trait objects.

use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Standing instruction sent as the system message on every call.
const SYSTEM_PREAMBLE: &str =
    "Bạn là một hướng dẫn viên du lịch chuyên nghiệp, luôn trả lời chi tiết và thân thiện.";
const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 500;

/// Single-turn text generation. No streaming, no tool use.
pub trait CompletionService: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

#[derive(Clone)]
pub struct OpenAiCompletion {
    api_url: String,
    api_key: String,
    model: String,
    client: Client,
}

impl OpenAiCompletion {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            client: Client::new(),
        }
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

impl CompletionService for OpenAiCompletion {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PREAMBLE.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<ChatResponse>()
            .await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("completion response had no choices"))?;

        // The model decorates answers with markdown bold markers.
        Ok(content.replace('*', ""))
    }
}

/// Deterministic backend that echoes the prompt's context block. Used
/// when no API key is configured and throughout the test suite.
#[derive(Debug, Clone, Default)]
pub struct TemplateCompletion;

impl CompletionService for TemplateCompletion {
    async fn complete(&self, prompt: &str) -> Result<String> {
        Ok(prompt.replace('*', "").trim().to_string())
    }
}

/// Backend selection fixed at startup.
pub enum Completion {
    OpenAi(OpenAiCompletion),
    Template(TemplateCompletion),
}

impl Completion {
    pub fn backend_name(&self) -> &'static str {
        match self {
            Completion::OpenAi(_) => "openai",
            Completion::Template(_) => "template",
        }
    }
}

impl CompletionService for Completion {
    async fn complete(&self, prompt: &str) -> Result<String> {
        match self {
            Completion::OpenAi(inner) => inner.complete(prompt).await,
            Completion::Template(inner) => inner.complete(prompt).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn template_backend_strips_markdown_bold() {
        let rendered = TemplateCompletion
            .complete("Tour **Đà Nẵng** giá 3.000.000 Đồng")
            .await
            .unwrap();
        assert_eq!(rendered, "Tour Đà Nẵng giá 3.000.000 Đồng");
    }

    #[test]
    fn builders_override_defaults() {
        let client = OpenAiCompletion::new("key")
            .with_model("gpt-4o")
            .with_api_url("http://localhost:9999/v1/chat/completions");
        assert_eq!(client.model(), "gpt-4o");
    }
}
