use std::time::Duration;

use fw_core::error::AppError;
use serde::{Deserialize, Serialize};

use super::{ChatPrompt, Llm};
use crate::hosted::{upstream_error, ServiceEndpoint};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI chat-completions client (or any endpoint speaking that protocol).
#[derive(Debug, Clone)]
pub struct OpenAiLlm {
    endpoint: ServiceEndpoint,
    timeout: Duration,
}

impl OpenAiLlm {
    /// The endpoint must carry an API key.
    pub fn new(endpoint: ServiceEndpoint) -> Result<Self, AppError> {
        if endpoint.api_key().is_none() {
            return Err(AppError::new("CONFIG_API_KEY_MISSING", "OPENAI_API_KEY is not set"));
        }
        Ok(Self {
            endpoint,
            timeout: Duration::from_secs(60),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

impl Llm for OpenAiLlm {
    fn generate(&self, model: &str, prompt: ChatPrompt<'_>) -> Result<String, AppError> {
        let url = self.endpoint.url("chat/completions");
        let req = ChatRequest {
            model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt.user,
                },
            ],
        };

        let resp = self
            .endpoint
            .bearer(ureq::post(&url).timeout(self.timeout))
            .send_json(&req)
            .map_err(|e| upstream_error("LLM_REQUEST_FAILED", "Failed to call chat completions", &url, e))?;

        let parsed: ChatResponse = resp.into_json().map_err(|e| {
            AppError::new("LLM_REQUEST_FAILED", "Failed to decode chat completion")
                .with_details(e.to_string())
        })?;

        let text = parsed
            .choices
            .into_iter()
            .find_map(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        if text.is_empty() {
            return Err(AppError::new("LLM_EMPTY_RESPONSE", "Language model returned no text"));
        }
        Ok(text)
    }
}
