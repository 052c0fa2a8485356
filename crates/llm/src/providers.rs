//! Provider adapters.
//!
//! All four speak JSON over HTTP via `reqwest`. The xAI and OpenAI adapters
//! share the OpenAI chat-completions wire shape; Anthropic moves system
//! content into a dedicated top-level slot; Ollama is the local,
//! key-free provider used for classification.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::LlmError;
use crate::message::{ChatMessage, ChatOptions, ChatRole};
use crate::provider::{ChatResponse, Provider};

const CLOUD_TIMEOUT_SECS: u64 = 120;
const LOCAL_TIMEOUT_SECS: u64 = 300;

fn map_transport(err: reqwest::Error, timeout_secs: u64) -> LlmError {
    if err.is_timeout() {
        LlmError::Timeout { secs: timeout_secs }
    } else {
        LlmError::Transport(err.to_string())
    }
}

/// Parse `Retry-After` (seconds form) from a 429 response.
fn retry_after_secs(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}

/// Turn a non-success response into a typed error, digging the message out
/// of the JSON body when present.
async fn status_error(response: reqwest::Response) -> LlmError {
    let status = response.status();
    if status.as_u16() == 429 {
        let retry_after = retry_after_secs(&response);
        return LlmError::RateLimited { retry_after };
    }
    let message = match response.json::<Value>().await {
        Ok(body) => body
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
            .map(ToString::to_string)
            .unwrap_or_else(|| body.to_string()),
        Err(_) => status.to_string(),
    };
    LlmError::Upstream {
        status: status.as_u16(),
        message,
    }
}

fn messages_to_openai(messages: &[ChatMessage]) -> Vec<Value> {
    messages
        .iter()
        .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
        .collect()
}

/// Shared call path for the OpenAI-compatible chat-completions shape.
async fn openai_compat_chat(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    messages: &[ChatMessage],
    model: &str,
    options: &ChatOptions,
) -> Result<ChatResponse, LlmError> {
    let mut payload = json!({
        "model": model,
        "messages": messages_to_openai(messages),
    });
    if let Some(temperature) = options.temperature {
        payload["temperature"] = json!(temperature);
    }
    if let Some(max_tokens) = options.max_tokens {
        payload["max_tokens"] = json!(max_tokens);
    }

    let timeout_secs = options.timeout_secs.unwrap_or(CLOUD_TIMEOUT_SECS);
    let response = client
        .post(url)
        .bearer_auth(api_key)
        .timeout(Duration::from_secs(timeout_secs))
        .json(&payload)
        .send()
        .await
        .map_err(|e| map_transport(e, timeout_secs))?;

    if !response.status().is_success() {
        return Err(status_error(response).await);
    }

    let body: Value = response
        .json()
        .await
        .map_err(|e| LlmError::Parse(e.to_string()))?;

    let text = body
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(|content| content.as_str())
        .ok_or_else(|| LlmError::Parse("response has no choices".to_string()))?
        .to_string();

    let tokens_used = body
        .get("usage")
        .and_then(|u| u.get("total_tokens"))
        .and_then(|t| t.as_u64())
        .unwrap_or(0) as u32;

    Ok(ChatResponse { text, tokens_used })
}

// ── xAI ───────────────────────────────────────────────────────────────────────

/// xAI (Grok). Preferred for the researcher and writer roles.
#[derive(Debug, Clone)]
pub struct XaiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl XaiProvider {
    pub const DEFAULT_MODEL: &'static str = "grok-4-fast-reasoning";

    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: if base_url.is_empty() {
                "https://api.x.ai/v1".to_string()
            } else {
                base_url
            },
        }
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Provider for XaiProvider {
    fn name(&self) -> &'static str {
        "xai"
    }

    fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    fn default_model(&self) -> &str {
        Self::DEFAULT_MODEL
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        model: &str,
        options: &ChatOptions,
    ) -> Result<ChatResponse, LlmError> {
        openai_compat_chat(
            &self.client,
            &self.chat_url(),
            &self.api_key,
            messages,
            model,
            options,
        )
        .await
    }

    async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        list_openai_compat_models(&self.client, &self.base_url, &self.api_key).await
    }
}

// ── Anthropic ─────────────────────────────────────────────────────────────────

/// Anthropic (Claude). Preferred for the engineer, archivist, and planner
/// roles.
///
/// The messages API differs from the OpenAI shape: system content goes in a
/// top-level `system` parameter (multiple system messages are concatenated),
/// the messages array carries only user/assistant turns, and the response
/// content is a list of blocks.
#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicProvider {
    pub const DEFAULT_MODEL: &'static str = "claude-sonnet-4-5-20250929";
    const API_VERSION: &'static str = "2023-06-01";
    const DEFAULT_MAX_TOKENS: u32 = 4096;

    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: if base_url.is_empty() {
                "https://api.anthropic.com".to_string()
            } else {
                base_url
            },
        }
    }

    /// Split role-tagged messages into (system slot, user/assistant turns).
    fn split_system(messages: &[ChatMessage]) -> (Option<String>, Vec<Value>) {
        let mut system: Option<String> = None;
        let mut turns = Vec::new();

        for message in messages {
            match message.role {
                ChatRole::System => match system.as_mut() {
                    Some(existing) => {
                        existing.push_str("\n\n");
                        existing.push_str(&message.content);
                    }
                    None => system = Some(message.content.clone()),
                },
                ChatRole::User | ChatRole::Assistant => {
                    turns.push(json!({
                        "role": message.role.as_str(),
                        "content": message.content,
                    }));
                }
            }
        }

        (system, turns)
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    fn default_model(&self) -> &str {
        Self::DEFAULT_MODEL
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        model: &str,
        options: &ChatOptions,
    ) -> Result<ChatResponse, LlmError> {
        let (system, turns) = Self::split_system(messages);

        let mut payload = json!({
            "model": model,
            "messages": turns,
            "max_tokens": options.max_tokens.unwrap_or(Self::DEFAULT_MAX_TOKENS),
        });
        if let Some(system) = system {
            payload["system"] = json!(system);
        }
        if let Some(temperature) = options.temperature {
            payload["temperature"] = json!(temperature);
        }

        let timeout_secs = options.timeout_secs.unwrap_or(CLOUD_TIMEOUT_SECS);
        let response = self
            .client
            .post(format!(
                "{}/v1/messages",
                self.base_url.trim_end_matches('/')
            ))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", Self::API_VERSION)
            .timeout(Duration::from_secs(timeout_secs))
            .json(&payload)
            .send()
            .await
            .map_err(|e| map_transport(e, timeout_secs))?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        let blocks = body
            .get("content")
            .and_then(|c| c.as_array())
            .ok_or_else(|| LlmError::Parse("response has no content blocks".to_string()))?;

        let text: String = blocks
            .iter()
            .filter(|block| block.get("type").and_then(|t| t.as_str()) == Some("text"))
            .filter_map(|block| block.get("text").and_then(|t| t.as_str()))
            .collect();

        let usage = body.get("usage");
        let tokens_used = usage
            .and_then(|u| u.get("input_tokens"))
            .and_then(|t| t.as_u64())
            .unwrap_or(0)
            + usage
                .and_then(|u| u.get("output_tokens"))
                .and_then(|t| t.as_u64())
                .unwrap_or(0);

        Ok(ChatResponse {
            text,
            tokens_used: tokens_used as u32,
        })
    }

    async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        // The messages API has no cheap model listing; report the default.
        Ok(vec![Self::DEFAULT_MODEL.to_string()])
    }
}

// ── OpenAI ────────────────────────────────────────────────────────────────────

/// OpenAI. Retained as the last cloud fallback.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiProvider {
    pub const DEFAULT_MODEL: &'static str = "gpt-4.1-mini";

    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: if base_url.is_empty() {
                "https://api.openai.com/v1".to_string()
            } else {
                base_url
            },
        }
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    fn default_model(&self) -> &str {
        Self::DEFAULT_MODEL
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        model: &str,
        options: &ChatOptions,
    ) -> Result<ChatResponse, LlmError> {
        openai_compat_chat(
            &self.client,
            &format!(
                "{}/chat/completions",
                self.base_url.trim_end_matches('/')
            ),
            &self.api_key,
            messages,
            model,
            options,
        )
        .await
    }

    async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        list_openai_compat_models(&self.client, &self.base_url, &self.api_key).await
    }
}

async fn list_openai_compat_models(
    client: &reqwest::Client,
    base_url: &str,
    api_key: &str,
) -> Result<Vec<String>, LlmError> {
    let response = client
        .get(format!("{}/models", base_url.trim_end_matches('/')))
        .bearer_auth(api_key)
        .timeout(Duration::from_secs(6))
        .send()
        .await
        .map_err(|e| map_transport(e, 6))?;

    if !response.status().is_success() {
        return Err(status_error(response).await);
    }

    let body: Value = response
        .json()
        .await
        .map_err(|e| LlmError::Parse(e.to_string()))?;

    let mut models: Vec<String> = body
        .get("data")
        .and_then(|d| d.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("id").and_then(|id| id.as_str()))
                .map(ToString::to_string)
                .collect()
        })
        .unwrap_or_default();
    models.sort();
    models.dedup();
    Ok(models)
}

// ── Ollama ────────────────────────────────────────────────────────────────────

/// Ollama. Local, key-free; used for classification and as the zero-cost
/// fallback. Slow CPU inference gets the long timeout.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    default_model: String,
}

impl OllamaProvider {
    pub fn new(base_url: impl Into<String>, default_model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            default_model: default_model.into(),
        }
    }

    /// Probe the local daemon. Cheap enough to call per turn when needed.
    pub async fn is_available(&self) -> bool {
        self.client
            .get(format!("{}/api/tags", self.base_url.trim_end_matches('/')))
            .timeout(Duration::from_secs(2))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &'static str {
        "ollama"
    }

    fn is_configured(&self) -> bool {
        !self.base_url.trim().is_empty()
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        model: &str,
        options: &ChatOptions,
    ) -> Result<ChatResponse, LlmError> {
        let mut payload = json!({
            "model": model,
            "messages": messages_to_openai(messages),
            "stream": false,
        });
        if let Some(temperature) = options.temperature {
            payload["options"] = json!({ "temperature": temperature });
        }

        let timeout_secs = options.timeout_secs.unwrap_or(LOCAL_TIMEOUT_SECS);
        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url.trim_end_matches('/')))
            .timeout(Duration::from_secs(timeout_secs))
            .json(&payload)
            .send()
            .await
            .map_err(|e| map_transport(e, timeout_secs))?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        let text = body
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .ok_or_else(|| LlmError::Parse("response has no message content".to_string()))?
            .to_string();

        let tokens_used = body
            .get("prompt_eval_count")
            .and_then(|t| t.as_u64())
            .unwrap_or(0)
            + body.get("eval_count").and_then(|t| t.as_u64()).unwrap_or(0);

        Ok(ChatResponse {
            text,
            tokens_used: tokens_used as u32,
        })
    }

    async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url.trim_end_matches('/')))
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| map_transport(e, 5))?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        let mut models: Vec<String> = body
            .get("models")
            .and_then(|m| m.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.get("name").and_then(|n| n.as_str()))
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default();
        models.sort();
        models.dedup();
        Ok(models)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ChatMessage;

    #[test]
    fn anthropic_concatenates_multiple_system_messages() {
        let messages = vec![
            ChatMessage::system("first directive"),
            ChatMessage::user("hello"),
            ChatMessage::system("second directive"),
            ChatMessage::assistant("hi"),
        ];

        let (system, turns) = AnthropicProvider::split_system(&messages);
        assert_eq!(
            system.as_deref(),
            Some("first directive\n\nsecond directive")
        );
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0]["role"], "user");
        assert_eq!(turns[1]["role"], "assistant");
    }

    #[test]
    fn unconfigured_providers_report_it() {
        assert!(!XaiProvider::new("", "").is_configured());
        assert!(!AnthropicProvider::new("  ", "").is_configured());
        assert!(XaiProvider::new("key", "").is_configured());
        assert!(OllamaProvider::new("http://localhost:11434", "llama3.1:8b").is_configured());
    }
}
