//! OpenAI chat completions client with function tools

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::model::{
    ChatMessage, ChatModel, ChatRequest, ChatResponse, ModelProvider, Role, TokenUsage, ToolCall,
};
use crate::config::ModelsConfig;
use crate::{Error, Result};

/// Opens OpenAI-compatible chat connections
#[derive(Clone)]
pub struct OpenAiProvider {
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl OpenAiProvider {
    /// Create a provider for the given key and endpoint settings
    pub fn new(api_key: impl Into<String>, config: &ModelsConfig) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: config.timeout,
        }
    }
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ModelProvider for OpenAiProvider {
    fn open(&self, model: &str) -> Result<Box<dyn ChatModel>> {
        if self.api_key.is_empty() {
            return Err(Error::Credentials("OPENAI_API_KEY is not set".to_string()));
        }

        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| Error::Model(format!("Failed to create HTTP client: {}", e)))?;

        debug!(model, "Opened model connection");

        Ok(Box::new(OpenAiChat {
            client,
            api_key: self.api_key.clone(),
            url: format!("{}/chat/completions", self.base_url),
            model: model.to_string(),
        }))
    }
}

/// One open connection to a chat completions endpoint
struct OpenAiChat {
    client: Client,
    api_key: String,
    url: String,
    model: String,
}

impl Drop for OpenAiChat {
    fn drop(&mut self) {
        debug!(model = %self.model, "Closed model connection");
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let body = request_body(&self.model, request);

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Model(format!("Request to {} failed: {}", self.url, e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Model(format!("Failed to read response: {}", e)))?;

        if status.as_u16() == 401 {
            return Err(Error::Credentials(format!(
                "Model API rejected the key ({}): {}",
                status,
                truncate(&text, 200)
            )));
        }
        if !status.is_success() {
            return Err(Error::Model(format!(
                "Model API error ({}): {}",
                status,
                truncate(&text, 500)
            )));
        }

        let response = parse_response(&text)?;
        if let Some(usage) = response.usage {
            info!(
                model = %self.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                tool_calls = response.tool_calls.len(),
                "Model turn complete"
            );
        }
        Ok(response)
    }
}

/// Build the wire request body
fn request_body(model: &str, request: &ChatRequest) -> Value {
    let messages: Vec<Value> = request.messages.iter().map(wire_message).collect();

    let mut body = json!({
        "model": model,
        "messages": messages,
    });

    if !request.tools.is_empty() {
        let tools: Vec<Value> = request
            .tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect();
        body["tools"] = json!(tools);
        body["tool_choice"] = json!("auto");
        body["parallel_tool_calls"] = json!(false);
    }

    body
}

fn wire_message(message: &ChatMessage) -> Value {
    let role = match message.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    };

    let mut msg = json!({ "role": role, "content": message.content });

    if let Some(ref id) = message.tool_call_id {
        msg["tool_call_id"] = json!(id);
    }

    if !message.tool_calls.is_empty() {
        if message.content.is_empty() {
            msg["content"] = Value::Null;
        }
        msg["tool_calls"] = json!(message
            .tool_calls
            .iter()
            .map(|tc| {
                json!({
                    "id": tc.id,
                    "type": "function",
                    "function": { "name": tc.name, "arguments": tc.arguments }
                })
            })
            .collect::<Vec<_>>());
    }

    msg
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// Parse a chat completions response body
fn parse_response(text: &str) -> Result<ChatResponse> {
    let wire: WireResponse = serde_json::from_str(text)
        .map_err(|e| Error::Model(format!("Failed to parse model response: {}", e)))?;

    let choice = wire
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| Error::Model("No choices in model response".to_string()))?;

    Ok(ChatResponse {
        content: choice.message.content.unwrap_or_default(),
        tool_calls: choice
            .message
            .tool_calls
            .into_iter()
            .map(|tc| ToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments: tc.function.arguments,
            })
            .collect(),
        finish_reason: choice.finish_reason,
        usage: wire.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
        }),
    })
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
