//! A concrete [`LlmClient`] backed by the OpenAI-compatible chat completions API.
//!
//! Bearer-auth `reqwest::Client`, a single POST to `/chat/completions`, and JSON
//! request/response shapes. No streaming, no Responses-API fallback, no multimodal
//! content — just what the three-method `LlmClient` contract needs.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::{json, Value};

use crate::llm::{GenerationStep, LlmClient, LlmError, TextGeneration, ToolDefinition};
use crate::sample::ConversationMessage;

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_base: String,
    pub api_key: String,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: api_key.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    api_base: String,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, LlmError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let bearer = format!("Bearer {}", config.api_key.trim());
        let auth_value = HeaderValue::from_str(&bearer)
            .map_err(|err| LlmError::Provider(format!("invalid API key: {err}")))?;
        headers.insert(AUTHORIZATION, auth_value);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|err| LlmError::Provider(err.to_string()))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    async fn post_chat_completions(&self, body: Value) -> Result<Value, LlmError> {
        let url = format!("{}/chat/completions", self.api_base);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|err| LlmError::Provider(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::Provider(format!("http {status}: {text}")));
        }

        response
            .json::<Value>()
            .await
            .map_err(|err| LlmError::Provider(format!("invalid response body: {err}")))
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn text_generate(
        &self,
        model_id: &str,
        system: &str,
        messages: &[ConversationMessage],
        tools: &[ToolDefinition],
    ) -> Result<TextGeneration, LlmError> {
        let mut wire_messages = Vec::new();
        if !system.is_empty() {
            wire_messages.push(json!({ "role": "system", "content": system }));
        }
        for message in messages {
            wire_messages.push(json!({
                "role": role_name(message.role),
                "content": message.text_content(),
            }));
        }

        let mut body = json!({
            "model": model_id,
            "messages": wire_messages,
        });
        if !tools.is_empty() {
            body["tools"] = json!(tools
                .iter()
                .map(|tool| json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    }
                }))
                .collect::<Vec<_>>());
        }

        let response = self.post_chat_completions(body).await?;
        let text = response["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();

        Ok(TextGeneration {
            steps: vec![GenerationStep {
                tool_calls: Vec::new(),
                text: Some(text.clone()),
            }],
            text,
        })
    }

    async fn structured_generate(
        &self,
        model_id: &str,
        prompt: &str,
        schema: &Value,
    ) -> Result<Value, LlmError> {
        request_json_object(self, model_id, prompt, schema).await
    }

    async fn object_generate(
        &self,
        model_id: &str,
        prompt: &str,
        schema: &Value,
    ) -> Result<Value, LlmError> {
        request_json_object(self, model_id, prompt, schema).await
    }
}

async fn request_json_object(
    client: &OpenAiClient,
    model_id: &str,
    prompt: &str,
    schema: &Value,
) -> Result<Value, LlmError> {
    let body = json!({
        "model": model_id,
        "messages": [{ "role": "user", "content": prompt }],
        "response_format": {
            "type": "json_schema",
            "json_schema": { "name": "structured_output", "schema": schema },
        },
    });

    let response = client.post_chat_completions(body).await?;
    let content = response["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| LlmError::SchemaViolation("response had no message content".to_string()))?;

    serde_json::from_str(content)
        .map_err(|err| LlmError::SchemaViolation(format!("invalid JSON in response: {err}")))
}

fn role_name(role: crate::sample::Role) -> &'static str {
    match role {
        crate::sample::Role::System => "system",
        crate::sample::Role::User => "user",
        crate::sample::Role::Assistant => "assistant",
        crate::sample::Role::Tool => "tool",
    }
}
