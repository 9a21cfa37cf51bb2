//! OpenAI-compatible chat completions provider

use async_trait::async_trait;
use reqwest::Client;
use services::services::config::OracleConfig;

use super::provider_trait::{
    ChatMessage, ChatRequest, MessageRole, OracleClient, ProviderError, ProviderType,
};

pub struct OpenAIProvider {
    client: Client,
    provider_type: ProviderType,
    api_key: Option<String>,
    endpoint: String,
}

impl OpenAIProvider {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        let endpoint = endpoint.into();
        Self {
            client: Client::new(),
            provider_type: ProviderType::from_endpoint(&endpoint),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            endpoint,
        }
    }

    pub fn from_config(config: &OracleConfig) -> Self {
        if config.is_configured() {
            tracing::info!(
                "Oracle provider initialized: {} ({})",
                ProviderType::from_endpoint(&config.endpoint),
                config.endpoint
            );
        } else {
            tracing::warn!("Oracle provider created without API key; LM fallback disabled");
        }
        Self::new(config.endpoint.clone(), config.api_key.clone())
    }

    fn message_to_openai(msg: &ChatMessage) -> serde_json::Value {
        let role = match msg.role {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        };
        serde_json::json!({ "role": role, "content": msg.content })
    }

    fn parse_response(json: &serde_json::Value) -> Result<String, ProviderError> {
        json["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.trim().to_string())
            .ok_or_else(|| ProviderError::ParseError("missing choices[0].message.content".to_string()))
    }
}

#[async_trait]
impl OracleClient for OpenAIProvider {
    fn provider_type(&self) -> ProviderType {
        self.provider_type
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn chat(&self, request: ChatRequest) -> Result<String, ProviderError> {
        let auth_header = self
            .api_key
            .as_ref()
            .map(|k| format!("Bearer {}", k))
            .ok_or_else(|| ProviderError::AuthError("No oracle API key configured".to_string()))?;

        let messages: Vec<serde_json::Value> =
            request.messages.iter().map(Self::message_to_openai).collect();
        let payload = serde_json::json!({
            "model": request.config.model,
            "temperature": request.config.temperature,
            "max_tokens": request.config.max_tokens,
            "messages": messages
        });

        tracing::debug!(
            "[ORACLE] Sending request: model={}, messages={}",
            request.config.model,
            messages.len()
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .header("Authorization", auth_header)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            if status.as_u16() == 429 {
                return Err(ProviderError::RateLimited);
            }
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;
        Self::parse_response(&json)
    }
}
