use anyhow::Result;

use crate::llm_config::LLMProviderConfig;
use crate::traits::InferenceRequest;

/// HTTP client for the configured LLM provider
pub struct LLMServiceClient {
    config: LLMProviderConfig,
    http_client: reqwest::Client,
}

impl LLMServiceClient {
    pub fn new(config: LLMProviderConfig) -> Result<Self> {
        config.validate()?;

        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(std::time::Duration::from_secs(secs));
        }

        Ok(Self {
            config,
            http_client: builder.build()?,
        })
    }

    pub fn config(&self) -> &LLMProviderConfig {
        &self.config
    }

    /// Send one prompt and return the completion text
    pub async fn complete(&self, request: &InferenceRequest) -> Result<String> {
        match self.config.provider.as_str() {
            "ollama" => self.call_ollama(request).await,
            "openai" => self.call_openai(request).await,
            "anthropic" => self.call_anthropic(request).await,
            _ => anyhow::bail!("Unsupported provider: {}", self.config.provider),
        }
    }

    fn chat_messages(request: &InferenceRequest) -> Vec<serde_json::Value> {
        let mut messages = Vec::new();
        if let Some(system) = &request.system {
            messages.push(serde_json::json!({ "role": "system", "content": system }));
        }
        messages.push(serde_json::json!({ "role": "user", "content": request.prompt }));
        messages
    }

    async fn call_ollama(&self, request: &InferenceRequest) -> Result<String> {
        let endpoint = self
            .config
            .endpoint
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Ollama endpoint not configured"))?;

        // `structured` is not sent as `format: json`; callers parse the text.
        let request_body = serde_json::json!({
            "model": self.config.model,
            "messages": Self::chat_messages(request),
            "stream": false,
            "options": {
                "temperature": self.config.temperature,
                "top_p": self.config.top_p,
            }
        });

        let response = self
            .http_client
            .post(format!("{}/api/chat", endpoint.trim_end_matches('/')))
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        let response_json: serde_json::Value = response.json().await?;

        if !status.is_success() {
            anyhow::bail!("Ollama API error ({}): {}", status, response_json);
        }

        response_json
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("No response from Ollama"))
    }

    async fn call_openai(&self, request: &InferenceRequest) -> Result<String> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("OpenAI API key not configured"))?;

        let url = self
            .config
            .endpoint
            .as_deref()
            .map(|e| format!("{}/v1/chat/completions", e.trim_end_matches('/')))
            .unwrap_or_else(|| "https://api.openai.com/v1/chat/completions".to_string());

        let request_body = serde_json::json!({
            "model": self.config.model,
            "messages": Self::chat_messages(request),
            "temperature": self.config.temperature,
            "top_p": self.config.top_p,
            "max_tokens": 1000
        });

        let response = self
            .http_client
            .post(url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        let response_json: serde_json::Value = response.json().await?;

        if !status.is_success() {
            anyhow::bail!("OpenAI API error: {}", response_json);
        }

        response_json
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("No response from OpenAI"))
    }

    async fn call_anthropic(&self, request: &InferenceRequest) -> Result<String> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Anthropic API key not configured"))?;

        let mut request_body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": 1000,
            "temperature": self.config.temperature,
            "messages": [
                {
                    "role": "user",
                    "content": request.prompt
                }
            ]
        });
        if let Some(system) = &request.system {
            request_body["system"] = serde_json::Value::String(system.clone());
        }

        let response = self
            .http_client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        let response_json: serde_json::Value = response.json().await?;

        if !status.is_success() {
            anyhow::bail!("Anthropic API error: {}", response_json);
        }

        response_json
            .get("content")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("text"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("No response from Anthropic"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_messages_with_system() {
        let request = InferenceRequest::free_text("hello").with_system("be brief");
        let messages = LLMServiceClient::chat_messages(&request);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["content"], "hello");
    }

    #[test]
    fn test_client_rejects_invalid_config() {
        let config = LLMProviderConfig {
            provider: "nope".to_string(),
            ..Default::default()
        };
        assert!(LLMServiceClient::new(config).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_an_error() {
        let config = LLMProviderConfig {
            endpoint: Some("http://127.0.0.1:1".to_string()),
            timeout_secs: Some(2),
            ..Default::default()
        };
        let client = LLMServiceClient::new(config).unwrap();
        let result = client.complete(&InferenceRequest::structured("hi")).await;
        assert!(result.is_err());
    }
}
