use serde::{Deserialize, Serialize};

/// Providers the HTTP client knows how to talk to
pub const SUPPORTED_PROVIDERS: [&str; 3] = ["ollama", "openai", "anthropic"];

/// Configuration for the LLM provider used for classification and reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMProviderConfig {
    pub provider: String, // "ollama", "openai", "anthropic"
    pub model: String,
    pub api_key: Option<String>,
    pub endpoint: Option<String>, // For Ollama or custom endpoints
    pub timeout_secs: Option<u64>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
}

fn default_temperature() -> f32 {
    0.1
}

fn default_top_p() -> f32 {
    0.9
}

impl Default for LLMProviderConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "qwen2.5:3b".to_string(),
            api_key: None,
            endpoint: Some("http://localhost:11434".to_string()),
            timeout_secs: None,
            temperature: default_temperature(),
            top_p: default_top_p(),
        }
    }
}

impl LLMProviderConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        // A JSON config file takes precedence over individual variables
        if let Ok(config_path) = std::env::var("LLM_CONFIG_FILE") {
            match std::fs::read_to_string(&config_path) {
                Ok(config_str) => match serde_json::from_str(&config_str) {
                    Ok(config) => return config,
                    Err(e) => tracing::warn!("Ignoring {}: {}", config_path, e),
                },
                Err(e) => tracing::warn!("Cannot read {}: {}", config_path, e),
            }
        }

        let defaults = Self::default();
        let env_parse = |name: &str| std::env::var(name).ok().and_then(|v| v.trim().parse().ok());
        let provider = std::env::var("LLM_PROVIDER").unwrap_or(defaults.provider);

        // Only Ollama gets a default endpoint; hosted providers use their
        // public API unless an override is given.
        let endpoint = std::env::var("LLM_ENDPOINT")
            .or_else(|_| std::env::var("OLLAMA_ENDPOINT"))
            .ok()
            .or_else(|| defaults.endpoint.filter(|_| provider == "ollama"));

        Self {
            model: std::env::var("LLM_MODEL").unwrap_or(defaults.model),
            api_key: std::env::var("LLM_API_KEY").ok(),
            endpoint,
            provider,
            timeout_secs: env_parse("LLM_TIMEOUT_SECS").map(|v: f64| v as u64),
            temperature: env_parse("LLM_TEMPERATURE")
                .map(|v: f64| v as f32)
                .unwrap_or(defaults.temperature),
            top_p: env_parse("LLM_TOP_P")
                .map(|v: f64| v as f32)
                .unwrap_or(defaults.top_p),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if !SUPPORTED_PROVIDERS.contains(&self.provider.as_str()) {
            anyhow::bail!(
                "Unsupported provider '{}' (expected one of {:?})",
                self.provider,
                SUPPORTED_PROVIDERS
            );
        }

        if self.model.trim().is_empty() {
            anyhow::bail!("LLM model name must not be empty");
        }

        match self.provider.as_str() {
            "ollama" if self.endpoint.is_none() => {
                anyhow::bail!("Ollama provider requires an endpoint")
            }
            "openai" | "anthropic" if self.api_key.is_none() => {
                anyhow::bail!("{} provider requires LLM_API_KEY", self.provider)
            }
            _ => {}
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            anyhow::bail!("temperature {} is outside 0.0..=2.0", self.temperature);
        }

        Ok(())
    }

    pub fn log_config(&self) {
        tracing::info!("🤖 LLM Provider: {}", self.provider);
        tracing::info!("   Model: {}", self.model);
        if let Some(ref endpoint) = self.endpoint {
            tracing::info!("   Endpoint: {}", endpoint);
        }
        if let Some(ref key) = self.api_key {
            tracing::info!("   API Key: {}***", key.chars().take(4).collect::<String>());
        }
        tracing::info!(
            "   Sampling: temperature={} top_p={}",
            self.temperature,
            self.top_p
        );
    }
}
