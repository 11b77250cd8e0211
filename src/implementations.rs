use crate::llm_config::LLMProviderConfig;
use crate::llm_service::LLMServiceClient;
use crate::log_parser::LogParser;
use crate::log_record::{LineId, LogRecord};
use crate::traits::{InferenceRequest, InferenceService, LogSource};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// [`InferenceService`] backed by the HTTP LLM client
pub struct LLMInferenceService {
    client: LLMServiceClient,
    name: String,
}

impl LLMInferenceService {
    pub fn new(config: LLMProviderConfig) -> Result<Self> {
        let name = format!("{}/{}", config.provider, config.model);
        Ok(Self {
            client: LLMServiceClient::new(config)?,
            name,
        })
    }

    pub fn ollama(model: &str) -> Result<Self> {
        Self::new(LLMProviderConfig {
            model: model.to_string(),
            ..Default::default()
        })
    }
}

#[async_trait]
impl InferenceService for LLMInferenceService {
    async fn infer(&self, request: &InferenceRequest) -> Result<String> {
        let completion = self.client.complete(request).await?;
        tracing::debug!("{} completion: {}", self.name, completion);
        Ok(completion)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

type Responder = dyn Fn(&InferenceRequest) -> Result<String> + Send + Sync;

/// Deterministic service answering from a closure; records every request
pub struct ScriptedInference {
    responder: Box<Responder>,
    calls: AtomicUsize,
    requests: Mutex<Vec<InferenceRequest>>,
}

impl ScriptedInference {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&InferenceRequest) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always answer with the same text
    pub fn fixed(reply: &str) -> Self {
        let reply = reply.to_string();
        Self::new(move |_| Ok(reply.clone()))
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<InferenceRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl InferenceService for ScriptedInference {
    async fn infer(&self, request: &InferenceRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        (self.responder)(request)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Service whose every call fails at the transport level
#[derive(Debug, Default)]
pub struct UnavailableInference;

#[async_trait]
impl InferenceService for UnavailableInference {
    async fn infer(&self, _request: &InferenceRequest) -> Result<String> {
        anyhow::bail!("inference service unavailable")
    }

    fn name(&self) -> &str {
        "unavailable"
    }
}

/// In-memory dataset for testing
pub struct InMemoryDataset {
    name: String,
    records: Vec<LogRecord>,
}

impl InMemoryDataset {
    pub fn new(name: &str, records: Vec<LogRecord>) -> Self {
        Self {
            name: name.to_string(),
            records,
        }
    }

    /// Parse raw lines the way a `.log` file would be parsed
    pub fn from_lines(name: &str, lines: &[&str]) -> Self {
        let records = lines
            .iter()
            .filter(|line| !line.trim().is_empty())
            .enumerate()
            .map(|(idx, line)| LogParser::parse(line, LineId::from_ordinal(idx + 1)))
            .collect();
        Self::new(name, records)
    }
}

impl LogSource for InMemoryDataset {
    fn load_records(&self) -> Result<Vec<LogRecord>> {
        Ok(self.records.clone())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
