/// Dependency injection traits
///
/// This module provides trait-based abstractions for:
/// - Text inference (LLM services)
/// - Log sources (datasets on disk or in memory)
///
/// The classifier and the root-cause reporter only ever see these traits,
/// so tests can swap in deterministic stubs for a live model.
use crate::log_record::LogRecord;
use anyhow::Result;
use async_trait::async_trait;

// ============================================================================
// Inference Trait
// ============================================================================

/// One prompt sent to a text-completion service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceRequest {
    /// Optional system-role preamble
    pub system: Option<String>,
    /// The user-role prompt
    pub prompt: String,
    /// Whether the caller will try to parse the completion as JSON.
    ///
    /// This is a hint only; the reply is never assumed to be valid JSON.
    pub structured: bool,
}

impl InferenceRequest {
    pub fn structured(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            structured: true,
        }
    }

    pub fn free_text(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            structured: false,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// Trait for services that turn a prompt into a completion
///
/// Implementations can use:
/// - LLM APIs (Ollama, OpenAI, Anthropic)
/// - Canned responses for tests
#[async_trait]
pub trait InferenceService: Send + Sync {
    /// Send one prompt and return the raw completion text.
    ///
    /// Transport failures (unreachable service, non-2xx status, missing
    /// body) are errors; an empty completion is a valid `Ok`.
    async fn infer(&self, request: &InferenceRequest) -> Result<String>;

    /// Get the name/identifier of this service (for reporting)
    fn name(&self) -> &str;
}

// ============================================================================
// Log Source Trait
// ============================================================================

/// Trait for anything that yields parsed log records
///
/// Implementations can load from:
/// - LogHub raw logs or structured CSV
/// - In-memory test data
pub trait LogSource: Send + Sync {
    /// Load all records in source order
    fn load_records(&self) -> Result<Vec<LogRecord>>;

    /// Get the dataset name (for reporting)
    fn name(&self) -> &str;
}
