/// Classification orchestrator
///
/// Every record gets two independent inference calls: one for its semantic
/// class, one for its anomaly category. A call that fails in any way leaves
/// that axis at the taxonomy default; it never aborts the batch and never
/// affects the other axis.
use crate::log_record::{ClassifiedRecord, LineId, LogRecord, SourceKind};
use crate::prompts::Taxonomy;
use crate::tabular::{ensure_exists, Table};
use crate::traits::{InferenceRequest, InferenceService};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt;
use std::path::Path;

pub const SEMANTIC_CLASS_KEY: &str = "SemanticClass";
pub const EVENT_CATEGORY_KEY: &str = "EventCategory";

const PROGRESS_EVERY: usize = 50;

/// Why a classification call fell back to the default label
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    /// The service could not be reached or returned an error status
    Transport(String),
    /// The service answered with no text
    EmptyResponse,
    /// The text did not contain a parseable JSON object
    Parse(String),
    /// The JSON object had no usable value under the expected key
    MissingKey(&'static str),
    /// The value was not a label of the taxonomy
    UnknownLabel(String),
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::Transport(e) => write!(f, "transport error: {}", e),
            FallbackReason::EmptyResponse => f.write_str("empty response"),
            FallbackReason::Parse(e) => write!(f, "unparseable response: {}", e),
            FallbackReason::MissingKey(key) => write!(f, "response has no '{}'", key),
            FallbackReason::UnknownLabel(label) => write!(f, "unknown label '{}'", label),
        }
    }
}

/// Result of one classification call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelOutcome {
    Parsed(String),
    Fallback { label: String, reason: FallbackReason },
}

impl LabelOutcome {
    pub fn label(&self) -> &str {
        match self {
            LabelOutcome::Parsed(label) => label,
            LabelOutcome::Fallback { label, .. } => label,
        }
    }

    pub fn into_label(self) -> String {
        match self {
            LabelOutcome::Parsed(label) => label,
            LabelOutcome::Fallback { label, .. } => label,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, LabelOutcome::Fallback { .. })
    }
}

/// Slice of `text` from the first `{` to the last `}`, tolerating prose or
/// code fences around the object
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Read the string value under `key` from a completion
pub fn parse_label(completion: &str, key: &'static str) -> Result<String, FallbackReason> {
    if completion.trim().is_empty() {
        return Err(FallbackReason::EmptyResponse);
    }

    let json_str = extract_json_object(completion)
        .ok_or_else(|| FallbackReason::Parse("no JSON object found".to_string()))?;
    let json: serde_json::Value =
        serde_json::from_str(json_str).map_err(|e| FallbackReason::Parse(e.to_string()))?;
    let object = json
        .as_object()
        .ok_or_else(|| FallbackReason::Parse("not a JSON object".to_string()))?;

    // Exact key first, then any key that differs only by case/whitespace
    let value = object.get(key).or_else(|| {
        object
            .iter()
            .find(|(k, _)| k.trim().eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    });

    value
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or(FallbackReason::MissingKey(key))
}

/// Per-batch fallback counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassificationStats {
    pub records: usize,
    pub semantic_fallbacks: usize,
    pub event_fallbacks: usize,
    pub transport_failures: usize,
}

pub struct LogAnalyzer<'a> {
    service: &'a dyn InferenceService,
}

impl<'a> LogAnalyzer<'a> {
    pub fn new(service: &'a dyn InferenceService) -> Self {
        Self { service }
    }

    /// Classify every record in order
    pub async fn classify(&self, records: &[LogRecord], source: SourceKind) -> Vec<ClassifiedRecord> {
        self.classify_with_stats(records, source).await.0
    }

    pub async fn classify_with_stats(
        &self,
        records: &[LogRecord],
        source: SourceKind,
    ) -> (Vec<ClassifiedRecord>, ClassificationStats) {
        let taxonomy = Taxonomy::for_source(source);
        let mut stats = ClassificationStats::default();
        let mut results = Vec::with_capacity(records.len());

        tracing::info!(
            "Classifying {} {} log records with {}",
            records.len(),
            source,
            self.service.name()
        );

        for (idx, record) in records.iter().enumerate() {
            let (semantic, event) = self.classify_record(record, &taxonomy).await;

            stats.records += 1;
            for outcome in [&semantic, &event] {
                if let LabelOutcome::Fallback { reason, .. } = outcome {
                    if matches!(reason, FallbackReason::Transport(_)) {
                        stats.transport_failures += 1;
                    }
                }
            }
            stats.semantic_fallbacks += usize::from(semantic.is_fallback());
            stats.event_fallbacks += usize::from(event.is_fallback());

            results.push(ClassifiedRecord {
                record: record.clone(),
                semantic_class: semantic.into_label(),
                event_category: event.into_label(),
            });

            if (idx + 1) % PROGRESS_EVERY == 0 || idx + 1 == records.len() {
                tracing::info!("Classified {}/{} records", idx + 1, records.len());
            }
        }

        tracing::info!(
            "Classification finished: {} semantic and {} category fallbacks ({} transport failures)",
            stats.semantic_fallbacks,
            stats.event_fallbacks,
            stats.transport_failures
        );

        (results, stats)
    }

    /// Both classification calls for one record
    pub async fn classify_record(
        &self,
        record: &LogRecord,
        taxonomy: &Taxonomy,
    ) -> (LabelOutcome, LabelOutcome) {
        let semantic_prompt = taxonomy.semantic_prompt(&record.masked_content);
        let semantic = self
            .request_label(
                &record.line_id,
                &semantic_prompt,
                SEMANTIC_CLASS_KEY,
                taxonomy.default_semantic_class(),
                |label| taxonomy.canonical_semantic(label),
            )
            .await;

        let event_prompt = taxonomy.event_prompt(&record.masked_content);
        let event = self
            .request_label(
                &record.line_id,
                &event_prompt,
                EVENT_CATEGORY_KEY,
                taxonomy.default_event_category(),
                |label| taxonomy.canonical_event(label),
            )
            .await;

        (semantic, event)
    }

    async fn request_label(
        &self,
        line_id: &LineId,
        prompt: &str,
        key: &'static str,
        default: &str,
        canonical: impl Fn(&str) -> Option<&'static str>,
    ) -> LabelOutcome {
        let reply = self
            .service
            .infer(&InferenceRequest::structured(prompt))
            .await
            .map_err(|e| FallbackReason::Transport(e.to_string()));

        let label = reply.and_then(|text| parse_label(&text, key)).and_then(|label| {
            canonical(&label)
                .map(str::to_string)
                .ok_or(FallbackReason::UnknownLabel(label))
        });

        match label {
            Ok(label) => LabelOutcome::Parsed(label),
            Err(reason) => {
                tracing::warn!("Line {}: {} fell back to '{}': {}", line_id, key, default, reason);
                LabelOutcome::Fallback {
                    label: default.to_string(),
                    reason,
                }
            }
        }
    }
}

#[derive(Serialize)]
struct PredictionRow<'a> {
    #[serde(rename = "LineId")]
    line_id: &'a str,
    #[serde(rename = "Content")]
    content: &'a str,
    #[serde(rename = "SemanticClass")]
    semantic_class: &'a str,
    #[serde(rename = "EventCategory")]
    event_category: &'a str,
}

/// Persist the whole batch as one prediction table
pub fn write_predictions(path: &Path, records: &[ClassifiedRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for record in records {
        writer.serialize(PredictionRow {
            line_id: record.line_id().as_str(),
            content: record.content(),
            semantic_class: &record.semantic_class,
            event_category: &record.event_category,
        })?;
    }
    writer.flush()?;

    tracing::info!("Saved {} predictions to {}", records.len(), path.display());
    Ok(())
}

/// Read a prediction table written by [`write_predictions`]
pub fn read_predictions(path: &Path) -> Result<Vec<ClassifiedRecord>> {
    ensure_exists(path)?;
    let table = Table::read(path)?;

    let column = |name: &str| {
        table
            .column(&[name])
            .ok_or_else(|| anyhow::anyhow!("{} has no '{}' column", table.name(), name))
    };
    let id_col = column("LineId")?;
    let content_col = column("Content")?;
    let semantic_col = column(SEMANTIC_CLASS_KEY)?;
    let event_col = column(EVENT_CATEGORY_KEY)?;

    Ok(table
        .rows()
        .filter_map(|row| {
            let id = row.cell(id_col)?;
            Some(ClassifiedRecord {
                record: LogRecord::unknown(
                    LineId::from_cell(id),
                    row.cell(content_col).unwrap_or_default(),
                ),
                semantic_class: row.cell(semantic_col).unwrap_or_default().trim().to_string(),
                event_category: row.cell(event_col).unwrap_or_default().trim().to_string(),
            })
        })
        .collect())
}
