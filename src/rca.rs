/// Root-cause reports for lines classified as anomalous
use crate::log_record::{ClassifiedRecord, LineId, SourceKind};
use crate::prompts::{Taxonomy, OTHER_CATEGORY};
use crate::traits::{InferenceRequest, InferenceService};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::Path;

/// How many anomalies get an explanation per run
pub const DEFAULT_RCA_LIMIT: usize = 5;

const SYSTEM_PREAMBLE: &str =
    "You are a senior operations engineer who explains system log anomalies concisely.";

/// One analysed anomaly
#[derive(Debug, Clone, PartialEq)]
pub struct RcaSection {
    pub line_id: LineId,
    pub content: String,
    pub category: String,
    /// `None` when the explanation call returned nothing
    pub explanation: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RcaReport {
    pub source: SourceKind,
    pub generated_at: DateTime<Utc>,
    /// Anomalies found before the limit was applied
    pub anomaly_count: usize,
    pub sections: Vec<RcaSection>,
}

impl RcaReport {
    pub fn to_markdown(&self) -> String {
        let mut out = format!("# {} System Log Root Cause Analysis\n\n", self.source);
        out.push_str(&format!(
            "Generated {} | {} anomalies detected, {} analysed\n\n",
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
            self.anomaly_count,
            self.sections.len()
        ));

        for section in &self.sections {
            out.push_str(&format!("## Log ID: {}\n", section.line_id));
            out.push_str(&format!("**Log content**: `{}`\n", section.content));
            out.push_str(&format!("**Anomaly category**: {}\n", section.category));
            out.push_str("**Analysis**:\n");
            match &section.explanation {
                Some(text) => out.push_str(&format!("{}\n", text.trim())),
                None => out.push_str("_The analysis request did not return any content._\n"),
            }
            out.push_str("---\n");
        }
        out
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, self.to_markdown())
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
        tracing::info!("Root cause report saved to {}", path.display());
        Ok(())
    }
}

pub struct RootCauseAnalyzer<'a> {
    service: &'a dyn InferenceService,
    limit: usize,
}

impl<'a> RootCauseAnalyzer<'a> {
    pub fn new(service: &'a dyn InferenceService) -> Self {
        Self {
            service,
            limit: DEFAULT_RCA_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Explain the first anomalies in input order. Returns `None` when no
    /// record carries an anomaly category.
    pub async fn generate_report(
        &self,
        classified: &[ClassifiedRecord],
        source: SourceKind,
    ) -> Option<RcaReport> {
        let anomalies: Vec<&ClassifiedRecord> = classified
            .iter()
            .filter(|r| r.event_category.trim() != OTHER_CATEGORY)
            .collect();

        if anomalies.is_empty() {
            tracing::info!("No anomalies detected, nothing to report");
            return None;
        }

        tracing::info!(
            "Detected {} anomalies, analysing the first {}",
            anomalies.len(),
            self.limit.min(anomalies.len())
        );

        let taxonomy = Taxonomy::for_source(source);
        let mut sections = Vec::new();
        for record in anomalies.iter().take(self.limit) {
            let prompt = taxonomy.root_cause_prompt(record.content(), &record.event_category);
            let request = InferenceRequest::free_text(prompt).with_system(SYSTEM_PREAMBLE);

            let explanation = match self.service.infer(&request).await {
                Ok(text) if !text.trim().is_empty() => Some(text),
                Ok(_) => {
                    tracing::warn!("Empty analysis for line {}", record.line_id());
                    None
                }
                Err(e) => {
                    tracing::warn!("Analysis for line {} failed: {}", record.line_id(), e);
                    None
                }
            };

            tracing::info!("Analysed line {}", record.line_id());
            sections.push(RcaSection {
                line_id: record.line_id().clone(),
                content: record.content().to_string(),
                category: record.event_category.clone(),
                explanation,
            });
        }

        Some(RcaReport {
            source,
            generated_at: Utc::now(),
            anomaly_count: anomalies.len(),
            sections,
        })
    }
}
