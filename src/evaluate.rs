/// Evaluation against hand-labelled ground truth
///
/// Predictions are keyed by line, ground truth by template, so scoring needs
/// two inner joins: predictions -> bridge (LineId -> EventId), then
/// -> ground truth (EventId -> labels). Rows without a match on either hop
/// are dropped from scoring. An empty result is reported as an alignment
/// failure, never as a 0% score.
use crate::log_record::{normalize_key, ClassifiedRecord, LineId};
use crate::tabular::{Row, Table};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

const LINE_ID_COLUMN: &[&str] = &["LineId"];
const TEMPLATE_ID_COLUMN: &[&str] = &["EventId", "TemplateId"];
const CONTENT_COLUMN: &[&str] = &["Content"];
const SEMANTIC_COLUMN: &[&str] = &["SemanticClass"];
const EVENT_COLUMN: &[&str] = &["EventCategory"];

#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error("file not found: {0}")]
    MissingFile(PathBuf),

    #[error("{table} is missing required column '{column}'")]
    MissingColumn { table: String, column: String },

    #[error("none of the {requested} selected line ids appear in the predictions")]
    NoFilterMatches { requested: usize },

    #[error(
        "alignment produced no rows ({predictions} predictions, {bridged} matched a template, 0 matched ground truth); check the LineId/EventId keys"
    )]
    EmptyAlignment { predictions: usize, bridged: usize },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ============================================================================
// Input rows
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRow {
    pub line_id: LineId,
    pub content: String,
    pub semantic_class: String,
    pub event_category: String,
}

impl From<&ClassifiedRecord> for PredictionRow {
    fn from(record: &ClassifiedRecord) -> Self {
        Self {
            line_id: record.line_id().clone(),
            content: record.content().to_string(),
            semantic_class: record.semantic_class.clone(),
            event_category: record.event_category.clone(),
        }
    }
}

/// Line -> template mapping
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeRow {
    pub line_id: LineId,
    pub template_id: String,
}

/// Template -> authoritative labels
#[derive(Debug, Clone, PartialEq)]
pub struct GroundTruthRow {
    pub template_id: String,
    pub semantic_class: String,
    pub event_category: String,
}

fn require(table: &Table, aliases: &[&str]) -> Result<usize, EvaluationError> {
    table.column(aliases).ok_or_else(|| EvaluationError::MissingColumn {
        table: table.name().to_string(),
        column: aliases[0].to_string(),
    })
}

fn text(row: &Row<'_>, column: usize) -> String {
    row.cell(column).unwrap_or_default().trim().to_string()
}

impl PredictionRow {
    pub fn from_table(table: &Table) -> Result<Vec<Self>, EvaluationError> {
        let line_id = require(table, LINE_ID_COLUMN)?;
        let semantic = require(table, SEMANTIC_COLUMN)?;
        let event = require(table, EVENT_COLUMN)?;
        let content = table.column(CONTENT_COLUMN);

        Ok(table
            .rows()
            .filter_map(|row| {
                Some(Self {
                    line_id: LineId::from_cell(row.cell(line_id)?),
                    content: row.get(content).unwrap_or_default().to_string(),
                    semantic_class: text(&row, semantic),
                    event_category: text(&row, event),
                })
            })
            .collect())
    }
}

impl BridgeRow {
    pub fn from_table(table: &Table) -> Result<Vec<Self>, EvaluationError> {
        let line_id = require(table, LINE_ID_COLUMN)?;
        let template = require(table, TEMPLATE_ID_COLUMN)?;

        Ok(table
            .rows()
            .filter_map(|row| {
                Some(Self {
                    line_id: LineId::from_cell(row.cell(line_id)?),
                    template_id: normalize_key(row.cell(template)?),
                })
            })
            .collect())
    }
}

impl GroundTruthRow {
    pub fn from_table(table: &Table) -> Result<Vec<Self>, EvaluationError> {
        let template = require(table, TEMPLATE_ID_COLUMN)?;
        let semantic = require(table, SEMANTIC_COLUMN)?;
        let event = require(table, EVENT_COLUMN)?;

        Ok(table
            .rows()
            .filter_map(|row| {
                Some(Self {
                    template_id: normalize_key(row.cell(template)?),
                    semantic_class: text(&row, semantic),
                    event_category: text(&row, event),
                })
            })
            .collect())
    }
}

// ============================================================================
// Joins
// ============================================================================

/// A prediction that found its template
#[derive(Debug, Clone, PartialEq)]
pub struct BridgedPrediction<'a> {
    pub prediction: &'a PredictionRow,
    pub template_id: String,
}

/// One fully aligned comparison row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignedRow {
    #[serde(rename = "LineId")]
    pub line_id: String,
    #[serde(rename = "Content")]
    pub content: String,
    #[serde(rename = "EventId")]
    pub template_id: String,
    #[serde(rename = "SemanticClass_pred")]
    pub semantic_pred: String,
    #[serde(rename = "EventCategory_pred")]
    pub event_pred: String,
    #[serde(rename = "SemanticClass_true")]
    pub semantic_true: String,
    #[serde(rename = "EventCategory_true")]
    pub event_true: String,
    #[serde(rename = "SemanticCorrect")]
    pub semantic_correct: bool,
    #[serde(rename = "EventCorrect")]
    pub event_correct: bool,
}

/// Inner join of predictions and bridge rows on line id. Output follows
/// prediction order; a line mapped to several templates yields one row each.
pub fn join_bridge<'a>(
    predictions: &'a [PredictionRow],
    bridge: &[BridgeRow],
) -> Vec<BridgedPrediction<'a>> {
    let mut index: FxHashMap<String, Vec<&str>> = FxHashMap::default();
    for row in bridge {
        index
            .entry(normalize_key(row.line_id.as_str()))
            .or_default()
            .push(row.template_id.as_str());
    }

    predictions
        .iter()
        .flat_map(|prediction| {
            index
                .get(&normalize_key(prediction.line_id.as_str()))
                .into_iter()
                .flatten()
                .map(move |template| BridgedPrediction {
                    prediction,
                    template_id: normalize_key(template),
                })
        })
        .collect()
}

/// Inner join of bridged predictions and ground truth on template id.
/// Label text is trimmed before the correctness flags are computed.
pub fn join_ground_truth(
    bridged: &[BridgedPrediction<'_>],
    truth: &[GroundTruthRow],
) -> Vec<AlignedRow> {
    let mut index: FxHashMap<String, Vec<&GroundTruthRow>> = FxHashMap::default();
    for row in truth {
        index
            .entry(normalize_key(&row.template_id))
            .or_default()
            .push(row);
    }

    bridged
        .iter()
        .flat_map(|b| {
            index
                .get(&b.template_id)
                .into_iter()
                .flatten()
                .map(move |answer| {
                    let semantic_pred = b.prediction.semantic_class.trim().to_string();
                    let event_pred = b.prediction.event_category.trim().to_string();
                    let semantic_true = answer.semantic_class.trim().to_string();
                    let event_true = answer.event_category.trim().to_string();
                    AlignedRow {
                        line_id: b.prediction.line_id.to_string(),
                        content: b.prediction.content.clone(),
                        template_id: b.template_id.clone(),
                        semantic_correct: semantic_pred == semantic_true,
                        event_correct: event_pred == event_true,
                        semantic_pred,
                        event_pred,
                        semantic_true,
                        event_true,
                    }
                })
        })
        .collect()
}

// ============================================================================
// Metrics
// ============================================================================

/// Points per axis and the accuracy at which each axis earns full points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub semantic_points: f64,
    pub semantic_target: f64,
    pub anomaly_points: f64,
    pub anomaly_target: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            semantic_points: 30.0,
            semantic_target: 0.80,
            anomaly_points: 25.0,
            anomaly_target: 0.75,
        }
    }
}

impl ScoreWeights {
    pub fn max_score(&self) -> f64 {
        self.semantic_points + self.anomaly_points
    }

    /// Linear up to the target accuracy, capped above it
    pub fn score(&self, semantic_accuracy: f64, anomaly_accuracy: f64) -> f64 {
        axis_points(semantic_accuracy, self.semantic_target, self.semantic_points)
            + axis_points(anomaly_accuracy, self.anomaly_target, self.anomaly_points)
    }
}

fn axis_points(accuracy: f64, target: f64, points: f64) -> f64 {
    let accuracy = accuracy.clamp(0.0, 1.0);
    if target <= 0.0 || accuracy >= target {
        points
    } else {
        accuracy / target * points
    }
}

/// Precision/recall/F1 for one label
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Fraction of pairs whose labels are equal; 0 for no pairs
pub fn accuracy<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> f64 {
    let (mut total, mut correct) = (0usize, 0usize);
    for (truth, pred) in pairs {
        total += 1;
        correct += usize::from(truth == pred);
    }
    if total == 0 {
        0.0
    } else {
        correct as f64 / total as f64
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Per-label metrics over every label seen in either column. A label with
/// no predictions gets precision 0, one with no true rows gets recall 0.
pub fn per_label_metrics(pairs: &[(&str, &str)]) -> Vec<LabelMetrics> {
    let labels: BTreeSet<&str> = pairs.iter().flat_map(|(t, p)| [*t, *p]).collect();

    labels
        .into_iter()
        .map(|label| {
            let tp = pairs.iter().filter(|(t, p)| *t == label && *p == label).count();
            let predicted = pairs.iter().filter(|(_, p)| *p == label).count();
            let support = pairs.iter().filter(|(t, _)| *t == label).count();
            let fp = predicted - tp;
            let fn_ = support - tp;

            LabelMetrics {
                label: label.to_string(),
                precision: ratio(tp, predicted),
                recall: ratio(tp, support),
                f1: ratio(2 * tp, 2 * tp + fp + fn_),
                support,
            }
        })
        .collect()
}

/// Unweighted mean of per-label precision, recall and F1
pub fn macro_average(per_label: &[LabelMetrics]) -> (f64, f64, f64) {
    if per_label.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    let n = per_label.len() as f64;
    let sum = |f: fn(&LabelMetrics) -> f64| per_label.iter().map(f).sum::<f64>() / n;
    (sum(|m| m.precision), sum(|m| m.recall), sum(|m| m.f1))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationMetrics {
    pub samples: usize,
    pub semantic_accuracy: f64,
    pub anomaly_accuracy: f64,
    pub anomaly_precision: f64,
    pub anomaly_recall: f64,
    pub anomaly_f1: f64,
    pub per_category: Vec<LabelMetrics>,
    pub score: f64,
    pub max_score: f64,
}

impl EvaluationMetrics {
    pub fn compute(aligned: &[AlignedRow], weights: &ScoreWeights) -> Self {
        let semantic_accuracy = accuracy(
            aligned
                .iter()
                .map(|r| (r.semantic_true.as_str(), r.semantic_pred.as_str())),
        );
        let event_pairs: Vec<(&str, &str)> = aligned
            .iter()
            .map(|r| (r.event_true.as_str(), r.event_pred.as_str()))
            .collect();
        let anomaly_accuracy = accuracy(event_pairs.iter().copied());
        let per_category = per_label_metrics(&event_pairs);
        let (anomaly_precision, anomaly_recall, anomaly_f1) = macro_average(&per_category);

        Self {
            samples: aligned.len(),
            semantic_accuracy,
            anomaly_accuracy,
            anomaly_precision,
            anomaly_recall,
            anomaly_f1,
            per_category,
            score: weights.score(semantic_accuracy, anomaly_accuracy),
            max_score: weights.max_score(),
        }
    }

    pub fn log_summary(&self) {
        tracing::info!("------ Evaluation ({} samples) ------", self.samples);
        tracing::info!("1. Semantic accuracy: {:.2}%", self.semantic_accuracy * 100.0);
        tracing::info!("2. Anomaly accuracy:  {:.2}%", self.anomaly_accuracy * 100.0);
        tracing::info!(
            "3. Anomaly macro P/R/F1: {:.2} / {:.2} / {:.2}",
            self.anomaly_precision,
            self.anomaly_recall,
            self.anomaly_f1
        );
        for m in &self.per_category {
            tracing::debug!(
                "   {}: P={:.2} R={:.2} F1={:.2} (n={})",
                m.label,
                m.precision,
                m.recall,
                m.f1,
                m.support
            );
        }
        tracing::info!("------ Score: {:.1} / {:.1} ------", self.score, self.max_score);
    }
}

// ============================================================================
// Evaluator
// ============================================================================

#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub metrics: EvaluationMetrics,
    pub aligned: Vec<AlignedRow>,
}

/// Locations of the three input tables and the detail output
#[derive(Debug, Clone)]
pub struct EvaluationPaths {
    pub predictions: PathBuf,
    pub bridge: PathBuf,
    pub ground_truth: PathBuf,
    pub details: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    weights: ScoreWeights,
}

impl Evaluator {
    pub fn new(weights: ScoreWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoreWeights {
        &self.weights
    }

    /// Align the three tables and score the result
    pub fn evaluate(
        &self,
        predictions: &[PredictionRow],
        bridge: &[BridgeRow],
        truth: &[GroundTruthRow],
        filter_ids: Option<&[LineId]>,
    ) -> Result<EvaluationReport, EvaluationError> {
        let selected: Vec<PredictionRow>;
        let predictions = match filter_ids {
            Some(ids) => {
                let wanted: FxHashSet<String> =
                    ids.iter().map(|id| normalize_key(id.as_str())).collect();
                selected = predictions
                    .iter()
                    .filter(|p| wanted.contains(&normalize_key(p.line_id.as_str())))
                    .cloned()
                    .collect();
                if selected.is_empty() {
                    return Err(EvaluationError::NoFilterMatches {
                        requested: wanted.len(),
                    });
                }
                tracing::info!("Evaluating {} selected predictions", selected.len());
                selected.as_slice()
            }
            None => predictions,
        };

        let bridged = join_bridge(predictions, bridge);
        let aligned = join_ground_truth(&bridged, truth);
        if aligned.is_empty() {
            return Err(EvaluationError::EmptyAlignment {
                predictions: predictions.len(),
                bridged: bridged.len(),
            });
        }

        let dropped = predictions.len().saturating_sub(bridged.len());
        if dropped > 0 {
            tracing::info!("{} predictions had no template mapping", dropped);
        }

        let metrics = EvaluationMetrics::compute(&aligned, &self.weights);
        Ok(EvaluationReport { metrics, aligned })
    }

    /// Read the three tables from disk, evaluate, and write the aligned
    /// detail table next to the other artifacts
    pub fn evaluate_files(
        &self,
        paths: &EvaluationPaths,
        filter_ids: Option<&[LineId]>,
    ) -> Result<EvaluationReport, EvaluationError> {
        for path in [&paths.predictions, &paths.bridge, &paths.ground_truth] {
            if !path.exists() {
                return Err(EvaluationError::MissingFile(path.clone()));
            }
        }

        let predictions = PredictionRow::from_table(&Table::read(&paths.predictions)?)?;
        let bridge = BridgeRow::from_table(&Table::read(&paths.bridge)?)?;
        let truth = GroundTruthRow::from_table(&Table::read(&paths.ground_truth)?)?;

        let report = self.evaluate(&predictions, &bridge, &truth, filter_ids)?;
        write_details(&paths.details, &report.aligned)?;
        report.metrics.log_summary();
        Ok(report)
    }
}

/// Persist the aligned rows with their correctness flags
pub fn write_details(path: &Path, aligned: &[AlignedRow]) -> anyhow::Result<()> {
    use anyhow::Context;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for row in aligned {
        writer.serialize(row)?;
    }
    writer.flush()?;
    tracing::info!("Evaluation details saved to {}", path.display());
    Ok(())
}
