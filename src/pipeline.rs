/// The four-stage run: load, classify, explain, evaluate
///
/// A failed stage is logged and recorded. The saved prediction table is only
/// read back when classification was skipped for this run; if this run was
/// meant to classify and could not, the stages that consume its predictions
/// are recorded as failed instead of scoring an older file.
use crate::analysis::{read_predictions, write_predictions, ClassificationStats, LogAnalyzer};
use crate::config::Config;
use crate::evaluate::{EvaluationPaths, EvaluationReport, Evaluator};
use crate::log_record::{ClassifiedRecord, LineId};
use crate::rca::{RcaReport, RootCauseAnalyzer};
use crate::sampling::{filter_records, sample_line_ids};
use crate::traits::{InferenceService, LogSource};
use std::fmt;

const NO_FRESH_PREDICTIONS: &str = "skipped: this run produced no predictions";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Classify,
    RootCause,
    Evaluate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Load => "load",
            Stage::Classify => "classify",
            Stage::RootCause => "root-cause",
            Stage::Evaluate => "evaluate",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct StageFailure {
    pub stage: Stage,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct PipelineOutcome {
    pub records_loaded: usize,
    pub sample_ids: Option<Vec<LineId>>,
    pub classified: Vec<ClassifiedRecord>,
    pub stats: Option<ClassificationStats>,
    pub report: Option<RcaReport>,
    pub evaluation: Option<EvaluationReport>,
    pub failures: Vec<StageFailure>,
}

impl PipelineOutcome {
    pub fn failed(&self, stage: Stage) -> bool {
        self.failures.iter().any(|f| f.stage == stage)
    }

    fn record_failure(&mut self, stage: Stage, error: impl fmt::Display) {
        tracing::error!("❌ {} stage failed: {}", stage, error);
        self.failures.push(StageFailure {
            stage,
            message: error.to_string(),
        });
    }
}

pub struct Pipeline<'a> {
    config: &'a Config,
    service: &'a dyn InferenceService,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a Config, service: &'a dyn InferenceService) -> Self {
        Self { config, service }
    }

    pub async fn run(&self, source: &dyn LogSource) -> PipelineOutcome {
        let mut outcome = PipelineOutcome::default();

        if self.config.run_classify {
            self.load_and_classify(source, &mut outcome).await;
        }

        // Predictions on disk belong to an earlier run unless this run wrote them
        let upstream_failed = self.config.run_classify
            && (outcome.failed(Stage::Load) || outcome.failed(Stage::Classify));

        if self.config.run_rca {
            if upstream_failed {
                outcome.record_failure(Stage::RootCause, NO_FRESH_PREDICTIONS);
            } else {
                self.explain(&mut outcome).await;
            }
        }

        if self.config.run_eval {
            if upstream_failed {
                outcome.record_failure(Stage::Evaluate, NO_FRESH_PREDICTIONS);
            } else {
                self.evaluate(&mut outcome);
            }
        }

        if outcome.failures.is_empty() {
            tracing::info!("✅ Pipeline finished");
        } else {
            tracing::warn!("Pipeline finished with {} failed stage(s)", outcome.failures.len());
        }
        outcome
    }

    async fn load_and_classify(&self, source: &dyn LogSource, outcome: &mut PipelineOutcome) {
        tracing::info!("[1/4] Loading logs from {}", source.name());
        let mut records = match source.load_records() {
            Ok(records) => records,
            Err(e) => {
                outcome.record_failure(Stage::Load, format!("{:#}", e));
                return;
            }
        };
        outcome.records_loaded = records.len();
        tracing::info!("Loaded {} records", records.len());

        if let Some(n) = self.config.sample.filter(|&n| n < records.len()) {
            let all_ids: Vec<LineId> = records.iter().map(|r| r.line_id.clone()).collect();
            let ids = sample_line_ids(&all_ids, n, self.config.seed);
            tracing::info!(
                "Sampled {} line ids (first: {:?})",
                ids.len(),
                ids.iter().take(10).map(LineId::as_str).collect::<Vec<_>>()
            );
            records = filter_records(records, &ids);
            outcome.sample_ids = Some(ids);
        }

        tracing::info!("[2/4] Classifying {} records", records.len());
        let analyzer = LogAnalyzer::new(self.service);
        let (classified, stats) = analyzer
            .classify_with_stats(&records, self.config.source)
            .await;

        if let Err(e) = write_predictions(&self.config.prediction_path(), &classified) {
            outcome.record_failure(Stage::Classify, format!("{:#}", e));
        }
        outcome.classified = classified;
        outcome.stats = Some(stats);
    }

    async fn explain(&self, outcome: &mut PipelineOutcome) {
        tracing::info!("[3/4] Root cause analysis");

        let from_disk;
        let classified: &[ClassifiedRecord] = if !self.config.run_classify {
            match read_predictions(&self.config.prediction_path()) {
                Ok(records) => {
                    from_disk = records;
                    &from_disk
                }
                Err(e) => {
                    outcome.record_failure(Stage::RootCause, format!("{:#}", e));
                    return;
                }
            }
        } else {
            &outcome.classified
        };

        let analyzer = RootCauseAnalyzer::new(self.service).with_limit(self.config.rca_limit);
        let Some(report) = analyzer.generate_report(classified, self.config.source).await else {
            return;
        };

        if let Err(e) = report.write(&self.config.report_path()) {
            outcome.record_failure(Stage::RootCause, format!("{:#}", e));
        }
        outcome.report = Some(report);
    }

    fn evaluate(&self, outcome: &mut PipelineOutcome) {
        tracing::info!("[4/4] Evaluating against {}", self.config.answer_path().display());

        let paths = EvaluationPaths {
            predictions: self.config.prediction_path(),
            bridge: self.config.bridge_path(),
            ground_truth: self.config.answer_path(),
            details: self.config.details_path(),
        };
        let evaluator = Evaluator::new(self.config.weights);
        match evaluator.evaluate_files(&paths, outcome.sample_ids.as_deref()) {
            Ok(report) => outcome.evaluation = Some(report),
            Err(e) => outcome.record_failure(Stage::Evaluate, e),
        }
    }
}
