use log_triage::config::Config;
use log_triage::evaluate::{EvaluationError, EvaluationPaths, Evaluator};
use log_triage::implementations::{ScriptedInference, UnavailableInference};
use log_triage::log_record::{LineId, SourceKind};
use log_triage::loghub_loader::{load_logs, LogHubDatasetLoader};
use log_triage::pipeline::{Pipeline, Stage};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const SSH_LINE: &str = "Jul 1 00:00:00 host sshd[123]: Failed password for root from 10.0.0.1";
const KERNEL_LINE: &str = "Jul 1 00:00:01 host kernel: CPU0: no APIC found";

const BRIDGE: &str = "LineId,Month,Date,Time,Level,Component,PID,Content,EventId,EventTemplate
1,Jul,1,00:00:00,combo,sshd,123,Failed password for root from 10.0.0.1,E27,Failed password for <*> from <*>
2,Jul,1,00:00:01,combo,kernel,,CPU0: no APIC found,E12,CPU0: no APIC found
";

const ANSWER: &str = "EventId,SemanticClass,EventCategory
E27,Authentication & Security,Authentication & Security Failures
E12,Hardware & Device Drivers,Hardware & Kernel Config Errors
";

fn write_dataset(dir: &Path, answer: &str) {
    fs::write(dir.join("Linux_2k.log"), format!("{}\n\n{}\n", SSH_LINE, KERNEL_LINE)).unwrap();
    fs::write(dir.join("Linux_2k.log_structured.csv"), BRIDGE).unwrap();
    fs::write(dir.join("Linux_answer2.csv"), answer).unwrap();
}

/// Answers like a well-behaved model for the two fixture lines
fn oracle() -> ScriptedInference {
    ScriptedInference::new(|request| {
        let ssh = request.prompt.contains("Failed password");
        let reply = if request.prompt.contains("\"EventCategory\"") {
            if ssh {
                r#"{"Normal": "False", "Reason": "bad password", "EventCategory": "Authentication & Security Failures"}"#
            } else {
                r#"```json
{"Normal": "False", "Reason": "firmware", "EventCategory": "Hardware & Kernel Config Errors"}
```"#
            }
        } else if request.prompt.contains("\"SemanticClass\"") {
            if ssh {
                r#"{"SemanticClass": "Authentication & Security"}"#
            } else {
                r#"{"SemanticClass": "hardware & device drivers"}"#
            }
        } else {
            "Check the firmware and the SSH brute-force protection."
        };
        Ok(reply.to_string())
    })
}

fn config(dataset: &TempDir) -> Config {
    Config::new(SourceKind::Linux, dataset.path(), dataset.path().join("outputs"))
}

#[test]
fn scenario_a_parses_syslog_lines() {
    let dir = TempDir::new().unwrap();
    write_dataset(dir.path(), ANSWER);

    let records = load_logs(&dir.path().join("Linux_2k.log")).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].line_id, LineId::from_ordinal(1));
    assert_eq!(records[1].line_id, LineId::from_ordinal(2));

    assert_eq!(records[0].component, "sshd");
    assert_eq!(records[1].component, "kernel");
    assert_eq!(records[0].masked_content, "Failed password for root from <IP>");
    assert_eq!(records[1].content, "CPU0: no APIC found");
    assert_eq!(records[1].masked_content, records[1].content);
}

#[tokio::test]
async fn scenario_b_perfect_predictions_score_full_marks() {
    let dir = TempDir::new().unwrap();
    write_dataset(dir.path(), ANSWER);
    let config = config(&dir);
    let service = oracle();

    let dataset = LogHubDatasetLoader::new(&config.dataset_dir, &config.log_file);
    let outcome = Pipeline::new(&config, &service).run(&dataset).await;

    assert!(outcome.failures.is_empty(), "{:?}", outcome.failures);
    assert_eq!(outcome.records_loaded, 2);
    assert_eq!(outcome.classified[1].semantic_class, "Hardware & Device Drivers");

    let metrics = &outcome.evaluation.as_ref().unwrap().metrics;
    assert_eq!(metrics.samples, 2);
    assert_eq!(metrics.anomaly_accuracy, 1.0);
    assert_eq!(metrics.anomaly_f1, 1.0);
    assert_eq!(metrics.semantic_accuracy, 1.0);
    assert!(metrics.score >= 25.0);
    assert_eq!(metrics.score, 55.0);

    // Two classification calls per line plus one explanation per anomaly
    assert_eq!(service.call_count(), 6);

    let report = fs::read_to_string(config.report_path()).unwrap();
    assert!(report.contains("## Log ID: 1"));
    assert!(report.contains("## Log ID: 2"));
    assert!(report.contains("SSH brute-force"));

    let details = fs::read_to_string(config.details_path()).unwrap();
    assert!(details.starts_with("LineId,Content,EventId,SemanticClass_pred"));
    assert_eq!(details.lines().count(), 3);
}

#[tokio::test]
async fn scenario_c_disjoint_templates_report_alignment_failure() {
    let dir = TempDir::new().unwrap();
    write_dataset(
        dir.path(),
        "EventId,SemanticClass,EventCategory\nE900,Memory Management,Other\n",
    );
    let config = config(&dir);
    let service = oracle();

    let dataset = LogHubDatasetLoader::new(&config.dataset_dir, &config.log_file);
    let outcome = Pipeline::new(&config, &service).run(&dataset).await;

    assert!(outcome.evaluation.is_none());
    assert!(outcome.failed(Stage::Evaluate));
    assert!(!outcome.failed(Stage::Classify));
    assert!(outcome.failures[0].message.contains("alignment produced no rows"));

    // Earlier artifacts stay in place
    assert!(config.prediction_path().exists());
    assert!(config.report_path().exists());
    assert!(!config.details_path().exists());
}

#[tokio::test]
async fn unreachable_service_yields_default_labels() {
    let dir = TempDir::new().unwrap();
    write_dataset(dir.path(), ANSWER);
    let config = config(&dir);
    let service = UnavailableInference;

    let dataset = LogHubDatasetLoader::new(&config.dataset_dir, &config.log_file);
    let outcome = Pipeline::new(&config, &service).run(&dataset).await;

    assert_eq!(outcome.classified.len(), 2);
    for record in &outcome.classified {
        assert_eq!(record.semantic_class, "Kernel Boot & General System");
        assert_eq!(record.event_category, "Other");
    }
    let stats = outcome.stats.as_ref().unwrap();
    assert_eq!(stats.transport_failures, 4);

    // Nothing anomalous, so no report; evaluation still scores the defaults
    assert!(outcome.report.is_none());
    assert!(!config.report_path().exists());
    let metrics = &outcome.evaluation.as_ref().unwrap().metrics;
    assert_eq!(metrics.anomaly_accuracy, 0.0);
    assert_eq!(metrics.score, 0.0);
}

#[tokio::test]
async fn disjoint_filter_is_an_early_exit() {
    let dir = TempDir::new().unwrap();
    write_dataset(dir.path(), ANSWER);
    let mut config = config(&dir);
    config.run_rca = false;
    config.run_eval = false;
    let service = oracle();

    let dataset = LogHubDatasetLoader::new(&config.dataset_dir, &config.log_file);
    Pipeline::new(&config, &service).run(&dataset).await;

    let paths = EvaluationPaths {
        predictions: config.prediction_path(),
        bridge: config.bridge_path(),
        ground_truth: config.answer_path(),
        details: config.details_path(),
    };
    let filter = [LineId::from_ordinal(40), LineId::from_ordinal(41)];
    let err = Evaluator::default()
        .evaluate_files(&paths, Some(&filter))
        .unwrap_err();

    assert!(matches!(err, EvaluationError::NoFilterMatches { requested: 2 }));
    assert!(!config.details_path().exists());
}

#[tokio::test]
async fn sampled_run_evaluates_the_same_lines() {
    let dir = TempDir::new().unwrap();
    write_dataset(dir.path(), ANSWER);
    let mut config = config(&dir);
    config.sample = Some(1);
    config.seed = Some(11);
    config.run_rca = false;
    let service = oracle();

    let dataset = LogHubDatasetLoader::new(&config.dataset_dir, &config.log_file);
    let outcome = Pipeline::new(&config, &service).run(&dataset).await;

    let ids = outcome.sample_ids.as_ref().unwrap();
    assert_eq!(ids.len(), 1);
    assert_eq!(outcome.classified.len(), 1);
    assert_eq!(outcome.classified[0].line_id(), &ids[0]);

    let evaluation = outcome.evaluation.as_ref().unwrap();
    assert_eq!(evaluation.aligned.len(), 1);
    assert_eq!(evaluation.aligned[0].line_id, ids[0].to_string());
}

#[tokio::test]
async fn report_can_run_from_saved_predictions() {
    let dir = TempDir::new().unwrap();
    write_dataset(dir.path(), ANSWER);
    let out = dir.path().join("outputs");
    fs::create_dir_all(&out).unwrap();
    fs::write(
        out.join("System_Prediction.csv"),
        "LineId,Content,SemanticClass,EventCategory\n\
         1,Failed password for root,Authentication & Security,Authentication & Security Failures\n\
         2,CPU0: no APIC found,Hardware & Device Drivers,Other\n",
    )
    .unwrap();

    let mut config = config(&dir);
    config.run_classify = false;
    config.run_eval = false;
    let service = oracle();

    let dataset = LogHubDatasetLoader::new(&config.dataset_dir, &config.log_file);
    let outcome = Pipeline::new(&config, &service).run(&dataset).await;

    assert!(outcome.failures.is_empty(), "{:?}", outcome.failures);
    let report = outcome.report.unwrap();
    assert_eq!(report.anomaly_count, 1);
    assert_eq!(report.sections[0].line_id, LineId::from_ordinal(1));
    assert_eq!(service.call_count(), 1);
}

#[tokio::test]
async fn missing_dataset_fails_each_stage_cleanly() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let service = UnavailableInference;

    let dataset = LogHubDatasetLoader::new(&config.dataset_dir, &config.log_file);
    let outcome = Pipeline::new(&config, &service).run(&dataset).await;

    assert!(outcome.failed(Stage::Load));
    assert!(outcome.failed(Stage::RootCause));
    assert!(outcome.failed(Stage::Evaluate));
    assert!(outcome.failures[0].message.contains("Linux_2k.log"));
}

#[tokio::test]
async fn sampling_uses_the_ids_of_a_structured_source() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("Linux_2k.log_structured.csv"),
        "LineId,Month,Date,Time,Level,Component,PID,Content,EventId,EventTemplate
10,Jul,1,00:00:00,combo,sshd,123,Failed password for root from 10.0.0.1,E27,x
20,Jul,1,00:00:01,combo,kernel,,CPU0: no APIC found,E12,x
30,Jul,1,00:00:02,combo,sshd,124,Failed password for admin from 10.0.0.2,E27,x
40,Jul,1,00:00:03,combo,kernel,,CPU1: no APIC found,E12,x
",
    )
    .unwrap();
    fs::write(dir.path().join("Linux_answer2.csv"), ANSWER).unwrap();

    let mut config = config(&dir);
    config.log_file = "Linux_2k.log_structured.csv".to_string();
    config.sample = Some(2);
    config.seed = Some(5);
    config.run_rca = false;
    let service = oracle();

    let dataset = LogHubDatasetLoader::new(&config.dataset_dir, &config.log_file);
    let outcome = Pipeline::new(&config, &service).run(&dataset).await;

    assert!(outcome.failures.is_empty(), "{:?}", outcome.failures);
    assert_eq!(outcome.records_loaded, 4);
    let ids = outcome.sample_ids.as_ref().unwrap();
    assert_eq!(ids.len(), 2);
    assert!(ids
        .iter()
        .all(|id| ["10", "20", "30", "40"].contains(&id.as_str())));
    assert_eq!(outcome.classified.len(), 2);

    let evaluation = outcome.evaluation.as_ref().unwrap();
    assert_eq!(evaluation.aligned.len(), 2);
    assert_eq!(evaluation.metrics.anomaly_accuracy, 1.0);
}

#[tokio::test]
async fn failed_load_does_not_score_an_older_prediction_file() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("Linux_2k.log_structured.csv"), BRIDGE).unwrap();
    fs::write(dir.path().join("Linux_answer2.csv"), ANSWER).unwrap();

    let config = config(&dir);
    fs::create_dir_all(&config.output_dir).unwrap();
    let stale = "LineId,Content,SemanticClass,EventCategory\n\
                 1,old,Authentication & Security,Authentication & Security Failures\n";
    fs::write(config.prediction_path(), stale).unwrap();
    let service = oracle();

    let dataset = LogHubDatasetLoader::new(&config.dataset_dir, &config.log_file);
    let outcome = Pipeline::new(&config, &service).run(&dataset).await;

    assert!(outcome.failed(Stage::Load));
    assert!(outcome.failed(Stage::RootCause));
    assert!(outcome.failed(Stage::Evaluate));
    assert!(outcome.evaluation.is_none());
    assert!(outcome.report.is_none());
    assert_eq!(service.call_count(), 0);
    assert!(!config.details_path().exists());
    assert_eq!(fs::read_to_string(config.prediction_path()).unwrap(), stale);
}
