use crate::evaluate::ScoreWeights;
use crate::llm_config::LLMProviderConfig;
use crate::log_record::SourceKind;
use crate::rca::DEFAULT_RCA_LIMIT;
use clap::Parser;
use std::path::PathBuf;

pub const PREDICTION_FILE: &str = "System_Prediction.csv";
pub const REPORT_FILE: &str = "RCA_Report.md";
pub const DETAILS_FILE: &str = "Evaluation_Details.csv";

/// Classify system logs with an LLM, explain anomalies, and score the
/// result against a labelled answer set
#[derive(Parser, Debug, Clone)]
#[command(name = "log-triage", version)]
pub struct Cli {
    /// Directory holding the log, bridge and answer files
    #[arg(long, env = "DATASET_DIR", default_value = "dataset")]
    pub dataset_dir: PathBuf,

    /// Log file to classify (.log or LogHub *_structured.csv)
    #[arg(long)]
    pub log_file: Option<String>,

    /// Log family: linux or android
    #[arg(long, default_value = "linux")]
    pub source: SourceKind,

    /// Where predictions, the report and evaluation details are written
    #[arg(long, env = "OUTPUT_DIR", default_value = "outputs")]
    pub output_dir: PathBuf,

    /// Line -> template mapping table
    #[arg(long)]
    pub bridge_file: Option<String>,

    /// Template -> label answer table
    #[arg(long)]
    pub answer_file: Option<String>,

    /// Classify only N randomly chosen lines
    #[arg(long)]
    pub sample: Option<usize>,

    /// Seed for --sample
    #[arg(long)]
    pub seed: Option<u64>,

    /// Anomalies explained in the root-cause report
    #[arg(long, default_value_t = DEFAULT_RCA_LIMIT)]
    pub rca_limit: usize,

    /// Skip classification and reuse the existing prediction table
    #[arg(long)]
    pub skip_classify: bool,

    #[arg(long)]
    pub skip_rca: bool,

    #[arg(long)]
    pub skip_eval: bool,
}

/// Resolved settings for one pipeline run
#[derive(Debug, Clone)]
pub struct Config {
    pub source: SourceKind,
    pub dataset_dir: PathBuf,
    pub log_file: String,
    pub bridge_file: String,
    pub answer_file: String,
    pub output_dir: PathBuf,
    pub sample: Option<usize>,
    pub seed: Option<u64>,
    pub rca_limit: usize,
    pub run_classify: bool,
    pub run_rca: bool,
    pub run_eval: bool,
    pub weights: ScoreWeights,
    pub llm: LLMProviderConfig,
}

impl Config {
    /// Defaults for a source kind, LLM settings from the environment
    pub fn new(source: SourceKind, dataset_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            source,
            dataset_dir: dataset_dir.into(),
            log_file: default_log_file(source),
            bridge_file: default_bridge_file(source),
            answer_file: default_answer_file(source),
            output_dir: output_dir.into(),
            sample: None,
            seed: None,
            rca_limit: DEFAULT_RCA_LIMIT,
            run_classify: true,
            run_rca: true,
            run_eval: true,
            weights: ScoreWeights::default(),
            llm: LLMProviderConfig::default(),
        }
    }

    pub fn from_cli(cli: Cli) -> Self {
        let mut config = Self::new(cli.source, cli.dataset_dir, cli.output_dir);
        if let Some(log_file) = cli.log_file {
            config.log_file = log_file;
        }
        if let Some(bridge_file) = cli.bridge_file {
            config.bridge_file = bridge_file;
        }
        if let Some(answer_file) = cli.answer_file {
            config.answer_file = answer_file;
        }
        config.sample = cli.sample;
        config.seed = cli.seed;
        config.rca_limit = cli.rca_limit;
        config.run_classify = !cli.skip_classify;
        config.run_rca = !cli.skip_rca;
        config.run_eval = !cli.skip_eval;
        config.llm = LLMProviderConfig::from_env();
        config
    }

    pub fn log_path(&self) -> PathBuf {
        self.dataset_dir.join(&self.log_file)
    }

    pub fn bridge_path(&self) -> PathBuf {
        self.dataset_dir.join(&self.bridge_file)
    }

    pub fn answer_path(&self) -> PathBuf {
        self.dataset_dir.join(&self.answer_file)
    }

    pub fn prediction_path(&self) -> PathBuf {
        self.output_dir.join(PREDICTION_FILE)
    }

    pub fn report_path(&self) -> PathBuf {
        self.output_dir.join(REPORT_FILE)
    }

    pub fn details_path(&self) -> PathBuf {
        self.output_dir.join(DETAILS_FILE)
    }

    pub fn log_config(&self) {
        tracing::info!("📋 Configuration:");
        tracing::info!("   Source: {}", self.source);
        tracing::info!("   Log file: {}", self.log_path().display());
        tracing::info!("   Bridge file: {}", self.bridge_path().display());
        tracing::info!("   Answer file: {}", self.answer_path().display());
        tracing::info!("   Output dir: {}", self.output_dir.display());
        match self.sample {
            Some(n) => tracing::info!("   Sampling: {} lines (seed {:?})", n, self.seed),
            None => tracing::info!("   Sampling: off"),
        }
        tracing::info!(
            "   Stages: classify={} rca={} (limit {}) eval={}",
            self.run_classify,
            self.run_rca,
            self.rca_limit,
            self.run_eval
        );
        self.llm.log_config();
    }
}

fn default_log_file(source: SourceKind) -> String {
    format!("{}_2k.log", source)
}

fn default_bridge_file(source: SourceKind) -> String {
    format!("{}_2k.log_structured.csv", source)
}

fn default_answer_file(source: SourceKind) -> String {
    match source {
        SourceKind::Linux => "Linux_answer2.csv".to_string(),
        SourceKind::Android => "Android_answer.csv".to_string(),
    }
}
