use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::metrics::AggregationMethod;

#[derive(Parser, Debug)]
#[command(
    name = "kgdrill",
    version,
    about = "Drill-hole coordinate inference and six-metrics scoring"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load the survey table and report its points and suffix collisions.
    Survey(SurveyArgs),
    /// Place extracted drill holes and write a run record.
    Infer(InferArgs),
    /// Score run records against ground truth.
    Score(ScoreArgs),
    /// Aggregate single-run metrics per model and document.
    Aggregate(AggregateArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SurveyArgs {
    #[arg(long, env = "KGDRILL_SURVEY_PATH", default_value = "data/survey_points.csv")]
    pub survey_path: PathBuf,

    #[arg(long)]
    pub output_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct InferArgs {
    #[arg(long, env = "KGDRILL_SURVEY_PATH", default_value = "data/survey_points.csv")]
    pub survey_path: PathBuf,

    /// Raw entity-extraction reply (JSON, possibly wrapped in reasoning text).
    #[arg(long)]
    pub entities_path: PathBuf,

    /// Program answering location prompts: prompt on stdin, reply on stdout.
    #[arg(long, env = "KGDRILL_MODEL_COMMAND")]
    pub model_command: String,

    /// Defaults to the entities file name.
    #[arg(long)]
    pub document_name: Option<String>,

    #[arg(long, default_value = "unknown")]
    pub model_name: String,

    #[arg(long)]
    pub repetition_round: Option<u32>,

    #[arg(long, default_value_t = 0.0)]
    pub entity_extraction_time_secs: f64,

    /// Source document text, used to estimate the token length.
    #[arg(long)]
    pub document_text_path: Option<PathBuf>,

    /// `tokenizer.json` of the evaluated model; without it the token length
    /// is estimated from character counts.
    #[arg(long, env = "KGDRILL_TOKENIZER_PATH")]
    pub tokenizer_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub enable_cache: bool,

    #[arg(long, default_value_t = false)]
    pub stream: bool,

    #[arg(long, env = "KGDRILL_OUTPUT_DIR", default_value = "results")]
    pub output_dir: PathBuf,

    #[arg(long)]
    pub output_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ScoreArgs {
    #[arg(long = "run-path", required = true)]
    pub run_paths: Vec<PathBuf>,

    #[arg(
        long,
        env = "KGDRILL_GROUND_TRUTH_PATH",
        default_value = "data/ground_truth_annotations.csv"
    )]
    pub ground_truth_path: PathBuf,

    /// Optional manual verification of placed coordinates per run.
    #[arg(
        long,
        env = "KGDRILL_VERIFICATION_PATH",
        default_value = "data/coordinate_verification_results.csv"
    )]
    pub verification_path: PathBuf,

    #[arg(long, env = "KGDRILL_OUTPUT_DIR", default_value = "results")]
    pub output_dir: PathBuf,

    #[arg(long)]
    pub output_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct AggregateArgs {
    #[arg(long = "metrics-path", required = true)]
    pub metrics_paths: Vec<PathBuf>,

    #[arg(long, value_enum, default_value_t = AggregationMethod::Mean)]
    pub method: AggregationMethod,

    #[arg(long, env = "KGDRILL_OUTPUT_DIR", default_value = "results")]
    pub output_dir: PathBuf,

    #[arg(long)]
    pub output_path: Option<PathBuf>,
}
