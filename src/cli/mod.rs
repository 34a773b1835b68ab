//! Treatment classifier CLI
//!
//! Command-line interface for training, prediction and inspection.

use clap::{Args, Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::cache::{ArtifactCache, ArtifactKey};
use crate::config::PipelineConfig;
use crate::data::options::{known_options, localize_profile};
use crate::data::{RawProfile, SurveyDataset, SurveyLoader};
use crate::evaluation::Evaluator;
use crate::inference::PredictionService;
use crate::pipeline::TrainedArtifact;

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(&format!("{:<12}", key)), val.white())
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "treatment-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Estimate the likelihood of seeking mental health treatment from survey answers")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Dataset and configuration shared by every training-backed command
#[derive(Args, Debug, Clone)]
pub struct DataArgs {
    /// Survey CSV file
    #[arg(short, long)]
    pub data: PathBuf,

    /// Pipeline configuration (JSON); defaults apply when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Answers for a single profile
#[derive(Args, Debug, Clone, Default)]
pub struct ProfileArgs {
    #[arg(long)]
    pub age: Option<f64>,
    #[arg(long)]
    pub gender_group: Option<String>,
    #[arg(long)]
    pub family_history: Option<String>,
    #[arg(long)]
    pub benefits: Option<String>,
    #[arg(long)]
    pub care_options: Option<String>,
    #[arg(long)]
    pub anonymity: Option<String>,
    #[arg(long)]
    pub leave: Option<String>,
    #[arg(long)]
    pub work_interfere: Option<String>,
}

impl ProfileArgs {
    /// Only the answers actually given; absent flags stay absent
    pub fn to_profile(&self) -> RawProfile {
        let mut profile = RawProfile::new();
        if let Some(age) = self.age {
            profile = profile.with_number("age", age);
        }
        let text_fields = [
            ("gender_group", &self.gender_group),
            ("family_history", &self.family_history),
            ("benefits", &self.benefits),
            ("care_options", &self.care_options),
            ("anonymity", &self.anonymity),
            ("leave", &self.leave),
            ("work_interfere", &self.work_interfere),
        ];
        for (name, value) in text_fields {
            if let Some(value) = value {
                profile = profile.with_text(name, value.clone());
            }
        }
        profile
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train on a survey export and report held-out metrics
    Train {
        #[command(flatten)]
        data: DataArgs,
    },

    /// Train (or reuse) a model and score one profile
    Predict {
        #[command(flatten)]
        data: DataArgs,

        /// Profile as a JSON object; overrides the answer flags
        #[arg(long)]
        profile: Option<PathBuf>,

        #[command(flatten)]
        answers: ProfileArgs,
    },

    /// Show the most influential encoded columns
    Importances {
        #[command(flatten)]
        data: DataArgs,

        /// Number of columns to show
        #[arg(long, default_value = "10")]
        top: usize,
    },

    /// List the known answers for each categorical field
    Options,
}

// ─── Shared steps ──────────────────────────────────────────────────────────────

fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    let config = match path {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn load_dataset(args: &DataArgs, config: &PipelineConfig) -> anyhow::Result<SurveyDataset> {
    step_run("Loading survey");
    let start = Instant::now();
    let dataset = SurveyLoader::new().load_dataset(&args.data, config)?;
    let counts = dataset.class_counts();
    step_done(&format!(
        "{} rows (yes={}, no={}) in {:?}",
        dataset.len(),
        counts.get(&1).copied().unwrap_or(0),
        counts.get(&0).copied().unwrap_or(0),
        start.elapsed()
    ));
    Ok(dataset)
}

fn train_artifact(
    cache: &ArtifactCache,
    args: &DataArgs,
) -> anyhow::Result<(PipelineConfig, Arc<TrainedArtifact>)> {
    let config = load_config(args.config.as_deref())?;
    let dataset = load_dataset(args, &config)?;

    step_run(&format!("Training {} trees", config.forest.n_estimators.to_string().cyan()));
    let start = Instant::now();
    let artifact = cache.get_or_train(&dataset, &config)?;
    step_done(&format!("{:?}", start.elapsed()));
    if let Some(at) = cache.trained_at(&ArtifactKey::new(&dataset, &config)?) {
        step_ok(&format!("Artifact ready at {}", at.format("%Y-%m-%d %H:%M:%S UTC")));
    }

    if let Some(warning) = &artifact.balance_report().warning {
        println!("  {} {}", "!".yellow(), warning.to_string().yellow());
    } else {
        step_ok(&format!(
            "Balanced training set with {} synthetic rows",
            artifact.balance_report().n_synthetic
        ));
    }
    Ok((config, artifact))
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(args: &DataArgs) -> anyhow::Result<()> {
    section("Train");
    let cache = ArtifactCache::new();
    let (_, artifact) = train_artifact(&cache, args)?;

    let report = Evaluator::new().evaluate(&artifact)?;
    let show = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |v| format!("{:.4}", v));
    let cm = report.confusion_matrix;

    println!();
    line_box_top();
    line_box(&kv("Samples", &report.n_samples.to_string()));
    line_box(&kv("Accuracy", &format!("{:.4}", report.accuracy)));
    line_box(&kv("Precision", &show(report.precision)));
    line_box(&kv("Recall", &show(report.recall)));
    line_box(&kv("F1", &show(report.f1)));
    line_box(&kv("Confusion", &format!("TP={} FP={} TN={} FN={}", cm.tp, cm.fp, cm.tn, cm.fn_)));
    line_box_bottom();
    println!();
    Ok(())
}

pub fn cmd_predict(args: &DataArgs, profile_path: Option<&Path>, answers: &ProfileArgs) -> anyhow::Result<()> {
    section("Predict");

    let profile = match profile_path {
        Some(path) => serde_json::from_str::<RawProfile>(&std::fs::read_to_string(path)?)?,
        None => answers.to_profile(),
    };
    let profile = localize_profile(&profile);

    let cache = ArtifactCache::new();
    let (_, artifact) = train_artifact(&cache, args)?;
    let service = PredictionService::new(artifact);

    for (field, value) in service.unseen_fields(&profile) {
        println!("  {} {}", "!".yellow(), format!("'{}' was never seen for {}, it carries no signal", value, field).yellow());
    }

    let result = service.predict(&profile)?;
    let verdict = if result.is_positive() { "likely".green().bold() } else { "unlikely".yellow().bold() };

    println!();
    line_box_top();
    line_box(&kv("Probability", &format!("{:.1}%", result.probability * 100.0)));
    line_box(&kv("Treatment", &verdict.to_string()));
    line_box_bottom();
    println!();
    println!("  {}", result.recommendation());
    println!("  {}", dim(&format!("Note: {}", result.note)));
    println!();
    Ok(())
}

pub fn cmd_importances(args: &DataArgs, top: usize) -> anyhow::Result<()> {
    section("Feature importances");
    let cache = ArtifactCache::new();
    let (_, artifact) = train_artifact(&cache, args)?;

    println!();
    for (name, importance) in artifact.feature_importances().into_iter().take(top) {
        let bar = "█".repeat((importance * 40.0).round() as usize);
        println!("  {:<36} {:>6.3} {}", name, importance, accent(&bar));
    }
    println!();
    Ok(())
}

pub fn cmd_options() -> anyhow::Result<()> {
    section("Known answers");
    let config = PipelineConfig::default();
    for field in &config.fields.categorical {
        let options = known_options(field).unwrap_or(&[]);
        println!("  {:<16} {}", muted(field), options.join(" | "));
    }
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_args_only_include_given_answers() {
        let args = ProfileArgs {
            age: Some(31.0),
            leave: Some("Muito fácil".to_string()),
            ..Default::default()
        };
        let profile = localize_profile(&args.to_profile());
        assert_eq!(profile.len(), 2);
        assert_eq!(profile.get("leave").and_then(|v| v.as_category()).as_deref(), Some("Very easy"));
    }

    #[test]
    fn test_cli_parses_predict_flags() {
        let cli = Cli::try_parse_from([
            "treatment-cli", "predict", "--data", "survey.csv", "--age", "29", "--work-interfere", "Often",
        ])
        .unwrap();
        match cli.command {
            Commands::Predict { data, answers, profile } => {
                assert_eq!(data.data, PathBuf::from("survey.csv"));
                assert!(profile.is_none());
                assert_eq!(answers.age, Some(29.0));
                assert_eq!(answers.work_interfere.as_deref(), Some("Often"));
            }
            _ => panic!("expected predict"),
        }
    }

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi(&"x".red().to_string()), "x");
    }
}
