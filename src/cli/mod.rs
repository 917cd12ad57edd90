//! Salary predictor CLI
//!
//! `cv` cross-validates the candidate models and writes test predictions;
//! `tune` searches model families and hyperparameters.

use clap::{Args, Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::PipelineConfig;
use crate::optimizer::SamplerType;
use crate::pipeline::Pipeline;
use crate::training::FailurePolicy;

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

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
    format!("{} {}", muted(key), val.white())
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    println!("  {} {}...", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("    {} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "salary-predictor")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Salary prediction from job postings")]
#[command(long_about = None)]
pub struct Cli {
    /// JSON config file; flags override its values
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by both commands
#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    /// Directory holding train_features.csv, train_salaries.csv and test_features.csv
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,

    /// Directory for checkpoints, predictions and hyperparameters
    #[arg(short, long)]
    pub model_dir: Option<PathBuf>,

    /// Hyperparameter file name inside the model dir
    #[arg(short, long)]
    pub param_file: Option<String>,

    /// Seed for folds, search and estimators
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Cross-validate the models, refit the best one and predict the test set
    Cv {
        #[command(flatten)]
        common: CommonArgs,

        /// Number of cross-validation folds
        #[arg(short = 'k', long)]
        folds: Option<usize>,

        /// Ignore the hyperparameter file and use default settings
        #[arg(long)]
        no_params: bool,

        /// Add the mean predictor as a reference model
        #[arg(long)]
        baseline: bool,

        /// Keep going when a model fails to fit
        #[arg(long)]
        isolate_failures: bool,
    },

    /// Search model families and hyperparameters
    Tune {
        #[command(flatten)]
        common: CommonArgs,

        /// Number of trials
        #[arg(short = 'n', long)]
        trials: Option<usize>,

        /// Sampler (tpe, random)
        #[arg(long)]
        sampler: Option<String>,

        /// Write the full trial history to this file inside the model dir
        #[arg(long)]
        study_file: Option<String>,

        /// Record failing trials instead of aborting
        #[arg(long)]
        catch_failures: bool,
    },
}

// ─── Configuration ─────────────────────────────────────────────────────────────

/// Defaults, then the config file, then command-line flags
pub fn load_config(path: Option<&Path>, common: &CommonArgs) -> anyhow::Result<PipelineConfig> {
    let mut config = match path {
        Some(p) => PipelineConfig::from_file(p)?,
        None => PipelineConfig::default(),
    };
    if let Some(dir) = &common.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(dir) = &common.model_dir {
        config.model_dir = dir.clone();
    }
    if let Some(file) = &common.param_file {
        config.params_file = Some(file.clone());
    }
    if let Some(seed) = common.seed {
        config = config.with_seed(seed);
    }
    Ok(config)
}

fn parse_sampler(name: &str) -> anyhow::Result<SamplerType> {
    match name.to_lowercase().as_str() {
        "tpe" => Ok(SamplerType::TPE),
        "random" => Ok(SamplerType::Random),
        _ => anyhow::bail!("Invalid sampler: {}", name),
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_cv(
    mut config: PipelineConfig,
    folds: Option<usize>,
    no_params: bool,
    baseline: bool,
    isolate_failures: bool,
) -> anyhow::Result<()> {
    if let Some(k) = folds {
        config.n_folds = k;
    }
    if no_params {
        config.params_file = None;
    }
    if baseline {
        config.include_baseline = true;
    }
    if isolate_failures {
        config.failure_policy = FailurePolicy::Isolate;
    }

    section("Cross-validation");
    println!("  {}", kv("data  ", &config.data_dir.display().to_string()));
    println!("  {}", kv("models", &config.model_dir.display().to_string()));
    println!("  {}", kv("folds ", &config.n_folds.to_string()));
    match config.params_path() {
        Some(p) => println!("  {}", kv("params", &p.display().to_string())),
        None => println!("  {}", kv("params", "defaults")),
    }
    println!();

    let pipeline = Pipeline::new(config)?;
    step_run("Training");
    let start = Instant::now();
    let outcome = pipeline.run_cv()?;
    step_done(&format!("{:.2?}", start.elapsed()));

    println!();
    line_box_top();
    line_box(&format!("{:<26} {:>14} {:>14}", muted("Model"), muted("Mean MSE"), muted("Std")));
    line_box_sep();
    for candidate in &outcome.report.candidates {
        let is_best = outcome.report.best.as_deref() == Some(candidate.label.as_str());
        let name = if is_best {
            candidate.label.white().bold().to_string()
        } else {
            candidate.label.clone()
        };
        match (&candidate.summary, &candidate.failure) {
            (Some(s), _) => line_box(&format!("{:<26} {:>14.4} {:>14.4}", name, s.mean, s.std)),
            (None, Some(err)) => {
                let msg: String = err.chars().take(28).collect();
                line_box(&format!("{:<26} {}", name, msg.red()))
            }
            (None, None) => line_box(&format!("{:<26} {:>14}", name, dim("-"))),
        }
    }
    line_box_bottom();

    println!();
    if let Some(best) = &outcome.report.best {
        step_ok(&format!("best {}", best.white().bold()));
    }
    step_ok(&format!("predictions {}", outcome.predictions_path.display()));
    step_ok(&format!("report {}", outcome.report_path.display()));
    println!();
    Ok(())
}

pub fn cmd_tune(
    mut config: PipelineConfig,
    trials: Option<usize>,
    sampler: Option<&str>,
    study_file: Option<String>,
    catch_failures: bool,
) -> anyhow::Result<()> {
    if let Some(n) = trials {
        config.n_trials = n;
    }
    if let Some(name) = sampler {
        config.sampler = parse_sampler(name)?;
    }
    if study_file.is_some() {
        config.study_file = study_file;
    }
    if catch_failures {
        config.catch_failures = true;
    }

    section("Hyperparameter search");
    println!("  {}", kv("data   ", &config.data_dir.display().to_string()));
    println!("  {}", kv("trials ", &config.n_trials.to_string()));
    println!("  {}", kv("sampler", &format!("{:?}", config.sampler)));
    println!();

    let pipeline = Pipeline::new(config)?;
    step_run("Optimizing");
    let start = Instant::now();
    let outcome = pipeline.run_search()?;
    step_done(&format!(
        "{} trials, {} failed, {:.2?}",
        outcome.study.trials.len(),
        outcome.study.n_failed(),
        start.elapsed()
    ));

    println!();
    line_box_top();
    line_box(&kv("regressor", &outcome.record.family.to_string()));
    line_box(&kv("best MSE ", &format!("{:.4}", outcome.best_value)));
    line_box_sep();
    for (name, value) in &outcome.record.params {
        line_box(&kv(&format!("{:<18}", name), &value.to_string()));
    }
    line_box_sep();
    line_box(&muted("parameter importance").to_string());
    for (name, share) in &outcome.importances {
        line_box(&format!("{:<20} {:>8.4}", name, share));
    }
    line_box_bottom();

    println!();
    if let Some(path) = &outcome.params_path {
        step_ok(&format!("best params saved to {}", path.display()));
    }
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cv_flags() {
        let cli = Cli::try_parse_from([
            "salary-predictor", "cv", "--data-dir", "in", "-k", "5", "--no-params", "--baseline",
        ])
        .unwrap();
        match cli.command {
            Commands::Cv { common, folds, no_params, baseline, isolate_failures } => {
                assert_eq!(common.data_dir, Some(PathBuf::from("in")));
                assert_eq!(folds, Some(5));
                assert!(no_params && baseline && !isolate_failures);
            }
            _ => panic!("expected cv"),
        }
    }

    #[test]
    fn test_flags_override_defaults() {
        let common = CommonArgs {
            model_dir: Some(PathBuf::from("out")),
            param_file: Some("p.json".into()),
            seed: Some(7),
            ..Default::default()
        };
        let config = load_config(None, &common).unwrap();
        assert_eq!(config.params_path(), Some(PathBuf::from("out/p.json")));
        assert_eq!(config.fold_seed, 7);
        assert_eq!(config.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn test_parse_sampler() {
        assert_eq!(parse_sampler("TPE").unwrap(), SamplerType::TPE);
        assert_eq!(parse_sampler("random").unwrap(), SamplerType::Random);
        assert!(parse_sampler("grid").is_err());
    }

    #[test]
    fn test_strip_ansi() {
        let colored = ok("done").to_string();
        assert_eq!(strip_ansi(&colored), "done");
    }
}
