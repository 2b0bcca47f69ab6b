//! ML Builder CLI Module
//!
//! Command-line interface for serving the API and for running the
//! preprocess → train → save workflow on a local file.

use clap::{Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::config::AppConfig;
use crate::export::ArtifactPersister;
use crate::frame::{is_numeric_dtype, load_data, write_csv};
use crate::report::confusion_matrix_text;
use crate::session::SessionStore;
use crate::workflow::{PreprocessRequest, SaveRequest, TrainRequest, WorkflowService};

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

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn line_box_empty() { line_box(""); }

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

fn step_warn(msg: &str) {
    println!("  {} {}", "!".yellow(), msg.yellow());
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
#[command(name = "ml-builder")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Build, evaluate and save tabular classifiers")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Server host (overrides HOST)
        #[arg(long)]
        host: Option<String>,

        /// Server port (overrides PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Preprocess a data file, train one model and report its metrics
    Train {
        /// Input data file (CSV, JSON, or Parquet)
        #[arg(short, long)]
        data: PathBuf,

        /// Target column name
        #[arg(short, long)]
        target: String,

        /// Preprocessing method (normalization, onehot)
        #[arg(long, default_value = "normalization")]
        method: String,

        /// Model type (perceptron, decision_tree, mlp)
        #[arg(short, long, default_value = "decision_tree")]
        model: String,

        /// Held-out fraction for evaluation
        #[arg(long, default_value = "0.2")]
        test_size: f64,

        /// MLP hidden layer sizes, e.g. "64,32"
        #[arg(long)]
        hidden_layers: Option<String>,

        /// MLP learning rate
        #[arg(long)]
        learning_rate: Option<f64>,

        /// MLP epoch limit
        #[arg(long)]
        max_iter: Option<usize>,

        /// Decision tree depth limit
        #[arg(long)]
        max_depth: Option<usize>,

        /// Save the fitted pipeline under this name
        #[arg(short, long)]
        save: Option<String>,

        /// Directory for saved models (overrides MODELS_DIR)
        #[arg(long)]
        models_dir: Option<PathBuf>,
    },

    /// Score a data file with a saved model
    Predict {
        /// Saved model artifact (.json)
        #[arg(short, long)]
        model: PathBuf,

        /// Input data file
        #[arg(short, long)]
        data: PathBuf,

        /// Write the input plus a `prediction` column to this CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the schema of a data file
    Inspect {
        /// Input data file
        #[arg(short, long)]
        data: PathBuf,
    },
}

/// Hyperparameters given on the command line, in request form
pub fn train_params(
    hidden_layers: Option<&str>,
    learning_rate: Option<f64>,
    max_iter: Option<usize>,
    max_depth: Option<usize>,
) -> Map<String, Value> {
    let mut params = Map::new();
    if let Some(layers) = hidden_layers {
        params.insert("hidden_layers".to_string(), Value::from(layers));
    }
    if let Some(lr) = learning_rate {
        params.insert("learning_rate".to_string(), Value::from(lr));
    }
    if let Some(n) = max_iter {
        params.insert("max_iter".to_string(), Value::from(n));
    }
    if let Some(d) = max_depth {
        params.insert("max_depth".to_string(), Value::from(d));
    }
    params
}

// ─── Commands ──────────────────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
pub async fn cmd_train(
    data_path: &Path,
    target: &str,
    method: &str,
    model_type: &str,
    test_size: f64,
    params: Map<String, Value>,
    save: Option<&str>,
    models_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    section("Train");

    let models_dir = models_dir.unwrap_or_else(|| AppConfig::default().models_dir);
    let workflow = WorkflowService::new(
        Arc::new(SessionStore::local_only()),
        ArtifactPersister::new(models_dir),
    );

    step_run("Loading data");
    let start = Instant::now();
    let df = load_data(data_path)?;
    step_done(&format!("{} rows × {} cols in {:?}", df.height(), df.width(), start.elapsed()));
    let session_id = workflow.ingest(df).await?.session_id;

    step_run(&format!("Preprocessing ({})", method));
    let preprocessed = workflow
        .preprocess(&PreprocessRequest {
            session_id: session_id.clone(),
            method: method.to_string(),
            target_column: target.to_string(),
        })
        .await?;
    let summary = preprocessed.summary;
    step_done(&format!(
        "{} numeric, {} categorical",
        summary.numeric_columns.len(),
        summary.categorical_columns.len()
    ));
    if let Some(dropped) = summary.dropped_rows_with_missing_target {
        step_warn(&format!("dropped {} rows with missing '{}'", dropped, target));
    }

    step_run(&format!("Training {}", model_type.cyan()));
    let start = Instant::now();
    let trained = workflow
        .train(&TrainRequest {
            session_id: session_id.clone(),
            model_type: model_type.to_string(),
            test_size: Some(test_size),
            params,
        })
        .await?;
    step_done(&format!("{:?}", start.elapsed()));

    let m = &trained.metrics;
    println!();
    println!("  {:<16} {}", muted("Model"), m.model_type.white());
    println!("  {:<16} {}", muted("Train / test"), format!("{} / {}", m.n_train, m.n_test).white());
    println!("  {:<16} {}", muted("Accuracy"), format!("{:.4}", m.accuracy).white().bold());
    println!("  {:<16} {}", muted("Precision"), format!("{:.4}", m.precision).white());
    println!("  {:<16} {}", muted("Recall"), format!("{:.4}", m.recall).white());
    println!("  {:<16} {}", muted("F1"), format!("{:.4}", m.f1).white());

    section("Confusion matrix");
    for (i, label) in m.labels.iter().enumerate() {
        println!("  {} {}", dim(&format!("{}:", i)), label);
    }
    println!();
    for line in confusion_matrix_text(&m.confusion_matrix).lines() {
        println!("  {}", line);
    }

    if let Some(name) = save {
        let saved = workflow
            .save_model(&SaveRequest {
                session_id,
                model_type: trained.model_type.clone(),
                model_name: name.to_string(),
            })
            .await?;
        println!();
        step_ok(&format!("Saved to {}", saved.path.display()));
    }

    println!();
    Ok(())
}

pub fn cmd_predict(
    model_path: &Path,
    data_path: &Path,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Predict");

    step_run("Loading model");
    let artifact = ArtifactPersister::load(model_path)?;
    step_done(&format!(
        "{} over {} features, {} classes",
        artifact.model_type,
        artifact.feature_columns.len(),
        artifact.classes.len()
    ));

    step_run("Loading data");
    let mut df = load_data(data_path)?;
    step_done(&format!("{} rows", df.height()));

    step_run("Scoring");
    let start = Instant::now();
    let predictions = artifact.pipeline.predict_frame(&df)?;
    step_done(&format!("{:?}", start.elapsed()));

    match output {
        Some(path) => {
            df.with_column(Series::new("prediction".into(), &predictions))?;
            write_csv(&mut df, path)?;
            step_ok(&format!("Predictions written to {}", path.display()));
        }
        None => {
            println!();
            for (i, label) in predictions.iter().take(20).enumerate() {
                println!("  {:>6}  {}", dim(&i.to_string()), label);
            }
            if predictions.len() > 20 {
                println!("  {}", dim(&format!("… {} more", predictions.len() - 20)));
            }
        }
    }

    println!();
    Ok(())
}

pub fn cmd_inspect(data_path: &Path) -> anyhow::Result<()> {
    section("Data Info");

    let df = load_data(data_path)?;

    println!("  {:<12} {}", muted("File"), data_path.display());
    println!("  {:<12} {}", muted("Rows"), df.height());
    println!("  {:<12} {}", muted("Columns"), df.width());
    println!();

    println!(
        "  {:<20} {:<12} {:<12} {:>6} {:>8}",
        muted("Column"),
        muted("Type"),
        muted("Role"),
        muted("Nulls"),
        muted("Unique")
    );
    println!("  {}", dim(&"─".repeat(62)));

    for col in df.get_columns() {
        let role = if is_numeric_dtype(col.dtype()) { "numeric" } else { "categorical" };
        println!(
            "  {:<20} {:<12} {:<12} {:>6} {:>8}",
            col.name(),
            format!("{:?}", col.dtype()).truecolor(140, 140, 140),
            role,
            col.null_count(),
            col.n_unique().unwrap_or(0)
        );
    }

    println!();
    Ok(())
}

// ─── Serve ─────────────────────────────────────────────────────────────────────

pub async fn cmd_serve(host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    use crate::server::run_server;

    let mut config = AppConfig::default();
    if let Some(host) = host {
        config = config.with_host(host);
    }
    if let Some(port) = port {
        config = config.with_port(port);
    }
    let base = format!("http://{}:{}", config.host, config.port);

    println!();
    line_box_top();
    line_box_empty();
    line_box_center(&format!("{}", "ML Builder".white().bold()));
    line_box_center(&format!("{}", dim(&format!("v{}", env!("CARGO_PKG_VERSION")))));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box(&kv("API    ", &format!("{}/api", base)));
    line_box(&kv("Health ", &format!("{}/api/health", base)));
    line_box(&kv("Models ", &config.models_dir.display().to_string()));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box_center(&format!("{}", dim("ctrl+c to stop")));
    line_box_empty();
    line_box_bottom();
    println!();

    run_server(config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_ansi() {
        colored::control::set_override(true);
        let styled = format!("{}", "abc".red());
        assert_eq!(strip_ansi(&styled), "abc");
    }

    #[test]
    fn test_train_params_only_given() {
        let params = train_params(Some("64,32"), None, Some(50), None);
        assert_eq!(params.len(), 2);
        assert_eq!(params["hidden_layers"], "64,32");
        assert_eq!(params["max_iter"], 50);
    }

    #[test]
    fn test_cli_parses_train() {
        let cli = Cli::try_parse_from([
            "ml-builder", "train", "--data", "iris.csv", "--target", "species", "--model", "mlp",
        ])
        .unwrap();
        match cli.command {
            Commands::Train { model, test_size, method, .. } => {
                assert_eq!(model, "mlp");
                assert_eq!(test_size, 0.2);
                assert_eq!(method, "normalization");
            }
            _ => panic!("expected train"),
        }
    }
}
