//! score-worker: score one answer set through the worker pool.
//!
//! Loads a question catalog and an answer map from JSON, runs the
//! requested operation on a pool of worker threads and prints the result
//! as JSON on stdout. Progress and pool statistics go to the log.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use traitscope_compute::{
    progress_channel, ExecutionContext, ScoreService, TaskOutput, WeightTables, WorkerPool,
};
use traitscope_core::{AnswerSet, Config, Instrument, QuestionCatalog};

// ── CLI ─────────────────────────────────────────────────────────────

/// Psychometric score worker: RIASEC, OCEAN and VIA batteries plus industry match.
#[derive(Parser, Debug)]
#[command(name = "score-worker", version, about)]
struct Cli {
    /// Question catalog (JSON array of questions).
    #[arg(long, env = "TRAITSCOPE_CATALOG", default_value = "data/sample-catalog.json")]
    catalog: PathBuf,

    /// Answer map (JSON object of question id to value or null).
    #[arg(long, env = "TRAITSCOPE_ANSWERS", default_value = "data/sample-answers.json")]
    answers: PathBuf,

    /// Score a single battery instead of the full report.
    #[arg(long)]
    instrument: Option<Instrument>,

    /// Only check which questions are unanswered.
    #[arg(long, conflicts_with = "instrument")]
    validate: bool,

    /// Override the maximum number of worker entries.
    #[arg(long)]
    pool_size: Option<usize>,

    /// YAML file overriding the built-in industry weights.
    #[arg(long)]
    weights: Option<PathBuf>,

    /// Log progress events while the task runs.
    #[arg(long)]
    progress: bool,
}

fn load_weights(path: Option<&PathBuf>) -> anyhow::Result<WeightTables> {
    match path {
        Some(path) => {
            let tables = WeightTables::from_file(path)
                .with_context(|| format!("loading weights from {}", path.display()))?;
            info!(path = %path.display(), sectors = tables.sectors.len(), "loaded industry weights");
            Ok(tables)
        }
        None => Ok(WeightTables::builtin()?),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    traitscope_core::load_dotenv();
    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(size) = cli.pool_size {
        config.pool.max_pool_size = size;
    }
    if cli.weights.is_some() {
        config.weights_path = cli.weights.clone();
    }
    config.log_summary();

    let questions = Arc::new(
        QuestionCatalog::from_file(&cli.catalog)
            .with_context(|| format!("loading catalog from {}", cli.catalog.display()))?,
    );
    let answers = Arc::new(
        AnswerSet::from_file(&cli.answers)
            .with_context(|| format!("loading answers from {}", cli.answers.display()))?,
    );
    info!(
        questions = questions.len(),
        answered = answers.answered_count(),
        "inputs loaded"
    );

    let weights = load_weights(config.weights_path.as_ref())?;
    let pool = WorkerPool::new(config.pool.clone(), ExecutionContext::new(Arc::new(weights)));
    pool.initialize(None);

    let (progress, progress_log) = if cli.progress {
        let (tx, mut rx) = progress_channel(config.pool.progress_capacity);
        let log = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                info!(percent = event.percent, stage = %event.stage, "progress");
            }
        });
        (Some(tx), Some(log))
    } else {
        (None, None)
    };

    // The sender travels with the task, so the log drains once the task is done.
    let output = if cli.validate {
        drop(progress);
        let result = pool.validate(answers, questions).await?;
        if !result.is_valid {
            warn!(missing = result.missing_question_ids.len(), "answer set incomplete");
        }
        TaskOutput::Validation(result)
    } else if let Some(instrument) = cli.instrument {
        TaskOutput::Battery(pool.compute_battery(instrument, answers, questions, progress).await?)
    } else {
        TaskOutput::All(pool.compute_all(answers, questions, progress).await?)
    };

    if let Some(log) = progress_log {
        log.await.context("progress logger stopped unexpectedly")?;
    }

    println!("{}", serde_json::to_string_pretty(&output)?);

    let stats = pool.statistics();
    info!(
        entries = stats.total_entries,
        handled = stats.total_tasks_handled,
        fallback = stats.fallback_tasks,
        avg_ms = stats.avg_task_duration.as_millis() as u64,
        "pool statistics"
    );
    pool.terminate();

    Ok(())
}
