//! Integration tests for the worker pool under concurrent load.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use traitscope_compute::{ExecutionContext, FullReport, ProgressReporter, ScoreService, WorkerPool};
use traitscope_core::{AnswerSet, PoolConfig, QuestionCatalog};

const TIMEOUT: Duration = Duration::from_secs(15);

fn catalog() -> Arc<QuestionCatalog> {
    let path = format!("{}/../../data/sample-catalog.json", env!("CARGO_MANIFEST_DIR"));
    Arc::new(QuestionCatalog::from_file(path).unwrap())
}

/// A distinct, fully answered set per seed.
fn answers_for(seed: u32, catalog: &QuestionCatalog) -> Arc<AnswerSet> {
    Arc::new(
        catalog
            .questions()
            .iter()
            .map(|q| (q.id, i64::from((q.id * 3 + seed) % 5) + 1))
            .collect(),
    )
}

fn direct(answers: &AnswerSet, catalog: &QuestionCatalog) -> FullReport {
    ExecutionContext::with_builtin_weights()
        .unwrap()
        .compute_all(answers, catalog.questions(), &ProgressReporter::silent())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submits_keep_results_apart() {
    let catalog = catalog();
    let pool = WorkerPool::with_builtin_weights(PoolConfig {
        max_pool_size: 3,
        ..PoolConfig::default()
    })
    .unwrap();
    pool.initialize(None);

    let seeds: Vec<u32> = (0..12).collect();
    let handles: Vec<_> = seeds
        .iter()
        .map(|&seed| {
            let pool = pool.clone();
            let answers = answers_for(seed, &catalog);
            let catalog = Arc::clone(&catalog);
            tokio::spawn(async move { pool.compute_all(answers, catalog, None).await })
        })
        .collect();

    for (seed, handle) in seeds.into_iter().zip(handles) {
        let report = timeout(TIMEOUT, handle).await.unwrap().unwrap().unwrap();
        let expected = direct(&answers_for(seed, &catalog), &catalog);
        assert_eq!(report, expected, "seed {seed} got another task's result");
    }

    let stats = pool.statistics();
    assert_eq!(stats.completed_tasks, 12);
    assert_eq!(stats.failed_tasks, 0);
    assert_eq!(stats.queued_tasks, 0);
    assert!(stats.total_entries <= 3);
    pool.terminate();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn disabled_pool_matches_direct_computation() {
    let catalog = catalog();
    let answers = answers_for(2, &catalog);
    let pool = WorkerPool::with_builtin_weights(PoolConfig {
        max_pool_size: 0,
        ..PoolConfig::default()
    })
    .unwrap();

    let report = pool
        .compute_all(Arc::clone(&answers), Arc::clone(&catalog), None)
        .await
        .unwrap();
    assert_eq!(
        serde_json::to_vec(&report).unwrap(),
        serde_json::to_vec(&direct(&answers, &catalog)).unwrap()
    );

    let stats = pool.statistics();
    assert_eq!(stats.total_entries, 0);
    assert_eq!(stats.fallback_tasks, 1);
}

#[tokio::test]
async fn entries_record_their_work() {
    let catalog = catalog();
    let pool = WorkerPool::with_builtin_weights(PoolConfig {
        max_pool_size: 1,
        ..PoolConfig::default()
    })
    .unwrap();

    for seed in 0..3 {
        pool.validate(answers_for(seed, &catalog), Arc::clone(&catalog))
            .await
            .unwrap();
    }

    let stats = pool.statistics();
    assert_eq!(stats.entries.len(), 1);
    let entry = &stats.entries[0];
    assert_eq!(entry.tasks_handled, 3);
    assert!(!entry.busy);
    assert!(entry.last_used_at >= entry.created_at);
    assert_eq!(stats.average_tasks_per_entry, 3.0);
    pool.terminate();
}
