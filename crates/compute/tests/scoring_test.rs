//! End-to-end scoring through the worker pool using the sample fixtures.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use traitscope_compute::{
    progress_channel, ExecutionContext, PoolError, ScoreService, TraitProfile, WeightTables,
    WeightsError, WorkerPool,
};
use traitscope_core::{AnswerSet, Instrument, PoolConfig, QuestionCatalog, INDUSTRY_KEYS};

const TIMEOUT: Duration = Duration::from_secs(10);

fn fixture(name: &str) -> String {
    format!("{}/../../data/{name}", env!("CARGO_MANIFEST_DIR"))
}

fn load_inputs() -> (Arc<AnswerSet>, Arc<QuestionCatalog>) {
    let questions = QuestionCatalog::from_file(fixture("sample-catalog.json")).unwrap();
    let answers = AnswerSet::from_file(fixture("sample-answers.json")).unwrap();
    (Arc::new(answers), Arc::new(questions))
}

fn pool() -> WorkerPool {
    WorkerPool::with_builtin_weights(PoolConfig {
        max_pool_size: 2,
        ..PoolConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn full_report_from_fixtures() {
    let (answers, questions) = load_inputs();
    let pool = pool();

    let report = timeout(TIMEOUT, pool.compute_all(answers, questions, None))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.riasec["realistic"], 25);
    assert_eq!(report.riasec["social"], 88);
    assert_eq!(report.ocean["agreeableness"], 88);
    // 3.5 average lands on 62.5 and rounds up.
    assert_eq!(report.via["judgment"], 63);

    assert_eq!(report.industry.len(), INDUSTRY_KEYS.len());
    assert_eq!(report.industry.get("teknologi"), Some(31));
    let top: Vec<&str> = report.industry.top(3).into_iter().map(|(k, _)| k).collect();
    assert_eq!(top, vec!["perhotelan", "sosial", "perdagangan"]);
    pool.terminate();
}

#[tokio::test]
async fn single_battery_matches_full_report() {
    let (answers, questions) = load_inputs();
    let pool = pool();

    let ocean = pool
        .compute_battery(Instrument::Ocean, Arc::clone(&answers), Arc::clone(&questions), None)
        .await
        .unwrap();
    let report = pool.compute_all(answers, questions, None).await.unwrap();

    assert_eq!(ocean, report.ocean);
    assert_eq!(ocean.keys().map(String::as_str).collect::<Vec<_>>(), Instrument::Ocean.categories());
    pool.terminate();
}

#[tokio::test]
async fn industries_from_profile_match_full_report() {
    let (answers, questions) = load_inputs();
    let pool = pool();

    let report = pool.compute_all(answers, questions, None).await.unwrap();
    let profile = TraitProfile {
        riasec: report.riasec.clone(),
        ocean: report.ocean.clone(),
        via: report.via.clone(),
    };

    let (tx, mut rx) = progress_channel(64);
    let industry = pool.compute_industries(profile, Some(tx)).await.unwrap();
    assert_eq!(industry, report.industry);

    let mut ticks = 0;
    while let Ok(event) = rx.try_recv() {
        assert!(event.stage.starts_with("industries: "));
        ticks += 1;
    }
    assert_eq!(ticks, INDUSTRY_KEYS.len());
    pool.terminate();
}

#[tokio::test]
async fn validation_reports_missing_answers() {
    let (answers, questions) = load_inputs();
    let pool = pool();

    let complete = pool.validate(Arc::clone(&answers), Arc::clone(&questions)).await.unwrap();
    assert!(complete.is_valid);
    assert_eq!(complete.total_questions, 70);
    assert_eq!(complete.answered_questions, 70);

    let mut partial = (*answers).clone();
    partial.clear(3);
    partial.clear(41);
    let result = pool.validate(Arc::new(partial), questions).await.unwrap();
    assert!(!result.is_valid);
    assert_eq!(result.missing_question_ids, vec![3, 41]);
    assert_eq!(result.answered_questions, 68);
    pool.terminate();
}

#[tokio::test]
async fn empty_answers_score_zero() {
    let (_, questions) = load_inputs();
    let pool = pool();

    let report = pool
        .compute_all(Arc::new(AnswerSet::new()), questions, None)
        .await
        .unwrap();
    assert!(report.riasec.values().all(|&s| s == 0));
    assert!(report.via.values().all(|&s| s == 0));
    pool.terminate();
}

#[tokio::test]
async fn custom_weights_file_changes_industry_scores() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "version: 1\nsectors:\n  teknologi:\n    riasec: {{ social: 100 }}\n    ocean: {{}}\n    via: {{}}"
    )
    .unwrap();

    let tables = WeightTables::from_file(file.path()).unwrap();
    let pool = WorkerPool::new(PoolConfig::default(), ExecutionContext::new(Arc::new(tables)));

    let (answers, questions) = load_inputs();
    let report = pool.compute_all(answers, questions, None).await.unwrap();
    assert_eq!(report.industry.get("teknologi"), Some(88));
    // Sectors without a table still appear.
    assert_eq!(report.industry.get("kesehatan"), Some(0));
    assert_eq!(report.industry.len(), INDUSTRY_KEYS.len());
    pool.terminate();
}

#[test]
fn weights_with_unknown_category_are_rejected() {
    let yaml = "version: 1\nsectors:\n  teknologi:\n    riasec: { telepathy: 10 }\n";
    let err = WeightTables::from_yaml_str(yaml).unwrap_err();
    assert!(matches!(err, WeightsError::UnknownCategory { .. }), "got {err:?}");
}

#[tokio::test]
async fn capabilities_over_the_pool() {
    let pool = pool();
    let caps = pool.capabilities().await.unwrap();
    assert_eq!(caps.industry_count, 24);
    assert_eq!(caps.operations.len(), 5);
    assert!(caps.instrument_categories.contains(&(Instrument::Via, 24)));

    pool.terminate();
    assert!(matches!(pool.capabilities().await, Err(PoolError::Terminated)));
}
