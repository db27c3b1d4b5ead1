//! The execution context: a stateless façade over the scoring engine run
//! inside each worker (and by the same-thread fallback).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use traitscope_core::{AnswerSet, Instrument, Question, INDUSTRY_KEYS};

use crate::engine::{
    battery_scores, industry_scores_with, validate_answers, BatteryScores, IndustryScores,
    TraitProfile, ValidationResult, WeightTables, WeightsError,
};
use crate::error::ContextError;
use crate::progress::ProgressReporter;
use crate::protocol::{Request, TaskOutput};

/// Anything that can answer a [`Request`].
///
/// Implementations must be stateless across calls: a pool reuses one
/// handler for unrelated tasks on every worker thread.
pub trait TaskHandler: Send + Sync + 'static {
    fn handle(&self, request: &Request, progress: &ProgressReporter<'_>) -> Result<TaskOutput, ContextError>;
}

/// All three batteries plus the industry match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullReport {
    pub riasec: BatteryScores,
    pub ocean: BatteryScores,
    pub via: BatteryScores,
    pub industry: IndustryScores,
}

/// Static description of what a context supports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub operations: Vec<String>,
    pub industry_count: usize,
    pub instrument_categories: Vec<(Instrument, usize)>,
    pub version: String,
}

const OPERATIONS: &[&str] = &[
    "compute_all",
    "compute_battery",
    "compute_industries",
    "validate",
    "capabilities",
];

/// Holds only constant tables; every call is independent.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    weights: Arc<WeightTables>,
}

impl ExecutionContext {
    pub fn new(weights: Arc<WeightTables>) -> Self {
        Self { weights }
    }

    pub fn with_builtin_weights() -> Result<Self, WeightsError> {
        Ok(Self::new(Arc::new(WeightTables::builtin()?)))
    }

    pub fn weights(&self) -> &WeightTables {
        &self.weights
    }

    /// Three batteries at 25% each, then the industry match in the last 25%.
    pub fn compute_all(
        &self,
        answers: &AnswerSet,
        questions: &[Question],
        progress: &ProgressReporter<'_>,
    ) -> FullReport {
        progress.report(0.0, "starting");

        let mut batteries = Vec::with_capacity(Instrument::ALL.len());
        for (index, instrument) in Instrument::ALL.into_iter().enumerate() {
            let start = index as f64 * 25.0;
            let band = progress.band(start, start + 25.0);
            let scores = battery_scores(instrument, answers, questions, &mut |done, total, category| {
                band.report(done as f64 * 100.0 / total as f64, &format!("{instrument}: {category}"));
            });
            batteries.push(scores);
        }

        let mut batteries = batteries.into_iter();
        let profile = TraitProfile {
            riasec: batteries.next().unwrap_or_default(),
            ocean: batteries.next().unwrap_or_default(),
            via: batteries.next().unwrap_or_default(),
        };

        let band = progress.band(75.0, 100.0);
        let industry = industry_scores_with(&profile, &self.weights, &mut |done, total, sector| {
            band.report(done as f64 * 100.0 / total as f64, &format!("industries: {sector}"));
        });

        progress.report(100.0, "complete");

        FullReport {
            riasec: profile.riasec,
            ocean: profile.ocean,
            via: profile.via,
            industry,
        }
    }

    /// One battery, one tick per category.
    pub fn compute_battery(
        &self,
        instrument: Instrument,
        answers: &AnswerSet,
        questions: &[Question],
        progress: &ProgressReporter<'_>,
    ) -> BatteryScores {
        battery_scores(instrument, answers, questions, &mut |done, total, category| {
            progress.report(done as f64 * 100.0 / total as f64, &format!("{instrument}: {category}"));
        })
    }

    /// Industry match only, one tick per sector key.
    pub fn compute_industries(&self, profile: &TraitProfile, progress: &ProgressReporter<'_>) -> IndustryScores {
        industry_scores_with(profile, &self.weights, &mut |done, total, sector| {
            progress.report(done as f64 * 100.0 / total as f64, &format!("industries: {sector}"));
        })
    }

    pub fn validate(&self, answers: &AnswerSet, questions: &[Question]) -> ValidationResult {
        validate_answers(answers, questions)
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            operations: OPERATIONS.iter().map(|s| s.to_string()).collect(),
            industry_count: INDUSTRY_KEYS.len(),
            instrument_categories: Instrument::ALL
                .iter()
                .map(|&i| (i, i.categories().len()))
                .collect(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl TaskHandler for ExecutionContext {
    fn handle(&self, request: &Request, progress: &ProgressReporter<'_>) -> Result<TaskOutput, ContextError> {
        let output = match request {
            Request::ComputeAll { answers, questions } => {
                TaskOutput::All(self.compute_all(answers, questions.questions(), progress))
            }
            Request::ComputeBattery {
                instrument,
                answers,
                questions,
            } => TaskOutput::Battery(self.compute_battery(*instrument, answers, questions.questions(), progress)),
            Request::ComputeIndustries { profile } => {
                TaskOutput::Industries(self.compute_industries(profile, progress))
            }
            Request::Validate { answers, questions } => {
                TaskOutput::Validation(self.validate(answers, questions.questions()))
            }
            Request::Capabilities => TaskOutput::Capabilities(self.capabilities()),
        };
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use traitscope_core::QuestionCatalog;

    use super::*;
    use crate::progress::ProgressSink;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(f64, String)>>);

    impl ProgressSink for Recorder {
        fn emit(&self, percent: f64, stage: &str) {
            self.0.lock().unwrap().push((percent, stage.to_string()));
        }
    }

    fn context() -> ExecutionContext {
        ExecutionContext::with_builtin_weights().unwrap()
    }

    fn catalog() -> Vec<Question> {
        let mut id = 0;
        let mut questions = Vec::new();
        for instrument in Instrument::ALL {
            for category in instrument.categories() {
                for reversed in [false, true] {
                    id += 1;
                    questions.push(Question {
                        id,
                        text: format!("{category} item {id}"),
                        category: category.to_string(),
                        subcategory: None,
                        is_reversed: reversed,
                    });
                }
            }
        }
        questions
    }

    #[test]
    fn compute_all_progress_bands() {
        let recorder = Recorder::default();
        let reporter = ProgressReporter::new(Some(&recorder));
        let questions = catalog();
        let answers: AnswerSet = questions.iter().map(|q| (q.id, 4)).collect();

        let report = context().compute_all(&answers, &questions, &reporter);
        assert_eq!(report.riasec.len(), 6);
        assert_eq!(report.ocean.len(), 5);
        assert_eq!(report.via.len(), 24);
        assert_eq!(report.industry.len(), INDUSTRY_KEYS.len());

        let events = recorder.0.lock().unwrap();
        assert_eq!(events.first().unwrap(), &(0.0, "starting".to_string()));
        assert_eq!(events.last().unwrap(), &(100.0, "complete".to_string()));
        assert!(events.windows(2).all(|w| w[0].0 <= w[1].0), "progress must not go backwards");

        // end of the first battery lands exactly on the 25% boundary
        let riasec_end = events.iter().find(|(_, s)| s == "riasec: conventional").unwrap();
        assert_eq!(riasec_end.0, 25.0);
        let via_end = events.iter().find(|(_, s)| s == "via: spirituality").unwrap();
        assert_eq!(via_end.0, 75.0);
    }

    #[test]
    fn compute_all_without_sink() {
        let questions = catalog();
        let report = context().compute_all(&AnswerSet::new(), &questions, &ProgressReporter::silent());
        assert!(report.riasec.values().all(|&s| s == 0));
        assert!(report.industry.iter().all(|(_, s)| s <= 100));
    }

    #[test]
    fn battery_ticks_per_category() {
        let recorder = Recorder::default();
        let reporter = ProgressReporter::new(Some(&recorder));
        context().compute_battery(Instrument::Ocean, &AnswerSet::new(), &[], &reporter);

        let pcts: Vec<f64> = recorder.0.lock().unwrap().iter().map(|(p, _)| *p).collect();
        assert_eq!(pcts, vec![20.0, 40.0, 60.0, 80.0, 100.0]);
    }

    #[test]
    fn handler_is_stateless_across_calls() {
        let ctx = context();
        let questions = Arc::new(QuestionCatalog::new(catalog()).unwrap());
        let answers = Arc::new(questions.questions().iter().map(|q| (q.id, (q.id % 5 + 1) as i64)).collect::<AnswerSet>());
        let request = Request::ComputeAll {
            answers: Arc::clone(&answers),
            questions: Arc::clone(&questions),
        };

        let first = ctx.handle(&request, &ProgressReporter::silent()).unwrap();
        ctx.handle(&Request::Capabilities, &ProgressReporter::silent()).unwrap();
        let second = ctx.handle(&request, &ProgressReporter::silent()).unwrap();
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
    }

    #[test]
    fn capabilities_describe_operations() {
        let caps = context().capabilities();
        assert_eq!(caps.industry_count, 24);
        assert!(caps.operations.iter().any(|op| op == "compute_all"));
        assert_eq!(caps.instrument_categories[1], (Instrument::Ocean, 5));
    }
}
