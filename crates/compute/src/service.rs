//! Typed front door for submitting score work.

use std::sync::Arc;

use async_trait::async_trait;
use traitscope_core::{AnswerSet, Instrument, QuestionCatalog};

use crate::context::{Capabilities, FullReport, TaskHandler};
use crate::engine::{BatteryScores, IndustryScores, TraitProfile, ValidationResult};
use crate::error::PoolError;
use crate::pool::WorkerPool;
use crate::progress::ProgressSender;
use crate::protocol::{Task, TaskOutput};

/// Anything that can run a [`Task`] to completion.
///
/// The provided methods build the task and unwrap the matching
/// [`TaskOutput`] variant.
#[async_trait]
pub trait ScoreService: Send + Sync {
    async fn submit(&self, task: Task) -> Result<TaskOutput, PoolError>;

    async fn compute_all(
        &self,
        answers: Arc<AnswerSet>,
        questions: Arc<QuestionCatalog>,
        progress: Option<ProgressSender>,
    ) -> Result<FullReport, PoolError> {
        match self.submit(attach(Task::compute_all(answers, questions), progress)).await? {
            TaskOutput::All(report) => Ok(report),
            other => Err(unexpected("all", &other)),
        }
    }

    async fn compute_battery(
        &self,
        instrument: Instrument,
        answers: Arc<AnswerSet>,
        questions: Arc<QuestionCatalog>,
        progress: Option<ProgressSender>,
    ) -> Result<BatteryScores, PoolError> {
        let task = Task::compute_battery(instrument, answers, questions);
        match self.submit(attach(task, progress)).await? {
            TaskOutput::Battery(scores) => Ok(scores),
            other => Err(unexpected("battery", &other)),
        }
    }

    async fn compute_industries(
        &self,
        profile: TraitProfile,
        progress: Option<ProgressSender>,
    ) -> Result<IndustryScores, PoolError> {
        match self.submit(attach(Task::compute_industries(profile), progress)).await? {
            TaskOutput::Industries(scores) => Ok(scores),
            other => Err(unexpected("industries", &other)),
        }
    }

    async fn validate(
        &self,
        answers: Arc<AnswerSet>,
        questions: Arc<QuestionCatalog>,
    ) -> Result<ValidationResult, PoolError> {
        match self.submit(Task::validate(answers, questions)).await? {
            TaskOutput::Validation(result) => Ok(result),
            other => Err(unexpected("validation", &other)),
        }
    }

    async fn capabilities(&self) -> Result<Capabilities, PoolError> {
        match self.submit(Task::capabilities()).await? {
            TaskOutput::Capabilities(caps) => Ok(caps),
            other => Err(unexpected("capabilities", &other)),
        }
    }
}

fn attach(task: Task, progress: Option<ProgressSender>) -> Task {
    match progress {
        Some(sender) => task.with_progress(sender),
        None => task,
    }
}

fn unexpected(expected: &'static str, got: &TaskOutput) -> PoolError {
    PoolError::UnexpectedReply {
        expected,
        got: got.kind_name(),
    }
}

#[async_trait]
impl<H: TaskHandler> ScoreService for WorkerPool<H> {
    async fn submit(&self, task: Task) -> Result<TaskOutput, PoolError> {
        WorkerPool::submit(self, task).await
    }
}
