//! Message-passing protocol between the pool and its worker threads.
//!
//! A [`Request`] travels to a worker inside an [`Envelope`] that also
//! carries a per-task reply channel. The worker answers with any number of
//! [`Reply::Progress`] messages followed by exactly one [`Reply::Ok`] or
//! [`Reply::Err`], each tagged with the request id. All payloads are plain
//! data so they can cross the thread boundary without shared mutable state.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use traitscope_core::{AnswerSet, Instrument, QuestionCatalog};
use uuid::Uuid;

use crate::context::{Capabilities, FullReport};
use crate::engine::{BatteryScores, IndustryScores, TraitProfile, ValidationResult};
use crate::error::ContextError;
use crate::progress::ProgressSender;

/// Opaque task identifier, also used as the request correlation id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which operation a task asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    ComputeAll,
    ComputeBattery(Instrument),
    ComputeIndustries,
    Validate,
    Capabilities,
}

/// Tagged request variant sent to an execution context.
#[derive(Debug, Clone)]
pub enum Request {
    ComputeAll {
        answers: Arc<AnswerSet>,
        questions: Arc<QuestionCatalog>,
    },
    ComputeBattery {
        instrument: Instrument,
        answers: Arc<AnswerSet>,
        questions: Arc<QuestionCatalog>,
    },
    ComputeIndustries {
        profile: Arc<TraitProfile>,
    },
    Validate {
        answers: Arc<AnswerSet>,
        questions: Arc<QuestionCatalog>,
    },
    Capabilities,
}

impl Request {
    pub fn kind(&self) -> TaskKind {
        match self {
            Request::ComputeAll { .. } => TaskKind::ComputeAll,
            Request::ComputeBattery { instrument, .. } => TaskKind::ComputeBattery(*instrument),
            Request::ComputeIndustries { .. } => TaskKind::ComputeIndustries,
            Request::Validate { .. } => TaskKind::Validate,
            Request::Capabilities => TaskKind::Capabilities,
        }
    }
}

/// A unit of work submitted to the pool.
#[derive(Debug)]
pub struct Task {
    pub id: TaskId,
    pub request: Request,
    /// At most one progress stream per task.
    pub progress: Option<ProgressSender>,
}

impl Task {
    pub fn new(request: Request) -> Self {
        Self {
            id: TaskId::new(),
            request,
            progress: None,
        }
    }

    pub fn with_progress(mut self, sender: ProgressSender) -> Self {
        self.progress = Some(sender);
        self
    }

    pub fn compute_all(answers: Arc<AnswerSet>, questions: Arc<QuestionCatalog>) -> Self {
        Self::new(Request::ComputeAll { answers, questions })
    }

    pub fn compute_battery(
        instrument: Instrument,
        answers: Arc<AnswerSet>,
        questions: Arc<QuestionCatalog>,
    ) -> Self {
        Self::new(Request::ComputeBattery {
            instrument,
            answers,
            questions,
        })
    }

    pub fn compute_industries(profile: TraitProfile) -> Self {
        Self::new(Request::ComputeIndustries {
            profile: Arc::new(profile),
        })
    }

    pub fn validate(answers: Arc<AnswerSet>, questions: Arc<QuestionCatalog>) -> Self {
        Self::new(Request::Validate { answers, questions })
    }

    pub fn capabilities() -> Self {
        Self::new(Request::Capabilities)
    }

    pub fn kind(&self) -> TaskKind {
        self.request.kind()
    }
}

/// Successful result of a task, one variant per operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "result", rename_all = "snake_case")]
pub enum TaskOutput {
    All(FullReport),
    Battery(BatteryScores),
    Industries(IndustryScores),
    Validation(ValidationResult),
    Capabilities(Capabilities),
}

impl TaskOutput {
    pub fn kind_name(&self) -> &'static str {
        match self {
            TaskOutput::All(_) => "all",
            TaskOutput::Battery(_) => "battery",
            TaskOutput::Industries(_) => "industries",
            TaskOutput::Validation(_) => "validation",
            TaskOutput::Capabilities(_) => "capabilities",
        }
    }
}

/// Tagged response variant from an execution context.
#[derive(Debug)]
pub enum Reply {
    Progress {
        request_id: TaskId,
        percent: f64,
        stage: String,
    },
    Ok {
        request_id: TaskId,
        output: TaskOutput,
    },
    Err {
        request_id: TaskId,
        error: ContextError,
    },
}

impl Reply {
    pub fn request_id(&self) -> TaskId {
        match self {
            Reply::Progress { request_id, .. }
            | Reply::Ok { request_id, .. }
            | Reply::Err { request_id, .. } => *request_id,
        }
    }
}

pub type ReplySender = mpsc::UnboundedSender<Reply>;
pub type ReplyReceiver = mpsc::UnboundedReceiver<Reply>;

/// What a worker thread receives: the request plus where to answer.
#[derive(Debug)]
pub struct Envelope {
    pub request_id: TaskId,
    pub request: Request,
    /// Skip progress replies entirely when nobody listens.
    pub wants_progress: bool,
    pub reply: ReplySender,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_ids_are_unique() {
        assert_ne!(TaskId::new(), TaskId::new());
    }

    #[test]
    fn request_kind() {
        let task = Task::compute_battery(
            Instrument::Via,
            Arc::new(AnswerSet::new()),
            Arc::new(QuestionCatalog::default()),
        );
        assert_eq!(task.kind(), TaskKind::ComputeBattery(Instrument::Via));
        assert_eq!(Task::capabilities().kind(), TaskKind::Capabilities);
    }

    #[test]
    fn reply_carries_request_id() {
        let id = TaskId::new();
        let reply = Reply::Err {
            request_id: id,
            error: ContextError::Failed("nope".into()),
        };
        assert_eq!(reply.request_id(), id);
    }

    #[test]
    fn output_serializes_with_kind_tag() {
        let output = TaskOutput::Battery(BatteryScores::from_iter([("zest".to_string(), 40u8)]));
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["kind"], "battery");
        assert_eq!(json["result"]["zest"], 40);
    }
}
