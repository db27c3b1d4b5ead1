use std::time::Duration;

use thiserror::Error;

use crate::protocol::TaskId;

/// A handler refused or failed a request. Reported back over the reply
/// channel; the entry that produced it stays healthy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("Task failed: {0}")]
    Failed(String),
}

/// Error type for pooled task execution.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("task {task_id} timed out after {after:?}")]
    Timeout { task_id: TaskId, after: Duration },

    #[error("entry {entry_id} crashed while running task {task_id}: {reason}")]
    EntryCrashed {
        task_id: TaskId,
        entry_id: u64,
        reason: String,
    },

    #[error("worker pool has been terminated")]
    Terminated,

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error("unexpected reply: expected {expected}, got {got}")]
    UnexpectedReply {
        expected: &'static str,
        got: &'static str,
    },

    #[error("dispatch failed: {0}")]
    Internal(String),
}

impl PoolError {
    /// Whether the failure caused the entry to be recycled.
    pub fn recycled_entry(&self) -> bool {
        matches!(self, PoolError::Timeout { .. } | PoolError::EntryCrashed { .. })
    }
}
