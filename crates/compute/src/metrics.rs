use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Point-in-time view of one pool entry.
#[derive(Debug, Clone, Serialize)]
pub struct EntrySnapshot {
    pub id: u64,
    pub busy: bool,
    pub tasks_handled: u64,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

/// Pool statistics returned by `WorkerPool::statistics`.
#[derive(Debug, Clone, Serialize)]
pub struct PoolStatistics {
    pub total_entries: usize,
    pub busy_entries: usize,
    /// Callers waiting for an entry (cancelled waiters excluded).
    pub queued_tasks: usize,
    /// Sum of tasks handled by the live entries.
    pub total_tasks_handled: u64,
    pub average_tasks_per_entry: f64,
    /// Tasks dispatched to any entry over the pool's lifetime.
    pub lifetime_dispatched: u64,
    /// Tasks run in the caller because the pool had no entries.
    pub fallback_tasks: u64,
    pub completed_tasks: u64,
    pub failed_tasks: u64,
    pub crashes_recovered: u64,
    pub timeouts: u64,
    pub evictions: u64,
    pub avg_task_duration: Duration,
    pub entries: Vec<EntrySnapshot>,
}

/// Running counters kept under the pool lock.
#[derive(Debug, Clone, Default)]
pub struct PoolCounters {
    pub dispatched: u64,
    pub fallback: u64,
    pub completed: u64,
    pub failed: u64,
    pub crashes: u64,
    pub timeouts: u64,
    pub evictions: u64,
    pub avg_duration: Duration,
}

impl PoolCounters {
    /// Record a successful task.
    pub fn record_completion(&mut self, duration: Duration) {
        self.completed += 1;

        // Incremental mean: new_avg = prev_avg + (duration - prev_avg) / count
        self.avg_duration = if self.completed == 1 {
            duration
        } else {
            let prev_nanos = self.avg_duration.as_nanos() as f64;
            let cur_nanos = duration.as_nanos() as f64;
            let avg_nanos = prev_nanos + (cur_nanos - prev_nanos) / self.completed as f64;
            Duration::from_nanos(avg_nanos as u64)
        };
    }

    pub fn record_failure(&mut self) {
        self.failed += 1;
    }
}
