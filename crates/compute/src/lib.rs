//! Psychometric scoring behind a bounded worker pool.
//!
//! The [`engine`] module holds the pure scoring functions. An
//! [`ExecutionContext`] wraps them as a stateless [`TaskHandler`], and a
//! [`WorkerPool`] runs that handler on dedicated threads with FIFO
//! queueing, progress forwarding, timeouts and crash recovery. When the
//! pool has no entries the same handler runs in the caller.

pub mod context;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod pool;
pub mod progress;
pub mod protocol;
pub mod service;

pub use context::{Capabilities, ExecutionContext, FullReport, TaskHandler};
pub use engine::{BatteryScores, IndustryScores, TraitProfile, ValidationResult, WeightTables, WeightsError};
pub use error::{ContextError, PoolError};
pub use metrics::{EntrySnapshot, PoolStatistics};
pub use pool::{EntryId, WorkerPool};
pub use progress::{progress_channel, ProgressEvent, ProgressReceiver, ProgressReporter, ProgressSender, ProgressSink};
pub use protocol::{Request, Task, TaskId, TaskKind, TaskOutput};
pub use service::ScoreService;
