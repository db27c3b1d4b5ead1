//! Worker pool -- a bounded set of worker threads running score tasks.
//!
//! Split into focused submodules:
//! - `core`: WorkerPool struct, lifecycle (initialize/terminate) and statistics
//! - `entry`: one worker thread and its request loop
//! - `dispatch`: submit, FIFO queueing, reply correlation, crash and timeout recovery
//! - `maintenance`: idle eviction, health checks and the background loop

mod core;
mod dispatch;
mod entry;
mod maintenance;

pub use self::core::WorkerPool;
pub use self::entry::EntryId;
