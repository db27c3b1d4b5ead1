use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use traitscope_core::PoolConfig;

use crate::context::{ExecutionContext, TaskHandler};
use crate::engine::WeightsError;
use crate::metrics::{PoolCounters, PoolStatistics};

use super::dispatch::Grant;
use super::entry::{Entry, EntryId};
use super::maintenance::maintenance_loop;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Lifecycle {
    Uninitialized,
    Running,
    Terminated,
}

/// Bookkeeping guarded by the pool mutex. Never held across an await.
pub(super) struct PoolState<H: TaskHandler> {
    pub(super) lifecycle: Lifecycle,
    /// Upper bound on entries, fixed at initialization.
    pub(super) capacity: usize,
    pub(super) entries: BTreeMap<EntryId, Entry>,
    /// FIFO of callers waiting for an entry.
    pub(super) waiters: VecDeque<oneshot::Sender<Grant<H>>>,
    pub(super) counters: PoolCounters,
    pub(super) maintenance: Option<tokio::task::JoinHandle<()>>,
}

impl<H: TaskHandler> PoolState<H> {
    /// Mark the first idle, live entry busy and return it.
    pub(super) fn claim_idle(&mut self) -> Option<EntryId> {
        let entry = self
            .entries
            .values_mut()
            .find(|e| !e.busy && e.is_alive())?;
        entry.busy = true;
        Some(entry.id)
    }

    /// Waiters whose caller is still listening.
    pub(super) fn live_waiters(&self) -> usize {
        self.waiters.iter().filter(|w| !w.is_closed()).count()
    }

    pub(super) fn busy_entries(&self) -> usize {
        self.entries.values().filter(|e| e.busy).count()
    }
}

pub(super) struct PoolInner<H: TaskHandler> {
    pub(super) config: PoolConfig,
    pub(super) handler: Arc<H>,
    state: Mutex<PoolState<H>>,
    next_entry_id: AtomicU64,
}

impl<H: TaskHandler> PoolInner<H> {
    /// Lock bookkeeping, recovering from poisoning: the state is updated in
    /// small steps that each leave it consistent.
    pub(super) fn lock_state(&self) -> MutexGuard<'_, PoolState<H>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a new worker thread, logging instead of failing.
    pub(super) fn spawn_entry(&self) -> Option<Entry> {
        let id = self.next_entry_id.fetch_add(1, Ordering::Relaxed);
        match Entry::spawn(id, Arc::clone(&self.handler), &self.config.thread_name_prefix) {
            Ok(entry) => {
                debug!(entry = id, "worker entry spawned");
                Some(entry)
            }
            Err(e) => {
                warn!(entry = id, error = %e, "failed to spawn worker entry");
                None
            }
        }
    }
}

/// Bounded pool of worker threads running a [`TaskHandler`].
///
/// Cloning is cheap and yields another handle to the same pool. Tasks are
/// routed to idle entries; when all are busy callers queue in FIFO order,
/// and when there are no entries at all tasks run in the caller.
pub struct WorkerPool<H: TaskHandler = ExecutionContext> {
    pub(super) inner: Arc<PoolInner<H>>,
}

impl<H: TaskHandler> Clone for WorkerPool<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl WorkerPool<ExecutionContext> {
    /// Pool running the standard execution context with built-in weight tables.
    pub fn with_builtin_weights(config: PoolConfig) -> Result<Self, WeightsError> {
        Ok(Self::new(config, ExecutionContext::with_builtin_weights()?))
    }
}

impl<H: TaskHandler> WorkerPool<H> {
    /// Create an uninitialized pool. Entries are spawned by [`initialize`](Self::initialize)
    /// or lazily on the first submit.
    pub fn new(config: PoolConfig, handler: H) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                config,
                handler: Arc::new(handler),
                state: Mutex::new(PoolState {
                    lifecycle: Lifecycle::Uninitialized,
                    capacity: 0,
                    entries: BTreeMap::new(),
                    waiters: VecDeque::new(),
                    counters: PoolCounters::default(),
                    maintenance: None,
                }),
                next_entry_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    pub fn handler(&self) -> &H {
        &self.inner.handler
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock_state().lifecycle == Lifecycle::Running
    }

    /// Spawn `min(max_pool_size, available_parallelism)` entries.
    ///
    /// Idempotent while running. After [`terminate`](Self::terminate) it
    /// brings the pool back up. Starts the eviction/health-check loop when
    /// called inside a tokio runtime.
    pub fn initialize(&self, max_pool_size: Option<usize>) {
        let mut state = self.inner.lock_state();
        if state.lifecycle == Lifecycle::Running {
            debug!("worker pool already initialized");
            return;
        }

        let sizing = PoolConfig {
            max_pool_size: max_pool_size.unwrap_or(self.inner.config.max_pool_size),
            ..self.inner.config.clone()
        };
        let capacity = sizing.resolved_pool_size();
        state.capacity = capacity;

        for _ in 0..capacity {
            if let Some(entry) = self.inner.spawn_entry() {
                state.entries.insert(entry.id, entry);
            }
        }
        state.lifecycle = Lifecycle::Running;

        if state.entries.is_empty() {
            warn!(
                requested = capacity,
                "worker pool unavailable, tasks will run in the caller"
            );
        }

        if state.maintenance.is_none() {
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    let weak = Arc::downgrade(&self.inner);
                    let period = self.inner.config.maintenance_interval();
                    state.maintenance = Some(runtime.spawn(maintenance_loop(weak, period)));
                }
                Err(_) => debug!("no tokio runtime, idle eviction loop not started"),
            }
        }

        info!(
            entries = state.entries.len(),
            capacity,
            "worker pool initialized"
        );
    }

    /// Initialize on first use only; a terminated pool stays terminated.
    pub(super) fn ensure_started(&self) {
        let uninitialized = self.inner.lock_state().lifecycle == Lifecycle::Uninitialized;
        if uninitialized {
            self.initialize(None);
        }
    }

    /// Destroy every entry and reject further submits until re-initialized.
    ///
    /// Queued callers resolve with [`PoolError::Terminated`](crate::PoolError::Terminated).
    /// Tasks already running finish on their detached threads.
    pub fn terminate(&self) {
        let (entries, waiters, maintenance) = {
            let mut state = self.inner.lock_state();
            state.lifecycle = Lifecycle::Terminated;
            state.capacity = 0;
            (
                std::mem::take(&mut state.entries),
                std::mem::take(&mut state.waiters),
                state.maintenance.take(),
            )
        };

        for waiter in waiters {
            let _ = waiter.send(Grant::Terminated);
        }
        if let Some(handle) = maintenance {
            handle.abort();
        }

        info!(entries = entries.len(), "worker pool terminated");
        drop(entries);
    }

    /// Snapshot of pool bookkeeping and counters.
    pub fn statistics(&self) -> PoolStatistics {
        let state = self.inner.lock_state();
        let total_entries = state.entries.len();
        let total_tasks_handled: u64 = state.entries.values().map(|e| e.tasks_handled).sum();
        let average_tasks_per_entry = if total_entries == 0 {
            0.0
        } else {
            total_tasks_handled as f64 / total_entries as f64
        };

        PoolStatistics {
            total_entries,
            busy_entries: state.busy_entries(),
            queued_tasks: state.live_waiters(),
            total_tasks_handled,
            average_tasks_per_entry,
            lifetime_dispatched: state.counters.dispatched,
            fallback_tasks: state.counters.fallback,
            completed_tasks: state.counters.completed,
            failed_tasks: state.counters.failed,
            crashes_recovered: state.counters.crashes,
            timeouts: state.counters.timeouts,
            evictions: state.counters.evictions,
            avg_task_duration: state.counters.avg_duration,
            entries: state.entries.values().map(Entry::snapshot).collect(),
        }
    }
}
