use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

use crate::context::TaskHandler;
use crate::error::{ContextError, PoolError};
use crate::progress::{deliver, ChannelSink, ProgressEvent, ProgressReporter, ProgressSender, ProgressSink};
use crate::protocol::{Envelope, Reply, ReplyReceiver, Task, TaskId, TaskOutput};

use super::core::{Lifecycle, PoolInner, PoolState, WorkerPool};
use super::entry::{Entry, EntryId};

/// What a caller is handed when it asks for an entry.
pub(super) enum Grant<H: TaskHandler> {
    Entry(EntryLease<H>),
    /// The pool has no entries; run in the caller.
    Fallback,
    Terminated,
}

impl<H: TaskHandler> Grant<H> {
    /// Discard without releasing, for grants that never reached a caller.
    fn defuse(self) {
        if let Grant::Entry(lease) = self {
            lease.defuse();
        }
    }
}

/// Exclusive use of one busy entry. Dropping the lease gives the entry
/// back, so a caller cancelled at any point cannot leak it.
pub(super) struct EntryLease<H: TaskHandler> {
    pool: Arc<PoolInner<H>>,
    entry_id: EntryId,
    armed: bool,
    recycle: bool,
}

impl<H: TaskHandler> EntryLease<H> {
    fn new(pool: Arc<PoolInner<H>>, entry_id: EntryId) -> Self {
        Self {
            pool,
            entry_id,
            armed: true,
            recycle: false,
        }
    }

    fn entry_id(&self) -> EntryId {
        self.entry_id
    }

    /// Replace the entry instead of returning it to the idle set.
    fn mark_compromised(&mut self) {
        self.recycle = true;
    }

    fn defuse(mut self) {
        self.armed = false;
    }
}

impl<H: TaskHandler> Drop for EntryLease<H> {
    fn drop(&mut self) {
        if self.armed {
            self.pool.release(self.entry_id, self.recycle);
        }
    }
}

/// How a reply stream ended without a result.
enum Failure {
    Failed(ContextError),
    Disconnected,
}

impl<H: TaskHandler> PoolInner<H> {
    /// Spawn an extra entry when below capacity, already marked busy.
    fn grow(&self, state: &mut PoolState<H>) -> Option<EntryId> {
        if state.lifecycle != Lifecycle::Running || state.entries.len() >= state.capacity {
            return None;
        }
        let mut entry = self.spawn_entry()?;
        entry.busy = true;
        let id = entry.id;
        state.entries.insert(id, entry);
        debug!(entry = id, total = state.entries.len(), "grew pool on demand");
        Some(id)
    }

    /// Give `entry_id` to the oldest live waiter, or mark it idle.
    pub(super) fn hand_off(self: &Arc<Self>, state: &mut PoolState<H>, entry_id: EntryId) {
        while let Some(waiter) = state.waiters.pop_front() {
            if waiter.is_closed() {
                continue;
            }
            if let Some(entry) = state.entries.get_mut(&entry_id) {
                entry.busy = true;
            }
            match waiter.send(Grant::Entry(EntryLease::new(Arc::clone(self), entry_id))) {
                Ok(()) => {
                    trace!(entry = entry_id, "entry handed to queued task");
                    return;
                }
                // Caller went away between the check and the send.
                Err(grant) => grant.defuse(),
            }
        }
        if let Some(entry) = state.entries.get_mut(&entry_id) {
            entry.finish_task();
        }
    }

    /// Queued callers have nothing left to wait for.
    pub(super) fn drain_to_fallback(state: &mut PoolState<H>) {
        if state.waiters.is_empty() {
            return;
        }
        warn!(
            queued = state.waiters.len(),
            "no worker entries left, queued tasks will run in the caller"
        );
        for waiter in state.waiters.drain(..) {
            let _ = waiter.send(Grant::Fallback);
        }
    }

    /// Return a leased entry, replacing it first when it is compromised.
    fn release(self: &Arc<Self>, entry_id: EntryId, recycle: bool) {
        let mut state = self.lock_state();
        if !state.entries.contains_key(&entry_id) {
            // Terminated while the lease was out.
            return;
        }

        let next = if recycle {
            state.entries.remove(&entry_id);
            if state.lifecycle == Lifecycle::Running {
                self.spawn_entry().map(|entry| {
                    let id = entry.id;
                    state.entries.insert(id, entry);
                    debug!(old = entry_id, new = id, "replaced recycled entry");
                    id
                })
            } else {
                None
            }
        } else {
            Some(entry_id)
        };

        match next {
            Some(id) => self.hand_off(&mut state, id),
            None if state.entries.is_empty() => Self::drain_to_fallback(&mut state),
            None => {}
        }
    }

    /// Run one task on a leased entry and wait for its reply.
    async fn run_leased(self: Arc<Self>, mut lease: EntryLease<H>, task: Task) -> Result<TaskOutput, PoolError> {
        let Task {
            id: task_id,
            request,
            progress,
        } = task;
        let entry_id = lease.entry_id();
        let kind = request.kind();

        let sender = {
            let mut state = self.lock_state();
            if state.lifecycle == Lifecycle::Terminated {
                return Err(PoolError::Terminated);
            }
            state.counters.dispatched += 1;
            state.entries.get_mut(&entry_id).map(Entry::begin_task)
        };

        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();
        let envelope = Envelope {
            request_id: task_id,
            request,
            wants_progress: progress.is_some(),
            reply: reply_tx,
        };

        let started = Instant::now();
        let sent = match sender {
            Some(sender) => sender.send(envelope).is_ok(),
            None => false,
        };
        if !sent {
            lease.mark_compromised();
            {
                let mut state = self.lock_state();
                state.counters.crashes += 1;
                state.counters.record_failure();
            }
            warn!(entry = entry_id, task = %task_id, "worker thread gone before dispatch, recycling entry");
            return Err(PoolError::EntryCrashed {
                task_id,
                entry_id,
                reason: "worker thread is no longer running".to_string(),
            });
        }
        debug!(entry = entry_id, task = %task_id, kind = ?kind, "task dispatched");

        let ceiling = self.config.task_timeout();
        let outcome = tokio::time::timeout(ceiling, drain_replies(task_id, &mut reply_rx, progress.as_ref())).await;

        match outcome {
            Ok(Ok(output)) => {
                let elapsed = started.elapsed();
                self.lock_state().counters.record_completion(elapsed);
                debug!(entry = entry_id, task = %task_id, elapsed_ms = elapsed.as_millis() as u64, "task completed");
                Ok(output)
            }
            Ok(Err(Failure::Failed(error))) => {
                self.lock_state().counters.record_failure();
                debug!(entry = entry_id, task = %task_id, error = %error, "task failed");
                Err(PoolError::Context(error))
            }
            Ok(Err(Failure::Disconnected)) => {
                lease.mark_compromised();
                {
                    let mut state = self.lock_state();
                    state.counters.crashes += 1;
                    state.counters.record_failure();
                }
                warn!(entry = entry_id, task = %task_id, "entry crashed mid-task, recycling");
                Err(PoolError::EntryCrashed {
                    task_id,
                    entry_id,
                    reason: "worker thread terminated before replying".to_string(),
                })
            }
            Err(_) => {
                lease.mark_compromised();
                {
                    let mut state = self.lock_state();
                    state.counters.timeouts += 1;
                    state.counters.record_failure();
                }
                warn!(
                    entry = entry_id,
                    task = %task_id,
                    timeout_secs = ceiling.as_secs(),
                    "task exceeded timeout, recycling entry"
                );
                Err(PoolError::Timeout {
                    task_id,
                    after: ceiling,
                })
            }
        }
    }
}

/// Forward progress until the terminal reply for `task_id` arrives.
async fn drain_replies(
    task_id: TaskId,
    replies: &mut ReplyReceiver,
    progress: Option<&ProgressSender>,
) -> Result<TaskOutput, Failure> {
    while let Some(reply) = replies.recv().await {
        if reply.request_id() != task_id {
            warn!(expected = %task_id, got = %reply.request_id(), "dropping reply for another request");
            continue;
        }
        match reply {
            Reply::Progress { percent, stage, .. } => {
                if let Some(sender) = progress {
                    deliver(
                        sender,
                        ProgressEvent {
                            task_id,
                            percent,
                            stage,
                        },
                    );
                }
            }
            Reply::Ok { output, .. } => return Ok(output),
            Reply::Err { error, .. } => return Err(Failure::Failed(error)),
        }
    }
    Err(Failure::Disconnected)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl<H: TaskHandler> WorkerPool<H> {
    /// Run a task on the pool and wait for its result.
    ///
    /// Initializes the pool on first use. Waits in FIFO order when every
    /// entry is busy. Dropping the returned future while queued has no
    /// side effect; once dispatched the task runs to completion and its
    /// entry is returned to the pool.
    pub async fn submit(&self, task: Task) -> Result<TaskOutput, PoolError> {
        self.ensure_started();

        match self.acquire().await? {
            Grant::Entry(lease) => {
                let task_id = task.id;
                let inner = Arc::clone(&self.inner);
                tokio::spawn(inner.run_leased(lease, task))
                    .await
                    .map_err(|e| PoolError::Internal(format!("dispatch of task {task_id} aborted: {e}")))?
            }
            Grant::Fallback => self.run_inline(task),
            Grant::Terminated => Err(PoolError::Terminated),
        }
    }

    async fn acquire(&self) -> Result<Grant<H>, PoolError> {
        let waiter = {
            let mut state = self.inner.lock_state();
            if state.lifecycle == Lifecycle::Terminated {
                return Err(PoolError::Terminated);
            }
            if state.entries.is_empty() {
                return Ok(Grant::Fallback);
            }

            // Only jump ahead when nobody is already waiting.
            if state.live_waiters() == 0 {
                if let Some(id) = state.claim_idle() {
                    return Ok(Grant::Entry(EntryLease::new(Arc::clone(&self.inner), id)));
                }
                if let Some(id) = self.inner.grow(&mut state) {
                    return Ok(Grant::Entry(EntryLease::new(Arc::clone(&self.inner), id)));
                }
            }

            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            trace!(queued = state.waiters.len(), "all entries busy, task queued");
            rx
        };

        waiter.await.map_err(|_| PoolError::Terminated)
    }

    /// Same-thread execution through the very handler the entries run.
    fn run_inline(&self, task: Task) -> Result<TaskOutput, PoolError> {
        let Task {
            id: task_id,
            request,
            progress,
        } = task;
        debug!(task = %task_id, kind = ?request.kind(), "running task in the caller");

        let sink = progress.map(|sender| ChannelSink::new(task_id, sender));
        let reporter = ProgressReporter::new(sink.as_ref().map(|s| s as &dyn ProgressSink));
        let started = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.inner.handler.handle(&request, &reporter)));

        let mut state = self.inner.lock_state();
        state.counters.fallback += 1;
        match outcome {
            Ok(Ok(output)) => {
                state.counters.record_completion(started.elapsed());
                Ok(output)
            }
            Ok(Err(error)) => {
                state.counters.record_failure();
                Err(PoolError::Context(error))
            }
            Err(payload) => {
                state.counters.record_failure();
                let message = panic_message(payload.as_ref());
                warn!(task = %task_id, panic = %message, "handler panicked in the caller");
                Err(PoolError::Context(ContextError::Failed(format!("handler panicked: {message}"))))
            }
        }
    }
}
