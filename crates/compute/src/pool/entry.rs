use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use crate::context::TaskHandler;
use crate::metrics::EntrySnapshot;
use crate::progress::{ProgressReporter, ProgressSink};
use crate::protocol::{Envelope, Reply, ReplySender, TaskId};

pub type EntryId = u64;

/// One worker thread plus the bookkeeping the pool keeps about it.
///
/// Dropping an entry closes its request channel; the thread exits after
/// finishing whatever it is currently running.
pub(super) struct Entry {
    pub(super) id: EntryId,
    requests: std_mpsc::Sender<Envelope>,
    thread: thread::JoinHandle<()>,
    pub(super) busy: bool,
    pub(super) tasks_handled: u64,
    pub(super) last_used: Instant,
    pub(super) last_used_at: DateTime<Utc>,
    pub(super) created_at: DateTime<Utc>,
}

impl Entry {
    /// Spawn a named worker thread running `handler`.
    pub(super) fn spawn<H: TaskHandler>(
        id: EntryId,
        handler: Arc<H>,
        name_prefix: &str,
    ) -> std::io::Result<Self> {
        let (requests, inbox) = std_mpsc::channel::<Envelope>();
        let thread = thread::Builder::new()
            .name(format!("{name_prefix}-{id}"))
            .spawn(move || worker_loop(id, handler, inbox))?;

        let now = Utc::now();
        Ok(Self {
            id,
            requests,
            thread,
            busy: false,
            tasks_handled: 0,
            last_used: Instant::now(),
            last_used_at: now,
            created_at: now,
        })
    }

    /// Whether the worker thread is still running.
    pub(super) fn is_alive(&self) -> bool {
        !self.thread.is_finished()
    }

    pub(super) fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_used)
    }

    /// Stamp a dispatch and hand back a sender for the request.
    pub(super) fn begin_task(&mut self) -> std_mpsc::Sender<Envelope> {
        self.tasks_handled += 1;
        self.last_used = Instant::now();
        self.last_used_at = Utc::now();
        self.requests.clone()
    }

    /// Mark the entry idle after a task.
    pub(super) fn finish_task(&mut self) {
        self.busy = false;
        self.last_used = Instant::now();
        self.last_used_at = Utc::now();
    }

    /// Drop the request channel so the thread exits while the entry stays in the table.
    #[cfg(test)]
    pub(super) fn close_inbox(&mut self) {
        let (disconnected, _) = std_mpsc::channel();
        self.requests = disconnected;
    }

    pub(super) fn snapshot(&self) -> EntrySnapshot {
        EntrySnapshot {
            id: self.id,
            busy: self.busy,
            tasks_handled: self.tasks_handled,
            created_at: self.created_at,
            last_used_at: self.last_used_at,
        }
    }
}

/// Progress sink on the worker side: progress becomes a reply message.
struct ReplySink {
    request_id: TaskId,
    reply: ReplySender,
}

impl ProgressSink for ReplySink {
    fn emit(&self, percent: f64, stage: &str) {
        // The manager may already have given up on this task.
        let _ = self.reply.send(Reply::Progress {
            request_id: self.request_id,
            percent,
            stage: stage.to_string(),
        });
    }
}

/// Serve requests one at a time until the request channel closes.
///
/// A panic in the handler unwinds through here and drops the reply sender,
/// which the manager observes as a crash of this entry.
fn worker_loop<H: TaskHandler>(id: EntryId, handler: Arc<H>, inbox: std_mpsc::Receiver<Envelope>) {
    debug!(entry = id, "worker thread started");

    while let Ok(envelope) = inbox.recv() {
        let Envelope {
            request_id,
            request,
            wants_progress,
            reply,
        } = envelope;
        trace!(entry = id, task = %request_id, kind = ?request.kind(), "worker picked up request");

        let sink = ReplySink {
            request_id,
            reply: reply.clone(),
        };
        let reporter = ProgressReporter::new(if wants_progress {
            Some(&sink as &dyn ProgressSink)
        } else {
            None
        });

        let message = match handler.handle(&request, &reporter) {
            Ok(output) => Reply::Ok { request_id, output },
            Err(error) => Reply::Err { request_id, error },
        };
        let _ = reply.send(message);
    }

    debug!(entry = id, "worker thread exiting");
}
