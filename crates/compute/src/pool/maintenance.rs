use std::sync::Weak;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::context::TaskHandler;

use super::core::{Lifecycle, PoolInner, WorkerPool};
use super::entry::EntryId;

impl<H: TaskHandler> WorkerPool<H> {
    /// Evict entries idle for longer than the configured idle timeout.
    pub fn evict_idle(&self) -> usize {
        self.evict_idle_older_than(self.inner.config.idle_timeout())
    }

    /// Evict idle entries unused for at least `threshold`, longest idle first.
    ///
    /// Busy entries are never touched and the pool keeps at least
    /// `max(min_entries, 1)` entries.
    pub fn evict_idle_older_than(&self, threshold: Duration) -> usize {
        let mut state = self.inner.lock_state();
        if state.lifecycle != Lifecycle::Running {
            return 0;
        }

        let floor = self.inner.config.min_entries.max(1);
        let now = Instant::now();
        let mut candidates: Vec<(Duration, EntryId)> = state
            .entries
            .values()
            .filter(|e| !e.busy)
            .map(|e| (e.idle_for(now), e.id))
            .filter(|(idle, _)| *idle >= threshold)
            .collect();
        candidates.sort_by(|a, b| b.0.cmp(&a.0));

        let mut evicted = 0;
        for (idle, id) in candidates {
            if state.entries.len() <= floor {
                break;
            }
            state.entries.remove(&id);
            evicted += 1;
            debug!(entry = id, idle_secs = idle.as_secs(), "evicted idle entry");
        }

        if evicted > 0 {
            state.counters.evictions += evicted as u64;
            info!(evicted, remaining = state.entries.len(), "idle entries evicted");
        }
        evicted
    }

    /// Replace idle entries whose worker thread has died.
    ///
    /// Returns how many entries were replaced.
    pub fn health_check(&self) -> usize {
        let mut state = self.inner.lock_state();
        if state.lifecycle != Lifecycle::Running {
            return 0;
        }

        let dead: Vec<EntryId> = state
            .entries
            .values()
            .filter(|e| !e.busy && !e.is_alive())
            .map(|e| e.id)
            .collect();

        for &id in &dead {
            state.entries.remove(&id);
            state.counters.crashes += 1;
            warn!(entry = id, "entry failed health check, replacing");
            if let Some(entry) = self.inner.spawn_entry() {
                let new_id = entry.id;
                state.entries.insert(new_id, entry);
                self.inner.hand_off(&mut state, new_id);
            }
        }

        if !dead.is_empty() && state.entries.is_empty() {
            PoolInner::drain_to_fallback(&mut state);
        }
        dead.len()
    }
}

/// Periodic health check and idle eviction. Ends once the pool is dropped.
pub(super) async fn maintenance_loop<H: TaskHandler>(pool: Weak<PoolInner<H>>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let Some(inner) = pool.upgrade() else {
            break;
        };
        let handle = WorkerPool { inner };
        let replaced = handle.health_check();
        let evicted = handle.evict_idle();
        if replaced > 0 || evicted > 0 {
            debug!(replaced, evicted, "pool maintenance pass");
        }
    }
}
