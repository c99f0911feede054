use crate::model::PresenceSnapshot;
use crate::service::PresenceQuery;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Process-wide presence poller. Refreshes the online set on a fixed slow
/// cadence; consumers read snapshots, never mutate them. Presence is
/// best-effort: a failed refresh keeps the previous snapshot (or an empty one
/// if none was ever fetched) instead of propagating the error.
pub struct PresenceHandle {
    state: Arc<PresenceState>,
    stop: CancellationToken,
    task: JoinHandle<()>,
}

struct PresenceState {
    snapshot: RwLock<PresenceSnapshot>,
    refreshed_at: RwLock<Option<Instant>>,
    freshness: Duration,
}

impl PresenceHandle {
    pub fn snapshot(&self) -> PresenceSnapshot {
        self.state.snapshot.read().clone()
    }

    pub fn total_online(&self) -> usize {
        self.state.snapshot.read().total_online()
    }

    /// Whether the current snapshot is within the freshness window. Consumers
    /// that want to avoid flicker can skip rendering stale values.
    pub fn is_fresh(&self) -> bool {
        self.state
            .refreshed_at
            .read()
            .map(|at| at.elapsed() <= self.state.freshness)
            .unwrap_or(false)
    }

    pub fn stop(&self) {
        self.stop.cancel();
        self.task.abort();
    }
}

impl Drop for PresenceHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Spawn the presence refresh loop. Runs independently of any message poll;
/// a hung message request never stalls a presence tick.
pub fn start(
    service: Arc<dyn PresenceQuery>,
    interval: Duration,
    freshness: Duration,
) -> PresenceHandle {
    let state = Arc::new(PresenceState {
        snapshot: RwLock::new(PresenceSnapshot::default()),
        refreshed_at: RwLock::new(None),
        freshness,
    });
    let stop = CancellationToken::new();
    let stop_child = stop.child_token();
    let task_state = state.clone();
    let task = tokio::spawn(async move {
        let mut tick = time::interval(interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = stop_child.cancelled() => break,
                _ = tick.tick() => {}
            }
            match service.list_online().await {
                Ok(user_ids) => {
                    let snapshot = PresenceSnapshot {
                        online_user_ids: user_ids.into_iter().collect(),
                    };
                    debug!(online = snapshot.total_online(), "presence refreshed");
                    *task_state.snapshot.write() = snapshot;
                    *task_state.refreshed_at.write() = Some(Instant::now());
                }
                Err(err) => {
                    warn!(error = %err, "presence refresh failed, keeping last snapshot");
                }
            }
        }
    });
    PresenceHandle { state, stop, task }
}
