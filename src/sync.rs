use crate::service::MessageQuery;
use crate::session::SessionEvent;
use crate::store::MessageStore;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Everything one poller run needs. The epoch pair is the stale-response
/// guard: a tick whose request resolves after the active room moved on must
/// not touch the (already discarded) store.
pub(crate) struct SyncContext {
    pub room_id: String,
    pub queries: Arc<dyn MessageQuery>,
    pub store: Arc<Mutex<MessageStore>>,
    pub events: broadcast::Sender<SessionEvent>,
    pub epoch: Arc<AtomicU64>,
    pub session_epoch: u64,
    pub interval: Duration,
}

/// Handle to a running forward-sync poller. Owned by the room session; once
/// `stop` returns no further tick can mutate the store.
pub struct SyncHandle {
    stop: CancellationToken,
    task: JoinHandle<()>,
    online: Arc<AtomicBool>,
}

impl SyncHandle {
    /// Connectivity indicator: true after the last tick succeeded.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.stop.cancel();
        self.task.abort();
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Spawn the fixed-interval forward-sync loop for a room.
///
/// Each tick asks for messages newer than the store tail. The cursor is read
/// from the store at tick time, never cached, so messages added through the
/// send path advance it too. A failed tick flips connectivity and retries on
/// the next tick; there is no backoff escalation.
pub(crate) fn start(ctx: SyncContext) -> SyncHandle {
    let stop = CancellationToken::new();
    let stop_child = stop.child_token();
    let online = Arc::new(AtomicBool::new(true));
    let online_task = online.clone();
    let task = tokio::spawn(async move {
        let mut tick = time::interval(ctx.interval);
        // A slow request must not trigger a catch-up burst of ticks.
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = stop_child.cancelled() => break,
                _ = tick.tick() => {}
            }
            let cursor = ctx.store.lock().last_id();
            let result = ctx.queries.since(&ctx.room_id, cursor).await;
            if stop_child.is_cancelled()
                || ctx.epoch.load(Ordering::SeqCst) != ctx.session_epoch
            {
                debug!(room = %ctx.room_id, "dropping stale poll response");
                break;
            }
            match result {
                Ok(batch) => {
                    set_online(&online_task, true, &ctx.events);
                    let added = ctx.store.lock().append_new(batch);
                    if !added.is_empty() {
                        debug!(room = %ctx.room_id, count = added.len(), "poll delivered new messages");
                        let _ = ctx.events.send(SessionEvent::NewMessages {
                            room_id: ctx.room_id.clone(),
                            count: added.len(),
                        });
                    }
                }
                Err(err) => {
                    warn!(room = %ctx.room_id, error = %err, "poll tick failed, will retry");
                    set_online(&online_task, false, &ctx.events);
                }
            }
        }
    });
    SyncHandle { stop, task, online }
}

fn set_online(flag: &AtomicBool, value: bool, events: &broadcast::Sender<SessionEvent>) {
    if flag.swap(value, Ordering::SeqCst) != value {
        let _ = events.send(SessionEvent::Connectivity { online: value });
    }
}
