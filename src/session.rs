use crate::config::ChatConfig;
use crate::error::SendError;
use crate::model::{Message, MessageId, PresenceSnapshot, TypingState};
use crate::pagination::{LoadOutcome, PaginationController};
use crate::presence::{self, PresenceHandle};
use crate::room::RoomKey;
use crate::send::{Draft, SendCommand};
use crate::service::Services;
use crate::store::MessageStore;
use crate::sync::{self, SyncContext, SyncHandle};
use crate::typing::TypingSignal;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Events published by the delivery core. The room-summary / unread cache in
/// the UI layer subscribes to `NewMessages` to know when to invalidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    NewMessages { room_id: String, count: usize },
    Connectivity { online: bool },
}

/// Process-wide entry point: holds the collaborator services, the presence
/// poller and the event channel, and opens room sessions.
///
/// The epoch counter is bumped on every room open and close; async
/// completions capture the epoch at request time and are discarded when it
/// has moved, which is what isolates a new room from stale responses that
/// resolve after the switch.
pub struct ChatClient {
    services: Services,
    config: ChatConfig,
    events: broadcast::Sender<SessionEvent>,
    epoch: Arc<AtomicU64>,
    presence: PresenceHandle,
}

impl ChatClient {
    pub fn new(services: Services, config: ChatConfig) -> Self {
        let (events, _) = broadcast::channel(128);
        let presence = presence::start(
            services.presence.clone(),
            config.presence_interval(),
            config.presence_freshness(),
        );
        Self {
            services,
            config,
            events,
            epoch: Arc::new(AtomicU64::new(0)),
            presence,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Latest presence snapshot (best-effort, possibly stale).
    pub fn presence(&self) -> PresenceSnapshot {
        self.presence.snapshot()
    }

    pub fn presence_handle(&self) -> &PresenceHandle {
        &self.presence
    }

    /// Open a room: hydrate a fresh store from the initial fetch and start
    /// the forward-sync poller. Any previously opened session becomes stale
    /// through the epoch bump; its in-flight responses will be dropped.
    ///
    /// A failed initial fetch is not fatal: the session starts empty and the
    /// poller backfills once connectivity returns.
    pub async fn open_room(&self, room_id: &str) -> RoomSession {
        let session_epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let key = RoomKey::resolve(room_id);
        let store = Arc::new(Mutex::new(MessageStore::new(self.config.page_size)));

        match self
            .services
            .queries
            .recent(room_id, self.config.initial_limit)
            .await
        {
            Ok(initial) => {
                let count = initial.len();
                store.lock().hydrate(initial);
                info!(room = %room_id, count, "room hydrated");
            }
            Err(err) => {
                warn!(room = %room_id, error = %err, "initial fetch failed, starting empty");
            }
        }

        let sync = sync::start(SyncContext {
            room_id: room_id.to_string(),
            queries: self.services.queries.clone(),
            store: store.clone(),
            events: self.events.clone(),
            epoch: self.epoch.clone(),
            session_epoch,
            interval: self.config.poll_interval(),
        });
        let pagination = PaginationController::new(
            room_id.to_string(),
            self.services.queries.clone(),
            store.clone(),
            self.epoch.clone(),
            session_epoch,
            self.config.page_size,
        );
        let sender = SendCommand::new(
            room_id.to_string(),
            self.services.commands.clone(),
            store.clone(),
            self.events.clone(),
            self.epoch.clone(),
            session_epoch,
        );
        let typing = TypingSignal::new(self.config.typing_quiet());

        RoomSession {
            room_id: room_id.to_string(),
            key,
            store,
            sync,
            pagination,
            sender,
            typing,
            epoch: self.epoch.clone(),
            session_epoch,
        }
    }
}

/// The active room's delivery session. Owns the message store exclusively;
/// switching rooms means closing this session and opening a new one — there
/// is no cross-room caching.
pub struct RoomSession {
    room_id: String,
    key: RoomKey,
    store: Arc<Mutex<MessageStore>>,
    sync: SyncHandle,
    pagination: PaginationController,
    sender: SendCommand,
    typing: TypingSignal,
    epoch: Arc<AtomicU64>,
    session_epoch: u64,
}

impl RoomSession {
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn key(&self) -> &RoomKey {
        &self.key
    }

    /// Snapshot of the current buffer in display (creation) order.
    pub fn messages(&self) -> Vec<Message> {
        self.store.lock().messages().to_vec()
    }

    pub fn message_count(&self) -> usize {
        self.store.lock().len()
    }

    pub fn is_online(&self) -> bool {
        self.sync.is_online()
    }

    pub fn has_more_older(&self) -> bool {
        self.pagination.has_more_older()
    }

    pub fn is_loading_older(&self) -> bool {
        self.pagination.is_loading()
    }

    /// Fetch one older history page. See [`PaginationController::load_older`].
    pub async fn load_older(&self) -> Result<LoadOutcome, crate::error::ServiceError> {
        self.pagination.load_older().await
    }

    /// Submit a draft to this room. See [`SendCommand::send`].
    pub async fn send(&self, draft: &Draft) -> Result<Message, SendError> {
        self.sender.send(draft).await
    }

    /// Register a local keystroke for the composing indicator.
    pub fn notify_typing(&self) {
        self.typing.notify_input();
    }

    pub fn typing_state(&self) -> TypingState {
        self.typing.state()
    }

    /// Messages after a read pointer, excluding the viewer's own. The UI's
    /// unread badge for this room.
    pub fn unread_from(&self, last_read: Option<MessageId>, viewer_id: &str) -> usize {
        self.store
            .lock()
            .messages()
            .iter()
            .filter(|m| last_read.map_or(true, |cursor| m.id > cursor))
            .filter(|m| m.author.id != viewer_id)
            .count()
    }

    /// Tear the session down: stop the poller, cancel the pending typing
    /// timeout and invalidate the epoch so in-flight responses are dropped.
    /// Idempotent, and implied by drop.
    pub fn close(&self) {
        self.sync.stop();
        self.typing.cancel();
        // Only invalidate if this session is still the active one; closing an
        // already superseded session must not disturb its successor.
        let _ = self.epoch.compare_exchange(
            self.session_epoch,
            self.session_epoch + 1,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }
}

impl Drop for RoomSession {
    fn drop(&mut self) {
        self.close();
    }
}
