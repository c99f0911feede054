use crate::error::ServiceError;
use crate::model::Message;
use crate::service::MessageQuery;
use crate::store::MessageStore;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Result of a `load_older` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A page was merged; the count is the number of messages actually added.
    Loaded(usize),
    /// Another load is in flight; nothing was requested.
    AlreadyLoading,
    /// History is exhausted for this room session; nothing was requested.
    Exhausted,
    /// The room switched while the page was in flight; the response was
    /// discarded.
    Stale,
}

/// Guarded entry point for fetching older history on scroll-to-top.
///
/// The controller is agnostic to scroll mechanics: the UI decides when to
/// call `load_older`, and the controller guarantees single-flight loading,
/// ascending insertion, and sticky exhaustion.
pub struct PaginationController {
    room_id: String,
    queries: Arc<dyn MessageQuery>,
    store: Arc<Mutex<MessageStore>>,
    loading: AtomicBool,
    epoch: Arc<AtomicU64>,
    session_epoch: u64,
    page_size: usize,
}

impl PaginationController {
    pub(crate) fn new(
        room_id: String,
        queries: Arc<dyn MessageQuery>,
        store: Arc<Mutex<MessageStore>>,
        epoch: Arc<AtomicU64>,
        session_epoch: u64,
        page_size: usize,
    ) -> Self {
        Self {
            room_id,
            queries,
            store,
            loading: AtomicBool::new(false),
            epoch,
            session_epoch,
            page_size,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    pub fn has_more_older(&self) -> bool {
        self.store.lock().has_more_older()
    }

    /// Fetch and merge one older page. No-op when a load is already in
    /// flight or history is exhausted. The current store size is the offset,
    /// so pages line up with what the client already holds.
    pub async fn load_older(&self) -> Result<LoadOutcome, ServiceError> {
        if !self.has_more_older() {
            return Ok(LoadOutcome::Exhausted);
        }
        if self.loading.swap(true, Ordering::SeqCst) {
            return Ok(LoadOutcome::AlreadyLoading);
        }
        let _guard = LoadingGuard(&self.loading);

        let offset = self.store.lock().len();
        let mut page: Vec<Message> = self
            .queries
            .older(&self.room_id, self.page_size, offset)
            .await?;
        if self.epoch.load(Ordering::SeqCst) != self.session_epoch {
            debug!(room = %self.room_id, "dropping stale history page");
            return Ok(LoadOutcome::Stale);
        }
        // Reverse-chronological on the wire; insertion wants ascending.
        page.sort_by_key(Message::sort_key);
        let mut store = self.store.lock();
        let before = store.len();
        store.prepend_older(&page);
        let added = store.len() - before;
        debug!(
            room = %self.room_id,
            added,
            exhausted = !store.has_more_older(),
            "history page merged"
        );
        Ok(LoadOutcome::Loaded(added))
    }
}

struct LoadingGuard<'a>(&'a AtomicBool);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
