use crate::error::SendError;
use crate::model::{Attachment, Message};
use crate::service::MessageCommand;
use crate::session::SessionEvent;
use crate::store::MessageStore;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

/// A message being composed. The idempotency key is generated once per draft
/// so a retried submit of the same draft cannot create a second message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub room_id: String,
    pub body: Option<String>,
    pub attachment: Option<Attachment>,
    pub idempotency_key: String,
}

impl Draft {
    pub fn new(room_id: &str, body: Option<String>, attachment: Option<Attachment>) -> Self {
        Self {
            room_id: room_id.to_string(),
            body,
            attachment,
            idempotency_key: Uuid::new_v4().to_string(),
        }
    }

    /// At least one of body (non-blank) or attachment must be present.
    pub fn has_content(&self) -> bool {
        self.attachment.is_some()
            || self
                .body
                .as_deref()
                .map(|b| !b.trim().is_empty())
                .unwrap_or(false)
    }
}

/// Submits drafts for one room session and folds confirmed messages back into
/// the store. There is no optimistic insert: only server-confirmed messages
/// ever reach the store, through the same idempotent `append_new` path the
/// poller uses.
pub struct SendCommand {
    room_id: String,
    commands: Arc<dyn MessageCommand>,
    store: Arc<Mutex<MessageStore>>,
    events: broadcast::Sender<SessionEvent>,
    epoch: Arc<AtomicU64>,
    session_epoch: u64,
}

impl SendCommand {
    pub(crate) fn new(
        room_id: String,
        commands: Arc<dyn MessageCommand>,
        store: Arc<Mutex<MessageStore>>,
        events: broadcast::Sender<SessionEvent>,
        epoch: Arc<AtomicU64>,
        session_epoch: u64,
    ) -> Self {
        Self {
            room_id,
            commands,
            store,
            events,
            epoch,
            session_epoch,
        }
    }

    /// Validate and submit a draft. An empty draft is rejected before any
    /// network call; a server failure is returned as-is so the caller keeps
    /// the draft for retry.
    pub async fn send(&self, draft: &Draft) -> Result<Message, SendError> {
        if !draft.has_content() {
            return Err(SendError::Empty);
        }
        let message = self.commands.send(draft).await?;
        // The room may have switched while the request was in flight; the
        // message exists server-side but must not touch another room's store.
        if self.epoch.load(Ordering::SeqCst) != self.session_epoch {
            debug!(room = %self.room_id, "send resolved after room switch, not applied locally");
            return Ok(message);
        }
        let added = self.store.lock().append_new(vec![message.clone()]);
        if !added.is_empty() {
            let _ = self.events.send(SessionEvent::NewMessages {
                room_id: self.room_id.clone(),
                count: added.len(),
            });
        }
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct CountingCommand {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MessageCommand for CountingCommand {
        async fn send(&self, _draft: &Draft) -> Result<Message, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ServiceError::Network("unreachable".into()))
        }
    }

    #[test]
    fn draft_content_rules() {
        let empty = Draft::new("global", None, None);
        assert!(!empty.has_content());
        let blank = Draft::new("global", Some("   \n".into()), None);
        assert!(!blank.has_content());
        let text = Draft::new("global", Some("hi".into()), None);
        assert!(text.has_content());
        let attachment_only = Draft::new(
            "global",
            None,
            Some(Attachment {
                kind: crate::model::AttachmentKind::File,
                url: "/files/1".into(),
                file_name: "notes.pdf".into(),
                size_bytes: 1024,
                mime: Some("application/pdf".into()),
            }),
        );
        assert!(attachment_only.has_content());
    }

    #[tokio::test]
    async fn empty_draft_never_reaches_the_network() {
        let commands = Arc::new(CountingCommand {
            calls: AtomicUsize::new(0),
        });
        let (events, _) = broadcast::channel(8);
        let cmd = SendCommand::new(
            "global".into(),
            commands.clone(),
            Arc::new(Mutex::new(MessageStore::new(50))),
            events,
            Arc::new(AtomicU64::new(1)),
            1,
        );
        let err = cmd.send(&Draft::new("global", None, None)).await;
        assert_eq!(err, Err(SendError::Empty));
        assert_eq!(commands.calls.load(Ordering::SeqCst), 0);
    }
}
