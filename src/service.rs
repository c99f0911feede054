use crate::error::ServiceError;
use crate::model::{Message, MessageId};
use crate::send::Draft;
use async_trait::async_trait;
use std::sync::Arc;

/// Read side of the message collaborator.
///
/// Implementations own transport and persistence; the core only relies on the
/// contracts below. Pages from `older` arrive reverse-chronological and are
/// reversed by the caller.
#[async_trait]
pub trait MessageQuery: Send + Sync {
    /// The newest `limit` messages of a room, reverse-chronological.
    async fn recent(&self, room_id: &str, limit: usize) -> Result<Vec<Message>, ServiceError>;

    /// A history page of up to `limit` messages, skipping the newest
    /// `offset`, reverse-chronological.
    async fn older(
        &self,
        room_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Message>, ServiceError>;

    /// Messages newer than `after`. `None` means the whole room.
    async fn since(
        &self,
        room_id: &str,
        after: Option<MessageId>,
    ) -> Result<Vec<Message>, ServiceError>;
}

/// Write side of the message collaborator.
#[async_trait]
pub trait MessageCommand: Send + Sync {
    /// Submit a draft. Fails with `Validation` when body and attachment are
    /// both empty and `Authorization` when the caller is not a participant.
    async fn send(&self, draft: &Draft) -> Result<Message, ServiceError>;
}

/// Presence collaborator: who is online, process-wide.
#[async_trait]
pub trait PresenceQuery: Send + Sync {
    async fn list_online(&self) -> Result<Vec<String>, ServiceError>;
}

/// The collaborator bundle a chat client is built over.
#[derive(Clone)]
pub struct Services {
    pub queries: Arc<dyn MessageQuery>,
    pub commands: Arc<dyn MessageCommand>,
    pub presence: Arc<dyn PresenceQuery>,
}
