use crate::error::ServiceError;
use crate::model::{Author, Message, MessageId};
use crate::room::RoomKey;
use crate::send::Draft;
use crate::service::{MessageCommand, MessageQuery, PresenceQuery};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use time::OffsetDateTime;

/// In-memory reference backend implementing all three collaborator traits.
/// Used by the demo binary and the test suite; real deployments talk to the
/// RPC services instead.
pub struct InMemoryBackend {
    local_user: Author,
    inner: Mutex<State>,
}

#[derive(Default)]
struct State {
    next_id: u64,
    /// Per-room logs, ascending by id.
    rooms: HashMap<String, Vec<Message>>,
    idempotency: HashMap<String, Message>,
    online: HashSet<String>,
}

impl InMemoryBackend {
    /// `local_user` is the authenticated caller on the command path.
    pub fn new(local_user: Author) -> Self {
        Self {
            local_user,
            inner: Mutex::new(State::default()),
        }
    }

    pub fn set_online(&self, user_id: &str, online: bool) {
        let mut state = self.inner.lock();
        if online {
            state.online.insert(user_id.to_string());
        } else {
            state.online.remove(user_id);
        }
    }

    /// Server-side insert that bypasses the command path, for simulating
    /// other participants.
    pub fn seed_message(&self, room_id: &str, author: Author, body: &str) -> Message {
        let mut state = self.inner.lock();
        insert_message(&mut state, room_id, author, Some(body.to_string()), None)
    }
}

fn insert_message(
    state: &mut State,
    room_id: &str,
    author: Author,
    body: Option<String>,
    attachment: Option<crate::model::Attachment>,
) -> Message {
    state.next_id += 1;
    let message = Message {
        id: MessageId(state.next_id),
        room_id: room_id.to_string(),
        author,
        body,
        attachment,
        created_at: OffsetDateTime::now_utc().unix_timestamp(),
    };
    state
        .rooms
        .entry(room_id.to_string())
        .or_default()
        .push(message.clone());
    message
}

#[async_trait]
impl MessageQuery for InMemoryBackend {
    async fn recent(&self, room_id: &str, limit: usize) -> Result<Vec<Message>, ServiceError> {
        let state = self.inner.lock();
        let log = state.rooms.get(room_id).map(Vec::as_slice).unwrap_or(&[]);
        let start = log.len().saturating_sub(limit);
        Ok(log[start..].iter().rev().cloned().collect())
    }

    async fn older(
        &self,
        room_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Message>, ServiceError> {
        let state = self.inner.lock();
        let log = state.rooms.get(room_id).map(Vec::as_slice).unwrap_or(&[]);
        let end = log.len().saturating_sub(offset);
        let start = end.saturating_sub(limit);
        Ok(log[start..end].iter().rev().cloned().collect())
    }

    async fn since(
        &self,
        room_id: &str,
        after: Option<MessageId>,
    ) -> Result<Vec<Message>, ServiceError> {
        let state = self.inner.lock();
        let log = state.rooms.get(room_id).map(Vec::as_slice).unwrap_or(&[]);
        Ok(log
            .iter()
            .filter(|m| after.map_or(true, |cursor| m.id > cursor))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl MessageCommand for InMemoryBackend {
    async fn send(&self, draft: &Draft) -> Result<Message, ServiceError> {
        if !draft.has_content() {
            return Err(ServiceError::Validation("empty_message".into()));
        }
        if let RoomKey::Private(a, b) = RoomKey::resolve(&draft.room_id) {
            if self.local_user.id != a && self.local_user.id != b {
                return Err(ServiceError::Authorization);
            }
        }
        let mut state = self.inner.lock();
        if let Some(existing) = state.idempotency.get(&draft.idempotency_key) {
            return Ok(existing.clone());
        }
        let message = insert_message(
            &mut state,
            &draft.room_id,
            self.local_user.clone(),
            draft.body.clone(),
            draft.attachment.clone(),
        );
        state
            .idempotency
            .insert(draft.idempotency_key.clone(), message.clone());
        Ok(message)
    }
}

#[async_trait]
impl PresenceQuery for InMemoryBackend {
    async fn list_online(&self) -> Result<Vec<String>, ServiceError> {
        Ok(self.inner.lock().online.iter().cloned().collect())
    }
}
