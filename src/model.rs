use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Server-assigned message identifier. Assigned in creation order, so within
/// a room a larger id always means a later message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Author {
    pub id: String,
    /// Display name with the email fallback already applied server-side.
    pub display_name: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Image,
    File,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub kind: AttachmentKind,
    pub url: String,
    pub file_name: String,
    pub size_bytes: i64,
    pub mime: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub room_id: String,
    pub author: Author,
    /// Optional: a message may carry only an attachment.
    pub body: Option<String>,
    pub attachment: Option<Attachment>,
    /// Unix timestamp, authoritative ordering key.
    pub created_at: i64,
}

impl Message {
    /// Compound ordering key. `created_at` is non-decreasing in id order as
    /// assigned by the server; the id breaks same-second ties.
    pub fn sort_key(&self) -> (i64, MessageId) {
        (self.created_at, self.id)
    }
}

/// Process-wide set of currently online users. Absence from the latest
/// snapshot means offline; there is no per-user TTL.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct PresenceSnapshot {
    pub online_user_ids: HashSet<String>,
}

impl PresenceSnapshot {
    pub fn total_online(&self) -> usize {
        self.online_user_ids.len()
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.online_user_ids.contains(user_id)
    }
}

/// Local composing indicator for the current user and room. Never transmitted
/// to other participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingState {
    Idle,
    Composing,
}
