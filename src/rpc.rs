use crate::error::ServiceError;
use crate::model::{Attachment, AttachmentKind, Author, Message, MessageId};
use crate::send::Draft;
use crate::service::{MessageCommand, MessageQuery, PresenceQuery};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

/// Abstract request/response transport to the remote-procedure API. The
/// concrete implementation (HTTP client, IPC bridge, ...) lives outside the
/// core.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn call(&self, method: &str, params: Value) -> Result<Value, ServiceError>;
}

/// Implements the typed collaborator traits over an [`RpcTransport`],
/// re-validating every payload at the boundary. Internal logic only ever
/// sees the typed model: a list entry that fails shape validation is dropped
/// with a warning rather than poisoning the whole page.
pub struct RpcChatService<T> {
    transport: T,
}

impl<T: RpcTransport> RpcChatService<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }
}

#[derive(Deserialize)]
struct WireMessage {
    id: u64,
    room_id: String,
    author_id: String,
    #[serde(default)]
    author_display: Option<String>,
    #[serde(default)]
    avatar_url: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    attachment: Option<WireAttachment>,
    created_at: i64,
}

#[derive(Deserialize)]
struct WireAttachment {
    kind: String,
    url: String,
    file_name: String,
    size_bytes: i64,
    #[serde(default)]
    mime: Option<String>,
}

impl WireMessage {
    fn into_message(self) -> Option<Message> {
        let attachment = match self.attachment {
            Some(raw) => {
                let kind = match raw.kind.as_str() {
                    "image" => AttachmentKind::Image,
                    "file" => AttachmentKind::File,
                    _ => return None,
                };
                Some(Attachment {
                    kind,
                    url: raw.url,
                    file_name: raw.file_name,
                    size_bytes: raw.size_bytes,
                    mime: raw.mime,
                })
            }
            None => None,
        };
        // a message carries text, an attachment, or both; neither is malformed
        if attachment.is_none() && self.body.as_deref().map_or(true, |b| b.is_empty()) {
            return None;
        }
        let display_name = self
            .author_display
            .unwrap_or_else(|| self.author_id.clone());
        Some(Message {
            id: MessageId(self.id),
            room_id: self.room_id,
            author: Author {
                id: self.author_id,
                display_name,
                avatar_url: self.avatar_url,
            },
            body: self.body,
            attachment,
            created_at: self.created_at,
        })
    }
}

fn decode_message(value: Value) -> Result<Message, ServiceError> {
    serde_json::from_value::<WireMessage>(value)
        .map_err(|e| ServiceError::Decode(e.to_string()))?
        .into_message()
        .ok_or_else(|| ServiceError::Decode("message without body or attachment".into()))
}

fn decode_message_list(value: Value) -> Result<Vec<Message>, ServiceError> {
    let entries = match value {
        Value::Array(entries) => entries,
        other => {
            return Err(ServiceError::Decode(format!(
                "expected message array, got {}",
                type_name(&other)
            )))
        }
    };
    let mut messages = Vec::with_capacity(entries.len());
    for entry in entries {
        match serde_json::from_value::<WireMessage>(entry) {
            Ok(wire) => match wire.into_message() {
                Some(msg) => messages.push(msg),
                None => warn!("dropping message entry without body or attachment"),
            },
            Err(err) => warn!(error = %err, "dropping malformed message entry"),
        }
    }
    Ok(messages)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[async_trait]
impl<T: RpcTransport> MessageQuery for RpcChatService<T> {
    async fn recent(&self, room_id: &str, limit: usize) -> Result<Vec<Message>, ServiceError> {
        let value = self
            .transport
            .call(
                "messages.get_recent",
                json!({ "room_id": room_id, "limit": limit }),
            )
            .await?;
        decode_message_list(value)
    }

    async fn older(
        &self,
        room_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Message>, ServiceError> {
        let value = self
            .transport
            .call(
                "messages.get_older",
                json!({ "room_id": room_id, "limit": limit, "offset": offset }),
            )
            .await?;
        decode_message_list(value)
    }

    async fn since(
        &self,
        room_id: &str,
        after: Option<MessageId>,
    ) -> Result<Vec<Message>, ServiceError> {
        let value = self
            .transport
            .call(
                "messages.get_since",
                json!({ "room_id": room_id, "after": after.map(|id| id.0) }),
            )
            .await?;
        decode_message_list(value)
    }
}

#[async_trait]
impl<T: RpcTransport> MessageCommand for RpcChatService<T> {
    async fn send(&self, draft: &Draft) -> Result<Message, ServiceError> {
        let value = self
            .transport
            .call(
                "messages.send",
                json!({
                    "room_id": draft.room_id,
                    "body": draft.body,
                    "attachment": draft.attachment,
                    "idempotency_key": draft.idempotency_key,
                }),
            )
            .await?;
        // a confirmed send must decode; here a shape error is a hard failure
        decode_message(value)
    }
}

#[derive(Deserialize)]
struct WireOnline {
    online_user_ids: Vec<Value>,
}

#[async_trait]
impl<T: RpcTransport> PresenceQuery for RpcChatService<T> {
    async fn list_online(&self) -> Result<Vec<String>, ServiceError> {
        let value = self.transport.call("presence.list_online", json!({})).await?;
        let wire: WireOnline =
            serde_json::from_value(value).map_err(|e| ServiceError::Decode(e.to_string()))?;
        Ok(wire
            .online_user_ids
            .into_iter()
            .filter_map(|entry| match entry {
                Value::String(id) => Some(id),
                other => {
                    warn!(entry = %other, "dropping non-string online user id");
                    None
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    struct ScriptedTransport {
        responses: Mutex<VecDeque<Value>>,
        calls: Mutex<Vec<(String, Value)>>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<Value>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl RpcTransport for ScriptedTransport {
        async fn call(&self, method: &str, params: Value) -> Result<Value, ServiceError> {
            self.calls.lock().push((method.to_string(), params));
            self.responses
                .lock()
                .pop_front()
                .ok_or_else(|| ServiceError::Network("no scripted response".into()))
        }
    }

    fn wire_msg(id: u64, body: &str) -> Value {
        json!({
            "id": id,
            "room_id": "global",
            "author_id": "user_abc",
            "author_display": "Alice",
            "body": body,
            "created_at": 100 + id,
        })
    }

    #[tokio::test]
    async fn malformed_entries_are_dropped_not_fatal() {
        let service = RpcChatService::new(ScriptedTransport::new(vec![json!([
            wire_msg(1, "one"),
            { "room_id": "global" },          // missing required fields
            json!({
                "id": 2,
                "room_id": "global",
                "author_id": "user_xyz",
                "created_at": 102,
            }),                                // no body, no attachment
            wire_msg(3, "three"),
        ])]));
        let messages = service.recent("global", 10).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, MessageId(1));
        assert_eq!(messages[1].id, MessageId(3));
        assert_eq!(messages[0].author.display_name, "Alice");
    }

    #[tokio::test]
    async fn non_array_page_is_a_decode_error() {
        let service = RpcChatService::new(ScriptedTransport::new(vec![json!({"oops": true})]));
        assert!(matches!(
            service.since("global", None).await,
            Err(ServiceError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn display_name_falls_back_to_author_id() {
        let service = RpcChatService::new(ScriptedTransport::new(vec![json!([json!({
            "id": 7,
            "room_id": "global",
            "author_id": "user_xyz",
            "body": "hi",
            "created_at": 107,
        })])]));
        let messages = service.recent("global", 10).await.unwrap();
        assert_eq!(messages[0].author.display_name, "user_xyz");
    }

    #[tokio::test]
    async fn send_carries_the_idempotency_key() {
        let transport = ScriptedTransport::new(vec![wire_msg(9, "hello")]);
        let draft = Draft::new("global", Some("hello".into()), None);
        let key = draft.idempotency_key.clone();
        let service = RpcChatService::new(transport);
        let message = service.send(&draft).await.unwrap();
        assert_eq!(message.id, MessageId(9));
        let calls = service.transport.calls.lock();
        assert_eq!(calls[0].0, "messages.send");
        assert_eq!(calls[0].1["idempotency_key"], json!(key));
    }

    #[tokio::test]
    async fn presence_drops_non_string_ids() {
        let service = RpcChatService::new(ScriptedTransport::new(vec![json!({
            "online_user_ids": ["user_abc", 42, "user_xyz"],
        })]));
        let online = service.list_online().await.unwrap();
        assert_eq!(online, vec!["user_abc".to_string(), "user_xyz".to_string()]);
    }
}
