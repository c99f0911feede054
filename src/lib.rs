//! Multi-room chat delivery core.
//!
//! Thin UI layers sit on top of this crate: it resolves a logical room from
//! its opaque key, keeps a client-held message buffer reconciled against the
//! server source of truth by polling, merges out-of-order arrivals
//! idempotently, paginates history on demand and derives ephemeral
//! presence/typing signals. Transport, persistence and auth belong to the
//! collaborator services behind the traits in [`service`].

pub mod config;
pub mod error;
pub mod memory;
pub mod model;
pub mod pagination;
pub mod presence;
pub mod room;
pub mod rpc;
pub mod send;
pub mod service;
pub mod session;
pub mod store;
pub mod sync;
pub mod typing;

pub use config::{ChatConfig, Cli};
pub use error::{SendError, ServiceError};
pub use model::{Attachment, AttachmentKind, Author, Message, MessageId, PresenceSnapshot, TypingState};
pub use pagination::LoadOutcome;
pub use room::RoomKey;
pub use send::Draft;
pub use service::Services;
pub use session::{ChatClient, RoomSession, SessionEvent};
