use thiserror::Error;

/// Failures at the collaborator boundary. Everything a query or command
/// service can produce is folded into this taxonomy; nothing else is allowed
/// to propagate into store mutation logic.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Transient transport failure. Flagged on the connectivity indicator and
    /// retried on the next scheduled tick, never surfaced as a blocking error.
    #[error("network failure: {0}")]
    Network(String),
    /// The server rejected the request payload.
    #[error("rejected: {0}")]
    Validation(String),
    /// The caller is not a participant of the room.
    #[error("not a participant of this room")]
    Authorization,
    /// The collaborator returned a payload the boundary could not parse.
    #[error("malformed payload: {0}")]
    Decode(String),
}

/// Errors surfaced to the UI from an explicit send. All variants are
/// recoverable; the typed input stays with the caller for retry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SendError {
    /// Rejected client-side before any network call.
    #[error("message needs a body or an attachment")]
    Empty,
    #[error(transparent)]
    Service(#[from] ServiceError),
}
