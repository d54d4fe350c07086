//! Error types for the session layer.

/// Errors that can occur while reading or writing the local session handle.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The state directory could not be read or written.
    #[error("session storage failed: {0}")]
    Storage(#[from] std::io::Error),

    /// `handle.json` exists but does not parse.
    #[error("stored session handle is corrupt: {0}")]
    Corrupt(#[source] serde_json::Error),

    /// An operation needed an active handle and none is stored.
    #[error("no active session")]
    NoActiveSession,

    /// The stored handle is past its expiry.
    #[error("session expired at {0}")]
    Expired(chrono::DateTime<chrono::Utc>),
}
