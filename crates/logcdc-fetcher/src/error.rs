//! Error types for the fetch engine.
//!
//! ## Error Categories
//!
//! ### Transient-retryable
//! - `Rpc`: the fetch or missing-log RPC failed at the transport layer
//! - `Server`: the server answered with an error code
//!
//! Both map to a kick-out: the current server is blacklisted and the task
//! reassigned elsewhere.
//!
//! ### Stream-invalidating
//! - `LogNotSync`: the server no longer holds the stream position we asked
//!   for; the stream reopens from scratch on the next pass
//!
//! ### Fatal
//! - `Unexpected`: a protocol or internal invariant was violated; never
//!   retried automatically
//!
//! ### Distinguished statuses
//! - `Stopped`: cooperative shutdown observed; short-circuits every loop and
//!   must not be logged as an error
//! - `MissingLogs`: a log entry references entries not locally present; the
//!   caller runs missing-log resolution and re-consumes

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FetchError>;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("state does not match: expected {expected}, got {actual}")]
    StateMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("fetch rpc failed: {0}")]
    Rpc(#[from] tonic::Status),

    #[error("server returned error code {0}")]
    Server(i32),

    #[error("unexpected: {0}")]
    Unexpected(String),

    #[error("log entry references logs not yet fetched")]
    MissingLogs,

    #[error("log stream out of sync with server")]
    LogNotSync,

    #[error("stopped")]
    Stopped,
}

impl FetchError {
    /// Cooperative-shutdown status; callers must not treat it as a failure.
    pub fn is_stopped(&self) -> bool {
        matches!(self, FetchError::Stopped)
    }

    /// Failures worth retrying on a different server.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Rpc(_) | FetchError::Server(_))
    }
}
