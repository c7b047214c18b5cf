//! Client error types

use thiserror::Error;

/// Errors produced by relay connections and the pool.
#[derive(Error, Debug)]
pub enum RelayError {
    /// WebSocket transport error
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// Relay address could not be normalized
    #[error("invalid relay url: {0}")]
    InvalidUrl(String),

    /// Connection attempt exceeded the configured timeout
    #[error("relay connection timed out")]
    ConnectionTimeout,

    /// No OK acknowledgement arrived within the publish timeout
    #[error("publish timed out")]
    PublishTimeout,

    /// No COUNT reply arrived within the configured count timeout
    #[error("count timed out")]
    CountTimeout,

    /// `send` was called before any connection attempt was started
    #[error("sending on closed connection")]
    NotConnected,

    /// The connection was torn down while the operation was pending
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Relay replied `OK,false` with the given reason
    #[error("event rejected: {0}")]
    Rejected(String),

    /// `auth` was called before the relay sent a challenge
    #[error("can't perform auth, no challenge was received")]
    NoChallenge,

    /// Caller-supplied signer failed
    #[error("signer error: {0}")]
    Signer(String),

    /// Same relay address appeared twice in one fan-out request
    #[error("duplicate url")]
    DuplicateUrl,

    /// Serialization error
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Wire message could not be encoded
    #[error("message error: {0}")]
    Message(#[from] crate::message::MessageError),

    /// URL parse error
    #[error("url parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, RelayError>;
