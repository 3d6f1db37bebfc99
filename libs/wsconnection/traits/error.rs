use thiserror::Error;

/// Main error type for wsconnection
///
/// Only precondition and send failures surface as errors. Everything that
/// happens after `connect` returns is reported to the observer through
/// `on_close` instead.
#[derive(Error, Debug)]
pub enum WebSocketError {
    /// `connect` was called while a transport is still up
    #[error("already connected")]
    AlreadyConnected,

    /// No target URI was supplied
    #[error("WebSocket URI missing")]
    MissingUri,

    /// The target URI could not be parsed or has no host
    #[error("invalid WebSocket URI: {0}")]
    InvalidUri(String),

    /// The target URI scheme is neither `ws` nor `wss`
    #[error("unsupported scheme for WebSocket URI: {0}")]
    UnsupportedScheme(String),

    /// A send was attempted before the session reached the open state
    #[error("not connected")]
    NotConnected,

    /// A worker mailbox is gone
    #[error("Channel send error: {0}")]
    ChannelSend(String),

    /// A worker did not signal readiness
    #[error("worker failed to start: {0}")]
    WorkerStart(String),

    /// Frame encoding or decoding failed
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Underlying socket failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for wsconnection operations
pub type Result<T> = std::result::Result<T, WebSocketError>;
