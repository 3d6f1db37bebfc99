//! # wsconnection traits
//!
//! Vocabulary and seams shared by the supervisor and its collaborators:
//!
//! - **SessionObserver**: application callbacks, held weakly
//! - **Framing / FrameReader / FrameWriter**: the wire-level codec seam
//! - **SocketFactory**: plain and TLS stream construction
//! - **HeaderProvider**: extra handshake headers per attempt
//! - **ReconnectionStrategy**: delay between reconnection attempts
//! - **AppMessageHook**: sink for inbound events the supervisor ignores

pub mod error;
pub mod framing;
pub mod headers;
pub mod hook;
pub mod message;
pub mod observer;
pub mod reconnect;
pub mod socket;
pub mod uri;

// Re-export commonly used types
pub use error::{Result, WebSocketError};
pub use framing::{FrameReader, FrameWriter, Framing};
pub use headers::{HeaderProvider, Headers, NoHeaders, StaticHeaders};
pub use hook::{AppMessageHook, NoOpHook};
pub use message::{CloseCode, InboundEvent, OutboundCommand};
pub use observer::{CloseNotification, ObserverHandle, SessionObserver};
pub use reconnect::{
    strategy_for_interval, FixedDelay, NeverReconnect, ReconnectContext, ReconnectionStrategy,
};
pub use socket::{AsyncStream, SocketFactory, Transport};
pub use uri::{Scheme, WebSocketUri};
