//! # wsconnection
//!
//! Connection-lifecycle supervisor for a WebSocket client.
//!
//! A [`WebSocketConnection`] owns one logical session: it opens the
//! transport on a dedicated task, runs a frame reader and a frame writer
//! on their own tasks, dispatches inbound events to a weakly held
//! [`SessionObserver`], classifies failures and reconnects after
//! connectivity loss when configured to.
//!
//! ## Features
//!
//! - **Task per worker**: transport opener, reader and writer each own a mailbox
//! - **Startup barriers**: no command is sent before its worker is ready
//! - **Ordered teardown**: reader, then writer, then transport, then `on_close`
//! - **Pluggable seams**: framing, socket factories, handshake headers, app message hook

pub mod traits;
pub mod core;
pub mod rfc6455;

// Re-export all traits
pub use traits::*;

// Re-export core functionality
pub use self::core::{
    builder, config, connection, connection_state, transport,
    builder::WebSocketConnectionBuilder,
    config::ConnectionOptions,
    connection::WebSocketConnection,
    connection_state::{AtomicConnectionState, ConnectionState},
    transport::{PlainSocketFactory, TlsSocketFactory, TransportOpener},
};

pub use rfc6455::Rfc6455Framing;
