//! # Connection core
//!
//! The supervisor and the pieces it drives:
//!
//! - [`connection`]: `WebSocketConnection`, the session state machine and event dispatch
//! - [`transport`]: the transport opener task and the plain/TLS socket factories
//! - [`workers`]: frame reader and frame writer tasks with startup barriers
//! - [`connection_state`]: lock-free session state
//! - [`config`]: per-session `ConnectionOptions`
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use wsconnection::*;
//!
//! struct Printer;
//!
//! impl SessionObserver for Printer {
//!     fn on_open(&self) {
//!         println!("open");
//!     }
//!     fn on_close(&self, code: CloseNotification, reason: &str) {
//!         println!("closed: {} ({})", code, reason);
//!     }
//!     fn on_text_message(&self, payload: String) {
//!         println!("< {}", payload);
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let observer = Arc::new(Printer);
//!     let options = ConnectionOptions::default()
//!         .with_reconnect_interval(Duration::from_secs(2));
//!
//!     let connection = WebSocketConnection::new();
//!     connection
//!         .connect_with("wss://echo.example.com/", &[], &observer, &options)
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod config;
pub mod connection;
pub mod connection_state;
pub mod transport;
pub mod workers;

// Re-export main types
pub use builder::WebSocketConnectionBuilder;
pub use config::ConnectionOptions;
pub use connection::WebSocketConnection;
pub use connection_state::{AtomicConnectionState, ConnectionState};
pub use transport::{PlainSocketFactory, TlsSocketFactory, TransportOpener};
