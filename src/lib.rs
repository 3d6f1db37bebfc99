//! WebSocket client - main library
//!
//! ## Architecture
//!
//! - **wsconnection**: connection-lifecycle supervisor (re-exported from workspace)
//! - **bin_common**: configuration and logging helpers shared by the binaries
//!
//! ## Usage in Binaries
//!
//! ```rust,ignore
//! use websockets_client::bin_common::{load_config_from_env, ClientConfig, ConfigType};
//! use websockets_client::wsconnection::WebSocketConnection;
//! ```

// Re-export workspace libraries for convenience
pub use wsconnection;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;

    pub use cli::{init_tracing, load_config_from_env, parse_args, ClientConfig, ConfigError, ConfigType};
}
