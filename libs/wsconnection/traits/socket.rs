use crate::core::config::ConnectionOptions;
use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};

/// Byte stream a session runs over (plain TCP, TLS, or an in-memory pipe)
pub trait AsyncStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> AsyncStream for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

/// Connected transport handed from the opener to the supervisor
pub type Transport = Box<dyn AsyncStream>;

/// Creates connected byte streams
///
/// The transport opener picks the plain or the secure factory from the
/// URI scheme and calls it on its own task.
#[async_trait]
pub trait SocketFactory: Send + Sync {
    /// Connect to `host:port`
    ///
    /// `host` must be passed through untouched (not pre-resolved) so TLS
    /// factories can verify the server name.
    async fn create_socket(
        &self,
        host: &str,
        port: u16,
        options: &ConnectionOptions,
    ) -> io::Result<Transport>;
}
