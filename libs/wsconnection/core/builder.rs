use crate::core::connection::{Collaborators, WebSocketConnection};
use crate::core::transport::{PlainSocketFactory, TlsSocketFactory};
use crate::rfc6455::Rfc6455Framing;
use crate::traits::*;
use std::sync::Arc;

/// Builder for [`WebSocketConnection`]
///
/// Every collaborator has a default, so `WebSocketConnection::builder().build()`
/// gives a plain/TLS client speaking RFC 6455.
///
/// # Example
/// ```ignore
/// let connection = WebSocketConnection::builder()
///     .headers(StaticHeaders(headers))
///     .secure_socket_factory(TlsSocketFactory::with_connector(connector))
///     .build();
/// ```
pub struct WebSocketConnectionBuilder {
    framing: Option<Arc<dyn Framing>>,
    plain_factory: Option<Arc<dyn SocketFactory>>,
    secure_factory: Option<Arc<dyn SocketFactory>>,
    headers: Option<Arc<dyn HeaderProvider>>,
    app_hook: Option<Arc<dyn AppMessageHook>>,
}

impl WebSocketConnectionBuilder {
    pub fn new() -> Self {
        Self {
            framing: None,
            plain_factory: None,
            secure_factory: None,
            headers: None,
            app_hook: None,
        }
    }

    /// Replace the frame codec
    pub fn framing(mut self, framing: impl Framing + 'static) -> Self {
        self.framing = Some(Arc::new(framing));
        self
    }

    /// Socket factory for `ws://` targets
    pub fn plain_socket_factory(mut self, factory: impl SocketFactory + 'static) -> Self {
        self.plain_factory = Some(Arc::new(factory));
        self
    }

    /// Socket factory for `wss://` targets
    pub fn secure_socket_factory(mut self, factory: impl SocketFactory + 'static) -> Self {
        self.secure_factory = Some(Arc::new(factory));
        self
    }

    /// Extra handshake headers, fetched again on every connection attempt
    pub fn headers(mut self, provider: impl HeaderProvider + 'static) -> Self {
        self.headers = Some(Arc::new(provider));
        self
    }

    /// Receiver for `InboundEvent::Application` events
    pub fn app_message_hook(mut self, hook: impl AppMessageHook + 'static) -> Self {
        self.app_hook = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> WebSocketConnection {
        WebSocketConnection::from_collaborators(Collaborators {
            framing: self.framing.unwrap_or_else(|| Arc::new(Rfc6455Framing)),
            plain_factory: self
                .plain_factory
                .unwrap_or_else(|| Arc::new(PlainSocketFactory)),
            secure_factory: self
                .secure_factory
                .unwrap_or_else(|| Arc::new(TlsSocketFactory::new())),
            header_provider: self.headers.unwrap_or_else(|| Arc::new(NoHeaders)),
            app_hook: self.app_hook.unwrap_or_else(|| Arc::new(NoOpHook)),
        })
    }
}

impl Default for WebSocketConnectionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
