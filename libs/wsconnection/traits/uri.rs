use crate::error::{Result, WebSocketError};
use std::fmt;
use url::Url;

const WS_URI_SCHEME: &str = "ws";
const WSS_URI_SCHEME: &str = "wss";
const WS_DEFAULT_PORT: u16 = 80;
const WSS_DEFAULT_PORT: u16 = 443;

/// URI scheme of a WebSocket endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// Plain `ws://`
    Ws,
    /// TLS `wss://`
    Wss,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Ws => WS_URI_SCHEME,
            Scheme::Wss => WSS_URI_SCHEME,
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Ws => WS_DEFAULT_PORT,
            Scheme::Wss => WSS_DEFAULT_PORT,
        }
    }

    pub fn is_secure(&self) -> bool {
        matches!(self, Scheme::Wss)
    }
}

/// Validated target of a WebSocket session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebSocketUri {
    url: Url,
    scheme: Scheme,
}

impl WebSocketUri {
    /// Parse and validate a `ws://` or `wss://` URI
    pub fn parse(uri: &str) -> Result<Self> {
        let uri = uri.trim();
        if uri.is_empty() {
            return Err(WebSocketError::MissingUri);
        }

        let url = Url::parse(uri).map_err(|e| WebSocketError::InvalidUri(format!("{uri}: {e}")))?;

        let scheme = if url.scheme().eq_ignore_ascii_case(WS_URI_SCHEME) {
            Scheme::Ws
        } else if url.scheme().eq_ignore_ascii_case(WSS_URI_SCHEME) {
            Scheme::Wss
        } else {
            return Err(WebSocketError::UnsupportedScheme(url.scheme().to_string()));
        };

        match url.host_str() {
            Some(host) if !host.is_empty() => {}
            _ => return Err(WebSocketError::InvalidUri(format!("{uri}: missing host"))),
        }

        Ok(Self { url, scheme })
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Host name, without IPv6 brackets
    pub fn host(&self) -> &str {
        let host = self.url.host_str().unwrap_or_default();
        host.trim_start_matches('[').trim_end_matches(']')
    }

    /// Explicit port, or the scheme default
    pub fn port(&self) -> u16 {
        self.url.port().unwrap_or_else(|| self.scheme.default_port())
    }

    /// Value for the `Host` header; the port is omitted when it is the default
    pub fn host_header(&self) -> String {
        let host = self.url.host_str().unwrap_or_default();
        match self.url.port() {
            Some(port) if port != self.scheme.default_port() => format!("{host}:{port}"),
            _ => host.to_string(),
        }
    }

    /// Request target: path plus query, never empty
    pub fn resource(&self) -> String {
        let path = match self.url.path() {
            "" => "/",
            path => path,
        };
        match self.url.query() {
            Some(query) => format!("{path}?{query}"),
            None => path.to_string(),
        }
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

impl fmt::Display for WebSocketUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}
