//! Opening handshake: client request and server response

use crate::traits::*;
use bytes::{BufMut, BytesMut};
use thiserror::Error;
use tokio_tungstenite::tungstenite::handshake::derive_accept_key;
use tokio_tungstenite::tungstenite::http::header::{
    CONNECTION, HOST, SEC_WEBSOCKET_ACCEPT, SEC_WEBSOCKET_KEY, SEC_WEBSOCKET_PROTOCOL,
    SEC_WEBSOCKET_VERSION, UPGRADE,
};
use tokio_tungstenite::tungstenite::http::{self, HeaderMap, HeaderName, HeaderValue, Request};

/// Response head larger than this is treated as a protocol violation
pub const MAX_RESPONSE_HEAD: usize = 16 * 1024;

/// Header slots offered to the response parser
const MAX_RESPONSE_HEADERS: usize = 64;

const WEBSOCKET_VERSION: &str = "13";

#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("malformed handshake response: {0}")]
    Parse(#[from] httparse::Error),

    #[error("invalid handshake header: {0}")]
    Header(#[from] http::Error),
}

/// Build the HTTP upgrade request for `uri`
///
/// Extra headers are added in name order so requests are reproducible.
pub fn build_request(
    uri: &WebSocketUri,
    headers: &Headers,
    subprotocols: &[String],
    key: &str,
) -> Result<Request<()>> {
    let mut builder = Request::builder()
        .method("GET")
        .uri(uri.resource())
        .header(HOST, uri.host_header())
        .header(UPGRADE, "websocket")
        .header(CONNECTION, "Upgrade")
        .header(SEC_WEBSOCKET_KEY, key)
        .header(SEC_WEBSOCKET_VERSION, WEBSOCKET_VERSION);

    if !subprotocols.is_empty() {
        builder = builder.header(SEC_WEBSOCKET_PROTOCOL, subprotocols.join(", "));
    }

    let mut extra: Vec<_> = headers.iter().collect();
    extra.sort();
    for (name, value) in extra {
        builder = builder.header(name.as_str(), value.as_str());
    }

    builder
        .body(())
        .map_err(|e| WebSocketError::Protocol(format!("invalid handshake request: {}", e)))
}

/// Serialize the request head onto `dst`
pub fn encode_request(request: &Request<()>, dst: &mut BytesMut) {
    let target = request
        .uri()
        .path_and_query()
        .map(|target| target.as_str())
        .unwrap_or("/");

    dst.put_slice(b"GET ");
    dst.put_slice(target.as_bytes());
    dst.put_slice(b" HTTP/1.1\r\n");
    for (name, value) in request.headers() {
        dst.put_slice(name.as_str().as_bytes());
        dst.put_slice(b": ");
        dst.put_slice(value.as_bytes());
        dst.put_slice(b"\r\n");
    }
    dst.put_slice(b"\r\n");
}

/// Status line and headers of the server's answer
#[derive(Debug, Clone)]
pub struct HandshakeResponse {
    pub status_code: u16,
    pub reason: String,
    headers: HeaderMap,
}

impl HandshakeResponse {
    /// Parse a response head from the start of `src`
    ///
    /// Returns the head length together with the response, or `None` while
    /// the head is still incomplete.
    pub fn parse(src: &[u8]) -> std::result::Result<Option<(usize, Self)>, HandshakeError> {
        let mut slots = [httparse::EMPTY_HEADER; MAX_RESPONSE_HEADERS];
        let mut response = httparse::Response::new(&mut slots);

        let len = match response.parse(src)? {
            httparse::Status::Complete(len) => len,
            httparse::Status::Partial => return Ok(None),
        };
        let status_code = response.code.ok_or(httparse::Error::Status)?;

        let mut headers = HeaderMap::with_capacity(response.headers.len());
        for header in response.headers.iter() {
            let name = HeaderName::from_bytes(header.name.as_bytes()).map_err(http::Error::from)?;
            let value = HeaderValue::from_bytes(header.value).map_err(http::Error::from)?;
            headers.append(name, value);
        }

        Ok(Some((
            len,
            Self {
                status_code,
                reason: response.reason.unwrap_or_default().to_string(),
                headers,
            },
        )))
    }

    /// Header lookup, case-insensitive on the name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn is_switching_protocols(&self) -> bool {
        self.status_code == 101
    }

    /// `Sec-WebSocket-Accept` matches the key sent in the request
    pub fn accepts_key(&self, key: &str) -> bool {
        let expected = derive_accept_key(key.as_bytes());
        self.headers
            .get(SEC_WEBSOCKET_ACCEPT)
            .is_some_and(|accept| accept.as_bytes() == expected.as_bytes())
    }
}
