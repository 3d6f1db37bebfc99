use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_MAX_PAYLOAD_SIZE: usize = 128 * 1024;
const DEFAULT_SOCKET_CONNECT_TIMEOUT: Duration = Duration::from_millis(6000);

/// Options for one WebSocket session
///
/// `connect` copies the options, so changing a caller-held value afterwards
/// has no effect on a session that is already running. Durations are
/// (de)serialized as milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionOptions {
    /// Largest frame payload accepted when receiving, and the fragment size when sending
    max_frame_payload_size: usize,

    /// Largest message payload accepted after reassembly
    max_message_payload_size: usize,

    /// Deliver text messages as raw UTF-8 through `on_raw_text_message`
    pub receive_text_messages_raw: bool,

    /// Disable Nagle's algorithm on the TCP socket
    pub tcp_no_delay: bool,

    /// Upper bound on the transport connect attempt
    #[serde(with = "millis", rename = "socket_connect_timeout_ms")]
    socket_connect_timeout: Duration,

    /// Reject text messages that are not valid UTF-8
    pub validate_incoming_utf8: bool,

    /// Mask client-to-server frames
    pub mask_client_frames: bool,

    /// Delay before reconnecting a dropped session, zero disables reconnection
    #[serde(with = "millis", rename = "reconnect_interval_ms")]
    pub reconnect_interval: Duration,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            max_frame_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            max_message_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            receive_text_messages_raw: false,
            tcp_no_delay: true,
            socket_connect_timeout: DEFAULT_SOCKET_CONNECT_TIMEOUT,
            validate_incoming_utf8: true,
            mask_client_frames: true,
            reconnect_interval: Duration::ZERO,
        }
    }
}

impl ConnectionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_frame_payload_size(&self) -> usize {
        self.max_frame_payload_size
    }

    pub fn max_message_payload_size(&self) -> usize {
        self.max_message_payload_size
    }

    pub fn socket_connect_timeout(&self) -> Duration {
        self.socket_connect_timeout
    }

    /// Set the frame payload limit; zero is ignored. The message limit grows to match.
    pub fn set_max_frame_payload_size(&mut self, size: usize) {
        if size > 0 {
            self.max_frame_payload_size = size;
            if self.max_message_payload_size < size {
                self.max_message_payload_size = size;
            }
        }
    }

    /// Set the message payload limit; zero is ignored. The frame limit shrinks to match.
    pub fn set_max_message_payload_size(&mut self, size: usize) {
        if size > 0 {
            self.max_message_payload_size = size;
            if size < self.max_frame_payload_size {
                self.max_frame_payload_size = size;
            }
        }
    }

    pub fn set_socket_connect_timeout(&mut self, timeout: Duration) {
        self.socket_connect_timeout = timeout;
    }

    pub fn with_socket_connect_timeout(mut self, timeout: Duration) -> Self {
        self.set_socket_connect_timeout(timeout);
        self
    }

    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    pub fn with_max_frame_payload_size(mut self, size: usize) -> Self {
        self.set_max_frame_payload_size(size);
        self
    }

    pub fn with_max_message_payload_size(mut self, size: usize) -> Self {
        self.set_max_message_payload_size(size);
        self
    }

    pub fn with_receive_text_messages_raw(mut self, raw: bool) -> Self {
        self.receive_text_messages_raw = raw;
        self
    }

    /// Deserialization skips the setters, so restore the frame ≤ message rule
    pub fn normalized(mut self) -> Self {
        if self.max_frame_payload_size == 0 {
            self.max_frame_payload_size = DEFAULT_MAX_PAYLOAD_SIZE;
        }
        if self.max_message_payload_size == 0 {
            self.max_message_payload_size = DEFAULT_MAX_PAYLOAD_SIZE;
        }
        if self.max_frame_payload_size > self.max_message_payload_size {
            self.max_message_payload_size = self.max_frame_payload_size;
        }
        self
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
