use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    /// Never connected
    Disconnected = 0,
    /// Transport opener is working on a socket
    Connecting = 1,
    /// Socket is up, workers not started yet
    SocketUp = 2,
    /// Client handshake sent, waiting for the server answer
    Handshaking = 3,
    /// Handshake done, messages flow
    Open = 4,
    /// Close requested (by the application or the peer), waiting for the transport to drop
    Closing = 5,
    /// Torn down; may be revived by `connect` or `reconnect`
    Closed = 6,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionState::Disconnected,
            1 => ConnectionState::Connecting,
            2 => ConnectionState::SocketUp,
            3 => ConnectionState::Handshaking,
            4 => ConnectionState::Open,
            5 => ConnectionState::Closing,
            _ => ConnectionState::Closed,
        }
    }

    /// States in which the session owns a live transport
    pub fn has_transport(&self) -> bool {
        matches!(
            self,
            ConnectionState::SocketUp
                | ConnectionState::Handshaking
                | ConnectionState::Open
                | ConnectionState::Closing
        )
    }

    /// States from which `connect` may start a new attempt
    pub fn is_idle(&self) -> bool {
        matches!(self, ConnectionState::Disconnected | ConnectionState::Closed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "DISCONNECTED",
            ConnectionState::Connecting => "CONNECTING",
            ConnectionState::SocketUp => "SOCKET_UP",
            ConnectionState::Handshaking => "HANDSHAKING",
            ConnectionState::Open => "OPEN",
            ConnectionState::Closing => "CLOSING",
            ConnectionState::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}

/// Lock-free holder for the session state
///
/// Readers (`is_connected`, send paths) never take the session lock.
#[derive(Debug)]
pub struct AtomicConnectionState {
    state: AtomicU8,
}

impl AtomicConnectionState {
    pub fn new(state: ConnectionState) -> Self {
        Self {
            state: AtomicU8::new(state as u8),
        }
    }

    #[inline]
    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    #[inline]
    pub fn set(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Move from `current` to `new` only if nobody changed the state in between
    pub fn compare_exchange(
        &self,
        current: ConnectionState,
        new: ConnectionState,
    ) -> Result<ConnectionState, ConnectionState> {
        self.state
            .compare_exchange(current as u8, new as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(ConnectionState::from_u8)
            .map_err(ConnectionState::from_u8)
    }

    /// Claim the session for a new connect attempt
    ///
    /// Succeeds from DISCONNECTED or CLOSED and leaves the state at
    /// CONNECTING; returns the state that blocked the claim otherwise.
    pub fn try_begin_connect(&self) -> Result<(), ConnectionState> {
        let mut current = self.get();
        loop {
            if !current.is_idle() {
                return Err(current);
            }
            match self.compare_exchange(current, ConnectionState::Connecting) {
                Ok(_) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }

    #[inline]
    pub fn has_transport(&self) -> bool {
        self.get().has_transport()
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.get() == ConnectionState::Open
    }
}
