use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use tracing::{debug, error};

/// Reason reported to [`SessionObserver::on_close`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseNotification {
    /// Application-initiated close completed
    Normal,
    /// Transport could not be established (factory failure or timeout)
    CannotConnect,
    /// Transport dropped after it was up
    ConnectionLost,
    /// Peer violated the WebSocket protocol
    ProtocolError,
    /// Local failure inside a worker
    InternalError,
    /// Server refused or botched the opening handshake
    ServerError,
    /// Session dropped and a reconnection has been scheduled
    Reconnect,
}

impl CloseNotification {
    /// Close reasons that may lead to a reconnection
    pub fn is_connectivity_failure(&self) -> bool {
        matches!(
            self,
            CloseNotification::CannotConnect | CloseNotification::ConnectionLost
        )
    }
}

impl fmt::Display for CloseNotification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CloseNotification::Normal => "NORMAL",
            CloseNotification::CannotConnect => "CANNOT_CONNECT",
            CloseNotification::ConnectionLost => "CONNECTION_LOST",
            CloseNotification::ProtocolError => "PROTOCOL_ERROR",
            CloseNotification::InternalError => "INTERNAL_ERROR",
            CloseNotification::ServerError => "SERVER_ERROR",
            CloseNotification::Reconnect => "RECONNECT",
        };
        f.write_str(name)
    }
}

/// Application callbacks for one WebSocket session
///
/// The supervisor only keeps a weak reference to the observer, so the
/// application decides how long it lives. Callbacks run on the supervisor's
/// dispatch task and should return quickly.
pub trait SessionObserver: Send + Sync {
    /// The opening handshake succeeded; messages may be sent from now on
    fn on_open(&self);

    /// The session is gone, or is being re-established when `code` is
    /// [`CloseNotification::Reconnect`]
    fn on_close(&self, code: CloseNotification, reason: &str);

    /// A text message arrived (text is not configured to be received raw)
    fn on_text_message(&self, payload: String);

    /// A text message arrived as raw UTF-8
    fn on_raw_text_message(&self, _payload: Vec<u8>) {}

    /// A binary message arrived
    fn on_binary_message(&self, _payload: Vec<u8>) {}
}

/// Non-owning handle to the session observer
///
/// Every dispatch upgrades the handle; a released observer is a normal
/// condition and the callback is simply skipped.
#[derive(Clone, Default)]
pub struct ObserverHandle {
    inner: Option<Weak<dyn SessionObserver>>,
}

impl ObserverHandle {
    pub fn new<O>(observer: &Arc<O>) -> Self
    where
        O: SessionObserver + 'static,
    {
        let weak: Weak<dyn SessionObserver> = Arc::downgrade(observer) as Weak<dyn SessionObserver>;
        Self { inner: Some(weak) }
    }

    /// Handle that never resolves to an observer
    pub fn detached() -> Self {
        Self { inner: None }
    }

    pub fn get(&self) -> Option<Arc<dyn SessionObserver>> {
        self.inner.as_ref().and_then(Weak::upgrade)
    }

    pub fn is_alive(&self) -> bool {
        self.get().is_some()
    }

    /// Run `f` against the observer if it is still alive
    ///
    /// Returns `false` when the observer was already released. A panic inside
    /// the callback is logged and swallowed.
    pub fn notify<F>(&self, callback: &'static str, f: F) -> bool
    where
        F: FnOnce(&dyn SessionObserver),
    {
        let Some(observer) = self.get() else {
            debug!("could not call {}() .. observer already released", callback);
            return false;
        };

        if catch_unwind(AssertUnwindSafe(|| f(observer.as_ref()))).is_err() {
            error!("observer panicked in {}()", callback);
        }
        true
    }
}

impl fmt::Debug for ObserverHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverHandle")
            .field("alive", &self.is_alive())
            .finish()
    }
}
