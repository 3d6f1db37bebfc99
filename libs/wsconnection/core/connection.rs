//! Connection supervisor
//!
//! Owns one logical WebSocket session: transport establishment, opening
//! handshake, event dispatch, failure classification, reconnection and
//! teardown.
//!
//! ```text
//!                     ┌──────────────────┐
//!  connect ─────────▶ │ TransportOpener  │ ──▶ Transport
//!                     └──────────────────┘        │ split
//!                          ┌──────────────────────┴──────────┐
//!                          ▼                                  ▼
//!                   ┌─────────────┐                   ┌─────────────┐
//!                   │ FrameReader │                   │ FrameWriter │ ◀── send_* / Pong / Close
//!                   └─────────────┘                   └─────────────┘
//!                          │ SessionEvent (generation-tagged)
//!                          ▼
//!                   ┌─────────────┐
//!                   │  dispatch   │ ──▶ SessionObserver (weak)
//!                   └─────────────┘
//! ```

use crate::core::builder::WebSocketConnectionBuilder;
use crate::core::config::ConnectionOptions;
use crate::core::connection_state::{AtomicConnectionState, ConnectionState};
use crate::core::transport::TransportOpener;
use crate::core::workers::{spawn_reader, spawn_writer, ReaderHandle, SessionEvent, WriterHandle};
use crate::traits::*;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const CANNOT_CONNECT_REASON: &str = "could not connect to WebSockets server";
const CLOSED_BEFORE_HANDSHAKE_REASON: &str = "closed before the opening handshake";

/// Mutable session data, guarded by one lock that is never held across an await
struct Session {
    target: Option<WebSocketUri>,
    subprotocols: Vec<String>,
    options: ConnectionOptions,
    observer: ObserverHandle,

    /// A handshake succeeded since the last explicit connect
    ever_opened: bool,
    /// A transport was established since the last explicit connect
    was_connected: bool,
    /// The application asked for the close in progress
    app_closing: bool,

    /// Bumped on every connect attempt; events from older attempts are dropped
    generation: u64,
    /// Failure reported while the workers were still being installed
    setup_failure: Option<(CloseNotification, String)>,
    /// `disconnect` arrived before the workers were installed
    pending_close: bool,

    reconnect_attempt: usize,
    /// Bumped whenever a pending reconnection must be abandoned
    reconnect_epoch: u64,
    reconnect_timer: Option<JoinHandle<()>>,

    opener: Option<TransportOpener>,
    reader: Option<ReaderHandle>,
    writer: Option<WriterHandle>,
}

impl Session {
    fn new() -> Self {
        Self {
            target: None,
            subprotocols: Vec::new(),
            options: ConnectionOptions::default(),
            observer: ObserverHandle::detached(),
            ever_opened: false,
            was_connected: false,
            app_closing: false,
            generation: 0,
            setup_failure: None,
            pending_close: false,
            reconnect_attempt: 0,
            reconnect_epoch: 0,
            reconnect_timer: None,
            opener: None,
            reader: None,
            writer: None,
        }
    }

    fn cancel_reconnect(&mut self) {
        self.reconnect_epoch += 1;
        if let Some(timer) = self.reconnect_timer.take() {
            debug!("pending reconnection cancelled");
            timer.abort();
        }
    }
}

/// Collaborators chosen when the connection is built
pub(crate) struct Collaborators {
    pub framing: Arc<dyn Framing>,
    pub plain_factory: Arc<dyn SocketFactory>,
    pub secure_factory: Arc<dyn SocketFactory>,
    pub header_provider: Arc<dyn HeaderProvider>,
    pub app_hook: Arc<dyn AppMessageHook>,
}

struct Supervisor {
    state: AtomicConnectionState,
    session: Mutex<Session>,
    collaborators: Collaborators,
    events: mpsc::UnboundedSender<SessionEvent>,
    /// Taken by the dispatch task when it starts
    event_mailbox: Mutex<Option<mpsc::UnboundedReceiver<SessionEvent>>>,
    dispatch: Mutex<Option<JoinHandle<()>>>,
    this: Weak<Supervisor>,
}

/// WebSocket client connection
///
/// One connection manages exactly one logical session at a time. It can be
/// reused: after `disconnect` (or any failure) `connect` and `reconnect`
/// start a new session.
///
/// # Example
/// ```ignore
/// let connection = WebSocketConnection::new();
/// let observer = Arc::new(MyObserver::default());
///
/// connection.connect("ws://127.0.0.1:9001/chat", &observer).await?;
/// // on_open fires once the handshake completes
/// connection.send_text_message("hello")?;
/// connection.disconnect();
/// ```
pub struct WebSocketConnection {
    inner: Arc<Supervisor>,
}

impl Default for WebSocketConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl WebSocketConnection {
    /// Connection with the default RFC 6455 framing and socket factories
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> WebSocketConnectionBuilder {
        WebSocketConnectionBuilder::new()
    }

    pub(crate) fn from_collaborators(collaborators: Collaborators) -> Self {
        let (events, event_mailbox) = mpsc::unbounded_channel();
        let inner = Arc::new_cyclic(|this| Supervisor {
            state: AtomicConnectionState::new(ConnectionState::Disconnected),
            session: Mutex::new(Session::new()),
            collaborators,
            events,
            event_mailbox: Mutex::new(Some(event_mailbox)),
            dispatch: Mutex::new(None),
            this: this.clone(),
        });
        Self { inner }
    }

    /// Connect with default options and no subprotocols
    pub async fn connect<O>(&self, uri: &str, observer: &Arc<O>) -> Result<()>
    where
        O: SessionObserver + 'static,
    {
        self.connect_with(uri, &[], observer, &ConnectionOptions::default())
            .await
    }

    /// Connect to `uri`
    ///
    /// Returns an error only when a precondition fails. Otherwise the call
    /// waits until the transport attempt resolves (bounded by the connect
    /// timeout); every later outcome is reported through the observer.
    /// The options are copied.
    pub async fn connect_with<O>(
        &self,
        uri: &str,
        subprotocols: &[&str],
        observer: &Arc<O>,
        options: &ConnectionOptions,
    ) -> Result<()>
    where
        O: SessionObserver + 'static,
    {
        let state = self.inner.state.get();
        if !state.is_idle() {
            warn!("connect rejected, session is {}", state);
            return Err(WebSocketError::AlreadyConnected);
        }

        let target = WebSocketUri::parse(uri)?;

        if let Err(state) = self.inner.state.try_begin_connect() {
            warn!("connect rejected, session is {}", state);
            return Err(WebSocketError::AlreadyConnected);
        }

        {
            let mut session = self.inner.session.lock();
            session.cancel_reconnect();
            session.target = Some(target);
            session.subprotocols = subprotocols.iter().map(|s| s.to_string()).collect();
            session.options = options.clone().normalized();
            session.observer = ObserverHandle::new(observer);
            session.ever_opened = false;
            session.was_connected = false;
            session.reconnect_attempt = 0;
        }

        self.inner.ensure_dispatch();
        self.inner.open_session().await;
        Ok(())
    }

    /// Close the session gracefully
    ///
    /// Sends a normal Close and cancels any pending reconnection. The
    /// observer gets `on_close(NORMAL)` once the transport drops. Calling it
    /// again, or when nothing is connected, only logs.
    pub fn disconnect(&self) {
        self.inner.disconnect();
    }

    /// Start a new session to the last target, unless one is already up
    pub async fn reconnect(&self) -> bool {
        self.inner.ensure_dispatch();
        self.inner.reconnect().await
    }

    /// A transport is up (handshaking, open or closing)
    pub fn is_connected(&self) -> bool {
        self.inner.state.has_transport()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.inner.state.get()
    }

    pub fn send_text_message(&self, payload: impl Into<String>) -> Result<()> {
        self.inner
            .send_when_open(OutboundCommand::TextMessage(payload.into()))
    }

    /// Send pre-encoded UTF-8 as a text message
    pub fn send_raw_text_message(&self, payload: impl Into<Vec<u8>>) -> Result<()> {
        self.inner
            .send_when_open(OutboundCommand::RawTextMessage(payload.into()))
    }

    pub fn send_binary_message(&self, payload: impl Into<Vec<u8>>) -> Result<()> {
        self.inner
            .send_when_open(OutboundCommand::BinaryMessage(payload.into()))
    }

    pub fn send_ping(&self, payload: impl Into<Vec<u8>>) -> Result<()> {
        self.inner.send_when_open(OutboundCommand::Ping(payload.into()))
    }
}

impl Drop for WebSocketConnection {
    fn drop(&mut self) {
        if let Some(dispatch) = self.inner.dispatch.lock().take() {
            dispatch.abort();
        }
        self.inner.session.lock().cancel_reconnect();
    }
}

impl Supervisor {
    fn ensure_dispatch(&self) {
        let mut dispatch = self.dispatch.lock();
        if dispatch.is_some() {
            return;
        }
        if let Some(mailbox) = self.event_mailbox.lock().take() {
            *dispatch = Some(tokio::spawn(run_dispatch(self.this.clone(), mailbox)));
        }
    }

    async fn reconnect(&self) -> bool {
        if self.session.lock().target.is_none() {
            debug!("reconnect ignored, no previous target");
            return false;
        }
        if let Err(state) = self.state.try_begin_connect() {
            debug!("reconnect ignored, session is {}", state);
            return false;
        }

        info!("reconnecting");
        self.open_session().await;
        true
    }

    async fn fire_reconnect(&self, epoch: u64) {
        {
            let mut session = self.session.lock();
            if session.reconnect_epoch != epoch {
                debug!("reconnection timer expired after it was cancelled");
                return;
            }
            // Detach rather than abort, this task is the timer itself
            session.reconnect_timer = None;
        }
        self.reconnect().await;
    }

    /// Run one connect attempt; the state is CONNECTING on entry
    async fn open_session(&self) {
        let (target, subprotocols, options, generation) = {
            let mut session = self.session.lock();
            session.generation += 1;
            session.app_closing = false;
            session.setup_failure = None;
            session.pending_close = false;
            match session.target.clone() {
                Some(target) => (
                    target,
                    session.subprotocols.clone(),
                    session.options.clone(),
                    session.generation,
                ),
                None => {
                    drop(session);
                    self.state.set(ConnectionState::Closed);
                    return;
                }
            }
        };

        info!("connecting to {}", target);

        let opener = match TransportOpener::start(
            self.collaborators.plain_factory.clone(),
            self.collaborators.secure_factory.clone(),
        )
        .await
        {
            Ok(opener) => opener,
            Err(e) => {
                error!("could not start transport opener: {}", e);
                self.close_without_transport(CloseNotification::InternalError, &e.to_string());
                return;
            }
        };

        let attempt = opener.request_connect(&target, &options);
        let transport = match tokio::time::timeout(options.socket_connect_timeout(), attempt).await {
            Ok(Ok(Ok(transport))) => transport,
            Ok(Ok(Err(reason))) => {
                opener.request_stop();
                self.close_without_transport(CloseNotification::CannotConnect, &reason);
                return;
            }
            Ok(Err(_)) => {
                opener.request_stop();
                self.close_without_transport(CloseNotification::CannotConnect, CANNOT_CONNECT_REASON);
                return;
            }
            Err(_) => {
                warn!(
                    "transport not ready after {:?}, giving up",
                    options.socket_connect_timeout()
                );
                opener.request_stop();
                self.close_without_transport(CloseNotification::CannotConnect, CANNOT_CONNECT_REASON);
                return;
            }
        };

        self.state.set(ConnectionState::SocketUp);
        {
            let mut session = self.session.lock();
            session.was_connected = true;
            session.opener = Some(opener);
        }

        let (input, output) = tokio::io::split(transport);
        let (reader, writer) = self.collaborators.framing.attach(input, output, &options);

        let reader = spawn_reader(reader, generation, self.events.clone()).await;
        let writer = spawn_writer(writer, generation, self.events.clone()).await;

        let startup_error = match (&reader, &writer) {
            (Err(e), _) | (_, Err(e)) => Some(e.to_string()),
            _ => None,
        };

        let (setup_failure, pending_close) = {
            let mut session = self.session.lock();
            session.reader = reader.ok();
            session.writer = writer.ok();
            self.state.set(ConnectionState::Handshaking);
            (
                session.setup_failure.take(),
                std::mem::take(&mut session.pending_close),
            )
        };

        if let Some(cause) = startup_error {
            error!("worker startup failed: {}", cause);
            self.fail_connection(generation, CloseNotification::InternalError, cause)
                .await;
            return;
        }
        if let Some((code, reason)) = setup_failure {
            self.fail_connection(generation, code, reason).await;
            return;
        }
        if pending_close {
            info!("close requested before the handshake, not sending it");
            if let Err(e) = self.forward(OutboundCommand::close_normal()) {
                debug!("could not send Close: {}", e);
            }
            self.fail_connection(
                generation,
                CloseNotification::Normal,
                CLOSED_BEFORE_HANDSHAKE_REASON.to_string(),
            )
            .await;
            return;
        }

        let headers = self.collaborators.header_provider.get_headers().await;
        let handshake = OutboundCommand::ClientHandshake {
            uri: target,
            headers,
            subprotocols,
        };

        let sent = {
            let session = self.session.lock();
            match &session.writer {
                Some(writer) if session.generation == generation => writer.send(handshake),
                _ => Err(WebSocketError::NotConnected),
            }
        };
        match sent {
            Ok(()) => debug!("client handshake queued"),
            Err(e) => debug!("client handshake not sent: {}", e),
        }
    }

    /// Close a session that never got a transport
    fn close_without_transport(&self, code: CloseNotification, reason: &str) {
        self.state.set(ConnectionState::Closed);
        self.on_close(code, reason);
    }

    /// Tear the session down and report `code` exactly once
    ///
    /// Order: reader stopped and joined, writer quit and joined, transport
    /// handed back to the opener for closing, opener stopped, then the close
    /// callback.
    async fn fail_connection(&self, generation: u64, code: CloseNotification, reason: String) {
        let (reader, writer, opener, code) = {
            let mut session = self.session.lock();
            if session.generation != generation {
                debug!("failure from a previous session ignored ({})", code);
                return;
            }
            match self.state.get() {
                ConnectionState::Closed | ConnectionState::Disconnected => {
                    debug!("session already closed, {} ignored", code);
                    return;
                }
                ConnectionState::SocketUp => {
                    if session.setup_failure.is_none() {
                        session.setup_failure = Some((code, reason));
                    }
                    return;
                }
                _ => {}
            }

            let code = if code == CloseNotification::ConnectionLost && session.app_closing {
                CloseNotification::Normal
            } else {
                code
            };

            self.state.set(ConnectionState::Closing);
            (
                session.reader.take(),
                session.writer.take(),
                session.opener.take(),
                code,
            )
        };

        info!("fail connection [code = {}, reason = {}]", code, reason);

        let input = match reader {
            Some(reader) => reader.stop_and_join().await,
            None => {
                debug!("no reader to stop");
                None
            }
        };

        let output = match writer {
            Some(writer) => writer.quit_and_join().await,
            None => {
                debug!("no writer to quit");
                None
            }
        };

        let transport = match (input, output) {
            (Some(input), Some(output)) => Some(input.unsplit(output)),
            _ => None,
        };

        match opener {
            Some(opener) => {
                match transport {
                    Some(transport) => opener.request_close(transport),
                    None => debug!("transport halves lost, dropped in place"),
                }
                opener.request_stop();
            }
            None => debug!("no transport opener to stop"),
        }

        self.state.set(ConnectionState::Closed);
        debug!("worker threads stopped");

        self.on_close(code, &reason);
    }

    /// Report a close, substituting RECONNECT when a reconnection is armed
    fn on_close(&self, code: CloseNotification, reason: &str) {
        let (observer, reconnecting) = {
            let mut session = self.session.lock();
            let context = ReconnectContext {
                reason: code,
                ever_opened: session.ever_opened,
                was_connected: session.was_connected,
                attempt: session.reconnect_attempt,
            };
            let strategy = strategy_for_interval(session.options.reconnect_interval);

            let reconnecting = match context.delay(strategy.as_ref()) {
                Some(delay) => {
                    session.cancel_reconnect();
                    session.reconnect_attempt += 1;
                    let epoch = session.reconnect_epoch;
                    let this = self.this.clone();

                    info!(
                        "reconnecting in {:?} (attempt {})",
                        delay, session.reconnect_attempt
                    );
                    session.reconnect_timer = Some(tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        if let Some(supervisor) = this.upgrade() {
                            supervisor.fire_reconnect(epoch).await;
                        }
                    }));
                    true
                }
                None => false,
            };

            (session.observer.clone(), reconnecting)
        };

        let code = if reconnecting {
            CloseNotification::Reconnect
        } else {
            code
        };
        observer.notify("on_close", |o| o.on_close(code, reason));
    }

    fn disconnect(&self) {
        let mut session = self.session.lock();
        session.cancel_reconnect();
        session.ever_opened = false;

        let state = self.state.get();
        match state {
            ConnectionState::Connecting | ConnectionState::SocketUp => {
                // Workers are not installed yet; open_session closes once they are
                info!("close requested while {}", state);
                session.pending_close = true;
                session.app_closing = true;
            }
            ConnectionState::Handshaking | ConnectionState::Open => {
                match &session.writer {
                    Some(writer) => match writer.send(OutboundCommand::close_normal()) {
                        Ok(()) => {
                            info!("closing session");
                            session.app_closing = true;
                            self.state.set(ConnectionState::Closing);
                        }
                        Err(e) => debug!("could not send Close: {}", e),
                    },
                    None => debug!("could not send Close .. writer already gone"),
                }
            }
            _ => debug!("disconnect ignored, session is {}", state),
        }
    }

    fn send_when_open(&self, command: OutboundCommand) -> Result<()> {
        if !self.state.is_open() {
            return Err(WebSocketError::NotConnected);
        }
        self.forward(command)
    }

    fn forward(&self, command: OutboundCommand) -> Result<()> {
        let session = self.session.lock();
        match &session.writer {
            Some(writer) => writer.send(command),
            None => Err(WebSocketError::NotConnected),
        }
    }

    async fn handle_event(&self, generation: u64, event: InboundEvent) {
        let (observer, app_closing) = {
            let session = self.session.lock();
            if session.generation != generation {
                debug!("event from a previous session dropped");
                return;
            }
            let state = self.state.get();
            if matches!(state, ConnectionState::Closed | ConnectionState::Disconnected) {
                debug!("event after teardown dropped, session is {}", state);
                return;
            }
            (session.observer.clone(), session.app_closing)
        };

        match event {
            InboundEvent::TextMessage(payload) => {
                observer.notify("on_text_message", |o| o.on_text_message(payload));
            }
            InboundEvent::RawTextMessage(payload) => {
                observer.notify("on_raw_text_message", |o| o.on_raw_text_message(payload));
            }
            InboundEvent::BinaryMessage(payload) => {
                observer.notify("on_binary_message", |o| o.on_binary_message(payload));
            }
            InboundEvent::Ping(payload) => {
                debug!("WebSockets Ping received");
                if let Err(e) = self.forward(OutboundCommand::Pong(payload)) {
                    debug!("could not answer Ping: {}", e);
                }
            }
            InboundEvent::Pong(_) => {
                debug!("WebSockets Pong received");
            }
            InboundEvent::Close { code, reason } => {
                debug!("WebSockets Close received ({:?} - {})", code, reason);
                if app_closing {
                    return;
                }
                if let Err(e) = self.forward(OutboundCommand::close_normal()) {
                    debug!("could not answer Close: {}", e);
                }
                for from in [ConnectionState::Open, ConnectionState::Handshaking] {
                    if self.state.compare_exchange(from, ConnectionState::Closing).is_ok() {
                        break;
                    }
                }
            }
            InboundEvent::ServerHandshake { success: true } => {
                if self
                    .state
                    .compare_exchange(ConnectionState::Handshaking, ConnectionState::Open)
                    .is_err()
                {
                    debug!("handshake completed after the session left HANDSHAKING");
                    return;
                }
                {
                    let mut session = self.session.lock();
                    session.ever_opened = true;
                    session.reconnect_attempt = 0;
                }
                info!("opening handshake received");
                observer.notify("on_open", |o| o.on_open());
            }
            InboundEvent::ServerHandshake { success: false } => {
                self.fail_connection(
                    generation,
                    CloseNotification::ServerError,
                    "opening handshake rejected by server".to_string(),
                )
                .await;
            }
            InboundEvent::ConnectionLost => {
                self.fail_connection(
                    generation,
                    CloseNotification::ConnectionLost,
                    "connection lost".to_string(),
                )
                .await;
            }
            InboundEvent::ProtocolViolation => {
                self.fail_connection(
                    generation,
                    CloseNotification::ProtocolError,
                    "protocol violation".to_string(),
                )
                .await;
            }
            InboundEvent::Error(cause) => {
                self.fail_connection(generation, CloseNotification::InternalError, cause)
                    .await;
            }
            InboundEvent::ServerError {
                status_code,
                status_message,
            } => {
                self.fail_connection(
                    generation,
                    CloseNotification::ServerError,
                    format!("{} ({})", status_code, status_message),
                )
                .await;
            }
            InboundEvent::Application(message) => {
                self.collaborators.app_hook.process_app_message(message);
            }
        }
    }
}

/// Drain the event mailbox in production order
async fn run_dispatch(
    supervisor: Weak<Supervisor>,
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
) {
    debug!("dispatch task started");
    while let Some(SessionEvent { generation, event }) = events.recv().await {
        let Some(supervisor) = supervisor.upgrade() else {
            break;
        };
        supervisor.handle_event(generation, event).await;
    }
    debug!("dispatch task exiting");
}
