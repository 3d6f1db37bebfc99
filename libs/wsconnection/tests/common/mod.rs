//! Common test utilities for wsconnection integration tests
//!
//! - `MockWsServer`: tokio-tungstenite echo server for end-to-end runs
//! - `ScriptedFraming`: framing whose reader is fed by the test and whose
//!   writer records every command, for deterministic supervisor tests
//! - socket factories that hand out in-memory pipes, fail, or hang
//! - `RecordingObserver`: records callbacks into a shared journal

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{DuplexStream, ReadHalf, WriteHalf};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Notify};
use wsconnection::*;

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

/// Ordered log shared by the framing and the observer
pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

/// Poll `condition` until it holds or `timeout` elapses
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// ---------------------------------------------------------------------------
// Echo server
// ---------------------------------------------------------------------------

/// A simple mock WebSocket server for testing
pub struct MockWsServer {
    pub addr: SocketAddr,
    shutdown: Arc<Notify>,
}

impl MockWsServer {
    /// Create and start a new mock WebSocket server
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                let shutdown = shutdown_clone.clone();
                                tokio::spawn(async move {
                                    Self::handle_connection(stream, shutdown).await;
                                });
                            }
                            Err(e) => {
                                eprintln!("Accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = shutdown_clone.notified() => {
                        break;
                    }
                }
            }
        });

        Self { addr, shutdown }
    }

    async fn handle_connection(stream: tokio::net::TcpStream, shutdown: Arc<Notify>) {
        use futures::{SinkExt, StreamExt};
        use tokio_tungstenite::accept_async;

        let ws_stream = match accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                eprintln!("WebSocket handshake failed: {}", e);
                return;
            }
        };

        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(msg)) => {
                            if msg.is_text() || msg.is_binary() {
                                // Echo the message back
                                if write.send(msg).await.is_err() {
                                    break;
                                }
                            } else if msg.is_close() {
                                let _ = write.close().await;
                                break;
                            }
                        }
                        Some(Err(_)) | None => break,
                    }
                }
                _ = shutdown.notified() => {
                    break;
                }
            }
        }
    }

    /// Get the WebSocket URL for this server
    pub fn ws_url(&self) -> String {
        format!("ws://{}/", self.addr)
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockWsServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ---------------------------------------------------------------------------
// Scripted framing
// ---------------------------------------------------------------------------

/// One attached reader/writer pair
struct ScriptedSession {
    inject: mpsc::UnboundedSender<InboundEvent>,
}

/// Framing driven by the test
///
/// Every `attach` opens a new session. Events pushed with [`inject`]
/// reach the reader of the latest session; every command the writer gets
/// is recorded. With `auto_accept` the writer answers the client handshake
/// with a successful `ServerHandshake`.
///
/// [`inject`]: ScriptedFraming::inject
#[derive(Clone)]
pub struct ScriptedFraming {
    sessions: Arc<Mutex<Vec<ScriptedSession>>>,
    written: Arc<Mutex<Vec<OutboundCommand>>>,
    journal: Journal,
    auto_accept: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
}

impl ScriptedFraming {
    pub fn new(journal: Journal) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(Vec::new())),
            written: Arc::new(Mutex::new(Vec::new())),
            journal,
            auto_accept: Arc::new(AtomicBool::new(true)),
            fail_writes: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make every later write fail as if the socket broke
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_auto_accept(&self, accept: bool) {
        self.auto_accept.store(accept, Ordering::SeqCst);
    }

    pub fn attach_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Deliver `event` through the latest session's reader
    pub fn inject(&self, event: InboundEvent) {
        let sessions = self.sessions.lock();
        let session = sessions.last().expect("no session attached");
        session.inject.send(event).expect("reader gone");
    }

    /// Deliver `event` through the reader of session `index`
    pub fn inject_into(&self, index: usize, event: InboundEvent) -> bool {
        let sessions = self.sessions.lock();
        sessions
            .get(index)
            .map(|session| session.inject.send(event).is_ok())
            .unwrap_or(false)
    }

    pub fn written(&self) -> Vec<OutboundCommand> {
        self.written.lock().clone()
    }

    pub fn count_written<F>(&self, predicate: F) -> usize
    where
        F: Fn(&OutboundCommand) -> bool,
    {
        self.written.lock().iter().filter(|c| predicate(c)).count()
    }
}

impl Framing for ScriptedFraming {
    fn attach(
        &self,
        input: ReadHalf<Transport>,
        output: WriteHalf<Transport>,
        _options: &ConnectionOptions,
    ) -> (Box<dyn FrameReader>, Box<dyn FrameWriter>) {
        let (inject, events) = mpsc::unbounded_channel();
        self.sessions.lock().push(ScriptedSession {
            inject: inject.clone(),
        });
        self.journal.lock().push("attach".to_string());

        let reader = ScriptedReader {
            input,
            events,
            journal: self.journal.clone(),
        };
        let writer = ScriptedWriter {
            output,
            inject,
            written: self.written.clone(),
            journal: self.journal.clone(),
            auto_accept: self.auto_accept.clone(),
            fail_writes: self.fail_writes.clone(),
        };
        (Box::new(reader), Box::new(writer))
    }
}

struct ScriptedReader {
    input: ReadHalf<Transport>,
    events: mpsc::UnboundedReceiver<InboundEvent>,
    journal: Journal,
}

#[async_trait]
impl FrameReader for ScriptedReader {
    async fn read_event(&mut self) -> InboundEvent {
        self.events
            .recv()
            .await
            .unwrap_or(InboundEvent::ConnectionLost)
    }

    fn into_inner(self: Box<Self>) -> ReadHalf<Transport> {
        self.journal.lock().push("reader released".to_string());
        self.input
    }
}

struct ScriptedWriter {
    output: WriteHalf<Transport>,
    inject: mpsc::UnboundedSender<InboundEvent>,
    written: Arc<Mutex<Vec<OutboundCommand>>>,
    journal: Journal,
    auto_accept: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
}

#[async_trait]
impl FrameWriter for ScriptedWriter {
    async fn write_command(&mut self, command: OutboundCommand) -> wsconnection::Result<()> {
        let is_handshake = matches!(command, OutboundCommand::ClientHandshake { .. });
        self.written.lock().push(command);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(WebSocketError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "broken pipe",
            )));
        }
        if is_handshake && self.auto_accept.load(Ordering::SeqCst) {
            let _ = self.inject.send(InboundEvent::ServerHandshake { success: true });
        }
        Ok(())
    }

    fn into_inner(self: Box<Self>) -> WriteHalf<Transport> {
        self.journal.lock().push("writer released".to_string());
        self.output
    }
}

// ---------------------------------------------------------------------------
// Socket factories
// ---------------------------------------------------------------------------

/// Hands out in-memory pipes and keeps the far ends for inspection
///
/// Can be switched to refuse connections to simulate a server that is down.
#[derive(Clone, Default)]
pub struct DuplexSocketFactory {
    peers: Arc<Mutex<Vec<DuplexStream>>>,
    attempts: Arc<AtomicUsize>,
    refuse: Arc<AtomicBool>,
}

impl DuplexSocketFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn set_refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Far end of the latest pipe
    pub fn take_last_peer(&self) -> Option<DuplexStream> {
        self.peers.lock().pop()
    }
}

#[async_trait]
impl SocketFactory for DuplexSocketFactory {
    async fn create_socket(
        &self,
        _host: &str,
        _port: u16,
        _options: &ConnectionOptions,
    ) -> io::Result<Transport> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"));
        }
        let (client, server) = tokio::io::duplex(64 * 1024);
        self.peers.lock().push(server);
        Ok(Box::new(client))
    }
}

/// Always fails
#[derive(Clone, Default)]
pub struct FailingSocketFactory {
    pub attempts: Arc<AtomicUsize>,
}

#[async_trait]
impl SocketFactory for FailingSocketFactory {
    async fn create_socket(
        &self,
        _host: &str,
        _port: u16,
        _options: &ConnectionOptions,
    ) -> io::Result<Transport> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"))
    }
}

/// Never completes
#[derive(Clone, Default)]
pub struct HangingSocketFactory {
    pub attempts: Arc<AtomicUsize>,
}

#[async_trait]
impl SocketFactory for HangingSocketFactory {
    async fn create_socket(
        &self,
        _host: &str,
        _port: u16,
        _options: &ConnectionOptions,
    ) -> io::Result<Transport> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

// ---------------------------------------------------------------------------
// Observer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Observed {
    Open,
    Close(CloseNotification, String),
    Text(String),
    RawText(Vec<u8>),
    Binary(Vec<u8>),
}

pub struct RecordingObserver {
    events: Mutex<Vec<Observed>>,
    journal: Journal,
}

impl RecordingObserver {
    pub fn new(journal: Journal) -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
            journal,
        })
    }

    pub fn events(&self) -> Vec<Observed> {
        self.events.lock().clone()
    }

    pub fn opens(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, Observed::Open))
            .count()
    }

    pub fn closes(&self) -> Vec<(CloseNotification, String)> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                Observed::Close(code, reason) => Some((*code, reason.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn texts(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                Observed::Text(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: Observed) {
        verbose_println!("observer: {:?}", event);
        let entry = match &event {
            Observed::Open => "open".to_string(),
            Observed::Close(code, _) => format!("close {}", code),
            Observed::Text(text) => format!("text {}", text),
            Observed::RawText(_) => "raw text".to_string(),
            Observed::Binary(_) => "binary".to_string(),
        };
        self.journal.lock().push(entry);
        self.events.lock().push(event);
    }
}

impl SessionObserver for RecordingObserver {
    fn on_open(&self) {
        self.record(Observed::Open);
    }

    fn on_close(&self, code: CloseNotification, reason: &str) {
        self.record(Observed::Close(code, reason.to_string()));
    }

    fn on_text_message(&self, payload: String) {
        self.record(Observed::Text(payload));
    }

    fn on_raw_text_message(&self, payload: Vec<u8>) {
        self.record(Observed::RawText(payload));
    }

    fn on_binary_message(&self, payload: Vec<u8>) {
        self.record(Observed::Binary(payload));
    }
}

/// Connection wired to a scripted framing and an in-memory socket factory
pub struct ScriptedHarness {
    pub connection: WebSocketConnection,
    pub framing: ScriptedFraming,
    pub sockets: DuplexSocketFactory,
    pub observer: Arc<RecordingObserver>,
    pub journal: Journal,
}

impl ScriptedHarness {
    pub fn new() -> Self {
        let journal = journal();
        let framing = ScriptedFraming::new(journal.clone());
        let sockets = DuplexSocketFactory::new();
        let connection = WebSocketConnection::builder()
            .framing(framing.clone())
            .plain_socket_factory(sockets.clone())
            .secure_socket_factory(sockets.clone())
            .build();
        let observer = RecordingObserver::new(journal.clone());

        Self {
            connection,
            framing,
            sockets,
            observer,
            journal,
        }
    }

    pub async fn connect(&self, options: &ConnectionOptions) {
        self.connection
            .connect_with("ws://scripted.test/socket", &[], &self.observer, options)
            .await
            .unwrap();
    }

    /// Connect and wait for `on_open`
    pub async fn open(&self, options: &ConnectionOptions) {
        self.connect(options).await;
        assert!(
            wait_until(Duration::from_secs(2), || self.observer.opens() >= 1).await,
            "session never opened"
        );
    }

    pub fn journal(&self) -> Vec<String> {
        self.journal.lock().clone()
    }
}
