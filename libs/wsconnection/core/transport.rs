//! Transport opener
//!
//! The opener owns a dedicated task with its own command mailbox. Sockets
//! are created on that task and, once the session is over, handed back to
//! it to be closed, so a stream is never shut down from a task other than
//! the one that created it.
//!
//! ```text
//! Supervisor ──Connect──▶ ┌──────────────────────┐ ──▶ SocketFactory (plain | TLS)
//!            ◀─Transport─ │ Transport opener task │
//! Supervisor ──Close────▶ │   (mailbox, FIFO)     │ ──▶ shutdown()
//! Supervisor ──Stop─────▶ └──────────────────────┘
//! ```

use crate::core::config::ConnectionOptions;
use crate::traits::*;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const WS_CONNECTOR: &str = "WebSocketConnector";

/// Result of one connect attempt; the error is a human-readable reason
pub type ConnectOutcome = std::result::Result<Transport, String>;

enum OpenerCommand {
    Connect {
        uri: WebSocketUri,
        options: ConnectionOptions,
        reply: oneshot::Sender<ConnectOutcome>,
    },
    Close(Transport),
    Stop,
}

/// Plain TCP socket factory
#[derive(Debug, Clone, Default)]
pub struct PlainSocketFactory;

#[async_trait]
impl SocketFactory for PlainSocketFactory {
    async fn create_socket(
        &self,
        host: &str,
        port: u16,
        options: &ConnectionOptions,
    ) -> io::Result<Transport> {
        let stream = connect_tcp(host, port, options).await?;
        Ok(Box::new(stream))
    }
}

/// TLS socket factory backed by the platform TLS library
///
/// The host string is used for server name verification.
#[derive(Clone, Default)]
pub struct TlsSocketFactory {
    connector: Option<native_tls::TlsConnector>,
}

impl TlsSocketFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured connector (custom roots, client certificates, ...)
    pub fn with_connector(connector: native_tls::TlsConnector) -> Self {
        Self {
            connector: Some(connector),
        }
    }
}

#[async_trait]
impl SocketFactory for TlsSocketFactory {
    async fn create_socket(
        &self,
        host: &str,
        port: u16,
        options: &ConnectionOptions,
    ) -> io::Result<Transport> {
        let connector = match &self.connector {
            Some(connector) => connector.clone(),
            None => native_tls::TlsConnector::new().map_err(io::Error::other)?,
        };
        let connector = tokio_native_tls::TlsConnector::from(connector);

        let stream = connect_tcp(host, port, options).await?;
        let stream = connector
            .connect(host, stream)
            .await
            .map_err(io::Error::other)?;
        Ok(Box::new(stream))
    }
}

async fn connect_tcp(host: &str, port: u16, options: &ConnectionOptions) -> io::Result<TcpStream> {
    let stream = TcpStream::connect((host, port)).await?;
    stream.set_nodelay(options.tcp_no_delay)?;
    Ok(stream)
}

/// Handle to a running transport opener task
pub struct TransportOpener {
    mailbox: mpsc::UnboundedSender<OpenerCommand>,
    task: JoinHandle<()>,
}

impl TransportOpener {
    /// Spawn the opener task and wait until its mailbox exists
    pub async fn start(
        plain: Arc<dyn SocketFactory>,
        secure: Arc<dyn SocketFactory>,
    ) -> Result<Self> {
        let (ready_tx, ready_rx) = oneshot::channel();
        let task = tokio::spawn(run_opener(plain, secure, ready_tx));

        let mailbox = ready_rx
            .await
            .map_err(|_| WebSocketError::WorkerStart(WS_CONNECTOR.to_string()))?;

        debug!("{} ready", WS_CONNECTOR);
        Ok(Self { mailbox, task })
    }

    /// Ask the opener to connect to the host and port of `uri`
    ///
    /// The returned receiver resolves once the attempt finishes. Dropping it
    /// discards the attempt's result (a late transport is closed on drop).
    pub fn request_connect(
        &self,
        uri: &WebSocketUri,
        options: &ConnectionOptions,
    ) -> oneshot::Receiver<ConnectOutcome> {
        let (reply, outcome) = oneshot::channel();
        let command = OpenerCommand::Connect {
            uri: uri.clone(),
            options: options.clone(),
            reply,
        };
        if self.mailbox.send(command).is_err() {
            warn!("{} mailbox closed, connect request dropped", WS_CONNECTOR);
        }
        outcome
    }

    /// Close `transport` on the opener task
    pub fn request_close(&self, transport: Transport) {
        if self.mailbox.send(OpenerCommand::Close(transport)).is_err() {
            debug!("{} already stopped, transport dropped in place", WS_CONNECTOR);
        }
    }

    /// End the opener task after every command already queued
    ///
    /// A connect attempt still in flight is abandoned, so a socket factory
    /// that hangs past the connect timeout does not keep the task alive.
    pub fn request_stop(&self) {
        if self.mailbox.send(OpenerCommand::Stop).is_err() {
            debug!("{} already stopped", WS_CONNECTOR);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

async fn run_opener(
    plain: Arc<dyn SocketFactory>,
    secure: Arc<dyn SocketFactory>,
    ready: oneshot::Sender<mpsc::UnboundedSender<OpenerCommand>>,
) {
    let (mailbox, mut commands) = mpsc::unbounded_channel();
    if ready.send(mailbox).is_err() {
        return;
    }

    // Commands that arrived while a connect attempt was running
    let mut deferred = VecDeque::new();

    loop {
        let command = match deferred.pop_front() {
            Some(command) => command,
            None => match commands.recv().await {
                Some(command) => command,
                None => break,
            },
        };

        match command {
            OpenerCommand::Connect {
                uri,
                options,
                reply,
            } => {
                let host = uri.host().to_string();
                let port = uri.port();
                let factory = if uri.scheme().is_secure() {
                    &secure
                } else {
                    &plain
                };

                debug!("opening {} transport to {}:{}", uri.scheme().as_str(), host, port);
                let attempt = factory.create_socket(&host, port, &options);
                tokio::pin!(attempt);

                let outcome = loop {
                    tokio::select! {
                        outcome = &mut attempt => break Some(outcome.map_err(|e| e.to_string())),
                        command = commands.recv() => match command {
                            Some(OpenerCommand::Stop) | None => break None,
                            Some(command) => deferred.push_back(command),
                        },
                    }
                };

                let Some(outcome) = outcome else {
                    debug!("connect attempt to {}:{} abandoned", host, port);
                    break;
                };

                match &outcome {
                    Ok(_) => info!("transport connected to {}:{}", host, port),
                    Err(reason) => warn!("transport to {}:{} failed: {}", host, port, reason),
                }

                if reply.send(outcome).is_err() {
                    debug!("connect attempt resolved after the caller gave up, result discarded");
                }
            }
            OpenerCommand::Close(mut transport) => {
                if let Err(e) = transport.shutdown().await {
                    debug!("transport shutdown: {}", e);
                }
                drop(transport);
                debug!("transport closed");
            }
            OpenerCommand::Stop => break,
        }
    }

    debug!("{} exited", WS_CONNECTOR);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_plain_connect_and_close_on_opener_task() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let opener = TransportOpener::start(Arc::new(PlainSocketFactory), Arc::new(TlsSocketFactory::new()))
            .await
            .unwrap();

        let uri = WebSocketUri::parse(&format!("ws://{}/", addr)).unwrap();
        let outcome = opener.request_connect(&uri, &ConnectionOptions::default());
        let (mut server_side, _) = listener.accept().await.unwrap();
        let transport = outcome.await.unwrap().unwrap();

        opener.request_close(transport);
        opener.request_stop();

        let mut buf = [0u8; 1];
        let read = tokio::time::timeout(Duration::from_secs(2), server_side.read(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read, 0, "peer should observe EOF after close");

        tokio::time::timeout(Duration::from_secs(2), async {
            while !opener.is_finished() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    struct StalledFactory;

    #[async_trait]
    impl SocketFactory for StalledFactory {
        async fn create_socket(
            &self,
            _host: &str,
            _port: u16,
            _options: &ConnectionOptions,
        ) -> io::Result<Transport> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_stop_abandons_stalled_connect() {
        let opener = TransportOpener::start(Arc::new(StalledFactory), Arc::new(StalledFactory))
            .await
            .unwrap();

        let uri = WebSocketUri::parse("ws://stalled.test/").unwrap();
        let outcome = opener.request_connect(&uri, &ConnectionOptions::default());
        tokio::time::sleep(Duration::from_millis(50)).await;
        opener.request_stop();

        // The reply side is dropped with the attempt
        let reply = tokio::time::timeout(Duration::from_secs(2), outcome).await.unwrap();
        assert!(reply.is_err());

        tokio::time::timeout(Duration::from_secs(2), async {
            while !opener.is_finished() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_connect_failure_reports_reason() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let opener = TransportOpener::start(Arc::new(PlainSocketFactory), Arc::new(TlsSocketFactory::new()))
            .await
            .unwrap();

        let uri = WebSocketUri::parse(&format!("ws://{}/", addr)).unwrap();
        let outcome = opener
            .request_connect(&uri, &ConnectionOptions::default())
            .await
            .unwrap();
        assert!(outcome.is_err());
        opener.request_stop();
    }
}
