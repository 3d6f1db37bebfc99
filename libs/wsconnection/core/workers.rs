//! Frame reader and frame writer workers
//!
//! Each worker runs on its own task. Spawning waits on a startup barrier:
//! the task creates its own control channel and sends the sending side back
//! through a oneshot, so by the time `spawn_*` returns the worker is ready
//! and no command can be lost.

use crate::traits::*;
use tokio::io::{ReadHalf, WriteHalf};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const WS_READER: &str = "WebSocketReader";
const WS_WRITER: &str = "WebSocketWriter";

/// Inbound event tagged with the session generation that produced it
#[derive(Debug)]
pub struct SessionEvent {
    pub generation: u64,
    pub event: InboundEvent,
}

pub type EventSender = mpsc::UnboundedSender<SessionEvent>;

/// Handle to a running frame reader
pub struct ReaderHandle {
    stop: oneshot::Sender<()>,
    task: JoinHandle<ReadHalf<Transport>>,
}

impl ReaderHandle {
    /// Ask the reader to stop and wait for it, returning the read half
    ///
    /// A reader that already ended on its own is joined the same way. A
    /// failed join is logged and counts as done.
    pub async fn stop_and_join(self) -> Option<ReadHalf<Transport>> {
        if self.stop.send(()).is_err() {
            debug!("{} already ended", WS_READER);
        }

        match self.task.await {
            Ok(input) => {
                debug!("{} joined", WS_READER);
                Some(input)
            }
            Err(e) => {
                warn!("{} join failed: {}", WS_READER, e);
                None
            }
        }
    }
}

/// Spawn the reader task and wait for its barrier
pub async fn spawn_reader(
    mut reader: Box<dyn FrameReader>,
    generation: u64,
    events: EventSender,
) -> Result<ReaderHandle> {
    let (ready_tx, ready_rx) = oneshot::channel();

    let task = tokio::spawn(async move {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        if ready_tx.send(stop_tx).is_err() {
            return reader.into_inner();
        }

        debug!("{} running (generation {})", WS_READER, generation);
        loop {
            tokio::select! {
                biased;
                _ = &mut stop_rx => {
                    debug!("{} stop requested", WS_READER);
                    break;
                }
                event = reader.read_event() => {
                    let terminal = event.is_terminal();
                    if events.send(SessionEvent { generation, event }).is_err() {
                        debug!("{}: supervisor mailbox closed", WS_READER);
                        break;
                    }
                    if terminal {
                        break;
                    }
                }
            }
        }

        debug!("{} ended", WS_READER);
        reader.into_inner()
    });

    let stop = ready_rx
        .await
        .map_err(|_| WebSocketError::WorkerStart(WS_READER.to_string()))?;

    Ok(ReaderHandle { stop, task })
}

/// Handle to a running frame writer
pub struct WriterHandle {
    mailbox: mpsc::UnboundedSender<OutboundCommand>,
    task: JoinHandle<WriteHalf<Transport>>,
}

impl WriterHandle {
    /// Queue a command; commands are written in the order they are queued
    pub fn send(&self, command: OutboundCommand) -> Result<()> {
        self.mailbox
            .send(command)
            .map_err(|e| WebSocketError::ChannelSend(format!("{} mailbox closed: {:?}", WS_WRITER, e.0)))
    }

    /// Send `Quit` and wait for the writer, returning the write half
    pub async fn quit_and_join(self) -> Option<WriteHalf<Transport>> {
        if self.mailbox.send(OutboundCommand::Quit).is_err() {
            debug!("{} already ended", WS_WRITER);
        }

        match self.task.await {
            Ok(output) => {
                debug!("{} joined", WS_WRITER);
                Some(output)
            }
            Err(e) => {
                warn!("{} join failed: {}", WS_WRITER, e);
                None
            }
        }
    }
}

/// Spawn the writer task and wait for its barrier
pub async fn spawn_writer(
    mut writer: Box<dyn FrameWriter>,
    generation: u64,
    events: EventSender,
) -> Result<WriterHandle> {
    let (ready_tx, ready_rx) = oneshot::channel();

    let task = tokio::spawn(async move {
        let (mailbox, mut commands) = mpsc::unbounded_channel();
        if ready_tx.send(mailbox).is_err() {
            return writer.into_inner();
        }

        debug!("{} running (generation {})", WS_WRITER, generation);
        while let Some(command) = commands.recv().await {
            if command == OutboundCommand::Quit {
                debug!("{} quit requested", WS_WRITER);
                break;
            }

            if let Err(e) = writer.write_command(command).await {
                let event = match e {
                    WebSocketError::Io(e) => {
                        warn!("{} socket failure: {}", WS_WRITER, e);
                        InboundEvent::ConnectionLost
                    }
                    other => {
                        warn!("{} failure: {}", WS_WRITER, other);
                        InboundEvent::Error(other.to_string())
                    }
                };
                if events.send(SessionEvent { generation, event }).is_err() {
                    debug!("{}: supervisor mailbox closed, failure not reported", WS_WRITER);
                }
                break;
            }
        }

        debug!("{} ended", WS_WRITER);
        writer.into_inner()
    });

    let mailbox = ready_rx
        .await
        .map_err(|_| WebSocketError::WorkerStart(WS_WRITER.to_string()))?;

    Ok(WriterHandle { mailbox, task })
}
