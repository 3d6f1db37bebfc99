//! Seam between the supervisor and the wire-level frame codec
//!
//! The supervisor never looks at bytes. It hands the two halves of a
//! connected transport to a [`Framing`] implementation and gets back a
//! reader that yields [`InboundEvent`]s and a writer that accepts
//! [`OutboundCommand`]s. Each half then runs on its own worker task.

use crate::core::config::ConnectionOptions;
use crate::error::Result;
use crate::message::{InboundEvent, OutboundCommand};
use crate::socket::Transport;
use async_trait::async_trait;
use tokio::io::{ReadHalf, WriteHalf};

/// Turns inbound bytes into typed events
#[async_trait]
pub trait FrameReader: Send {
    /// Wait for the next event
    ///
    /// End of stream and socket failures must be reported as
    /// [`InboundEvent::ConnectionLost`]. The reader worker stops after any
    /// terminal event (see [`InboundEvent::is_terminal`]).
    async fn read_event(&mut self) -> InboundEvent;

    /// Give the read half back so the transport can be closed
    fn into_inner(self: Box<Self>) -> ReadHalf<Transport>;
}

/// Serializes outbound commands onto the transport
#[async_trait]
pub trait FrameWriter: Send {
    /// Write one command. `Quit` is handled by the worker and never passed here.
    ///
    /// I/O errors are treated as a lost connection, any other error as an
    /// internal failure.
    async fn write_command(&mut self, command: OutboundCommand) -> Result<()>;

    /// Give the write half back so the transport can be closed
    fn into_inner(self: Box<Self>) -> WriteHalf<Transport>;
}

/// Factory for a reader/writer pair bound to one transport
pub trait Framing: Send + Sync {
    fn attach(
        &self,
        input: ReadHalf<Transport>,
        output: WriteHalf<Transport>,
        options: &ConnectionOptions,
    ) -> (Box<dyn FrameReader>, Box<dyn FrameWriter>);
}
