//! # RFC 6455 framing
//!
//! Default [`Framing`] implementation: HTTP/1.1 upgrade handshake followed
//! by the base framing protocol, without extensions.
//!
//! ```text
//! ReadHalf  ──▶ FramedRead<FrameDecoder> ──▶ Rfc6455Reader ──▶ InboundEvent
//!                                                 │
//!                                           Sec-WebSocket-Key
//!                                                 │
//! OutboundCommand ──▶ Rfc6455Writer ──▶ WriteHalf
//! ```
//!
//! The writer generates the handshake key when it sends the request; the
//! reader uses the same key to check `Sec-WebSocket-Accept`.

pub mod codec;
pub mod frame;
pub mod handshake;
pub mod reader;
pub mod writer;

pub use reader::Rfc6455Reader;
pub use writer::Rfc6455Writer;

use crate::core::config::ConnectionOptions;
use crate::traits::*;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::io::{ReadHalf, WriteHalf};

/// Handshake key shared between the reader and the writer of one session
pub type SharedKey = Arc<Mutex<Option<String>>>;

#[derive(Debug, Clone, Copy, Default)]
pub struct Rfc6455Framing;

impl Framing for Rfc6455Framing {
    fn attach(
        &self,
        input: ReadHalf<Transport>,
        output: WriteHalf<Transport>,
        options: &ConnectionOptions,
    ) -> (Box<dyn FrameReader>, Box<dyn FrameWriter>) {
        let key: SharedKey = Arc::new(Mutex::new(None));
        let reader = Rfc6455Reader::new(input, key.clone(), options);
        let writer = Rfc6455Writer::new(output, key, options);
        (Box::new(reader), Box::new(writer))
    }
}
