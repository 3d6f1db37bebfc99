use super::frame::{write_frame, OpCode, MAX_CONTROL_PAYLOAD};
use super::handshake::{build_request, encode_request};
use super::SharedKey;
use crate::core::config::ConnectionOptions;
use crate::traits::*;
use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncWriteExt, WriteHalf};
use tokio_tungstenite::tungstenite::handshake::client::generate_key;
use tracing::debug;

pub struct Rfc6455Writer {
    output: WriteHalf<Transport>,
    key: SharedKey,
    buffer: BytesMut,
    max_frame_payload_size: usize,
    mask_client_frames: bool,
}

impl Rfc6455Writer {
    pub fn new(output: WriteHalf<Transport>, key: SharedKey, options: &ConnectionOptions) -> Self {
        Self {
            output,
            key,
            buffer: BytesMut::new(),
            max_frame_payload_size: options.max_frame_payload_size(),
            mask_client_frames: options.mask_client_frames,
        }
    }

    fn mask(&self) -> Option<[u8; 4]> {
        self.mask_client_frames.then(rand::random::<[u8; 4]>)
    }

    fn encode_control(&mut self, opcode: OpCode, payload: &[u8]) -> Result<()> {
        if payload.len() > MAX_CONTROL_PAYLOAD {
            return Err(WebSocketError::Protocol(format!(
                "{:?} payload of {} bytes exceeds {}",
                opcode,
                payload.len(),
                MAX_CONTROL_PAYLOAD
            )));
        }
        let mask = self.mask();
        write_frame(&mut self.buffer, true, opcode, payload, mask);
        Ok(())
    }

    /// Encode a data message, fragmenting it at the frame payload limit
    fn encode_message(&mut self, opcode: OpCode, payload: &[u8]) {
        if payload.is_empty() {
            let mask = self.mask();
            write_frame(&mut self.buffer, true, opcode, payload, mask);
            return;
        }

        let chunks = payload.chunks(self.max_frame_payload_size.max(1));
        let count = chunks.len();
        for (i, chunk) in chunks.enumerate() {
            let opcode = if i == 0 { opcode } else { OpCode::Continuation };
            let mask = self.mask();
            write_frame(&mut self.buffer, i + 1 == count, opcode, chunk, mask);
        }
    }

    fn encode(&mut self, command: OutboundCommand) -> Result<()> {
        match command {
            OutboundCommand::ClientHandshake {
                uri,
                headers,
                subprotocols,
            } => {
                let key = generate_key();
                let request = build_request(&uri, &headers, &subprotocols, &key)?;
                encode_request(&request, &mut self.buffer);
                *self.key.lock() = Some(key);
                debug!("client handshake for {}", uri);
            }
            OutboundCommand::TextMessage(text) => self.encode_message(OpCode::Text, text.as_bytes()),
            OutboundCommand::RawTextMessage(payload) => self.encode_message(OpCode::Text, &payload),
            OutboundCommand::BinaryMessage(payload) => self.encode_message(OpCode::Binary, &payload),
            OutboundCommand::Ping(payload) => self.encode_control(OpCode::Ping, &payload)?,
            OutboundCommand::Pong(payload) => self.encode_control(OpCode::Pong, &payload)?,
            OutboundCommand::Close { code, reason } => {
                let mut payload = Vec::new();
                if code != CloseCode::NoStatus {
                    payload.extend_from_slice(&u16::from(code).to_be_bytes());
                    if let Some(reason) = reason {
                        payload.extend_from_slice(reason.as_bytes());
                    }
                }
                self.encode_control(OpCode::Close, &payload)?;
            }
            OutboundCommand::Quit => {}
        }
        Ok(())
    }
}

#[async_trait]
impl FrameWriter for Rfc6455Writer {
    async fn write_command(&mut self, command: OutboundCommand) -> Result<()> {
        self.buffer.clear();
        self.encode(command)?;
        if self.buffer.is_empty() {
            return Ok(());
        }

        self.output.write_all(&self.buffer).await?;
        self.output.flush().await?;
        Ok(())
    }

    fn into_inner(self: Box<Self>) -> WriteHalf<Transport> {
        self.output
    }
}
