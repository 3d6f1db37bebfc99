use super::codec::{CodecError, Decoded, FrameDecoder};
use super::frame::{Frame, OpCode};
use super::SharedKey;
use crate::core::config::ConnectionOptions;
use crate::traits::*;
use async_trait::async_trait;
use bytes::BytesMut;
use futures::StreamExt;
use tokio::io::ReadHalf;
use tokio_util::codec::FramedRead;
use tracing::{debug, warn};

/// Message being reassembled from fragments
struct Fragments {
    opcode: OpCode,
    payload: BytesMut,
}

pub struct Rfc6455Reader {
    frames: FramedRead<ReadHalf<Transport>, FrameDecoder>,
    key: SharedKey,
    fragments: Option<Fragments>,
    max_message_payload_size: usize,
    receive_text_messages_raw: bool,
    validate_incoming_utf8: bool,
}

impl Rfc6455Reader {
    pub fn new(input: ReadHalf<Transport>, key: SharedKey, options: &ConnectionOptions) -> Self {
        Self {
            frames: FramedRead::new(input, FrameDecoder::new(options.max_frame_payload_size())),
            key,
            fragments: None,
            max_message_payload_size: options.max_message_payload_size(),
            receive_text_messages_raw: options.receive_text_messages_raw,
            validate_incoming_utf8: options.validate_incoming_utf8,
        }
    }

    fn on_handshake(&self, response: super::handshake::HandshakeResponse) -> InboundEvent {
        if !response.is_switching_protocols() {
            warn!(
                "server refused the upgrade: {} {}",
                response.status_code, response.reason
            );
            return InboundEvent::ServerError {
                status_code: response.status_code,
                status_message: response.reason,
            };
        }

        let success = match self.key.lock().as_deref() {
            Some(key) => response.accepts_key(key),
            None => false,
        };
        if !success {
            warn!("Sec-WebSocket-Accept does not match the request key");
        }
        InboundEvent::ServerHandshake { success }
    }

    /// Turn one frame into an event, or `None` while a message is incomplete
    fn on_frame(&mut self, frame: Frame) -> Option<InboundEvent> {
        match frame.opcode {
            OpCode::Ping => Some(InboundEvent::Ping(frame.payload.to_vec())),
            OpCode::Pong => Some(InboundEvent::Pong(frame.payload.to_vec())),
            OpCode::Close => Some(self.on_close(&frame.payload)),
            OpCode::Text | OpCode::Binary => {
                if self.fragments.is_some() {
                    debug!("new data frame while a fragmented message is open");
                    return Some(InboundEvent::ProtocolViolation);
                }
                if frame.payload.len() > self.max_message_payload_size {
                    return Some(InboundEvent::ProtocolViolation);
                }
                if frame.fin {
                    return Some(self.on_message(frame.opcode, &frame.payload));
                }
                self.fragments = Some(Fragments {
                    opcode: frame.opcode,
                    payload: BytesMut::from(&frame.payload[..]),
                });
                None
            }
            OpCode::Continuation => {
                let Some(fragments) = self.fragments.as_mut() else {
                    debug!("continuation frame without a message to continue");
                    return Some(InboundEvent::ProtocolViolation);
                };
                if fragments.payload.len() + frame.payload.len() > self.max_message_payload_size {
                    return Some(InboundEvent::ProtocolViolation);
                }
                fragments.payload.extend_from_slice(&frame.payload);
                if !frame.fin {
                    return None;
                }
                let fragments = self.fragments.take()?;
                Some(self.on_message(fragments.opcode, &fragments.payload))
            }
        }
    }

    fn on_message(&self, opcode: OpCode, payload: &[u8]) -> InboundEvent {
        if opcode == OpCode::Binary {
            return InboundEvent::BinaryMessage(payload.to_vec());
        }

        if self.validate_incoming_utf8 && std::str::from_utf8(payload).is_err() {
            debug!("invalid UTF-8 in text message");
            return InboundEvent::ProtocolViolation;
        }

        if self.receive_text_messages_raw {
            InboundEvent::RawTextMessage(payload.to_vec())
        } else {
            InboundEvent::TextMessage(String::from_utf8_lossy(payload).into_owned())
        }
    }

    fn on_close(&self, payload: &[u8]) -> InboundEvent {
        match payload.len() {
            0 => InboundEvent::Close {
                code: None,
                reason: String::new(),
            },
            1 => InboundEvent::ProtocolViolation,
            _ => {
                let code = CloseCode::from(u16::from_be_bytes([payload[0], payload[1]]));
                match std::str::from_utf8(&payload[2..]) {
                    Ok(reason) => InboundEvent::Close {
                        code: Some(code),
                        reason: reason.to_string(),
                    },
                    Err(_) => InboundEvent::ProtocolViolation,
                }
            }
        }
    }
}

#[async_trait]
impl FrameReader for Rfc6455Reader {
    async fn read_event(&mut self) -> InboundEvent {
        loop {
            let decoded = match self.frames.next().await {
                Some(Ok(decoded)) => decoded,
                Some(Err(CodecError::Protocol(reason))) => {
                    debug!("protocol violation: {}", reason);
                    return InboundEvent::ProtocolViolation;
                }
                Some(Err(CodecError::Handshake(e))) => {
                    debug!("{}", e);
                    return InboundEvent::ProtocolViolation;
                }
                Some(Err(CodecError::Io(e))) => {
                    debug!("socket read failed: {}", e);
                    return InboundEvent::ConnectionLost;
                }
                None => {
                    debug!("end of stream");
                    return InboundEvent::ConnectionLost;
                }
            };

            let event = match decoded {
                Decoded::Handshake(response) => Some(self.on_handshake(response)),
                Decoded::Frame(frame) => self.on_frame(frame),
            };
            if let Some(event) = event {
                return event;
            }
        }
    }

    fn into_inner(self: Box<Self>) -> ReadHalf<Transport> {
        self.frames.into_inner()
    }
}
