//! Inbound byte decoding
//!
//! The decoder starts in the handshake phase, where it waits for a complete
//! HTTP response head, and then switches to frame decoding. Only frame
//! level rules are checked here; message reassembly and UTF-8 checks happen
//! in the reader.

use super::frame::{Frame, OpCode, MAX_CONTROL_PAYLOAD};
use super::handshake::{HandshakeError, HandshakeResponse, MAX_RESPONSE_HEAD};
use bytes::{Buf, BytesMut};
use std::io;
use thiserror::Error;
use tokio_util::codec;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("protocol violation: {0}")]
    Protocol(&'static str),

    #[error(transparent)]
    Handshake(#[from] HandshakeError),
}

#[derive(Debug)]
pub enum Decoded {
    Handshake(HandshakeResponse),
    Frame(Frame),
}

/// Header of a frame whose payload has not fully arrived
#[derive(Debug, Clone, Copy)]
struct PendingFrame {
    fin: bool,
    opcode: OpCode,
    payload_len: usize,
}

pub struct FrameDecoder {
    handshake_done: bool,
    pending: Option<PendingFrame>,
    max_frame_payload_size: usize,
}

impl FrameDecoder {
    pub fn new(max_frame_payload_size: usize) -> Self {
        Self {
            handshake_done: false,
            pending: None,
            max_frame_payload_size,
        }
    }

    fn decode_handshake(&mut self, src: &mut BytesMut) -> Result<Option<Decoded>, CodecError> {
        let Some((len, response)) = HandshakeResponse::parse(src)? else {
            if src.len() > MAX_RESPONSE_HEAD {
                return Err(CodecError::Protocol("handshake response too large"));
            }
            return Ok(None);
        };

        src.advance(len);
        if response.is_switching_protocols() {
            self.handshake_done = true;
        }
        Ok(Some(Decoded::Handshake(response)))
    }

    fn decode_frame(&mut self, src: &mut BytesMut) -> Result<Option<Decoded>, CodecError> {
        if let Some(pending) = self.pending {
            if src.remaining() < pending.payload_len {
                return Ok(None);
            }
            self.pending = None;
            let payload = src.split_to(pending.payload_len).freeze();
            return Ok(Some(Decoded::Frame(Frame::new(
                pending.fin,
                pending.opcode,
                payload,
            ))));
        }

        if src.remaining() < 2 {
            return Ok(None);
        }

        let fin = src[0] & 0b1000_0000 != 0;
        if src[0] & 0b0111_0000 != 0 {
            return Err(CodecError::Protocol("reserved bits set"));
        }
        let opcode = OpCode::from_u8(src[0] & 0b0000_1111)
            .ok_or(CodecError::Protocol("unknown opcode"))?;
        if src[1] & 0b1000_0000 != 0 {
            return Err(CodecError::Protocol("masked server frame"));
        }

        let length_code = src[1] & 0x7F;
        let extra = match length_code {
            126 => 2,
            127 => 8,
            _ => 0,
        };
        if src.remaining() < 2 + extra {
            return Ok(None);
        }
        src.advance(2);

        let payload_len = match extra {
            0 => u64::from(length_code),
            2 => u64::from(src.get_u16()),
            _ => src.get_u64(),
        };

        if opcode.is_control() {
            if !fin {
                return Err(CodecError::Protocol("fragmented control frame"));
            }
            if payload_len > MAX_CONTROL_PAYLOAD as u64 {
                return Err(CodecError::Protocol("control frame too large"));
            }
        }
        if payload_len > self.max_frame_payload_size as u64 {
            return Err(CodecError::Protocol("frame too large"));
        }
        let payload_len = payload_len as usize;

        if src.remaining() < payload_len {
            src.reserve(payload_len - src.remaining());
            self.pending = Some(PendingFrame {
                fin,
                opcode,
                payload_len,
            });
            return Ok(None);
        }

        let payload = src.split_to(payload_len).freeze();
        Ok(Some(Decoded::Frame(Frame::new(fin, opcode, payload))))
    }
}

impl codec::Decoder for FrameDecoder {
    type Item = Decoded;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.handshake_done {
            self.decode_frame(src)
        } else {
            self.decode_handshake(src)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::codec::Decoder;

    fn opened_decoder(max: usize) -> FrameDecoder {
        let mut decoder = FrameDecoder::new(max);
        decoder.handshake_done = true;
        decoder
    }

    fn frame(decoded: Option<Decoded>) -> Frame {
        match decoded {
            Some(Decoded::Frame(frame)) => frame,
            other => panic!("expected a frame, got {:?}", other),
        }
    }

    #[test]
    fn test_handshake_then_frame_in_one_read() {
        let mut decoder = FrameDecoder::new(1024);
        let mut src = BytesMut::from(&b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\n\r\n\x81\x02hi"[..]);

        match decoder.decode(&mut src).unwrap() {
            Some(Decoded::Handshake(response)) => assert_eq!(response.status_code, 101),
            other => panic!("expected handshake, got {:?}", other),
        }
        let text = frame(decoder.decode(&mut src).unwrap());
        assert_eq!(text.opcode, OpCode::Text);
        assert_eq!(&text.payload[..], b"hi");
    }

    #[test]
    fn test_partial_handshake_waits() {
        let mut decoder = FrameDecoder::new(1024);
        let mut src = BytesMut::from(&b"HTTP/1.1 101 Switching"[..]);
        assert!(decoder.decode(&mut src).unwrap().is_none());
    }

    #[test]
    fn test_refused_handshake_stays_in_handshake_phase() {
        let mut decoder = FrameDecoder::new(1024);
        let mut src = BytesMut::from(&b"HTTP/1.1 404 Not Found\r\n\r\n"[..]);
        assert!(matches!(decoder.decode(&mut src).unwrap(), Some(Decoded::Handshake(_))));
        assert!(!decoder.handshake_done);
    }

    #[test]
    fn test_malformed_handshake_is_reported() {
        let mut decoder = FrameDecoder::new(1024);
        let mut src = BytesMut::from(&b"HTTP/1.1 101 Switching Protocols\r\nnot a header\r\n\r\n"[..]);
        assert!(matches!(decoder.decode(&mut src), Err(CodecError::Handshake(_))));
    }

    #[test]
    fn test_payload_split_across_reads() {
        let mut decoder = opened_decoder(1024);
        let mut src = BytesMut::from(&b"\x82\x04ab"[..]);
        assert!(decoder.decode(&mut src).unwrap().is_none());

        src.extend_from_slice(b"cd");
        let binary = frame(decoder.decode(&mut src).unwrap());
        assert_eq!(binary.opcode, OpCode::Binary);
        assert_eq!(&binary.payload[..], b"abcd");
    }

    #[test]
    fn test_extended_length() {
        let mut decoder = opened_decoder(1024);
        let mut src = BytesMut::from(&[0x82u8, 126, 0x00, 0xc8][..]);
        src.extend_from_slice(&[7u8; 200]);
        let binary = frame(decoder.decode(&mut src).unwrap());
        assert_eq!(binary.payload.len(), 200);
    }

    #[test]
    fn test_frame_rule_violations() {
        let cases: [(&[u8], &str); 6] = [
            (b"\xc1\x00", "reserved bits set"),
            (b"\x83\x00", "unknown opcode"),
            (b"\x81\x80\x00\x00\x00\x00", "masked server frame"),
            (b"\x09\x00", "fragmented control frame"),
            (&[0x89, 126, 0x00, 0x7e], "control frame too large"),
            (&[0x82, 126, 0x04, 0x01], "frame too large"),
        ];

        for (bytes, expected) in cases {
            let mut decoder = opened_decoder(1024);
            let mut src = BytesMut::from(bytes);
            match decoder.decode(&mut src) {
                Err(CodecError::Protocol(reason)) => assert_eq!(reason, expected),
                other => panic!("{}: expected violation, got {:?}", expected, other),
            }
        }
    }
}
