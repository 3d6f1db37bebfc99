//! Frame primitives: opcodes, header layout and masking

use bytes::{BufMut, Bytes, BytesMut};

/// Largest payload a control frame may carry
pub const MAX_CONTROL_PAYLOAD: usize = 125;

/// Frame header upper bound: 2 bytes, 8 bytes extended length, 4 bytes mask
pub const MAX_HEAD_SIZE: usize = 14;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OpCode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
}

impl OpCode {
    /// Close, Ping and Pong; these cannot be fragmented and carry at most 125 bytes
    pub fn is_control(&self) -> bool {
        matches!(*self, OpCode::Close | OpCode::Ping | OpCode::Pong)
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x0 => Some(OpCode::Continuation),
            0x1 => Some(OpCode::Text),
            0x2 => Some(OpCode::Binary),
            0x8 => Some(OpCode::Close),
            0x9 => Some(OpCode::Ping),
            0xA => Some(OpCode::Pong),
            _ => None,
        }
    }
}

impl From<OpCode> for u8 {
    fn from(opcode: OpCode) -> Self {
        match opcode {
            OpCode::Continuation => 0x0,
            OpCode::Text => 0x1,
            OpCode::Binary => 0x2,
            OpCode::Close => 0x8,
            OpCode::Ping => 0x9,
            OpCode::Pong => 0xA,
        }
    }
}

/// One decoded frame; server frames are never masked so the payload is plain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub fin: bool,
    pub opcode: OpCode,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(fin: bool, opcode: OpCode, payload: impl Into<Bytes>) -> Self {
        Self {
            fin,
            opcode,
            payload: payload.into(),
        }
    }
}

/// XOR `buf` with the 4-byte masking key
#[inline]
pub fn apply_mask(buf: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in buf.iter_mut().enumerate() {
        *byte ^= mask[i & 3];
    }
}

/// Serialize one frame into `dst`, masking the payload when a key is given
pub fn write_frame(
    dst: &mut BytesMut,
    fin: bool,
    opcode: OpCode,
    payload: &[u8],
    mask: Option<[u8; 4]>,
) {
    let first_byte = (fin as u8) << 7 | u8::from(opcode);
    let mask_bit = if mask.is_some() { 0x80 } else { 0 };
    let len = payload.len();

    dst.reserve(MAX_HEAD_SIZE + len);
    dst.put_u8(first_byte);
    if len < 126 {
        dst.put_u8(len as u8 | mask_bit);
    } else if len < 65536 {
        dst.put_u8(126 | mask_bit);
        dst.put_u16(len as u16);
    } else {
        dst.put_u8(127 | mask_bit);
        dst.put_u64(len as u64);
    }

    if let Some(mask) = mask {
        dst.put_slice(&mask);
    }

    let index = dst.len();
    dst.put_slice(payload);
    if let Some(mask) = mask {
        apply_mask(&mut dst[index..], mask);
    }
}
