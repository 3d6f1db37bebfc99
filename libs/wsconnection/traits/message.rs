use crate::headers::Headers;
use crate::uri::WebSocketUri;
use std::any::Any;

/// Status code carried by a close frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseCode {
    /// 1000, the purpose of the connection has been fulfilled
    Normal,
    /// 1001, endpoint is going away
    Away,
    /// 1002
    Protocol,
    /// 1003, received a data type it cannot accept
    Unsupported,
    /// 1005, no status code was present
    NoStatus,
    /// 1006, closed without a close frame
    Abnormal,
    /// 1007, payload inconsistent with the message type
    Invalid,
    /// 1008
    Policy,
    /// 1009
    Size,
    /// 1010
    Extension,
    /// 1011, unexpected condition on the server
    Error,
    /// Any other code
    Other(u16),
}

impl From<u16> for CloseCode {
    fn from(code: u16) -> Self {
        match code {
            1000 => CloseCode::Normal,
            1001 => CloseCode::Away,
            1002 => CloseCode::Protocol,
            1003 => CloseCode::Unsupported,
            1005 => CloseCode::NoStatus,
            1006 => CloseCode::Abnormal,
            1007 => CloseCode::Invalid,
            1008 => CloseCode::Policy,
            1009 => CloseCode::Size,
            1010 => CloseCode::Extension,
            1011 => CloseCode::Error,
            other => CloseCode::Other(other),
        }
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> u16 {
        match code {
            CloseCode::Normal => 1000,
            CloseCode::Away => 1001,
            CloseCode::Protocol => 1002,
            CloseCode::Unsupported => 1003,
            CloseCode::NoStatus => 1005,
            CloseCode::Abnormal => 1006,
            CloseCode::Invalid => 1007,
            CloseCode::Policy => 1008,
            CloseCode::Size => 1009,
            CloseCode::Extension => 1010,
            CloseCode::Error => 1011,
            CloseCode::Other(code) => code,
        }
    }
}

/// Events produced by the frame reader and delivered to the supervisor mailbox
#[derive(Debug)]
pub enum InboundEvent {
    /// Complete UTF-8 text message
    TextMessage(String),
    /// Text message delivered as raw UTF-8 bytes
    RawTextMessage(Vec<u8>),
    /// Complete binary message
    BinaryMessage(Vec<u8>),
    /// Ping control frame
    Ping(Vec<u8>),
    /// Pong control frame
    Pong(Vec<u8>),
    /// Close frame sent by the peer
    Close {
        code: Option<CloseCode>,
        reason: String,
    },
    /// Outcome of the opening handshake
    ServerHandshake { success: bool },
    /// Transport dropped (EOF or socket failure)
    ConnectionLost,
    /// Peer violated the framing protocol
    ProtocolViolation,
    /// Local failure inside a worker
    Error(String),
    /// Server refused the upgrade with a non-101 status
    ServerError {
        status_code: u16,
        status_message: String,
    },
    /// Anything else a custom framing layer wants to surface
    Application(Box<dyn Any + Send>),
}

impl InboundEvent {
    /// Whether the reader stops after producing this event
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InboundEvent::ConnectionLost
                | InboundEvent::ProtocolViolation
                | InboundEvent::Error(_)
                | InboundEvent::ServerError { .. }
        )
    }
}

/// Commands accepted by the frame writer, processed in send order
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundCommand {
    /// Opening handshake request
    ClientHandshake {
        uri: WebSocketUri,
        headers: Headers,
        subprotocols: Vec<String>,
    },
    TextMessage(String),
    RawTextMessage(Vec<u8>),
    BinaryMessage(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close {
        code: CloseCode,
        reason: Option<String>,
    },
    /// Ends the writer task; never reaches the wire
    Quit,
}

impl OutboundCommand {
    /// Close command with a normal status and no reason
    pub fn close_normal() -> Self {
        OutboundCommand::Close {
            code: CloseCode::Normal,
            reason: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_code_conversion() {
        assert_eq!(CloseCode::from(1000), CloseCode::Normal);
        assert_eq!(CloseCode::from(1011), CloseCode::Error);
        assert_eq!(CloseCode::from(4001), CloseCode::Other(4001));
        assert_eq!(u16::from(CloseCode::Protocol), 1002);
        assert_eq!(u16::from(CloseCode::Other(3000)), 3000);
    }

    #[test]
    fn test_terminal_events() {
        assert!(InboundEvent::ConnectionLost.is_terminal());
        assert!(InboundEvent::ProtocolViolation.is_terminal());
        assert!(InboundEvent::Error("boom".into()).is_terminal());
        assert!(InboundEvent::ServerError {
            status_code: 404,
            status_message: "Not Found".into()
        }
        .is_terminal());
        assert!(!InboundEvent::Ping(vec![]).is_terminal());
        assert!(!InboundEvent::Close {
            code: Some(CloseCode::Normal),
            reason: String::new()
        }
        .is_terminal());
    }
}
