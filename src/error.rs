use std::fmt;
use std::io;

use crate::value::{Dict, List};

/// Error surfaced to a `.do()` caller, a joiner caller, or the owner of a
/// `Session` when it tears down.
#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
}

#[derive(Debug)]
pub enum ErrorKind {
    /// Connection refused, EOF, or another I/O failure. Fatal for the
    /// session: triggers a transition to `DISCONNECTED`.
    Transport(TransportError),
    /// Magic mismatch, serializer refused, max-length refused, or an
    /// Abort during the join handshake. No session is created.
    Handshake(HandshakeError),
    /// Unexpected message kind or malformed frame outside the handshake.
    /// The receive loop exits and the session transitions to
    /// `DISCONNECTED`.
    Protocol(String),
    /// The router's `ERROR` reply to a call/register/publish/subscribe
    /// request. Confined to the originating `.do()`; does not terminate
    /// the session.
    Application {
        uri: String,
        args: List,
        kwargs: Dict,
    },
    /// A `.do()` or `leave()` wait exceeded its deadline.
    Timeout,
    /// `leave()` called on a session that is not `CONNECTED`, or any
    /// request made on a session that is `DISCONNECTED`.
    InvalidState(&'static str),
    /// The session (or one of its handles) was used after the underlying
    /// connection had already gone away.
    ConnectionClosed,
    /// JSON (de)serialization failure.
    Json(serde_json::Error),
    /// MsgPack encoding failure.
    MsgPackEncode(rmp_serde::encode::Error),
    /// MsgPack decoding failure.
    MsgPackDecode(rmp_serde::decode::Error),
    /// CBOR (de)serialization failure.
    Cbor(serde_cbor::Error),
}

impl Error {
    pub fn new(kind: ErrorKind) -> Error {
        Error { kind }
    }

    pub fn application(uri: impl Into<String>, args: List, kwargs: Dict) -> Error {
        Error::new(ErrorKind::Application {
            uri: uri.into(),
            args,
            kwargs,
        })
    }

    pub fn protocol(msg: impl Into<String>) -> Error {
        Error::new(ErrorKind::Protocol(msg.into()))
    }

    pub fn invalid_state(msg: &'static str) -> Error {
        Error::new(ErrorKind::InvalidState(msg))
    }

    fn get_description(&self) -> String {
        self.kind.description()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get_description())
    }
}

impl std::error::Error for Error {}

impl ErrorKind {
    pub fn description(&self) -> String {
        match self {
            ErrorKind::Transport(e) => e.to_string(),
            ErrorKind::Handshake(e) => e.to_string(),
            ErrorKind::Protocol(s) => format!("protocol error: {}", s),
            ErrorKind::Application { uri, args, kwargs } => format!(
                "application error {}: args={:?} kwargs={:?}",
                uri, args, kwargs
            ),
            ErrorKind::Timeout => "request timed out".to_string(),
            ErrorKind::InvalidState(s) => s.to_string(),
            ErrorKind::ConnectionClosed => "connection closed".to_string(),
            ErrorKind::Json(e) => e.to_string(),
            ErrorKind::MsgPackEncode(e) => e.to_string(),
            ErrorKind::MsgPackDecode(e) => e.to_string(),
            ErrorKind::Cbor(e) => e.to_string(),
        }
    }
}

#[derive(Debug)]
pub enum TransportError {
    Io(io::Error),
    Eof,
    Closed,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Io(e) => write!(f, "transport I/O error: {}", e),
            TransportError::Eof => write!(f, "transport closed by peer"),
            TransportError::Closed => write!(f, "transport is not connected"),
        }
    }
}

#[derive(Debug)]
pub enum HandshakeError {
    MagicMismatch,
    SerializerRefused,
    MaxLengthRefused,
    Aborted(String),
    UnexpectedMessage(&'static str),
}

impl fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeError::MagicMismatch => write!(f, "rawsocket handshake magic octet mismatch"),
            HandshakeError::SerializerRefused => {
                write!(f, "router refused the requested serializer")
            }
            HandshakeError::MaxLengthRefused => {
                write!(f, "router refused the requested maximum message length")
            }
            HandshakeError::Aborted(reason) => write!(f, "router aborted the join: {}", reason),
            HandshakeError::UnexpectedMessage(what) => {
                write!(f, "unexpected message during join: {}", what)
            }
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::new(ErrorKind::Transport(TransportError::Io(e)))
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Error::new(ErrorKind::Transport(e))
    }
}

impl From<HandshakeError> for Error {
    fn from(e: HandshakeError) -> Self {
        Error::new(ErrorKind::Handshake(e))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::new(ErrorKind::Json(e))
    }
}

impl From<rmp_serde::encode::Error> for Error {
    fn from(e: rmp_serde::encode::Error) -> Self {
        Error::new(ErrorKind::MsgPackEncode(e))
    }
}

impl From<rmp_serde::decode::Error> for Error {
    fn from(e: rmp_serde::decode::Error) -> Self {
        Error::new(ErrorKind::MsgPackDecode(e))
    }
}

impl From<serde_cbor::Error> for Error {
    fn from(e: serde_cbor::Error) -> Self {
        Error::new(ErrorKind::Cbor(e))
    }
}
