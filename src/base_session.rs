use crate::error::Error;
use crate::message::Message;
use crate::rawsocket::RawsocketFrame;
use crate::serializer::Serializer;

/// Session metadata produced by the join handshake. Immutable for the
/// lifetime of the session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionDetails {
    pub session_id: u64,
    pub realm: String,
    pub auth_id: String,
    pub auth_role: String,
}

/// Pairs a framed transport with a codec and the session metadata. Thin:
/// it only knows how to move whole `Message`s across the wire.
pub struct BaseSession {
    frame: RawsocketFrame,
    serializer: Box<dyn Serializer>,
    pub details: SessionDetails,
}

impl BaseSession {
    pub fn new(frame: RawsocketFrame, serializer: Box<dyn Serializer>, details: SessionDetails) -> BaseSession {
        BaseSession {
            frame,
            serializer,
            details,
        }
    }

    pub fn send_message(&self, message: &Message) -> Result<(), Error> {
        let bytes = self.serializer.encode(message)?;
        self.frame.send_bytes(&bytes)
    }

    /// `Ok(None)` on a clean peer close. Intended to be called from a single
    /// receive-loop thread; nothing else in this type requires exclusivity.
    pub fn recv_message(&self) -> Result<Option<Message>, Error> {
        match self.frame.recv_bytes()? {
            Some(bytes) => Ok(Some(self.serializer.decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn close(&self) -> Result<(), Error> {
        self.frame.close()
    }

    pub fn shutdown_send(&self) -> Result<(), Error> {
        self.frame.shutdown_send()
    }
}
