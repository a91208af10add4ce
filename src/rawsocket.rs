use std::sync::Mutex;

use crate::error::{Error, HandshakeError, TransportError};
use crate::serializer::SerializerType;
use crate::transport::Transport;

const MAGIC: u8 = 0x7F;
pub const MIN_MSG_SIZE: u32 = 1 << 9;
pub const MAX_MSG_SIZE: u32 = 1 << 24;

const KIND_REGULAR: u8 = 0;
const KIND_PING: u8 = 1;
const KIND_PONG: u8 = 2;

fn length_exp(max_msg_size: u32) -> u8 {
    let size = max_msg_size.clamp(MIN_MSG_SIZE, MAX_MSG_SIZE).next_power_of_two();
    (32 - size.leading_zeros() - 1).saturating_sub(9) as u8
}

/// Performs the client side of the rawsocket magic-octet handshake over an
/// already-connected transport. Leaves the transport ready for framed
/// message exchange on success.
pub fn client_handshake(
    transport: &mut dyn Transport,
    serializer: SerializerType,
    max_msg_size: u32,
) -> Result<(), Error> {
    let request = [
        MAGIC,
        (length_exp(max_msg_size) << 4) | (serializer as u8 & 0x0F),
        0,
        0,
    ];
    transport.write_all(&request)?;

    let mut reply = [0u8; 4];
    transport.read_exact(&mut reply)?;

    if reply[0] != MAGIC || reply[2] != 0 || reply[3] != 0 {
        return Err(HandshakeError::MagicMismatch.into());
    }

    // Only the low nibble (serializer) is a contract between client and
    // router; the high nibble carries the router's own negotiated max
    // length and commonly differs from the client's requested length_exp.
    // A low nibble of 0 signals an error, with the code in the high nibble.
    let reply_serializer = reply[1] & 0x0F;
    if reply_serializer == 0 {
        let error_code = (reply[1] & 0xF0) >> 4;
        return Err(match error_code {
            1 => HandshakeError::SerializerRefused.into(),
            2 => HandshakeError::MaxLengthRefused.into(),
            _ => HandshakeError::UnexpectedMessage("handshake reply").into(),
        });
    }
    if reply_serializer != (serializer as u8 & 0x0F) {
        return Err(HandshakeError::UnexpectedMessage("handshake reply serializer mismatch").into());
    }

    Ok(())
}

/// The per-message 4-byte-header framing layered over a `Transport`.
/// Reads are driven exclusively by the session's receive loop; the `reader`
/// half is mutex-guarded only so that `RawsocketFrame` can be shared (via
/// `Arc`) between the receive-loop thread and sender threads, not because
/// more than one thread is ever expected to call `recv_bytes` concurrently.
/// Writes from arbitrary threads go through `writer`'s mutex so that a
/// header and its payload are never interleaved with another write.
pub struct RawsocketFrame {
    reader: Mutex<Box<dyn Transport>>,
    writer: Mutex<Box<dyn Transport>>,
}

impl RawsocketFrame {
    /// Splits a connected, already-handshaken transport into a reader half
    /// (kept here for the receive loop) and a writer half (put behind the
    /// send mutex).
    pub fn new(transport: Box<dyn Transport>) -> Result<RawsocketFrame, Error> {
        let writer = transport.try_clone()?;
        Ok(RawsocketFrame {
            reader: Mutex::new(transport),
            writer: Mutex::new(writer),
        })
    }

    pub fn send_bytes(&self, payload: &[u8]) -> Result<(), Error> {
        self.write_framed(KIND_REGULAR, payload)
    }

    fn write_framed(&self, kind: u8, payload: &[u8]) -> Result<(), Error> {
        let mut header = [kind, 0, 0, 0];
        let len = payload.len() as u32;
        header[1] = (len >> 16) as u8;
        header[2] = (len >> 8) as u8;
        header[3] = len as u8;

        let mut writer = self.writer.lock().unwrap();
        writer.write_all(&header)?;
        writer.write_all(payload)?;
        Ok(())
    }

    /// Reads the next regular-message payload, transparently consuming any
    /// PING/PONG frames along the way. A PING is echoed back as a PONG with
    /// the same payload before the loop reads on; PONGs are just discarded.
    /// Returns `Ok(None)` on a clean peer close.
    pub fn recv_bytes(&self) -> Result<Option<Vec<u8>>, Error> {
        loop {
            let mut header = [0u8; 4];
            let mut reader = self.reader.lock().unwrap();
            match reader.read_exact(&mut header) {
                Ok(()) => {}
                Err(e) => {
                    if matches!(&e.kind, crate::error::ErrorKind::Transport(TransportError::Eof)) {
                        return Ok(None);
                    }
                    return Err(e);
                }
            }

            let kind = header[0] & 0x07;
            let len = ((header[1] as usize) << 16) | ((header[2] as usize) << 8) | header[3] as usize;
            let mut payload = vec![0u8; len];
            reader.read_exact(&mut payload)?;
            // Drop the reader guard before any write: `close()` locks
            // writer-then-reader, so holding both here in the opposite
            // order would risk a lock-order-inversion deadlock.
            drop(reader);

            match kind {
                KIND_REGULAR => return Ok(Some(payload)),
                KIND_PING => self.write_framed(KIND_PONG, &payload)?,
                KIND_PONG => continue,
                other => {
                    return Err(Error::protocol(format!("unknown rawsocket frame kind {}", other)))
                }
            }
        }
    }

    pub fn shutdown_send(&self) -> Result<(), Error> {
        self.writer.lock().unwrap().shutdown_send()
    }

    pub fn close(&self) -> Result<(), Error> {
        self.writer.lock().unwrap().close()?;
        self.reader.lock().unwrap().close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_exp_matches_known_sizes() {
        assert_eq!(length_exp(1 << 9), 0);
        assert_eq!(length_exp(1 << 24), 15);
    }

    #[test]
    fn length_exp_clamps_small_sizes() {
        assert_eq!(length_exp(1), 0);
    }

    #[test]
    fn length_exp_clamps_large_sizes() {
        assert_eq!(length_exp(u32::MAX), 15);
    }

    /// A canned 4-byte reply the client reads once, with writes captured
    /// for inspection. Stands in for a router connection in these
    /// handshake-only tests.
    struct FakeTransport {
        reply: [u8; 4],
        read: bool,
    }

    impl Transport for FakeTransport {
        fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), Error> {
            assert!(!self.read, "handshake only reads one reply");
            self.read = true;
            buf.copy_from_slice(&self.reply);
            Ok(())
        }

        fn write_all(&mut self, _buf: &[u8]) -> Result<(), Error> {
            Ok(())
        }

        fn shutdown_send(&mut self) -> Result<(), Error> {
            Ok(())
        }

        fn close(&mut self) -> Result<(), Error> {
            Ok(())
        }

        fn is_open(&self) -> bool {
            true
        }

        fn try_clone(&self) -> Result<Box<dyn Transport>, Error> {
            Ok(Box::new(FakeTransport {
                reply: self.reply,
                read: self.read,
            }))
        }
    }

    /// A conformant router echoes the requested serializer but answers with
    /// its own negotiated max-message-length in the high nibble, which
    /// commonly differs from what the client proposed.
    #[test]
    fn accepts_reply_with_different_max_length_nibble() {
        let mut transport = FakeTransport {
            reply: [MAGIC, (0xB << 4) | 1, 0, 0],
            read: false,
        };
        client_handshake(&mut transport, SerializerType::Json, MAX_MSG_SIZE).unwrap();
    }

    #[test]
    fn rejects_serializer_mismatch() {
        let mut transport = FakeTransport {
            reply: [MAGIC, (0xB << 4) | 2, 0, 0],
            read: false,
        };
        let err = client_handshake(&mut transport, SerializerType::Json, MAX_MSG_SIZE).unwrap_err();
        assert!(matches!(
            err.kind,
            crate::error::ErrorKind::Handshake(HandshakeError::UnexpectedMessage(_))
        ));
    }

    #[test]
    fn rejects_error_signal_in_low_nibble() {
        let mut transport = FakeTransport {
            reply: [MAGIC, 1 << 4, 0, 0],
            read: false,
        };
        let err = client_handshake(&mut transport, SerializerType::Json, MAX_MSG_SIZE).unwrap_err();
        assert!(matches!(
            err.kind,
            crate::error::ErrorKind::Handshake(HandshakeError::SerializerRefused)
        ));
    }
}
