pub mod tcp;
pub mod unix;

use crate::error::{Error, TransportError};

/// A byte stream: TCP or UNIX-domain. Reads are only ever done by the
/// session's single receive-loop thread; writes happen from whichever
/// thread is sending a request, serialized by the caller's send mutex.
pub trait Transport: Send {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), Error>;
    fn write_all(&mut self, buf: &[u8]) -> Result<(), Error>;
    fn shutdown_send(&mut self) -> Result<(), Error>;
    fn close(&mut self) -> Result<(), Error>;
    fn is_open(&self) -> bool;
    /// A second handle onto the same underlying socket, so the rawsocket
    /// framing layer can read on the receive-loop thread while writing from
    /// whichever thread holds the send mutex.
    fn try_clone(&self) -> Result<Box<dyn Transport>, Error>;
}

pub(crate) fn map_io_result(result: std::io::Result<()>) -> Result<(), Error> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(TransportError::Eof.into())
        }
        Err(e) => Err(TransportError::Io(e).into()),
    }
}
