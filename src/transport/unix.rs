use std::io::{Read, Write};
use std::os::unix::net::UnixStream;

use crate::error::Error;

use super::{map_io_result, Transport};

pub struct UnixTransport {
    stream: UnixStream,
    open: bool,
}

impl UnixTransport {
    pub fn connect(path: &str) -> Result<UnixTransport, Error> {
        let stream = UnixStream::connect(path)?;
        Ok(UnixTransport { stream, open: true })
    }

    pub fn from_stream(stream: UnixStream) -> UnixTransport {
        UnixTransport { stream, open: true }
    }
}

impl Transport for UnixTransport {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), Error> {
        map_io_result(self.stream.read_exact(buf))
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<(), Error> {
        map_io_result(self.stream.write_all(buf))
    }

    fn shutdown_send(&mut self) -> Result<(), Error> {
        match self.stream.shutdown(std::net::Shutdown::Write) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn close(&mut self) -> Result<(), Error> {
        self.open = false;
        match self.stream.shutdown(std::net::Shutdown::Both) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn try_clone(&self) -> Result<Box<dyn Transport>, Error> {
        Ok(Box::new(UnixTransport {
            stream: self.stream.try_clone()?,
            open: self.open,
        }))
    }
}
