use std::io::{Read, Write};
use std::os::unix::net::UnixListener;
use std::path::PathBuf;

use xconn::rawsocket::RawsocketFrame;
use xconn::serializer::SerializerType;
use xconn::transport::unix::UnixTransport;
use xconn::transport::Transport;
use xconn::{BaseSession, SessionDetails};

/// A throwaway router listening on a UNIX-domain socket under the system
/// temp directory, so `SessionJoiner`/`Connection` can dial a real URL
/// instead of a pre-built stream pair.
pub struct MockRouter {
    pub path: PathBuf,
    listener: UnixListener,
}

impl MockRouter {
    pub fn bind(name: &str) -> MockRouter {
        let mut path = std::env::temp_dir();
        path.push(format!("xconn-test-{}-{}.sock", name, std::process::id()));
        let _ = std::fs::remove_file(&path);
        let listener = UnixListener::bind(&path).expect("bind mock router socket");
        MockRouter { path, listener }
    }

    pub fn url(&self) -> String {
        format!("unix://{}", self.path.display())
    }

    /// Accepts one connection, performs the server side of the rawsocket
    /// magic-octet handshake (unconditionally accepting whatever the client
    /// proposed), and hands back a `BaseSession` ready to exchange WAMP
    /// messages.
    pub fn accept(&self, serializer: SerializerType) -> BaseSession {
        let (mut stream, _addr) = self.listener.accept().expect("accept mock router connection");

        let mut request = [0u8; 4];
        stream.read_exact(&mut request).expect("read handshake request");
        stream.write_all(&request).expect("echo handshake reply");

        let transport: Box<dyn Transport> = Box::new(UnixTransport::from_stream(stream));
        let frame = RawsocketFrame::new(transport).expect("wrap accepted stream in rawsocket framing");

        BaseSession::new(
            frame,
            serializer.build(),
            SessionDetails {
                session_id: 0,
                realm: String::new(),
                auth_id: String::new(),
                auth_role: String::new(),
            },
        )
    }
}

impl Drop for MockRouter {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
