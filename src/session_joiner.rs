use crate::authenticator::Authenticator;
use crate::base_session::{BaseSession, SessionDetails};
use crate::error::{Error, HandshakeError};
use crate::message::Message;
use crate::rawsocket::{self, RawsocketFrame, MAX_MSG_SIZE};
use crate::serializer::{Serializer, SerializerType};
use crate::transport::tcp::TcpTransport;
use crate::transport::unix::UnixTransport;
use crate::transport::Transport;
use crate::url::{self, TransportKind};
use crate::value::{Dict, Value};

fn client_roles() -> Value {
    let mut roles = Dict::new();
    for role in ["caller", "callee", "publisher", "subscriber"] {
        roles.insert(role.to_string(), Dict::new().into());
    }
    Value::Dict(roles)
}

fn send(frame: &RawsocketFrame, serializer: &dyn Serializer, message: &Message) -> Result<(), Error> {
    let bytes = serializer.encode(message)?;
    frame.send_bytes(&bytes)
}

fn recv(frame: &RawsocketFrame, serializer: &dyn Serializer) -> Result<Option<Message>, Error> {
    match frame.recv_bytes()? {
        Some(bytes) => Ok(Some(serializer.decode(&bytes)?)),
        None => Ok(None),
    }
}

/// Drives the HELLO/CHALLENGE/AUTHENTICATE/WELCOME handshake against a
/// router reachable at a connection URL, producing a ready `BaseSession`.
pub struct SessionJoiner {
    authenticator: Box<dyn Authenticator>,
    serializer_type: SerializerType,
    max_msg_size: u32,
}

impl SessionJoiner {
    pub fn new(authenticator: Box<dyn Authenticator>, serializer_type: SerializerType) -> SessionJoiner {
        SessionJoiner {
            authenticator,
            serializer_type,
            max_msg_size: MAX_MSG_SIZE,
        }
    }

    pub fn with_max_msg_size(mut self, max_msg_size: u32) -> SessionJoiner {
        self.max_msg_size = max_msg_size;
        self
    }

    fn connect_transport(&self, uri: &str) -> Result<Box<dyn Transport>, Error> {
        let parsed = url::parse_url(uri)?;
        let transport: Box<dyn Transport> = match parsed.kind {
            TransportKind::Tcp => {
                let port = parsed
                    .port
                    .ok_or_else(|| Error::protocol("tcp url missing port"))?;
                Box::new(TcpTransport::connect(&parsed.host, port)?)
            }
            TransportKind::Unix => Box::new(UnixTransport::connect(&parsed.host)?),
        };
        Ok(transport)
    }

    pub fn join(&self, uri: &str, realm: &str) -> Result<BaseSession, Error> {
        let mut transport = self.connect_transport(uri)?;
        rawsocket::client_handshake(transport.as_mut(), self.serializer_type, self.max_msg_size)?;

        let frame = RawsocketFrame::new(transport)?;
        let serializer = self.serializer_type.build();

        let mut details = Dict::new();
        details.insert("roles".to_string(), client_roles());
        details.insert(
            "authmethods".to_string(),
            Value::List(vec![self.authenticator.auth_method().to_string().into()]),
        );
        details.insert("authid".to_string(), self.authenticator.auth_id().to_string().into());
        details.insert("authextra".to_string(), Value::Dict(self.authenticator.auth_extra()));

        send(&frame, &*serializer, &Message::Hello(realm.to_string(), details))?;

        loop {
            let message = recv(&frame, &*serializer)?.ok_or_else(|| {
                Error::from(HandshakeError::UnexpectedMessage("transport closed during join"))
            })?;

            match message {
                Message::Challenge(_method, extra) => {
                    let signature = self.authenticator.compute_response(&extra)?;
                    send(&frame, &*serializer, &Message::Authenticate(signature, Dict::new()))?;
                }
                Message::Welcome(session_id, details) => {
                    let auth_id = details
                        .get("authid")
                        .and_then(Value::as_str)
                        .unwrap_or("")
                        .to_string();
                    let auth_role = details
                        .get("authrole")
                        .and_then(Value::as_str)
                        .unwrap_or("")
                        .to_string();
                    return Ok(BaseSession::new(
                        frame,
                        serializer,
                        SessionDetails {
                            session_id,
                            realm: realm.to_string(),
                            auth_id,
                            auth_role,
                        },
                    ));
                }
                Message::Abort(_details, reason) => {
                    return Err(HandshakeError::Aborted(reason).into());
                }
                _ => return Err(HandshakeError::UnexpectedMessage("expected challenge or welcome").into()),
            }
        }
    }
}
