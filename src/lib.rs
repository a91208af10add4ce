//! A synchronous WAMPv2 client implementing RPC and PubSub over rawsocket
//! transports (TCP or UNIX-domain), with JSON, MsgPack and CBOR wire codecs
//! and Anonymous/Ticket/WAMPCRA/Cryptosign authentication.
//!
//! [`Connection`] resolves a URL and realm into a joined [`Session`]; the
//! session then exposes `.call()`, `.register()`, `.publish()`,
//! `.subscribe()` as fluent request builders terminated by `.send()`.

pub mod authenticator;
pub mod base_session;
pub mod client;
pub mod error;
pub mod id_generator;
pub mod message;
pub mod rawsocket;
pub mod serializer;
pub mod session;
pub mod session_joiner;
pub mod thread_pool;
pub mod transport;
pub mod url;
pub mod value;

pub use authenticator::{Anonymous, Authenticator, Cryptosign, Ticket, WampCra};
pub use base_session::{BaseSession, SessionDetails};
pub use client::{ClientConfig, Connection};
pub use error::{Error, ErrorKind, HandshakeError, TransportError};
pub use serializer::SerializerType;
pub use session::{
    CallRequest, CallResult, EventHandler, Invoke, ProcedureHandler, PublishRequest, Registration,
    RegisterRequest, Session, Subscription, SubscribeRequest,
};
pub use session_joiner::SessionJoiner;
pub use url::{parse_url, ParsedUrl, TransportKind};
pub use value::{Dict, List, Value};
