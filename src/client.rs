use std::time::Duration;

use crate::authenticator::{Anonymous, Authenticator};
use crate::error::Error;
use crate::rawsocket::MAX_MSG_SIZE;
use crate::serializer::SerializerType;
use crate::session::{Session, DEFAULT_TIMEOUT};
use crate::session_joiner::SessionJoiner;

/// Tunable knobs for establishing a session, consumed by `Connection`.
/// Covers what `SessionJoiner`/`Session` otherwise default: maximum message
/// size accepted during the rawsocket handshake, the per-request timeout,
/// and the size of the worker pool dispatching Invocation/Event handlers.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    max_msg_size: u32,
    timeout: Duration,
    pool_size: usize,
}

impl ClientConfig {
    pub fn new() -> ClientConfig {
        ClientConfig {
            max_msg_size: MAX_MSG_SIZE,
            timeout: DEFAULT_TIMEOUT,
            pool_size: 0,
        }
    }

    pub fn max_msg_size(mut self, max_msg_size: u32) -> ClientConfig {
        self.max_msg_size = max_msg_size;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> ClientConfig {
        self.timeout = timeout;
        self
    }

    /// `0` defaults to the available hardware concurrency.
    pub fn pool_size(mut self, pool_size: usize) -> ClientConfig {
        self.pool_size = pool_size;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> ClientConfig {
        ClientConfig::new()
    }
}

/// A WAMP connection target: a rawsocket URL and a realm, not yet joined.
pub struct Connection {
    url: String,
    realm: String,
    config: ClientConfig,
}

impl Connection {
    pub fn new(url: impl Into<String>, realm: impl Into<String>) -> Connection {
        Connection {
            url: url.into(),
            realm: realm.into(),
            config: ClientConfig::new(),
        }
    }

    pub fn with_config(mut self, config: ClientConfig) -> Connection {
        self.config = config;
        self
    }

    /// Joins anonymously over JSON.
    pub fn connect(self) -> Result<Session, Error> {
        self.connect_with(Box::new(Anonymous::new("anonymous")), SerializerType::Json)
    }

    /// Joins with an explicit authenticator and wire serializer.
    pub fn connect_with(
        self,
        authenticator: Box<dyn Authenticator>,
        serializer: SerializerType,
    ) -> Result<Session, Error> {
        let joiner = SessionJoiner::new(authenticator, serializer).with_max_msg_size(self.config.max_msg_size);
        let base = joiner.join(&self.url, &self.realm)?;
        Ok(Session::new(base, self.config.pool_size, self.config.timeout))
    }
}
