use crate::error::Error;

/// Which socket family a connection URL resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Tcp,
    Unix,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUrl {
    pub kind: TransportKind,
    /// Hostname for `Tcp`, socket path for `Unix`.
    pub host: String,
    /// Always `None` for `Unix`.
    pub port: Option<u16>,
}

/// Parses `scheme://host[:port][/…]` connection URLs.
///
/// Schemes: `tcp`/`rs` resolve to TCP+rawsocket; `unix`/`unix+rs` resolve to
/// UNIX-domain+rawsocket, in which case the whole remainder after `://` is
/// the socket path (no port, no further splitting). The `url` crate rejects
/// that authority-as-path shape for `unix://`, so this is hand rolled
/// instead, following the scheme/host/port split this client's original
/// implementation used.
pub fn parse_url(url: &str) -> Result<ParsedUrl, Error> {
    let (scheme, rest) = url
        .split_once("://")
        .ok_or_else(|| Error::protocol(format!("missing scheme in url: {}", url)))?;

    let kind = match scheme {
        "tcp" | "rs" => TransportKind::Tcp,
        "unix" | "unix+rs" => TransportKind::Unix,
        other => return Err(Error::protocol(format!("unsupported url scheme: {}", other))),
    };

    if kind == TransportKind::Unix {
        return Ok(ParsedUrl {
            kind,
            host: rest.to_string(),
            port: None,
        });
    }

    let authority = rest.split('/').next().unwrap_or(rest);
    match authority.rsplit_once(':') {
        Some((host, port)) => {
            let port: u16 = port
                .parse()
                .map_err(|_| Error::protocol(format!("invalid port in url: {}", url)))?;
            Ok(ParsedUrl {
                kind,
                host: host.to_string(),
                port: Some(port),
            })
        }
        None => Err(Error::protocol(format!("missing port in url: {}", url))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tcp_url() {
        let parsed = parse_url("tcp://127.0.0.1:8080").unwrap();
        assert_eq!(parsed.kind, TransportKind::Tcp);
        assert_eq!(parsed.host, "127.0.0.1");
        assert_eq!(parsed.port, Some(8080));
    }

    #[test]
    fn parses_rs_alias_with_path() {
        let parsed = parse_url("rs://example.com:9000/ws").unwrap();
        assert_eq!(parsed.host, "example.com");
        assert_eq!(parsed.port, Some(9000));
    }

    #[test]
    fn parses_unix_url_as_bare_path() {
        let parsed = parse_url("unix:///tmp/router.sock").unwrap();
        assert_eq!(parsed.kind, TransportKind::Unix);
        assert_eq!(parsed.host, "/tmp/router.sock");
        assert_eq!(parsed.port, None);
    }

    #[test]
    fn rejects_unknown_scheme() {
        assert!(parse_url("ws://127.0.0.1:8080").is_err());
    }

    #[test]
    fn rejects_missing_port() {
        assert!(parse_url("tcp://127.0.0.1").is_err());
    }
}
