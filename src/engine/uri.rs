//! Server URI parsing shared by the engine factories.
//!
//! Accepted form: `scheme://host[:port][/]`, where `host` may be a bracketed
//! IPv6 literal. The port defaults to 1883.

use crate::{Error, Result};

pub(crate) const DEFAULT_PORT: u16 = 1883;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scheme {
    // ---
    /// `tcp://` or `mqtt://`
    Tcp,
    /// `memory://`
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ServerUri {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
}

pub(crate) fn parse(uri: &str) -> Result<ServerUri> {
    // ---
    let invalid = |reason: &str| Error::InvalidUri(format!("{uri}: {reason}"));

    let (scheme, rest) = uri
        .split_once("://")
        .ok_or_else(|| invalid("missing scheme"))?;

    let scheme = match scheme.to_ascii_lowercase().as_str() {
        "tcp" | "mqtt" => Scheme::Tcp,
        "memory" => Scheme::Memory,
        _ => return Err(invalid("unsupported scheme")),
    };

    let authority = rest.trim_end_matches('/');

    // Bracketed IPv6 literal: "[::1]:1883"
    let (host, port) = if let Some(inner) = authority.strip_prefix('[') {
        let (host, tail) = inner
            .split_once(']')
            .ok_or_else(|| invalid("unterminated IPv6 literal"))?;
        match tail.strip_prefix(':') {
            Some(port) => (host, Some(port)),
            None if tail.is_empty() => (host, None),
            None => return Err(invalid("unexpected characters after host")),
        }
    } else {
        match authority.rsplit_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (authority, None),
        }
    };

    let port = match port {
        Some(port) => port.parse().map_err(|_| invalid("invalid port"))?,
        None => DEFAULT_PORT,
    };

    if scheme == Scheme::Tcp && host.is_empty() {
        return Err(invalid("missing host"));
    }

    Ok(ServerUri {
        scheme,
        host: host.to_owned(),
        port,
    })
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_tcp_with_port() {
        // ---
        let uri = parse("tcp://broker.example:1883").unwrap();
        assert_eq!(uri.scheme, Scheme::Tcp);
        assert_eq!(uri.host, "broker.example");
        assert_eq!(uri.port, 1883);
    }

    #[test]
    fn test_mqtt_scheme_default_port() {
        // ---
        let uri = parse("mqtt://localhost/").unwrap();
        assert_eq!(uri.scheme, Scheme::Tcp);
        assert_eq!(uri.host, "localhost");
        assert_eq!(uri.port, DEFAULT_PORT);
    }

    #[test]
    fn test_ipv6_literal() {
        // ---
        let uri = parse("tcp://[::1]:2883").unwrap();
        assert_eq!(uri.host, "::1");
        assert_eq!(uri.port, 2883);
    }

    #[test]
    fn test_memory_without_host() {
        // ---
        let uri = parse("memory://").unwrap();
        assert_eq!(uri.scheme, Scheme::Memory);
        assert!(uri.host.is_empty());
    }

    #[test]
    fn test_rejects_bad_input() {
        // ---
        for bad in [
            "broker.example:1883",
            "ws://broker.example:80",
            "tcp://broker.example:http",
            "tcp://:1883",
            "tcp://[::1",
        ] {
            assert!(
                matches!(parse(bad), Err(Error::InvalidUri(_))),
                "accepted {bad}"
            );
        }
    }
}
