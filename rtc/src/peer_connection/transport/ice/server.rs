use std::net::SocketAddr;

use log::warn;
use serde::{Deserialize, Serialize};
use shared::error::{Error, Result};
use shared::util::lookup_host;
use url::Url;

/// Default port of a `stun:` URL without one.
pub(crate) const DEFAULT_STUN_PORT: u16 = 3478;

const SCHEME_STUN: &str = "stun";

/// ICEServer describes a single STUN server that can be used by
/// the ICEAgent to gather server reflexive candidates.
///
/// Only `stun:` URLs are used; other schemes are skipped with a warning.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RTCIceServer {
    pub urls: Vec<String>,
    pub username: String,
    pub credential: String,
}

impl RTCIceServer {
    /// Parses every `stun:` URL into a `(host, port)` pair.
    pub(crate) fn stun_hosts(&self) -> Result<Vec<(String, u16)>> {
        let mut hosts = vec![];
        for raw_url in &self.urls {
            // strip the query from "stun:" if present
            let raw_url = raw_url.split('?').next().unwrap_or_default();
            let url = Url::parse(raw_url)
                .map_err(|err| Error::ErrInvalidIceServerUrl(format!("{raw_url}: {err}")))?;
            if url.scheme() != SCHEME_STUN {
                warn!("skip unsupported ICE server url {raw_url}");
                continue;
            }
            hosts.push(parse_host_port(url.path(), raw_url)?);
        }
        Ok(hosts)
    }

    /// Resolves the STUN servers to socket addresses of both address families.
    /// A server that does not resolve is skipped.
    pub(crate) fn stun_addrs(&self) -> Result<Vec<SocketAddr>> {
        let mut addrs = vec![];
        for (host, port) in self.stun_hosts()? {
            let mut resolved = false;
            for use_ipv4 in [true, false] {
                if let Ok(addr) = lookup_host(use_ipv4, (host.as_str(), port)) {
                    addrs.push(addr);
                    resolved = true;
                }
            }
            if !resolved {
                warn!("failed to resolve STUN server {host}:{port}");
            }
        }
        Ok(addrs)
    }
}

/// Splits `host[:port]`, accepting bracketed IPv6 literals.
fn parse_host_port(authority: &str, raw_url: &str) -> Result<(String, u16)> {
    let invalid = || Error::ErrInvalidIceServerUrl(raw_url.to_owned());

    let (host, port) = if let Some(rest) = authority.strip_prefix('[') {
        let (host, rest) = rest.split_once(']').ok_or_else(invalid)?;
        match rest.strip_prefix(':') {
            Some(port) => (host, Some(port)),
            None if rest.is_empty() => (host, None),
            None => return Err(invalid()),
        }
    } else {
        match authority.rsplit_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (authority, None),
        }
    };

    if host.is_empty() {
        return Err(invalid());
    }
    let port = match port {
        Some(port) => port.parse::<u16>().map_err(|_| invalid())?,
        None => DEFAULT_STUN_PORT,
    };

    Ok((host.to_owned(), port))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_ice_server_stun_hosts() -> Result<()> {
        let server = RTCIceServer {
            urls: vec![
                "stun:stun.l.google.com:19302".to_owned(),
                "stun:example.org".to_owned(),
                "stun:[::1]:3479?transport=udp".to_owned(),
                "turn:turn.example.org:3478".to_owned(),
            ],
            ..Default::default()
        };

        assert_eq!(
            server.stun_hosts()?,
            vec![
                ("stun.l.google.com".to_owned(), 19302),
                ("example.org".to_owned(), DEFAULT_STUN_PORT),
                ("::1".to_owned(), 3479),
            ]
        );

        Ok(())
    }

    #[test]
    fn test_ice_server_invalid_url() {
        let tests = vec!["not a url", "stun:", "stun:host:port", "stun:[::1"];

        for raw in tests {
            let server = RTCIceServer {
                urls: vec![raw.to_owned()],
                ..Default::default()
            };
            let err = server.stun_hosts().unwrap_err();
            assert_eq!(err.kind(), shared::error::ErrorKind::Parse, "{raw}");
        }
    }

    #[test]
    fn test_ice_server_resolve_literal() -> Result<()> {
        let server = RTCIceServer {
            urls: vec!["stun:127.0.0.1:3478".to_owned()],
            ..Default::default()
        };
        assert_eq!(server.stun_addrs()?, vec!["127.0.0.1:3478".parse()?]);
        Ok(())
    }
}
