use bytes::BytesMut;
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Instant;

#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TransportProtocol {
    #[default]
    UDP,
    TCP,
}

impl fmt::Display for TransportProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransportProtocol::UDP => "udp",
            TransportProtocol::TCP => "tcp",
        })
    }
}

/// The socket pair a datagram travelled between.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransportContext {
    pub local_addr: SocketAddr,
    pub peer_addr: SocketAddr,
    pub transport_protocol: TransportProtocol,
}

impl Default for TransportContext {
    fn default() -> Self {
        let unspecified = SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), 0);
        Self {
            local_addr: unspecified,
            peer_addr: unspecified,
            transport_protocol: TransportProtocol::UDP,
        }
    }
}

/// A payload stamped with the time it was received or queued and the socket
/// pair it belongs to. Sans-I/O protocols take and return these.
#[derive(Debug, Clone)]
pub struct TransportMessage<T> {
    pub now: Instant,
    pub transport: TransportContext,
    pub message: T,
}

pub type TaggedBytesMut = TransportMessage<BytesMut>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_transport_context_default() {
        let ctx = TransportContext::default();
        assert!(ctx.local_addr.ip().is_unspecified());
        assert!(ctx.peer_addr.ip().is_unspecified());
        assert_eq!(ctx.local_addr.port(), 0);
        assert_eq!(ctx.transport_protocol.to_string(), "udp");
        assert_eq!(TransportProtocol::TCP.to_string(), "tcp");
    }

    #[test]
    fn test_tagged_bytes_keeps_context() {
        let transport = TransportContext {
            local_addr: "10.0.0.1:5000".parse().expect("local"),
            peer_addr: "10.0.0.2:6000".parse().expect("peer"),
            transport_protocol: TransportProtocol::UDP,
        };
        let msg: TaggedBytesMut = TransportMessage {
            now: Instant::now(),
            transport,
            message: BytesMut::from(&b"abc"[..]),
        };
        let copy = msg.clone();
        assert_eq!(copy.transport, transport);
        assert_eq!(&copy.message[..], b"abc");
    }
}
