use crate::error::{Error, Result};
use rand::{Rng, rng};
use std::net::{SocketAddr, ToSocketAddrs};

/// What a datagram on the shared ICE socket carries, told apart by its first
/// byte as RFC 7983 assigns the ranges.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PacketKind {
    /// 0..=3
    Stun,
    /// 20..=63
    Dtls,
    /// ZRTP, TURN channel data, RTP/RTCP or garbage.
    Other(u8),
    Empty,
}

impl PacketKind {
    pub fn classify(buf: &[u8]) -> Self {
        match buf.first() {
            None => PacketKind::Empty,
            Some(0..=3) => PacketKind::Stun,
            Some(20..=63) => PacketKind::Dtls,
            Some(&b) => PacketKind::Other(b),
        }
    }
}

/// Resolves `host` and returns its first address of the requested family.
pub fn lookup_host<T>(use_ipv4: bool, host: T) -> Result<SocketAddr>
where
    T: ToSocketAddrs,
{
    host.to_socket_addrs()?
        .find(|addr| addr.is_ipv4() == use_ipv4)
        .ok_or(Error::ErrAddressParseFailed)
}

const RUNES_ALPHA: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// A random string of `n` ASCII letters.
pub fn math_rand_alpha(n: usize) -> String {
    generate_crypto_random_string(n, RUNES_ALPHA)
}

/// Picks `n` runes uniformly with the thread-local CSPRNG.
pub fn generate_crypto_random_string(n: usize, runes: &[u8]) -> String {
    let mut rng = rng();
    (0..n)
        .map(|_| runes[rng.random_range(0..runes.len())] as char)
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_packet_kind_classify() {
        let tests = [
            (&[][..], PacketKind::Empty),
            (&[0x00, 0x01][..], PacketKind::Stun),
            (&[3][..], PacketKind::Stun),
            (&[4][..], PacketKind::Other(4)),
            (&[16][..], PacketKind::Other(16)),
            (&[20][..], PacketKind::Dtls),
            (&[22, 0xfe, 0xfd][..], PacketKind::Dtls),
            (&[63][..], PacketKind::Dtls),
            (&[64][..], PacketKind::Other(64)),
            (&[128, 0][..], PacketKind::Other(128)),
        ];
        for (buf, kind) in tests {
            assert_eq!(PacketKind::classify(buf), kind, "{buf:?}");
        }
    }

    #[test]
    fn test_lookup_host_family() -> Result<()> {
        let v4 = lookup_host(true, "127.0.0.1:3478")?;
        assert!(v4.is_ipv4());
        assert_eq!(v4.port(), 3478);
        assert_eq!(
            lookup_host(false, "127.0.0.1:3478").err(),
            Some(Error::ErrAddressParseFailed)
        );
        Ok(())
    }

    #[test]
    fn test_random_string() {
        let s = math_rand_alpha(16);
        assert_eq!(s.len(), 16);
        assert!(s.bytes().all(|b| RUNES_ALPHA.contains(&b)));
        assert_ne!(math_rand_alpha(32), math_rand_alpha(32));
    }
}
