//! Transport layer types for ICE, DTLS, and SCTP.
//!
//! Data channels ride on three stacked transports:
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │      Data Channels (DCEP)           │  Application Layer
//! ├─────────────────────────────────────┤
//! │      SCTP (streams)                 │  Protocol Layer
//! ├─────────────────────────────────────┤
//! │      DTLS (encryption)              │  Security Layer
//! ├─────────────────────────────────────┤
//! │      ICE (NAT traversal)            │  Connectivity Layer
//! ├─────────────────────────────────────┤
//! │      UDP                            │  Network Layer
//! └─────────────────────────────────────┘
//! ```
//!
//! # ICE Transport
//!
//! ICE establishes connectivity through NATs by:
//!
//! 1. Gathering local addresses ([`RTCIceCandidate`])
//! 2. Exchanging candidates with the remote peer
//! 3. Checking candidate pairs for connectivity
//! 4. Selecting the highest priority working pair
//!
//! # DTLS Transport
//!
//! The handshake authenticates the remote certificate against the
//! [`RTCDtlsFingerprint`] of the remote description. [`RTCDtlsRole`] decides
//! which side sends the ClientHello.
//!
//! # SCTP Transport
//!
//! One association multiplexes every data channel, see [`RTCSctpTransportState`].
//!
//! ```
//! use rtc::peer_connection::transport::RTCIceCandidateType;
//!
//! fn requires_stun_server(candidate_type: RTCIceCandidateType) -> bool {
//!     matches!(candidate_type, RTCIceCandidateType::Srflx)
//! }
//!
//! assert!(!requires_stun_server(RTCIceCandidateType::Host));
//! assert!(requires_stun_server(RTCIceCandidateType::Srflx));
//! ```
//!
//! # Specifications
//!
//! - [RFC 8445] - ICE: Interactive Connectivity Establishment
//! - [RFC 6347] - DTLS: Datagram Transport Layer Security
//! - [RFC 8261] - SCTP over DTLS
//!
//! [RFC 8445]: https://datatracker.ietf.org/doc/html/rfc8445
//! [RFC 6347]: https://datatracker.ietf.org/doc/html/rfc6347
//! [RFC 8261]: https://datatracker.ietf.org/doc/html/rfc8261

pub(crate) mod dtls;
pub(crate) mod ice;
pub(crate) mod sctp;

pub use dtls::fingerprint::RTCDtlsFingerprint;
pub use dtls::role::RTCDtlsRole;
pub use dtls::state::RTCDtlsTransportState;

pub use ice::candidate::{RTCIceCandidate, RTCIceCandidateInit};
pub use ice::candidate_type::RTCIceCandidateType;
pub use ice::server::RTCIceServer;

pub use sctp::state::RTCSctpTransportState;
