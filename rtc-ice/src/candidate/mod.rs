#[cfg(test)]
mod candidate_pair_test;
#[cfg(test)]
mod candidate_test;

pub mod candidate_pair;

use crc::{CRC_32_ISCSI, Crc};
use serde::{Deserialize, Serialize};
use shared::error::*;
use std::fmt::{self, Write as _};
use std::net::{IpAddr, SocketAddr};
use std::time::Instant;

use crate::network_type::{NetworkType, determine_network_type};

pub(crate) const DEFAULT_LOCAL_PREFERENCE: u16 = 65535;

/// Indicates that the candidate is used for RTP.
pub const COMPONENT_RTP: u16 = 1;

/// How the address of a candidate was learned, with its `typ` token.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandidateType {
    #[default]
    #[serde(rename = "unspecified")]
    Unspecified,
    #[serde(rename = "host")]
    Host,
    #[serde(rename = "srflx")]
    ServerReflexive,
    #[serde(rename = "prflx")]
    PeerReflexive,
    #[serde(rename = "relay")]
    Relay,
}

impl CandidateType {
    fn from_typ(typ: &str) -> Option<Self> {
        match typ {
            "host" => Some(Self::Host),
            "srflx" => Some(Self::ServerReflexive),
            "prflx" => Some(Self::PeerReflexive),
            "relay" => Some(Self::Relay),
            _ => None,
        }
    }

    /// Type preference from RFC 8445 section 5.1.2.2: host 126, peer
    /// reflexive 110, server reflexive 100, relayed 0.
    #[must_use]
    pub const fn preference(self) -> u16 {
        match self {
            Self::Host => 126,
            Self::PeerReflexive => 110,
            Self::ServerReflexive => 100,
            Self::Relay | Self::Unspecified => 0,
        }
    }
}

impl fmt::Display for CandidateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Host => "host",
            Self::ServerReflexive => "srflx",
            Self::PeerReflexive => "prflx",
            Self::Relay => "relay",
            Self::Unspecified => "Unknown candidate type",
        })
    }
}

/// The `raddr`/`rport` of a reflexive or relayed candidate.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct CandidateRelatedAddress {
    pub address: String,
    pub port: u16,
}

impl fmt::Display for CandidateRelatedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, " related {}:{}", self.address, self.port)
    }
}

/// Fields of a candidate before its address is resolved.
///
/// An empty `candidate_id` is generated, an empty `foundation` and a zero
/// `priority` are computed on demand.
#[derive(Default)]
pub struct CandidateConfig {
    pub candidate_id: String,
    pub candidate_type: CandidateType,
    pub network: String,
    pub address: String,
    pub port: u16,
    pub component: u16,
    pub priority: u32,
    pub foundation: String,
    /// Dropped for host candidates.
    pub related_address: Option<CandidateRelatedAddress>,
}

impl CandidateConfig {
    pub fn build(self) -> Result<Candidate> {
        if self.candidate_type == CandidateType::Unspecified {
            return Err(Error::ErrUnknownCandidateType);
        }
        if self.address.ends_with(".local") {
            // multicast DNS names are never resolved
            return Err(Error::ErrAddressParseFailed);
        }
        let ip: IpAddr = self
            .address
            .parse()
            .map_err(|_| Error::ErrAddressParseFailed)?;
        let network_type = determine_network_type(&self.network, &ip)?;

        let related_address = match self.candidate_type {
            CandidateType::Host => None,
            _ => self.related_address.filter(|r| !r.address.is_empty()),
        };
        let id = if self.candidate_id.is_empty() {
            crate::credentials::candidate_id()
        } else {
            self.candidate_id
        };

        let now = Instant::now();
        Ok(Candidate {
            id,
            network_type,
            candidate_type: self.candidate_type,
            component: self.component,
            addr: SocketAddr::new(ip, self.port),
            address: self.address,
            port: self.port,
            related_address,
            foundation: self.foundation,
            priority: self.priority,
            last_sent: now,
            last_received: now,
        })
    }
}

/// A transport address at which a peer may be reachable.
#[derive(Clone, Debug)]
pub struct Candidate {
    pub(crate) id: String,
    pub(crate) network_type: NetworkType,
    pub(crate) candidate_type: CandidateType,
    pub(crate) component: u16,
    /// As signaled, `addr` holds the parsed form.
    pub(crate) address: String,
    pub(crate) port: u16,
    pub(crate) addr: SocketAddr,
    pub(crate) related_address: Option<CandidateRelatedAddress>,
    /// Signaled foundation, empty when it is derived.
    pub(crate) foundation: String,
    /// Signaled priority, zero when it is derived.
    pub(crate) priority: u32,
    pub(crate) last_sent: Instant,
    pub(crate) last_received: Instant,
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}:{}",
            self.network_type, self.candidate_type, self.address, self.port
        )?;
        if let Some(related) = &self.related_address {
            write!(f, "{related}")?;
        }
        Ok(())
    }
}

impl Candidate {
    /// Candidates of one type on one base address share a foundation, so
    /// the port does not take part.
    pub fn foundation(&self) -> String {
        if !self.foundation.is_empty() {
            return self.foundation.clone();
        }
        let crc = Crc::<u32>::new(&CRC_32_ISCSI);
        let mut digest = crc.digest();
        digest.update(self.candidate_type.to_string().as_bytes());
        digest.update(self.address.as_bytes());
        digest.update(self.network_type.to_string().as_bytes());
        digest.finalize().to_string()
    }

    pub fn priority(&self) -> u32 {
        match self.priority {
            0 => Self::compute_priority(
                self.candidate_type,
                DEFAULT_LOCAL_PREFERENCE,
                self.component,
            ),
            signaled => signaled,
        }
    }

    /// RFC 8445 section 5.1.2.1:
    /// `2^24 * type preference + 2^8 * local preference + (256 - component)`.
    /// Candidates of the same type need distinct local preferences.
    pub fn compute_priority(
        candidate_type: CandidateType,
        local_preference: u16,
        component: u16,
    ) -> u32 {
        (u32::from(candidate_type.preference()) << 24)
            | (u32::from(local_preference) << 8)
            | (256 - u32::from(component.clamp(1, 256)))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn component(&self) -> u16 {
        self.component
    }

    pub fn network_type(&self) -> NetworkType {
        self.network_type
    }

    pub fn candidate_type(&self) -> CandidateType {
        self.candidate_type
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn related_address(&self) -> Option<CandidateRelatedAddress> {
        self.related_address.clone()
    }

    /// When a request or indication last went out from this candidate.
    pub fn last_sent(&self) -> Instant {
        self.last_sent
    }

    /// When traffic from this candidate last arrived.
    pub fn last_received(&self) -> Instant {
        self.last_received
    }

    pub(crate) fn mark_sent(&mut self, now: Instant) {
        self.last_sent = now;
    }

    pub(crate) fn mark_received(&mut self, now: Instant) {
        self.last_received = now;
    }

    /// The candidate attribute value, without the `candidate:` prefix.
    pub fn marshal(&self) -> String {
        let mut out = String::new();
        let _ = write!(
            out,
            "{} {} {} {} {} {} typ {}",
            self.foundation(),
            self.component,
            self.network_type.network_short(),
            self.priority(),
            self.address,
            self.port,
            self.candidate_type
        );
        if let Some(related) = &self.related_address {
            let _ = write!(out, " raddr {} rport {}", related.address, related.port);
        }
        out
    }

    /// Whether both describe the same transport address, ignoring the
    /// foundation, priority and component.
    pub fn equal(&self, other: &Candidate) -> bool {
        fn key(
            c: &Candidate,
        ) -> (
            NetworkType,
            CandidateType,
            &str,
            u16,
            Option<&CandidateRelatedAddress>,
        ) {
            (
                c.network_type,
                c.candidate_type,
                c.address.as_str(),
                c.port,
                c.related_address.as_ref(),
            )
        }
        key(self) == key(other)
    }
}

/// Parses the value of an `a=candidate` attribute, with or without its
/// `candidate:` prefix.
///
/// ```text
/// <foundation> <component> <transport> <priority> <address> <port> typ <type> [raddr <a> rport <p>] ...
/// ```
pub fn unmarshal_candidate(raw: &str) -> Result<Candidate> {
    let raw = raw.strip_prefix("candidate:").unwrap_or(raw);
    let fields: Vec<&str> = raw.split_whitespace().collect();
    let [foundation, component, network, priority, address, port, typ_key, typ, extensions @ ..] =
        fields.as_slice()
    else {
        return Err(Error::Other(format!(
            "{:?} ({})",
            Error::ErrAttributeTooShortIceCandidate,
            fields.len()
        )));
    };

    if *typ_key != "typ" {
        return Err(Error::ErrParseType);
    }
    let candidate_type = CandidateType::from_typ(typ).ok_or_else(|| {
        Error::Other(format!("{:?} ({typ})", Error::ErrUnknownCandidateType))
    })?;

    let mut related = CandidateRelatedAddress {
        address: String::new(),
        port: 0,
    };
    // extension attributes come as name/value pairs
    for pair in extensions.chunks_exact(2) {
        match pair[0] {
            "raddr" => pair[1].clone_into(&mut related.address),
            "rport" => related.port = pair[1].parse().map_err(|_| Error::ErrParseRelatedAddr)?,
            _ => {}
        }
    }

    CandidateConfig {
        candidate_type,
        network: (*network).to_owned(),
        address: (*address).to_owned(),
        port: port.parse().map_err(|_| Error::ErrParsePort)?,
        component: component.parse().map_err(|_| Error::ErrParseComponent)?,
        priority: priority.parse().map_err(|_| Error::ErrParsePriority)?,
        foundation: (*foundation).to_owned(),
        related_address: Some(related),
        ..CandidateConfig::default()
    }
    .build()
}
