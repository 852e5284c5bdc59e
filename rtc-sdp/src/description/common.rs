use shared::error::{Error, Result};
use std::fmt;

/// Information describing an SDP connection (`c=` line).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConnectionInformation {
    pub network_type: String,
    pub address_type: String,
    pub address: Option<Address>,
}

impl fmt::Display for ConnectionInformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(address) = &self.address {
            write!(f, "{} {} {}", self.network_type, self.address_type, address)
        } else {
            write!(f, "{} {}", self.network_type, self.address_type)
        }
    }
}

impl ConnectionInformation {
    pub(crate) fn unmarshal(value: &str) -> Result<Self> {
        let fields: Vec<&str> = value.split_whitespace().collect();
        if fields.len() < 2 {
            return Err(Error::SdpInvalidSyntax(format!("`c={value}`")));
        }

        // Set according to currently registered with IANA
        // https://tools.ietf.org/html/rfc4566#section-8.2.6
        if fields[0] != "IN" {
            return Err(Error::SdpInvalidValue(fields[0].to_owned()));
        }
        if fields[1] != "IP4" && fields[1] != "IP6" {
            return Err(Error::SdpInvalidValue(fields[1].to_owned()));
        }

        let address = if fields.len() > 2 {
            Some(Address::unmarshal(fields[2])?)
        } else {
            None
        };

        Ok(ConnectionInformation {
            network_type: fields[0].to_owned(),
            address_type: fields[1].to_owned(),
            address,
        })
    }
}

/// Address of the connection, with optional multicast TTL and range.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Address {
    pub address: String,
    pub ttl: Option<isize>,
    pub range: Option<isize>,
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)?;
        if let Some(t) = &self.ttl {
            write!(f, "/{t}")?;
        }
        if let Some(r) = &self.range {
            write!(f, "/{r}")?;
        }
        Ok(())
    }
}

impl Address {
    fn unmarshal(value: &str) -> Result<Self> {
        let mut parts = value.split('/');
        let address = parts.next().unwrap_or_default().to_owned();
        let ttl = parts.next().map(|p| p.parse::<isize>()).transpose()?;
        let range = parts.next().map(|p| p.parse::<isize>()).transpose()?;
        if parts.next().is_some() {
            return Err(Error::SdpInvalidValue(value.to_owned()));
        }
        Ok(Address {
            address,
            ttl,
            range,
        })
    }
}

/// Bandwidth (`b=` line), e.g. `AS:30`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Bandwidth {
    pub experimental: bool,
    pub bandwidth_type: String,
    pub bandwidth: u64,
}

impl fmt::Display for Bandwidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let output = if self.experimental { "X-" } else { "" };
        write!(f, "{}{}:{}", output, self.bandwidth_type, self.bandwidth)
    }
}

impl Bandwidth {
    pub(crate) fn unmarshal(value: &str) -> Result<Self> {
        let (typ, bw) = value
            .split_once(':')
            .ok_or_else(|| Error::SdpInvalidSyntax(format!("`b={value}`")))?;

        let (experimental, bandwidth_type) = if let Some(stripped) = typ.strip_prefix("X-") {
            (true, stripped)
        } else {
            // Set according to currently registered with IANA
            // https://tools.ietf.org/html/rfc4566#section-5.8 and
            // https://tools.ietf.org/html/rfc3890#section-6.2
            match typ {
                "CT" | "AS" | "TIAS" | "RS" | "RR" => {}
                _ => return Err(Error::SdpInvalidValue(typ.to_owned())),
            }
            (false, typ)
        };

        Ok(Bandwidth {
            experimental,
            bandwidth_type: bandwidth_type.to_owned(),
            bandwidth: bw.parse::<u64>()?,
        })
    }
}

/// Attribute describes the "a=" field which represents the primary means for
/// extending SDP.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub key: String,
    pub value: Option<String>,
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(value) = &self.value {
            write!(f, "{}:{}", self.key, value)
        } else {
            write!(f, "{}", self.key)
        }
    }
}

impl Attribute {
    /// new constructs a new attribute
    pub fn new(key: String, value: Option<String>) -> Self {
        Attribute { key, value }
    }

    /// is_ice_candidate returns true if the attribute key equals "candidate".
    pub fn is_ice_candidate(&self) -> bool {
        self.key.as_str() == "candidate"
    }

    pub(crate) fn unmarshal(value: &str) -> Self {
        if let Some((key, value)) = value.split_once(':') {
            Attribute::new(key.to_owned(), Some(value.to_owned()))
        } else {
            Attribute::new(value.to_owned(), None)
        }
    }
}
