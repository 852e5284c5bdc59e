use super::common::*;
use shared::error::{Error, Result};
use std::fmt;

/// Port or port range of a media section, `<port>[/<number of ports>]`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RangedPort {
    pub value: isize,
    pub range: Option<isize>,
}

impl fmt::Display for RangedPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(range) = self.range {
            write!(f, "{}/{}", self.value, range)
        } else {
            write!(f, "{}", self.value)
        }
    }
}

/// MediaName describes the "m=" field storage structure.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MediaName {
    pub media: String,
    pub port: RangedPort,
    pub protos: Vec<String>,
    pub formats: Vec<String>,
}

impl fmt::Display for MediaName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.media,
            self.port,
            self.protos.join("/")
        )?;
        for format in &self.formats {
            write!(f, " {format}")?;
        }
        Ok(())
    }
}

impl MediaName {
    pub(crate) fn unmarshal(value: &str) -> Result<Self> {
        let fields: Vec<&str> = value.split_whitespace().collect();
        if fields.len() < 4 {
            return Err(Error::SdpInvalidSyntax(format!("`m={value}`")));
        }

        // <media>
        let media = fields[0].to_owned();

        // <port>
        let (value, range) = if let Some((port, range)) = fields[1].split_once('/') {
            (port.parse::<isize>()?, Some(range.parse::<isize>()?))
        } else {
            (fields[1].parse::<isize>()?, None)
        };
        if !(0..=65535).contains(&value) {
            return Err(Error::SdpInvalidValue(fields[1].to_owned()));
        }

        // <proto>
        let protos = fields[2].split('/').map(|p| p.to_owned()).collect();

        // <fmt>...
        let formats = fields[3..].iter().map(|f| f.to_string()).collect();

        Ok(MediaName {
            media,
            port: RangedPort { value, range },
            protos,
            formats,
        })
    }
}

/// MediaDescription represents a media type.
/// <https://tools.ietf.org/html/rfc4566#section-5.14>
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MediaDescription {
    /// `m=<media> <port>/<number of ports> <proto> <fmt> ...`
    pub media_name: MediaName,

    /// `i=<session description>`
    pub media_title: Option<String>,

    /// `c=<nettype> <addrtype> <connection-address>`
    pub connection_information: Option<ConnectionInformation>,

    /// `b=<bwtype>:<bandwidth>`
    pub bandwidth: Vec<Bandwidth>,

    /// `k=<method>:<encryption key>`, kept verbatim
    pub encryption_key: Option<String>,

    /// `a=<attribute>` or `a=<attribute>:<value>`
    pub attributes: Vec<Attribute>,
}

impl MediaDescription {
    /// Creates a data channel media section carried over SCTP over DTLS.
    pub fn new_jsep_application_description() -> Self {
        MediaDescription {
            media_name: MediaName {
                media: "application".to_owned(),
                port: RangedPort {
                    value: 9,
                    range: None,
                },
                protos: vec!["UDP".to_owned(), "DTLS".to_owned(), "SCTP".to_owned()],
                formats: vec!["webrtc-datachannel".to_owned()],
            },
            media_title: None,
            connection_information: Some(ConnectionInformation {
                network_type: "IN".to_owned(),
                address_type: "IP4".to_owned(),
                address: Some(Address {
                    address: "0.0.0.0".to_owned(),
                    ttl: None,
                    range: None,
                }),
            }),
            bandwidth: vec![],
            encryption_key: None,
            attributes: vec![],
        }
    }

    /// attribute returns the value of an attribute and if it exists
    pub fn attribute(&self, key: &str) -> Option<Option<&str>> {
        self.attributes
            .iter()
            .find(|a| a.key == key)
            .map(|a| a.value.as_deref())
    }

    /// Every value of the attributes named `key`, in order.
    pub fn attribute_values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.attributes
            .iter()
            .filter(move |a| a.key == key)
            .filter_map(|a| a.value.as_deref())
    }

    /// with_property_attribute adds a property attribute 'a=key' to the media description
    pub fn with_property_attribute(mut self, key: String) -> Self {
        self.attributes.push(Attribute::new(key, None));
        self
    }

    /// with_value_attribute adds a value attribute 'a=key:value' to the media description
    pub fn with_value_attribute(mut self, key: String, value: String) -> Self {
        self.attributes.push(Attribute::new(key, Some(value)));
        self
    }

    /// with_fingerprint adds a fingerprint to the media description
    pub fn with_fingerprint(self, algorithm: String, value: String) -> Self {
        self.with_value_attribute("fingerprint".to_owned(), algorithm + " " + &value)
    }

    /// with_ice_credentials adds ICE credentials to the media description
    pub fn with_ice_credentials(self, username: String, password: String) -> Self {
        self.with_value_attribute("ice-ufrag".to_string(), username)
            .with_value_attribute("ice-pwd".to_string(), password)
    }

    /// with_candidate adds an ICE candidate to the media description.
    /// A leading `candidate:` is tolerated.
    pub fn with_candidate(self, value: String) -> Self {
        let value = match value.strip_prefix("candidate:") {
            Some(stripped) => stripped.to_owned(),
            None => value,
        };
        self.with_value_attribute("candidate".to_string(), value)
    }

    /// with_end_of_candidates marks that no more candidates follow for this section.
    /// Adding it twice is a no-op.
    pub fn with_end_of_candidates(self) -> Self {
        if self.attribute("end-of-candidates").is_some() {
            self
        } else {
            self.with_property_attribute("end-of-candidates".to_owned())
        }
    }

    /// Identification tag of this section, `a=mid`.
    pub fn mid(&self) -> Option<&str> {
        self.attribute("mid").flatten()
    }

    /// A rejected section carries port zero.
    pub fn is_rejected(&self) -> bool {
        self.media_name.port.value == 0
    }

    pub(crate) fn marshal_to(&self, out: &mut String) {
        write_line(out, 'm', &self.media_name);
        if let Some(title) = &self.media_title {
            write_line(out, 'i', title);
        }
        if let Some(c) = &self.connection_information {
            write_line(out, 'c', c);
        }
        for b in &self.bandwidth {
            write_line(out, 'b', b);
        }
        if let Some(k) = &self.encryption_key {
            write_line(out, 'k', k);
        }
        for a in &self.attributes {
            write_line(out, 'a', a);
        }
    }
}

pub(crate) fn write_line(out: &mut String, key: char, value: &dyn fmt::Display) {
    out.push(key);
    out.push('=');
    out.push_str(&value.to_string());
    out.push_str("\r\n");
}
