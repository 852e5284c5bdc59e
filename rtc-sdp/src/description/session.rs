use super::common::*;
use super::media::*;
use shared::error::{Error, Result};
use std::fmt;

/// Origin defines the structure for the "o=" field which provides the
/// originator of the session plus a session identifier and version number.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Origin {
    pub username: String,
    pub session_id: u64,
    pub session_version: u64,
    pub network_type: String,
    pub address_type: String,
    pub unicast_address: String,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {}",
            self.username,
            self.session_id,
            self.session_version,
            self.network_type,
            self.address_type,
            self.unicast_address,
        )
    }
}

impl Origin {
    fn unmarshal(value: &str) -> Result<Self> {
        let fields: Vec<&str> = value.split_whitespace().collect();
        if fields.len() != 6 {
            return Err(Error::SdpInvalidSyntax(format!("`o={value}`")));
        }

        let session_id = fields[1].parse::<u64>()?;
        let session_version = fields[2].parse::<u64>()?;

        // Set according to currently registered with IANA
        // https://tools.ietf.org/html/rfc4566#section-8.2.6
        if fields[3] != "IN" {
            return Err(Error::SdpInvalidValue(fields[3].to_owned()));
        }
        // Set according to currently registered with IANA
        // https://tools.ietf.org/html/rfc4566#section-8.2.7
        if fields[4] != "IP4" && fields[4] != "IP6" {
            return Err(Error::SdpInvalidValue(fields[4].to_owned()));
        }

        Ok(Origin {
            username: fields[0].to_owned(),
            session_id,
            session_version,
            network_type: fields[3].to_owned(),
            address_type: fields[4].to_owned(),
            unicast_address: fields[5].to_owned(),
        })
    }
}

/// TimeDescription describes "t=" and its trailing "r=" fields.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TimeDescription {
    pub start_time: u64,
    pub stop_time: u64,
    /// `r=` lines, kept verbatim
    pub repeat_times: Vec<String>,
}

impl fmt::Display for TimeDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.start_time, self.stop_time)
    }
}

/// SessionDescription is a a well-defined format for conveying sufficient
/// information to discover and participate in a multimedia session.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    /// `v=0`
    pub version: u32,
    /// `o=<username> <sess-id> <sess-version> <nettype> <addrtype> <unicast-address>`
    pub origin: Origin,
    /// `s=<session name>`
    pub session_name: String,
    /// `i=<session description>`
    pub session_information: Option<String>,
    /// `u=<uri>`
    pub uri: Option<String>,
    /// `e=<email-address>`
    pub email_address: Option<String>,
    /// `p=<phone-number>`
    pub phone_number: Option<String>,
    /// `c=<nettype> <addrtype> <connection-address>`
    pub connection_information: Option<ConnectionInformation>,
    /// `b=<bwtype>:<bandwidth>`
    pub bandwidth: Vec<Bandwidth>,
    /// `t=<start-time> <stop-time>`
    pub time_descriptions: Vec<TimeDescription>,
    /// `z=<adjustment time> <offset> ...`, kept verbatim
    pub time_zones: Option<String>,
    /// `k=<method>:<encryption key>`, kept verbatim
    pub encryption_key: Option<String>,
    /// `a=<attribute>` or `a=<attribute>:<value>`
    pub attributes: Vec<Attribute>,
    /// Media sections, in order
    pub media_descriptions: Vec<MediaDescription>,
}

impl fmt::Display for SessionDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.marshal())
    }
}

impl SessionDescription {
    /// Creates an empty session description as generated by a JSEP endpoint:
    /// `v=0`, anonymous origin, `s=-` and `t=0 0`.
    pub fn new_jsep_session_description(session_id: u64, session_version: u64) -> Self {
        SessionDescription {
            version: 0,
            origin: Origin {
                username: "-".to_string(),
                session_id,
                session_version,
                network_type: "IN".to_string(),
                address_type: "IP4".to_string(),
                unicast_address: "0.0.0.0".to_string(),
            },
            session_name: "-".to_string(),
            time_descriptions: vec![TimeDescription {
                start_time: 0,
                stop_time: 0,
                repeat_times: vec![],
            }],
            ..Default::default()
        }
    }

    /// with_property_attribute adds a property attribute 'a=key' to the session description
    pub fn with_property_attribute(mut self, key: String) -> Self {
        self.attributes.push(Attribute::new(key, None));
        self
    }

    /// with_value_attribute adds a value attribute 'a=key:value' to the session description
    pub fn with_value_attribute(mut self, key: String, value: String) -> Self {
        self.attributes.push(Attribute::new(key, Some(value)));
        self
    }

    /// with_media adds a media description to the session description
    pub fn with_media(mut self, md: MediaDescription) -> Self {
        self.media_descriptions.push(md);
        self
    }

    /// Returns the value of a session-level attribute, `Some(None)` for a
    /// property attribute.
    pub fn attribute(&self, key: &str) -> Option<Option<&str>> {
        self.attributes
            .iter()
            .find(|a| a.key == key)
            .map(|a| a.value.as_deref())
    }

    /// Locates a media section by `a=mid`, falling back to its m-line index.
    pub fn media_index(&self, mid: Option<&str>, mline_index: Option<u16>) -> Option<usize> {
        if let Some(mid) = mid {
            if let Some(index) = self
                .media_descriptions
                .iter()
                .position(|m| m.mid() == Some(mid))
            {
                return Some(index);
            }
        }
        match mline_index {
            Some(index) if (index as usize) < self.media_descriptions.len() => {
                Some(index as usize)
            }
            _ => None,
        }
    }

    /// Returns a copy of this description with one more candidate line in the
    /// media section at `index`. The receiver is left untouched.
    pub fn with_candidate_at(&self, index: usize, candidate: String) -> Result<Self> {
        let mut augmented = self.clone();
        let media = augmented
            .media_descriptions
            .get_mut(index)
            .ok_or_else(|| Error::SdpInvalidValue(format!("m-line index {index}")))?;
        *media = std::mem::take(media).with_candidate(candidate);
        Ok(augmented)
    }

    /// Returns a copy with `a=end-of-candidates` set on the media section at `index`.
    pub fn with_end_of_candidates_at(&self, index: usize) -> Result<Self> {
        let mut augmented = self.clone();
        let media = augmented
            .media_descriptions
            .get_mut(index)
            .ok_or_else(|| Error::SdpInvalidValue(format!("m-line index {index}")))?;
        *media = std::mem::take(media).with_end_of_candidates();
        Ok(augmented)
    }

    /// marshal takes a SDP struct to text
    /// <https://tools.ietf.org/html/rfc4566#section-5>
    pub fn marshal(&self) -> String {
        let mut out = String::new();

        write_line(&mut out, 'v', &self.version);
        write_line(&mut out, 'o', &self.origin);
        write_line(&mut out, 's', &self.session_name);
        if let Some(i) = &self.session_information {
            write_line(&mut out, 'i', i);
        }
        if let Some(u) = &self.uri {
            write_line(&mut out, 'u', u);
        }
        if let Some(e) = &self.email_address {
            write_line(&mut out, 'e', e);
        }
        if let Some(p) = &self.phone_number {
            write_line(&mut out, 'p', p);
        }
        if let Some(c) = &self.connection_information {
            write_line(&mut out, 'c', c);
        }
        for b in &self.bandwidth {
            write_line(&mut out, 'b', b);
        }
        for t in &self.time_descriptions {
            write_line(&mut out, 't', t);
            for r in &t.repeat_times {
                write_line(&mut out, 'r', r);
            }
        }
        if let Some(z) = &self.time_zones {
            write_line(&mut out, 'z', z);
        }
        if let Some(k) = &self.encryption_key {
            write_line(&mut out, 'k', k);
        }
        for a in &self.attributes {
            write_line(&mut out, 'a', a);
        }
        for md in &self.media_descriptions {
            md.marshal_to(&mut out);
        }

        out
    }

    /// unmarshal parses SDP text. Both `\r\n` and `\n` line endings are accepted.
    ///
    /// The session-level part must follow the RFC 4566 field order:
    /// ```text
    /// v=  (protocol version)
    /// o=  (originator and session identifier)
    /// s=  (session name)
    /// i=* (session information)
    /// u=* (URI of description)
    /// e=* (email address)
    /// p=* (phone number)
    /// c=* (connection information)
    /// b=* (zero or more bandwidth information lines)
    /// t=  (one or more time descriptions, each with r=* lines)
    /// z=* (time zone adjustments)
    /// k=* (encryption key)
    /// a=* (zero or more session attribute lines)
    /// m=  (zero or more media descriptions)
    /// ```
    pub fn unmarshal(value: &str) -> Result<Self> {
        let mut sd = SessionDescription::default();
        let mut stage = Stage::Version;

        for raw_line in value.split('\n') {
            let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);
            if line.is_empty() {
                continue;
            }
            let (key, value) = split_line(line)?;

            stage = match (stage, key) {
                (Stage::Version, 'v') => {
                    sd.version = value
                        .parse::<u32>()
                        .map_err(|_| Error::SdpInvalidValue(value.to_owned()))?;
                    if sd.version != 0 {
                        return Err(Error::SdpInvalidValue(value.to_owned()));
                    }
                    Stage::Origin
                }
                (Stage::Origin, 'o') => {
                    sd.origin = Origin::unmarshal(value)?;
                    Stage::SessionName
                }
                (Stage::SessionName, 's') => {
                    sd.session_name = value.to_owned();
                    Stage::Session(0)
                }
                (Stage::Session(order), k) => {
                    let next = session_field_order(k)
                        .filter(|&o| o >= order)
                        .ok_or_else(|| Error::SdpInvalidSyntax(format!("`{line}`")))?;
                    match k {
                        'i' => sd.session_information = Some(value.to_owned()),
                        'u' => sd.uri = Some(value.to_owned()),
                        'e' => sd.email_address = Some(value.to_owned()),
                        'p' => sd.phone_number = Some(value.to_owned()),
                        'c' => {
                            sd.connection_information =
                                Some(ConnectionInformation::unmarshal(value)?)
                        }
                        'b' => sd.bandwidth.push(Bandwidth::unmarshal(value)?),
                        't' => sd.time_descriptions.push(unmarshal_timing(value)?),
                        'r' => match sd.time_descriptions.last_mut() {
                            Some(t) => t.repeat_times.push(value.to_owned()),
                            None => return Err(Error::SdpInvalidSyntax(format!("`{line}`"))),
                        },
                        'z' => sd.time_zones = Some(value.to_owned()),
                        'k' => sd.encryption_key = Some(value.to_owned()),
                        'a' => sd.attributes.push(Attribute::unmarshal(value)),
                        'm' => {
                            if sd.time_descriptions.is_empty() {
                                return Err(Error::SdpEmptyTimeDescription);
                            }
                            sd.media_descriptions.push(MediaDescription {
                                media_name: MediaName::unmarshal(value)?,
                                ..Default::default()
                            });
                        }
                        _ => return Err(Error::SdpInvalidSyntax(format!("`{line}`"))),
                    }
                    if k == 'm' {
                        Stage::Media(0)
                    } else {
                        Stage::Session(next)
                    }
                }
                (Stage::Media(_), 'm') => {
                    sd.media_descriptions.push(MediaDescription {
                        media_name: MediaName::unmarshal(value)?,
                        ..Default::default()
                    });
                    Stage::Media(0)
                }
                (Stage::Media(order), k) => {
                    let next = media_field_order(k)
                        .filter(|&o| o >= order)
                        .ok_or_else(|| Error::SdpInvalidSyntax(format!("`{line}`")))?;
                    {
                        let md = sd
                            .media_descriptions
                            .last_mut()
                            .ok_or_else(|| Error::SdpInvalidSyntax(format!("`{line}`")))?;
                        match k {
                            'i' => md.media_title = Some(value.to_owned()),
                            'c' => {
                                md.connection_information =
                                    Some(ConnectionInformation::unmarshal(value)?)
                            }
                            'b' => md.bandwidth.push(Bandwidth::unmarshal(value)?),
                            'k' => md.encryption_key = Some(value.to_owned()),
                            'a' => md.attributes.push(Attribute::unmarshal(value)),
                            _ => return Err(Error::SdpInvalidSyntax(format!("`{line}`"))),
                        }
                        Stage::Media(next)
                    }
                }
                _ => return Err(Error::SdpInvalidSyntax(format!("`{line}`"))),
            };
        }

        match stage {
            Stage::Session(_) | Stage::Media(_) if !sd.time_descriptions.is_empty() => Ok(sd),
            Stage::Session(_) | Stage::Media(_) => Err(Error::SdpEmptyTimeDescription),
            _ => Err(Error::SdpInvalidSyntax("truncated session description".to_owned())),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Stage {
    Version,
    Origin,
    SessionName,
    Session(u8),
    Media(u8),
}

// Relative order of the optional session-level fields. Equal ranks may repeat.
fn session_field_order(key: char) -> Option<u8> {
    Some(match key {
        'i' => 1,
        'u' => 2,
        'e' => 3,
        'p' => 4,
        'c' => 5,
        'b' => 6,
        't' | 'r' => 7,
        'z' => 8,
        'k' => 9,
        'a' => 10,
        'm' => 11,
        _ => return None,
    })
}

fn media_field_order(key: char) -> Option<u8> {
    Some(match key {
        'i' => 1,
        'c' => 2,
        'b' => 3,
        'k' => 4,
        'a' => 5,
        _ => return None,
    })
}

fn split_line(line: &str) -> Result<(char, &str)> {
    let mut chars = line.chars();
    match (chars.next(), chars.next()) {
        (Some(key), Some('=')) if key.is_ascii_lowercase() => Ok((key, &line[2..])),
        _ => Err(Error::SdpInvalidSyntax(format!("`{line}`"))),
    }
}

fn unmarshal_timing(value: &str) -> Result<TimeDescription> {
    let fields: Vec<&str> = value.split_whitespace().collect();
    if fields.len() != 2 {
        return Err(Error::SdpInvalidSyntax(format!("`t={value}`")));
    }
    Ok(TimeDescription {
        start_time: fields[0].parse::<u64>()?,
        stop_time: fields[1].parse::<u64>()?,
        repeat_times: vec![],
    })
}
