use bytes::BytesMut;
use std::fmt;

use crate::alert::Alert;
use crate::handshake::Handshake;
use shared::error::*;

/// Record content types of RFC 5246 Section 6.2.1.
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq)]
pub enum ContentType {
    ChangeCipherSpec = 20,
    Alert = 21,
    Handshake = 22,
    ApplicationData = 23,
    #[default]
    Invalid,
}

impl From<u8> for ContentType {
    fn from(val: u8) -> Self {
        match val {
            20 => ContentType::ChangeCipherSpec,
            21 => ContentType::Alert,
            22 => ContentType::Handshake,
            23 => ContentType::ApplicationData,
            _ => ContentType::Invalid,
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            ContentType::ChangeCipherSpec => "ChangeCipherSpec",
            ContentType::Alert => "Alert",
            ContentType::Handshake => "Handshake",
            ContentType::ApplicationData => "ApplicationData",
            ContentType::Invalid => "Invalid",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    ChangeCipherSpec,
    Alert(Alert),
    Handshake(Handshake),
    ApplicationData(BytesMut),
}

impl Content {
    pub fn content_type(&self) -> ContentType {
        match self {
            Content::ChangeCipherSpec => ContentType::ChangeCipherSpec,
            Content::Alert(_) => ContentType::Alert,
            Content::Handshake(_) => ContentType::Handshake,
            Content::ApplicationData(_) => ContentType::ApplicationData,
        }
    }

    pub fn marshal(&self) -> Result<Vec<u8>> {
        match self {
            Content::ChangeCipherSpec => Ok(vec![0x01]),
            Content::Alert(a) => Ok(a.marshal().to_vec()),
            Content::Handshake(h) => h.marshal(),
            Content::ApplicationData(d) => Ok(d.to_vec()),
        }
    }

    pub fn unmarshal(content_type: ContentType, raw: &[u8]) -> Result<Self> {
        match content_type {
            ContentType::ChangeCipherSpec => {
                if raw != [0x01] {
                    return Err(Error::ErrInvalidContentType);
                }
                Ok(Content::ChangeCipherSpec)
            }
            ContentType::Alert => Ok(Content::Alert(Alert::unmarshal(raw)?)),
            ContentType::Handshake => Ok(Content::Handshake(Handshake::unmarshal(raw)?)),
            ContentType::ApplicationData => Ok(Content::ApplicationData(BytesMut::from(raw))),
            ContentType::Invalid => Err(Error::ErrInvalidContentType),
        }
    }
}
