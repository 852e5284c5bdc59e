#[cfg(test)]
mod alert_test;

use std::fmt;

use shared::error::*;

#[derive(Default, Copy, Clone, Debug, PartialEq, Eq)]
pub enum AlertLevel {
    Warning = 1,
    Fatal = 2,
    #[default]
    Invalid,
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            AlertLevel::Warning => write!(f, "LevelWarning"),
            AlertLevel::Fatal => write!(f, "LevelFatal"),
            AlertLevel::Invalid => write!(f, "Invalid alert level"),
        }
    }
}

impl From<u8> for AlertLevel {
    fn from(val: u8) -> Self {
        match val {
            1 => AlertLevel::Warning,
            2 => AlertLevel::Fatal,
            _ => AlertLevel::Invalid,
        }
    }
}

/// The subset of RFC 5246 Section 7.2 alert descriptions this transport raises or understands.
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq)]
pub enum AlertDescription {
    CloseNotify = 0,
    UnexpectedMessage = 10,
    BadRecordMac = 20,
    HandshakeFailure = 40,
    BadCertificate = 42,
    IllegalParameter = 47,
    DecodeError = 50,
    DecryptError = 51,
    ProtocolVersion = 70,
    InsufficientSecurity = 71,
    InternalError = 80,
    #[default]
    Invalid,
}

impl fmt::Display for AlertDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            AlertDescription::CloseNotify => "CloseNotify",
            AlertDescription::UnexpectedMessage => "UnexpectedMessage",
            AlertDescription::BadRecordMac => "BadRecordMac",
            AlertDescription::HandshakeFailure => "HandshakeFailure",
            AlertDescription::BadCertificate => "BadCertificate",
            AlertDescription::IllegalParameter => "IllegalParameter",
            AlertDescription::DecodeError => "DecodeError",
            AlertDescription::DecryptError => "DecryptError",
            AlertDescription::ProtocolVersion => "ProtocolVersion",
            AlertDescription::InsufficientSecurity => "InsufficientSecurity",
            AlertDescription::InternalError => "InternalError",
            AlertDescription::Invalid => "Invalid alert description",
        };
        write!(f, "{s}")
    }
}

impl From<u8> for AlertDescription {
    fn from(val: u8) -> Self {
        match val {
            0 => AlertDescription::CloseNotify,
            10 => AlertDescription::UnexpectedMessage,
            20 => AlertDescription::BadRecordMac,
            40 => AlertDescription::HandshakeFailure,
            42 => AlertDescription::BadCertificate,
            47 => AlertDescription::IllegalParameter,
            50 => AlertDescription::DecodeError,
            51 => AlertDescription::DecryptError,
            70 => AlertDescription::ProtocolVersion,
            71 => AlertDescription::InsufficientSecurity,
            80 => AlertDescription::InternalError,
            _ => AlertDescription::Invalid,
        }
    }
}

/// One of the content types supported by the TLS record layer.
/// Alerts convey the severity of the message (warning or fatal) and a description of the alert.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Alert {
    pub alert_level: AlertLevel,
    pub alert_description: AlertDescription,
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Alert {}: {}", self.alert_level, self.alert_description)
    }
}

impl Alert {
    pub fn fatal(alert_description: AlertDescription) -> Self {
        Alert {
            alert_level: AlertLevel::Fatal,
            alert_description,
        }
    }

    pub fn is_close_notify(&self) -> bool {
        self.alert_description == AlertDescription::CloseNotify
    }

    pub fn marshal(&self) -> [u8; 2] {
        [self.alert_level as u8, self.alert_description as u8]
    }

    pub fn unmarshal(raw: &[u8]) -> Result<Self> {
        if raw.len() != 2 {
            return Err(Error::ErrLengthMismatch);
        }
        Ok(Alert {
            alert_level: raw[0].into(),
            alert_description: raw[1].into(),
        })
    }
}
