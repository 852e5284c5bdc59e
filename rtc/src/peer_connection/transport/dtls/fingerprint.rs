use serde::{Deserialize, Serialize};

/// Digest of a certificate, announced in `a=fingerprint` and checked against
/// the certificate the peer presents in the DTLS handshake.
///
/// Only `sha-256` is produced and accepted. The value is colon separated
/// upper case hex, see [RFC 8122].
///
/// ```
/// use rtc::peer_connection::transport::RTCDtlsFingerprint;
///
/// let announced = RTCDtlsFingerprint {
///     algorithm: "sha-256".to_owned(),
///     value: "AB:CD".to_owned(),
/// };
/// let seen = RTCDtlsFingerprint {
///     algorithm: "SHA-256".to_owned(),
///     value: "ab:cd".to_owned(),
/// };
/// assert!(announced.matches(&seen));
/// ```
///
/// [RFC 8122]: https://datatracker.ietf.org/doc/html/rfc8122
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RTCDtlsFingerprint {
    /// Hash function name, e.g. `sha-256`.
    pub algorithm: String,
    pub value: String,
}

impl RTCDtlsFingerprint {
    /// Whether `other` names the same digest, ignoring case.
    pub fn matches(&self, other: &RTCDtlsFingerprint) -> bool {
        self.algorithm.eq_ignore_ascii_case(&other.algorithm)
            && self.value.eq_ignore_ascii_case(&other.value)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_fingerprint_matches() {
        let a = RTCDtlsFingerprint {
            algorithm: "sha-256".to_owned(),
            value: "AB:CD:EF".to_owned(),
        };
        let mut b = a.clone();
        b.value = "ab:cd:ef".to_owned();
        assert!(a.matches(&b));

        b.value = "AB:CD:EE".to_owned();
        assert!(!a.matches(&b));

        let mut c = a.clone();
        c.algorithm = "sha-1".to_owned();
        assert!(!a.matches(&c));
    }

    #[test]
    fn test_fingerprint_json() -> Result<(), serde_json::Error> {
        let a = RTCDtlsFingerprint {
            algorithm: "sha-256".to_owned(),
            value: "AB:CD".to_owned(),
        };
        let json = serde_json::to_string(&a)?;
        assert_eq!(json, r#"{"algorithm":"sha-256","value":"AB:CD"}"#);
        assert_eq!(serde_json::from_str::<RTCDtlsFingerprint>(&json)?, a);
        Ok(())
    }
}
