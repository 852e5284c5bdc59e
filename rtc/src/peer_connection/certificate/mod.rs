//! X.509 certificate management for DTLS authentication.
//!
//! Every peer connection presents one self-signed ECDSA P-256 certificate in
//! its handshake. The SHA-256 fingerprint of that certificate travels in the
//! session description (`a=fingerprint:sha-256 ...`), and the remote side
//! accepts the handshake only if the certificate it receives hashes to it.
//!
//! ```
//! use rtc::peer_connection::certificate::RTCCertificate;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let certificate = RTCCertificate::generate()?;
//! for fp in certificate.get_fingerprints() {
//!     println!("a=fingerprint:{} {}", fp.algorithm, fp.value);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! A certificate can be reused across sessions to keep a stable identity, as
//! long as it has not expired. [`RTCPeerConnection::new`] rejects expired
//! certificates with `ErrCertificateExpired`.
//!
//! [`RTCPeerConnection::new`]: crate::peer_connection::RTCPeerConnection::new

use std::time::{Duration, SystemTime};

use crate::peer_connection::transport::dtls::fingerprint::RTCDtlsFingerprint;
use shared::error::{Error, Result};
use shared::util::math_rand_alpha;

/// A certificate and private key used to authenticate the DTLS handshake.
///
/// ## Specifications
///
/// * [W3C RTCCertificate](https://w3c.github.io/webrtc-pc/#dom-rtccertificate)
#[derive(Clone, Debug)]
pub struct RTCCertificate {
    /// DTLS certificate containing the DER certificate and its signing key
    pub(crate) dtls_certificate: dtls::crypto::Certificate,

    /// Timestamp after which this certificate is no longer valid
    pub(crate) expires: SystemTime,
}

impl PartialEq for RTCCertificate {
    fn eq(&self, other: &Self) -> bool {
        self.dtls_certificate == other.dtls_certificate
    }
}

impl RTCCertificate {
    /// Generates a self-signed ECDSA P-256 certificate with a random subject,
    /// valid for [`dtls::crypto::DEFAULT_CERTIFICATE_VALIDITY`].
    pub fn generate() -> Result<Self> {
        Self::generate_with_validity(dtls::crypto::DEFAULT_CERTIFICATE_VALIDITY)
    }

    /// Generates a self-signed certificate that expires after `validity`.
    pub fn generate_with_validity(validity: Duration) -> Result<Self> {
        let dtls_certificate = dtls::crypto::Certificate::generate_self_signed_with_validity(
            vec![math_rand_alpha(16)],
            validity,
        )?;
        Ok(Self::from_existing(dtls_certificate))
    }

    /// Loads a DER certificate and its PKCS#8 P-256 private key.
    pub fn from_der(certificate: Vec<u8>, private_key_pkcs8: &[u8]) -> Result<Self> {
        let dtls_certificate = dtls::crypto::Certificate::from_der(certificate, private_key_pkcs8)?;
        Ok(Self::from_existing(dtls_certificate))
    }

    /// Wraps an already loaded DTLS certificate.
    pub fn from_existing(dtls_certificate: dtls::crypto::Certificate) -> Self {
        let expires = dtls_certificate.expires();
        Self {
            dtls_certificate,
            expires,
        }
    }

    /// The time after which the certificate is rejected.
    pub fn expires(&self) -> SystemTime {
        self.expires
    }

    pub(crate) fn check_expiry(&self, now: SystemTime) -> Result<()> {
        self.expires
            .duration_since(now)
            .map(|_| ())
            .map_err(|_| Error::ErrCertificateExpired)
    }

    /// Returns the fingerprints to announce in a session description.
    pub fn get_fingerprints(&self) -> Vec<RTCDtlsFingerprint> {
        vec![RTCDtlsFingerprint {
            algorithm: "sha-256".to_owned(),
            value: self.dtls_certificate.fingerprint(),
        }]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_generate_certificate_ecdsa() -> Result<()> {
        let cert = RTCCertificate::generate()?;
        let fingerprints = cert.get_fingerprints();
        assert_eq!(fingerprints.len(), 1);
        assert_eq!(fingerprints[0].algorithm, "sha-256");
        // 32 bytes, two hex digits each, colon separated
        assert_eq!(fingerprints[0].value.len(), 32 * 3 - 1);

        Ok(())
    }

    #[test]
    fn test_certificate_equal() -> Result<()> {
        let cert1 = RTCCertificate::generate()?;
        let cert2 = RTCCertificate::generate()?;

        assert_ne!(cert1, cert2);
        assert_eq!(cert1, cert1.clone());

        Ok(())
    }

    #[test]
    fn test_generate_certificate_expires() -> Result<()> {
        let cert = RTCCertificate::generate()?;

        let now = SystemTime::now();
        assert!(cert.expires().duration_since(now).is_ok());
        cert.check_expiry(now)?;

        let later = now + dtls::crypto::DEFAULT_CERTIFICATE_VALIDITY + Duration::from_secs(60);
        assert_eq!(cert.check_expiry(later), Err(Error::ErrCertificateExpired));

        Ok(())
    }
}
