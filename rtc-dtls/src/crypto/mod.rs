
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::pkcs8::DecodePrivateKey;
use rcgen::{CertificateParams, KeyPair};
use sha2::{Digest, Sha256};

use shared::error::*;

/// Lifetime of generated certificates.
pub const DEFAULT_CERTIFICATE_VALIDITY: Duration = Duration::from_secs(30 * 24 * 60 * 60);

const CLOCK_SKEW_ALLOWANCE: Duration = Duration::from_secs(24 * 60 * 60);

/// A DER encoded X.509 certificate and the ECDSA P-256 key that signs with it.
#[derive(Clone)]
pub struct Certificate {
    pub certificate: Vec<u8>,
    private_key: SigningKey,
    expires: SystemTime,
}

impl PartialEq for Certificate {
    fn eq(&self, other: &Self) -> bool {
        self.certificate == other.certificate
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("fingerprint", &self.fingerprint())
            .field("expires", &self.expires)
            .finish_non_exhaustive()
    }
}

impl Certificate {
    /// Generates a self-signed certificate valid for [DEFAULT_CERTIFICATE_VALIDITY].
    pub fn generate_self_signed(subject_alt_names: impl Into<Vec<String>>) -> Result<Self> {
        Self::generate_self_signed_with_validity(subject_alt_names, DEFAULT_CERTIFICATE_VALIDITY)
    }

    pub fn generate_self_signed_with_validity(
        subject_alt_names: impl Into<Vec<String>>,
        validity: Duration,
    ) -> Result<Self> {
        let key_pair = KeyPair::generate_for(&rcgen::PKCS_ECDSA_P256_SHA256)
            .map_err(|e| Error::RcGen(e.to_string()))?;
        let mut params = CertificateParams::new(subject_alt_names.into())
            .map_err(|e| Error::RcGen(e.to_string()))?;

        let now = SystemTime::now();
        let since_epoch = now
            .duration_since(UNIX_EPOCH)
            .map_err(|e| Error::Other(e.to_string()))?;
        let epoch = rcgen::date_time_ymd(1970, 1, 1);
        params.not_before = epoch + since_epoch.saturating_sub(CLOCK_SKEW_ALLOWANCE);
        params.not_after = epoch + since_epoch + validity;

        let x509_cert = params
            .self_signed(&key_pair)
            .map_err(|e| Error::RcGen(e.to_string()))?;

        let private_key = SigningKey::from_pkcs8_der(&key_pair.serialize_der())
            .map_err(|e| Error::RcGen(e.to_string()))?;

        Ok(Certificate {
            certificate: x509_cert.der().to_vec(),
            private_key,
            expires: now + validity,
        })
    }

    /// Loads a certificate and its PKCS#8 encoded P-256 private key.
    pub fn from_der(certificate: Vec<u8>, private_key_pkcs8: &[u8]) -> Result<Self> {
        let private_key = SigningKey::from_pkcs8_der(private_key_pkcs8)
            .map_err(|_| Error::ErrInvalidCertificate)?;

        let (_, cert) = x509_parser::parse_x509_certificate(&certificate)
            .map_err(|_| Error::ErrInvalidCertificate)?;
        let not_after = cert.validity().not_after.timestamp();
        let expires = UNIX_EPOCH + Duration::from_secs(u64::try_from(not_after).unwrap_or(0));

        let public_key = public_key_of(&cert)?;
        if public_key != *private_key.verifying_key() {
            return Err(Error::ErrKeySignatureMismatch);
        }

        Ok(Certificate {
            certificate,
            private_key,
            expires,
        })
    }

    /// SHA-256 over the DER, as uppercase colon separated hex.
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.certificate)
    }

    pub fn expires(&self) -> SystemTime {
        self.expires
    }

    /// DER encoded ECDSA signature over SHA-256 of `message`.
    pub(crate) fn sign(&self, message: &[u8]) -> Vec<u8> {
        let signature: Signature = self.private_key.sign(message);
        signature.to_der().as_bytes().to_vec()
    }
}

pub fn fingerprint(der: &[u8]) -> String {
    Sha256::digest(der)
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<String>>()
        .join(":")
}

fn public_key_of(cert: &x509_parser::certificate::X509Certificate<'_>) -> Result<VerifyingKey> {
    VerifyingKey::from_sec1_bytes(&cert.public_key().subject_public_key.data)
        .map_err(|_| Error::ErrInvalidCertificate)
}

/// Checks `signature` over `message` against the key of the DER certificate.
pub(crate) fn verify_signature(certificate: &[u8], message: &[u8], signature: &[u8]) -> Result<()> {
    let (_, cert) = x509_parser::parse_x509_certificate(certificate)
        .map_err(|_| Error::ErrInvalidCertificate)?;
    let public_key = public_key_of(&cert)?;
    let signature = Signature::from_der(signature).map_err(|_| Error::ErrKeySignatureMismatch)?;

    public_key
        .verify(message, &signature)
        .map_err(|_| Error::ErrKeySignatureMismatch)
}

/// Succeeds only if the certificate matches one of the expected fingerprints.
/// An empty list never matches.
pub(crate) fn verify_fingerprint(certificate: &[u8], expected: &[String]) -> Result<()> {
    let actual = fingerprint(certificate);
    if expected
        .iter()
        .any(|e| e.trim().eq_ignore_ascii_case(&actual))
    {
        Ok(())
    } else {
        Err(Error::ErrFingerprintMismatch)
    }
}
