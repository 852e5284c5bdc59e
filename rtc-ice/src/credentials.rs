#[cfg(test)]
mod credentials_test;

use shared::error::*;
use shared::util::generate_crypto_random_string;

const ALPHA: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
// ice-char = ALPHA / DIGIT / "+" / "/"
const ICE_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789/+";

pub(crate) const UFRAG_LEN: usize = 16;
pub(crate) const PWD_LEN: usize = 32;
const FOUNDATION_LEN: usize = 32;

/// RFC 8445 section 5.3 floors, in bits of randomness.
const MIN_UFRAG_BITS: usize = 24;
const MIN_PWD_BITS: usize = 128;

/// Local username fragment and password of one ICE session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub ufrag: String,
    pub pwd: String,
}

impl Credentials {
    pub fn generate() -> Self {
        Self {
            ufrag: generate_crypto_random_string(UFRAG_LEN, ALPHA),
            pwd: generate_crypto_random_string(PWD_LEN, ALPHA),
        }
    }

    /// Takes the given values, filling in a random one for each that is
    /// empty, and rejects values too short to be unguessable.
    pub fn with_defaults(ufrag: String, pwd: String) -> Result<Self> {
        let generated = Self::generate();
        let credentials = Self {
            ufrag: if ufrag.is_empty() { generated.ufrag } else { ufrag },
            pwd: if pwd.is_empty() { generated.pwd } else { pwd },
        };

        if credentials.ufrag.len() * 8 < MIN_UFRAG_BITS {
            return Err(Error::ErrLocalUfragInsufficientBits);
        }
        if credentials.pwd.len() * 8 < MIN_PWD_BITS {
            return Err(Error::ErrLocalPwdInsufficientBits);
        }
        Ok(credentials)
    }
}

/// A fresh `candidate:<foundation>` id.
pub fn candidate_id() -> String {
    format!(
        "candidate:{}",
        generate_crypto_random_string(FOUNDATION_LEN, ICE_CHARS)
    )
}
