#[cfg(test)]
mod prf_test;

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::handshake::VERIFY_DATA_LENGTH;
use shared::error::*;

type HmacSha256 = Hmac<Sha256>;

pub(crate) const PRF_MASTER_SECRET_LABEL: &str = "master secret";
pub(crate) const PRF_KEY_EXPANSION_LABEL: &str = "key expansion";
pub(crate) const PRF_VERIFY_DATA_CLIENT_LABEL: &str = "client finished";
pub(crate) const PRF_VERIFY_DATA_SERVER_LABEL: &str = "server finished";

pub(crate) const MASTER_SECRET_LENGTH: usize = 48;
pub(crate) const PRF_KEY_LEN: usize = 16;
pub(crate) const PRF_IV_LEN: usize = 4;

/// Session keys derived from the master secret.
#[derive(Default, Clone, PartialEq, Eq)]
pub struct EncryptionKeys {
    pub master_secret: Vec<u8>,
    pub client_write_key: Vec<u8>,
    pub server_write_key: Vec<u8>,
    pub client_write_iv: Vec<u8>,
    pub server_write_iv: Vec<u8>,
}

impl fmt::Debug for EncryptionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionKeys").finish_non_exhaustive()
    }
}

fn hmac_sha256(key: &[u8], data: &[&[u8]]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|e| Error::Other(e.to_string()))?;
    for d in data {
        mac.update(d);
    }
    Ok(mac.finalize().into_bytes().to_vec())
}

/// The P_hash function of RFC 5246 Section 5 instantiated with HMAC-SHA256.
///
/// ```text
/// P_hash(secret, seed) = HMAC_hash(secret, A(1) + seed) +
///                        HMAC_hash(secret, A(2) + seed) + ...
/// A(0) = seed
/// A(i) = HMAC_hash(secret, A(i-1))
/// ```
pub fn prf_p_hash(secret: &[u8], seed: &[u8], requested_length: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(requested_length + 32);
    let mut last_round = seed.to_vec();

    while out.len() < requested_length {
        last_round = hmac_sha256(secret, &[&last_round])?;
        out.extend_from_slice(&hmac_sha256(secret, &[&last_round, seed])?);
    }

    out.truncate(requested_length);
    Ok(out)
}

pub fn prf_master_secret(
    pre_master_secret: &[u8],
    client_random: &[u8],
    server_random: &[u8],
) -> Result<Vec<u8>> {
    let seed = [
        PRF_MASTER_SECRET_LABEL.as_bytes(),
        client_random,
        server_random,
    ]
    .concat();
    prf_p_hash(pre_master_secret, &seed, MASTER_SECRET_LENGTH)
}

pub fn prf_encryption_keys(
    master_secret: &[u8],
    client_random: &[u8],
    server_random: &[u8],
) -> Result<EncryptionKeys> {
    let seed = [
        PRF_KEY_EXPANSION_LABEL.as_bytes(),
        server_random,
        client_random,
    ]
    .concat();
    let key_material = prf_p_hash(master_secret, &seed, 2 * PRF_KEY_LEN + 2 * PRF_IV_LEN)?;
    let (client_write_key, rest) = key_material.split_at(PRF_KEY_LEN);
    let (server_write_key, rest) = rest.split_at(PRF_KEY_LEN);
    let (client_write_iv, server_write_iv) = rest.split_at(PRF_IV_LEN);

    Ok(EncryptionKeys {
        master_secret: master_secret.to_vec(),
        client_write_key: client_write_key.to_vec(),
        server_write_key: server_write_key.to_vec(),
        client_write_iv: client_write_iv.to_vec(),
        server_write_iv: server_write_iv.to_vec(),
    })
}

fn prf_verify_data(master_secret: &[u8], handshake_bodies: &[u8], label: &str) -> Result<Vec<u8>> {
    let hash = Sha256::digest(handshake_bodies);
    let seed = [label.as_bytes(), hash.as_slice()].concat();
    prf_p_hash(master_secret, &seed, VERIFY_DATA_LENGTH)
}

pub fn prf_verify_data_client(master_secret: &[u8], handshake_bodies: &[u8]) -> Result<Vec<u8>> {
    prf_verify_data(
        master_secret,
        handshake_bodies,
        PRF_VERIFY_DATA_CLIENT_LABEL,
    )
}

pub fn prf_verify_data_server(master_secret: &[u8], handshake_bodies: &[u8]) -> Result<Vec<u8>> {
    prf_verify_data(
        master_secret,
        handshake_bodies,
        PRF_VERIFY_DATA_SERVER_LABEL,
    )
}
