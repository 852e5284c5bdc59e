use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes128Gcm, Nonce};

use crate::content::ContentType;
use crate::record_layer::record_layer_header::*;
use shared::error::*;

const CRYPTO_GCM_TAG_LENGTH: usize = 16;
const CRYPTO_GCM_NONCE_LENGTH: usize = 12;
const CRYPTO_GCM_EXPLICIT_NONCE_LENGTH: usize = 8;

/// AES-128-GCM record protection, RFC 5288 as used by DTLS 1.2.
///
/// The 12 byte nonce is the 4 byte implicit write IV followed by the 8 byte
/// explicit part, which is the record's epoch and sequence number and travels
/// in front of the ciphertext.
pub(crate) struct CryptoGcm {
    local_gcm: Aes128Gcm,
    remote_gcm: Aes128Gcm,
    local_write_iv: Vec<u8>,
    remote_write_iv: Vec<u8>,
}

impl CryptoGcm {
    pub(crate) fn new(
        local_key: &[u8],
        local_write_iv: &[u8],
        remote_key: &[u8],
        remote_write_iv: &[u8],
    ) -> Result<Self> {
        let local_gcm =
            Aes128Gcm::new_from_slice(local_key).map_err(|e| Error::AesGcm(e.to_string()))?;
        let remote_gcm =
            Aes128Gcm::new_from_slice(remote_key).map_err(|e| Error::AesGcm(e.to_string()))?;

        Ok(CryptoGcm {
            local_gcm,
            remote_gcm,
            local_write_iv: local_write_iv.to_vec(),
            remote_write_iv: remote_write_iv.to_vec(),
        })
    }

    /// Encrypts a marshaled record (header + plaintext).
    pub(crate) fn encrypt(&self, pkt_rlh: &RecordLayerHeader, raw: &[u8]) -> Result<Vec<u8>> {
        let payload = &raw[RECORD_LAYER_HEADER_SIZE..];

        let explicit_nonce = explicit_nonce(pkt_rlh.epoch, pkt_rlh.sequence_number);
        let mut nonce = [0u8; CRYPTO_GCM_NONCE_LENGTH];
        nonce[..4].copy_from_slice(&self.local_write_iv[..4]);
        nonce[4..].copy_from_slice(&explicit_nonce);

        let aad = additional_data(pkt_rlh, payload.len());
        let encrypted = self
            .local_gcm
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: payload,
                    aad: &aad,
                },
            )
            .map_err(|e| Error::AesGcm(e.to_string()))?;

        let header = RecordLayerHeader {
            content_len: (CRYPTO_GCM_EXPLICIT_NONCE_LENGTH + encrypted.len()) as u16,
            ..*pkt_rlh
        };
        let mut r = Vec::with_capacity(
            RECORD_LAYER_HEADER_SIZE + CRYPTO_GCM_EXPLICIT_NONCE_LENGTH + encrypted.len(),
        );
        header.marshal(&mut r)?;
        r.extend_from_slice(&explicit_nonce);
        r.extend_from_slice(&encrypted);

        Ok(r)
    }

    /// Decrypts a protected record and returns it with a plaintext header.
    pub(crate) fn decrypt(&self, r: &[u8]) -> Result<Vec<u8>> {
        let h = RecordLayerHeader::unmarshal(r)?;
        if h.content_type == ContentType::ChangeCipherSpec {
            // Nothing to decrypt with ChangeCipherSpec
            return Ok(r.to_vec());
        }

        let end = RECORD_LAYER_HEADER_SIZE + h.content_len as usize;
        if r.len() < end
            || (h.content_len as usize) < CRYPTO_GCM_EXPLICIT_NONCE_LENGTH + CRYPTO_GCM_TAG_LENGTH
        {
            return Err(Error::ErrNotEnoughRoomForNonce);
        }

        let explicit = &r[RECORD_LAYER_HEADER_SIZE
            ..RECORD_LAYER_HEADER_SIZE + CRYPTO_GCM_EXPLICIT_NONCE_LENGTH];
        let mut nonce = [0u8; CRYPTO_GCM_NONCE_LENGTH];
        nonce[..4].copy_from_slice(&self.remote_write_iv[..4]);
        nonce[4..].copy_from_slice(explicit);

        let ciphertext = &r[RECORD_LAYER_HEADER_SIZE + CRYPTO_GCM_EXPLICIT_NONCE_LENGTH..end];
        let aad = additional_data(&h, ciphertext.len() - CRYPTO_GCM_TAG_LENGTH);

        let plaintext = self
            .remote_gcm
            .decrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: ciphertext,
                    aad: &aad,
                },
            )
            .map_err(|_| Error::ErrInvalidMac)?;

        let header = RecordLayerHeader {
            content_len: plaintext.len() as u16,
            ..h
        };
        let mut d = Vec::with_capacity(RECORD_LAYER_HEADER_SIZE + plaintext.len());
        header.marshal(&mut d)?;
        d.extend_from_slice(&plaintext);

        Ok(d)
    }
}

fn explicit_nonce(epoch: u16, sequence_number: u64) -> [u8; CRYPTO_GCM_EXPLICIT_NONCE_LENGTH] {
    let mut n = [0u8; CRYPTO_GCM_EXPLICIT_NONCE_LENGTH];
    n[..2].copy_from_slice(&epoch.to_be_bytes());
    n[2..].copy_from_slice(&sequence_number.to_be_bytes()[2..]);
    n
}

// https://tools.ietf.org/html/rfc5246#section-6.2.3.3
fn additional_data(h: &RecordLayerHeader, payload_len: usize) -> [u8; 13] {
    let mut aad = [0u8; 13];
    aad[..8].copy_from_slice(&explicit_nonce(h.epoch, h.sequence_number));
    aad[8] = h.content_type as u8;
    aad[9] = h.protocol_version.major;
    aad[10] = h.protocol_version.minor;
    aad[11..].copy_from_slice(&(payload_len as u16).to_be_bytes());
    aad
}
