
pub(crate) mod crypto_gcm;

use std::fmt;

use crypto_gcm::*;

use crate::prf::*;
use crate::record_layer::record_layer_header::RecordLayerHeader;
use shared::error::*;

/// TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256, the only suite offered or accepted.
pub const TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256: u16 = 0xc02b;

/// Record protection for one connection. Keys exist only after `init`.
#[derive(Default)]
pub struct CipherSuiteAes128GcmSha256 {
    gcm: Option<CryptoGcm>,
}

impl fmt::Display for CipherSuiteAes128GcmSha256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256")
    }
}

impl fmt::Debug for CipherSuiteAes128GcmSha256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherSuiteAes128GcmSha256")
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl CipherSuiteAes128GcmSha256 {
    pub fn new() -> Self {
        CipherSuiteAes128GcmSha256::default()
    }

    pub fn id(&self) -> u16 {
        TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256
    }

    pub fn is_initialized(&self) -> bool {
        self.gcm.is_some()
    }

    /// Expands the master secret into the directional keys of this side.
    pub fn init(
        &mut self,
        master_secret: &[u8],
        client_random: &[u8],
        server_random: &[u8],
        is_client: bool,
    ) -> Result<()> {
        let keys = prf_encryption_keys(master_secret, client_random, server_random)?;

        self.gcm = Some(if is_client {
            CryptoGcm::new(
                &keys.client_write_key,
                &keys.client_write_iv,
                &keys.server_write_key,
                &keys.server_write_iv,
            )?
        } else {
            CryptoGcm::new(
                &keys.server_write_key,
                &keys.server_write_iv,
                &keys.client_write_key,
                &keys.client_write_iv,
            )?
        });

        Ok(())
    }

    pub fn encrypt(&self, pkt_rlh: &RecordLayerHeader, raw: &[u8]) -> Result<Vec<u8>> {
        match &self.gcm {
            Some(gcm) => gcm.encrypt(pkt_rlh, raw),
            None => Err(Error::Other(
                "CipherSuite has not been initialized, unable to encrypt".to_owned(),
            )),
        }
    }

    pub fn decrypt(&self, input: &[u8]) -> Result<Vec<u8>> {
        match &self.gcm {
            Some(gcm) => gcm.decrypt(input),
            None => Err(Error::Other(
                "CipherSuite has not been initialized, unable to decrypt".to_owned(),
            )),
        }
    }
}
