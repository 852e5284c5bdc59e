use std::fmt;

use x25519_dalek::{PublicKey, StaticSecret};

use crate::cipher_suite::CipherSuiteAes128GcmSha256;
use crate::handshake::HANDSHAKE_RANDOM_LENGTH;
use shared::error::*;

/// Connection state shared by the flights. Secrets are private to the crate
/// and are wiped by [State::clear_secrets].
#[derive(Default)]
pub struct State {
    pub(crate) is_client: bool,
    pub(crate) local_epoch: u16,
    pub(crate) remote_epoch: u16,
    pub(crate) local_sequence_number: Vec<u64>,
    pub(crate) handshake_send_sequence: u16,

    pub(crate) local_random: [u8; HANDSHAKE_RANDOM_LENGTH],
    pub(crate) remote_random: [u8; HANDSHAKE_RANDOM_LENGTH],

    pub(crate) local_keypair: Option<StaticSecret>,
    pub(crate) master_secret: Vec<u8>,
    pub(crate) cipher_suite: Option<CipherSuiteAes128GcmSha256>,

    pub(crate) peer_certificates: Vec<Vec<u8>>,
    pub(crate) peer_certificates_verified: bool,
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("is_client", &self.is_client)
            .field("local_epoch", &self.local_epoch)
            .field("remote_epoch", &self.remote_epoch)
            .field("cipher_suite", &self.cipher_suite)
            .field("peer_certificates_verified", &self.peer_certificates_verified)
            .finish_non_exhaustive()
    }
}

impl State {
    pub(crate) fn new(is_client: bool) -> Self {
        State {
            is_client,
            ..Default::default()
        }
    }

    pub fn is_client(&self) -> bool {
        self.is_client
    }

    pub fn local_epoch(&self) -> u16 {
        self.local_epoch
    }

    pub fn remote_epoch(&self) -> u16 {
        self.remote_epoch
    }

    /// The leaf certificate the peer presented, once it was verified.
    pub fn peer_certificate(&self) -> Option<&[u8]> {
        if self.peer_certificates_verified {
            self.peer_certificates.first().map(|c| c.as_slice())
        } else {
            None
        }
    }

    pub(crate) fn client_random(&self) -> &[u8] {
        if self.is_client {
            &self.local_random
        } else {
            &self.remote_random
        }
    }

    pub(crate) fn server_random(&self) -> &[u8] {
        if self.is_client {
            &self.remote_random
        } else {
            &self.local_random
        }
    }

    /// Creates the ephemeral X25519 key of this side and returns its public half.
    pub(crate) fn generate_keypair(&mut self) -> Vec<u8> {
        let mut secret = [0u8; 32];
        rand::fill(&mut secret);
        let keypair = StaticSecret::from(secret);
        let public_key = PublicKey::from(&keypair).as_bytes().to_vec();
        self.local_keypair = Some(keypair);
        public_key
    }

    pub(crate) fn local_public_key(&self) -> Option<Vec<u8>> {
        self.local_keypair
            .as_ref()
            .map(|keypair| PublicKey::from(keypair).as_bytes().to_vec())
    }

    pub(crate) fn pre_master_secret(&self, remote_public_key: &[u8]) -> Result<Vec<u8>> {
        let keypair = self
            .local_keypair
            .as_ref()
            .ok_or_else(|| Error::ErrDtlsProtocol("missing local key pair".to_owned()))?;
        let remote: [u8; 32] = remote_public_key
            .try_into()
            .map_err(|_| Error::ErrDtlsProtocol("invalid ECDHE public key".to_owned()))?;

        let shared = keypair.diffie_hellman(&PublicKey::from(remote));
        if !shared.was_contributory() {
            return Err(Error::ErrDtlsProtocol(
                "non contributory ECDHE public key".to_owned(),
            ));
        }
        Ok(shared.as_bytes().to_vec())
    }

    pub(crate) fn clear_secrets(&mut self) {
        self.local_keypair = None;
        self.master_secret.fill(0);
        self.master_secret.clear();
        self.cipher_suite = None;
    }
}
