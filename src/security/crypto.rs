use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::security::random::RandomSource;
use crate::ticket::TicketKey;

type HmacSha256 = Hmac<Sha256>;

/// Size of the AES-GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;
/// Size of the public key name that prefixes every sealed ticket.
pub const KEY_NAME_SIZE: usize = 16;
/// Size of the AES-GCM authentication tag in bytes.
const TAG_SIZE: usize = 16;
/// Smallest well-formed sealed ticket (empty plaintext).
pub const MIN_SEALED_SIZE: usize = KEY_NAME_SIZE + NONCE_SIZE + TAG_SIZE;

const KEY_NAME_LABEL: &[u8] = b"tls-rotor ticket key name";
const CIPHER_KEY_LABEL: &[u8] = b"tls-rotor ticket cipher key";

/// Errors produced while sealing or opening tickets.
#[derive(Debug, Error)]
pub enum TicketCryptoError {
    #[error("encryption failed")]
    EncryptionFailure,
    #[error("failed to obtain secure random bytes")]
    EntropyUnavailable,
    #[error("decryption failed")]
    DecryptionFailure,
    #[error("ticket was sealed under a different key")]
    KeyNameMismatch,
    #[error("ticket is {0} bytes, shorter than the minimum sealed size")]
    Truncated(usize),
}

/// AES-256-GCM ticket sealer derived from one [`TicketKey`].
///
/// The key name and the cipher key are both derived with HMAC-SHA256 under
/// distinct labels, so the name can travel in the clear. Sealed layout:
///
/// ```text
/// [key_name: 16 bytes][nonce: 12 bytes][ciphertext + tag]
/// ```
///
/// The key name is bound as associated data.
#[derive(Clone)]
pub struct TicketCipher {
    name: [u8; KEY_NAME_SIZE],
    cipher: Aes256Gcm,
}

impl fmt::Debug for TicketCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name: String = self.name.iter().map(|b| format!("{b:02x}")).collect();
        f.debug_struct("TicketCipher")
            .field("key_name", &name)
            .finish()
    }
}

impl TicketCipher {
    #[must_use]
    pub fn new(key: &TicketKey) -> Self {
        let name_material = derive(key, KEY_NAME_LABEL);
        let mut name = [0u8; KEY_NAME_SIZE];
        name.copy_from_slice(&name_material[..KEY_NAME_SIZE]);

        let cipher_key = Key::<Aes256Gcm>::from(derive(key, CIPHER_KEY_LABEL));
        Self {
            name,
            cipher: Aes256Gcm::new(&cipher_key),
        }
    }

    #[must_use]
    pub const fn key_name(&self) -> &[u8; KEY_NAME_SIZE] {
        &self.name
    }

    /// Whether `candidate` is this cipher's key name (constant-time).
    #[must_use]
    pub fn matches_name(&self, candidate: &[u8]) -> bool {
        candidate.len() == KEY_NAME_SIZE && bool::from(self.name.ct_eq(candidate))
    }

    /// Seal `plaintext` under a fresh nonce drawn from `random`.
    pub fn seal(
        &self,
        plaintext: &[u8],
        random: &dyn RandomSource,
    ) -> Result<Vec<u8>, TicketCryptoError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        random
            .fill(&mut nonce_bytes)
            .map_err(|_| TicketCryptoError::EntropyUnavailable)?;
        let nonce = Nonce::from(nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(
                &nonce,
                Payload {
                    msg: plaintext,
                    aad: &self.name,
                },
            )
            .map_err(|_| TicketCryptoError::EncryptionFailure)?;

        let mut sealed = Vec::with_capacity(KEY_NAME_SIZE + NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&self.name);
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>, TicketCryptoError> {
        if sealed.len() < MIN_SEALED_SIZE {
            return Err(TicketCryptoError::Truncated(sealed.len()));
        }

        let (name, rest) = sealed.split_at(KEY_NAME_SIZE);
        if !self.matches_name(name) {
            return Err(TicketCryptoError::KeyNameMismatch);
        }

        let (nonce_bytes, ciphertext) = rest.split_at(NONCE_SIZE);
        let nonce_bytes: [u8; NONCE_SIZE] = nonce_bytes
            .try_into()
            .map_err(|_| TicketCryptoError::DecryptionFailure)?;
        let nonce = Nonce::from(nonce_bytes);

        self.cipher
            .decrypt(
                &nonce,
                Payload {
                    msg: ciphertext,
                    aad: name,
                },
            )
            .map_err(|_| TicketCryptoError::DecryptionFailure)
    }
}

fn derive(key: &TicketKey, label: &[u8]) -> [u8; 32] {
    // SAFETY: HMAC accepts keys of any length.
    #[allow(clippy::expect_used)]
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(label);

    let mut out = [0u8; 32];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}
