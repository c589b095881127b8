//! Built-in keystores.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    Key, XChaCha20Poly1305, XNonce,
};
use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroizing;

use super::traits::DeviceKeystore;
use crate::error::{StorageError, StorageResult};

const NONCE_LEN: usize = 24;

/// Identity keystore for deployments without an encryption key.
///
/// Records are written as plain JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaintextKeystore;

impl DeviceKeystore for PlaintextKeystore {
    fn seal(&self, _associated_data: &[u8], plaintext: &[u8]) -> StorageResult<Vec<u8>> {
        Ok(plaintext.to_vec())
    }

    fn open_sealed(&self, _associated_data: &[u8], ciphertext: &[u8]) -> StorageResult<Vec<u8>> {
        Ok(ciphertext.to_vec())
    }
}

/// XChaCha20-Poly1305 keystore holding a 32-byte key in memory.
///
/// Sealed layout: `nonce (24 bytes) || ciphertext || tag`.
pub struct XChaChaKeystore {
    key: Zeroizing<[u8; 32]>,
}

impl XChaChaKeystore {
    /// Creates a keystore from an existing key.
    #[must_use]
    pub fn new(key: [u8; 32]) -> Self {
        Self {
            key: Zeroizing::new(key),
        }
    }

    /// Creates a keystore with a fresh random key.
    #[must_use]
    pub fn generate() -> Self {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        Self::new(key)
    }

    fn cipher(&self) -> XChaCha20Poly1305 {
        XChaCha20Poly1305::new(Key::from_slice(&self.key[..]))
    }
}

impl std::fmt::Debug for XChaChaKeystore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XChaChaKeystore").finish_non_exhaustive()
    }
}

impl DeviceKeystore for XChaChaKeystore {
    fn seal(&self, associated_data: &[u8], plaintext: &[u8]) -> StorageResult<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let ciphertext = self
            .cipher()
            .encrypt(
                XNonce::from_slice(&nonce_bytes),
                Payload {
                    msg: plaintext,
                    aad: associated_data,
                },
            )
            .map_err(|err| StorageError::Keystore(err.to_string()))?;
        let mut out = Vec::with_capacity(nonce_bytes.len() + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn open_sealed(&self, associated_data: &[u8], ciphertext: &[u8]) -> StorageResult<Vec<u8>> {
        if ciphertext.len() < NONCE_LEN {
            return Err(StorageError::malformed("sealed record too short"));
        }
        let (nonce_bytes, payload) = ciphertext.split_at(NONCE_LEN);
        self.cipher()
            .decrypt(
                XNonce::from_slice(nonce_bytes),
                Payload {
                    msg: payload,
                    aad: associated_data,
                },
            )
            .map_err(|err| StorageError::malformed(format!("cannot open sealed record: {err}")))
    }
}
