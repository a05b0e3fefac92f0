//! Authenticated envelope encryption (AES-256-GCM).
//!
//! Envelope layout: `nonce (12) ‖ tag (16) ‖ ciphertext`. Each cipher is
//! bound to fixed associated data so an envelope produced for one purpose
//! (a credential record, a wrapped key) never opens as another.

use super::master_key::{MasterKey, KEY_LEN};
use crate::error::{Error, Result};
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce, Tag};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use zeroize::Zeroizing;

/// Nonce length in bytes.
pub const NONCE_LEN: usize = 12;
/// Authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// Associated data of credential record envelopes.
pub const CREDENTIAL_AAD: &[u8] = b"pdf_seal/credential-record/v1";
/// Associated data of wrapped master keys.
pub const KEY_WRAP_AAD: &[u8] = b"pdf_seal/master-key-wrap/v1";

/// AES-256-GCM with a per-purpose associated data string.
pub struct EnvelopeCipher {
    cipher: Aes256Gcm,
    aad: &'static [u8],
}

impl EnvelopeCipher {
    /// Cipher for credential records under `key`.
    pub fn new(key: &MasterKey) -> Self {
        Self::with_associated_data(key.as_bytes(), CREDENTIAL_AAD)
    }

    /// Cipher with explicit key bytes and associated data.
    pub fn with_associated_data(key: &[u8; KEY_LEN], aad: &'static [u8]) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
            aad,
        }
    }

    /// Encrypt raw bytes under a fresh random nonce.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let mut buffer = plaintext.to_vec();
        let tag = self
            .cipher
            .encrypt_in_place_detached(Nonce::from_slice(&nonce), self.aad, &mut buffer)
            .map_err(|_| Error::SecretStore("AES-GCM encryption failed".to_string()))?;

        let mut envelope = Vec::with_capacity(NONCE_LEN + TAG_LEN + buffer.len());
        envelope.extend_from_slice(&nonce);
        envelope.extend_from_slice(&tag);
        envelope.extend_from_slice(&buffer);
        Ok(envelope)
    }

    /// Decrypt an envelope produced by [`seal`](Self::seal).
    ///
    /// Truncated, tampered or foreign envelopes all fail with
    /// [`Error::AuthenticationFailure`]; no plaintext is returned.
    pub fn open(&self, envelope: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        if envelope.len() < NONCE_LEN + TAG_LEN {
            return Err(Error::AuthenticationFailure);
        }
        let (nonce, rest) = envelope.split_at(NONCE_LEN);
        let (tag, ciphertext) = rest.split_at(TAG_LEN);

        let mut buffer = Zeroizing::new(ciphertext.to_vec());
        self.cipher
            .decrypt_in_place_detached(
                Nonce::from_slice(nonce),
                self.aad,
                &mut *buffer,
                Tag::from_slice(tag),
            )
            .map_err(|_| Error::AuthenticationFailure)?;
        Ok(buffer)
    }

    /// Serialize `payload` as JSON and seal it.
    pub fn encrypt<T: Serialize>(&self, payload: &T) -> Result<Vec<u8>> {
        let plaintext = Zeroizing::new(serde_json::to_vec(payload)?);
        self.seal(&plaintext)
    }

    /// Open an envelope and deserialize its JSON payload.
    pub fn decrypt<T: DeserializeOwned>(&self, envelope: &[u8]) -> Result<T> {
        let plaintext = self.open(envelope)?;
        serde_json::from_slice(&plaintext).map_err(|e| {
            log::warn!("Authenticated envelope holds an unreadable payload: {}", e);
            Error::AuthenticationFailure
        })
    }
}

impl std::fmt::Debug for EnvelopeCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvelopeCipher")
            .field("key", &"[REDACTED]")
            .field("aad", &String::from_utf8_lossy(self.aad))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn cipher() -> EnvelopeCipher {
        EnvelopeCipher::new(&MasterKey::generate())
    }

    #[test]
    fn test_envelope_layout() {
        let envelope = cipher().seal(b"hello").unwrap();
        assert_eq!(envelope.len(), NONCE_LEN + TAG_LEN + 5);
    }

    #[test]
    fn test_structured_round_trip() {
        let cipher = cipher();
        let mut payload = BTreeMap::new();
        payload.insert("certificatePath".to_string(), "/a.p12".to_string());
        let envelope = cipher.encrypt(&payload).unwrap();
        let back: BTreeMap<String, String> = cipher.decrypt(&envelope).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn test_truncated_envelope() {
        let cipher = cipher();
        assert!(matches!(cipher.open(&[0u8; 27]), Err(Error::AuthenticationFailure)));
        let envelope = cipher.seal(b"x").unwrap();
        assert!(matches!(
            cipher.open(&envelope[..envelope.len() - 1]),
            Err(Error::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_wrong_key_fails() {
        let envelope = cipher().seal(b"secret").unwrap();
        assert!(matches!(cipher().open(&envelope), Err(Error::AuthenticationFailure)));
    }

    #[test]
    fn test_purposes_do_not_mix() {
        let key = MasterKey::generate();
        let record = EnvelopeCipher::with_associated_data(key.as_bytes(), CREDENTIAL_AAD);
        let wrap = EnvelopeCipher::with_associated_data(key.as_bytes(), KEY_WRAP_AAD);
        let envelope = record.seal(b"payload").unwrap();
        assert!(matches!(wrap.open(&envelope), Err(Error::AuthenticationFailure)));
    }

    proptest! {
        #[test]
        fn prop_round_trip(payload in proptest::collection::vec(any::<u8>(), 0..512)) {
            let cipher = cipher();
            let envelope = cipher.seal(&payload).unwrap();
            prop_assert_eq!(&cipher.open(&envelope).unwrap()[..], &payload[..]);
        }

        #[test]
        fn prop_nonce_freshness(payload in proptest::collection::vec(any::<u8>(), 0..64)) {
            let cipher = cipher();
            let a = cipher.seal(&payload).unwrap();
            let b = cipher.seal(&payload).unwrap();
            prop_assert_ne!(a, b);
        }

        #[test]
        fn prop_bit_flip_fails(payload in proptest::collection::vec(any::<u8>(), 1..128), bit in any::<usize>()) {
            let cipher = cipher();
            let mut envelope = cipher.seal(&payload).unwrap();
            let bit = bit % (envelope.len() * 8);
            envelope[bit / 8] ^= 1 << (bit % 8);
            prop_assert!(matches!(cipher.open(&envelope), Err(Error::AuthenticationFailure)));
        }
    }
}
