//! OS secret store capability.
//!
//! The vault only needs a wrap/unwrap pair and an availability check.
//! [`KeyringSecretStore`] keeps a 32-byte wrapping secret in the platform
//! keychain (macOS Keychain, Windows Credential Manager, Linux kernel
//! keyring) and seals data under it locally.

use super::envelope::{EnvelopeCipher, KEY_WRAP_AAD};
use super::master_key::MasterKey;
use crate::error::{Error, Result};
use zeroize::Zeroizing;

/// Wraps and unwraps small secrets with a platform-protected key.
pub trait SecretStore: Send + Sync + std::fmt::Debug {
    /// Whether the store can be used in this session.
    fn is_available(&self) -> bool;

    /// Protect `secret`; the result is safe to write to disk.
    fn wrap_secret(&self, secret: &[u8]) -> Result<Vec<u8>>;

    /// Recover a secret produced by [`wrap_secret`](Self::wrap_secret).
    fn unwrap_secret(&self, wrapped: &[u8]) -> Result<Zeroizing<Vec<u8>>>;
}

/// A store that is never available; vaulting is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableSecretStore;

impl SecretStore for UnavailableSecretStore {
    fn is_available(&self) -> bool {
        false
    }

    fn wrap_secret(&self, _secret: &[u8]) -> Result<Vec<u8>> {
        Err(Error::Unavailable)
    }

    fn unwrap_secret(&self, _wrapped: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        Err(Error::Unavailable)
    }
}

/// Process-local store whose wrapping key lives only in memory.
///
/// Secrets wrapped by one instance cannot be unwrapped by another, which
/// makes it suitable for tests and for hosts without a keychain that still
/// want a per-session vault.
#[derive(Debug, Clone)]
pub struct MemorySecretStore {
    wrapping_key: MasterKey,
}

impl MemorySecretStore {
    /// Store with a fresh random wrapping key.
    pub fn new() -> Self {
        Self {
            wrapping_key: MasterKey::generate(),
        }
    }

    /// Store with a caller-supplied wrapping key.
    pub fn with_key(key: MasterKey) -> Self {
        Self { wrapping_key: key }
    }

    fn cipher(&self) -> EnvelopeCipher {
        EnvelopeCipher::with_associated_data(self.wrapping_key.as_bytes(), KEY_WRAP_AAD)
    }
}

impl Default for MemorySecretStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretStore for MemorySecretStore {
    fn is_available(&self) -> bool {
        true
    }

    fn wrap_secret(&self, secret: &[u8]) -> Result<Vec<u8>> {
        self.cipher().seal(secret)
    }

    fn unwrap_secret(&self, wrapped: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        self.cipher().open(wrapped)
    }
}

/// Store backed by the OS keyring.
#[cfg(feature = "os-keyring")]
#[derive(Debug, Clone)]
pub struct KeyringSecretStore {
    service: String,
    account: String,
}

#[cfg(feature = "os-keyring")]
impl KeyringSecretStore {
    /// Keyring account holding the wrapping secret.
    pub const ACCOUNT: &'static str = "master-key-wrapping";

    /// Store using keyring entries of `service`.
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: Self::ACCOUNT.to_string(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry> {
        keyring::Entry::new(&self.service, &self.account)
            .map_err(|e| Error::SecretStore(e.to_string()))
    }

    fn wrapping_key(&self, create: bool) -> Result<MasterKey> {
        let entry = self.entry()?;
        match entry.get_secret() {
            Ok(secret) => {
                let secret = Zeroizing::new(secret);
                MasterKey::from_slice(&secret).ok_or_else(|| {
                    Error::SecretStore(format!(
                        "keyring wrapping secret has length {}, expected {}",
                        secret.len(),
                        super::master_key::KEY_LEN
                    ))
                })
            },
            Err(keyring::Error::NoEntry) if create => {
                let key = MasterKey::generate();
                entry
                    .set_secret(key.as_bytes())
                    .map_err(|e| Error::SecretStore(e.to_string()))?;
                log::info!("Created keyring wrapping secret for service {}", self.service);
                Ok(key)
            },
            Err(keyring::Error::NoEntry) => {
                Err(Error::SecretStore("keyring has no wrapping secret".to_string()))
            },
            Err(keyring::Error::NoStorageAccess(e)) | Err(keyring::Error::PlatformFailure(e)) => {
                log::info!("OS keyring is not usable: {}", e);
                Err(Error::Unavailable)
            },
            Err(e) => Err(Error::SecretStore(e.to_string())),
        }
    }
}

#[cfg(feature = "os-keyring")]
impl SecretStore for KeyringSecretStore {
    fn is_available(&self) -> bool {
        let Ok(entry) = self.entry() else {
            return false;
        };
        matches!(entry.get_secret(), Ok(_) | Err(keyring::Error::NoEntry))
    }

    fn wrap_secret(&self, secret: &[u8]) -> Result<Vec<u8>> {
        let key = self.wrapping_key(true)?;
        EnvelopeCipher::with_associated_data(key.as_bytes(), KEY_WRAP_AAD).seal(secret)
    }

    fn unwrap_secret(&self, wrapped: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        let key = self.wrapping_key(false)?;
        EnvelopeCipher::with_associated_data(key.as_bytes(), KEY_WRAP_AAD).open(wrapped)
    }
}

/// The platform store when built with `os-keyring`, otherwise none.
pub fn default_secret_store(service: &str) -> std::sync::Arc<dyn SecretStore> {
    #[cfg(feature = "os-keyring")]
    {
        std::sync::Arc::new(KeyringSecretStore::new(service))
    }
    #[cfg(not(feature = "os-keyring"))]
    {
        let _ = service;
        std::sync::Arc::new(UnavailableSecretStore)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::master_key::KEY_LEN;

    #[test]
    fn test_unavailable_store() {
        let store = UnavailableSecretStore;
        assert!(!store.is_available());
        assert!(matches!(store.wrap_secret(b"k"), Err(Error::Unavailable)));
        assert!(matches!(store.unwrap_secret(b"k"), Err(Error::Unavailable)));
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemorySecretStore::new();
        let wrapped = store.wrap_secret(b"0123456789abcdef").unwrap();
        assert_ne!(&wrapped[..], b"0123456789abcdef");
        assert_eq!(&store.unwrap_secret(&wrapped).unwrap()[..], b"0123456789abcdef");
    }

    #[test]
    fn test_memory_stores_are_isolated() {
        let wrapped = MemorySecretStore::new().wrap_secret(b"secret").unwrap();
        assert!(matches!(
            MemorySecretStore::new().unwrap_secret(&wrapped),
            Err(Error::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_memory_store_with_shared_key() {
        let key = MasterKey::from_slice(&[9u8; KEY_LEN]).unwrap();
        let wrapped = MemorySecretStore::with_key(key.clone()).wrap_secret(b"s").unwrap();
        assert_eq!(&MemorySecretStore::with_key(key).unwrap_secret(&wrapped).unwrap()[..], b"s");
    }

    #[cfg(feature = "os-keyring")]
    #[test]
    fn test_keyring_entry_without_secret_cannot_unwrap() {
        keyring::set_default_credential_builder(keyring::mock::default_credential_builder());
        let store = KeyringSecretStore::new("pdf-seal-test");
        assert!(store.is_available());
        let wrapped = store.wrap_secret(b"secret").unwrap();

        // Mock entries start empty, as after the keyring drops the secret
        let err = KeyringSecretStore::new("pdf-seal-test")
            .unwrap_secret(&wrapped)
            .unwrap_err();
        assert!(matches!(err, Error::SecretStore(_)));
    }
}
