//! Master key lifecycle.
//!
//! The 32-byte master key is created lazily, wrapped by the OS secret store
//! and persisted as `master.key.enc`. If the stored form cannot be read or
//! unwrapped, a new key replaces it. Anything encrypted under the old key
//! is lost; this is reported with a warning and through [`KeyOrigin`].

use super::lock::VaultLock;
use super::secret_store::SecretStore;
use crate::atomic_write::write_atomic;
use crate::config::VaultConfig;
use crate::error::{Error, Result};
use rand::rngs::OsRng;
use rand::RngCore;
use std::sync::Arc;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Master key length in bytes.
pub const KEY_LEN: usize = 32;

/// 256-bit symmetric key, wiped from memory on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey([u8; KEY_LEN]);

impl MasterKey {
    /// Fresh key from the operating system RNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Key from exactly [`KEY_LEN`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; KEY_LEN]>::try_from(bytes).ok().map(Self)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey([REDACTED])")
    }
}

/// How [`MasterKeyManager::get_or_create_key_with_origin`] obtained the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOrigin {
    /// Unwrapped from the existing key file
    Loaded,
    /// No key file existed; a new key was created
    Created,
    /// The key file was unusable and has been replaced
    Regenerated,
}

/// Owns the master key file of one user-data directory.
#[derive(Debug, Clone)]
pub struct MasterKeyManager {
    config: VaultConfig,
    store: Arc<dyn SecretStore>,
}

impl MasterKeyManager {
    /// Manager for `config.data_dir`, wrapping keys with `store`.
    pub fn new(config: VaultConfig, store: Arc<dyn SecretStore>) -> Self {
        Self { config, store }
    }

    /// The secret store in use.
    pub fn secret_store(&self) -> &Arc<dyn SecretStore> {
        &self.store
    }

    /// Load the master key, creating or replacing it when needed.
    ///
    /// Fails with [`Error::Unavailable`] when the OS secret store cannot be
    /// used; callers should treat that as vaulting being disabled.
    pub fn get_or_create_key(&self) -> Result<MasterKey> {
        self.get_or_create_key_with_origin().map(|(key, _)| key)
    }

    /// Like [`get_or_create_key`](Self::get_or_create_key), also reporting
    /// whether the key was loaded, created or regenerated.
    pub fn get_or_create_key_with_origin(&self) -> Result<(MasterKey, KeyOrigin)> {
        if !self.store.is_available() {
            log::info!("Secret store unavailable; credential vaulting disabled");
            return Err(Error::Unavailable);
        }
        let lock = VaultLock::acquire(&self.config)?;
        self.get_or_create_locked(&lock)
    }

    /// Body of [`get_or_create_key_with_origin`](Self::get_or_create_key_with_origin)
    /// for callers already holding the directory lock.
    pub(crate) fn get_or_create_locked(&self, _lock: &VaultLock) -> Result<(MasterKey, KeyOrigin)> {
        if !self.store.is_available() {
            log::info!("Secret store unavailable; credential vaulting disabled");
            return Err(Error::Unavailable);
        }
        let path = self.config.master_key_path();

        let wrapped = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let key = self.create_and_store()?;
                log::info!("Created master key at {}", path.display());
                return Ok((key, KeyOrigin::Created));
            },
            Err(e) => {
                log::warn!("Master key file {} is unreadable: {}", path.display(), e);
                return self.regenerate();
            },
        };

        match self.store.unwrap_secret(&wrapped) {
            Ok(plain) => match MasterKey::from_slice(&plain) {
                Some(key) => Ok((key, KeyOrigin::Loaded)),
                None => {
                    log::warn!(
                        "Master key in {} has length {}, expected {}",
                        path.display(),
                        plain.len(),
                        KEY_LEN
                    );
                    self.regenerate()
                },
            },
            Err(Error::Unavailable) => Err(Error::Unavailable),
            Err(e) => {
                log::warn!("Master key in {} could not be unwrapped: {}", path.display(), e);
                self.regenerate()
            },
        }
    }

    fn regenerate(&self) -> Result<(MasterKey, KeyOrigin)> {
        let key = self.create_and_store()?;
        log::warn!(
            "Generated a new master key at {}; credentials vaulted under the previous key can no longer be decrypted",
            self.config.master_key_path().display()
        );
        Ok((key, KeyOrigin::Regenerated))
    }

    fn create_and_store(&self) -> Result<MasterKey> {
        let key = MasterKey::generate();
        let wrapped = self.store.wrap_secret(key.as_bytes())?;
        write_atomic(&self.config.master_key_path(), &wrapped)?;
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::secret_store::{MemorySecretStore, UnavailableSecretStore};

    fn manager(dir: &std::path::Path) -> MasterKeyManager {
        let config = VaultConfig::new().with_data_dir(dir);
        MasterKeyManager::new(config, Arc::new(MemorySecretStore::new()))
    }

    #[test]
    fn test_key_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        let (first, origin) = manager.get_or_create_key_with_origin().unwrap();
        assert_eq!(origin, KeyOrigin::Created);
        let (second, origin) = manager.get_or_create_key_with_origin().unwrap();
        assert_eq!(origin, KeyOrigin::Loaded);
        assert_eq!(first, second);
    }

    #[test]
    fn test_key_file_is_wrapped() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        let key = manager.get_or_create_key().unwrap();
        let stored = std::fs::read(dir.path().join("master.key.enc")).unwrap();
        assert_ne!(stored.as_slice(), key.as_bytes().as_slice());
        assert!(!stored.windows(KEY_LEN).any(|w| w == key.as_bytes()));
    }

    #[test]
    fn test_corrupt_key_regenerates() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        let first = manager.get_or_create_key().unwrap();

        std::fs::write(dir.path().join("master.key.enc"), b"garbage").unwrap();
        let (second, origin) = manager.get_or_create_key_with_origin().unwrap();
        assert_eq!(origin, KeyOrigin::Regenerated);
        assert_ne!(first, second);
        assert_eq!(manager.get_or_create_key().unwrap(), second);
    }

    #[test]
    fn test_wrong_length_key_regenerates() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemorySecretStore::new());
        let config = VaultConfig::new().with_data_dir(dir.path());
        std::fs::write(config.master_key_path(), store.wrap_secret(&[7u8; 16]).unwrap()).unwrap();

        let manager = MasterKeyManager::new(config, store);
        let (_, origin) = manager.get_or_create_key_with_origin().unwrap();
        assert_eq!(origin, KeyOrigin::Regenerated);
    }

    #[test]
    fn test_lost_wrapping_secret_regenerates() {
        let dir = tempfile::tempdir().unwrap();
        let first = manager(dir.path()).get_or_create_key().unwrap();

        // Same directory, store whose wrapping secret differs from the one used to save
        let after_reboot = manager(dir.path());
        let (second, origin) = after_reboot.get_or_create_key_with_origin().unwrap();
        assert_eq!(origin, KeyOrigin::Regenerated);
        assert_ne!(first, second);
        let (_, origin) = after_reboot.get_or_create_key_with_origin().unwrap();
        assert_eq!(origin, KeyOrigin::Loaded);
    }

    #[test]
    fn test_unavailable_store_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let config = VaultConfig::new().with_data_dir(&data_dir);
        let manager = MasterKeyManager::new(config, Arc::new(UnavailableSecretStore));
        assert!(matches!(manager.get_or_create_key(), Err(Error::Unavailable)));
        assert!(!data_dir.exists());
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = MasterKey::from_slice(&[0xAB; KEY_LEN]).unwrap();
        assert_eq!(format!("{:?}", key), "MasterKey([REDACTED])");
        assert!(MasterKey::from_slice(&[0u8; 31]).is_none());
    }
}
