//! Single-slot encrypted credential vault.

use super::envelope::EnvelopeCipher;
use super::lock::VaultLock;
use super::master_key::MasterKeyManager;
use super::secret_store::{default_secret_store, SecretStore};
use crate::atomic_write::write_atomic;
use crate::config::VaultConfig;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// The remembered signing identity.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    /// Path of the PKCS#12 bundle
    pub certificate_path: PathBuf,
    /// Bundle passphrase, when the user chose to remember it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<String>,
}

impl CredentialRecord {
    /// Record for `certificate_path` with an optional passphrase.
    pub fn new(certificate_path: impl Into<PathBuf>, passphrase: Option<String>) -> Self {
        Self {
            certificate_path: certificate_path.into(),
            passphrase,
        }
    }
}

impl std::fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("certificate_path", &self.certificate_path)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Stores one [`CredentialRecord`] in `user-data.bin`, encrypted under the
/// master key.
#[derive(Debug, Clone)]
pub struct CredentialVault {
    config: VaultConfig,
    keys: MasterKeyManager,
}

impl CredentialVault {
    /// Vault in `config.data_dir` using `store` to protect the master key.
    pub fn new(config: VaultConfig, store: Arc<dyn SecretStore>) -> Self {
        let keys = MasterKeyManager::new(config.clone(), store);
        Self { config, keys }
    }

    /// Vault with the platform secret store.
    pub fn with_config(config: VaultConfig) -> Self {
        let store = default_secret_store(&config.keyring_service);
        Self::new(config, store)
    }

    /// Whether vaulting is possible in this session.
    pub fn is_available(&self) -> bool {
        self.keys.secret_store().is_available()
    }

    /// The master key manager of this vault.
    pub fn key_manager(&self) -> &MasterKeyManager {
        &self.keys
    }

    /// Encrypt `record` and replace the vault file.
    ///
    /// Returns [`Error::Unavailable`] without touching the disk when the
    /// secret store is absent.
    pub fn save(&self, record: &CredentialRecord) -> Result<()> {
        if !self.is_available() {
            log::info!("Secret store unavailable; not saving credential");
            return Err(Error::Unavailable);
        }
        let lock = VaultLock::acquire(&self.config)?;
        let (key, _) = self.keys.get_or_create_locked(&lock)?;
        let envelope = EnvelopeCipher::new(&key).encrypt(record)?;
        write_atomic(&self.config.vault_path(), &envelope)?;
        log::debug!("Saved credential record to {}", self.config.vault_path().display());
        Ok(())
    }

    /// Read the stored record.
    ///
    /// `Ok(None)` when nothing is stored. [`Error::DecryptFailure`] when the
    /// file exists but cannot be decrypted (key regenerated, corruption);
    /// callers should then treat the credential as absent.
    pub fn load(&self) -> Result<Option<CredentialRecord>> {
        let path = self.config.vault_path();
        if !path.exists() {
            return Ok(None);
        }
        let lock = VaultLock::acquire(&self.config)?;
        let envelope = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::io(&path, e)),
        };
        let (key, _) = self.keys.get_or_create_locked(&lock)?;

        match EnvelopeCipher::new(&key).decrypt(&envelope) {
            Ok(record) => Ok(Some(record)),
            Err(Error::AuthenticationFailure) => {
                log::warn!(
                    "Stored credential in {} could not be decrypted; treating it as absent",
                    path.display()
                );
                Err(Error::DecryptFailure)
            },
            Err(e) => Err(e),
        }
    }

    /// Remove the stored record. Succeeds when nothing was stored.
    pub fn clear(&self) -> Result<()> {
        if !self.config.data_dir.exists() {
            return Ok(());
        }
        let _lock = VaultLock::acquire(&self.config)?;
        let path = self.config.vault_path();
        match std::fs::remove_file(&path) {
            Ok(()) => {
                log::debug!("Removed credential record {}", path.display());
                Ok(())
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io(&path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::secret_store::{MemorySecretStore, UnavailableSecretStore};

    fn vault(dir: &std::path::Path) -> CredentialVault {
        CredentialVault::new(
            VaultConfig::new().with_data_dir(dir),
            Arc::new(MemorySecretStore::new()),
        )
    }

    #[test]
    fn test_record_json_shape() {
        let record = CredentialRecord::new("/a.p12", Some("pw".to_string()));
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"certificatePath":"/a.p12","passphrase":"pw"}"#);

        let without: CredentialRecord = serde_json::from_str(r#"{"certificatePath":"/b.p12"}"#).unwrap();
        assert_eq!(without.passphrase, None);
    }

    #[test]
    fn test_record_debug_is_redacted() {
        let record = CredentialRecord::new("/a.p12", Some("pw-secret".to_string()));
        assert!(!format!("{:?}", record).contains("pw-secret"));
    }

    #[test]
    fn test_save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let vault = vault(dir.path());
        assert_eq!(vault.load().unwrap(), None);

        let record = CredentialRecord::new("/a.p12", Some("pw".to_string()));
        vault.save(&record).unwrap();
        assert_eq!(vault.load().unwrap(), Some(record));

        vault.clear().unwrap();
        assert_eq!(vault.load().unwrap(), None);
        vault.clear().unwrap();
    }

    #[test]
    fn test_vault_file_is_not_plaintext() {
        let dir = tempfile::tempdir().unwrap();
        let vault = vault(dir.path());
        vault
            .save(&CredentialRecord::new("/very/visible/path.p12", None))
            .unwrap();
        let stored = std::fs::read(dir.path().join("user-data.bin")).unwrap();
        assert!(!stored.windows(7).any(|w| w == b"visible"));
    }

    #[test]
    fn test_unavailable_save_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let vault = CredentialVault::new(
            VaultConfig::new().with_data_dir(&data_dir),
            Arc::new(UnavailableSecretStore),
        );
        assert!(!vault.is_available());
        let err = vault
            .save(&CredentialRecord::new("/a.p12", None))
            .unwrap_err();
        assert!(matches!(err, Error::Unavailable));
        assert!(!data_dir.exists());
        assert_eq!(vault.load().unwrap(), None);
        vault.clear().unwrap();
    }

    #[test]
    fn test_tampered_vault_is_decrypt_failure() {
        let dir = tempfile::tempdir().unwrap();
        let vault = vault(dir.path());
        vault.save(&CredentialRecord::new("/a.p12", None)).unwrap();

        let path = dir.path().join("user-data.bin");
        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        std::fs::write(&path, bytes).unwrap();

        assert!(matches!(vault.load(), Err(Error::DecryptFailure)));
    }
}
