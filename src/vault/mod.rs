//! Local credential vault with envelope encryption.
//!
//! ```text
//! CredentialVault ──► MasterKeyManager ──► SecretStore (OS keyring)
//!        │                   │
//!        ▼                   ▼
//!   user-data.bin      master.key.enc
//!  (EnvelopeCipher)   (wrapped 32-byte key)
//! ```
//!
//! All file access in the user-data directory happens under one exclusive
//! lock (`.lock`), and files are replaced atomically.
//!
//! ## Key regeneration
//!
//! When `master.key.enc` is missing, unreadable or does not unwrap to 32
//! bytes, a new master key is created. A credential saved under the old key
//! then fails to load with [`Error::DecryptFailure`](crate::Error::DecryptFailure)
//! and a warning is logged when the key is replaced.
//!
//! ## Example
//!
//! ```no_run
//! use pdf_seal::config::VaultConfig;
//! use pdf_seal::vault::{CredentialRecord, CredentialVault};
//!
//! # fn main() -> pdf_seal::Result<()> {
//! let vault = CredentialVault::with_config(VaultConfig::default());
//! if vault.is_available() {
//!     vault.save(&CredentialRecord::new("/home/me/id.p12", Some("pw".into())))?;
//!     let remembered = vault.load()?;
//!     assert!(remembered.is_some());
//! }
//! # Ok(())
//! # }
//! ```

mod credential;
mod envelope;
mod lock;
mod master_key;
mod secret_store;

pub use credential::{CredentialRecord, CredentialVault};
pub use envelope::{EnvelopeCipher, CREDENTIAL_AAD, KEY_WRAP_AAD, NONCE_LEN, TAG_LEN};
pub use lock::VaultLock;
pub use master_key::{KeyOrigin, MasterKey, MasterKeyManager, KEY_LEN};
#[cfg(feature = "os-keyring")]
pub use secret_store::KeyringSecretStore;
pub use secret_store::{
    default_secret_store, MemorySecretStore, SecretStore, UnavailableSecretStore,
};
