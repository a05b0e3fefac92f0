//! Configuration for signing and vault operations.

use crate::signatures::DigestAlgorithm;
use std::path::{Path, PathBuf};

/// Default DER bytes reserved for the signature (before hex encoding).
pub const DEFAULT_RESERVED_SIGNATURE_SIZE: usize = 8192;

/// Signing configuration.
#[derive(Debug, Clone)]
pub struct SealConfig {
    /// DER bytes reserved in the /Contents slot.
    pub reserved_signature_size: usize,

    /// Digest used for the message digest and the RSA signature.
    pub digest_algorithm: DigestAlgorithm,

    /// /Reason entry of the signature dictionary.
    pub reason: String,

    /// /Location entry.
    pub location: Option<String>,

    /// /ContactInfo entry.
    pub contact_info: Option<String>,

    /// Partial name of the signature field.
    pub field_name: String,

    /// Appended to the input stem to build the output file name.
    pub output_suffix: String,

    /// Inner padding of the label box, in document units.
    pub padding: f32,
}

impl Default for SealConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SealConfig {
    /// Create new configuration with defaults.
    pub fn new() -> Self {
        Self {
            reserved_signature_size: DEFAULT_RESERVED_SIGNATURE_SIZE,
            digest_algorithm: DigestAlgorithm::Sha256,
            reason: "Document signed".to_string(),
            location: None,
            contact_info: None,
            field_name: "Signature1".to_string(),
            output_suffix: "_signed".to_string(),
            padding: 4.0,
        }
    }

    /// Set the number of DER bytes reserved for the signature.
    pub fn with_reserved_signature_size(mut self, size: usize) -> Self {
        self.reserved_signature_size = size;
        self
    }

    /// Set the digest algorithm.
    pub fn with_digest_algorithm(mut self, algorithm: DigestAlgorithm) -> Self {
        self.digest_algorithm = algorithm;
        self
    }

    /// Set the reason for signing.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// Set the signing location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set the contact information.
    pub fn with_contact_info(mut self, contact: impl Into<String>) -> Self {
        self.contact_info = Some(contact.into());
        self
    }

    /// Set the signature field name.
    pub fn with_field_name(mut self, name: impl Into<String>) -> Self {
        self.field_name = name.into();
        self
    }

    /// Set the output file suffix.
    pub fn with_output_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.output_suffix = suffix.into();
        self
    }

    /// Set the label box padding.
    pub fn with_padding(mut self, padding: f32) -> Self {
        self.padding = padding;
        self
    }
}

/// Vault configuration.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// User-data directory holding the key, vault and lock files.
    pub data_dir: PathBuf,

    /// Service name used for OS keyring entries.
    pub keyring_service: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl VaultConfig {
    /// Wrapped master key file name.
    pub const MASTER_KEY_FILE: &'static str = "master.key.enc";
    /// Encrypted credential record file name.
    pub const VAULT_FILE: &'static str = "user-data.bin";
    /// Lock file name.
    pub const LOCK_FILE: &'static str = ".lock";

    /// Create configuration rooted at the platform data directory.
    pub fn new() -> Self {
        let base = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
        Self {
            data_dir: base.join("pdf_seal"),
            keyring_service: "pdf_seal".to_string(),
        }
    }

    /// Use a specific user-data directory.
    pub fn with_data_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.data_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Use a specific keyring service name.
    pub fn with_keyring_service(mut self, service: impl Into<String>) -> Self {
        self.keyring_service = service.into();
        self
    }

    /// Path of the wrapped master key.
    pub fn master_key_path(&self) -> PathBuf {
        self.data_dir.join(Self::MASTER_KEY_FILE)
    }

    /// Path of the encrypted credential record.
    pub fn vault_path(&self) -> PathBuf {
        self.data_dir.join(Self::VAULT_FILE)
    }

    /// Path of the directory lock file.
    pub fn lock_path(&self) -> PathBuf {
        self.data_dir.join(Self::LOCK_FILE)
    }
}
