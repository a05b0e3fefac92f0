//! Error types for pdf_seal.
//!
//! This module defines every error that can occur while signing a document or
//! while reading and writing the credential vault.

use std::path::PathBuf;

/// Result type alias for pdf_seal operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during signing and vault operations.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::enum_variant_names)] // "Invalid" prefix is intentional for clarity
pub enum Error {
    /// The OS secret store is not available; vaulting is disabled
    #[error("OS secret store is unavailable; credential vaulting is disabled")]
    Unavailable,

    /// Envelope failed authentication (tampered, truncated or encrypted under another key)
    #[error("Envelope authentication failed")]
    AuthenticationFailure,

    /// Vault contents could not be decrypted; treat the credential as absent
    #[error("Stored credential could not be decrypted")]
    DecryptFailure,

    /// Wrong passphrase for the certificate bundle
    #[error("Invalid passphrase for certificate bundle")]
    InvalidCredentials,

    /// Certificate bundle is malformed or unsupported
    #[error("Invalid certificate bundle: {0}")]
    InvalidCertificateBundle(String),

    /// Certificate bundle file does not exist
    #[error("Certificate bundle not found: {}", .0.display())]
    CertificateNotFound(PathBuf),

    /// Page index outside the document
    #[error("Page index {index} out of range (document has {page_count} pages)")]
    InvalidPage {
        /// Requested page index (0-based)
        index: usize,
        /// Number of pages in the document
        page_count: usize,
    },

    /// Signature rectangle has negative, zero or non-finite dimensions
    #[error("Invalid signature rectangle: {0}")]
    InvalidRect(String),

    /// Signature does not fit the reserved /Contents slot
    #[error("Signature ({required} bytes) exceeds reserved placeholder ({available} bytes)")]
    PlaceholderTooSmall {
        /// Bytes needed for the DER signature
        required: usize,
        /// Bytes reserved in the document
        available: usize,
    },

    /// IO error on a known path
    #[error("IO error on {}: {source}", path.display())]
    Io {
        /// File the operation was acting on
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// IO error without path context
    #[error("IO error: {0}")]
    IoBare(#[from] std::io::Error),

    /// Invalid PDF structure
    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    /// Parse error at specific byte offset
    #[error("Failed to parse object at byte {offset}: {reason}")]
    ParseError {
        /// Byte offset where error occurred
        offset: usize,
        /// Reason for parse failure
        reason: String,
    },

    /// Referenced object not found in cross-reference table
    #[error("Object not found: {0} {1} R")]
    ObjectNotFound(u32, u16),

    /// Stream decoding error
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// CMS construction or signing failed
    #[error("Signing error: {0}")]
    Signing(String),

    /// The OS secret store reported an error other than absence
    #[error("Secret store error: {0}")]
    SecretStore(String),

    /// Payload (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Fieldless discriminant of [`Error`], for callers that branch on the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`Error::Unavailable`]
    Unavailable,
    /// See [`Error::AuthenticationFailure`]
    AuthenticationFailure,
    /// See [`Error::DecryptFailure`]
    DecryptFailure,
    /// See [`Error::InvalidCredentials`]
    InvalidCredentials,
    /// See [`Error::InvalidCertificateBundle`]
    InvalidCertificateBundle,
    /// See [`Error::CertificateNotFound`]
    CertificateNotFound,
    /// See [`Error::InvalidPage`]
    InvalidPage,
    /// See [`Error::InvalidRect`]
    InvalidRect,
    /// See [`Error::PlaceholderTooSmall`]
    PlaceholderTooSmall,
    /// Any IO error
    Io,
    /// Malformed or unsupported input document
    InvalidPdf,
    /// See [`Error::Signing`]
    Signing,
    /// See [`Error::SecretStore`]
    SecretStore,
    /// See [`Error::Serialization`]
    Serialization,
}

impl Error {
    /// Wrap an IO error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// The category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Unavailable => ErrorKind::Unavailable,
            Error::AuthenticationFailure => ErrorKind::AuthenticationFailure,
            Error::DecryptFailure => ErrorKind::DecryptFailure,
            Error::InvalidCredentials => ErrorKind::InvalidCredentials,
            Error::InvalidCertificateBundle(_) => ErrorKind::InvalidCertificateBundle,
            Error::CertificateNotFound(_) => ErrorKind::CertificateNotFound,
            Error::InvalidPage { .. } => ErrorKind::InvalidPage,
            Error::InvalidRect(_) => ErrorKind::InvalidRect,
            Error::PlaceholderTooSmall { .. } => ErrorKind::PlaceholderTooSmall,
            Error::Io { .. } | Error::IoBare(_) => ErrorKind::Io,
            Error::InvalidPdf(_)
            | Error::ParseError { .. }
            | Error::ObjectNotFound(..)
            | Error::Decode(_) => ErrorKind::InvalidPdf,
            Error::Signing(_) => ErrorKind::Signing,
            Error::SecretStore(_) => ErrorKind::SecretStore,
            Error::Serialization(_) => ErrorKind::Serialization,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_page_error() {
        let err = Error::InvalidPage {
            index: 3,
            page_count: 1,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Page index 3"));
        assert!(msg.contains("1 pages"));
        assert_eq!(err.kind(), ErrorKind::InvalidPage);
    }

    #[test]
    fn test_placeholder_too_small_error() {
        let err = Error::PlaceholderTooSmall {
            required: 9000,
            available: 8192,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("9000"));
        assert!(msg.contains("8192"));
    }

    #[test]
    fn test_io_error_carries_path() {
        let err = Error::io(
            "/tmp/missing.pdf",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        let msg = format!("{}", err);
        assert!(msg.contains("/tmp/missing.pdf"));
        assert!(msg.contains("gone"));
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_parse_errors_share_pdf_kind() {
        assert_eq!(Error::ObjectNotFound(10, 0).kind(), ErrorKind::InvalidPdf);
        assert_eq!(
            Error::ParseError {
                offset: 12,
                reason: "bad".to_string()
            }
            .kind(),
            ErrorKind::InvalidPdf
        );
        assert!(format!("{}", Error::ObjectNotFound(10, 0)).contains("10 0 R"));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
