// Allow some clippy lints that are too pedantic for this project
#![allow(clippy::too_many_arguments)]
#![allow(clippy::enum_variant_names)]
#![allow(clippy::should_implement_trait)]
// Allow unused for tests
#![cfg_attr(test, allow(dead_code))]

//! # PDF Seal
//!
//! Visible digital signatures for PDF documents.
//!
//! ## Core Features
//!
//! ### Signing
//! - **Visible Annotation**: Signature widget with a Helvetica label and optional date line
//! - **Incremental Update**: Original bytes are kept untouched; the signature is appended
//! - **Detached CMS**: `adbe.pkcs7.detached` SignedData with signed attributes (ISO 32000-1 §12.8)
//! - **PKCS#12 Identities**: RSA key and certificate chain from a `.p12` / `.pfx` bundle
//!
//! ### Verification
//! - **ByteRange Digest**: Recompute the covered bytes and compare with the signed `messageDigest`
//! - **Signature Check**: RSA PKCS#1 v1.5 over the signed attributes
//!
//! ### Credential Vault
//! - **Envelope Encryption**: AES-256-GCM under a random master key
//! - **OS Secret Store**: Master key wrapped by the platform keychain
//! - **Locking**: One exclusive lock and atomic file replacement in the user-data directory
//!
//! ## Quick Start
//!
//! ```no_run
//! use pdf_seal::{SigningPipeline, SigningRequest, SigningState};
//! use pdf_seal::geometry::Rect;
//!
//! # fn main() -> pdf_seal::Result<()> {
//! let request = SigningRequest::new("contract.pdf", "me.p12", "secret")
//!     .with_page(0)
//!     .with_rect(Rect::new(50.0, 50.0, 150.0, 20.0))
//!     .with_label("Signature")
//!     .with_date_text("2024-01-01 10:00");
//!
//! let mut pipeline = SigningPipeline::default();
//! let signed = pipeline.sign(&request)?;
//! assert_eq!(pipeline.state(), SigningState::Written);
//! println!("signed copy at {}", signed.path.display());
//! # Ok(())
//! # }
//! ```
//!
//! ## License
//!
//! Licensed under either of:
//!
//! * Apache License, Version 2.0 ([LICENSE-APACHE](LICENSE-APACHE) or <http://www.apache.org/licenses/LICENSE-2.0>)
//! * MIT license ([LICENSE-MIT](LICENSE-MIT) or <http://opensource.org/licenses/MIT>)
//!
//! at your option.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Error handling
pub mod error;

// Configuration
pub mod config;

// Core PDF parsing
pub mod document;
pub mod lexer;
pub mod object;
pub mod parser;

// Stream decoders
pub mod decoders;

// Page geometry
pub mod geometry;

// Incremental update writing
pub mod writer;

// Digital signatures
pub mod signatures;

// Signing pipeline
pub mod pipeline;

// Credential vault
pub mod vault;

mod atomic_write;

// Re-exports
pub use config::{SealConfig, VaultConfig};
pub use document::PdfDocument;
pub use error::{Error, ErrorKind, Result};
pub use pipeline::{SignedOutput, SigningPipeline, SigningRequest, SigningState};
pub use vault::{CredentialRecord, CredentialVault};

// Version info
/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
