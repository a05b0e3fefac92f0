//! PDF digital signatures.
//!
//! ## Features
//!
//! - **Placeholder allocation**: fixed-width `/ByteRange` and a zero-filled
//!   `/Contents` slot, back-patched after layout
//! - **Signature creation**: detached CMS (`adbe.pkcs7.detached`) with RSA
//!   keys from PKCS#12 bundles
//! - **Signature verification**: digest and RSA checks of embedded signatures
//!
//! ## Example
//!
//! ```no_run
//! use pdf_seal::document::PdfDocument;
//! use pdf_seal::signatures::{
//!     load_identity, DetachedSigner, SignatureMetadata, SignaturePlaceholderAllocator,
//! };
//!
//! # fn main() -> pdf_seal::Result<()> {
//! let doc = PdfDocument::open("contract.pdf")?;
//! let metadata = SignatureMetadata::default();
//! let allocator = SignaturePlaceholderAllocator::new(8192);
//! let mut prepared = allocator.allocate(&doc, &metadata)?;
//!
//! let identity = load_identity("signer.p12", "passphrase")?;
//! let der = DetachedSigner::new(&identity).sign(
//!     &prepared.bytes,
//!     &prepared.placeholder.byte_range,
//!     metadata.signing_time,
//! )?;
//! allocator.fill(&mut prepared.bytes, &prepared.placeholder, &der)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## PDF Specification Reference
//!
//! - ISO 32000-1:2008 Section 12.8 - Digital Signatures
//! - RFC 5652 - Cryptographic Message Syntax

pub(crate) mod byterange;
mod pkcs12;
mod placeholder;
mod signer;
mod types;
mod verifier;

pub use byterange::{ByteRangeCalculator, BYTE_RANGE_WIDTH};
pub use pkcs12::{load_identity, parse_identity};
pub use placeholder::{
    pdf_date, PendingPlaceholder, PreparedDocument, SignaturePlaceholder,
    SignaturePlaceholderAllocator, Span,
};
pub use signer::DetachedSigner;
pub use types::{
    DigestAlgorithm, SignatureInfo, SignatureMetadata, SignatureSubFilter, SigningIdentity,
    VerificationResult, VerificationStatus,
};
pub use verifier::{signature_dictionaries, verify_cms, CmsCheck, SignatureVerifier};
