//! Visible-signature pipeline.
//!
//! ```text
//! Idle
//!  ↓ load document, check page and rectangle
//! AnnotationApplied      label appearance + signature field queued
//!  ↓
//! PlaceholderReserved    update laid out, /ByteRange patched
//!  ↓
//! DigestComputed         digest of everything but the /Contents slot
//!  ↓
//! Signed                 bundle unlocked, CMS signature built
//!  ↓
//! Written                slot filled, <stem>_signed.<ext> replaced atomically
//! ```
//!
//! Any error moves the pipeline to [`SigningState::Failed`] with the error's
//! [`ErrorKind`]. The output file is written only in the last step, so a
//! failure never leaves a partial file behind.

mod annotation;
mod request;

pub use request::{SigningRequest, DEFAULT_LABEL_FONT_SIZE};

use crate::atomic_write::write_atomic;
use crate::config::SealConfig;
use crate::document::PdfDocument;
use crate::error::{Error, ErrorKind, Result};
use crate::signatures::{
    load_identity, DetachedSigner, DigestAlgorithm, SignatureMetadata,
    SignaturePlaceholderAllocator, Span,
};
use crate::writer::IncrementalUpdate;
use annotation::apply_annotation;
use chrono::Utc;
use std::path::{Path, PathBuf};

/// Where a [`SigningPipeline`] is in its last run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningState {
    /// Nothing done yet
    Idle,
    /// Label and signature field queued in the update
    AnnotationApplied,
    /// Update laid out with a patched ByteRange
    PlaceholderReserved,
    /// Digest over the ByteRange computed
    DigestComputed,
    /// CMS signature produced
    Signed,
    /// Output file written
    Written,
    /// Stopped with an error of this kind
    Failed(ErrorKind),
}

impl SigningState {
    /// Whether the run is over.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SigningState::Written | SigningState::Failed(_))
    }
}

impl std::fmt::Display for SigningState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SigningState::Failed(kind) => write!(f, "Failed({:?})", kind),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct SignedOutput {
    /// Written file
    pub path: PathBuf,
    /// ByteRange stored in the signature dictionary
    pub byte_range: [i64; 4],
    /// The `<...>` slot holding the signature
    pub contents: Span,
    /// DER length of the embedded signature
    pub signature_len: usize,
    /// Digest that was signed
    pub digest: Vec<u8>,
    /// Algorithm of `digest`
    pub digest_algorithm: DigestAlgorithm,
    /// Name of the signature field
    pub field_name: String,
    /// Common name of the signer certificate
    pub signer: Option<String>,
}

/// Signs documents with a visible signature, one request at a time.
#[derive(Debug)]
pub struct SigningPipeline {
    config: SealConfig,
    state: SigningState,
    transitions: Vec<SigningState>,
}

impl Default for SigningPipeline {
    fn default() -> Self {
        Self::new(SealConfig::default())
    }
}

impl SigningPipeline {
    /// Create a pipeline with `config`.
    pub fn new(config: SealConfig) -> Self {
        Self {
            config,
            state: SigningState::Idle,
            transitions: Vec::new(),
        }
    }

    /// The configuration in use.
    pub fn config(&self) -> &SealConfig {
        &self.config
    }

    /// State reached by the last run.
    pub fn state(&self) -> SigningState {
        self.state
    }

    /// States entered during the last run, in order.
    pub fn transitions(&self) -> &[SigningState] {
        &self.transitions
    }

    /// Sign `request.document_path` into `<stem><suffix>.<ext>`.
    pub fn sign(&mut self, request: &SigningRequest) -> Result<SignedOutput> {
        self.state = SigningState::Idle;
        self.transitions.clear();
        log::debug!("Signing {:?}", request);

        match self.run(request) {
            Ok(output) => Ok(output),
            Err(e) => {
                log::error!("Signing {} failed: {}", request.document_path.display(), e);
                self.transition(SigningState::Failed(e.kind()));
                Err(e)
            },
        }
    }

    fn transition(&mut self, next: SigningState) {
        log::debug!("Signing pipeline: {} -> {}", self.state, next);
        self.state = next;
        self.transitions.push(next);
    }

    fn run(&mut self, request: &SigningRequest) -> Result<SignedOutput> {
        let output_path = signed_output_path(&request.document_path, &self.config.output_suffix)?;
        let doc = PdfDocument::open(&request.document_path)?;
        let page = doc.page(request.page_index)?.clone();
        request.rect.validate_dimensions()?;
        if !page.media_box.contains(&request.rect) {
            log::warn!(
                "Signature rectangle {:?} extends beyond page {} ({:?})",
                request.rect,
                page.index,
                page.media_box
            );
        }

        let mut update = IncrementalUpdate::new(&doc);
        let applied = apply_annotation(&doc, &mut update, &page, request, &self.config)?;
        self.transition(SigningState::AnnotationApplied);
        log::debug!("Widget {} holds field {}", applied.widget_ref, applied.field_name);

        let metadata = SignatureMetadata {
            name: Some(
                request
                    .signer_name
                    .clone()
                    .unwrap_or_else(|| request.label_text.clone()),
            ),
            reason: Some(self.config.reason.clone()),
            location: self.config.location.clone(),
            contact_info: self.config.contact_info.clone(),
            signing_time: Utc::now(),
        };
        let allocator = SignaturePlaceholderAllocator::new(self.config.reserved_signature_size);
        let pending = allocator.reserve(&mut update, applied.sig_ref, &metadata);
        let mut laid_out = update.write()?;
        let placeholder = allocator.finalize(&mut laid_out, &pending)?;
        self.transition(SigningState::PlaceholderReserved);

        let algorithm = self.config.digest_algorithm;
        let digest = allocator.digest(&laid_out.bytes, &placeholder, algorithm)?;
        self.transition(SigningState::DigestComputed);

        let identity = load_identity(&request.certificate_path, &request.passphrase)?;
        let signature = DetachedSigner::new(&identity)
            .with_digest_algorithm(algorithm)
            .with_reserved_size(self.config.reserved_signature_size)
            .sign_digest(&digest, metadata.signing_time)?;
        self.transition(SigningState::Signed);

        let mut bytes = laid_out.bytes;
        allocator.fill(&mut bytes, &placeholder, &signature)?;
        write_atomic(&output_path, &bytes)?;
        self.transition(SigningState::Written);

        log::info!(
            "Signed {} as field {} ({} byte signature) -> {}",
            request.document_path.display(),
            applied.field_name,
            signature.len(),
            output_path.display()
        );
        Ok(SignedOutput {
            path: output_path,
            byte_range: placeholder.byte_range,
            contents: placeholder.contents,
            signature_len: signature.len(),
            digest,
            digest_algorithm: algorithm,
            field_name: applied.field_name,
            signer: identity.common_name(),
        })
    }
}

/// `<dir>/<stem><suffix>.<ext>` for `input`.
///
/// ```
/// # use std::path::Path;
/// # use pdf_seal::pipeline::signed_output_path;
/// let out = signed_output_path(Path::new("/docs/contract.pdf"), "_signed").unwrap();
/// assert_eq!(out, Path::new("/docs/contract_signed.pdf"));
/// ```
pub fn signed_output_path(input: &Path, suffix: &str) -> Result<PathBuf> {
    let invalid = |reason: &str| {
        Error::io(
            input,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, reason.to_string()),
        )
    };
    let stem = input
        .file_stem()
        .ok_or_else(|| invalid("path has no file name"))?;
    if suffix.is_empty() {
        return Err(invalid("empty output suffix would overwrite the input"));
    }

    let mut name = stem.to_os_string();
    name.push(suffix);
    if let Some(ext) = input.extension() {
        name.push(".");
        name.push(ext);
    }
    Ok(input.with_file_name(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;

    fn write_one_page_pdf(dir: &Path) -> PathBuf {
        let mut pdf = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (i, body) in [
            "<< /Type /Catalog /Pages 2 0 R >>",
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>",
        ]
        .iter()
        .enumerate()
        {
            offsets.push(pdf.len());
            pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
        }
        let xref = pdf.len();
        pdf.extend_from_slice(b"xref\n0 4\n0000000000 65535 f \n");
        for offset in offsets {
            pdf.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        pdf.extend_from_slice(
            format!("trailer\n<< /Size 4 /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n", xref).as_bytes(),
        );

        let path = dir.join("doc.pdf");
        std::fs::write(&path, pdf).unwrap();
        path
    }

    fn fixture() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/test_signer.p12")
    }

    #[test]
    fn test_output_path() {
        assert_eq!(
            signed_output_path(Path::new("a/b.pdf"), "_signed").unwrap(),
            PathBuf::from("a/b_signed.pdf")
        );
        assert_eq!(
            signed_output_path(Path::new("noext"), "_signed").unwrap(),
            PathBuf::from("noext_signed")
        );
        assert!(signed_output_path(Path::new("a/b.pdf"), "").is_err());
    }

    #[test]
    fn test_sign_reaches_written() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_one_page_pdf(dir.path());
        let original = std::fs::read(&input).unwrap();

        let mut pipeline = SigningPipeline::default();
        let request = SigningRequest::new(&input, fixture(), "test").with_date_text("2024-01-01 10:00");
        let output = pipeline.sign(&request).unwrap();

        assert_eq!(pipeline.state(), SigningState::Written);
        assert_eq!(
            pipeline.transitions(),
            &[
                SigningState::AnnotationApplied,
                SigningState::PlaceholderReserved,
                SigningState::DigestComputed,
                SigningState::Signed,
                SigningState::Written,
            ]
        );
        assert_eq!(output.path, dir.path().join("doc_signed.pdf"));
        assert_eq!(std::fs::read(&input).unwrap(), original);

        let signed = std::fs::read(&output.path).unwrap();
        assert!(signed.starts_with(&original));
        assert_eq!(output.byte_range[2] + output.byte_range[3], signed.len() as i64);
    }

    #[test]
    fn test_invalid_page_fails_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_one_page_pdf(dir.path());

        let mut pipeline = SigningPipeline::default();
        let err = pipeline
            .sign(&SigningRequest::new(&input, fixture(), "test").with_page(3))
            .unwrap_err();

        assert!(matches!(err, Error::InvalidPage { index: 3, page_count: 1 }));
        assert_eq!(pipeline.state(), SigningState::Failed(ErrorKind::InvalidPage));
        assert!(!dir.path().join("doc_signed.pdf").exists());
    }

    #[test]
    fn test_missing_bundle_fails_after_digest() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_one_page_pdf(dir.path());

        let mut pipeline = SigningPipeline::default();
        let request = SigningRequest::new(&input, dir.path().join("missing.p12"), "test");
        let err = pipeline.sign(&request).unwrap_err();

        assert!(matches!(err, Error::CertificateNotFound(_)));
        assert_eq!(
            pipeline.transitions(),
            &[
                SigningState::AnnotationApplied,
                SigningState::PlaceholderReserved,
                SigningState::DigestComputed,
                SigningState::Failed(ErrorKind::CertificateNotFound),
            ]
        );
        assert!(!dir.path().join("doc_signed.pdf").exists());
    }

    #[test]
    fn test_zero_sized_rect_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_one_page_pdf(dir.path());

        let mut pipeline = SigningPipeline::default();
        let request = SigningRequest::new(&input, fixture(), "test")
            .with_rect(Rect::new(10.0, 10.0, 0.0, 40.0));
        let err = pipeline.sign(&request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRect);
        assert!(pipeline.state().is_terminal());
    }
}
