//! Per-request signing inputs.

use crate::geometry::Rect;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Label font size used when the caller does not choose one.
pub const DEFAULT_LABEL_FONT_SIZE: f32 = 12.0;

/// Everything one sign action needs.
///
/// `rect` is in document units with a bottom-left origin. Only its
/// dimensions are validated; keeping it on the page is up to the caller.
#[derive(Clone)]
pub struct SigningRequest {
    /// Document to sign; never modified
    pub document_path: PathBuf,
    /// PKCS#12 bundle holding the signer key and certificates
    pub certificate_path: PathBuf,
    /// Passphrase of the bundle
    pub passphrase: String,
    /// Zero-based page index
    pub page_index: usize,
    /// Widget rectangle
    pub rect: Rect,
    /// First line of the visible label
    pub label_text: String,
    /// Requested font size; shrunk when the label does not fit
    pub label_font_size: f32,
    /// Optional second line, usually the signing date
    pub date_text: Option<String>,
    /// `/Name` of the signature; defaults to the label text
    pub signer_name: Option<String>,
}

impl SigningRequest {
    /// Request signing page 0 with a `"Signature"` label in a 200x70 box at (50, 50).
    pub fn new(
        document_path: impl AsRef<Path>,
        certificate_path: impl AsRef<Path>,
        passphrase: impl Into<String>,
    ) -> Self {
        Self {
            document_path: document_path.as_ref().to_path_buf(),
            certificate_path: certificate_path.as_ref().to_path_buf(),
            passphrase: passphrase.into(),
            page_index: 0,
            rect: Rect::new(50.0, 50.0, 200.0, 70.0),
            label_text: "Signature".to_string(),
            label_font_size: DEFAULT_LABEL_FONT_SIZE,
            date_text: None,
            signer_name: None,
        }
    }

    /// Sign page `index` (zero-based).
    pub fn with_page(mut self, index: usize) -> Self {
        self.page_index = index;
        self
    }

    /// Place the widget at `rect`.
    pub fn with_rect(mut self, rect: Rect) -> Self {
        self.rect = rect;
        self
    }

    /// Set the label text.
    pub fn with_label(mut self, text: impl Into<String>) -> Self {
        self.label_text = text.into();
        self
    }

    /// Set the requested label font size.
    pub fn with_font_size(mut self, size: f32) -> Self {
        self.label_font_size = size;
        self
    }

    /// Add a date line below the label.
    pub fn with_date_text(mut self, text: impl Into<String>) -> Self {
        self.date_text = Some(text.into());
        self
    }

    /// Add a date line formatted as `YYYY-MM-DD HH:MM`.
    pub fn with_timestamp(self, time: &DateTime<Utc>) -> Self {
        self.with_date_text(time.format("%Y-%m-%d %H:%M").to_string())
    }

    /// Set the `/Name` entry of the signature dictionary.
    pub fn with_signer_name(mut self, name: impl Into<String>) -> Self {
        self.signer_name = Some(name.into());
        self
    }
}

impl std::fmt::Debug for SigningRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningRequest")
            .field("document_path", &self.document_path)
            .field("certificate_path", &self.certificate_path)
            .field("passphrase", &"[REDACTED]")
            .field("page_index", &self.page_index)
            .field("rect", &self.rect)
            .field("label_text", &self.label_text)
            .field("label_font_size", &self.label_font_size)
            .field("date_text", &self.date_text)
            .field("signer_name", &self.signer_name)
            .finish()
    }
}
