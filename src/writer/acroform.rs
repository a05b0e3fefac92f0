//! AcroForm and signature field dictionaries.
//!
//! Implements the parts of ISO 32000-1:2008 Section 12.7.2 (interactive form
//! dictionary) and 12.7.4.5 (signature fields) that an incremental signature
//! needs: a signature field merged with its widget annotation, and an
//! AcroForm dictionary extended with the new field.
//!
//! # Example
//!
//! ```
//! use pdf_seal::geometry::Rect;
//! use pdf_seal::object::{Object, ObjectRef};
//! use pdf_seal::writer::{AcroFormBuilder, SignatureWidgetBuilder};
//!
//! let widget = SignatureWidgetBuilder::new("Signature1", Rect::new(50.0, 50.0, 200.0, 70.0))
//!     .with_page(ObjectRef::new(3, 0))
//!     .with_value(ObjectRef::new(12, 0))
//!     .build();
//! assert_eq!(widget.get("FT"), Some(&Object::name("Sig")));
//!
//! let mut acroform = AcroFormBuilder::new().signatures_exist().append_only();
//! acroform.add_field(ObjectRef::new(13, 0));
//! assert_eq!(acroform.build().get("SigFlags"), Some(&Object::Integer(3)));
//! ```

use crate::geometry::Rect;
use crate::object::{Dictionary, Object, ObjectRef};

/// SigFlags bit 1: the document contains at least one signature field.
pub const SIG_FLAGS_SIGNATURES_EXIST: i64 = 1;
/// SigFlags bit 2: the document must only be saved incrementally.
pub const SIG_FLAGS_APPEND_ONLY: i64 = 2;

/// Annotation flag: print the annotation.
pub const ANNOT_FLAG_PRINT: i64 = 4;
/// Annotation flag: the annotation cannot be moved or deleted.
pub const ANNOT_FLAG_LOCKED: i64 = 128;

/// Builder for the document-level AcroForm dictionary.
///
/// Starting from an existing dictionary keeps every entry the document
/// already had (`/DR`, `/DA`, `/NeedAppearances`...); only `/Fields` and
/// `/SigFlags` are rewritten.
#[derive(Debug, Clone, Default)]
pub struct AcroFormBuilder {
    base: Dictionary,
    fields: Vec<Object>,
    sig_flags: i64,
}

impl AcroFormBuilder {
    /// Create an empty AcroForm builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Extend an existing AcroForm whose `/Fields` array has already been
    /// resolved to `fields`.
    pub fn from_existing(base: Dictionary, fields: Vec<Object>) -> Self {
        let sig_flags = base.get("SigFlags").and_then(Object::as_integer).unwrap_or(0);
        Self {
            base,
            fields,
            sig_flags,
        }
    }

    /// Add a field reference.
    pub fn add_field(&mut self, field_ref: ObjectRef) {
        self.fields.push(Object::Reference(field_ref));
    }

    /// Mark document as containing signatures.
    pub fn signatures_exist(mut self) -> Self {
        self.sig_flags |= SIG_FLAGS_SIGNATURES_EXIST;
        self
    }

    /// Mark document as append-only (for signed documents).
    pub fn append_only(mut self) -> Self {
        self.sig_flags |= SIG_FLAGS_APPEND_ONLY;
        self
    }

    /// Get the number of fields.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Build the AcroForm dictionary.
    pub fn build(&self) -> Dictionary {
        let mut dict = self.base.clone();
        dict.insert("Fields".to_string(), Object::Array(self.fields.clone()));
        if self.sig_flags != 0 {
            dict.insert("SigFlags".to_string(), Object::Integer(self.sig_flags));
        }
        dict
    }
}

/// Signature field merged with its widget annotation.
#[derive(Debug, Clone)]
pub struct SignatureWidgetBuilder {
    name: String,
    rect: Rect,
    page: Option<ObjectRef>,
    value: Option<ObjectRef>,
    appearance: Option<ObjectRef>,
    flags: i64,
}

impl SignatureWidgetBuilder {
    /// Field `name` drawn at `rect`; printed and locked by default.
    pub fn new(name: impl Into<String>, rect: Rect) -> Self {
        Self {
            name: name.into(),
            rect,
            page: None,
            value: None,
            appearance: None,
            flags: ANNOT_FLAG_PRINT | ANNOT_FLAG_LOCKED,
        }
    }

    /// Page the widget lives on (`/P`).
    pub fn with_page(mut self, page: ObjectRef) -> Self {
        self.page = Some(page);
        self
    }

    /// Signature dictionary (`/V`).
    pub fn with_value(mut self, sig_ref: ObjectRef) -> Self {
        self.value = Some(sig_ref);
        self
    }

    /// Normal appearance stream (`/AP /N`).
    pub fn with_appearance(mut self, ap_ref: ObjectRef) -> Self {
        self.appearance = Some(ap_ref);
        self
    }

    /// Override the annotation flags (`/F`).
    pub fn with_flags(mut self, flags: i64) -> Self {
        self.flags = flags;
        self
    }

    /// Build the merged field/widget dictionary.
    pub fn build(&self) -> Dictionary {
        let mut dict = Dictionary::new();
        dict.insert("Type".to_string(), Object::name("Annot"));
        dict.insert("Subtype".to_string(), Object::name("Widget"));
        dict.insert("FT".to_string(), Object::name("Sig"));
        dict.insert("T".to_string(), Object::text(&self.name));
        dict.insert("F".to_string(), Object::Integer(self.flags));
        dict.insert(
            "Rect".to_string(),
            Object::Array(
                self.rect
                    .to_pdf_array()
                    .iter()
                    .map(|&v| Object::Real(v as f64))
                    .collect(),
            ),
        );
        if let Some(page) = self.page {
            dict.insert("P".to_string(), Object::Reference(page));
        }
        if let Some(value) = self.value {
            dict.insert("V".to_string(), Object::Reference(value));
        }
        if let Some(appearance) = self.appearance {
            let mut ap = Dictionary::new();
            ap.insert("N".to_string(), Object::Reference(appearance));
            dict.insert("AP".to_string(), Object::Dictionary(ap));
        }
        dict
    }
}

/// `base`, or `base_2`, `base_3`... whichever is not already taken.
pub fn unique_field_name(existing: &[String], base: &str) -> String {
    if !existing.iter().any(|name| name == base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{}_{}", base, n))
        .find(|candidate| !existing.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}
