//! Signature placeholder allocation.
//!
//! The signature dictionary is written as a pre-serialized body whose
//! `/ByteRange` and `/Contents` values sit at known positions inside it.
//! Once the incremental update has been laid out, the writer's object spans
//! turn those positions into absolute offsets, and the real ByteRange is
//! patched in place. The file length never changes after layout.

use crate::document::PdfDocument;
use crate::error::{Error, Result};
use crate::object::{Object, ObjectRef};
use crate::signatures::byterange::{ByteRangeCalculator, BYTE_RANGE_WIDTH};
use crate::signatures::{DigestAlgorithm, SignatureMetadata, SignatureSubFilter};
use crate::writer::{IncrementalUpdate, ObjectSerializer, ObjectSpan, UpdateOutput};
use chrono::{DateTime, Utc};

/// A region of the output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// Offset of the first byte
    pub offset: usize,
    /// Number of bytes
    pub len: usize,
}

impl Span {
    /// One past the last byte.
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// A laid-out signature slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignaturePlaceholder {
    /// Signature dictionary object
    pub sig_ref: ObjectRef,
    /// Patched ByteRange values
    pub byte_range: [i64; 4],
    /// Where the ByteRange array is written
    pub byte_range_span: Span,
    /// The `<...>` hex slot, brackets included
    pub contents: Span,
}

/// Signature dictionary queued in an update, not yet laid out.
#[derive(Debug, Clone, Copy)]
pub struct PendingPlaceholder {
    sig_ref: ObjectRef,
    byte_range_rel: usize,
    contents_rel: usize,
}

impl PendingPlaceholder {
    /// Reference of the queued signature dictionary.
    pub fn sig_ref(&self) -> ObjectRef {
        self.sig_ref
    }
}

/// Output of [`SignaturePlaceholderAllocator::allocate`].
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    /// Full file with the zero-filled slot
    pub bytes: Vec<u8>,
    /// Slot and ByteRange positions
    pub placeholder: SignaturePlaceholder,
    /// Spans of every object in the update
    pub spans: Vec<ObjectSpan>,
}

/// Format a timestamp as a PDF date string.
///
/// ```
/// # use chrono::{TimeZone, Utc};
/// # use pdf_seal::signatures::pdf_date;
/// let t = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
/// assert_eq!(pdf_date(&t), "D:20240101100000+00'00'");
/// ```
pub fn pdf_date(time: &DateTime<Utc>) -> String {
    time.format("D:%Y%m%d%H%M%S+00'00'").to_string()
}

/// Reserves the signature slot and back-patches the ByteRange.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignaturePlaceholderAllocator {
    calculator: ByteRangeCalculator,
}

impl SignaturePlaceholderAllocator {
    /// Allocator reserving `reserved_signature_size` DER bytes.
    pub fn new(reserved_signature_size: usize) -> Self {
        Self {
            calculator: ByteRangeCalculator::new(reserved_signature_size),
        }
    }

    /// The calculator sized for this slot.
    pub fn calculator(&self) -> &ByteRangeCalculator {
        &self.calculator
    }

    /// Serialize the signature dictionary with placeholders.
    ///
    /// Returns the body and the positions of the ByteRange array and of the
    /// `<` opening the contents slot, relative to the body start.
    pub fn signature_dictionary(&self, metadata: &SignatureMetadata) -> (Vec<u8>, usize, usize) {
        let serializer = ObjectSerializer::compact();
        let mut body = Vec::with_capacity(self.calculator.placeholder_size() + 512);

        body.extend_from_slice(b"<< /Type /Sig /Filter /Adobe.PPKLite /SubFilter /");
        body.extend_from_slice(SignatureSubFilter::Pkcs7Detached.as_pdf_name().as_bytes());
        body.extend_from_slice(b" /ByteRange ");
        let byte_range_rel = body.len();
        body.extend_from_slice(ByteRangeCalculator::byte_range_placeholder().as_bytes());
        body.extend_from_slice(b" /Contents ");
        let contents_rel = body.len();
        body.extend_from_slice(self.calculator.generate_placeholder().as_bytes());

        let entries = [
            ("Name", metadata.name.as_deref()),
            ("Reason", metadata.reason.as_deref()),
            ("Location", metadata.location.as_deref()),
            ("ContactInfo", metadata.contact_info.as_deref()),
        ];
        for (key, value) in entries {
            if let Some(value) = value {
                body.extend_from_slice(format!(" /{} ", key).as_bytes());
                serializer.write_object(&mut body, &Object::text(value));
            }
        }
        body.extend_from_slice(b" /M ");
        serializer.write_object(&mut body, &Object::text(pdf_date(&metadata.signing_time)));
        body.extend_from_slice(b" >>");

        (body, byte_range_rel, contents_rel)
    }

    /// Queue the signature dictionary as `sig_ref` in `update`.
    pub fn reserve(
        &self,
        update: &mut IncrementalUpdate<'_>,
        sig_ref: ObjectRef,
        metadata: &SignatureMetadata,
    ) -> PendingPlaceholder {
        let (body, byte_range_rel, contents_rel) = self.signature_dictionary(metadata);
        update.set_raw(sig_ref, body);
        PendingPlaceholder {
            sig_ref,
            byte_range_rel,
            contents_rel,
        }
    }

    /// Compute the true ByteRange of a laid-out update and patch it in place.
    pub fn finalize(
        &self,
        output: &mut UpdateOutput,
        pending: &PendingPlaceholder,
    ) -> Result<SignaturePlaceholder> {
        let span = output.span(pending.sig_ref).copied().ok_or_else(|| {
            Error::InvalidPdf(format!("signature dictionary {} was not written", pending.sig_ref))
        })?;
        let byte_range_offset = span.body_offset + pending.byte_range_rel;
        let contents_offset = span.body_offset + pending.contents_rel;

        let total = output.bytes.len();
        let byte_range = self.calculator.calculate_byte_range(total, contents_offset);
        ByteRangeCalculator::patch_byte_range(&mut output.bytes, byte_range_offset, &byte_range)?;
        ByteRangeCalculator::validate_byte_range(&byte_range, output.bytes.len())?;

        let placeholder = SignaturePlaceholder {
            sig_ref: pending.sig_ref,
            byte_range,
            byte_range_span: Span {
                offset: byte_range_offset,
                len: BYTE_RANGE_WIDTH,
            },
            contents: Span {
                offset: contents_offset,
                len: self.calculator.placeholder_size(),
            },
        };
        log::debug!(
            "Placeholder for {}: ByteRange {:?}, slot {}..{}",
            placeholder.sig_ref,
            placeholder.byte_range,
            placeholder.contents.offset,
            placeholder.contents.end()
        );
        Ok(placeholder)
    }

    /// Append a bare signature dictionary to `doc` and lay out its slot.
    ///
    /// The dictionary is not attached to any field; callers that need a
    /// visible signature queue their own objects through
    /// [`reserve`](Self::reserve) and [`finalize`](Self::finalize).
    pub fn allocate(&self, doc: &PdfDocument, metadata: &SignatureMetadata) -> Result<PreparedDocument> {
        let mut update = IncrementalUpdate::new(doc);
        let sig_ref = update.reserve_id();
        let pending = self.reserve(&mut update, sig_ref, metadata);
        let mut output = update.write()?;
        let placeholder = self.finalize(&mut output, &pending)?;
        Ok(PreparedDocument {
            bytes: output.bytes,
            placeholder,
            spans: output.spans,
        })
    }

    /// Digest of everything but the slot.
    pub fn digest(
        &self,
        bytes: &[u8],
        placeholder: &SignaturePlaceholder,
        algorithm: DigestAlgorithm,
    ) -> Result<Vec<u8>> {
        ByteRangeCalculator::digest_byte_range(bytes, &placeholder.byte_range, algorithm)
    }

    /// Write the DER signature into the slot.
    pub fn fill(&self, bytes: &mut [u8], placeholder: &SignaturePlaceholder, signature: &[u8]) -> Result<()> {
        self.calculator
            .insert_signature(bytes, placeholder.contents.offset, signature)
    }
}
