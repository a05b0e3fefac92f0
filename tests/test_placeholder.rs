//! Integration tests for the signature placeholder and ByteRange layout.

mod common;

use pdf_seal::signatures::{
    ByteRangeCalculator, DigestAlgorithm, SignatureMetadata, SignaturePlaceholderAllocator,
};
use pdf_seal::{PdfDocument, SealConfig};

fn allocator() -> SignaturePlaceholderAllocator {
    SignaturePlaceholderAllocator::new(SealConfig::default().reserved_signature_size)
}

#[test]
fn test_byte_range_excludes_slot_of_1000_byte_document() {
    common::init_logging();
    let original = common::classic_pdf_of_len(1000);
    assert_eq!(original.len(), 1000);

    let doc = PdfDocument::parse(original.clone()).unwrap();
    let prepared = allocator().allocate(&doc, &SignatureMetadata::default()).unwrap();
    let [start, first_len, second_start, second_len] = prepared.placeholder.byte_range;
    let slot = prepared.placeholder.contents;

    assert_eq!(start, 0);
    assert_eq!(first_len as usize, slot.offset);
    assert_eq!(second_start as usize, slot.end());
    assert_eq!((second_start + second_len) as usize, prepared.bytes.len());
    assert!(slot.offset > original.len());

    assert_eq!(prepared.bytes[slot.offset], b'<');
    assert_eq!(prepared.bytes[slot.end() - 1], b'>');
    assert!(prepared.bytes[slot.offset + 1..slot.end() - 1]
        .iter()
        .all(|&b| b == b'0'));
    assert!(prepared.bytes.starts_with(&original));
}

#[test]
fn test_patched_byte_range_text_matches_layout() {
    let doc = PdfDocument::parse(common::classic_pdf(&common::ONE_PAGE)).unwrap();
    let prepared = allocator().allocate(&doc, &SignatureMetadata::default()).unwrap();

    let span = prepared.placeholder.byte_range_span;
    let text = std::str::from_utf8(&prepared.bytes[span.offset..span.end()]).unwrap();
    let numbers: Vec<i64> = text
        .trim_matches(|c| c == '[' || c == ']' || c == ' ')
        .split_whitespace()
        .map(|n| n.parse().unwrap())
        .collect();
    assert_eq!(numbers, prepared.placeholder.byte_range.to_vec());
    ByteRangeCalculator::validate_byte_range(&prepared.placeholder.byte_range, prepared.bytes.len())
        .unwrap();
}

#[test]
fn test_digest_ignores_slot_contents() {
    let doc = PdfDocument::parse(common::classic_pdf(&common::ONE_PAGE)).unwrap();
    let allocator = allocator();
    let prepared = allocator.allocate(&doc, &SignatureMetadata::default()).unwrap();

    let before = allocator
        .digest(&prepared.bytes, &prepared.placeholder, DigestAlgorithm::Sha256)
        .unwrap();
    let mut filled = prepared.bytes.clone();
    allocator
        .fill(&mut filled, &prepared.placeholder, &[0x30, 0x03, 0x02, 0x01, 0x01])
        .unwrap();
    assert_ne!(filled, prepared.bytes);

    let after = allocator
        .digest(&filled, &prepared.placeholder, DigestAlgorithm::Sha256)
        .unwrap();
    assert_eq!(before, after);
    assert_eq!(after.len(), 32);
}

#[test]
fn test_oversized_signature_rejected() {
    let doc = PdfDocument::parse(common::classic_pdf(&common::ONE_PAGE)).unwrap();
    let allocator = SignaturePlaceholderAllocator::new(16);
    let prepared = allocator.allocate(&doc, &SignatureMetadata::default()).unwrap();

    let mut bytes = prepared.bytes.clone();
    let err = allocator
        .fill(&mut bytes, &prepared.placeholder, &[0xAB; 17])
        .unwrap_err();
    assert_eq!(err.kind(), pdf_seal::ErrorKind::PlaceholderTooSmall);
    assert_eq!(bytes, prepared.bytes);
}

#[test]
fn test_placeholder_on_xref_stream_document() {
    let original = common::xref_stream_pdf(&common::ONE_PAGE);
    let doc = PdfDocument::parse(original.clone()).unwrap();
    let prepared = allocator().allocate(&doc, &SignatureMetadata::default()).unwrap();

    assert!(prepared.bytes.starts_with(&original));
    let reparsed = PdfDocument::parse(prepared.bytes.clone()).unwrap();
    assert!(reparsed.resolve(prepared.placeholder.sig_ref).is_ok());
}
