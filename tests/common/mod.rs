//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

/// Objects of a minimal one-page document, numbered from 1.
pub const ONE_PAGE: [&str; 3] = [
    "<< /Type /Catalog /Pages 2 0 R >>",
    "<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
    "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>",
];

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn signer_bundle() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/test_signer.p12")
}

fn write_objects(pdf: &mut Vec<u8>, objects: &[&str]) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }
    offsets
}

/// Document with a classic `xref` table and `padding` comment bytes before it.
pub fn classic_pdf_padded(objects: &[&str], padding: usize) -> Vec<u8> {
    let mut pdf = b"%PDF-1.4\n".to_vec();
    let offsets = write_objects(&mut pdf, objects);
    if padding > 0 {
        pdf.push(b'%');
        pdf.extend(std::iter::repeat(b'x').take(padding.saturating_sub(2)));
        pdf.push(b'\n');
    }

    let xref = pdf.len();
    pdf.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for offset in offsets {
        pdf.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    pdf.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref
        )
        .as_bytes(),
    );
    pdf
}

pub fn classic_pdf(objects: &[&str]) -> Vec<u8> {
    classic_pdf_padded(objects, 0)
}

/// One-page classic document of exactly `len` bytes.
pub fn classic_pdf_of_len(len: usize) -> Vec<u8> {
    let base = classic_pdf(&ONE_PAGE).len();
    assert!(len >= base + 2, "{} bytes is too short for the fixture", len);
    let mut padding = len - base;
    loop {
        let pdf = classic_pdf_padded(&ONE_PAGE, padding);
        match pdf.len().cmp(&len) {
            std::cmp::Ordering::Equal => return pdf,
            std::cmp::Ordering::Greater => padding -= pdf.len() - len,
            std::cmp::Ordering::Less => padding += len - pdf.len(),
        }
    }
}

/// Document whose cross-reference section is an uncompressed xref stream.
pub fn xref_stream_pdf(objects: &[&str]) -> Vec<u8> {
    let mut pdf = b"%PDF-1.5\n".to_vec();
    let offsets = write_objects(&mut pdf, objects);
    let xref = pdf.len();
    let xref_id = objects.len() + 1;

    let mut rows = vec![0u8, 0, 0, 0, 0, 0xFF, 0xFF];
    for offset in offsets.iter().copied().chain(std::iter::once(xref)) {
        rows.push(1);
        rows.extend_from_slice(&(offset as u32).to_be_bytes());
        rows.extend_from_slice(&[0, 0]);
    }
    pdf.extend_from_slice(
        format!(
            "{} 0 obj\n<< /Type /XRef /Size {} /W [1 4 2] /Root 1 0 R /Length {} >>\nstream\n",
            xref_id,
            xref_id + 1,
            rows.len()
        )
        .as_bytes(),
    );
    pdf.extend_from_slice(&rows);
    pdf.extend_from_slice(b"\nendstream\nendobj\n");
    pdf.extend_from_slice(format!("startxref\n{}\n%%EOF\n", xref).as_bytes());
    pdf
}

pub fn write_pdf(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}
