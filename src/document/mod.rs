//! Read-only structural view over a PDF file.
//!
//! [`PdfDocument`] keeps the original bytes untouched and resolves objects on
//! demand through the cross-reference data. It exposes just enough structure
//! for an incremental update: trailer, catalog and the ordered page list.

mod pages;
pub mod xref;

pub use pages::PageInfo;
pub use xref::{CrossRefTable, XrefEntry, XrefFlavor};

use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::parser::{parse_indirect_object, parse_object};
use std::path::Path;

/// Depth limit when following chains of references.
const MAX_RESOLVE_DEPTH: usize = 32;

/// A parsed PDF file.
#[derive(Debug, Clone)]
pub struct PdfDocument {
    data: Vec<u8>,
    xref: CrossRefTable,
    pages: Vec<PageInfo>,
}

impl PdfDocument {
    /// Read and parse a document from disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| Error::io(path, e))?;
        Self::parse(data)
    }

    /// Parse a document held in memory.
    ///
    /// Encrypted documents are rejected: an incremental update would have to
    /// encrypt its own objects.
    pub fn parse(data: Vec<u8>) -> Result<Self> {
        if !data.starts_with(b"%PDF-") {
            // Some producers put junk before the header; only warn
            if !data.windows(5).take(1024).any(|w| w == b"%PDF-") {
                return Err(Error::InvalidPdf("missing %PDF- header".to_string()));
            }
            log::warn!("PDF header is not at offset 0");
        }

        let xref = CrossRefTable::parse(&data)?;
        if xref.trailer().contains_key("Encrypt") {
            return Err(Error::InvalidPdf("encrypted documents are not supported".to_string()));
        }

        let mut doc = Self {
            data,
            xref,
            pages: Vec::new(),
        };
        doc.pages = pages::collect_pages(&doc)?;
        log::debug!(
            "Parsed document: {} bytes, {} pages, {:?} xref",
            doc.data.len(),
            doc.pages.len(),
            doc.xref.flavor()
        );
        Ok(doc)
    }

    /// Original file bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume the document, returning the original bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Merged cross-reference data.
    pub fn xref(&self) -> &CrossRefTable {
        &self.xref
    }

    /// Trailer dictionary of the newest section.
    pub fn trailer(&self) -> &Dictionary {
        self.xref.trailer()
    }

    /// Reference to the document catalog.
    pub fn catalog_ref(&self) -> Result<ObjectRef> {
        self.trailer()
            .get("Root")
            .and_then(|o| o.as_reference())
            .ok_or_else(|| Error::InvalidPdf("trailer has no /Root reference".to_string()))
    }

    /// The document catalog dictionary.
    pub fn catalog(&self) -> Result<Dictionary> {
        let root = self.catalog_ref()?;
        match self.resolve(root)? {
            Object::Dictionary(d) => Ok(d),
            other => Err(Error::InvalidPdf(format!(
                "catalog {} is a {}",
                root,
                other.type_name()
            ))),
        }
    }

    /// Pages in document order.
    pub fn pages(&self) -> &[PageInfo] {
        &self.pages
    }

    /// Number of pages.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Page by zero-based index.
    pub fn page(&self, index: usize) -> Result<&PageInfo> {
        self.pages.get(index).ok_or(Error::InvalidPage {
            index,
            page_count: self.pages.len(),
        })
    }

    /// Load an indirect object.
    pub fn resolve(&self, obj_ref: ObjectRef) -> Result<Object> {
        match self.xref.get(obj_ref.id) {
            Some(XrefEntry::InUse { offset, gen }) => {
                if gen != obj_ref.gen {
                    log::warn!("{} requested but xref lists generation {}", obj_ref, gen);
                }
                let resolve_length = |r: ObjectRef| {
                    self.resolve(r).ok().and_then(|o| o.as_integer())
                };
                let (found, object) = parse_indirect_object(&self.data, offset, &resolve_length)?;
                if found.id != obj_ref.id {
                    return Err(Error::ParseError {
                        offset,
                        reason: format!("expected object {}, found {}", obj_ref, found),
                    });
                }
                Ok(object)
            },
            Some(XrefEntry::Compressed { stream_id, index }) => {
                self.resolve_compressed(obj_ref, stream_id, index)
            },
            Some(XrefEntry::Free) => Ok(Object::Null),
            None => Err(Error::ObjectNotFound(obj_ref.id, obj_ref.gen)),
        }
    }

    /// Follow references until a direct object is reached.
    pub fn resolve_object(&self, object: &Object) -> Result<Object> {
        let mut current = object.clone();
        for _ in 0..MAX_RESOLVE_DEPTH {
            match current {
                Object::Reference(r) => current = self.resolve(r)?,
                other => return Ok(other),
            }
        }
        Err(Error::InvalidPdf("reference chain too deep".to_string()))
    }

    /// Resolve a dictionary entry that may be an indirect reference.
    pub fn get_resolved(&self, dict: &Dictionary, key: &str) -> Result<Option<Object>> {
        dict.get(key).map(|o| self.resolve_object(o)).transpose()
    }

    fn resolve_compressed(&self, obj_ref: ObjectRef, stream_id: u32, index: u32) -> Result<Object> {
        let stream_ref = ObjectRef::new(stream_id, 0);
        if let Some(XrefEntry::Compressed { .. }) = self.xref.get(stream_id) {
            return Err(Error::InvalidPdf(format!("object stream {} is itself compressed", stream_ref)));
        }
        let stream = self.resolve(stream_ref)?;
        let dict = stream
            .as_dict()
            .ok_or_else(|| Error::InvalidPdf(format!("{} is not an object stream", stream_ref)))?;

        let count = dict.get("N").and_then(|o| o.as_integer()).unwrap_or(0);
        let first = dict
            .get("First")
            .and_then(|o| o.as_integer())
            .and_then(|f| usize::try_from(f).ok())
            .ok_or_else(|| Error::InvalidPdf(format!("{} has no /First", stream_ref)))?;
        let decoded = stream.decode_stream_data()?;

        // Header: N pairs of "object-number offset"
        let mut header = decoded.get(..first).unwrap_or(&decoded[..]);
        let mut offsets = Vec::new();
        for _ in 0..count {
            let (rest, id) = parse_object(header)
                .map_err(|_| Error::InvalidPdf(format!("bad header in {}", stream_ref)))?;
            let (rest, off) = parse_object(rest)
                .map_err(|_| Error::InvalidPdf(format!("bad header in {}", stream_ref)))?;
            header = rest;
            match (id.as_integer(), off.as_integer()) {
                (Some(id), Some(off)) if off >= 0 => offsets.push((id, off as usize)),
                _ => return Err(Error::InvalidPdf(format!("bad header in {}", stream_ref))),
            }
        }

        // The index is a hint; the header is authoritative for the number
        let position = offsets
            .iter()
            .position(|(id, _)| *id == obj_ref.id as i64)
            .or_else(|| Some(index as usize).filter(|i| *i < offsets.len()))
            .ok_or(Error::ObjectNotFound(obj_ref.id, obj_ref.gen))?;
        let start = first + offsets[position].1;
        let body = decoded
            .get(start..)
            .ok_or_else(|| Error::InvalidPdf(format!("offset outside {}", stream_ref)))?;
        let (_, object) = parse_object(body).map_err(|_| Error::ParseError {
            offset: start,
            reason: format!("malformed {} in {}", obj_ref, stream_ref),
        })?;
        Ok(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_pdf(objects: &[&str], extra_trailer: &str) -> Vec<u8> {
        let mut pdf = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (i, body) in objects.iter().enumerate() {
            offsets.push(pdf.len());
            pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
        }
        let xref = pdf.len();
        pdf.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
        for off in offsets {
            pdf.extend_from_slice(format!("{:010} 00000 n \n", off).as_bytes());
        }
        pdf.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R {} >>\nstartxref\n{}\n%%EOF\n",
                objects.len() + 1,
                extra_trailer,
                xref
            )
            .as_bytes(),
        );
        pdf
    }

    fn two_page_pdf() -> Vec<u8> {
        build_pdf(
            &[
                "<< /Type /Catalog /Pages 2 0 R >>",
                "<< /Type /Pages /Kids [3 0 R 4 0 R] /Count 2 /MediaBox [0 0 612 792] >>",
                "<< /Type /Page /Parent 2 0 R >>",
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 595 842] >>",
            ],
            "",
        )
    }

    #[test]
    fn test_parse_and_page_count() {
        let doc = PdfDocument::parse(two_page_pdf()).unwrap();
        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.catalog_ref().unwrap(), ObjectRef::new(1, 0));
        assert_eq!(doc.catalog().unwrap()["Type"], Object::name("Catalog"));
    }

    #[test]
    fn test_inherited_media_box() {
        let doc = PdfDocument::parse(two_page_pdf()).unwrap();
        assert_eq!(doc.page(0).unwrap().media_box.width, 612.0);
        assert_eq!(doc.page(1).unwrap().media_box.height, 842.0);
        assert_eq!(doc.page(1).unwrap().obj_ref, ObjectRef::new(4, 0));
    }

    #[test]
    fn test_page_out_of_range() {
        let doc = PdfDocument::parse(two_page_pdf()).unwrap();
        let err = doc.page(2).unwrap_err();
        assert!(matches!(err, Error::InvalidPage { index: 2, page_count: 2 }));
    }

    #[test]
    fn test_encrypted_document_rejected() {
        let pdf = build_pdf(
            &[
                "<< /Type /Catalog /Pages 2 0 R >>",
                "<< /Type /Pages /Kids [] /Count 0 >>",
            ],
            "/Encrypt << /Filter /Standard >>",
        );
        let err = PdfDocument::parse(pdf).unwrap_err();
        assert!(matches!(err, Error::InvalidPdf(msg) if msg.contains("encrypted")));
    }

    #[test]
    fn test_not_a_pdf() {
        assert!(PdfDocument::parse(b"hello world".to_vec()).is_err());
    }

    #[test]
    fn test_missing_object() {
        let doc = PdfDocument::parse(two_page_pdf()).unwrap();
        assert!(matches!(doc.resolve(ObjectRef::new(42, 0)), Err(Error::ObjectNotFound(42, 0))));
    }

    #[test]
    fn test_object_stream_resolution() {
        use flate2::write::ZlibEncoder;
        use flate2::Compression;
        use std::io::Write;

        // Objects 2..4 live in object stream 5
        let objects = "2 0 3 60 4 92 ";
        let first = objects.len();
        let body = format!(
            "{}{:<60}{:<32}{}",
            objects,
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
            "<< /Type /Page /Parent 2 0 R >>",
            "[0 0 300 400]"
        );
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(body.as_bytes()).unwrap();
        let compressed = encoder.finish().unwrap();

        let mut pdf = b"%PDF-1.5\n".to_vec();
        let obj1 = pdf.len();
        pdf.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");
        let obj5 = pdf.len();
        pdf.extend_from_slice(
            format!(
                "5 0 obj\n<< /Type /ObjStm /N 3 /First {} /Filter /FlateDecode /Length {} >>\nstream\n",
                first,
                compressed.len()
            )
            .as_bytes(),
        );
        pdf.extend_from_slice(&compressed);
        pdf.extend_from_slice(b"\nendstream\nendobj\n");
        let xref = pdf.len();
        let mut rows: Vec<u8> = Vec::new();
        let in_use = |off: usize| [1u8, (off >> 8) as u8, off as u8];
        rows.extend_from_slice(&[0, 0, 0]);
        rows.extend_from_slice(&in_use(obj1));
        rows.extend_from_slice(&[2, 0, 5]);
        rows.extend_from_slice(&[2, 0, 5]);
        rows.extend_from_slice(&[2, 0, 5]);
        rows.extend_from_slice(&in_use(obj5));
        rows.extend_from_slice(&in_use(xref));
        pdf.extend_from_slice(
            format!(
                "6 0 obj\n<< /Type /XRef /Size 7 /W [1 2 0] /Root 1 0 R /Length {} >>\nstream\n",
                rows.len()
            )
            .as_bytes(),
        );
        pdf.extend_from_slice(&rows);
        pdf.extend_from_slice(b"\nendstream\nendobj\n");
        pdf.extend_from_slice(format!("startxref\n{}\n%%EOF\n", xref).as_bytes());

        let doc = PdfDocument::parse(pdf).unwrap();
        assert_eq!(doc.xref().flavor(), XrefFlavor::Stream);
        assert_eq!(doc.page_count(), 1);
        assert_eq!(doc.resolve(ObjectRef::new(4, 0)).unwrap().as_array().unwrap().len(), 4);
        assert_eq!(doc.page(0).unwrap().obj_ref, ObjectRef::new(3, 0));
    }
}
