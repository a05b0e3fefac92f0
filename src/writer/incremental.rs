//! Incremental update writer.
//!
//! Appends new and replaced objects after the original bytes, followed by a
//! cross-reference section that links back to the previous one with
//! `/Prev`. The original bytes are never touched. Every object written is
//! recorded as an [`ObjectSpan`] so callers can locate and patch values in
//! the output by offset instead of searching for them.

use crate::document::{PdfDocument, XrefFlavor};
use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::writer::ObjectSerializer;
use std::collections::BTreeMap;

/// Position of one written object in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectSpan {
    /// Object written
    pub obj_ref: ObjectRef,
    /// Offset of the `id gen obj` header
    pub offset: usize,
    /// Offset of the first byte after `obj\n`
    pub body_offset: usize,
    /// Length of the whole definition, through `endobj\n`
    pub len: usize,
}

/// Result of [`IncrementalUpdate::write`].
#[derive(Debug, Clone)]
pub struct UpdateOutput {
    /// Original bytes followed by the update section
    pub bytes: Vec<u8>,
    /// Spans of the objects written, in object number order
    pub spans: Vec<ObjectSpan>,
    /// Offset of the new cross-reference section
    pub xref_offset: usize,
}

impl UpdateOutput {
    /// Span of a written object.
    pub fn span(&self, obj_ref: ObjectRef) -> Option<&ObjectSpan> {
        self.spans.iter().find(|s| s.obj_ref == obj_ref)
    }
}

#[derive(Debug, Clone)]
enum PendingObject {
    Object(Object),
    /// Pre-serialized body, written verbatim between `obj` and `endobj`
    Raw(Vec<u8>),
}

/// Builder of one incremental update section.
#[derive(Debug)]
pub struct IncrementalUpdate<'a> {
    doc: &'a PdfDocument,
    next_id: u32,
    objects: BTreeMap<ObjectRef, PendingObject>,
    serializer: ObjectSerializer,
}

impl<'a> IncrementalUpdate<'a> {
    /// Start an update on top of `doc`.
    pub fn new(doc: &'a PdfDocument) -> Self {
        Self {
            doc,
            next_id: doc.xref().size().max(1),
            objects: BTreeMap::new(),
            serializer: ObjectSerializer::new(),
        }
    }

    /// Allocate a fresh object number.
    pub fn reserve_id(&mut self) -> ObjectRef {
        let obj_ref = ObjectRef::new(self.next_id, 0);
        self.next_id += 1;
        obj_ref
    }

    /// Add or replace an object.
    pub fn set_object(&mut self, obj_ref: ObjectRef, object: Object) {
        self.objects.insert(obj_ref, PendingObject::Object(object));
    }

    /// Add an object whose body is already serialized.
    pub fn set_raw(&mut self, obj_ref: ObjectRef, body: Vec<u8>) {
        self.objects.insert(obj_ref, PendingObject::Raw(body));
    }

    /// Number of objects queued.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Produce the updated file.
    pub fn write(mut self) -> Result<UpdateOutput> {
        if self.objects.is_empty() {
            return Err(Error::InvalidPdf("incremental update without objects".to_string()));
        }

        let original = self.doc.bytes();
        let mut bytes = Vec::with_capacity(original.len() + 16 * 1024);
        bytes.extend_from_slice(original);
        if !bytes.ends_with(b"\n") {
            bytes.push(b'\n');
        }

        let mut spans = Vec::with_capacity(self.objects.len() + 1);
        for (obj_ref, pending) in &self.objects {
            let offset = bytes.len();
            let header = format!("{} {} obj\n", obj_ref.id, obj_ref.gen);
            bytes.extend_from_slice(header.as_bytes());
            let body_offset = bytes.len();
            match pending {
                PendingObject::Object(object) => self.serializer.write_object(&mut bytes, object),
                PendingObject::Raw(body) => bytes.extend_from_slice(body),
            }
            bytes.extend_from_slice(b"\nendobj\n");
            spans.push(ObjectSpan {
                obj_ref: *obj_ref,
                offset,
                body_offset,
                len: bytes.len() - offset,
            });
        }

        let prev = self.doc.xref().startxref();
        let xref_offset = bytes.len();
        match self.doc.xref().flavor() {
            XrefFlavor::Table => {
                let size = self.next_id;
                write_xref_table(&mut bytes, &spans);
                let trailer = self.trailer(size, prev);
                bytes.extend_from_slice(b"trailer\n");
                self.serializer.write_object(&mut bytes, &Object::Dictionary(trailer));
                bytes.push(b'\n');
            },
            XrefFlavor::Stream => {
                let stream_ref = self.reserve_id();
                let size = self.next_id;
                let mut entries = spans.clone();
                entries.push(ObjectSpan {
                    obj_ref: stream_ref,
                    offset: xref_offset,
                    body_offset: xref_offset,
                    len: 0,
                });
                let stream = self.xref_stream(&entries, size, prev);
                self.serializer.write_indirect(&mut bytes, stream_ref, &stream);
            },
        }

        bytes.extend_from_slice(format!("startxref\n{}\n%%EOF\n", xref_offset).as_bytes());
        log::debug!(
            "Incremental update: {} objects, xref at {}, {} -> {} bytes",
            spans.len(),
            xref_offset,
            original.len(),
            bytes.len()
        );

        Ok(UpdateOutput {
            bytes,
            spans,
            xref_offset,
        })
    }

    /// Trailer entries carried over from the previous section plus /Size and /Prev.
    fn trailer(&self, size: u32, prev: usize) -> Dictionary {
        let old = self.doc.trailer();
        let mut trailer = Dictionary::new();
        trailer.insert("Size".to_string(), Object::Integer(size as i64));
        for key in ["Root", "Info", "ID"] {
            if let Some(value) = old.get(key) {
                trailer.insert(key.to_string(), value.clone());
            }
        }
        trailer.insert("Prev".to_string(), Object::Integer(prev as i64));
        trailer
    }

    fn xref_stream(&self, entries: &[ObjectSpan], size: u32, prev: usize) -> Object {
        let mut dict = Dictionary::new();
        dict.insert("Type".to_string(), Object::name("XRef"));
        for (key, value) in self.trailer(size, prev) {
            dict.insert(key, value);
        }

        let mut index = Vec::new();
        for (first, count) in subsections(entries) {
            index.push(Object::Integer(first as i64));
            index.push(Object::Integer(count as i64));
        }
        dict.insert("Index".to_string(), Object::Array(index));
        dict.insert(
            "W".to_string(),
            Object::Array(vec![Object::Integer(1), Object::Integer(4), Object::Integer(2)]),
        );

        let mut data = Vec::with_capacity(entries.len() * 7);
        for entry in entries {
            data.push(1u8);
            data.extend_from_slice(&(entry.offset as u32).to_be_bytes());
            data.extend_from_slice(&entry.obj_ref.gen.to_be_bytes());
        }

        Object::Stream {
            dict,
            data: bytes::Bytes::from(data),
        }
    }
}

/// Runs of consecutive object numbers as `(first, count)`; input sorted by number.
fn subsections(entries: &[ObjectSpan]) -> Vec<(u32, u32)> {
    let mut runs: Vec<(u32, u32)> = Vec::new();
    for entry in entries {
        match runs.last_mut() {
            Some((first, count)) if *first + *count == entry.obj_ref.id => *count += 1,
            _ => runs.push((entry.obj_ref.id, 1)),
        }
    }
    runs
}

fn write_xref_table(bytes: &mut Vec<u8>, spans: &[ObjectSpan]) {
    bytes.extend_from_slice(b"xref\n");
    let mut remaining = spans;
    for (first, count) in subsections(spans) {
        bytes.extend_from_slice(format!("{} {}\n", first, count).as_bytes());
        let (run, rest) = remaining.split_at(count as usize);
        for span in run {
            // Each entry is exactly 20 bytes
            bytes.extend_from_slice(
                format!("{:010} {:05} n \n", span.offset, span.obj_ref.gen).as_bytes(),
            );
        }
        remaining = rest;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_pdf() -> Vec<u8> {
        let mut pdf = b"%PDF-1.4\n".to_vec();
        let o1 = pdf.len();
        pdf.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");
        let o2 = pdf.len();
        pdf.extend_from_slice(b"2 0 obj\n<< /Type /Pages /Kids [3 0 R] /Count 1 >>\nendobj\n");
        let o3 = pdf.len();
        pdf.extend_from_slice(
            b"3 0 obj\n<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>\nendobj\n",
        );
        let xref = pdf.len();
        pdf.extend_from_slice(b"xref\n0 4\n0000000000 65535 f \n");
        for off in [o1, o2, o3] {
            pdf.extend_from_slice(format!("{:010} 00000 n \n", off).as_bytes());
        }
        pdf.extend_from_slice(
            format!("trailer\n<< /Size 4 /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n", xref).as_bytes(),
        );
        pdf
    }

    #[test]
    fn test_subsections() {
        let span = |id| ObjectSpan {
            obj_ref: ObjectRef::new(id, 0),
            offset: 0,
            body_offset: 0,
            len: 0,
        };
        let spans = [span(3), span(4), span(5), span(9), span(11), span(12)];
        assert_eq!(subsections(&spans), vec![(3, 3), (9, 1), (11, 2)]);
    }

    #[test]
    fn test_update_preserves_original_and_reparses() {
        let original = minimal_pdf();
        let doc = PdfDocument::parse(original.clone()).unwrap();
        let mut update = IncrementalUpdate::new(&doc);

        let new_ref = update.reserve_id();
        assert_eq!(new_ref, ObjectRef::new(4, 0));
        update.set_object(new_ref, Object::text("hello"));

        let mut page = doc.page(0).unwrap().dict.clone();
        page.insert("Annots".to_string(), Object::Array(vec![Object::Reference(new_ref)]));
        update.set_object(ObjectRef::new(3, 0), Object::Dictionary(page));

        let output = update.write().unwrap();
        assert!(output.bytes.starts_with(&original));

        let span = output.span(new_ref).unwrap();
        assert!(output.bytes[span.offset..].starts_with(b"4 0 obj\n(hello)"));
        assert_eq!(&output.bytes[span.body_offset..span.body_offset + 7], b"(hello)");

        let reparsed = PdfDocument::parse(output.bytes).unwrap();
        assert_eq!(reparsed.xref().flavor(), XrefFlavor::Table);
        assert_eq!(reparsed.resolve(new_ref).unwrap(), Object::text("hello"));
        assert!(reparsed.page(0).unwrap().dict.contains_key("Annots"));
        assert_eq!(reparsed.trailer()["Size"], Object::Integer(5));
    }

    #[test]
    fn test_raw_body_written_verbatim() {
        let doc = PdfDocument::parse(minimal_pdf()).unwrap();
        let mut update = IncrementalUpdate::new(&doc);
        let r = update.reserve_id();
        update.set_raw(r, b"<< /Custom [0    0] >>".to_vec());
        let output = update.write().unwrap();
        let span = output.span(r).unwrap();
        assert_eq!(
            &output.bytes[span.body_offset..span.body_offset + 22],
            b"<< /Custom [0    0] >>"
        );
    }

    #[test]
    fn test_empty_update_rejected() {
        let doc = PdfDocument::parse(minimal_pdf()).unwrap();
        assert!(IncrementalUpdate::new(&doc).write().is_err());
    }
}
