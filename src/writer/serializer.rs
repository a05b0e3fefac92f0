//! PDF object serialization.
//!
//! Serializes [`Object`] values to their byte representation. Output goes
//! into a `Vec<u8>`, so writing cannot fail. Dictionary entries are written
//! in insertion order, which keeps objects copied from the input recognizable
//! in the update section.

use crate::object::{Dictionary, Object, ObjectRef};

/// Serializer for PDF objects.
#[derive(Debug, Clone, Default)]
pub struct ObjectSerializer {
    /// Whether to use compact formatting (minimal whitespace)
    compact: bool,
}

impl ObjectSerializer {
    /// Create a new object serializer with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a compact serializer (minimal whitespace).
    pub fn compact() -> Self {
        Self { compact: true }
    }

    /// Serialize an object to bytes.
    pub fn serialize(&self, obj: &Object) -> Vec<u8> {
        let mut buf = Vec::new();
        self.write_object(&mut buf, obj);
        buf
    }

    /// Serialize an object to a string (for debugging).
    pub fn serialize_to_string(&self, obj: &Object) -> String {
        String::from_utf8_lossy(&self.serialize(obj)).into_owned()
    }

    /// Serialize an indirect object definition.
    ///
    /// Format: `{id} {gen} obj\n{object}\nendobj\n`
    pub fn serialize_indirect(&self, obj_ref: ObjectRef, obj: &Object) -> Vec<u8> {
        let mut buf = Vec::new();
        self.write_indirect(&mut buf, obj_ref, obj);
        buf
    }

    /// Append an indirect object definition to `buf`.
    pub fn write_indirect(&self, buf: &mut Vec<u8>, obj_ref: ObjectRef, obj: &Object) {
        buf.extend_from_slice(format!("{} {} obj\n", obj_ref.id, obj_ref.gen).as_bytes());
        self.write_object(buf, obj);
        buf.extend_from_slice(b"\nendobj\n");
    }

    /// Append the serialized form of `obj` to `buf`.
    pub fn write_object(&self, buf: &mut Vec<u8>, obj: &Object) {
        match obj {
            Object::Null => buf.extend_from_slice(b"null"),
            Object::Boolean(b) => buf.extend_from_slice(if *b { &b"true"[..] } else { &b"false"[..] }),
            Object::Integer(i) => buf.extend_from_slice(i.to_string().as_bytes()),
            Object::Real(r) => buf.extend_from_slice(format_real(*r).as_bytes()),
            Object::String(s) => write_string(buf, s),
            Object::Name(n) => write_name(buf, n),
            Object::Array(arr) => self.write_array(buf, arr),
            Object::Dictionary(dict) => self.write_dictionary(buf, dict),
            Object::Stream { dict, data } => self.write_stream(buf, dict, data),
            Object::Reference(r) => buf.extend_from_slice(r.to_string().as_bytes()),
        }
    }

    fn write_array(&self, buf: &mut Vec<u8>, arr: &[Object]) {
        buf.push(b'[');
        for (i, obj) in arr.iter().enumerate() {
            if i > 0 {
                buf.push(b' ');
            }
            self.write_object(buf, obj);
        }
        buf.push(b']');
    }

    fn write_dictionary(&self, buf: &mut Vec<u8>, dict: &Dictionary) {
        buf.extend_from_slice(b"<<");
        for (key, value) in dict {
            if self.compact {
                buf.push(b' ');
            } else {
                buf.extend_from_slice(b"\n  ");
            }
            write_name(buf, key);
            buf.push(b' ');
            self.write_object(buf, value);
        }
        if self.compact {
            buf.extend_from_slice(b" >>");
        } else {
            if !dict.is_empty() {
                buf.push(b'\n');
            }
            buf.extend_from_slice(b">>");
        }
    }

    fn write_stream(&self, buf: &mut Vec<u8>, dict: &Dictionary, data: &[u8]) {
        // /Length always reflects the data actually written
        let mut dict = dict.clone();
        dict.insert("Length".to_string(), Object::Integer(data.len() as i64));

        self.write_dictionary(buf, &dict);
        buf.extend_from_slice(b"\nstream\n");
        buf.extend_from_slice(data);
        buf.extend_from_slice(b"\nendstream");
    }
}

/// Format a real number with at most 5 decimals and no trailing zeros.
///
/// ```
/// # use pdf_seal::writer::format_real;
/// assert_eq!(format_real(612.0), "612");
/// assert_eq!(format_real(0.5), "0.5");
/// assert_eq!(format_real(1.0 / 3.0), "0.33333");
/// ```
pub fn format_real(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    if value.fract() == 0.0 {
        return format!("{}", value as i64);
    }
    let formatted = format!("{:.5}", value);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Literal syntax for printable ASCII, hex syntax otherwise.
fn write_string(buf: &mut Vec<u8>, data: &[u8]) {
    let is_printable = data
        .iter()
        .all(|&b| b == b'\n' || b == b'\r' || b == b'\t' || (0x20..=0x7E).contains(&b));

    if is_printable {
        buf.push(b'(');
        for &byte in data {
            match byte {
                b'(' => buf.extend_from_slice(b"\\("),
                b')' => buf.extend_from_slice(b"\\)"),
                b'\\' => buf.extend_from_slice(b"\\\\"),
                b'\n' => buf.extend_from_slice(b"\\n"),
                b'\r' => buf.extend_from_slice(b"\\r"),
                b'\t' => buf.extend_from_slice(b"\\t"),
                _ => buf.push(byte),
            }
        }
        buf.push(b')');
    } else {
        buf.push(b'<');
        buf.extend_from_slice(hex_upper(data).as_bytes());
        buf.push(b'>');
    }
}

/// Uppercase hex encoding.
pub(crate) fn hex_upper(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02X}", b)).collect()
}

/// Names start with `/`; delimiters, whitespace and non-ASCII bytes become `#xx`.
fn write_name(buf: &mut Vec<u8>, name: &str) {
    buf.push(b'/');
    for byte in name.bytes() {
        match byte {
            b'!'
            | b'"'
            | b'$'
            | b'&'
            | b'\''
            | b'*'..=b'.'
            | b'0'..=b'9'
            | b';'
            | b'='
            | b'?'
            | b'@'
            | b'A'..=b'Z'
            | b'^'..=b'z'
            | b'|'
            | b'~' => buf.push(byte),
            _ => buf.extend_from_slice(format!("#{:02X}", byte).as_bytes()),
        }
    }
}
