//! Appearance stream of the visible signature label.
//!
//! Text is set in the standard Helvetica font with WinAnsiEncoding, so no
//! font program needs embedding. Widths come from the Helvetica AFM metrics.

use crate::geometry::Rect;
use crate::object::{Dictionary, Object, ObjectRef};
use crate::writer::format_real;

/// Helvetica ascender, in 1/1000 em.
pub const HELVETICA_ASCENT: f32 = 718.0;
/// Helvetica descender, in 1/1000 em.
pub const HELVETICA_DESCENT: f32 = -207.0;
/// Baseline-to-baseline distance as a multiple of the font size.
pub const LINE_HEIGHT_FACTOR: f32 = 1.2;
/// Resource name of the font inside the appearance stream.
pub const FONT_RESOURCE: &str = "Helv";

/// Smallest font size the layout shrinks to.
const MIN_FONT_SIZE: f32 = 1.0;

/// Widths of WinAnsi codes 32..=126.
#[rustfmt::skip]
const ASCII_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // space../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 0..?
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // @..O
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // P.._
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // `..o
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,      // p..~
];

/// Widths of WinAnsi codes 128..=255 (0 for unused codes).
#[rustfmt::skip]
const HIGH_WIDTHS: [u16; 128] = [
    556, 0, 222, 556, 333, 1000, 556, 556, 333, 1000, 667, 333, 1000, 0, 611, 0,       // 0x80
    0, 222, 222, 333, 333, 350, 556, 1000, 333, 1000, 500, 333, 944, 0, 500, 667,      // 0x90
    278, 333, 556, 556, 556, 556, 260, 556, 333, 737, 370, 556, 584, 333, 737, 333,    // 0xA0
    400, 584, 333, 333, 333, 556, 537, 278, 333, 333, 365, 556, 834, 834, 834, 611,    // 0xB0
    667, 667, 667, 667, 667, 667, 1000, 722, 667, 667, 667, 667, 278, 278, 278, 278,   // 0xC0
    722, 722, 778, 778, 778, 778, 778, 584, 778, 722, 722, 722, 722, 667, 667, 611,    // 0xD0
    556, 556, 556, 556, 556, 556, 889, 500, 556, 556, 556, 556, 278, 278, 278, 278,    // 0xE0
    556, 556, 556, 556, 556, 556, 556, 584, 611, 556, 556, 556, 556, 500, 556, 500,    // 0xF0
];

/// Map a character to its WinAnsiEncoding code.
pub fn win_ansi_code(ch: char) -> Option<u8> {
    let code = ch as u32;
    match code {
        0x20..=0x7E | 0xA0..=0xFF => Some(code as u8),
        _ => {
            let byte = match ch {
                '\u{20AC}' => 0x80,
                '\u{201A}' => 0x82,
                '\u{0192}' => 0x83,
                '\u{201E}' => 0x84,
                '\u{2026}' => 0x85,
                '\u{2020}' => 0x86,
                '\u{2021}' => 0x87,
                '\u{02C6}' => 0x88,
                '\u{2030}' => 0x89,
                '\u{0160}' => 0x8A,
                '\u{2039}' => 0x8B,
                '\u{0152}' => 0x8C,
                '\u{017D}' => 0x8E,
                '\u{2018}' => 0x91,
                '\u{2019}' => 0x92,
                '\u{201C}' => 0x93,
                '\u{201D}' => 0x94,
                '\u{2022}' => 0x95,
                '\u{2013}' => 0x96,
                '\u{2014}' => 0x97,
                '\u{02DC}' => 0x98,
                '\u{2122}' => 0x99,
                '\u{0161}' => 0x9A,
                '\u{203A}' => 0x9B,
                '\u{0153}' => 0x9C,
                '\u{017E}' => 0x9E,
                '\u{0178}' => 0x9F,
                _ => return None,
            };
            Some(byte)
        },
    }
}

/// Encode text as WinAnsi, replacing unmappable characters with `?`.
///
/// ```
/// # use pdf_seal::writer::encode_win_ansi;
/// assert_eq!(encode_win_ansi("Café"), b"Caf\xe9");
/// assert_eq!(encode_win_ansi("签名"), b"??");
/// ```
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .filter(|c| *c != '\n' && *c != '\r')
        .map(|c| win_ansi_code(c).unwrap_or(b'?'))
        .collect()
}

/// Advance width of one WinAnsi code, in 1/1000 em.
pub fn glyph_width(code: u8) -> f32 {
    let width = match code {
        0x20..=0x7E => ASCII_WIDTHS[(code - 0x20) as usize],
        0x80..=0xFF => HIGH_WIDTHS[(code - 0x80) as usize],
        _ => 0,
    };
    width as f32
}

/// Width of encoded text at `font_size`, in document units.
pub fn text_width(encoded: &[u8], font_size: f32) -> f32 {
    encoded.iter().map(|&c| glyph_width(c)).sum::<f32>() * font_size / 1000.0
}

/// One positioned line of the label.
#[derive(Debug, Clone, PartialEq)]
pub struct LaidOutLine {
    /// WinAnsi-encoded text
    pub text: Vec<u8>,
    /// Baseline start, relative to the lower-left corner of the box
    pub x: f32,
    /// Baseline y, relative to the lower-left corner of the box
    pub y: f32,
}

/// Result of [`layout_label`].
#[derive(Debug, Clone, PartialEq)]
pub struct LabelLayout {
    /// Font size actually used (may be smaller than requested)
    pub font_size: f32,
    /// Lines from top to bottom
    pub lines: Vec<LaidOutLine>,
}

/// Stack `lines` inside a `width` x `height` box.
///
/// Lines are left aligned at `padding` and the block is centered
/// vertically. The font size shrinks when the widest line or the stacked
/// block does not fit.
pub fn layout_label(lines: &[&str], width: f32, height: f32, font_size: f32, padding: f32) -> LabelLayout {
    let encoded: Vec<Vec<u8>> = lines.iter().map(|l| encode_win_ansi(l)).collect();
    let padding = if width > 2.0 * padding && height > 2.0 * padding {
        padding.max(0.0)
    } else {
        0.0
    };
    let avail_w = width - 2.0 * padding;
    let avail_h = height - 2.0 * padding;

    let mut size = font_size.max(MIN_FONT_SIZE);
    let widest = encoded.iter().map(|l| text_width(l, 1.0)).fold(0.0f32, f32::max);
    if widest * size > avail_w && widest > 0.0 {
        size = avail_w / widest;
    }
    let line_count = encoded.len().max(1) as f32;
    if line_count * LINE_HEIGHT_FACTOR * size > avail_h {
        size = avail_h / (line_count * LINE_HEIGHT_FACTOR);
    }
    let size = size.max(MIN_FONT_SIZE);

    let line_height = LINE_HEIGHT_FACTOR * size;
    let block_height = line_count * line_height;
    let block_top = padding + (avail_h + block_height) / 2.0;
    let glyph_height = (HELVETICA_ASCENT - HELVETICA_DESCENT) / 1000.0 * size;
    let descent = -HELVETICA_DESCENT / 1000.0 * size;

    let lines = encoded
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let slot_bottom = block_top - (i as f32 + 1.0) * line_height;
            LaidOutLine {
                text,
                x: padding,
                y: slot_bottom + (line_height - glyph_height) / 2.0 + descent,
            }
        })
        .collect();

    LabelLayout {
        font_size: size,
        lines,
    }
}

fn push_literal(out: &mut Vec<u8>, text: &[u8]) {
    out.push(b'(');
    for &byte in text {
        match byte {
            b'(' | b')' | b'\\' => {
                out.push(b'\\');
                out.push(byte);
            },
            0x20..=0x7E => out.push(byte),
            _ => out.extend_from_slice(format!("\\{:03o}", byte).as_bytes()),
        }
    }
    out.push(b')');
}

/// Content stream operators drawing `layout` in black.
pub fn content_stream(layout: &LabelLayout) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"q\nBT\n0 g\n");
    out.extend_from_slice(
        format!("/{} {} Tf\n", FONT_RESOURCE, format_real(layout.font_size as f64)).as_bytes(),
    );
    for line in &layout.lines {
        out.extend_from_slice(
            format!(
                "1 0 0 1 {} {} Tm\n",
                format_real(line.x as f64),
                format_real(line.y as f64)
            )
            .as_bytes(),
        );
        push_literal(&mut out, &line.text);
        out.extend_from_slice(b" Tj\n");
    }
    out.extend_from_slice(b"ET\nQ");
    out
}

/// Simple font dictionary of standard Helvetica.
pub fn helvetica_font() -> Object {
    let mut dict = Dictionary::new();
    dict.insert("Type".to_string(), Object::name("Font"));
    dict.insert("Subtype".to_string(), Object::name("Type1"));
    dict.insert("BaseFont".to_string(), Object::name("Helvetica"));
    dict.insert("Encoding".to_string(), Object::name("WinAnsiEncoding"));
    Object::Dictionary(dict)
}

/// Form XObject rendering `layout` in a box the size of `rect`.
pub fn appearance_stream(layout: &LabelLayout, rect: &Rect, font_ref: ObjectRef) -> Object {
    let mut fonts = Dictionary::new();
    fonts.insert(FONT_RESOURCE.to_string(), Object::Reference(font_ref));
    let mut resources = Dictionary::new();
    resources.insert("Font".to_string(), Object::Dictionary(fonts));

    let mut dict = Dictionary::new();
    dict.insert("Type".to_string(), Object::name("XObject"));
    dict.insert("Subtype".to_string(), Object::name("Form"));
    dict.insert(
        "BBox".to_string(),
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(rect.width as f64),
            Object::Real(rect.height as f64),
        ]),
    );
    dict.insert("Resources".to_string(), Object::Dictionary(resources));

    Object::Stream {
        dict,
        data: bytes::Bytes::from(content_stream(layout)),
    }
}
