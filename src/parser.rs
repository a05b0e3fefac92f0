//! PDF object parser.
//!
//! Combines lexer tokens into complete objects with a recursive descent:
//! read a token, decide what it starts, recurse into arrays and dictionaries.
//! Indirect references (`10 0 R`) are recognized by two tokens of lookahead
//! after an integer.

use crate::error::{Error, Result};
use crate::lexer::{is_whitespace, skip_ws, token, Token};
use crate::object::{Dictionary, Object, ObjectRef};
use nom::IResult;

/// Nesting depth at which parsing gives up.
const MAX_DEPTH: usize = 64;

/// Decode escape sequences in PDF literal strings.
///
/// Handles the single-character escapes, `\ddd` octal codes (1-3 digits)
/// and line continuations. An unknown escape drops the backslash.
///
/// ```
/// # use pdf_seal::parser::decode_literal_string_escapes;
/// assert_eq!(decode_literal_string_escapes(b"a\\(b\\)"), b"a(b)");
/// assert_eq!(decode_literal_string_escapes(b"Section \\247"), b"Section \xa7");
/// ```
pub fn decode_literal_string_escapes(raw: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        if raw[i] != b'\\' || i + 1 >= raw.len() {
            result.push(raw[i]);
            i += 1;
            continue;
        }

        let next = raw[i + 1];
        i += 2;
        match next {
            b'n' => result.push(b'\n'),
            b'r' => result.push(b'\r'),
            b't' => result.push(b'\t'),
            b'b' => result.push(0x08),
            b'f' => result.push(0x0C),
            b'(' | b')' | b'\\' => result.push(next),
            b'\n' => {},
            b'\r' => {
                if raw.get(i) == Some(&b'\n') {
                    i += 1;
                }
            },
            b'0'..=b'7' => {
                let mut value = (next - b'0') as u32;
                let mut digits = 1;
                while digits < 3 {
                    match raw.get(i) {
                        Some(&d @ b'0'..=b'7') => {
                            value = value * 8 + (d - b'0') as u32;
                            i += 1;
                            digits += 1;
                        },
                        _ => break,
                    }
                }
                result.push((value & 0xFF) as u8);
            },
            other => result.push(other),
        }
    }

    result
}

/// Decode a hex string body; whitespace is ignored and an odd final digit is
/// padded with 0.
pub fn decode_hex_string(raw: &[u8]) -> Vec<u8> {
    let digits: Vec<u8> = raw
        .iter()
        .filter(|c| c.is_ascii_hexdigit())
        .map(|&c| match c {
            b'0'..=b'9' => c - b'0',
            b'a'..=b'f' => c - b'a' + 10,
            _ => c - b'A' + 10,
        })
        .collect();

    digits
        .chunks(2)
        .map(|pair| (pair[0] << 4) | pair.get(1).copied().unwrap_or(0))
        .collect()
}

fn parse_error(input: &[u8]) -> nom::Err<nom::error::Error<&[u8]>> {
    nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Verify))
}

/// Try to read `gen R` after an object number.
fn reference_tail(input: &[u8]) -> Option<(&[u8], u16)> {
    let (rest, gen) = match token(input) {
        Ok((rest, Token::Integer(g))) if (0..=u16::MAX as i64).contains(&g) => (rest, g as u16),
        _ => return None,
    };
    match token(rest) {
        Ok((rest, Token::R)) => Some((rest, gen)),
        _ => None,
    }
}

fn parse_value(input: &[u8], depth: usize) -> IResult<&[u8], Object> {
    if depth > MAX_DEPTH {
        return Err(parse_error(input));
    }

    let (rest, tok) = token(input)?;
    match tok {
        Token::Integer(n) => {
            if (0..=u32::MAX as i64).contains(&n) {
                if let Some((after, gen)) = reference_tail(rest) {
                    return Ok((after, Object::Reference(ObjectRef::new(n as u32, gen))));
                }
            }
            Ok((rest, Object::Integer(n)))
        },
        Token::Real(r) => Ok((rest, Object::Real(r))),
        Token::LiteralString(raw) => Ok((rest, Object::String(decode_literal_string_escapes(raw)))),
        Token::HexString(raw) => Ok((rest, Object::String(decode_hex_string(raw)))),
        Token::Name(name) => Ok((rest, Object::Name(name))),
        Token::True => Ok((rest, Object::Boolean(true))),
        Token::False => Ok((rest, Object::Boolean(false))),
        Token::Null => Ok((rest, Object::Null)),
        Token::ArrayStart => parse_array_body(rest, depth),
        Token::DictStart => {
            let (rest, dict) = parse_dict_body(rest, depth)?;
            Ok((rest, Object::Dictionary(dict)))
        },
        _ => Err(parse_error(input)),
    }
}

fn parse_array_body(mut input: &[u8], depth: usize) -> IResult<&[u8], Object> {
    let mut items = Vec::new();
    loop {
        if let Ok((rest, Token::ArrayEnd)) = token(input) {
            return Ok((rest, Object::Array(items)));
        }
        let (rest, item) = parse_value(input, depth + 1)?;
        items.push(item);
        input = rest;
    }
}

fn parse_dict_body(mut input: &[u8], depth: usize) -> IResult<&[u8], Dictionary> {
    let mut dict = Dictionary::new();
    loop {
        let (rest, tok) = token(input)?;
        match tok {
            Token::DictEnd => return Ok((rest, dict)),
            Token::Name(key) => {
                let (rest, value) = parse_value(rest, depth + 1)?;
                dict.insert(key, value);
                input = rest;
            },
            _ => return Err(parse_error(input)),
        }
    }
}

/// Parse a single direct object (no `obj`/`endobj` wrapper, no stream body).
///
/// ```
/// # use pdf_seal::parser::parse_object;
/// # use pdf_seal::object::{Object, ObjectRef};
/// let (_, obj) = parse_object(b"<< /Root 1 0 R /Size 3 >>").unwrap();
/// let dict = obj.as_dict().unwrap();
/// assert_eq!(dict["Root"], Object::Reference(ObjectRef::new(1, 0)));
/// assert_eq!(dict["Size"], Object::Integer(3));
/// ```
pub fn parse_object(input: &[u8]) -> IResult<&[u8], Object> {
    parse_value(input, 0)
}

fn offset_error(offset: usize, reason: impl Into<String>) -> Error {
    Error::ParseError {
        offset,
        reason: reason.into(),
    }
}

/// Locate the raw data of a stream whose `stream` keyword ends at `start`.
///
/// `/Length` is trusted when `endstream` follows it; otherwise the data runs
/// up to the next `endstream` keyword, minus the end-of-line before it.
fn stream_extent(data: &[u8], start: usize, length: Option<usize>) -> Option<(usize, usize)> {
    // Keyword is followed by CRLF or LF (a lone CR is tolerated)
    let mut begin = start;
    if data.get(begin) == Some(&b'\r') {
        begin += 1;
    }
    if data.get(begin) == Some(&b'\n') {
        begin += 1;
    }

    if let Some(len) = length {
        let end = begin.checked_add(len)?;
        if end <= data.len() {
            let mut cursor = end;
            while cursor < data.len() && is_whitespace(data[cursor]) {
                cursor += 1;
            }
            if data[cursor..].starts_with(b"endstream") {
                return Some((begin, end));
            }
        }
    }

    let keyword = b"endstream";
    let found = data[begin..]
        .windows(keyword.len())
        .position(|w| w == keyword)?;
    let mut end = begin + found;
    if end > begin && data[end - 1] == b'\n' {
        end -= 1;
    }
    if end > begin && data[end - 1] == b'\r' {
        end -= 1;
    }
    Some((begin, end))
}

fn object_header(input: &[u8]) -> IResult<&[u8], (i64, i64)> {
    let (i, id) = token(input)?;
    let (i, gen) = token(i)?;
    let (i, kw) = token(i)?;
    match (id, gen, kw) {
        (Token::Integer(id), Token::Integer(gen), Token::ObjStart) => Ok((i, (id, gen))),
        _ => Err(parse_error(input)),
    }
}

/// Parse the indirect object `id gen obj ... endobj` starting at `offset`.
///
/// `resolve_length` is consulted when a stream's `/Length` is an indirect
/// reference.
pub fn parse_indirect_object(
    data: &[u8],
    offset: usize,
    resolve_length: &dyn Fn(ObjectRef) -> Option<i64>,
) -> Result<(ObjectRef, Object)> {
    let input = data
        .get(offset..)
        .ok_or_else(|| offset_error(offset, "offset beyond end of file"))?;

    let (rest, (id, gen)) =
        object_header(input).map_err(|_| offset_error(offset, "expected object header"))?;
    if id < 0 || id > u32::MAX as i64 || gen < 0 || gen > u16::MAX as i64 {
        return Err(offset_error(offset, format!("object number out of range: {} {}", id, gen)));
    }
    let obj_ref = ObjectRef::new(id as u32, gen as u16);

    let (rest, object) =
        parse_object(rest).map_err(|_| offset_error(offset, format!("malformed body of {}", obj_ref)))?;

    let (after_ws, _) = skip_ws(rest).map_err(|_| offset_error(offset, "unexpected end"))?;
    if !after_ws.starts_with(b"stream") {
        return Ok((obj_ref, object));
    }

    let dict = match object {
        Object::Dictionary(d) => d,
        _ => return Err(offset_error(offset, "stream without dictionary")),
    };

    let length = match dict.get("Length") {
        Some(Object::Integer(n)) => Some(*n),
        Some(Object::Reference(r)) => resolve_length(*r),
        _ => None,
    }
    .and_then(|n| usize::try_from(n).ok());

    let keyword_end = data.len() - after_ws.len() + b"stream".len();
    let (begin, end) = stream_extent(data, keyword_end, length)
        .ok_or_else(|| offset_error(offset, format!("unterminated stream in {}", obj_ref)))?;

    Ok((
        obj_ref,
        Object::Stream {
            dict,
            data: bytes::Bytes::copy_from_slice(&data[begin..end]),
        },
    ))
}
