//! PDF lexer (tokenizer).
//!
//! Low-level tokenization of PDF byte streams with nom. Whitespace
//! (space, \t, \r, \n, \0, \f) and comments (% to EOL) are skipped before
//! every token.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till, take_while, take_while1},
    character::complete::{char, digit1, one_of},
    combinator::{map, opt, recognize, value},
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

/// Token types recognized by the PDF lexer.
#[derive(Debug, PartialEq, Clone)]
pub enum Token<'a> {
    /// Integer number (e.g., 42, -123)
    Integer(i64),
    /// Real number (e.g., 3.14, -.5)
    Real(f64),
    /// Raw literal string content, escapes not yet decoded
    LiteralString(&'a [u8]),
    /// Raw hex string content, whitespace preserved
    HexString(&'a [u8]),
    /// Name with #XX escapes decoded
    Name(String),
    /// `true`
    True,
    /// `false`
    False,
    /// `null`
    Null,
    /// `[`
    ArrayStart,
    /// `]`
    ArrayEnd,
    /// `<<`
    DictStart,
    /// `>>`
    DictEnd,
    /// `obj`
    ObjStart,
    /// `endobj`
    ObjEnd,
    /// `stream`
    StreamStart,
    /// `endstream`
    StreamEnd,
    /// `R` in `10 0 R`
    R,
}

/// PDF whitespace characters.
pub fn is_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C)
}

fn is_delimiter(c: u8) -> bool {
    matches!(c, b'/' | b'%' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}')
}

fn is_regular(c: u8) -> bool {
    !is_whitespace(c) && !is_delimiter(c)
}

fn comment(input: &[u8]) -> IResult<&[u8], ()> {
    value((), preceded(char('%'), take_till(|c| c == b'\r' || c == b'\n')))(input)
}

/// Skip all whitespace and comments.
pub fn skip_ws(input: &[u8]) -> IResult<&[u8], ()> {
    let mut remaining = input;
    loop {
        let (rest, _) = take_while(is_whitespace)(remaining)?;
        remaining = rest;
        match comment(remaining) {
            Ok((rest, _)) => remaining = rest,
            Err(_) => return Ok((remaining, ())),
        }
    }
}

fn parse_number(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (rest, text) = recognize(tuple((
        opt(one_of("+-")),
        alt((
            recognize(pair(digit1, opt(pair(char('.'), opt(digit1))))),
            recognize(pair(char('.'), digit1)),
        )),
    )))(input)?;

    // A number must not run into a regular character ("12abc" is not a number)
    if rest.first().is_some_and(|&c| is_regular(c) && c != b'.') {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit)));
    }

    let text = std::str::from_utf8(text)
        .map_err(|_| nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit)))?;

    if text.contains('.') {
        // Rust rejects "5." and "-.5"; normalize before parsing
        let mut normalized = text.replace("-.", "-0.").replace("+.", "0.");
        if normalized.starts_with('.') {
            normalized.insert(0, '0');
        }
        if normalized.ends_with('.') {
            normalized.push('0');
        }
        let num: f64 = normalized.parse().map_err(|_| {
            nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Float))
        })?;
        Ok((rest, Token::Real(num)))
    } else {
        let num: i64 = text.trim_start_matches('+').parse().map_err(|_| {
            nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit))
        })?;
        Ok((rest, Token::Integer(num)))
    }
}

/// Literal string with balanced parentheses; escapes are skipped, not decoded.
fn parse_literal_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (body, _) = char('(')(input)?;
    let mut depth = 1usize;
    let mut pos = 0usize;

    while pos < body.len() {
        match body[pos] {
            b'\\' => pos += 2,
            b'(' => {
                depth += 1;
                pos += 1;
            },
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((&body[pos + 1..], Token::LiteralString(&body[..pos])));
                }
                pos += 1;
            },
            _ => pos += 1,
        }
    }

    Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)))
}

fn parse_hex_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    if input.starts_with(b"<<") {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)));
    }
    delimited(
        char('<'),
        map(
            take_while(|c: u8| c.is_ascii_hexdigit() || is_whitespace(c)),
            Token::HexString,
        ),
        char('>'),
    )(input)
}

/// Decode #XX escape sequences in PDF names.
///
/// ```
/// # use pdf_seal::lexer::decode_name_escapes;
/// assert_eq!(decode_name_escapes(b"A#20B"), "A B");
/// assert_eq!(decode_name_escapes(b"Type"), "Type");
/// assert_eq!(decode_name_escapes(b"A#"), "A#");
/// ```
pub fn decode_name_escapes(raw: &[u8]) -> String {
    let mut bytes = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'#' && i + 2 < raw.len() {
            let hex = std::str::from_utf8(&raw[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                bytes.push(byte);
                i += 3;
                continue;
            }
        }
        bytes.push(raw[i]);
        i += 1;
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

fn parse_name(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    preceded(
        char('/'),
        map(take_while(is_regular), |raw: &[u8]| Token::Name(decode_name_escapes(raw))),
    )(input)
}

fn parse_keyword(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    // Delimiters first, then bare words matched as whole words
    if let Ok(result) = alt::<_, _, nom::error::Error<&[u8]>, _>((
        value(Token::DictStart, tag(b"<<")),
        value(Token::DictEnd, tag(b">>")),
        value(Token::ArrayStart, tag(b"[")),
        value(Token::ArrayEnd, tag(b"]")),
    ))(input)
    {
        return Ok(result);
    }

    let (rest, word) = take_while1(is_regular)(input)?;
    let tok = match word {
        b"true" => Token::True,
        b"false" => Token::False,
        b"null" => Token::Null,
        b"obj" => Token::ObjStart,
        b"endobj" => Token::ObjEnd,
        b"stream" => Token::StreamStart,
        b"endstream" => Token::StreamEnd,
        b"R" => Token::R,
        _ => {
            return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)))
        },
    };
    Ok((rest, tok))
}

/// Parse a single PDF token after skipping whitespace and comments.
pub fn token(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (input, _) = skip_ws(input)?;
    alt((parse_number, parse_name, parse_literal_string, parse_hex_string, parse_keyword))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok(input: &[u8]) -> Token<'_> {
        token(input).unwrap().1
    }

    #[test]
    fn test_integers_and_reals() {
        assert_eq!(tok(b"42"), Token::Integer(42));
        assert_eq!(tok(b"-17"), Token::Integer(-17));
        assert_eq!(tok(b"+5"), Token::Integer(5));
        assert_eq!(tok(b"3.5"), Token::Real(3.5));
        assert_eq!(tok(b"-.5"), Token::Real(-0.5));
        assert_eq!(tok(b"612."), Token::Real(612.0));
    }

    #[test]
    fn test_names() {
        assert_eq!(tok(b"/Type"), Token::Name("Type".to_string()));
        assert_eq!(tok(b"/A#20B"), Token::Name("A B".to_string()));
        assert_eq!(tok(b"/Pages/Kids"), Token::Name("Pages".to_string()));
    }

    #[test]
    fn test_strings() {
        assert_eq!(tok(b"(Hello (nested) \\) x)"), Token::LiteralString(b"Hello (nested) \\) x"));
        assert_eq!(tok(b"<48 65>"), Token::HexString(b"48 65"));
    }

    #[test]
    fn test_keywords_and_delimiters() {
        assert_eq!(tok(b"<<"), Token::DictStart);
        assert_eq!(tok(b">>"), Token::DictEnd);
        assert_eq!(tok(b"obj"), Token::ObjStart);
        assert_eq!(tok(b"endobj"), Token::ObjEnd);
        assert_eq!(tok(b"stream\n"), Token::StreamStart);
        assert_eq!(tok(b"endstream"), Token::StreamEnd);
        assert_eq!(tok(b"R"), Token::R);
        assert_eq!(tok(b"true"), Token::True);
        assert!(token(b"Rect").is_err());
    }

    #[test]
    fn test_delimiters_before_keywords() {
        let (rest, t) = token(b">>endobj").unwrap();
        assert_eq!(t, Token::DictEnd);
        assert_eq!(tok(rest), Token::ObjEnd);
        let (rest, t) = token(b"[/Sig]").unwrap();
        assert_eq!(t, Token::ArrayStart);
        assert_eq!(rest, b"/Sig]");
    }

    #[test]
    fn test_skips_comments() {
        assert_eq!(tok(b"  % comment\n  12"), Token::Integer(12));
        assert_eq!(tok(b"%a\r%b\n/N"), Token::Name("N".to_string()));
    }

    #[test]
    fn test_number_followed_by_delimiter() {
        let (rest, t) = token(b"0]").unwrap();
        assert_eq!(t, Token::Integer(0));
        assert_eq!(rest, b"]");
    }
}
