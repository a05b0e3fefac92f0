//! Cross-reference table parsing.
//!
//! Reads the classic `xref` table format and PDF 1.5 cross-reference
//! streams, following the `/Prev` chain from the newest section back to the
//! oldest. Entries from newer sections shadow older ones.

use crate::error::{Error, Result};
use crate::lexer::is_whitespace;
use crate::object::{Dictionary, Object, ObjectRef};
use crate::parser::{parse_indirect_object, parse_object};
use std::collections::{BTreeMap, HashSet};

/// Sections followed through `/Prev` before giving up.
const MAX_PREV_DEPTH: usize = 64;

/// How far from the end of the file `startxref` is searched for.
const STARTXREF_SEARCH_WINDOW: usize = 1024;

/// Location of an object according to the cross-reference data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefEntry {
    /// Object number is free
    Free,
    /// Object stored directly in the file
    InUse {
        /// Byte offset of `id gen obj`
        offset: usize,
        /// Generation number
        gen: u16,
    },
    /// Object stored inside an object stream
    Compressed {
        /// Object number of the containing `/ObjStm`
        stream_id: u32,
        /// Index within the object stream
        index: u32,
    },
}

/// Syntax of the newest cross-reference section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefFlavor {
    /// `xref` keyword, fixed-width entries, `trailer` dictionary
    Table,
    /// `/Type /XRef` stream object
    Stream,
}

/// Merged cross-reference data of a document.
#[derive(Debug, Clone)]
pub struct CrossRefTable {
    entries: BTreeMap<u32, XrefEntry>,
    trailer: Dictionary,
    flavor: XrefFlavor,
    startxref: usize,
}

impl CrossRefTable {
    /// Parse all cross-reference sections reachable from `startxref`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let startxref = find_startxref(data)?;
        let mut entries = BTreeMap::new();
        let mut trailer: Option<Dictionary> = None;
        let mut flavor = None;
        let mut visited = HashSet::new();
        let mut next = Some(startxref);

        while let Some(offset) = next {
            if !visited.insert(offset) {
                log::warn!("Cross-reference /Prev loop at offset {}", offset);
                break;
            }
            if visited.len() > MAX_PREV_DEPTH {
                return Err(Error::InvalidPdf(format!(
                    "more than {} cross-reference sections",
                    MAX_PREV_DEPTH
                )));
            }

            let section = parse_section(data, offset)?;
            log::debug!(
                "Read {:?} xref section at {} with {} entries",
                section.flavor,
                offset,
                section.entries.len()
            );

            for (id, entry) in section.entries {
                entries.entry(id).or_insert(entry);
            }
            next = section
                .trailer
                .get("Prev")
                .and_then(|o| o.as_integer())
                .and_then(|p| usize::try_from(p).ok());

            if trailer.is_none() {
                flavor = Some(section.flavor);
                trailer = Some(section.trailer);
            }
        }

        let trailer = trailer.ok_or_else(|| Error::InvalidPdf("no trailer".to_string()))?;
        Ok(Self {
            entries,
            trailer,
            flavor: flavor.unwrap_or(XrefFlavor::Table),
            startxref,
        })
    }

    /// Look up an object number.
    pub fn get(&self, id: u32) -> Option<XrefEntry> {
        self.entries.get(&id).copied()
    }

    /// Trailer of the newest section.
    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    /// Flavor of the newest section.
    pub fn flavor(&self) -> XrefFlavor {
        self.flavor
    }

    /// Offset the file's final `startxref` points at.
    pub fn startxref(&self) -> usize {
        self.startxref
    }

    /// One past the highest object number in use, never less than `/Size`.
    pub fn size(&self) -> u32 {
        let declared = self
            .trailer
            .get("Size")
            .and_then(|o| o.as_integer())
            .and_then(|s| u32::try_from(s).ok())
            .unwrap_or(0);
        let highest = self.entries.keys().next_back().map_or(0, |id| id + 1);
        declared.max(highest)
    }

    /// Number of entries known.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries are known.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

struct XrefSection {
    entries: Vec<(u32, XrefEntry)>,
    trailer: Dictionary,
    flavor: XrefFlavor,
}

/// Find the byte offset recorded after the last `startxref` keyword.
pub fn find_startxref(data: &[u8]) -> Result<usize> {
    let window_start = data.len().saturating_sub(STARTXREF_SEARCH_WINDOW);
    let keyword = b"startxref";
    let pos = data[window_start..]
        .windows(keyword.len())
        .rposition(|w| w == keyword)
        .map(|p| window_start + p)
        .ok_or_else(|| Error::InvalidPdf("startxref not found".to_string()))?;

    let mut cursor = Cursor::new(data, pos + keyword.len());
    let offset = cursor
        .read_uint()
        .ok_or_else(|| Error::InvalidPdf("startxref has no offset".to_string()))?;
    if offset >= data.len() {
        return Err(Error::InvalidPdf(format!("startxref {} beyond end of file", offset)));
    }
    Ok(offset)
}

fn parse_section(data: &[u8], offset: usize) -> Result<XrefSection> {
    let mut cursor = Cursor::new(data, offset);
    cursor.skip_ws();
    if cursor.rest().starts_with(b"xref") {
        cursor.pos += 4;
        let mut section = parse_table(&mut cursor)?;

        // Hybrid-reference files: /XRefStm supplements the table
        if let Some(stm_offset) = section
            .trailer
            .get("XRefStm")
            .and_then(|o| o.as_integer())
            .and_then(|o| usize::try_from(o).ok())
        {
            match parse_stream_section(data, stm_offset) {
                Ok(stream) => {
                    // In-use table entries win, stream entries fill the free slots
                    let (in_use, free): (Vec<_>, Vec<_>) = section
                        .entries
                        .into_iter()
                        .partition(|(_, e)| !matches!(e, XrefEntry::Free));
                    let mut merged = in_use;
                    merged.extend(stream.entries);
                    merged.extend(free);
                    section.entries = merged;
                },
                Err(e) => log::warn!("Ignoring unreadable /XRefStm at {}: {}", stm_offset, e),
            }
        }
        Ok(section)
    } else {
        parse_stream_section(data, offset)
    }
}

fn parse_table(cursor: &mut Cursor<'_>) -> Result<XrefSection> {
    let mut entries = Vec::new();

    loop {
        cursor.skip_ws();
        if cursor.rest().starts_with(b"trailer") {
            cursor.pos += b"trailer".len();
            break;
        }
        let start = cursor.read_uint().ok_or_else(|| Error::ParseError {
            offset: cursor.pos,
            reason: "expected xref subsection start".to_string(),
        })?;
        let count = cursor.read_uint().ok_or_else(|| Error::ParseError {
            offset: cursor.pos,
            reason: "expected xref subsection count".to_string(),
        })?;

        for i in 0..count {
            let entry_offset = cursor.pos;
            let bad_entry = || Error::ParseError {
                offset: entry_offset,
                reason: "malformed xref entry".to_string(),
            };
            let field1 = cursor.read_uint().ok_or_else(bad_entry)?;
            let field2 = cursor.read_uint().ok_or_else(bad_entry)?;
            cursor.skip_ws();
            let kind = cursor.next_byte().ok_or_else(bad_entry)?;

            let id = u32::try_from(start + i).map_err(|_| bad_entry())?;
            let entry = match kind {
                b'n' => XrefEntry::InUse {
                    offset: field1,
                    gen: u16::try_from(field2).unwrap_or(u16::MAX),
                },
                b'f' => XrefEntry::Free,
                _ => return Err(bad_entry()),
            };
            entries.push((id, entry));
        }
    }

    let (_, trailer) = parse_object(cursor.rest()).map_err(|_| Error::ParseError {
        offset: cursor.pos,
        reason: "malformed trailer dictionary".to_string(),
    })?;
    let trailer = match trailer {
        Object::Dictionary(d) => d,
        _ => return Err(Error::InvalidPdf("trailer is not a dictionary".to_string())),
    };

    Ok(XrefSection {
        entries,
        trailer,
        flavor: XrefFlavor::Table,
    })
}

fn parse_stream_section(data: &[u8], offset: usize) -> Result<XrefSection> {
    let (_, object) = parse_indirect_object(data, offset, &|_: ObjectRef| None)?;
    let dict = object
        .as_dict()
        .ok_or_else(|| Error::InvalidPdf(format!("no xref section at offset {}", offset)))?;
    if dict.get("Type").and_then(|t| t.as_name()) != Some("XRef") {
        return Err(Error::InvalidPdf(format!("object at {} is not an xref stream", offset)));
    }

    let widths: Vec<usize> = dict
        .get("W")
        .and_then(|w| w.as_array())
        .ok_or_else(|| Error::InvalidPdf("xref stream without /W".to_string()))?
        .iter()
        .map(|o| o.as_integer().and_then(|n| usize::try_from(n).ok()))
        .collect::<Option<_>>()
        .filter(|w: &Vec<usize>| w.len() == 3 && w.iter().all(|&n| n <= 8))
        .ok_or_else(|| Error::InvalidPdf("invalid /W in xref stream".to_string()))?;

    let size = dict.get("Size").and_then(|o| o.as_integer()).unwrap_or(0);
    let index: Vec<i64> = match dict.get("Index").and_then(|o| o.as_array()) {
        Some(arr) => arr.iter().filter_map(|o| o.as_integer()).collect(),
        None => vec![0, size],
    };

    let decoded = object.decode_stream_data()?;
    let row_len: usize = widths.iter().sum();
    if row_len == 0 {
        return Err(Error::InvalidPdf("xref stream /W sums to zero".to_string()));
    }
    let mut rows = decoded.chunks_exact(row_len);
    let mut entries = Vec::new();

    for pair in index.chunks(2) {
        let (first, count) = match pair {
            [first, count] if *first >= 0 && *count >= 0 => (*first as u64, *count as u64),
            _ => return Err(Error::InvalidPdf("invalid /Index in xref stream".to_string())),
        };
        for i in 0..count {
            let row = match rows.next() {
                Some(row) => row,
                None => {
                    log::warn!("xref stream shorter than its /Index declares");
                    break;
                },
            };
            let (f1, rest) = row.split_at(widths[0]);
            let (f2, f3) = rest.split_at(widths[1]);
            // Type defaults to 1 when its field is absent
            let kind = if widths[0] == 0 { 1 } else { be_uint(f1) };
            let (f2, f3) = (be_uint(f2), be_uint(f3));

            let id = u32::try_from(first + i)
                .map_err(|_| Error::InvalidPdf("object number overflow".to_string()))?;
            let entry = match kind {
                0 => XrefEntry::Free,
                1 => XrefEntry::InUse {
                    offset: f2 as usize,
                    gen: u16::try_from(f3).unwrap_or(u16::MAX),
                },
                2 => XrefEntry::Compressed {
                    stream_id: u32::try_from(f2)
                        .map_err(|_| Error::InvalidPdf("object stream number overflow".to_string()))?,
                    index: u32::try_from(f3).unwrap_or(u32::MAX),
                },
                // Unknown types are treated as references to the null object
                _ => XrefEntry::Free,
            };
            entries.push((id, entry));
        }
    }

    Ok(XrefSection {
        entries,
        trailer: dict.clone(),
        flavor: XrefFlavor::Stream,
    })
}

fn be_uint(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

/// Byte cursor for the line-oriented parts of the file.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    fn rest(&self) -> &'a [u8] {
        self.data.get(self.pos..).unwrap_or(&[])
    }

    fn skip_ws(&mut self) {
        while self.pos < self.data.len() && is_whitespace(self.data[self.pos]) {
            self.pos += 1;
        }
    }

    fn next_byte(&mut self) -> Option<u8> {
        let b = self.data.get(self.pos).copied()?;
        self.pos += 1;
        Some(b)
    }

    fn read_uint(&mut self) -> Option<usize> {
        self.skip_ws();
        let start = self.pos;
        while self.pos < self.data.len() && self.data[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        std::str::from_utf8(&self.data[start..self.pos])
            .ok()?
            .parse()
            .ok()
    }
}
