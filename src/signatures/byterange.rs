//! ByteRange calculation for PDF signatures.
//!
//! PDF digital signatures use a ByteRange array to specify which portions
//! of the document are covered by the signature. The signature itself is
//! stored in a placeholder that is excluded from the signed bytes.
//!
//! ## ByteRange Format
//!
//! The ByteRange is an array of four integers:
//! `[offset1, length1, offset2, length2]`
//!
//! Where:
//! - `offset1` = 0 (start of file)
//! - `length1` = byte offset of the `<` opening the signature value
//! - `offset2` = byte offset just past the closing `>`
//! - `length2` = remaining bytes to end of file
//!
//! The array is written with a fixed width so the real values can be
//! patched in after layout without moving any other byte.

use crate::error::{Error, Result};
use crate::signatures::DigestAlgorithm;
use crate::writer::hex_upper;

/// Characters reserved per ByteRange number.
pub const BYTE_RANGE_FIELD_WIDTH: usize = 10;

/// Total width of the serialized ByteRange array, brackets included.
pub const BYTE_RANGE_WIDTH: usize = 2 + 4 * BYTE_RANGE_FIELD_WIDTH + 3;

/// Calculator for PDF signature byte ranges.
#[derive(Debug, Clone, Copy)]
pub struct ByteRangeCalculator {
    /// DER bytes reserved for the signature
    reserved_size: usize,
    /// Size of the placeholder for the signature value (hex digits + 2 for angle brackets)
    placeholder_size: usize,
}

impl ByteRangeCalculator {
    /// Create a calculator reserving `reserved_signature_size` DER bytes.
    ///
    /// The placeholder is `(size * 2) + 2` characters: hex digits plus the
    /// angle brackets.
    pub fn new(reserved_signature_size: usize) -> Self {
        Self {
            reserved_size: reserved_signature_size,
            placeholder_size: reserved_signature_size * 2 + 2,
        }
    }

    /// DER bytes that fit in the placeholder.
    pub fn reserved_size(&self) -> usize {
        self.reserved_size
    }

    /// Get the placeholder size (for the /Contents value).
    pub fn placeholder_size(&self) -> usize {
        self.placeholder_size
    }

    /// Zero-filled hex string of exactly [`placeholder_size`](Self::placeholder_size) characters.
    pub fn generate_placeholder(&self) -> String {
        format!("<{}>", "0".repeat(self.placeholder_size - 2))
    }

    /// Fixed-width ByteRange array with all values zero.
    ///
    /// ```
    /// # use pdf_seal::signatures::{ByteRangeCalculator, BYTE_RANGE_WIDTH};
    /// let placeholder = ByteRangeCalculator::byte_range_placeholder();
    /// assert_eq!(placeholder.len(), BYTE_RANGE_WIDTH);
    /// assert!(placeholder.starts_with("[0 "));
    /// ```
    pub fn byte_range_placeholder() -> String {
        // Zero values always fit, so formatting cannot fail
        Self::format_byte_range(&[0, 0, 0, 0]).unwrap_or_default()
    }

    /// Calculate the ByteRange array given the position of the /Contents value.
    ///
    /// `contents_offset` is the offset of the opening `<`.
    pub fn calculate_byte_range(&self, file_size: usize, contents_offset: usize) -> [i64; 4] {
        let before_sig = contents_offset as i64;
        let after_sig_start = (contents_offset + self.placeholder_size) as i64;
        let after_sig_len = file_size as i64 - after_sig_start;

        [0, before_sig, after_sig_start, after_sig_len]
    }

    /// Format a ByteRange array with fixed-width, space-padded fields.
    ///
    /// ```
    /// # use pdf_seal::signatures::ByteRangeCalculator;
    /// let s = ByteRangeCalculator::format_byte_range(&[0, 100, 200, 300]).unwrap();
    /// assert_eq!(s, "[0          100        200        300       ]");
    /// ```
    pub fn format_byte_range(byte_range: &[i64; 4]) -> Result<String> {
        let mut out = String::with_capacity(BYTE_RANGE_WIDTH);
        out.push('[');
        for (i, value) in byte_range.iter().enumerate() {
            let digits = value.to_string();
            if *value < 0 || digits.len() > BYTE_RANGE_FIELD_WIDTH {
                return Err(Error::InvalidPdf(format!(
                    "ByteRange value {} does not fit the reserved width",
                    value
                )));
            }
            if i > 0 {
                out.push(' ');
            }
            out.push_str(&format!("{:<width$}", digits, width = BYTE_RANGE_FIELD_WIDTH));
        }
        out.push(']');
        Ok(out)
    }

    /// Overwrite the ByteRange placeholder at `offset` in place.
    pub fn patch_byte_range(data: &mut [u8], offset: usize, byte_range: &[i64; 4]) -> Result<()> {
        let formatted = Self::format_byte_range(byte_range)?;
        let end = offset + BYTE_RANGE_WIDTH;
        let region = data
            .get_mut(offset..end)
            .ok_or_else(|| Error::InvalidPdf("ByteRange placeholder outside file".to_string()))?;
        if region.first() != Some(&b'[') || region.last() != Some(&b']') {
            return Err(Error::InvalidPdf(format!(
                "no ByteRange placeholder at offset {}",
                offset
            )));
        }
        region.copy_from_slice(formatted.as_bytes());
        Ok(())
    }

    fn ranges(pdf_data: &[u8], byte_range: &[i64; 4]) -> Result<[(usize, usize); 2]> {
        if byte_range.iter().any(|v| *v < 0) {
            return Err(Error::InvalidPdf(format!("negative ByteRange value in {:?}", byte_range)));
        }
        let [offset1, length1, offset2, length2] = byte_range.map(|v| v as usize);

        let end1 = range_end(offset1, length1, pdf_data.len(), "first")?;
        let end2 = range_end(offset2, length2, pdf_data.len(), "second")?;
        Ok([(offset1, end1), (offset2, end2)])
    }

    /// Extract the bytes to be signed: the concatenation of both ranges.
    pub fn extract_signed_bytes(pdf_data: &[u8], byte_range: &[i64; 4]) -> Result<Vec<u8>> {
        let [(s1, e1), (s2, e2)] = Self::ranges(pdf_data, byte_range)?;
        let mut signed_bytes = Vec::with_capacity((e1 - s1) + (e2 - s2));
        signed_bytes.extend_from_slice(&pdf_data[s1..e1]);
        signed_bytes.extend_from_slice(&pdf_data[s2..e2]);
        Ok(signed_bytes)
    }

    /// Digest both ranges without copying them.
    pub fn digest_byte_range(
        pdf_data: &[u8],
        byte_range: &[i64; 4],
        algorithm: DigestAlgorithm,
    ) -> Result<Vec<u8>> {
        let [(s1, e1), (s2, e2)] = Self::ranges(pdf_data, byte_range)?;
        Ok(algorithm.digest_parts(&[&pdf_data[s1..e1], &pdf_data[s2..e2]]))
    }

    /// Check if a ByteRange covers the entire document except the signature.
    ///
    /// A valid ByteRange starts at 0, ends at the file size and leaves a
    /// single gap that holds the `<...>` signature value.
    pub fn validate_byte_range(byte_range: &[i64; 4], file_size: usize) -> Result<()> {
        let [offset1, length1, offset2, length2] = *byte_range;

        if offset1 != 0 {
            return Err(Error::InvalidPdf(format!("ByteRange must start at 0, got {}", offset1)));
        }
        if length1 < 0 || length2 < 0 {
            return Err(Error::InvalidPdf(format!("negative ByteRange length in {:?}", byte_range)));
        }

        let expected_end = file_size as i64;
        let actual_end = offset2.checked_add(length2).ok_or_else(|| {
            Error::InvalidPdf(format!("ByteRange end overflows in {:?}", byte_range))
        })?;
        if actual_end != expected_end {
            return Err(Error::InvalidPdf(format!(
                "ByteRange must end at file size {}, got {}",
                expected_end, actual_end
            )));
        }

        if length1 >= offset2 {
            return Err(Error::InvalidPdf(format!(
                "ByteRange first range ({}) overlaps with second range start ({})",
                length1, offset2
            )));
        }

        Ok(())
    }

    /// Check that the gap between the two ranges is exactly the `<...>` hex
    /// string of a `/Contents` value decoding to `contents_len` bytes.
    ///
    /// Call after [`validate_byte_range`](Self::validate_byte_range); no byte
    /// outside the slot may escape the digest.
    pub fn validate_contents_gap(
        pdf_data: &[u8],
        byte_range: &[i64; 4],
        contents_len: usize,
    ) -> Result<()> {
        let gap_start = usize::try_from(byte_range[1])
            .map_err(|_| Error::InvalidPdf(format!("negative ByteRange length in {:?}", byte_range)))?;
        let gap_end = usize::try_from(byte_range[2])
            .map_err(|_| Error::InvalidPdf(format!("negative ByteRange offset in {:?}", byte_range)))?;
        let expected = contents_len
            .checked_mul(2)
            .and_then(|n| n.checked_add(2))
            .ok_or_else(|| Error::InvalidPdf("signature contents too large".to_string()))?;

        let gap = gap_end.checked_sub(gap_start).ok_or_else(|| {
            Error::InvalidPdf(format!("ByteRange ranges overlap in {:?}", byte_range))
        })?;
        if gap != expected {
            return Err(Error::InvalidPdf(format!(
                "ByteRange gap of {} bytes does not match the {}-byte signature slot",
                gap, expected
            )));
        }
        if pdf_data.get(gap_start) != Some(&b'<') || pdf_data.get(gap_end - 1) != Some(&b'>') {
            return Err(Error::InvalidPdf(format!(
                "ByteRange gap {}..{} is not the /Contents hex string",
                gap_start, gap_end
            )));
        }
        Ok(())
    }

    /// Write the hex-encoded `signature` into the placeholder at `contents_offset`.
    ///
    /// The remainder of the slot keeps its zero padding. Fails with
    /// [`Error::PlaceholderTooSmall`] before touching `pdf_data` if the
    /// signature does not fit.
    pub fn insert_signature(
        &self,
        pdf_data: &mut [u8],
        contents_offset: usize,
        signature: &[u8],
    ) -> Result<()> {
        if signature.len() > self.reserved_size {
            return Err(Error::PlaceholderTooSmall {
                required: signature.len(),
                available: self.reserved_size,
            });
        }

        let end = contents_offset + self.placeholder_size;
        let slot = pdf_data
            .get_mut(contents_offset..end)
            .ok_or_else(|| Error::InvalidPdf("Signature insertion would exceed file bounds".to_string()))?;
        if slot.first() != Some(&b'<') || slot.last() != Some(&b'>') {
            return Err(Error::InvalidPdf(format!(
                "no signature placeholder at offset {}",
                contents_offset
            )));
        }

        let hex = hex_upper(signature);
        slot[1..1 + hex.len()].copy_from_slice(hex.as_bytes());
        for byte in &mut slot[1 + hex.len()..self.placeholder_size - 1] {
            *byte = b'0';
        }
        Ok(())
    }
}

fn range_end(offset: usize, length: usize, file_size: usize, which: &str) -> Result<usize> {
    match offset.checked_add(length) {
        Some(end) if end <= file_size => Ok(end),
        _ => Err(Error::InvalidPdf(format!(
            "ByteRange {} range exceeds file size: {} + {} > {}",
            which, offset, length, file_size
        ))),
    }
}

impl Default for ByteRangeCalculator {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_RESERVED_SIGNATURE_SIZE)
    }
}
