//! Stream decoders.
//!
//! Only the filters that carry document structure are supported: FlateDecode
//! (with PNG/TIFF predictors) for cross-reference streams and object streams.
//! Page content is never decoded.

mod flate;
mod predictor;

pub use flate::FlateDecoder;
pub use predictor::{decode_predictor, DecodeParams};

use crate::error::{Error, Result};

/// Trait for PDF stream decoders.
pub trait StreamDecoder {
    /// Decode the input data.
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Get the name of this decoder (e.g., "FlateDecode").
    fn name(&self) -> &str;
}

/// Decode stream data through a filter pipeline, then undo any predictor.
///
/// Predictor parameters apply to the output of the last filter.
pub fn decode_stream(data: &[u8], filters: &[&str], params: Option<&DecodeParams>) -> Result<Vec<u8>> {
    let mut current = data.to_vec();

    for filter in filters {
        let decoder: &dyn StreamDecoder = match *filter {
            "FlateDecode" | "Fl" => &FlateDecoder,
            other => return Err(Error::Decode(format!("Unsupported filter: {}", other))),
        };
        log::trace!("Applying {} to {} bytes", decoder.name(), current.len());
        current = decoder.decode(&current)?;
    }

    match params {
        Some(p) if p.predictor > 1 => decode_predictor(&current, p),
        _ => Ok(current),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_stream_no_filters() {
        let decoded = decode_stream(b"plain", &[], None).unwrap();
        assert_eq!(decoded, b"plain");
    }

    #[test]
    fn test_decode_stream_unsupported_filter() {
        let result = decode_stream(b"data", &["DCTDecode"], None);
        assert!(matches!(result, Err(Error::Decode(_))));
    }
}
