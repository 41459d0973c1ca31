// Encoding detection module
// Sniffs raw document bytes and decodes them permissively into UTF-8 text


use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8, UTF_16BE, UTF_16LE};
use thiserror::Error;
use tracing::debug;

/// How many leading bytes are inspected when looking for binary content
const BINARY_SNIFF_LEN: usize = 8 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodingError {
    #[error("Content looks binary (NUL byte at offset {offset})")]
    NotText { offset: usize },
}

/// Text decoded from raw bytes, along with how it was decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub text: String,
    /// Label of the encoding used, e.g. "UTF-8" or "windows-1252"
    pub encoding: &'static str,
    /// Whether malformed sequences had to be replaced
    pub had_errors: bool,
}

/// Infer the most likely encoding of `bytes`.
///
/// Never fails: a byte-order mark wins, valid UTF-8 is taken as UTF-8, and
/// anything else falls through to statistical detection.
#[inline]
pub fn detect_encoding(bytes: &[u8]) -> &'static Encoding {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return encoding;
    }

    if std::str::from_utf8(bytes).is_ok() {
        return UTF_8;
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    detector.guess(None, true)
}

/// Decode `bytes` into text, replacing malformed sequences.
///
/// Fails only when the content does not look like text at all.
#[inline]
pub fn decode_document(bytes: &[u8]) -> Result<DecodedText, EncodingError> {
    if bytes.is_empty() {
        return Ok(DecodedText {
            text: String::new(),
            encoding: UTF_8.name(),
            had_errors: false,
        });
    }

    let encoding = detect_encoding(bytes);
    let is_utf16 = encoding == UTF_16LE || encoding == UTF_16BE;

    if !is_utf16 {
        let sniff = bytes.get(..BINARY_SNIFF_LEN).unwrap_or(bytes);
        if let Some(offset) = sniff.iter().position(|&b| b == 0) {
            return Err(EncodingError::NotText { offset });
        }
    }

    // `decode` strips a matching BOM and replaces malformed input with U+FFFD
    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        debug!(
            "Replaced malformed sequences while decoding as {}",
            used.name()
        );
    }

    Ok(DecodedText {
        text: text.into_owned(),
        encoding: used.name(),
        had_errors,
    })
}
