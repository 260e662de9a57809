//! Encoding detection with corruption checks.
//!
//! Candidates are tried in order and the first one that decodes without
//! error wins. Single-byte code pages never fail, so when UTF-8 is rejected
//! the `chardet` guess decides which of them goes first.

use encoding_rs::{Encoding, ISO_8859_15, UTF_8, WINDOWS_1252};

use crate::error::{FileError, FileResult};

/// Sequences that only appear in text that was already damaged:
/// the replacement character and UTF-8 read back as Latin-1.
pub const CORRUPTION_MARKERS: &[&str] = &[
    "\u{FFFD}", "ï¿½", "Ã­", "Ã±", "Ã¡", "Ã©", "Ã³", "Ãº",
];

/// Minimum `chardet` confidence for its guess to be considered.
const GUESS_CONFIDENCE: f32 = 0.5;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Decoded text and the encoding that produced it.
#[derive(Debug, Clone)]
pub struct Decoded {
    pub text: String,
    pub encoding: &'static str,
}

/// Default candidate order: UTF-8, Windows-1252, ISO-8859-15.
pub fn default_candidates() -> Vec<&'static Encoding> {
    vec![UTF_8, WINDOWS_1252, ISO_8859_15]
}

/// Guess the charset of raw bytes with chardet, as an `encoding_rs` encoding.
pub fn guess_encoding(bytes: &[u8]) -> Option<&'static Encoding> {
    let (charset, confidence, _) = chardet::detect(bytes);
    if confidence < GUESS_CONFIDENCE {
        return None;
    }
    Encoding::for_label(chardet::charset2encoding(&charset).as_bytes())
}

/// Decode with the default candidates.
pub fn decode(bytes: &[u8]) -> FileResult<Decoded> {
    decode_with(bytes, &default_candidates())
}

/// Decode with an explicit candidate list.
///
/// Fails with [`FileError::Encoding`] when no candidate decodes the bytes or
/// when the decoded text contains a corruption marker.
pub fn decode_with(bytes: &[u8], candidates: &[&'static Encoding]) -> FileResult<Decoded> {
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

    for encoding in ordered(body, candidates) {
        let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(body) else {
            continue;
        };
        if let Some(marker) = find_corruption(&text) {
            return Err(FileError::Encoding(format!(
                "corrupted content ('{}' found after decoding as {}), file must be regenerated",
                marker,
                encoding.name()
            )));
        }
        return Ok(Decoded {
            text: text.into_owned(),
            encoding: encoding.name(),
        });
    }

    let names: Vec<&str> = candidates.iter().map(|e| e.name()).collect();
    Err(FileError::Encoding(format!(
        "cannot decode with any of: {}",
        names.join(", ")
    )))
}

/// First corruption marker found in `text`.
pub fn find_corruption(text: &str) -> Option<&'static str> {
    CORRUPTION_MARKERS.iter().copied().find(|m| text.contains(m))
}

/// Candidates in trial order: UTF-8 stays first when listed, the chardet guess
/// is promoted among the remaining ones.
fn ordered(bytes: &[u8], candidates: &[&'static Encoding]) -> Vec<&'static Encoding> {
    let mut order: Vec<&'static Encoding> = candidates.to_vec();
    if std::str::from_utf8(bytes).is_ok() {
        return order;
    }
    if let Some(guess) = guess_encoding(bytes) {
        if let Some(pos) = order.iter().position(|e| *e == guess) {
            let promoted = order.remove(pos);
            let at = usize::from(order.first() == Some(&UTF_8));
            order.insert(at, promoted);
        }
    }
    order
}
