//! Text-safe encoding of envelopes and legacy values.
//!
//! The preference store only holds text, so envelopes are stored as
//! standard-alphabet Base64 with padding and no line wrapping. Legacy
//! (plaintext) namespaces were written with the platform's default codec,
//! which wraps lines at 76 columns; [`classify_legacy_text`] reproduces that
//! codec to decide whether a legacy string carried Base64-encoded bytes.

use base64::Engine as _;
use base64::alphabet;
use base64::engine::general_purpose::STANDARD;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

/// Column at which the platform default codec breaks lines.
const WRAP_COLUMNS: usize = 76;

/// Decoder that accepts missing padding and non-canonical trailing bits.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Encode stored bytes: standard alphabet, padded, single line.
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode a stored value.
///
/// Returns `None` when the text is not valid Base64 or decodes to zero
/// bytes; both mean "no value" to the keychain.
pub fn decode_stored(text: &str) -> Option<Vec<u8>> {
    match STANDARD.decode(text) {
        Ok(bytes) if !bytes.is_empty() => Some(bytes),
        Ok(_) => None,
        Err(err) => {
            tracing::debug!(%err, "stored value is not valid base64");
            None
        }
    }
}

/// Encode like the platform default codec: 76-column lines, each
/// terminated by `\n`.
pub fn encode_wrapped(bytes: &[u8]) -> String {
    let flat = STANDARD.encode(bytes);
    let mut out = String::with_capacity(flat.len() + flat.len() / WRAP_COLUMNS + 1);
    for chunk in flat.as_bytes().chunks(WRAP_COLUMNS) {
        // The Base64 alphabet is ASCII, so every chunk is valid UTF-8.
        out.push_str(std::str::from_utf8(chunk).unwrap_or_default());
        out.push('\n');
    }
    out
}

/// Decode like the platform default codec: whitespace is skipped and
/// padding is optional.
pub fn decode_lenient(text: &str) -> Option<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    LENIENT.decode(compact).ok()
}

/// How a legacy text value was interpreted during import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyTextForm {
    /// The text was a Base64 rendering of opaque bytes.
    Base64,
    /// The text is ordinary text, imported as its UTF-8 bytes.
    Plain,
}

/// Decide which bytes a legacy text value stands for.
///
/// The text counts as Base64 when decoding it and re-encoding the bytes with
/// the platform default codec reproduces it, ignoring surrounding
/// whitespace. Otherwise the UTF-8 form of the text is used.
///
/// Short ordinary strings that happen to be canonical Base64 (for example
/// `"YQ=="`) are classified as Base64; existing namespaces depend on this.
pub fn classify_legacy_text(text: &str) -> (Vec<u8>, LegacyTextForm) {
    if let Some(bytes) = decode_lenient(text) {
        if encode_wrapped(&bytes).trim() == text.trim() {
            return (bytes, LegacyTextForm::Base64);
        }
    }
    (text.as_bytes().to_vec(), LegacyTextForm::Plain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_encoding_is_single_line() {
        let encoded = encode(&[0u8; 200]);
        assert!(!encoded.contains('\n'));
        assert_eq!(decode_stored(&encoded).unwrap(), vec![0u8; 200]);
    }

    #[test]
    fn empty_and_invalid_decode_to_none() {
        assert_eq!(decode_stored(""), None);
        assert_eq!(decode_stored("not base64!"), None);
    }

    #[test]
    fn wrapped_encoding_breaks_at_76_columns() {
        let encoded = encode_wrapped(&[0xFFu8; 60]);
        let lines: Vec<&str> = encoded.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].len(), 76);
        assert!(encoded.ends_with('\n'));
    }

    #[test]
    fn classifies_base64_bytes() {
        let (bytes, form) = classify_legacy_text("AP8=");
        assert_eq!(form, LegacyTextForm::Base64);
        assert_eq!(bytes, vec![0x00, 0xFF]);
    }

    #[test]
    fn classifies_wrapped_base64_with_trailing_newline() {
        let original = vec![7u8; 100];
        let (bytes, form) = classify_legacy_text(&encode_wrapped(&original));
        assert_eq!(form, LegacyTextForm::Base64);
        assert_eq!(bytes, original);
    }

    #[test]
    fn classifies_plain_text() {
        for text in ["bob", "hello world", "alice@example.com"] {
            let (bytes, form) = classify_legacy_text(text);
            assert_eq!(form, LegacyTextForm::Plain, "{text}");
            assert_eq!(bytes, text.as_bytes());
        }
    }

    #[test]
    fn non_canonical_base64_is_plain() {
        // Decodes leniently, but re-encodes with padding.
        let (_, form) = classify_legacy_text("AP8");
        assert_eq!(form, LegacyTextForm::Plain);
    }

    #[test]
    fn base64_looking_text_is_ambiguous() {
        let (bytes, form) = classify_legacy_text("YQ==");
        assert_eq!(form, LegacyTextForm::Base64);
        assert_eq!(bytes, b"a");
    }

    #[test]
    fn empty_text_is_empty_bytes() {
        let (bytes, form) = classify_legacy_text("");
        assert_eq!(form, LegacyTextForm::Base64);
        assert!(bytes.is_empty());
    }
}
