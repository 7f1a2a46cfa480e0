//! Filename normalization.
//!
//! Names proposed by the remote server (Content-Disposition) and names stored
//! inside zip archives frequently carry diacritics, and sometimes arrive in a
//! legacy single-byte encoding. Everything written to disk goes through
//! [`normalize`] or [`normalize_bytes`] first.

use encoding_rs::WINDOWS_1252;
use thiserror::Error;
use tracing::debug;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// A name that could not be decoded into text.
#[derive(Debug, Error)]
#[error("cannot decode name {lossy:?} as UTF-8 or ISO-8859-1")]
pub struct EncodingError {
    /// Lossy rendering of the offending bytes, for diagnostics only.
    pub lossy: String,
}

/// Strips diacritics from `value`.
///
/// Applies canonical decomposition, drops every combining mark and recomposes,
/// so `"Genocídio"` becomes `"Genocidio"`. Path separators, drive letters and
/// plain ASCII pass through untouched, and the function is idempotent.
#[must_use]
pub fn normalize(value: &str) -> String {
    value
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .nfc()
        .collect()
}

/// Decodes raw name bytes and normalizes the result.
///
/// Bytes are read as UTF-8 first. Anything else is treated as ISO-8859-1
/// (decoded through its WHATWG superset, windows-1252), which is what older
/// servers and zip tools emit for Portuguese names.
///
/// # Errors
///
/// windows-1252 assigns a character to every byte value, so the fallback
/// always succeeds and [`EncodingError`] is not produced for any input today.
pub fn normalize_bytes(raw: &[u8]) -> Result<String, EncodingError> {
    if let Ok(text) = std::str::from_utf8(raw) {
        return Ok(normalize(text));
    }

    debug!(bytes = raw.len(), "name is not UTF-8, falling back to ISO-8859-1");
    WINDOWS_1252
        .decode_without_bom_handling_and_without_replacement(raw)
        .map(|decoded| normalize(&decoded))
        .ok_or_else(|| EncodingError {
            lossy: String::from_utf8_lossy(raw).into_owned(),
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_diacritics() {
        assert_eq!(normalize("àéîõüç"), "aeiouc");
    }

    #[test]
    fn test_normalize_keeps_plain_ascii() {
        assert_eq!(normalize("aeiou"), "aeiou");
    }

    #[test]
    fn test_normalize_empty() {
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_normalize_keeps_path_separators() {
        assert_eq!(
            normalize("/mnt/data/CPI do Genocídio"),
            "/mnt/data/CPI do Genocidio"
        );
    }

    #[test]
    fn test_normalize_keeps_drive_letter() {
        assert_eq!(normalize("c:\\Teste"), "c:\\Teste");
    }

    #[test]
    fn test_normalize_precomposed_and_decomposed_agree() {
        // "é" as one code point vs "e" + combining acute accent
        assert_eq!(normalize("caf\u{e9}"), normalize("cafe\u{301}"));
        assert_eq!(normalize("cafe\u{301}"), "cafe");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for value in ["Ofício nº 123 - Ministério da Saúde.pdf", "ação", "", "x/y\\z"] {
            let once = normalize(value);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn test_normalize_bytes_utf8() {
        let raw = "Relatório.zip".as_bytes();
        assert_eq!(normalize_bytes(raw).unwrap(), "Relatorio.zip");
    }

    #[test]
    fn test_normalize_bytes_latin1_fallback() {
        // "Ofício" encoded as ISO-8859-1: 0xED is "í"
        let raw = b"Of\xedcio.pdf";
        assert_eq!(normalize_bytes(raw).unwrap(), "Oficio.pdf");
    }

    #[test]
    fn test_normalize_bytes_accepts_every_single_byte() {
        let raw: Vec<u8> = (0x80..=0xff).collect();
        assert!(normalize_bytes(&raw).is_ok());
    }

    #[test]
    fn test_encoding_error_display_is_lossy() {
        let error = EncodingError {
            lossy: "a\u{fffd}b".to_string(),
        };
        assert!(error.to_string().contains("cannot decode name"));
    }
}
