//! Filename extraction from Content-Disposition headers.
//!
//! The listing server answers HEAD requests with headers such as
//! `attachment; filename=Oficio_123.pdf`, sometimes quoted and sometimes in
//! ISO-8859-1. Only the simple `key=value` form is accepted.

use super::DownloadError;
use crate::text::normalize_bytes;

/// Extracts and normalizes the suggested filename from a raw header value.
///
/// The value is split once on `=`; anything but exactly two parts is
/// rejected. Surrounding whitespace, quotes and semicolons are trimmed.
///
/// # Errors
///
/// - [`DownloadError::HeaderMalformed`] if the value has no single `=`, or the
///   name is empty, `.`/`..`, or contains a path separator.
/// - [`DownloadError::Encoding`] if the name cannot be decoded.
pub(crate) fn filename_from_content_disposition(
    url: &str,
    header: &[u8],
) -> Result<String, DownloadError> {
    let malformed = || DownloadError::HeaderMalformed {
        url: url.to_string(),
        value: String::from_utf8_lossy(header).into_owned(),
    };

    let mut parts = header.split(|b| *b == b'=');
    let (Some(_), Some(raw_name), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(malformed());
    };

    let name = normalize_bytes(trim_value(raw_name)).map_err(|source| DownloadError::Encoding {
        url: url.to_string(),
        source,
    })?;

    if !is_safe_filename(&name) {
        return Err(malformed());
    }

    Ok(name)
}

fn trim_value(raw: &[u8]) -> &[u8] {
    let is_noise = |b: &u8| b.is_ascii_whitespace() || *b == b'"' || *b == b';';
    let start = raw.iter().position(|b| !is_noise(b)).unwrap_or(raw.len());
    let end = raw.iter().rposition(|b| !is_noise(b)).map_or(start, |i| i + 1);
    &raw[start..end]
}

fn is_safe_filename(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.chars().any(char::is_control)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const URL: &str = "https://example.com/documento/download/abc";

    #[test]
    fn test_unquoted_filename() {
        let name =
            filename_from_content_disposition(URL, b"attachment; filename=Oficio_123.pdf").unwrap();
        assert_eq!(name, "Oficio_123.pdf");
    }

    #[test]
    fn test_quoted_filename_is_unquoted() {
        let name =
            filename_from_content_disposition(URL, br#"attachment; filename="Relatorio.zip""#)
                .unwrap();
        assert_eq!(name, "Relatorio.zip");
    }

    #[test]
    fn test_filename_is_normalized() {
        let name = filename_from_content_disposition(
            URL,
            "attachment; filename=Ofício Ministério da Saúde.pdf".as_bytes(),
        )
        .unwrap();
        assert_eq!(name, "Oficio Ministerio da Saude.pdf");
    }

    #[test]
    fn test_latin1_filename_is_decoded() {
        let name = filename_from_content_disposition(URL, b"attachment; filename=Of\xedcio.pdf")
            .unwrap();
        assert_eq!(name, "Oficio.pdf");
    }

    #[test]
    fn test_missing_equals_is_malformed() {
        let result = filename_from_content_disposition(URL, b"attachment");
        assert!(matches!(result, Err(DownloadError::HeaderMalformed { .. })));
    }

    #[test]
    fn test_extra_equals_is_malformed() {
        let result =
            filename_from_content_disposition(URL, b"attachment; filename=a.pdf; size=10");
        assert!(matches!(result, Err(DownloadError::HeaderMalformed { .. })));
    }

    #[test]
    fn test_empty_name_is_malformed() {
        let result = filename_from_content_disposition(URL, br#"attachment; filename="""#);
        assert!(matches!(result, Err(DownloadError::HeaderMalformed { .. })));
    }

    #[test]
    fn test_path_components_are_rejected() {
        for header in [
            &b"attachment; filename=../escape.pdf"[..],
            &b"attachment; filename=dir/file.pdf"[..],
            &b"attachment; filename=..\\file.pdf"[..],
            &b"attachment; filename=.."[..],
        ] {
            let result = filename_from_content_disposition(URL, header);
            assert!(
                matches!(result, Err(DownloadError::HeaderMalformed { .. })),
                "Expected rejection for {:?}",
                String::from_utf8_lossy(header)
            );
        }
    }
}
