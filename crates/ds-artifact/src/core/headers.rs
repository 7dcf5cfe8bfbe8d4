use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

use crate::data::ArtifactMetadata;

/// Bytes escaped in an RFC 5987 `ext-value`: everything but `attr-char`.
const EXT_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

/// Case-insensitive header lookup; the first match wins.
pub fn header_value<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Extract the file name from a `Content-Disposition` value.
///
/// `filename*=UTF-8''...` takes precedence over a plain `filename=`.
/// Directory components are stripped so the name is safe to join onto a
/// local directory.
pub fn parse_content_disposition(value: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;

    for param in value.split(';').map(str::trim) {
        let Some((key, raw)) = param.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                // charset'language'percent-encoded
                let encoded = raw.trim().splitn(3, '\'').nth(2).unwrap_or(raw.trim());
                extended = Some(percent_decode_str(encoded).decode_utf8_lossy().into_owned());
            }
            "filename" => plain = Some(unquote(raw.trim())),
            _ => {}
        }
    }

    extended
        .or(plain)
        .map(|name| sanitize_file_name(&name))
        .filter(|name| !name.is_empty())
}

/// Build metadata from response headers. `fallback_name` is used when the
/// backend does not advertise a file name.
pub fn parse_metadata(headers: &[(String, String)], fallback_name: &str) -> ArtifactMetadata {
    let owned = |name: &str| header_value(headers, name).map(str::to_string);

    ArtifactMetadata {
        file_name:     header_value(headers, "content-disposition")
            .and_then(parse_content_disposition)
            .unwrap_or_else(|| sanitize_file_name(fallback_name)),
        size:          header_value(headers, "content-length").and_then(|v| v.trim().parse().ok()),
        content_type:  owned("content-type"),
        etag:          owned("etag"),
        last_modified: owned("last-modified"),
    }
}

/// `Content-Disposition` value announcing an uploaded file's name.
///
/// Non-ASCII names also get an RFC 5987 `filename*` parameter.
pub fn content_disposition(file_name: &str) -> String {
    let plain: String = file_name
        .chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '_' })
        .collect();
    let quoted = plain.replace('\\', "\\\\").replace('"', "\\\"");
    if plain == file_name {
        return format!("attachment; filename=\"{quoted}\"");
    }
    format!(
        "attachment; filename=\"{quoted}\"; filename*=UTF-8''{}",
        utf8_percent_encode(file_name, EXT_VALUE)
    )
}

fn unquote(s: &str) -> String {
    let s = s.strip_prefix('"').and_then(|s| s.strip_suffix('"')).unwrap_or(s);
    s.replace("\\\"", "\"")
}

fn sanitize_file_name(name: &str) -> String {
    name.rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
        .trim_start_matches('.')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let h = headers(&[("Content-Length", "12")]);
        assert_eq!(header_value(&h, "content-length"), Some("12"));
        assert_eq!(header_value(&h, "etag"), None);
    }

    #[test]
    fn disposition_plain_and_quoted() {
        assert_eq!(
            parse_content_disposition("attachment; filename=artifact.zip"),
            Some("artifact.zip".into())
        );
        assert_eq!(
            parse_content_disposition("attachment; filename=\"my model.zip\""),
            Some("my model.zip".into())
        );
    }

    #[test]
    fn disposition_extended_wins() {
        assert_eq!(
            parse_content_disposition(
                "attachment; filename=\"fallback.zip\"; filename*=UTF-8''r%C3%A9sum%C3%A9.zip"
            ),
            Some("résumé.zip".into())
        );
    }

    #[test]
    fn disposition_strips_directories() {
        assert_eq!(
            parse_content_disposition("attachment; filename=\"../../etc/passwd\""),
            Some("passwd".into())
        );
        assert_eq!(parse_content_disposition("attachment; filename=\"..\""), None);
        assert_eq!(parse_content_disposition("inline"), None);
    }

    #[test]
    fn disposition_for_upload() {
        assert_eq!(
            content_disposition("model.zip"),
            "attachment; filename=\"model.zip\""
        );
        let value = content_disposition("résumé.zip");
        assert_eq!(
            value,
            "attachment; filename=\"r_sum_.zip\"; filename*=UTF-8''r%C3%A9sum%C3%A9.zip"
        );
        assert_eq!(parse_content_disposition(&value), Some("résumé.zip".into()));
    }

    #[test]
    fn extended_value_escapes_all_but_attr_chars() {
        let value = content_disposition("mödel v1+2.zip");
        assert_eq!(
            value,
            "attachment; filename=\"m_del v1+2.zip\"; filename*=UTF-8''m%C3%B6del%20v1+2.zip"
        );
        assert_eq!(parse_content_disposition(&value), Some("mödel v1+2.zip".into()));
    }

    #[test]
    fn malformed_escapes_are_kept() {
        assert_eq!(
            parse_content_disposition("attachment; filename*=UTF-8''100%25%zz.zip"),
            Some("100%%zz.zip".into())
        );
    }

    #[test]
    fn metadata_from_headers() {
        let h = headers(&[
            ("content-length", "1000"),
            ("content-disposition", "attachment; filename=artifact.zip"),
            ("content-type", "application/octet-stream"),
            ("ETag", "\"abc\""),
        ]);
        let meta = parse_metadata(&h, "ocid1.model");
        assert_eq!(meta.file_name, "artifact.zip");
        assert_eq!(meta.size, Some(1000));
        assert_eq!(meta.content_type.as_deref(), Some("application/octet-stream"));
        assert_eq!(meta.etag.as_deref(), Some("\"abc\""));
        assert_eq!(meta.last_modified, None);
    }

    #[test]
    fn metadata_fallback_name() {
        let meta = parse_metadata(&[], "ocid1.model");
        assert_eq!(meta.file_name, "ocid1.model");
        assert_eq!(meta.size, None);
    }
}
