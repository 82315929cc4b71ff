//! Local filename for a download.
//!
//! Preference order: `Content-Disposition` (`filename*` over `filename`), then
//! the last URL path segment, then [`FALLBACK_FILENAME`]. Whatever wins is
//! reduced to a single safe path component.

use url::Url;

pub const FALLBACK_FILENAME: &str = "download.bin";

const NAME_MAX: usize = 255;

/// Picks and sanitizes the filename for `url`.
pub fn derive_filename(url: &str, content_disposition: Option<&str>) -> String {
    content_disposition
        .and_then(filename_from_disposition)
        .map(|n| sanitize(&n))
        .filter(|n| !n.is_empty())
        .or_else(|| filename_from_url(url).map(|n| sanitize(&n)))
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| FALLBACK_FILENAME.to_string())
}

/// Last non-empty path segment, percent-decoded.
pub fn filename_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let last = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let decoded = percent_decode(last).unwrap_or_else(|| last.to_string());
    Some(decoded)
}

/// Filename parameter of a `Content-Disposition` value. An RFC 5987
/// `filename*=charset''value` wins over a plain `filename=`.
pub fn filename_from_disposition(value: &str) -> Option<String> {
    let mut plain = None;
    for param in value.split(';').map(str::trim) {
        let Some((key, raw)) = param.split_once('=') else {
            continue;
        };
        let raw = raw.trim();
        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                let encoded = raw.splitn(3, '\'').nth(2).unwrap_or(raw);
                if let Some(name) = percent_decode(unquote(encoded).as_str()) {
                    if !name.is_empty() {
                        return Some(name);
                    }
                }
            }
            "filename" => {
                let name = unquote(raw);
                if !name.is_empty() {
                    plain = Some(name);
                }
            }
            _ => {}
        }
    }
    plain
}

fn unquote(raw: &str) -> String {
    let Some(inner) = raw
        .strip_prefix('"')
        .and_then(|r| r.strip_suffix('"'))
    else {
        return raw.to_string();
    };
    let mut out = String::with_capacity(inner.len());
    let mut escaped = false;
    for c in inner.chars() {
        if escaped {
            out.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else {
            out.push(c);
        }
    }
    out
}

/// `None` on a malformed escape or non-UTF-8 result.
fn percent_decode(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = s.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

/// One path component: separators, control characters and whitespace become
/// `_` (runs collapsed), leading/trailing dots and underscores are stripped,
/// and the result is capped at 255 bytes.
pub fn sanitize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        let unsafe_char = matches!(c, '/' | '\\' | '\0') || c.is_control() || c.is_whitespace();
        if unsafe_char {
            if !out.ends_with('_') {
                out.push('_');
            }
        } else {
            out.push(c);
        }
    }
    let trimmed = out.trim_matches(|c| c == '.' || c == '_');
    let mut end = trimmed.len().min(NAME_MAX);
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    trimmed[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_last_segment() {
        assert_eq!(
            derive_filename("https://cdn.example.com/path/to/debian-12.iso", None),
            "debian-12.iso"
        );
        assert_eq!(
            derive_filename("https://example.com/dir/file.zip?token=abc", None),
            "file.zip"
        );
        assert_eq!(derive_filename("https://example.com/a/b/", None), "b");
        assert_eq!(derive_filename("ftp://example.com/my%20file.tar", None), "my_file.tar");
    }

    #[test]
    fn disposition_wins_over_url() {
        assert_eq!(
            derive_filename(
                "https://example.com/archive.zip",
                Some("attachment; filename=\"real-name.tar.gz\"")
            ),
            "real-name.tar.gz"
        );
        assert_eq!(
            derive_filename("https://example.com/x", Some("attachment; filename=simple.bin")),
            "simple.bin"
        );
    }

    #[test]
    fn extended_filename_preferred() {
        let v = "attachment; filename=\"plain.txt\"; filename*=UTF-8''na%C3%AFve%20file.txt";
        assert_eq!(filename_from_disposition(v).as_deref(), Some("naïve file.txt"));
        assert_eq!(derive_filename("https://e.com/", Some(v)), "naïve_file.txt");
    }

    #[test]
    fn quoted_escapes() {
        assert_eq!(
            filename_from_disposition(r#"inline; filename="a\"b.txt""#).as_deref(),
            Some("a\"b.txt")
        );
        assert_eq!(filename_from_disposition("inline"), None);
    }

    #[test]
    fn fallback_when_nothing_usable() {
        assert_eq!(derive_filename("https://example.com/", None), FALLBACK_FILENAME);
        assert_eq!(derive_filename("https://example.com", None), FALLBACK_FILENAME);
        assert_eq!(derive_filename("https://example.com/..%2F..", None), FALLBACK_FILENAME);
        assert_eq!(
            derive_filename("https://example.com/", Some("attachment; filename=\"...\"")),
            FALLBACK_FILENAME
        );
    }

    #[test]
    fn sanitize_strips_separators_and_caps_length() {
        assert_eq!(sanitize("a/b\\c.txt"), "a_b_c.txt");
        assert_eq!(sanitize("  ..file  name.txt.. "), "file_name.txt");
        assert_eq!(sanitize("x\x00y"), "x_y");
        assert_eq!(sanitize(&"é".repeat(200)).len(), 254);
    }
}
