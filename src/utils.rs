use url::Url;

use crate::error::{ProberError, Result};

/// Append a query parameter without re-normalizing the URL, so host and
/// path casing survive untouched. The value keeps any `%XX` escapes it
/// already carries, so pre-encoded payloads go out with a single layer.
pub fn append_query_param(url: &str, name: &str, value: &str) -> String {
    let (base, fragment) = match url.split_once('#') {
        Some((b, f)) => (b, Some(f)),
        None => (url, None),
    };
    let sep = if base.contains('?') { '&' } else { '?' };
    let mut out = format!("{}{}{}={}", base, sep, urlencoding::encode(name), encode_keeping_escapes(value));
    if let Some(f) = fragment {
        out.push('#');
        out.push_str(f);
    }
    out
}

/// Percent-encode `value`, passing well-formed `%XX` escapes through as-is.
/// A lone `%` is still encoded as `%25`.
pub fn encode_keeping_escapes(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = String::with_capacity(value.len());
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        let escape = bytes[i] == b'%'
            && i + 2 < bytes.len()
            && bytes[i + 1].is_ascii_hexdigit()
            && bytes[i + 2].is_ascii_hexdigit();
        if escape {
            out.push_str(&urlencoding::encode(&value[start..i]));
            out.push_str(&value[i..i + 3]);
            i += 3;
            start = i;
        } else {
            i += 1;
        }
    }
    out.push_str(&urlencoding::encode(&value[start..]));
    out
}

/// `scheme://authority` of a URL, preserving the original casing
pub fn origin_of(url: &str) -> Option<String> {
    let scheme_end = url.find("://")?;
    let rest = &url[scheme_end + 3..];
    let authority_end = rest.find(|c: char| c == '/' || c == '?' || c == '#').unwrap_or(rest.len());
    if authority_end == 0 {
        return None;
    }
    Some(url[..scheme_end + 3 + authority_end].to_string())
}

/// Parse and require an http(s) URL with a host
pub fn parse_target_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url.trim())?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(parsed),
        _ => Err(ProberError::Validation(format!("not an http(s) URL: {}", url))),
    }
}

pub fn is_http_url(url: &str) -> bool {
    parse_target_url(url).is_ok()
}
