//! String transforms shared by the payload sets and the variation gateway.

use base64::Engine as _;

pub fn url_encode(input: &str) -> String {
    urlencoding::encode(input).into_owned()
}

pub fn double_url_encode(input: &str) -> String {
    urlencoding::encode(&urlencoding::encode(input)).into_owned()
}

/// IIS-style `%uXXXX` escapes for every non-alphanumeric character
pub fn unicode_encode(input: &str) -> String {
    input
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_string()
            } else {
                format!("%u{:04X}", c as u32)
            }
        })
        .collect()
}

/// `\uXXXX` escapes for every alphabetic character, as accepted inside JSON strings
pub fn json_unicode_escape(input: &str) -> String {
    input
        .chars()
        .map(|c| {
            if c.is_ascii_alphabetic() {
                format!("\\u{:04x}", c as u32)
            } else {
                c.to_string()
            }
        })
        .collect()
}

pub fn html_entities(input: &str) -> String {
    html_escape::encode_quoted_attribute(input).into_owned()
}

/// Decimal entity for every character, not just the unsafe ones
pub fn html_decimal_entities(input: &str) -> String {
    input.chars().map(|c| format!("&#{};", c as u32)).collect()
}

pub fn base64(input: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(input)
}

pub fn hex_escape(input: &str) -> String {
    input.bytes().map(|b| format!("\\x{:02x}", b)).collect()
}

/// Deterministic alternating case: sElEcT
pub fn alternate_case(input: &str) -> String {
    let mut upper = false;
    input
        .chars()
        .map(|c| {
            if c.is_ascii_alphabetic() {
                upper = !upper;
                if upper {
                    c.to_ascii_lowercase()
                } else {
                    c.to_ascii_uppercase()
                }
            } else {
                c
            }
        })
        .collect()
}

/// Replace spaces with SQL inline comments
pub fn inline_comments(input: &str) -> String {
    input.replace(' ', "/**/")
}

/// Replace spaces with URL-encoded tabs. The `%XX` output is a wire form:
/// query builders pass it through, headers and bodies carry it literally.
pub fn whitespace_tabs(input: &str) -> String {
    input.replace(' ', "%09")
}

/// Replace spaces with encoded newlines
pub fn whitespace_newlines(input: &str) -> String {
    input.replace(' ', "%0a")
}

pub fn null_byte_suffix(input: &str) -> String {
    format!("{}%00", input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encodings() {
        assert_eq!(url_encode("<a b>"), "%3Ca%20b%3E");
        assert_eq!(double_url_encode("<"), "%253C");
        assert_eq!(unicode_encode("a<"), "a%u003C");
        assert_eq!(json_unicode_escape("a1"), "\\u00611");
        assert_eq!(base64("abc"), "YWJj");
        assert_eq!(hex_escape("A"), "\\x41");
        assert_eq!(html_decimal_entities("<"), "&#60;");
        assert_eq!(alternate_case("select"), "sElEcT");
        assert_eq!(inline_comments("UNION SELECT"), "UNION/**/SELECT");
    }

    #[test]
    fn test_control_char_forms_reach_query_once_encoded() {
        use crate::utils::append_query_param;
        let url = "http://t.test/";
        assert_eq!(append_query_param(url, "test", &whitespace_tabs("1 OR 1")), "http://t.test/?test=1%09OR%091");
        assert_eq!(append_query_param(url, "test", &whitespace_newlines("a b")), "http://t.test/?test=a%0ab");
        assert_eq!(append_query_param(url, "test", &null_byte_suffix("x.php")), "http://t.test/?test=x.php%00");
        assert_eq!(append_query_param(url, "test", &double_url_encode("<")), "http://t.test/?test=%253C");
    }
}
