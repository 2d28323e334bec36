use serde_json::{Map, Value};

use crate::config::BodyFormat;

pub const PLACEHOLDER: &str = "{PAYLOAD}";

/// Field used when no usable template is supplied
pub const DEFAULT_FIELD: &str = "test";

/// Replace the placeholder in every string, key and nested value
pub fn substitute_value(value: &Value, payload: &str) -> Value {
    match value {
        Value::String(s) => Value::String(s.replace(PLACEHOLDER, payload)),
        Value::Array(items) => Value::Array(items.iter().map(|v| substitute_value(v, payload)).collect()),
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.replace(PLACEHOLDER, payload), substitute_value(v, payload));
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

fn template_or_default(template: Option<&str>, payload: &str) -> Value {
    template
        .and_then(|t| serde_json::from_str::<Value>(t).ok())
        .map(|v| substitute_value(&v, payload))
        .unwrap_or_else(|| {
            let mut map = Map::new();
            map.insert(DEFAULT_FIELD.to_string(), Value::String(payload.to_string()));
            Value::Object(map)
        })
}

/// Request body for a payload. Invalid or missing templates fall back to `{"test": payload}`.
pub fn render_body(template: Option<&str>, payload: &str, format: BodyFormat) -> String {
    let value = template_or_default(template, payload);
    match format {
        BodyFormat::Json => value.to_string(),
        BodyFormat::Form => {
            let mut form = url::form_urlencoded::Serializer::new(String::new());
            match &value {
                Value::Object(map) => {
                    for (k, v) in map {
                        match v {
                            Value::String(s) => form.append_pair(k, s),
                            other => form.append_pair(k, &other.to_string()),
                        };
                    }
                }
                other => {
                    form.append_pair(DEFAULT_FIELD, &other.to_string());
                }
            }
            form.finish()
        }
    }
}

pub fn content_type(format: BodyFormat) -> &'static str {
    match format {
        BodyFormat::Json => "application/json",
        BodyFormat::Form => "application/x-www-form-urlencoded",
    }
}

/// Parse raw `Name: Value` lines; blank or malformed lines are skipped
pub fn parse_header_block(block: &str) -> Vec<(String, String)> {
    block
        .lines()
        .filter_map(|line| {
            let (name, value) = line.split_once(':')?;
            let name = name.trim();
            if name.is_empty() || name.contains(char::is_whitespace) {
                return None;
            }
            Some((name.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Caller headers with the placeholder substituted. The block is parsed first,
/// and line breaks in the payload are flattened so it stays inside its header.
pub fn render_custom_headers(block: &str, payload: &str) -> Vec<(String, String)> {
    let flat = payload.lines().map(str::trim).filter(|l| !l.is_empty()).collect::<Vec<_>>().join(" ");
    parse_header_block(block)
        .into_iter()
        .map(|(name, value)| (name, value.replace(PLACEHOLDER, &flat)))
        .collect()
}

/// Merge `overrides` into `base`; names compare case-insensitively and overrides win
pub fn merge_headers(base: &mut Vec<(String, String)>, overrides: Vec<(String, String)>) {
    for (name, value) in overrides {
        base.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        base.push((name, value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_substitution() {
        let template = r#"{"user":{"name":"{PAYLOAD}","tags":["a","x{PAYLOAD}"]},"n":1}"#;
        let body = render_body(Some(template), "<p>", BodyFormat::Json);
        let v: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(v, json!({"user":{"name":"<p>","tags":["a","x<p>"]},"n":1}));
    }

    #[test]
    fn test_invalid_or_missing_template_uses_test_field() {
        let v: Value = serde_json::from_str(&render_body(Some("{not json"), "' OR 1=1", BodyFormat::Json)).unwrap();
        assert_eq!(v, json!({"test": "' OR 1=1"}));
        let v: Value = serde_json::from_str(&render_body(None, "x", BodyFormat::Json)).unwrap();
        assert_eq!(v, json!({"test": "x"}));
    }

    #[test]
    fn test_form_body() {
        assert_eq!(render_body(None, "a b&c", BodyFormat::Form), "test=a+b%26c");
        assert_eq!(render_body(Some(r#"{"q":"{PAYLOAD}","page":2}"#), "z", BodyFormat::Form), "page=2&q=z");
    }

    #[test]
    fn test_header_block_and_merge() {
        let parsed = parse_header_block("X-One: 1\nbad line\n  \nX-Two: a: b");
        assert_eq!(parsed, vec![("X-One".into(), "1".into()), ("X-Two".into(), "a: b".into())]);

        let mut headers = vec![("User-Agent".to_string(), "probe".to_string()), ("X-A".to_string(), "1".to_string())];
        merge_headers(&mut headers, render_custom_headers("user-agent: {PAYLOAD}", "evil"));
        assert_eq!(headers, vec![("X-A".into(), "1".into()), ("user-agent".into(), "evil".into())]);
    }

    #[test]
    fn test_multiline_payload_stays_in_its_header() {
        let rendered = render_custom_headers("X-Echo: {PAYLOAD}\nX-Static: 1", "X-Injected: 1\r\nHost: evil.test");
        assert_eq!(
            rendered,
            vec![("X-Echo".into(), "X-Injected: 1 Host: evil.test".into()), ("X-Static".into(), "1".into())]
        );
    }
}
