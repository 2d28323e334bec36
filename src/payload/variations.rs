use serde::{Deserialize, Serialize};

use super::encoding;
use crate::utils::{append_query_param, origin_of};
use crate::waf::detector::PROBE_PARAM;
use crate::waf::WafType;

/// Payload-level HTTP manipulation shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManipulationMode {
    ParameterPollution,
    NullByte,
    LineBreaks,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ManipulationOptions {
    pub parameter_pollution: bool,
    pub verb_tampering: bool,
    pub content_type_confusion: bool,
    pub header_injection: bool,
}

impl ManipulationOptions {
    pub fn all() -> Self {
        Self {
            parameter_pollution: true,
            verb_tampering: true,
            content_type_confusion: true,
            header_injection: true,
        }
    }
}

/// Descriptor of one manipulated request; not yet sent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManipulatedRequest {
    pub technique: String,
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

/// Boundary toward the bypass/encoding generators. The core only decides
/// which generator to call; the transforms themselves live behind this trait.
pub trait VariationGateway: Send + Sync {
    /// Index 0 is always the unmodified payload; 1.. are vendor-targeted
    fn vendor_variants(&self, waf: &WafType, payload: &str) -> Vec<String>;

    /// Generic obfuscations for when no vendor is known. Index 0 is the original.
    fn encoded_variants(&self, payload: &str, category: &str) -> Vec<String>;

    fn http_manipulation_variants(&self, payload: &str, mode: ManipulationMode) -> Vec<String>;

    fn build_manipulated_requests(
        &self,
        url: &str,
        method: &str,
        payload: &str,
        options: &ManipulationOptions,
    ) -> Vec<ManipulatedRequest>;
}

/// First vendor-targeted variant, or the original when none exists
pub fn first_bypass_variant(gateway: &dyn VariationGateway, waf: &WafType, payload: &str) -> String {
    gateway
        .vendor_variants(waf, payload)
        .get(1)
        .cloned()
        .unwrap_or_else(|| payload.to_string())
}

/// Default generator set
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinVariations;

type Transform = fn(&str) -> String;

const CLOUDFLARE_TRANSFORMS: &[Transform] = &[
    encoding::alternate_case,
    encoding::inline_comments,
    encoding::unicode_encode,
    encoding::double_url_encode,
];
const IMPERVA_TRANSFORMS: &[Transform] = &[encoding::double_url_encode, encoding::whitespace_tabs, encoding::alternate_case];
const AKAMAI_TRANSFORMS: &[Transform] = &[encoding::double_url_encode, encoding::inline_comments, encoding::html_decimal_entities];
const AWS_TRANSFORMS: &[Transform] = &[encoding::json_unicode_escape, encoding::url_encode, encoding::whitespace_newlines];
const MODSECURITY_TRANSFORMS: &[Transform] = &[encoding::inline_comments, encoding::alternate_case, encoding::null_byte_suffix];
const APPLIANCE_TRANSFORMS: &[Transform] = &[encoding::double_url_encode, encoding::whitespace_tabs, encoding::unicode_encode];
const GENERIC_TRANSFORMS: &[Transform] = &[encoding::url_encode, encoding::alternate_case];

fn vendor_transforms(waf: &WafType) -> &'static [Transform] {
    match waf {
        WafType::Cloudflare => CLOUDFLARE_TRANSFORMS,
        WafType::Imperva => IMPERVA_TRANSFORMS,
        WafType::Akamai => AKAMAI_TRANSFORMS,
        WafType::AwsWaf => AWS_TRANSFORMS,
        WafType::ModSecurity => MODSECURITY_TRANSFORMS,
        WafType::F5BigIP | WafType::Fortiweb | WafType::Barracuda => APPLIANCE_TRANSFORMS,
        _ => GENERIC_TRANSFORMS,
    }
}

fn dedup_preserving_order(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

impl VariationGateway for BuiltinVariations {
    fn vendor_variants(&self, waf: &WafType, payload: &str) -> Vec<String> {
        let mut out = vec![payload.to_string()];
        out.extend(vendor_transforms(waf).iter().map(|t| t(payload)));
        dedup_preserving_order(out)
    }

    fn encoded_variants(&self, payload: &str, category: &str) -> Vec<String> {
        let mut out = vec![
            payload.to_string(),
            encoding::url_encode(payload),
            encoding::double_url_encode(payload),
        ];
        let lower = category.to_ascii_lowercase();
        if lower.contains("xss") {
            out.push(encoding::html_entities(payload));
            out.push(encoding::html_decimal_entities(payload));
        } else if lower.contains("sql") {
            out.push(encoding::inline_comments(payload));
            out.push(encoding::alternate_case(payload));
        } else if lower.contains("command") || lower.contains("nosql") {
            out.push(encoding::hex_escape(payload));
            out.push(encoding::base64(payload));
        } else {
            out.push(encoding::unicode_encode(payload));
        }
        dedup_preserving_order(out)
    }

    fn http_manipulation_variants(&self, payload: &str, mode: ManipulationMode) -> Vec<String> {
        match mode {
            // Second copy of the parameter carries the payload
            ManipulationMode::ParameterPollution => vec![
                format!("1&{}={}", PROBE_PARAM, encoding::url_encode(payload)),
                format!("{}&{}=1", payload, PROBE_PARAM),
            ],
            ManipulationMode::NullByte => vec![encoding::null_byte_suffix(payload), format!("%00{}", payload)],
            ManipulationMode::LineBreaks => vec![encoding::whitespace_newlines(payload), payload.replace(' ', "%0d%0a")],
        }
    }

    fn build_manipulated_requests(
        &self,
        url: &str,
        method: &str,
        payload: &str,
        options: &ManipulationOptions,
    ) -> Vec<ManipulatedRequest> {
        let method = method.to_ascii_uppercase();
        let mut out = Vec::new();

        if options.parameter_pollution {
            let first = append_query_param(url, PROBE_PARAM, "1");
            out.push(ManipulatedRequest {
                technique: "Parameter pollution (payload last)".to_string(),
                method: method.clone(),
                url: append_query_param(&first, PROBE_PARAM, payload),
                headers: Vec::new(),
                body: None,
            });
            let first = append_query_param(url, PROBE_PARAM, payload);
            out.push(ManipulatedRequest {
                technique: "Parameter pollution (payload first)".to_string(),
                method: method.clone(),
                url: append_query_param(&first, PROBE_PARAM, "1"),
                headers: Vec::new(),
                body: None,
            });
        }

        if options.verb_tampering {
            for verb in ["HEAD", "OPTIONS", "PUT", "PATCH"].into_iter().filter(|v| *v != method) {
                out.push(ManipulatedRequest {
                    technique: format!("Verb tampering ({})", verb),
                    method: verb.to_string(),
                    url: append_query_param(url, PROBE_PARAM, payload),
                    headers: Vec::new(),
                    body: None,
                });
            }
            out.push(ManipulatedRequest {
                technique: "Method override header".to_string(),
                method: "POST".to_string(),
                url: append_query_param(url, PROBE_PARAM, payload),
                headers: vec![("X-HTTP-Method-Override".to_string(), method.clone())],
                body: None,
            });
        }

        if options.content_type_confusion {
            let json_body = serde_json::json!({ "test": payload }).to_string();
            for content_type in ["text/plain", "application/xml", "multipart/form-data; boundary=x"] {
                out.push(ManipulatedRequest {
                    technique: format!("Content-Type confusion ({})", content_type),
                    method: "POST".to_string(),
                    url: url.to_string(),
                    headers: vec![("Content-Type".to_string(), content_type.to_string())],
                    body: Some(json_body.clone()),
                });
            }
        }

        if options.header_injection {
            let host = origin_of(url)
                .and_then(|o| o.split("://").nth(1).map(str::to_string))
                .unwrap_or_default();
            let headers = vec![
                ("X-Forwarded-For".to_string(), "127.0.0.1".to_string()),
                ("X-Real-IP".to_string(), "127.0.0.1".to_string()),
                ("X-Originating-IP".to_string(), "127.0.0.1".to_string()),
                ("X-Forwarded-Host".to_string(), host),
            ];
            out.push(ManipulatedRequest {
                technique: "Header injection (internal origin)".to_string(),
                method,
                url: append_query_param(url, PROBE_PARAM, payload),
                headers,
                body: None,
            });
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_variants_start_with_original() {
        let gw = BuiltinVariations;
        let payload = "1 UNION SELECT 1";
        let variants = gw.vendor_variants(&WafType::Cloudflare, payload);
        assert_eq!(variants[0], payload);
        assert!(variants.len() > 1);
        assert!(variants.contains(&"1/**/UNION/**/SELECT/**/1".to_string()));
    }

    #[test]
    fn test_first_bypass_variant_falls_back_to_original() {
        let gw = BuiltinVariations;
        // Nothing for inline comments or casing to change
        let variants = gw.vendor_variants(&WafType::ModSecurity, "1");
        assert_eq!(variants, vec!["1".to_string(), "1%00".to_string()]);
        assert_eq!(first_bypass_variant(&gw, &WafType::ModSecurity, "1"), "1%00");

        let unknown = WafType::Unknown("Acme".to_string());
        assert_eq!(gw.vendor_variants(&unknown, "123"), vec!["123".to_string()]);
        assert_eq!(first_bypass_variant(&gw, &unknown, "123"), "123");
    }

    #[test]
    fn test_encoded_variants_by_category() {
        let gw = BuiltinVariations;
        let xss = gw.encoded_variants("<b>", "XSS");
        assert_eq!(xss[0], "<b>");
        assert!(xss.contains(&"&#60;&#98;&#62;".to_string()));
        let sql = gw.encoded_variants("a b", "SQL Injection");
        assert!(sql.contains(&"a/**/b".to_string()));
    }

    #[test]
    fn test_manipulated_requests() {
        let gw = BuiltinVariations;
        let reqs = gw.build_manipulated_requests("http://t.test/api", "get", "<x>", &ManipulationOptions::all());
        assert!(reqs.iter().any(|r| r.url == "http://t.test/api?test=1&test=%3Cx%3E"));
        assert!(reqs.iter().any(|r| r.method == "OPTIONS"));
        assert!(!reqs.iter().any(|r| r.technique == "Verb tampering (GET)"));
        assert!(reqs.iter().any(|r| r.headers.iter().any(|(k, v)| k == "X-Forwarded-Host" && v == "t.test")));

        let none = gw.build_manipulated_requests("http://t.test/", "GET", "x", &ManipulationOptions::default());
        assert!(none.is_empty());
    }
}
