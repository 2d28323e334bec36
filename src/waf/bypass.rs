use serde::{Deserialize, Serialize};

use super::signatures::WafType;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BypassTechnique {
    // Encoding techniques
    UrlEncoding,
    DoubleUrlEncoding,
    UnicodeEncoding,
    MixedCaseEncoding,
    InlineComments,

    // HTTP manipulation
    VerbTampering(Vec<String>),
    ContentTypeManipulation(Vec<String>),
    HeaderInjection(Vec<(String, String)>),
    ParameterPollution,

    // Path manipulation
    PathObfuscation,
    NullByteInjection,

    // Payload restructuring
    WhitespaceSubstitution,
    JsonUnicodeEscapes,
    ChunkedBody,
}

impl BypassTechnique {
    /// Human-readable suggestion line
    pub fn describe(&self) -> String {
        match self {
            BypassTechnique::UrlEncoding => "URL encode special characters to bypass signature matching".to_string(),
            BypassTechnique::DoubleUrlEncoding => "Double URL encoding to evade single-pass decoders".to_string(),
            BypassTechnique::UnicodeEncoding => "Unicode (%uXXXX) encoding of keyword characters".to_string(),
            BypassTechnique::MixedCaseEncoding => "Alternate keyword casing (SeLeCt, ScRiPt)".to_string(),
            BypassTechnique::InlineComments => "Split SQL keywords with inline comments (UN/**/ION)".to_string(),
            BypassTechnique::VerbTampering(verbs) => {
                format!("Use alternative HTTP methods that may not be filtered ({})", verbs.join(", "))
            }
            BypassTechnique::ContentTypeManipulation(types) => {
                format!("Change Content-Type to bypass body inspection ({})", types.join(", "))
            }
            BypassTechnique::HeaderInjection(headers) => {
                let names: Vec<String> = headers.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
                format!("Inject headers to appear as an internal request ({})", names.join(", "))
            }
            BypassTechnique::ParameterPollution => "Send the same parameter multiple times to confuse parsing".to_string(),
            BypassTechnique::PathObfuscation => "Add //, /./, trailing slashes to obfuscate paths".to_string(),
            BypassTechnique::NullByteInjection => "Inject null bytes (%00) to truncate inspected strings".to_string(),
            BypassTechnique::WhitespaceSubstitution => "Replace spaces with tabs, newlines or /**/".to_string(),
            BypassTechnique::JsonUnicodeEscapes => "Escape payload characters as \\uXXXX inside JSON bodies".to_string(),
            BypassTechnique::ChunkedBody => "Oversized or chunked bodies that exceed the inspection window".to_string(),
        }
    }
}

/// Recommended bypass strategies for an actively blocking vendor
pub fn strategies_for(waf_type: &WafType) -> Vec<BypassTechnique> {
    match waf_type {
        WafType::Cloudflare => vec![
            BypassTechnique::MixedCaseEncoding,
            BypassTechnique::UnicodeEncoding,
            BypassTechnique::HeaderInjection(vec![
                ("X-Forwarded-For".to_string(), "127.0.0.1".to_string()),
                ("X-Real-IP".to_string(), "127.0.0.1".to_string()),
            ]),
            BypassTechnique::VerbTampering(vec!["HEAD".to_string(), "OPTIONS".to_string()]),
            BypassTechnique::ChunkedBody,
        ],
        WafType::Imperva => vec![
            BypassTechnique::DoubleUrlEncoding,
            BypassTechnique::ContentTypeManipulation(vec![
                "text/plain".to_string(),
                "application/x-www-form-urlencoded".to_string(),
            ]),
            BypassTechnique::WhitespaceSubstitution,
            BypassTechnique::VerbTampering(vec!["PUT".to_string(), "PATCH".to_string()]),
        ],
        WafType::Akamai => vec![
            BypassTechnique::HeaderInjection(vec![
                ("X-Forwarded-Host".to_string(), "localhost".to_string()),
                ("X-Original-URL".to_string(), "/".to_string()),
            ]),
            BypassTechnique::PathObfuscation,
            BypassTechnique::DoubleUrlEncoding,
            BypassTechnique::InlineComments,
        ],
        WafType::ModSecurity => vec![
            BypassTechnique::MixedCaseEncoding,
            BypassTechnique::InlineComments,
            BypassTechnique::UrlEncoding,
            BypassTechnique::NullByteInjection,
        ],
        WafType::AwsWaf => vec![
            BypassTechnique::JsonUnicodeEscapes,
            BypassTechnique::ChunkedBody,
            BypassTechnique::VerbTampering(vec!["OPTIONS".to_string(), "HEAD".to_string()]),
            BypassTechnique::HeaderInjection(vec![
                ("X-Forwarded-For".to_string(), "10.0.0.1".to_string()),
            ]),
        ],
        WafType::F5BigIP | WafType::Fortiweb | WafType::Barracuda => vec![
            BypassTechnique::ParameterPollution,
            BypassTechnique::ContentTypeManipulation(vec!["multipart/form-data".to_string()]),
            BypassTechnique::DoubleUrlEncoding,
            BypassTechnique::PathObfuscation,
        ],
        _ => generic_strategies(),
    }
}

pub fn generic_strategies() -> Vec<BypassTechnique> {
    vec![
        BypassTechnique::PathObfuscation,
        BypassTechnique::VerbTampering(vec![
            "HEAD".to_string(),
            "OPTIONS".to_string(),
            "PUT".to_string(),
        ]),
        BypassTechnique::UrlEncoding,
        BypassTechnique::MixedCaseEncoding,
        BypassTechnique::HeaderInjection(vec![
            ("X-Forwarded-For".to_string(), "127.0.0.1".to_string()),
        ]),
    ]
}

/// Suggestion strings keyed by the verdict's WAF name
pub fn suggested_techniques(waf_name: &str) -> Vec<String> {
    strategies_for(&WafType::from_name(waf_name))
        .iter()
        .map(BypassTechnique::describe)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_specific_suggestions() {
        let cf = suggested_techniques("Cloudflare");
        assert!(cf.iter().any(|s| s.contains("X-Forwarded-For")));
        assert_eq!(cf.len(), strategies_for(&WafType::Cloudflare).len());
    }

    #[test]
    fn test_unknown_falls_back_to_generic() {
        let unknown = suggested_techniques("Unknown WAF");
        assert_eq!(unknown.len(), generic_strategies().len());
    }
}
