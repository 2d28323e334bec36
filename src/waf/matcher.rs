use serde::{Deserialize, Serialize};

use super::signatures::{Signature, WafType, SIGNATURES};
use crate::http_client::{FetchResponse, ResponseHeaders};

/// Vendor name reported when nothing matched
pub const UNKNOWN_VENDOR: &str = "Unknown";

/// Per-rule scores. Active-probe scoring discounts headers the clean
/// baseline already carried, so shared infrastructure headers are not
/// credited as evidence of blocking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Weights {
    pub header: u32,
    pub header_in_baseline: u32,
    pub cookie: u32,
    pub status: u32,
    pub body: u32,
}

pub const PASSIVE_WEIGHTS: Weights = Weights { header: 25, header_in_baseline: 25, cookie: 20, status: 15, body: 25 };
pub const PROBE_WEIGHTS: Weights = Weights { header: 35, header_in_baseline: 5, cookie: 15, status: 20, body: 25 };

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureMatch {
    pub waf_type: Option<WafType>,
    pub vendor: String,
    /// Additive, unbounded score
    pub confidence: u32,
    pub evidence: Vec<String>,
}

impl SignatureMatch {
    pub fn none() -> Self {
        Self {
            waf_type: None,
            vendor: UNKNOWN_VENDOR.to_string(),
            confidence: 0,
            evidence: Vec::new(),
        }
    }

    pub fn is_match(&self) -> bool {
        self.confidence > 0
    }
}

/// Scores responses against a signature table
#[derive(Debug, Clone, Copy)]
pub struct SignatureMatcher<'a> {
    signatures: &'a [Signature],
}

impl Default for SignatureMatcher<'static> {
    fn default() -> Self {
        Self { signatures: SIGNATURES.as_slice() }
    }
}

impl<'a> SignatureMatcher<'a> {
    pub fn new(signatures: &'a [Signature]) -> Self {
        Self { signatures }
    }

    /// Passive scoring of a single response
    pub fn match_signature(&self, response: &FetchResponse) -> SignatureMatch {
        self.best_match(response, None, PASSIVE_WEIGHTS)
    }

    /// Active-probe scoring against the clean baseline's headers
    pub fn analyze_probe_response(&self, response: &FetchResponse, baseline_headers: &ResponseHeaders) -> SignatureMatch {
        self.best_match(response, Some(baseline_headers), PROBE_WEIGHTS)
    }

    fn best_match(&self, response: &FetchResponse, baseline: Option<&ResponseHeaders>, weights: Weights) -> SignatureMatch {
        let mut best = SignatureMatch::none();
        for sig in self.signatures {
            let (confidence, evidence) = score_signature(sig, response, baseline, weights);
            // Strictly greater wins; ties keep the first-seen signature
            if confidence > best.confidence {
                best = SignatureMatch {
                    waf_type: Some(sig.waf_type.clone()),
                    vendor: sig.waf_type.name().to_string(),
                    confidence,
                    evidence,
                };
            }
        }
        best
    }
}

fn score_signature(
    sig: &Signature,
    response: &FetchResponse,
    baseline: Option<&ResponseHeaders>,
    weights: Weights,
) -> (u32, Vec<String>) {
    let mut confidence = 0u32;
    let mut evidence = Vec::new();

    for (name, matcher) in &sig.headers {
        if let Some(value) = response.headers.get(name) {
            if matcher.matches(value) {
                if baseline.map(|b| b.contains(name)).unwrap_or(false) {
                    confidence += weights.header_in_baseline;
                    evidence.push(format!("Header {}: {} (also in baseline)", name, value));
                } else {
                    confidence += weights.header;
                    evidence.push(format!("Header {}: {}", name, value));
                }
            }
        }
    }

    if let Some(cookies) = response.headers.get("set-cookie") {
        let cookies_lower = cookies.to_ascii_lowercase();
        for pattern in &sig.cookies {
            if cookies_lower.contains(&pattern.to_ascii_lowercase()) {
                confidence += weights.cookie;
                evidence.push(format!("Cookie: {}", pattern));
            }
        }
    }

    if let Some(body) = response.body.as_deref() {
        for pattern in &sig.body_patterns {
            if pattern.is_match(body) {
                confidence += weights.body;
                evidence.push(format!("Body pattern: {}", pattern.as_str()));
            }
        }
    }

    // Block statuses are shared by most vendors, so a status alone never names one
    if confidence > 0 && sig.status_codes.contains(&response.status) {
        confidence += weights.status;
        evidence.push(format!("Status: {}", response.status));
    }

    (confidence, evidence)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, headers: &[(&str, &str)], body: Option<&str>) -> FetchResponse {
        FetchResponse {
            status,
            headers: headers.iter().copied().collect(),
            body: body.map(str::to_string),
            elapsed_ms: 12,
        }
    }

    #[test]
    fn test_no_signature_yields_unknown() {
        let matcher = SignatureMatcher::default();
        let res = response(200, &[("content-type", "text/html"), ("server", "nginx")], Some("<html>hello</html>"));
        let m = matcher.match_signature(&res);
        assert_eq!(m.confidence, 0);
        assert_eq!(m.vendor, UNKNOWN_VENDOR);
        assert!(m.waf_type.is_none());

        // Status alone is not evidence either
        let blocked = response(403, &[], None);
        assert_eq!(matcher.match_signature(&blocked).confidence, 0);
    }

    #[test]
    fn test_passive_cloudflare() {
        let matcher = SignatureMatcher::default();
        let res = response(200, &[("server", "cloudflare"), ("cf-ray", "8a1b2c3d4e5f-AMS")], None);
        let m = matcher.match_signature(&res);
        assert_eq!(m.vendor, "Cloudflare");
        assert_eq!(m.confidence, 50);
        assert_eq!(m.evidence.len(), 2);
    }

    #[test]
    fn test_probe_discounts_baseline_headers() {
        let matcher = SignatureMatcher::default();
        let baseline: ResponseHeaders = [("server", "cloudflare")].into_iter().collect();

        let probe = response(200, &[("server", "cloudflare")], None);
        assert_eq!(matcher.analyze_probe_response(&probe, &baseline).confidence, 5);

        let probe = response(200, &[("cf-ray", "abcdef1-SJC")], None);
        assert_eq!(matcher.analyze_probe_response(&probe, &baseline).confidence, 35);

        let probe = response(403, &[("server", "cloudflare"), ("cf-ray", "abcdef1-SJC")], None);
        let m = matcher.analyze_probe_response(&probe, &baseline);
        assert_eq!(m.vendor, "Cloudflare");
        assert_eq!(m.confidence, 5 + 35 + 20);
    }

    #[test]
    fn test_body_and_cookie_scoring() {
        let matcher = SignatureMatcher::default();
        let res = response(
            403,
            &[("set-cookie", "visid_incap_123=abc; path=/")],
            Some("Request unsuccessful. Incapsula incident ID: 123-456"),
        );
        let m = matcher.analyze_probe_response(&res, &ResponseHeaders::new());
        assert_eq!(m.vendor, "Imperva");
        assert_eq!(m.confidence, 15 + 25 + 20);
    }

    #[test]
    fn test_ties_keep_first_signature() {
        let sigs = super::super::signatures::load_signatures();
        let matcher = SignatureMatcher::new(&sigs);
        // Cloudflare and AWS both score 25 here
        let res = response(200, &[("server", "cloudflare"), ("x-amz-cf-id", "abc")], None);
        let m = matcher.match_signature(&res);
        assert_eq!(m.vendor, "Cloudflare");
        assert_eq!(m.confidence, 25);
    }
}
