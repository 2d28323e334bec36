use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::baseline::{capture_baseline, BaselineSnapshot};
use super::bypass::suggested_techniques;
use super::matcher::{SignatureMatch, SignatureMatcher};
use crate::http_client::{FetchRequest, Fetcher, BROWSER_USER_AGENT};
use crate::utils::append_query_param;

/// Query parameter carrying probe payloads
pub const PROBE_PARAM: &str = "test";

/// Evasion probes that must be blocked to treat blocking as configured rules
pub const EVASION_CONFIRM_THRESHOLD: usize = 3;

/// A probe match needs at least this much confidence to name the vendor
pub const PROBE_MATCH_THRESHOLD: u32 = 40;

/// Passive confidence needed to report infrastructure without blocking
pub const PASSIVE_REPORT_THRESHOLD: u32 = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbePayload {
    pub name: &'static str,
    pub payload: &'static str,
}

/// Obvious, unambiguous attack shapes
pub const ACTIVE_PROBES: [ProbePayload; 4] = [
    ProbePayload { name: "sql_boolean", payload: "' OR '1'='1" },
    ProbePayload { name: "xss_script", payload: "<script>alert(1)</script>" },
    ProbePayload { name: "path_traversal", payload: "../../../../etc/passwd" },
    ProbePayload { name: "sql_union", payload: "1 UNION SELECT NULL,NULL--" },
];

/// Same attack semantics as `ACTIVE_PROBES`, obfuscated syntax
pub const EVASION_PROBES: [ProbePayload; 4] = [
    ProbePayload { name: "sql_inline_comment", payload: "1'/**/OR/**/'1'='1" },
    ProbePayload { name: "sql_alt_operator", payload: "1' || '1'='1" },
    ProbePayload { name: "xss_event_handler", payload: "<img src=x onerror=alert(1)>" },
    ProbePayload { name: "traversal_double_slash", payload: "....//....//....//etc/passwd" },
];

/// Status regression is the blocking signal, not absolute status
pub fn is_blocked(baseline_status: u16, probe_status: u16) -> bool {
    baseline_status < 400 && probe_status >= 400
}

/// Statuses WAFs answer rejected requests with
pub const BLOCK_STATUSES: [u16; 6] = [403, 406, 418, 429, 501, 503];

const BLOCK_BODY_PATTERNS: [&str; 13] = [
    "access denied",
    "forbidden",
    "blocked",
    "firewall",
    "security policy",
    "request rejected",
    "suspicious activity",
    "rate limit",
    "captcha",
    "challenge",
    "ray id",
    "incident id",
    "reference #",
];

/// Quick check whether a single response looks like a WAF rejection: a block
/// status, or a block page served under any status.
pub fn is_blocked_response(status: u16, body: &str) -> bool {
    if BLOCK_STATUSES.contains(&status) {
        return true;
    }
    let body_lower = body.to_lowercase();
    BLOCK_BODY_PATTERNS.iter().any(|p| body_lower.contains(p))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    pub detected: bool,
    pub waf_type: String,
    pub confidence: u32,
    pub evidence: Vec<String>,
    pub suggested_bypass_techniques: Vec<String>,
    pub is_actively_blocking: bool,
    pub has_default_security: bool,
    pub baseline_status: u16,
    pub probe_status: u16,
    /// Passively detected CDN, which may differ from the blocking WAF
    pub infrastructure: Option<String>,
}

impl DetectionResult {
    /// Vendor name worth targeting with variations, if one was identified
    pub fn vendor(&self) -> Option<&str> {
        if self.detected && !self.waf_type.starts_with("Unknown") {
            Some(&self.waf_type)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionPhase {
    Baseline,
    ActiveProbe,
    EvasionConfirm,
    SkipConfirm,
    Verdict,
}

/// What the active-probe phase observed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveProbeReport {
    pub blocked_probes: Vec<&'static str>,
    pub best_match: Option<SignatureMatch>,
    pub probe_status: u16,
    pub evidence: Vec<String>,
}

impl ActiveProbeReport {
    pub fn is_blocked(&self) -> bool {
        !self.blocked_probes.is_empty()
    }

    fn probe_confidence(&self) -> u32 {
        self.best_match.as_ref().map(|m| m.confidence).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// Nothing was blocked, so there was nothing to confirm
    NotRun,
    /// No passive vendor to tell default security from configured rules
    Skipped,
    Evaluated { blocked: usize, total: usize },
}

impl Confirmation {
    pub fn is_confirmed(&self) -> bool {
        match self {
            Confirmation::NotRun => false,
            Confirmation::Skipped => true,
            Confirmation::Evaluated { blocked, .. } => *blocked >= EVASION_CONFIRM_THRESHOLD,
        }
    }
}

/// Three-phase WAF detection: passive baseline, active probes, evasion confirmation
pub struct WafDetector {
    fetcher: Arc<dyn Fetcher>,
    matcher: SignatureMatcher<'static>,
}

impl WafDetector {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            matcher: SignatureMatcher::default(),
        }
    }

    /// Never fails; unreachable targets yield a well-formed "not detected" result
    pub async fn detect(&self, url: &str) -> DetectionResult {
        tracing::debug!(phase = ?DetectionPhase::Baseline, "detecting WAF for {}", url);
        let baseline = capture_baseline(self.fetcher.as_ref(), &self.matcher, url).await;

        tracing::debug!(phase = ?DetectionPhase::ActiveProbe, baseline_status = baseline.status, "sending active probes");
        let active = self.run_active_probes(url, &baseline).await;

        let confirmation = if !active.is_blocked() {
            Confirmation::NotRun
        } else if !baseline.matched {
            tracing::debug!(phase = ?DetectionPhase::SkipConfirm, "no passive vendor, treating block as confirmed");
            Confirmation::Skipped
        } else {
            tracing::debug!(phase = ?DetectionPhase::EvasionConfirm, "confirming block with evasion probes");
            self.confirm_evasion(url).await
        };

        let result = synthesize_verdict(&baseline, &active, confirmation);
        tracing::info!(
            phase = ?DetectionPhase::Verdict,
            detected = result.detected,
            waf = %result.waf_type,
            confidence = result.confidence,
            active = result.is_actively_blocking,
            "WAF detection finished for {}",
            url
        );
        result
    }

    pub async fn run_active_probes(&self, url: &str, baseline: &BaselineSnapshot) -> ActiveProbeReport {
        let mut report = ActiveProbeReport::default();
        let mut first_status = None;

        for probe in ACTIVE_PROBES.iter() {
            let response = match self.fetcher.fetch_once(&probe_request(url, probe.payload)).await {
                Ok(r) => r,
                Err(e) => {
                    tracing::debug!("active probe {} failed: {}", probe.name, e);
                    report.evidence.push(format!("Probe {} failed: {}", probe.name, e));
                    continue;
                }
            };
            first_status.get_or_insert(response.status);

            if !is_blocked(baseline.status, response.status) {
                continue;
            }
            tracing::debug!(probe = probe.name, status = response.status, "active probe blocked");
            report.blocked_probes.push(probe.name);
            report.evidence.push(format!(
                "Probe {} blocked ({} -> {})",
                probe.name, baseline.status, response.status
            ));

            let m = self.matcher.analyze_probe_response(&response, &baseline.headers);
            let stronger = report.best_match.as_ref().map(|b| m.confidence > b.confidence).unwrap_or(true);
            if stronger {
                report.probe_status = response.status;
                report.best_match = Some(m);
            }
        }

        if !report.is_blocked() {
            report.probe_status = first_status.unwrap_or(0);
        }
        report
    }

    /// Network errors count as blocked
    pub async fn confirm_evasion(&self, url: &str) -> Confirmation {
        let mut blocked = 0;
        for probe in EVASION_PROBES.iter() {
            match self.fetcher.fetch_once(&probe_request(url, probe.payload)).await {
                Ok(r) if r.status >= 400 => blocked += 1,
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!("evasion probe {} failed, counting as blocked: {}", probe.name, e);
                    blocked += 1;
                }
            }
        }
        Confirmation::Evaluated { blocked, total: EVASION_PROBES.len() }
    }
}

fn probe_request(url: &str, payload: &str) -> FetchRequest {
    FetchRequest::get(append_query_param(url, PROBE_PARAM, payload)).with_header("User-Agent", BROWSER_USER_AGENT)
}

/// Combine the three phases into a verdict
pub fn synthesize_verdict(baseline: &BaselineSnapshot, active: &ActiveProbeReport, confirmation: Confirmation) -> DetectionResult {
    let mut evidence: Vec<String> = baseline.evidence.iter().map(|e| format!("Baseline {}", e)).collect();
    evidence.extend(active.evidence.iter().cloned());

    let infrastructure = baseline.matched.then(|| baseline.vendor.clone());
    let probe_confidence = active.probe_confidence();

    let mut result = DetectionResult {
        detected: false,
        waf_type: "None".to_string(),
        confidence: 0,
        evidence: Vec::new(),
        suggested_bypass_techniques: Vec::new(),
        is_actively_blocking: false,
        has_default_security: false,
        baseline_status: baseline.status,
        probe_status: active.probe_status,
        infrastructure,
    };

    if active.is_blocked() && confirmation.is_confirmed() {
        if let Confirmation::Evaluated { blocked, total } = confirmation {
            evidence.push(format!("Evasion probes blocked {}/{}", blocked, total));
        }
        let (waf_type, confidence) = match &active.best_match {
            Some(m) if m.confidence >= PROBE_MATCH_THRESHOLD => {
                evidence.extend(m.evidence.iter().map(|e| format!("Probe {}", e)));
                (m.vendor.clone(), m.confidence.min(100))
            }
            _ if baseline.matched => {
                evidence.push(format!(
                    "Blocking attributed to passively detected {} (probe signature confidence {})",
                    baseline.vendor, probe_confidence
                ));
                (baseline.vendor.clone(), (baseline.confidence + 20).min(100))
            }
            _ => {
                evidence.push("Requests blocked without an identifiable vendor signature".to_string());
                ("Unknown WAF".to_string(), probe_confidence.max(30).min(100))
            }
        };
        result.suggested_bypass_techniques = suggested_techniques(&waf_type);
        result.detected = true;
        result.is_actively_blocking = true;
        result.waf_type = waf_type;
        result.confidence = confidence;
    } else if active.is_blocked() {
        if let Confirmation::Evaluated { blocked, total } = confirmation {
            evidence.push(format!(
                "Only {}/{} evasion probes blocked: default platform filtering, not a configured ruleset",
                blocked, total
            ));
        }
        result.detected = true;
        result.has_default_security = true;
        result.waf_type = if baseline.matched { baseline.vendor.clone() } else { "Unknown CDN".to_string() };
        result.confidence = baseline.confidence.max(probe_confidence).min(50);
    } else if baseline.confidence >= PASSIVE_REPORT_THRESHOLD {
        evidence.push(format!("{} identified passively, attack probes were not blocked", baseline.vendor));
        result.detected = true;
        result.waf_type = baseline.vendor.clone();
        result.confidence = baseline.confidence.min(70);
    }

    result.evidence = evidence;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::ResponseHeaders;

    fn baseline(matched: bool, vendor: &str, confidence: u32, status: u16) -> BaselineSnapshot {
        BaselineSnapshot {
            matched,
            vendor: vendor.to_string(),
            confidence,
            evidence: Vec::new(),
            status,
            headers: ResponseHeaders::new(),
        }
    }

    fn blocked_report(vendor: &str, confidence: u32) -> ActiveProbeReport {
        ActiveProbeReport {
            blocked_probes: vec!["sql_boolean"],
            best_match: Some(SignatureMatch {
                waf_type: None,
                vendor: vendor.to_string(),
                confidence,
                evidence: vec!["Header cf-ray: abc".to_string()],
            }),
            probe_status: 403,
            evidence: Vec::new(),
        }
    }

    #[test]
    fn test_is_blocked_is_status_regression() {
        assert!(is_blocked(200, 403));
        assert!(is_blocked(0, 403));
        assert!(!is_blocked(403, 403));
        assert!(!is_blocked(200, 302));
    }

    #[test]
    fn test_confirmed_block_prefers_probe_match() {
        let b = baseline(true, "Cloudflare", 25, 200);
        let r = synthesize_verdict(&b, &blocked_report("Cloudflare", 60), Confirmation::Evaluated { blocked: 4, total: 4 });
        assert!(r.detected && r.is_actively_blocking && !r.has_default_security);
        assert_eq!(r.waf_type, "Cloudflare");
        assert_eq!(r.confidence, 60);
        assert!(!r.suggested_bypass_techniques.is_empty());
        assert_eq!(r.infrastructure.as_deref(), Some("Cloudflare"));
    }

    #[test]
    fn test_confirmed_block_falls_back_to_passive_vendor() {
        let b = baseline(true, "Akamai", 90, 200);
        let r = synthesize_verdict(&b, &blocked_report("Akamai", 20), Confirmation::Evaluated { blocked: 3, total: 4 });
        assert_eq!(r.waf_type, "Akamai");
        assert_eq!(r.confidence, 100);
    }

    #[test]
    fn test_skipped_confirmation_without_vendor_is_unknown_waf() {
        let b = baseline(false, "Unknown", 0, 200);
        let mut report = blocked_report("Unknown", 0);
        report.best_match = None;
        let r = synthesize_verdict(&b, &report, Confirmation::Skipped);
        assert!(r.is_actively_blocking);
        assert_eq!(r.waf_type, "Unknown WAF");
        assert_eq!(r.confidence, 30);
        assert!(r.infrastructure.is_none());
    }

    #[test]
    fn test_unconfirmed_block_is_default_security() {
        let b = baseline(true, "Cloudflare", 75, 200);
        let r = synthesize_verdict(&b, &blocked_report("Cloudflare", 60), Confirmation::Evaluated { blocked: 1, total: 4 });
        assert!(r.detected && !r.is_actively_blocking && r.has_default_security);
        assert_eq!(r.confidence, 50);
        assert!(r.suggested_bypass_techniques.is_empty());
    }

    #[test]
    fn test_passive_only_and_nothing() {
        let b = baseline(true, "Fastly", 100, 200);
        let r = synthesize_verdict(&b, &ActiveProbeReport::default(), Confirmation::NotRun);
        assert!(r.detected && !r.is_actively_blocking && !r.has_default_security);
        assert_eq!(r.confidence, 70);

        let b = baseline(false, "Unknown", 0, 200);
        let r = synthesize_verdict(&b, &ActiveProbeReport::default(), Confirmation::NotRun);
        assert!(!r.detected);
        assert_eq!(r.confidence, 0);
    }

    #[test]
    fn test_is_blocked_response() {
        assert!(is_blocked_response(403, ""));
        assert!(is_blocked_response(501, ""));
        assert!(is_blocked_response(503, "upstream unavailable"));
        assert!(is_blocked_response(200, "Access denied by firewall"));
        assert!(is_blocked_response(302, "Your request was blocked. Ray ID: 8a1b"));
        assert!(!is_blocked_response(200, "<html>welcome</html>"));
        assert!(!is_blocked_response(500, ""));
    }
}
