use crate::http_client::{FetchRequest, Fetcher, ResponseHeaders, BROWSER_USER_AGENT};

use super::matcher::{SignatureMatcher, UNKNOWN_VENDOR};

/// Reference snapshot of one clean, non-adversarial response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaselineSnapshot {
    pub matched: bool,
    pub vendor: String,
    pub confidence: u32,
    pub evidence: Vec<String>,
    /// 0 when the baseline request failed
    pub status: u16,
    pub headers: ResponseHeaders,
}

impl BaselineSnapshot {
    pub fn unreachable(reason: &str) -> Self {
        Self {
            matched: false,
            vendor: UNKNOWN_VENDOR.to_string(),
            confidence: 0,
            evidence: vec![format!("request failed: {}", reason)],
            status: 0,
            headers: ResponseHeaders::new(),
        }
    }

    pub fn reported_confidence(&self) -> u32 {
        self.confidence.min(100)
    }

    pub fn is_reachable(&self) -> bool {
        self.status != 0
    }
}

/// Clean request used for the baseline: browser headers, no attack content, no redirects
pub fn baseline_request(url: &str) -> FetchRequest {
    FetchRequest::get(url)
        .with_header("User-Agent", BROWSER_USER_AGENT)
        .with_header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
        .with_header("Accept-Language", "en-US,en;q=0.9")
}

/// Issue exactly one clean request. Network failures are swallowed into a
/// status-0 snapshot so detection can still proceed.
pub async fn capture_baseline(fetcher: &dyn Fetcher, matcher: &SignatureMatcher<'_>, url: &str) -> BaselineSnapshot {
    match fetcher.fetch_once(&baseline_request(url)).await {
        Ok(response) => {
            let m = matcher.match_signature(&response);
            tracing::debug!(status = response.status, vendor = %m.vendor, confidence = m.confidence, "baseline captured for {}", url);
            BaselineSnapshot {
                matched: m.is_match(),
                vendor: m.vendor,
                confidence: m.confidence,
                evidence: m.evidence,
                status: response.status,
                headers: response.headers,
            }
        }
        Err(e) => {
            tracing::warn!("baseline request to {} failed: {}", url, e);
            BaselineSnapshot::unreachable(&e.to_string())
        }
    }
}
