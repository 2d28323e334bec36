use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::config::{BodyFormat, ScanConfig};
use crate::http_client::{FetchRequest, Fetcher, BROWSER_USER_AGENT};
use crate::matrix::template::{content_type, render_body};
use crate::matrix::TestRequestSpec;
use crate::payload::CheckType;
use crate::utils::{append_query_param, origin_of};
use crate::waf::detector::{is_blocked_response, PROBE_PARAM};
use crate::waf::SignatureMatcher;

const ERROR_SENTINEL: &str = "ERR";

/// HTTP status, or the sentinel for a request that never got one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStatus {
    Code(u16),
    Error,
}

impl ProbeStatus {
    pub fn code(&self) -> Option<u16> {
        match self {
            ProbeStatus::Code(c) => Some(*c),
            ProbeStatus::Error => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ProbeStatus::Error)
    }
}

impl Serialize for ProbeStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ProbeStatus::Code(c) => serializer.serialize_u16(*c),
            ProbeStatus::Error => serializer.serialize_str(ERROR_SENTINEL),
        }
    }
}

impl<'de> Deserialize<'de> for ProbeStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Code(u16),
            Text(String),
        }
        match Repr::deserialize(deserializer)? {
            Repr::Code(c) => Ok(ProbeStatus::Code(c)),
            Repr::Text(s) if s == ERROR_SENTINEL => Ok(ProbeStatus::Error),
            Repr::Text(s) => Err(serde::de::Error::custom(format!("unexpected status {}", s))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BypassKind {
    Standard,
    Advanced,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestOutcome {
    pub category: String,
    pub payload: String,
    pub method: String,
    pub status: ProbeStatus,
    pub is_redirect: bool,
    pub response_time_ms: u64,
    pub waf_detected: bool,
    pub waf_type: Option<String>,
    pub bypass_technique: BypassKind,
    pub check_type: CheckType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Raw response classification shared by matrix probes and manipulated requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub status: ProbeStatus,
    pub is_redirect: bool,
    pub response_time_ms: u64,
    pub waf_detected: bool,
    pub waf_type: Option<String>,
    pub error: Option<String>,
}

/// Executes one `TestRequestSpec`. Transport failures become `ProbeStatus::Error`.
pub struct ProbeExecutor {
    fetcher: Arc<dyn Fetcher>,
    matcher: SignatureMatcher<'static>,
    body_template: Option<String>,
    body_format: BodyFormat,
    follow_redirects: bool,
    timeout: Duration,
    known_waf: Option<String>,
}

impl ProbeExecutor {
    pub fn new(fetcher: Arc<dyn Fetcher>, config: &ScanConfig) -> Self {
        Self {
            fetcher,
            matcher: SignatureMatcher::default(),
            body_template: config.payload_template.clone(),
            body_format: config.body_format,
            follow_redirects: config.follow_redirect,
            timeout: Duration::from_secs(config.request_timeout_secs),
            known_waf: None,
        }
    }

    /// Vendor reported for blocked probes whose response carries no signature
    pub fn with_known_waf(mut self, waf: Option<String>) -> Self {
        self.known_waf = waf;
        self
    }

    pub fn build_request(&self, spec: &TestRequestSpec) -> FetchRequest {
        let method = spec.method.to_ascii_uppercase();
        let mut request = FetchRequest {
            url: spec.target_url.clone(),
            method: method.clone(),
            headers: Vec::new(),
            body: None,
            follow_redirects: self.follow_redirects,
            timeout: Some(self.timeout),
        };

        match spec.check_type {
            CheckType::ParamCheck => match method.as_str() {
                "POST" | "PUT" | "PATCH" => {
                    request.body = Some(render_body(self.body_template.as_deref(), &spec.payload, self.body_format));
                    request.headers.push(("Content-Type".to_string(), content_type(self.body_format).to_string()));
                }
                _ => request.url = append_query_param(&spec.target_url, PROBE_PARAM, &spec.payload),
            },
            CheckType::FileCheck => {
                let origin = origin_of(&spec.target_url).unwrap_or_else(|| spec.target_url.clone());
                request.url = format!("{}/{}", origin, spec.payload.trim_start_matches('/'));
                request.method = "GET".to_string();
            }
            // Header payloads arrive already parsed into spec.headers
            CheckType::Header => {}
        }

        for (name, value) in &spec.headers {
            request.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
            request.headers.push((name.clone(), value.clone()));
        }
        if !request.has_header("User-Agent") {
            request.headers.push(("User-Agent".to_string(), BROWSER_USER_AGENT.to_string()));
        }
        request
    }

    pub async fn execute(&self, spec: &TestRequestSpec) -> TestOutcome {
        let classified = self.send(&self.build_request(spec)).await;
        TestOutcome {
            category: spec.category.clone(),
            payload: spec.payload.clone(),
            method: spec.method.clone(),
            status: classified.status,
            is_redirect: classified.is_redirect,
            response_time_ms: classified.response_time_ms,
            waf_detected: classified.waf_detected,
            waf_type: classified.waf_type,
            bypass_technique: if spec.variant_index > 0 { BypassKind::Advanced } else { BypassKind::Standard },
            check_type: spec.check_type,
            error: classified.error,
        }
    }

    /// Send once and classify; never fails
    pub async fn send(&self, request: &FetchRequest) -> Classified {
        let started = Instant::now();
        match self.fetcher.fetch_once(request).await {
            Ok(response) => {
                let body = response.body.as_deref().unwrap_or("");
                let waf_detected = is_blocked_response(response.status, body);
                let waf_type = if waf_detected {
                    let m = self.matcher.match_signature(&response);
                    if m.is_match() {
                        Some(m.vendor)
                    } else {
                        self.known_waf.clone()
                    }
                } else {
                    None
                };
                Classified {
                    status: ProbeStatus::Code(response.status),
                    is_redirect: (300..400).contains(&response.status),
                    response_time_ms: started.elapsed().as_millis() as u64,
                    waf_detected,
                    waf_type,
                    error: None,
                }
            }
            Err(e) => {
                tracing::debug!("probe {} {} failed: {}", request.method, request.url, e);
                Classified {
                    status: ProbeStatus::Error,
                    is_redirect: false,
                    response_time_ms: started.elapsed().as_millis() as u64,
                    waf_detected: false,
                    waf_type: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}
