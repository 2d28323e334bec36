use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ProberError, Result};
use crate::payload::PayloadCategory;

/// Outcomes per paginated scan call
pub const PAGE_LIMIT: usize = 50;
/// Probes run in parallel per streaming batch
pub const STREAM_BATCH_SIZE: usize = 20;
pub const MAX_BATCH_URLS: usize = 100;
pub const MAX_BATCH_CONCURRENCY: usize = 5;
pub const URL_SCAN_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const MAX_PAGES_PER_URL: usize = 10;
pub const MAX_RESULTS_PER_URL: usize = 1000;
pub const JOB_RETENTION_HOURS: i64 = 24;
/// Chance that a status query also sweeps expired jobs
pub const SWEEP_PROBABILITY: f64 = 0.1;

pub const MAX_CUSTOM_PAYLOADS_PER_CATEGORY: usize = 1000;
pub const MAX_PAYLOAD_BYTES: usize = 4096;

pub const SUPPORTED_METHODS: [&str; 7] = ["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyFormat {
    #[default]
    Json,
    Form,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScanConfig {
    pub methods: Vec<String>,
    /// `None` tests every category in the payload source
    pub categories: Option<Vec<String>>,
    /// JSON body template containing `{PAYLOAD}`
    pub payload_template: Option<String>,
    pub body_format: BodyFormat,
    /// Raw `Name: Value` lines merged into every request
    pub custom_headers: Option<String>,
    pub follow_redirect: bool,
    pub false_positive_test: bool,
    pub case_sensitive_test: bool,
    pub enhanced_payloads: bool,
    pub use_advanced_payloads: bool,
    pub auto_detect_waf: bool,
    pub waf_type: Option<String>,
    pub use_encoding_variations: bool,
    pub http_manipulation: bool,
    pub custom_payloads: Option<BTreeMap<String, PayloadCategory>>,
    /// Concurrent URL scans per batch job, clamped to `MAX_BATCH_CONCURRENCY`
    pub max_concurrent: usize,
    pub request_timeout_secs: u64,
    /// In-flight probes for a paginated page
    pub probe_concurrency: usize,
    pub case_seed: Option<u64>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            methods: vec!["GET".to_string(), "POST".to_string()],
            categories: None,
            payload_template: None,
            body_format: BodyFormat::Json,
            custom_headers: None,
            follow_redirect: false,
            false_positive_test: false,
            case_sensitive_test: false,
            enhanced_payloads: false,
            use_advanced_payloads: false,
            auto_detect_waf: false,
            waf_type: None,
            use_encoding_variations: false,
            http_manipulation: false,
            custom_payloads: None,
            max_concurrent: 3,
            request_timeout_secs: 10,
            probe_concurrency: 20,
            case_seed: None,
        }
    }
}

impl ScanConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let config: ScanConfig = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Upper-cased, de-duplicated methods
    pub fn normalized_methods(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for m in &self.methods {
            let upper = m.trim().to_ascii_uppercase();
            if !out.contains(&upper) {
                out.push(upper);
            }
        }
        out
    }

    pub fn batch_concurrency(&self) -> usize {
        self.max_concurrent.clamp(1, MAX_BATCH_CONCURRENCY)
    }

    pub fn validate(&self) -> Result<()> {
        let methods = self.normalized_methods();
        if methods.is_empty() {
            return Err(ProberError::Validation("at least one HTTP method is required".to_string()));
        }
        if let Some(bad) = methods.iter().find(|m| !SUPPORTED_METHODS.contains(&m.as_str())) {
            return Err(ProberError::Validation(format!("unsupported HTTP method: {}", bad)));
        }
        if let Some(template) = &self.payload_template {
            if template.len() > MAX_PAYLOAD_BYTES * 4 {
                return Err(ProberError::Validation("payload template too large".to_string()));
            }
        }
        if let Some(custom) = &self.custom_payloads {
            for (name, category) in custom {
                if category.payloads.len() > MAX_CUSTOM_PAYLOADS_PER_CATEGORY
                    || category.false_payloads.len() > MAX_CUSTOM_PAYLOADS_PER_CATEGORY
                {
                    return Err(ProberError::Validation(format!(
                        "custom category '{}' exceeds {} payloads",
                        name, MAX_CUSTOM_PAYLOADS_PER_CATEGORY
                    )));
                }
                if category.payloads.iter().chain(&category.false_payloads).any(|p| p.len() > MAX_PAYLOAD_BYTES) {
                    return Err(ProberError::Validation(format!(
                        "custom category '{}' has a payload over {} bytes",
                        name, MAX_PAYLOAD_BYTES
                    )));
                }
            }
        }
        if self.probe_concurrency == 0 {
            return Err(ProberError::Validation("probe concurrency must be at least 1".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ProberError::Validation("request timeout must be at least 1 second".to_string()));
        }
        Ok(())
    }
}
