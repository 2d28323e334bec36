// Paginated and streaming execution over a test matrix

pub mod events;

use std::sync::Arc;

use futures::stream::{self, FuturesUnordered, StreamExt};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

pub use events::ScanEvent;

use crate::config::{ScanConfig, PAGE_LIMIT, STREAM_BATCH_SIZE};
use crate::error::Result;
use crate::http_client::{FetchRequest, Fetcher, ReqwestFetcher};
use crate::matrix::{seed_for_target, MatrixBuilder, TestRequestSpec, VariationStrategy};
use crate::payload::{first_bypass_variant, BuiltinVariations, ManipulationOptions, PayloadSource, VariationGateway};
use crate::probe::{ProbeExecutor, ProbeStatus, TestOutcome};
use crate::utils::parse_target_url;
use crate::waf::{DetectionResult, WafDetector, WafType};

/// Result of one manipulated request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManipulationOutcome {
    pub technique: String,
    pub method: String,
    pub url: String,
    pub payload: String,
    pub status: ProbeStatus,
    pub response_time_ms: u64,
    pub waf_detected: bool,
}

pub struct ScanEngine {
    fetcher: Arc<dyn Fetcher>,
    gateway: Arc<dyn VariationGateway>,
    detector: WafDetector,
}

impl ScanEngine {
    pub fn new(fetcher: Arc<dyn Fetcher>, gateway: Arc<dyn VariationGateway>) -> Self {
        Self {
            detector: WafDetector::new(fetcher.clone()),
            fetcher,
            gateway,
        }
    }

    /// Engine over pooled reqwest clients and the built-in variation generators
    pub fn with_reqwest(timeout_secs: u64) -> Result<Self> {
        let fetcher: Arc<dyn Fetcher> = Arc::new(ReqwestFetcher::new(timeout_secs)?);
        Ok(Self::new(fetcher, Arc::new(BuiltinVariations)))
    }

    pub async fn detect(&self, url: &str) -> DetectionResult {
        self.detector.detect(url).await
    }

    /// Explicit vendor first, then auto-detection when enabled
    pub async fn resolve_vendor(&self, url: &str, config: &ScanConfig) -> Option<String> {
        if let Some(name) = config.waf_type.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            return Some(name.to_string());
        }
        if !config.auto_detect_waf {
            return None;
        }
        let result = self.detect(url).await;
        result.vendor().map(str::to_string)
    }

    /// Resolve the vendor once and return a config that names it explicitly,
    /// so repeated page calls skip detection and share one variation strategy.
    pub async fn pin_vendor(&self, url: &str, config: &ScanConfig) -> ScanConfig {
        let mut pinned = config.clone();
        if config.auto_detect_waf {
            pinned.waf_type = self.resolve_vendor(url, config).await;
            pinned.auto_detect_waf = false;
        }
        pinned
    }

    pub fn build_matrix<R: Rng + ?Sized>(
        &self,
        url: &str,
        config: &ScanConfig,
        vendor: Option<&str>,
        rng: &mut R,
    ) -> Result<Vec<TestRequestSpec>> {
        let source = PayloadSource::for_config(config);
        let strategy = VariationStrategy::resolve(config, vendor);
        MatrixBuilder::new(config, &source, self.gateway.as_ref(), strategy).build(url, rng)
    }

    fn executor(&self, config: &ScanConfig, vendor: Option<String>) -> ProbeExecutor {
        ProbeExecutor::new(self.fetcher.clone(), config).with_known_waf(vendor)
    }

    pub async fn scan_page(&self, url: &str, page: usize, config: &ScanConfig) -> Result<Vec<TestOutcome>> {
        self.scan_page_with_limit(url, page, PAGE_LIMIT, config).await
    }

    /// Rebuild the whole matrix and execute only `[page*limit, page*limit+limit)`.
    /// Casing randomization is seeded per target, so every page sees the same matrix.
    /// With `auto_detect_waf` set, every call detects again; page through a
    /// config from `pin_vendor` instead.
    pub async fn scan_page_with_limit(
        &self,
        url: &str,
        page: usize,
        limit: usize,
        config: &ScanConfig,
    ) -> Result<Vec<TestOutcome>> {
        parse_target_url(url)?;
        config.validate()?;

        let vendor = self.resolve_vendor(url, config).await;
        let mut rng = StdRng::seed_from_u64(seed_for_target(url, config.case_seed));
        let matrix = self.build_matrix(url, config, vendor.as_deref(), &mut rng)?;

        let start = page.saturating_mul(limit);
        if start >= matrix.len() {
            return Ok(Vec::new());
        }
        let end = start.saturating_add(limit).min(matrix.len());
        tracing::debug!("scanning {} page {} ({}..{} of {})", url, page, start, end, matrix.len());

        let executor = self.executor(config, vendor);
        let probes: Vec<_> = matrix[start..end].iter().map(|spec| executor.execute(spec)).collect();
        let outcomes: Vec<TestOutcome> = stream::iter(probes)
            .buffered(config.probe_concurrency.max(1))
            .collect()
            .await;
        Ok(outcomes)
    }

    /// Stream the whole matrix in sequential batches of `STREAM_BATCH_SIZE`.
    /// A result event is sent as each probe settles. Stops early if the receiver is dropped.
    pub async fn scan_stream(&self, url: &str, config: &ScanConfig, events: mpsc::Sender<ScanEvent>) {
        let vendor = self.resolve_vendor(url, config).await;
        let mut rng = match config.case_seed {
            Some(seed) => StdRng::seed_from_u64(seed_for_target(url, Some(seed))),
            None => StdRng::from_entropy(),
        };

        let matrix = match config
            .validate()
            .and_then(|_| self.build_matrix(url, config, vendor.as_deref(), &mut rng))
        {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!("matrix construction failed for {}: {}", url, e);
                let _ = events.send(ScanEvent::Error { message: e.to_string() }).await;
                return;
            }
        };

        let total = matrix.len();
        if events.send(ScanEvent::Total { total }).await.is_err() {
            return;
        }

        let executor = Arc::new(self.executor(config, vendor));
        let mut completed = 0usize;

        for (batch_no, batch) in matrix.chunks(STREAM_BATCH_SIZE).enumerate() {
            let mut in_flight = FuturesUnordered::new();
            for spec in batch.iter().cloned() {
                let executor = executor.clone();
                in_flight.push(tokio::spawn(async move { executor.execute(&spec).await }));
            }

            while let Some(joined) = in_flight.next().await {
                let outcome = match joined {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        tracing::warn!("probe task failed in batch {}: {}", batch_no, e);
                        let _ = events.send(ScanEvent::Error { message: e.to_string() }).await;
                        return;
                    }
                };
                completed += 1;
                if events.send(ScanEvent::Result { outcome, completed }).await.is_err() {
                    tracing::debug!("stream receiver dropped after {} results", completed);
                    return;
                }
            }
        }

        let _ = events.send(ScanEvent::Complete { total }).await;
    }

    /// Send the HTTP-manipulation request set for one payload. With a known vendor
    /// the payload is first swapped for its first bypass variant.
    pub async fn run_manipulated(
        &self,
        url: &str,
        method: &str,
        payload: &str,
        options: &ManipulationOptions,
        vendor: Option<&str>,
    ) -> Result<Vec<ManipulationOutcome>> {
        parse_target_url(url)?;
        let payload = match vendor {
            Some(name) => first_bypass_variant(self.gateway.as_ref(), &WafType::from_name(name), payload),
            None => payload.to_string(),
        };

        let executor = self.executor(&ScanConfig::default(), vendor.map(str::to_string));
        let mut outcomes = Vec::new();
        for descriptor in self.gateway.build_manipulated_requests(url, method, &payload, options) {
            let request = FetchRequest {
                url: descriptor.url.clone(),
                method: descriptor.method.clone(),
                headers: descriptor.headers.clone(),
                body: descriptor.body.clone(),
                follow_redirects: false,
                timeout: None,
            };
            let classified = executor.send(&request).await;
            outcomes.push(ManipulationOutcome {
                technique: descriptor.technique,
                method: descriptor.method,
                url: descriptor.url,
                payload: payload.clone(),
                status: classified.status,
                response_time_ms: classified.response_time_ms,
                waf_detected: classified.waf_detected,
            });
        }
        Ok(outcomes)
    }
}
