use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use rand::Rng;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::job::{BatchJob, JobHandle, JobStatus, UrlScanResult};
use super::store::JobStore;
use crate::config::{
    ScanConfig, JOB_RETENTION_HOURS, MAX_BATCH_URLS, MAX_PAGES_PER_URL, MAX_RESULTS_PER_URL, PAGE_LIMIT,
    SWEEP_PROBABILITY, URL_SCAN_TIMEOUT,
};
use crate::engine::ScanEngine;
use crate::error::{ProberError, Result};
use crate::utils::is_http_url;

/// Bounds applied to every URL of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UrlLimits {
    pub timeout: Duration,
    pub max_pages: usize,
    pub max_results: usize,
}

impl Default for UrlLimits {
    fn default() -> Self {
        Self {
            timeout: URL_SCAN_TIMEOUT,
            max_pages: MAX_PAGES_PER_URL,
            max_results: MAX_RESULTS_PER_URL,
        }
    }
}

/// Runs multi-URL scans in the background, at most `batch_concurrency()` URLs at a time
pub struct BatchScheduler {
    engine: Arc<ScanEngine>,
    store: Arc<dyn JobStore>,
    limits: UrlLimits,
    retention: chrono::Duration,
}

impl BatchScheduler {
    pub fn new(engine: Arc<ScanEngine>, store: Arc<dyn JobStore>) -> Self {
        Self {
            engine,
            store,
            limits: UrlLimits::default(),
            retention: chrono::Duration::hours(JOB_RETENTION_HOURS),
        }
    }

    pub fn with_url_timeout(mut self, timeout: Duration) -> Self {
        self.limits.timeout = timeout;
        self
    }

    pub fn with_page_caps(mut self, max_pages: usize, max_results: usize) -> Self {
        self.limits.max_pages = max_pages;
        self.limits.max_results = max_results;
        self
    }

    pub fn with_retention(mut self, retention: chrono::Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Validate every URL, register a running job and return its id.
    /// Scanning continues in the background; must be called inside a tokio runtime.
    pub fn start(&self, urls: Vec<String>, config: ScanConfig) -> Result<String> {
        let urls = validate_urls(urls)?;
        config.validate()?;

        let id = Uuid::new_v4().to_string();
        let handle = Arc::new(JobHandle::new(BatchJob::new(id.clone(), urls.len())));
        self.store.insert(id.clone(), handle.clone());
        tracing::info!(
            job = %id,
            urls = urls.len(),
            concurrency = config.batch_concurrency(),
            "batch job started"
        );

        tokio::spawn(run_job(self.engine.clone(), handle, urls, config, self.limits));
        Ok(id)
    }

    /// Snapshot of a job. Occasionally sweeps expired jobs as a side effect.
    pub fn status(&self, id: &str) -> Result<BatchJob> {
        let snapshot = self
            .store
            .get(id)
            .map(|h| h.snapshot())
            .ok_or_else(|| ProberError::JobNotFound(id.to_string()))?;
        if rand::thread_rng().gen_bool(SWEEP_PROBABILITY) {
            self.sweep_expired(Utc::now());
        }
        Ok(snapshot)
    }

    /// Idempotent; stopping a terminal job leaves it as it is
    pub fn stop(&self, id: &str) -> Result<BatchJob> {
        let handle = self.store.get(id).ok_or_else(|| ProberError::JobNotFound(id.to_string()))?;
        if handle.finish(JobStatus::Stopped, None) {
            tracing::info!(job = %id, "batch job stopped");
        }
        Ok(handle.snapshot())
    }

    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let removed = self.store.sweep(now, self.retention);
        if removed > 0 {
            tracing::debug!("swept {} expired batch jobs", removed);
        }
        removed
    }
}

/// All-or-nothing: any invalid entry rejects the whole list
pub fn validate_urls(urls: Vec<String>) -> Result<Vec<String>> {
    let urls: Vec<String> = urls.into_iter().map(|u| u.trim().to_string()).filter(|u| !u.is_empty()).collect();
    if urls.is_empty() {
        return Err(ProberError::Validation("at least one URL is required".to_string()));
    }
    if urls.len() > MAX_BATCH_URLS {
        return Err(ProberError::TooManyUrls { count: urls.len(), max: MAX_BATCH_URLS });
    }
    let invalid: Vec<String> = urls.iter().filter(|u| !is_http_url(u)).cloned().collect();
    if !invalid.is_empty() {
        return Err(ProberError::InvalidUrls(invalid));
    }
    Ok(urls)
}

async fn run_job(
    engine: Arc<ScanEngine>,
    handle: Arc<JobHandle>,
    urls: Vec<String>,
    config: ScanConfig,
    limits: UrlLimits,
) {
    let semaphore = Arc::new(Semaphore::new(config.batch_concurrency()));
    let cancel = handle.cancel_token();
    let config = Arc::new(config);
    let mut workers = FuturesUnordered::new();

    // Permits are taken here, in URL order, so waiting URLs start first-come first-served
    for url in urls {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            permit = semaphore.clone().acquire_owned() => match permit {
                Ok(p) => p,
                Err(_) => break,
            },
        };
        if !handle.is_running() {
            break;
        }

        let engine = engine.clone();
        let handle = handle.clone();
        let config = config.clone();
        let cancel = cancel.clone();
        workers.push(tokio::spawn(async move {
            handle.set_current_url(&url);
            let scan = scan_url(&engine, &url, &config, &limits, &cancel);
            let result = match tokio::time::timeout(limits.timeout, scan).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!("scan of {} timed out after {:?}", url, limits.timeout);
                    UrlScanResult::failed(&url, format!("scan timed out after {:?}", limits.timeout))
                }
            };
            if let Some(e) = &result.error {
                tracing::debug!("scan of {} failed: {}", url, e);
            }
            handle.record(result);
            drop(permit);
        }));
    }

    while let Some(joined) = workers.next().await {
        if let Err(e) = joined {
            tracing::error!("batch worker crashed: {}", e);
            handle.finish(JobStatus::Error, Some(format!("worker failed: {}", e)));
        }
    }

    if handle.finish(JobStatus::Completed, None) {
        let job = handle.snapshot();
        tracing::info!(job = %job.id, completed = job.completed_urls, "batch job completed");
    }
}

/// Page through one URL until a short page, the page cap, or the result cap
async fn scan_url(
    engine: &ScanEngine,
    url: &str,
    config: &ScanConfig,
    limits: &UrlLimits,
    cancel: &CancellationToken,
) -> UrlScanResult {
    // Every page must build the same matrix
    let config = engine.pin_vendor(url, config).await;

    let mut result = UrlScanResult { url: url.to_string(), outcomes: Vec::new(), pages_scanned: 0, error: None };
    for page in 0..limits.max_pages {
        if cancel.is_cancelled() {
            break;
        }
        match engine.scan_page(url, page, &config).await {
            Ok(outcomes) if outcomes.is_empty() => break,
            Ok(outcomes) => {
                let last_page = outcomes.len() < PAGE_LIMIT;
                result.pages_scanned += 1;
                result.outcomes.extend(outcomes);
                if last_page || result.outcomes.len() >= limits.max_results {
                    break;
                }
            }
            Err(e) => {
                result.error = Some(e.to_string());
                break;
            }
        }
    }
    result.outcomes.truncate(limits.max_results);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("http://host{}.test/", i)).collect()
    }

    #[test]
    fn test_validate_urls() {
        assert_eq!(validate_urls(urls(100)).map(|u| u.len()).ok(), Some(100));
        assert!(matches!(validate_urls(urls(101)), Err(ProberError::TooManyUrls { count: 101, .. })));
        assert!(matches!(validate_urls(vec![" ".into()]), Err(ProberError::Validation(_))));

        let mut mixed = urls(3);
        mixed.push("not a url".into());
        mixed.push("ftp://files.test/".into());
        match validate_urls(mixed) {
            Err(ProberError::InvalidUrls(bad)) => assert_eq!(bad, vec!["not a url", "ftp://files.test/"]),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
