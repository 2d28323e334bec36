use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use waf_prober::batch::{BatchJob, BatchScheduler, InMemoryJobStore, JobStatus, JobStore};
use waf_prober::config::{ScanConfig, MAX_PAGES_PER_URL, PAGE_LIMIT};
use waf_prober::engine::ScanEngine;
use waf_prober::error::TransportError;
use waf_prober::http_client::{FetchRequest, FetchResponse, Fetcher, ReqwestFetcher};
use waf_prober::payload::{BuiltinVariations, CheckType, PayloadCategory};
use waf_prober::ProberError;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Answers 200 after a delay and records how many hosts are in flight at once
#[derive(Default)]
struct SlowFetcher {
    delay: Duration,
    in_flight: Mutex<HashMap<String, usize>>,
    max_hosts: Mutex<usize>,
}

impl SlowFetcher {
    fn new(delay: Duration) -> Self {
        Self { delay, ..Self::default() }
    }

    fn host(url: &str) -> String {
        url.split('/').nth(2).unwrap_or_default().to_ascii_lowercase()
    }
}

#[async_trait]
impl Fetcher for SlowFetcher {
    async fn fetch_once(&self, request: &FetchRequest) -> Result<FetchResponse, TransportError> {
        let host = Self::host(&request.url);
        {
            let mut in_flight = self.in_flight.lock();
            *in_flight.entry(host.clone()).or_insert(0) += 1;
            let active = in_flight.values().filter(|n| **n > 0).count();
            let mut max = self.max_hosts.lock();
            *max = (*max).max(active);
        }
        tokio::time::sleep(self.delay).await;
        if let Some(n) = self.in_flight.lock().get_mut(&host) {
            *n -= 1;
        }
        Ok(FetchResponse { status: 200, ..FetchResponse::default() })
    }
}

fn small_config(max_concurrent: usize) -> ScanConfig {
    let mut custom = BTreeMap::new();
    custom.insert(
        "Bulk".to_string(),
        PayloadCategory::new(CheckType::ParamCheck, vec!["a".into(), "b".into(), "c".into()], vec![]),
    );
    ScanConfig {
        methods: vec!["GET".into()],
        categories: Some(vec!["Bulk".into()]),
        custom_payloads: Some(custom),
        max_concurrent,
        ..ScanConfig::default()
    }
}

fn bulk_config(count: usize) -> ScanConfig {
    let payloads = (0..count).map(|i| format!("item-{}", i)).collect();
    let mut custom = BTreeMap::new();
    custom.insert("Bulk".to_string(), PayloadCategory::new(CheckType::ParamCheck, payloads, vec![]));
    ScanConfig { custom_payloads: Some(custom), ..small_config(1) }
}

fn scheduler_with(fetcher: Arc<dyn Fetcher>) -> (BatchScheduler, Arc<InMemoryJobStore>) {
    let store = Arc::new(InMemoryJobStore::new());
    let engine = Arc::new(ScanEngine::new(fetcher, Arc::new(BuiltinVariations)));
    (BatchScheduler::new(engine, store.clone()), store)
}

fn hosts(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("http://host{}.test/", i)).collect()
}

async fn wait_terminal(scheduler: &BatchScheduler, id: &str) -> BatchJob {
    for _ in 0..400 {
        let job = scheduler.status(id).unwrap();
        assert!(job.completed_urls <= job.total_urls);
        if job.status.is_terminal() {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("job {} never finished", id);
}

#[tokio::test]
async fn too_many_urls_creates_no_job() {
    let (scheduler, store) = scheduler_with(Arc::new(SlowFetcher::new(Duration::ZERO)));
    let err = scheduler.start(hosts(101), small_config(3)).unwrap_err();
    assert!(matches!(err, ProberError::TooManyUrls { count: 101, max: 100 }));
    assert!(store.is_empty());
}

#[tokio::test]
async fn one_invalid_url_rejects_everything() {
    let (scheduler, store) = scheduler_with(Arc::new(SlowFetcher::new(Duration::ZERO)));
    let mut urls = hosts(4);
    urls.insert(2, "javascript:alert(1)".into());
    match scheduler.start(urls, small_config(3)) {
        Err(ProberError::InvalidUrls(bad)) => assert_eq!(bad, vec!["javascript:alert(1)".to_string()]),
        other => panic!("unexpected: {:?}", other),
    }
    assert!(store.is_empty());
}

#[tokio::test]
async fn job_runs_to_completion_against_live_server() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).respond_with(ResponseTemplate::new(200)).mount(&server).await;
    let (scheduler, _store) = scheduler_with(Arc::new(ReqwestFetcher::new(5).unwrap()));

    let urls = vec![format!("{}/a", server.uri()), format!("{}/b", server.uri())];
    let id = scheduler.start(urls, small_config(2)).unwrap();
    let job = wait_terminal(&scheduler, &id).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!((job.completed_urls, job.total_urls, job.progress), (2, 2, 100));
    assert_eq!(job.results.len(), 2);
    assert!(job.results.iter().all(|r| r.error.is_none() && r.outcomes.len() == 3 && r.pages_scanned == 1));
}

#[tokio::test]
async fn semaphore_caps_concurrent_url_scans() {
    let fetcher = Arc::new(SlowFetcher::new(Duration::from_millis(20)));
    let (scheduler, _store) = scheduler_with(fetcher.clone());

    let id = scheduler.start(hosts(6), small_config(2)).unwrap();
    let job = wait_terminal(&scheduler, &id).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.completed_urls, 6);
    let max = *fetcher.max_hosts.lock();
    assert!(max >= 1 && max <= 2, "saw {} hosts at once", max);
}

#[tokio::test]
async fn page_cap_bounds_each_url() {
    let (scheduler, _store) = scheduler_with(Arc::new(SlowFetcher::new(Duration::ZERO)));
    let id = scheduler.start(hosts(1), bulk_config(600)).unwrap();
    let job = wait_terminal(&scheduler, &id).await;

    let result = &job.results[0];
    assert_eq!(result.error, None);
    assert_eq!(result.pages_scanned, MAX_PAGES_PER_URL);
    assert_eq!(result.outcomes.len(), MAX_PAGES_PER_URL * PAGE_LIMIT);
    assert_eq!(result.outcomes.last().map(|o| o.payload.as_str()), Some("item-499"));
}

#[tokio::test]
async fn result_cap_stops_paging_and_truncates() {
    let (scheduler, _store) = scheduler_with(Arc::new(SlowFetcher::new(Duration::ZERO)));
    let scheduler = scheduler.with_page_caps(10, 120);
    let id = scheduler.start(hosts(1), bulk_config(600)).unwrap();
    let job = wait_terminal(&scheduler, &id).await;

    let result = &job.results[0];
    assert_eq!(result.pages_scanned, 3);
    assert_eq!(result.outcomes.len(), 120);
}

#[tokio::test]
async fn waiting_urls_start_in_input_order() {
    let (scheduler, _store) = scheduler_with(Arc::new(SlowFetcher::new(Duration::from_millis(5))));
    let urls: Vec<String> = hosts(6).into_iter().rev().collect();
    let id = scheduler.start(urls.clone(), small_config(1)).unwrap();
    let job = wait_terminal(&scheduler, &id).await;

    assert_eq!(job.status, JobStatus::Completed);
    let order: Vec<String> = job.results.iter().map(|r| r.url.clone()).collect();
    assert_eq!(order, urls);
}

#[tokio::test]
async fn stopped_job_stays_stopped() {
    let (scheduler, _store) = scheduler_with(Arc::new(SlowFetcher::new(Duration::from_millis(100))));
    let id = scheduler.start(hosts(5), small_config(1)).unwrap();

    let job = scheduler.stop(&id).unwrap();
    assert_eq!(job.status, JobStatus::Stopped);

    tokio::time::sleep(Duration::from_millis(500)).await;
    let job = scheduler.status(&id).unwrap();
    assert_eq!(job.status, JobStatus::Stopped);
    assert!(job.completed_urls < 5);

    assert_eq!(scheduler.stop(&id).unwrap().status, JobStatus::Stopped);
}

#[tokio::test]
async fn per_url_timeout_is_recorded_and_job_continues() {
    let (scheduler, _store) = scheduler_with(Arc::new(SlowFetcher::new(Duration::from_secs(5))));
    let scheduler = scheduler.with_url_timeout(Duration::from_millis(100));

    let id = scheduler.start(hosts(2), small_config(2)).unwrap();
    let job = wait_terminal(&scheduler, &id).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.completed_urls, 2);
    assert!(job.results.iter().all(|r| r.error.as_deref().map(|e| e.contains("timed out")).unwrap_or(false)));
}

#[tokio::test]
async fn unknown_job_ids_are_errors() {
    let (scheduler, _store) = scheduler_with(Arc::new(SlowFetcher::new(Duration::ZERO)));
    assert!(matches!(scheduler.status("missing"), Err(ProberError::JobNotFound(_))));
    assert!(matches!(scheduler.stop("missing"), Err(ProberError::JobNotFound(_))));
}

#[tokio::test]
async fn sweep_leaves_fresh_jobs() {
    let (scheduler, store) = scheduler_with(Arc::new(SlowFetcher::new(Duration::ZERO)));
    let id = scheduler.start(hosts(1), small_config(1)).unwrap();
    wait_terminal(&scheduler, &id).await;

    assert_eq!(scheduler.sweep_expired(chrono::Utc::now()), 0);
    assert!(store.get(&id).is_some());
    assert_eq!(scheduler.sweep_expired(chrono::Utc::now() + chrono::Duration::hours(25)), 1);
    assert!(store.get(&id).is_none());
}
