use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::probe::TestOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Completed,
    Stopped,
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

/// Scan result for a single target of a batch job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlScanResult {
    pub url: String,
    pub outcomes: Vec<TestOutcome>,
    pub pages_scanned: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UrlScanResult {
    pub fn failed(url: &str, error: impl Into<String>) -> Self {
        Self { url: url.to_string(), outcomes: Vec::new(), pages_scanned: 0, error: Some(error.into()) }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchJob {
    pub id: String,
    pub status: JobStatus,
    pub progress: u8,
    pub current_url: Option<String>,
    pub start_time: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub results: Vec<UrlScanResult>,
    pub total_urls: usize,
    pub completed_urls: usize,
    pub error: Option<String>,
}

impl BatchJob {
    pub fn new(id: String, total_urls: usize) -> Self {
        Self {
            id,
            status: JobStatus::Running,
            progress: 0,
            current_url: None,
            start_time: Utc::now(),
            finished_at: None,
            results: Vec::with_capacity(total_urls),
            total_urls,
            completed_urls: 0,
            error: None,
        }
    }

    /// Append one URL's result; progress and the completed count move together
    pub fn record(&mut self, result: UrlScanResult) {
        self.current_url = Some(result.url.clone());
        self.results.push(result);
        self.completed_urls = (self.completed_urls + 1).min(self.total_urls);
        self.progress = progress_percent(self.completed_urls, self.total_urls);
    }

    /// Forward-only transition out of `Running`. Returns false if already terminal.
    pub fn finish(&mut self, status: JobStatus, error: Option<String>) -> bool {
        if self.status.is_terminal() || !status.is_terminal() {
            return false;
        }
        self.status = status;
        self.error = error;
        self.finished_at = Some(Utc::now());
        true
    }

    /// Terminal and older than `retention`
    pub fn is_expired(&self, now: DateTime<Utc>, retention: Duration) -> bool {
        self.status.is_terminal() && now - self.start_time > retention
    }
}

pub fn progress_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((completed as f64 * 100.0 / total as f64).round() as u8).min(100)
}

/// Shared handle held by the store and the job's workers
#[derive(Debug)]
pub struct JobHandle {
    job: RwLock<BatchJob>,
    cancel: CancellationToken,
}

impl JobHandle {
    pub fn new(job: BatchJob) -> Self {
        Self { job: RwLock::new(job), cancel: CancellationToken::new() }
    }

    pub fn snapshot(&self) -> BatchJob {
        self.job.read().clone()
    }

    pub fn status(&self) -> JobStatus {
        self.job.read().status
    }

    pub fn is_running(&self) -> bool {
        self.status() == JobStatus::Running
    }

    pub fn record(&self, result: UrlScanResult) {
        self.job.write().record(result);
    }

    pub fn set_current_url(&self, url: &str) {
        self.job.write().current_url = Some(url.to_string());
    }

    pub fn finish(&self, status: JobStatus, error: Option<String>) -> bool {
        let changed = self.job.write().finish(status, error);
        if changed {
            self.cancel.cancel();
        }
        changed
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_expired(&self, now: DateTime<Utc>, retention: Duration) -> bool {
        self.job.read().is_expired(now, retention)
    }

    #[cfg(test)]
    pub(crate) fn backdate(&self, by: Duration) {
        self.job.write().start_time -= by;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_rounding() {
        assert_eq!(progress_percent(0, 3), 0);
        assert_eq!(progress_percent(1, 3), 33);
        assert_eq!(progress_percent(2, 3), 67);
        assert_eq!(progress_percent(3, 3), 100);
    }

    #[test]
    fn test_record_keeps_counters_consistent() {
        let mut job = BatchJob::new("j".into(), 2);
        job.record(UrlScanResult::failed("http://a.test", "timeout"));
        assert_eq!((job.completed_urls, job.progress), (1, 50));
        assert_eq!(job.current_url.as_deref(), Some("http://a.test"));
        job.record(UrlScanResult::failed("http://b.test", "timeout"));
        job.record(UrlScanResult::failed("http://c.test", "timeout"));
        assert_eq!((job.completed_urls, job.progress), (2, 100));
    }

    #[test]
    fn test_status_only_moves_forward() {
        let mut job = BatchJob::new("j".into(), 1);
        assert!(!job.finish(JobStatus::Running, None));
        assert!(job.finish(JobStatus::Stopped, None));
        assert!(!job.finish(JobStatus::Completed, None));
        assert_eq!(job.status, JobStatus::Stopped);
    }

    #[test]
    fn test_expiry_requires_terminal_status() {
        let now = Utc::now();
        let mut job = BatchJob::new("j".into(), 1);
        job.start_time = now - Duration::hours(25);
        assert!(!job.is_expired(now, Duration::hours(24)));
        job.finish(JobStatus::Completed, None);
        assert!(job.is_expired(now, Duration::hours(24)));
    }

    #[test]
    fn test_handle_finish_cancels_token() {
        let handle = JobHandle::new(BatchJob::new("j".into(), 1));
        let token = handle.cancel_token();
        assert!(handle.finish(JobStatus::Stopped, None));
        assert!(token.is_cancelled());
        assert!(!handle.finish(JobStatus::Stopped, None));
    }

    #[test]
    fn test_json_shape() {
        let v = serde_json::to_value(BatchJob::new("j".into(), 4)).unwrap();
        assert_eq!(v["status"], "running");
        assert_eq!(v["totalUrls"], 4);
        assert!(v.get("completedUrls").is_some());
    }
}
