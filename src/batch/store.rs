use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use super::job::JobHandle;

/// Registry of batch jobs by id
pub trait JobStore: Send + Sync {
    fn get(&self, id: &str) -> Option<Arc<JobHandle>>;
    fn insert(&self, id: String, job: Arc<JobHandle>);
    fn remove(&self, id: &str) -> Option<Arc<JobHandle>>;
    fn ids(&self) -> Vec<String>;

    /// Delete terminal jobs older than `retention`, returning how many went
    fn sweep(&self, now: DateTime<Utc>, retention: Duration) -> usize {
        let mut removed = 0;
        for id in self.ids() {
            let expired = self.get(&id).map(|h| h.is_expired(now, retention)).unwrap_or(false);
            if expired && self.remove(&id).is_some() {
                removed += 1;
            }
        }
        removed
    }
}

#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: DashMap<String, Arc<JobHandle>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

impl JobStore for InMemoryJobStore {
    fn get(&self, id: &str) -> Option<Arc<JobHandle>> {
        self.jobs.get(id).map(|entry| entry.value().clone())
    }

    fn insert(&self, id: String, job: Arc<JobHandle>) {
        self.jobs.insert(id, job);
    }

    fn remove(&self, id: &str) -> Option<Arc<JobHandle>> {
        self.jobs.remove(id).map(|(_, job)| job)
    }

    fn ids(&self) -> Vec<String> {
        self.jobs.iter().map(|entry| entry.key().clone()).collect()
    }
}
