// Background multi-URL scan jobs

pub mod job;
pub mod scheduler;
pub mod store;

pub use job::{BatchJob, JobHandle, JobStatus, UrlScanResult};
pub use scheduler::{validate_urls, BatchScheduler, UrlLimits};
pub use store::{InMemoryJobStore, JobStore};
