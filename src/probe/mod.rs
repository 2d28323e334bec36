pub mod executor;

pub use executor::{BypassKind, Classified, ProbeExecutor, ProbeStatus, TestOutcome};
