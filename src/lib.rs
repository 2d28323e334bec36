pub mod batch;
pub mod config;
pub mod engine;
pub mod error;
pub mod http_client;
pub mod matrix;
pub mod payload;
pub mod probe;
pub mod utils;
pub mod waf;

pub use crate::error::{ProberError, Result};
