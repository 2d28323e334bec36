use std::time::{Duration, Instant};

use ahash::AHashMap;
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, Method};

use crate::error::{ProberError, TransportError};

/// Realistic desktop browser User-Agent used for every request
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Response bodies are only kept up to this size for signature matching
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Case-insensitive response header map. Repeated headers are joined,
/// `set-cookie` with "; " and everything else with ", ".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHeaders {
    inner: AHashMap<String, String>,
}

impl ResponseHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, value: &str) {
        let key = name.to_ascii_lowercase();
        let sep = if key == "set-cookie" { "; " } else { ", " };
        self.inner
            .entry(key)
            .and_modify(|existing| {
                existing.push_str(sep);
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains_key(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for ResponseHeaders {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut headers = ResponseHeaders::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

/// One outgoing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub follow_redirects: bool,
    /// Overrides the client-wide timeout for this request
    pub timeout: Option<Duration>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_string(),
            headers: Vec::new(),
            body: None,
            follow_redirects: false,
            timeout: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|(n, _)| n.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, Default)]
pub struct FetchResponse {
    pub status: u16,
    pub headers: ResponseHeaders,
    pub body: Option<String>,
    pub elapsed_ms: u64,
}

/// Single-attempt HTTP transport. Implementations never retry.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_once(&self, request: &FetchRequest) -> Result<FetchResponse, TransportError>;
}

/// `Fetcher` backed by two pooled reqwest clients, one per redirect policy
pub struct ReqwestFetcher {
    direct: Client,
    following: Client,
}

impl ReqwestFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self, ProberError> {
        let build = |follow| {
            create_probe_client(timeout_secs, 100, follow)
                .map_err(|e| ProberError::Config(format!("failed to build HTTP client: {}", e)))
        };
        Ok(Self {
            direct: build(false)?,
            following: build(true)?,
        })
    }
}

#[async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch_once(&self, request: &FetchRequest) -> Result<FetchResponse, TransportError> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| TransportError::Request(format!("invalid method {}: {}", request.method, e)))?;
        let client = if request.follow_redirects { &self.following } else { &self.direct };

        let mut builder = client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let start = Instant::now();
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let mut headers = ResponseHeaders::new();
        for (name, value) in response.headers() {
            headers.insert(name.as_str(), &String::from_utf8_lossy(value.as_bytes()));
        }

        // A body that fails mid-stream still leaves us a usable status
        let body = match response.bytes().await {
            Ok(bytes) => {
                let slice = &bytes[..bytes.len().min(MAX_BODY_BYTES)];
                Some(String::from_utf8_lossy(slice).into_owned())
            }
            Err(e) => {
                tracing::debug!("body read failed for {}: {}", request.url, e);
                None
            }
        };

        Ok(FetchResponse {
            status,
            headers,
            body,
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }
}

/// Create a pooled probe client. Redirects are only followed when asked for.
pub fn create_probe_client(
    timeout_secs: u64,
    max_idle_connections: usize,
    follow_redirects: bool,
) -> reqwest::Result<Client> {
    let redirect = if follow_redirects {
        reqwest::redirect::Policy::limited(5)
    } else {
        reqwest::redirect::Policy::none()
    };

    ClientBuilder::new()
        .pool_max_idle_per_host(max_idle_connections)
        .pool_idle_timeout(Some(Duration::from_secs(90)))
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .tcp_nodelay(true)
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(5))
        .gzip(true)
        .brotli(true)
        .use_rustls_tls()
        .tls_sni(true)
        .https_only(false)
        .redirect(redirect)
        .user_agent(BROWSER_USER_AGENT)
        // Auditing targets often sit behind self-signed staging certificates
        .danger_accept_invalid_certs(true)
        .build()
}
