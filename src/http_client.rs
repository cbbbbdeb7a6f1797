//! Outbound HTTP.
//!
//! Every adapter fetch, registry refresh and resolution hop goes through the
//! [`Fetch`] trait so timeout, header and cancellation policy live in one
//! place. [`FetchClient`] is the network implementation; [`FixtureFetcher`]
//! serves canned documents for offline runs and tests.
//!
//! Features of the network client:
//! - Browser header profile on every request (see [`crate::fingerprint`])
//! - `no-cache` request semantics
//! - Bounded per-request timeout
//! - Brotli, Zstd, Gzip compression (auto-negotiated)
//! - Non-2xx responses surfaced as [`Error::Http`]

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::REFERER;
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use url::Url;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::fingerprint::{random_profile, BrowserProfile};

/// A single GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub referer: Option<String>,
    pub headers: Vec<(String, String)>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            referer: None,
            headers: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A fetched document and the URL it was served from after redirects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub url: String,
    pub body: String,
}

/// The single chokepoint for outbound requests.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Fetch `request.url` and return the decoded body.
    ///
    /// Resolves to [`Error::Cancelled`] as soon as `cancel` fires.
    async fn fetch(&self, request: &FetchRequest, cancel: &CancellationToken) -> Result<String>;

    /// Like [`Fetch::fetch`], also reporting where redirects ended up.
    ///
    /// Implementations that do not follow redirects keep the default, which
    /// reports the requested URL.
    async fn fetch_page(
        &self,
        request: &FetchRequest,
        cancel: &CancellationToken,
    ) -> Result<FetchedPage> {
        let body = self.fetch(request, cancel).await?;
        Ok(FetchedPage {
            url: request.url.clone(),
            body,
        })
    }
}

/// Network fetcher backed by `reqwest`.
pub struct FetchClient {
    client: Client,
    profile: BrowserProfile,
}

impl FetchClient {
    /// Create a client with timeouts from `config` and a random browser profile.
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_profile(
            random_profile(),
            config.fetch_timeout(),
            config.connect_timeout(),
        )
    }

    /// Create client with specific browser profile
    pub fn with_profile(
        profile: BrowserProfile,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .tcp_nodelay(true)
            .use_rustls_tls()
            .brotli(true)
            .zstd(true)
            .gzip(true)
            .deflate(true)
            .default_headers(profile.to_headers())
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .cookie_store(true)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, profile })
    }

    /// Browser profile whose headers this client sends.
    #[must_use]
    pub fn profile(&self) -> &BrowserProfile {
        &self.profile
    }

    async fn send(&self, request: &FetchRequest) -> Result<FetchedPage> {
        let mut builder = self.client.get(&request.url);
        if let Some(referer) = &request.referer {
            builder = builder.header(REFERER, referer);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| classify(&request.url, &e))?;

        let status = response.status();
        debug!(status = %status, version = ?response.version(), "Response received");
        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                url: request.url.clone(),
            });
        }

        let url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| classify(&request.url, &e))?;
        Ok(FetchedPage { url, body })
    }
}

#[async_trait]
impl Fetch for FetchClient {
    async fn fetch(&self, request: &FetchRequest, cancel: &CancellationToken) -> Result<String> {
        self.fetch_page(request, cancel).await.map(|page| page.body)
    }

    #[instrument(skip(self, request, cancel), fields(url = %request.url))]
    async fn fetch_page(
        &self,
        request: &FetchRequest,
        cancel: &CancellationToken,
    ) -> Result<FetchedPage> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::Cancelled),
            page = self.send(request) => page,
        }
    }
}

fn classify(url: &str, err: &reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Timeout {
            url: url.to_string(),
        }
    } else if let Some(status) = err.status() {
        Error::Http {
            status: status.as_u16(),
            url: url.to_string(),
        }
    } else {
        Error::Transport {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}

/// Same hop limit as the network client's redirect policy.
const MAX_REDIRECTS: usize = 10;

#[derive(Debug, Clone)]
enum Fixture {
    Body(String),
    Status(u16),
    Redirect(String),
}

/// Serves canned documents keyed by exact URL and records every request.
///
/// Unknown URLs answer `404`. Redirect fixtures are followed the way the
/// network client follows them; only the original request is logged.
/// Fixtures can be swapped between calls, which lets a test make an
/// upstream go away after a successful fetch.
#[derive(Debug, Default)]
pub struct FixtureFetcher {
    pages: Mutex<HashMap<String, Fixture>>,
    log: Mutex<Vec<FetchRequest>>,
}

impl FixtureFetcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_page(self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.set_page(url, body);
        self
    }

    #[must_use]
    pub fn with_status(self, url: impl Into<String>, status: u16) -> Self {
        self.set_status(url, status);
        self
    }

    /// Answer `from` with a redirect to `to` (absolute or relative).
    #[must_use]
    pub fn with_redirect(self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.pages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(from.into(), Fixture::Redirect(to.into()));
        self
    }

    pub fn set_page(&self, url: impl Into<String>, body: impl Into<String>) {
        self.pages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.into(), Fixture::Body(body.into()));
    }

    pub fn set_status(&self, url: impl Into<String>, status: u16) {
        self.pages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.into(), Fixture::Status(status));
    }

    /// Every request seen so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<FetchRequest> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of requests made for `url`.
    #[must_use]
    pub fn hits(&self, url: &str) -> usize {
        self.requests().iter().filter(|r| r.url == url).count()
    }
}

impl FixtureFetcher {
    fn lookup(&self, url: &str) -> Option<Fixture> {
        self.pages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .cloned()
    }
}

#[async_trait]
impl Fetch for FixtureFetcher {
    async fn fetch(&self, request: &FetchRequest, cancel: &CancellationToken) -> Result<String> {
        self.fetch_page(request, cancel).await.map(|page| page.body)
    }

    async fn fetch_page(
        &self,
        request: &FetchRequest,
        cancel: &CancellationToken,
    ) -> Result<FetchedPage> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let mut url = request.url.clone();
        for _ in 0..=MAX_REDIRECTS {
            match self.lookup(&url) {
                Some(Fixture::Body(body)) => return Ok(FetchedPage { url, body }),
                Some(Fixture::Status(status)) => return Err(Error::Http { status, url }),
                Some(Fixture::Redirect(to)) => {
                    url = Url::parse(&url)?.join(&to)?.to_string();
                }
                None => return Err(Error::Http { status: 404, url }),
            }
        }
        Err(Error::Transport {
            url: request.url.clone(),
            message: "too many redirects".to_string(),
        })
    }
}
