//! Provider registry: logical provider keys to live base URLs.
//!
//! The registry document is a JSON object keyed by provider key:
//!
//! ```json
//! { "4kHDHub": { "name": "4kHDHub", "url": "https://4khdhub.example" } }
//! ```
//!
//! Reads are served from a process-wide cache while it is younger than the
//! TTL. A stale cache triggers one refresh (single-flighted: concurrent
//! readers keep getting the stale copy while it runs). If the refresh fails
//! the stale copy keeps being served; only a cold start with no copy at all
//! is fatal to the caller.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::http_client::{Fetch, FetchRequest};

/// One external content site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    pub key: String,
    pub name: String,
    pub base_url: String,
}

#[derive(Debug, Deserialize)]
struct RegistryEntry {
    #[serde(default)]
    name: Option<String>,
    url: String,
}

/// Where the registry document lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrySource {
    Remote(String),
    File(PathBuf),
}

impl RegistrySource {
    /// `http(s)://` locations are fetched, anything else is read from disk.
    #[must_use]
    pub fn parse(location: &str) -> Self {
        let location = location.trim();
        if location.starts_with("http://") || location.starts_with("https://") {
            RegistrySource::Remote(location.to_string())
        } else {
            let path = location.strip_prefix("file://").unwrap_or(location);
            RegistrySource::File(PathBuf::from(path))
        }
    }
}

/// Time source, injectable so staleness can be tested deterministically.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug)]
struct ProviderCache {
    data: HashMap<String, Provider>,
    fetched_at: DateTime<Utc>,
}

pub struct ProviderRegistry {
    source: Option<RegistrySource>,
    fetcher: Arc<dyn Fetch>,
    clock: Arc<dyn Clock>,
    ttl: chrono::Duration,
    cache: RwLock<Option<Arc<ProviderCache>>>,
    refresh: Mutex<()>,
}

impl ProviderRegistry {
    pub fn new(
        source: Option<RegistrySource>,
        fetcher: Arc<dyn Fetch>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        Self {
            source,
            fetcher,
            clock,
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
            cache: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    pub fn from_config(config: &Config, fetcher: Arc<dyn Fetch>) -> Self {
        Self::new(
            config.registry_url.as_deref().map(RegistrySource::parse),
            fetcher,
            Arc::new(SystemClock),
            config.cache_ttl(),
        )
    }

    /// Resolve a provider key to its current base URL.
    pub async fn get_provider_url(&self, key: &str, cancel: &CancellationToken) -> Result<String> {
        let snapshot = self.snapshot(cancel).await?;
        lookup(&snapshot.data, key)
            .map(|p| p.base_url.clone())
            .ok_or_else(|| Error::ProviderNotFound(key.to_string()))
    }

    /// Resolve a provider key to its full entry.
    pub async fn get_provider(&self, key: &str, cancel: &CancellationToken) -> Result<Provider> {
        let snapshot = self.snapshot(cancel).await?;
        lookup(&snapshot.data, key)
            .cloned()
            .ok_or_else(|| Error::ProviderNotFound(key.to_string()))
    }

    /// All known providers, sorted by key.
    pub async fn providers(&self, cancel: &CancellationToken) -> Result<Vec<Provider>> {
        let snapshot = self.snapshot(cancel).await?;
        let mut providers: Vec<Provider> = snapshot.data.values().cloned().collect();
        providers.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(providers)
    }

    /// Confirm `candidate` lives on the host registered for `key`.
    ///
    /// Only hostnames are compared; scheme, port, path and a leading `www.`
    /// are ignored.
    pub async fn validate_url(
        &self,
        candidate: &str,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<Url> {
        let candidate_url = Url::parse(candidate.trim())
            .map_err(|e| Error::Validation(format!("malformed URL {candidate:?}: {e}")))?;
        let base = self.get_provider_url(key, cancel).await?;
        let base_url = Url::parse(&base)
            .map_err(|e| Error::Registry(format!("registry URL for {key} is invalid: {e}")))?;

        if same_host(&candidate_url, &base_url) {
            Ok(candidate_url)
        } else {
            Err(Error::Validation(format!(
                "{} does not belong to provider {key} ({})",
                candidate_url.host_str().unwrap_or("<no host>"),
                base_url.host_str().unwrap_or("<no host>"),
            )))
        }
    }

    /// Fetch and parse the registry document. Does not touch the cache.
    pub async fn fetch_providers(
        &self,
        cancel: &CancellationToken,
    ) -> Result<HashMap<String, Provider>> {
        let body = match &self.source {
            None => {
                return Err(Error::Config(
                    "registry_url is not configured".to_string(),
                ))
            }
            Some(RegistrySource::Remote(url)) => {
                self.fetcher.fetch(&FetchRequest::get(url), cancel).await?
            }
            Some(RegistrySource::File(path)) => tokio::fs::read_to_string(path).await?,
        };
        parse_registry(&body)
    }

    fn fresh(&self, cache: Option<&Arc<ProviderCache>>) -> Option<Arc<ProviderCache>> {
        cache
            .filter(|c| self.clock.now() - c.fetched_at < self.ttl)
            .cloned()
    }

    async fn snapshot(&self, cancel: &CancellationToken) -> Result<Arc<ProviderCache>> {
        let current = self.cache.read().await.clone();
        if let Some(fresh) = self.fresh(current.as_ref()) {
            return Ok(fresh);
        }

        let _guard = match self.refresh.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                if let Some(stale) = current {
                    debug!("Registry refresh in flight, serving stale cache");
                    return Ok(stale);
                }
                self.refresh.lock().await
            }
        };

        // Another caller may have refreshed while we waited for the lock
        let current = self.cache.read().await.clone();
        if let Some(fresh) = self.fresh(current.as_ref()) {
            return Ok(fresh);
        }

        match self.fetch_providers(cancel).await {
            Ok(data) => {
                info!(providers = data.len(), "Provider registry refreshed");
                let cache = Arc::new(ProviderCache {
                    data,
                    fetched_at: self.clock.now(),
                });
                *self.cache.write().await = Some(Arc::clone(&cache));
                Ok(cache)
            }
            Err(e) => match current {
                Some(stale) => {
                    let age = self.clock.now() - stale.fetched_at;
                    warn!(
                        error = %e,
                        age_secs = age.num_seconds(),
                        "Registry refresh failed, serving stale cache"
                    );
                    Ok(stale)
                }
                None => Err(Error::Registry(e.to_string())),
            },
        }
    }
}

fn lookup<'a>(data: &'a HashMap<String, Provider>, key: &str) -> Option<&'a Provider> {
    data.get(key).or_else(|| {
        data.values()
            .find(|p| p.key.eq_ignore_ascii_case(key))
    })
}

fn parse_registry(body: &str) -> Result<HashMap<String, Provider>> {
    let entries: HashMap<String, RegistryEntry> = serde_json::from_str(body)?;
    let providers: HashMap<String, Provider> = entries
        .into_iter()
        .filter(|(_, entry)| Url::parse(entry.url.trim()).is_ok())
        .map(|(key, entry)| {
            let provider = Provider {
                name: entry.name.unwrap_or_else(|| key.clone()),
                key: key.clone(),
                base_url: entry.url.trim().to_string(),
            };
            (key, provider)
        })
        .collect();

    if providers.is_empty() {
        return Err(Error::Registry(
            "registry document contains no usable providers".to_string(),
        ));
    }
    Ok(providers)
}

fn normalized_host(url: &Url) -> Option<String> {
    url.host_str().map(|h| {
        let h = h.to_ascii_lowercase();
        h.strip_prefix("www.").map(str::to_string).unwrap_or(h)
    })
}

/// Hostname equality, ignoring case and a leading `www.`.
#[must_use]
pub fn same_host(a: &Url, b: &Url) -> bool {
    match (normalized_host(a), normalized_host(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::*;
    use crate::http_client::FixtureFetcher;

    const REGISTRY: &str = "https://registry.test/providers.json";

    struct ManualClock(StdMutex<DateTime<Utc>>);

    impl ManualClock {
        fn new() -> Self {
            Self(StdMutex::new(Utc::now()))
        }

        fn advance(&self, secs: i64) {
            *self.0.lock().unwrap() += chrono::Duration::seconds(secs);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    fn doc(url: &str) -> String {
        format!(r#"{{"demo": {{"name": "Demo", "url": "{url}"}}, "UHDMovies": {{"url": "https://uhd.example"}}}}"#)
    }

    fn registry(fetcher: Arc<FixtureFetcher>, clock: Arc<ManualClock>) -> ProviderRegistry {
        ProviderRegistry::new(
            Some(RegistrySource::Remote(REGISTRY.to_string())),
            fetcher,
            clock,
            Duration::from_secs(300),
        )
    }

    #[tokio::test]
    async fn fresh_cache_is_served_without_io() {
        let fetcher = Arc::new(FixtureFetcher::new().with_page(REGISTRY, doc("https://demo.example/")));
        let clock = Arc::new(ManualClock::new());
        let registry = registry(Arc::clone(&fetcher), Arc::clone(&clock));
        let cancel = CancellationToken::new();

        assert_eq!(
            registry.get_provider_url("demo", &cancel).await.unwrap(),
            "https://demo.example/"
        );
        clock.advance(120);
        registry.get_provider_url("demo", &cancel).await.unwrap();
        assert_eq!(fetcher.hits(REGISTRY), 1);
    }

    #[tokio::test]
    async fn stale_cache_is_refreshed() {
        let fetcher = Arc::new(FixtureFetcher::new().with_page(REGISTRY, doc("https://demo.example/")));
        let clock = Arc::new(ManualClock::new());
        let registry = registry(Arc::clone(&fetcher), Arc::clone(&clock));
        let cancel = CancellationToken::new();

        registry.get_provider_url("demo", &cancel).await.unwrap();
        fetcher.set_page(REGISTRY, doc("https://demo2.example/"));
        clock.advance(301);

        assert_eq!(
            registry.get_provider_url("demo", &cancel).await.unwrap(),
            "https://demo2.example/"
        );
        assert_eq!(fetcher.hits(REGISTRY), 2);
    }

    #[tokio::test]
    async fn failed_refresh_falls_back_to_stale_cache() {
        let fetcher = Arc::new(FixtureFetcher::new().with_page(REGISTRY, doc("https://demo.example/")));
        let clock = Arc::new(ManualClock::new());
        let registry = registry(Arc::clone(&fetcher), Arc::clone(&clock));
        let cancel = CancellationToken::new();

        registry.get_provider_url("demo", &cancel).await.unwrap();
        fetcher.set_status(REGISTRY, 502);
        clock.advance(600);

        assert_eq!(
            registry.get_provider_url("demo", &cancel).await.unwrap(),
            "https://demo.example/"
        );
    }

    #[tokio::test]
    async fn unparseable_refresh_keeps_stale_cache() {
        let fetcher = Arc::new(FixtureFetcher::new().with_page(REGISTRY, doc("https://demo.example/")));
        let clock = Arc::new(ManualClock::new());
        let registry = registry(Arc::clone(&fetcher), Arc::clone(&clock));
        let cancel = CancellationToken::new();

        registry.get_provider_url("demo", &cancel).await.unwrap();
        fetcher.set_page(REGISTRY, "<html>maintenance</html>");
        clock.advance(600);

        assert_eq!(
            registry.get_provider_url("demo", &cancel).await.unwrap(),
            "https://demo.example/"
        );
    }

    /// Parks every fetch after the first until released.
    struct GatedFetcher {
        inner: FixtureFetcher,
        calls: AtomicUsize,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl Fetch for GatedFetcher {
        async fn fetch(
            &self,
            request: &FetchRequest,
            cancel: &CancellationToken,
        ) -> Result<String> {
            if self.calls.fetch_add(1, Ordering::SeqCst) > 0 {
                self.entered.notify_one();
                self.release.notified().await;
            }
            self.inner.fetch(request, cancel).await
        }
    }

    #[tokio::test]
    async fn readers_get_stale_copy_while_refresh_is_in_flight() {
        let fetcher = Arc::new(GatedFetcher {
            inner: FixtureFetcher::new().with_page(REGISTRY, doc("https://demo.example/")),
            calls: AtomicUsize::new(0),
            entered: Notify::new(),
            release: Notify::new(),
        });
        let clock = Arc::new(ManualClock::new());
        let registry = Arc::new(ProviderRegistry::new(
            Some(RegistrySource::Remote(REGISTRY.to_string())),
            Arc::clone(&fetcher) as Arc<dyn Fetch>,
            Arc::clone(&clock) as Arc<dyn Clock>,
            Duration::from_secs(300),
        ));
        let cancel = CancellationToken::new();

        registry.get_provider_url("demo", &cancel).await.unwrap();
        fetcher.inner.set_page(REGISTRY, doc("https://demo2.example/"));
        clock.advance(301);

        let refresher = {
            let registry = Arc::clone(&registry);
            let cancel = cancel.clone();
            tokio::spawn(async move { registry.get_provider_url("demo", &cancel).await })
        };
        fetcher.entered.notified().await;

        let stale = tokio::time::timeout(
            Duration::from_secs(1),
            registry.get_provider_url("demo", &cancel),
        )
        .await
        .expect("reader blocked behind the refresh")
        .unwrap();
        assert_eq!(stale, "https://demo.example/");

        fetcher.release.notify_one();
        assert_eq!(refresher.await.unwrap().unwrap(), "https://demo2.example/");
        assert_eq!(fetcher.inner.hits(REGISTRY), 2);
    }

    #[tokio::test]
    async fn cold_start_failure_is_fatal() {
        let fetcher = Arc::new(FixtureFetcher::new().with_status(REGISTRY, 500));
        let registry = registry(fetcher, Arc::new(ManualClock::new()));
        let err = registry
            .get_provider_url("demo", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Registry(_)));
    }

    #[tokio::test]
    async fn unknown_key_is_not_found() {
        let fetcher = Arc::new(FixtureFetcher::new().with_page(REGISTRY, doc("https://demo.example/")));
        let registry = registry(fetcher, Arc::new(ManualClock::new()));
        let cancel = CancellationToken::new();

        let err = registry.get_provider_url("nope", &cancel).await.unwrap_err();
        assert!(matches!(err, Error::ProviderNotFound(_)));
        // Keys are matched case-insensitively as a fallback
        assert_eq!(
            registry.get_provider_url("uhdmovies", &cancel).await.unwrap(),
            "https://uhd.example"
        );
    }

    #[tokio::test]
    async fn concurrent_cold_reads_share_one_refresh() {
        let fetcher = Arc::new(FixtureFetcher::new().with_page(REGISTRY, doc("https://demo.example/")));
        let registry = Arc::new(registry(Arc::clone(&fetcher), Arc::new(ManualClock::new())));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move {
                    registry
                        .get_provider_url("demo", &CancellationToken::new())
                        .await
                })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }
        assert_eq!(fetcher.hits(REGISTRY), 1);
    }

    #[tokio::test]
    async fn validate_url_compares_hostnames_only() {
        let fetcher = Arc::new(FixtureFetcher::new().with_page(REGISTRY, doc("https://demo.example/")));
        let registry = registry(fetcher, Arc::new(ManualClock::new()));
        let cancel = CancellationToken::new();

        assert!(registry
            .validate_url("http://www.demo.example/movie/some-title/?x=1", "demo", &cancel)
            .await
            .is_ok());

        let err = registry
            .validate_url("https://evil.example/movie/some-title/", "demo", &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = registry
            .validate_url("not a url", "demo", &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn missing_source_is_config_error() {
        let registry = ProviderRegistry::new(
            None,
            Arc::new(FixtureFetcher::new()),
            Arc::new(SystemClock),
            Duration::from_secs(300),
        );
        let err = registry
            .fetch_providers(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn source_parsing() {
        assert_eq!(
            RegistrySource::parse("https://r.example/p.json"),
            RegistrySource::Remote("https://r.example/p.json".into())
        );
        assert_eq!(
            RegistrySource::parse("file:///etc/providers.json"),
            RegistrySource::File(PathBuf::from("/etc/providers.json"))
        );
    }

    #[test]
    fn registry_entries_without_valid_url_are_skipped() {
        let parsed = parse_registry(r#"{"a": {"url": "nope"}, "b": {"url": "https://b.example"}}"#)
            .unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed["b"].name, "b");
    }
}
