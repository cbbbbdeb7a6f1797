//! The boundary operations: catalog listing, detail extraction and link
//! resolution, wired over the registry, fetch client, site router and
//! resolver.
//!
//! Documents are parsed and extracted inside synchronous helpers so the
//! non-`Send` DOM never lives across an `.await`.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use scraper::Html;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::http_client::{Fetch, FetchClient, FetchRequest};
use crate::model::{CatalogItem, DetailRecord, DownloadLink, ProviderType};
use crate::normalize::{
    normalize_batch, normalize_catalog, normalize_detail, CatalogPage, DetailBatch, ResolvedDetail,
};
use crate::registry::{Provider, ProviderRegistry};
use crate::resolve::{ResolutionResult, Resolver};
use crate::site::{CatalogQuery, ExtractContext, SiteAdapter, SiteRouter};

/// Shared entry point for every boundary call.
pub struct Aggregator {
    registry: ProviderRegistry,
    fetcher: Arc<dyn Fetch>,
    router: SiteRouter,
    resolver: Resolver,
    max_concurrent: usize,
    politeness_delay: Duration,
}

impl Aggregator {
    /// Network-backed aggregator built from configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let fetcher: Arc<dyn Fetch> = Arc::new(FetchClient::new(config)?);
        let registry = ProviderRegistry::from_config(config, fetcher.clone());
        Self::with_parts(config, fetcher, registry)
    }

    /// Aggregator over caller-supplied collaborators (fixtures in tests).
    pub fn with_parts(
        config: &Config,
        fetcher: Arc<dyn Fetch>,
        registry: ProviderRegistry,
    ) -> Result<Self> {
        Ok(Self {
            registry,
            router: SiteRouter::new()?,
            resolver: Resolver::new(fetcher.clone(), config.chain_deadline())?,
            fetcher,
            max_concurrent: config.max_concurrent_resolutions.max(1),
            politeness_delay: config.politeness_delay(),
        })
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Every provider in the registry.
    pub async fn providers(&self, cancel: &CancellationToken) -> Result<Vec<Provider>> {
        self.registry.providers(cancel).await
    }

    /// `ListCatalog(providerKey, page?, searchQuery?)`.
    #[instrument(skip(self, cancel))]
    pub async fn list_catalog(
        &self,
        provider_key: &str,
        page: Option<u32>,
        search: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<CatalogPage> {
        let query = CatalogQuery::from_parts(page, search)?;
        let provider = self.registry.get_provider(provider_key, cancel).await?;
        let adapter = self.router.adapter_for(&provider.key);
        let url = adapter.catalog_url(&provider.base_url, &query);

        let request = FetchRequest::get(&url).with_referer(&provider.base_url);
        let body = self.fetcher.fetch(&request, cancel).await?;

        let ctx = ExtractContext {
            base_url: &provider.base_url,
            page_url: &url,
            source_site: &provider.key,
        };
        let items = extract_catalog(adapter, &body, &ctx);
        info!(
            provider = %provider.key,
            adapter = adapter.name(),
            items = items.len(),
            "Catalog extracted"
        );
        Ok(normalize_catalog(items))
    }

    /// `GetDetail(providerKey, detailUrl)`. The URL must belong to the
    /// provider's host; nothing is fetched otherwise.
    #[instrument(skip(self, cancel))]
    pub async fn get_detail(
        &self,
        provider_key: &str,
        detail_url: &str,
        cancel: &CancellationToken,
    ) -> Result<DetailRecord> {
        let url = self
            .registry
            .validate_url(detail_url, provider_key, cancel)
            .await?;
        let provider = self.registry.get_provider(provider_key, cancel).await?;
        self.fetch_detail(&provider, &url, cancel).await
    }

    /// Detail page plus concurrent resolution of every distinct link on it.
    pub async fn get_detail_resolved(
        &self,
        provider_key: &str,
        detail_url: &str,
        cancel: &CancellationToken,
    ) -> Result<ResolvedDetail> {
        let detail = self.get_detail(provider_key, detail_url, cancel).await?;

        let mut links: Vec<DownloadLink> = Vec::new();
        for link in detail.links() {
            if !links.iter().any(|l| l.url == link.url) {
                links.push(link.clone());
            }
        }
        debug!(links = links.len(), limit = self.max_concurrent, "Resolving detail links");

        let results = stream::iter(links)
            .map(|link| async move {
                let outcome = self.resolver.resolve_link(&link, cancel).await;
                (link.url, outcome)
            })
            .buffer_unordered(self.max_concurrent)
            .collect::<Vec<_>>()
            .await;

        Ok(normalize_detail(detail, results))
    }

    /// Several detail pages of one provider, fetched one after another with
    /// a pause between requests. A failing page is reported, not fatal.
    pub async fn get_details(
        &self,
        provider_key: &str,
        detail_urls: &[String],
        cancel: &CancellationToken,
    ) -> Result<DetailBatch> {
        let mut urls = Vec::with_capacity(detail_urls.len());
        for raw in detail_urls {
            urls.push(self.registry.validate_url(raw, provider_key, cancel).await?);
        }
        let provider = self.registry.get_provider(provider_key, cancel).await?;

        let mut results = Vec::with_capacity(urls.len());
        for (i, url) in urls.iter().enumerate() {
            if i > 0 && !self.politeness_delay.is_zero() {
                tokio::select! {
                    () = cancel.cancelled() => return Err(Error::Cancelled),
                    () = tokio::time::sleep(self.politeness_delay) => {}
                }
            }
            let outcome = self.fetch_detail(&provider, url, cancel).await;
            if let Err(e) = &outcome {
                if matches!(e, Error::Cancelled) {
                    return Err(Error::Cancelled);
                }
                warn!(url = %url, error = %e, "Detail page failed");
            }
            results.push((url.to_string(), outcome));
        }

        Ok(normalize_batch(results))
    }

    /// `ResolveLink`. The chain comes from the URL's host unless
    /// `provider_type` names one; naming a different recognised scheme
    /// than the host implies is a caller error.
    pub async fn resolve_link(
        &self,
        url: &str,
        provider_type: Option<ProviderType>,
        cancel: &CancellationToken,
    ) -> Result<ResolutionResult> {
        let parsed = Url::parse(url.trim())?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::Validation(format!("unsupported URL scheme: {}", parsed.scheme())));
        }

        let inferred = ProviderType::from_url(parsed.as_str());
        let chain = match provider_type {
            Some(explicit) if inferred != ProviderType::Direct && explicit != inferred => {
                return Err(Error::Validation(format!(
                    "link host implies {inferred}, not {explicit}"
                )));
            }
            Some(explicit) => explicit,
            None => inferred,
        };

        Ok(self.resolver.resolve(parsed.as_str(), chain, cancel).await?)
    }

    async fn fetch_detail(
        &self,
        provider: &Provider,
        url: &Url,
        cancel: &CancellationToken,
    ) -> Result<DetailRecord> {
        let request = FetchRequest::get(url.as_str()).with_referer(&provider.base_url);
        let body = self.fetcher.fetch(&request, cancel).await?;

        let adapter = self.router.adapter_for(&provider.key);
        let ctx = ExtractContext {
            base_url: &provider.base_url,
            page_url: url.as_str(),
            source_site: &provider.key,
        };
        extract_detail(adapter, &body, &ctx)
            .ok_or_else(|| Error::Extraction(format!("no detail content at {url}")))
    }
}

fn extract_catalog(adapter: &dyn SiteAdapter, body: &str, ctx: &ExtractContext<'_>) -> Vec<CatalogItem> {
    let document = Html::parse_document(body);
    adapter.extract_catalog(&document, ctx)
}

fn extract_detail(adapter: &dyn SiteAdapter, body: &str, ctx: &ExtractContext<'_>) -> Option<DetailRecord> {
    let document = Html::parse_document(body);
    adapter.extract_detail(&document, ctx)
}
