//! Site-specific markup extraction.
//!
//! Each upstream site is described by a [`profile::SiteProfile`] table:
//! ordered selector strategies for listings, field rules for titles, links
//! and images, and detail-page rules. One engine ([`profile::ProfileAdapter`])
//! runs every table, so supporting a new site means adding a table rather
//! than new control flow.
//!
//! # Architecture
//!
//! - [`SiteAdapter`]: catalog/detail extraction for one site
//! - [`SiteRouter`]: dispatches provider keys to adapters, with a generic
//!   fallback for keys no table claims
//! - Shared helpers: [`normalize_image_url`], [`derive_id`], [`element_text`]
//!
//! Extraction never fails: a document matching no strategy yields an empty
//! listing or `None`.

mod detail;
pub mod profile;
pub mod profiles;

use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use scraper::{ElementRef, Html};
use url::Url;

use crate::error::{Error, Result};
use crate::model::{CatalogItem, DetailRecord};
use profile::ProfileAdapter;

/// What a catalog request asks for. Search ignores pagination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogQuery {
    Page(u32),
    Search(String),
}

impl CatalogQuery {
    /// Build from the boundary's optional arguments.
    pub fn from_parts(page: Option<u32>, search: Option<&str>) -> Result<Self> {
        if page == Some(0) {
            return Err(Error::Validation("page must be >= 1".into()));
        }
        if let Some(query) = search {
            let query = query.trim();
            if query.is_empty() {
                return Err(Error::Validation("search query must not be empty".into()));
            }
            return Ok(CatalogQuery::Search(query.to_string()));
        }
        Ok(CatalogQuery::Page(page.unwrap_or(1)))
    }
}

/// Where a document came from, for resolving relative URLs.
#[derive(Debug, Clone, Copy)]
pub struct ExtractContext<'a> {
    /// Provider base URL from the registry.
    pub base_url: &'a str,
    /// URL of the document being extracted.
    pub page_url: &'a str,
    /// Provider key, stamped onto every record.
    pub source_site: &'a str,
}

/// Catalog and detail extraction for one site.
pub trait SiteAdapter: Send + Sync {
    /// Adapter name (e.g., "4khdhub", "generic").
    fn name(&self) -> &'static str;

    /// Check if this adapter handles the given provider key.
    fn matches(&self, provider_key: &str) -> bool;

    /// Listing or search URL for `query` on the site at `base_url`.
    fn catalog_url(&self, base_url: &str, query: &CatalogQuery) -> String;

    fn extract_catalog(&self, document: &Html, ctx: &ExtractContext<'_>) -> Vec<CatalogItem>;

    fn extract_detail(&self, document: &Html, ctx: &ExtractContext<'_>) -> Option<DetailRecord>;
}

/// Routes provider keys to adapters.
///
/// Adapters are checked in registration order. First match wins; keys no
/// adapter claims get the generic profile.
pub struct SiteRouter {
    adapters: Vec<Box<dyn SiteAdapter>>,
    fallback: Box<dyn SiteAdapter>,
}

impl SiteRouter {
    /// Create a router with every built-in site profile.
    pub fn new() -> Result<Self> {
        let adapters = profiles::SITE_PROFILES
            .iter()
            .map(|p| ProfileAdapter::new(p).map(|a| Box::new(a) as Box<dyn SiteAdapter>))
            .collect::<Result<Vec<_>>>()?;
        let fallback = Box::new(ProfileAdapter::new(&profiles::GENERIC)?);

        Ok(Self { adapters, fallback })
    }

    /// Adapter for `provider_key`.
    #[must_use]
    pub fn adapter_for(&self, provider_key: &str) -> &dyn SiteAdapter {
        self.adapters
            .iter()
            .find(|a| a.matches(provider_key))
            .map_or(self.fallback.as_ref(), |a| a.as_ref())
    }

    /// Names of the registered adapters, in match order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.adapters.iter().map(|a| a.name())
    }
}

/// Make an image URL absolute.
///
/// `//host/x` gets `https:`, `/x` gets the provider base URL, absolute URLs
/// pass through. Applying it twice changes nothing.
#[must_use]
pub fn normalize_image_url(raw: &str, base_url: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with("http://") || raw.starts_with("https://") {
        return raw.to_string();
    }
    if let Some(rest) = raw.strip_prefix("//") {
        return format!("https://{rest}");
    }
    if raw.starts_with('/') {
        return format!("{}{raw}", base_url.trim_end_matches('/'));
    }
    if raw.starts_with("data:") {
        return raw.to_string();
    }
    absolute_url(raw, base_url).unwrap_or_else(|| raw.to_string())
}

/// Resolve `href` against `base`, keeping only http(s) results.
#[must_use]
pub fn absolute_url(href: &str, base: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let joined = match Url::parse(href) {
        Ok(url) => url,
        Err(_) => Url::parse(base).ok()?.join(href).ok()?,
    };
    matches!(joined.scheme(), "http" | "https").then(|| joined.to_string())
}

/// Stable-ish identifier from the detail URL's path.
///
/// Takes the last path segment longer than five characters. When none
/// exists, falls back to a synthetic timestamp+random id which is not
/// stable across requests.
#[must_use]
pub fn derive_id(detail_url: &str) -> String {
    let from_path = Url::parse(detail_url).ok().and_then(|url| {
        url.path_segments().and_then(|segments| {
            segments
                .filter(|s| s.len() > 5)
                .last()
                .map(|s| s.trim_end_matches(".html").to_string())
        })
    });

    match from_path {
        Some(id) if !id.is_empty() => id,
        _ => synthetic_id(),
    }
}

fn synthetic_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis());
    let salt: u32 = rand::thread_rng().gen();
    format!("gen-{millis}-{salt:08x}")
}

/// Whitespace-collapsed text content of an element.
#[must_use]
pub fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Strip listing decorations ("Download ", trailing "Full Movie").
#[must_use]
pub fn clean_title(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed
        .strip_prefix("Download ")
        .unwrap_or(&collapsed)
        .trim_end_matches(" Full Movie")
        .trim();
    trimmed.to_string()
}
