//! Data-driven selector engine.
//!
//! A [`SiteProfile`] is a static table; [`ProfileAdapter`] compiles it once
//! and runs it against documents. Listing containers are tried strategy by
//! strategy: the first strategy that yields at least one complete item wins,
//! later strategies are only consulted when earlier ones produce nothing.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::detail::{self, CompiledDetail};
use super::{
    absolute_url, clean_title, derive_id, element_text, normalize_image_url, CatalogQuery,
    ExtractContext, SiteAdapter,
};
use crate::error::{Error, Result};
use crate::model::{CatalogItem, DetailRecord};

/// Read a value from the first element matching `selector`.
///
/// An empty `selector` means the element the rule is applied to. `attr`
/// `None` reads whitespace-collapsed text content.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub selector: &'static str,
    pub attr: Option<&'static str>,
}

impl FieldRule {
    pub const fn text(selector: &'static str) -> Self {
        Self {
            selector,
            attr: None,
        }
    }

    pub const fn attr(selector: &'static str, attr: &'static str) -> Self {
        Self {
            selector,
            attr: Some(attr),
        }
    }
}

/// Detail-page rules.
#[derive(Debug, Clone, Copy)]
pub struct DetailProfile {
    pub title: &'static [FieldRule],
    pub image: &'static [FieldRule],
    pub rating: &'static [FieldRule],
    pub description: &'static [FieldRule],
    /// Containers holding the download section, most specific first.
    pub content: &'static [&'static str],
}

/// Everything the engine needs to know about one site.
#[derive(Debug, Clone, Copy)]
pub struct SiteProfile {
    pub name: &'static str,
    /// Provider keys this profile serves (compared case-insensitively).
    pub keys: &'static [&'static str],
    /// Path template for page N > 1; `{page}` is substituted.
    pub page_path: &'static str,
    /// Path template for search; `{query}` is substituted URL-encoded.
    pub search_path: &'static str,
    /// Ordered listing-container strategies.
    pub item_selectors: &'static [&'static str],
    pub title: &'static [FieldRule],
    pub link: &'static [FieldRule],
    pub image: &'static [FieldRule],
    pub rating: &'static [FieldRule],
    pub detail: DetailProfile,
}

#[derive(Debug)]
pub(super) struct CompiledRule {
    selector: Option<Selector>,
    attr: Option<&'static str>,
}

impl CompiledRule {
    fn compile(rule: &FieldRule, site: &str) -> Result<Self> {
        let selector = if rule.selector.is_empty() {
            None
        } else {
            Some(parse_selector(rule.selector, site)?)
        };
        Ok(Self {
            selector,
            attr: rule.attr,
        })
    }

    /// First non-empty value under `scope`.
    pub(super) fn read(&self, scope: ElementRef<'_>) -> Option<String> {
        match &self.selector {
            None => self.value_of(scope),
            Some(selector) => scope.select(selector).find_map(|el| self.value_of(el)),
        }
    }

    fn value_of(&self, element: ElementRef<'_>) -> Option<String> {
        let value = match self.attr {
            Some(attr) => element.value().attr(attr)?.trim().to_string(),
            None => element_text(element),
        };
        (!value.is_empty()).then_some(value)
    }
}

pub(super) fn compile_rules(rules: &[FieldRule], site: &str) -> Result<Vec<CompiledRule>> {
    rules.iter().map(|r| CompiledRule::compile(r, site)).collect()
}

/// First value produced by any rule, in order.
pub(super) fn first_value(rules: &[CompiledRule], scope: ElementRef<'_>) -> Option<String> {
    rules.iter().find_map(|r| r.read(scope))
}

pub(super) fn parse_selector(selector: &str, site: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| Error::Config(format!("{site}: invalid selector {selector:?}: {e:?}")))
}

/// Runs one [`SiteProfile`].
pub struct ProfileAdapter {
    profile: &'static SiteProfile,
    items: Vec<(&'static str, Selector)>,
    title: Vec<CompiledRule>,
    link: Vec<CompiledRule>,
    image: Vec<CompiledRule>,
    rating: Vec<CompiledRule>,
    detail: CompiledDetail,
}

impl ProfileAdapter {
    /// Compile every selector in the profile.
    pub fn new(profile: &'static SiteProfile) -> Result<Self> {
        let site = profile.name;
        let items = profile
            .item_selectors
            .iter()
            .map(|s| parse_selector(s, site).map(|sel| (*s, sel)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            profile,
            items,
            title: compile_rules(profile.title, site)?,
            link: compile_rules(profile.link, site)?,
            image: compile_rules(profile.image, site)?,
            rating: compile_rules(profile.rating, site)?,
            detail: CompiledDetail::new(&profile.detail, site)?,
        })
    }

    fn extract_item(&self, element: ElementRef<'_>, ctx: &ExtractContext<'_>) -> Option<CatalogItem> {
        let title = first_value(&self.title, element).map(|t| clean_title(&t))?;
        let detail_url = first_value(&self.link, element)
            .and_then(|href| absolute_url(&href, ctx.page_url))?;
        let image_url = first_value(&self.image, element)
            .map(|src| normalize_image_url(&src, ctx.base_url))?;
        let rating = first_value(&self.rating, element);

        CatalogItem::new(derive_id(&detail_url), &title, &image_url, &detail_url, ctx.source_site)
            .map(|item| item.with_rating(rating))
    }
}

impl SiteAdapter for ProfileAdapter {
    fn name(&self) -> &'static str {
        self.profile.name
    }

    fn matches(&self, provider_key: &str) -> bool {
        self.profile
            .keys
            .iter()
            .any(|k| k.eq_ignore_ascii_case(provider_key.trim()))
    }

    fn catalog_url(&self, base_url: &str, query: &CatalogQuery) -> String {
        let base = base_url.trim_end_matches('/');
        match query {
            CatalogQuery::Page(1) => format!("{base}/"),
            CatalogQuery::Page(n) => {
                format!("{base}{}", self.profile.page_path.replace("{page}", &n.to_string()))
            }
            CatalogQuery::Search(q) => format!(
                "{base}{}",
                self.profile
                    .search_path
                    .replace("{query}", &urlencoding::encode(q))
            ),
        }
    }

    fn extract_catalog(&self, document: &Html, ctx: &ExtractContext<'_>) -> Vec<CatalogItem> {
        for (source, selector) in &self.items {
            let mut seen = HashSet::new();
            let mut matched = 0usize;
            let items: Vec<CatalogItem> = document
                .select(selector)
                .inspect(|_| matched += 1)
                .filter_map(|el| self.extract_item(el, ctx))
                .filter(|item| seen.insert(item.detail_url.clone()))
                .collect();

            debug!(
                site = self.profile.name,
                strategy = source,
                matched,
                extracted = items.len(),
                "Listing strategy tried"
            );
            if !items.is_empty() {
                return items;
            }
        }
        Vec::new()
    }

    fn extract_detail(&self, document: &Html, ctx: &ExtractContext<'_>) -> Option<DetailRecord> {
        detail::extract(&self.detail, document, ctx)
    }
}
