//! Detail-page extraction: title block plus the download section.
//!
//! The download section is walked in document order. Headings and bold
//! runs update a running context (current season, current episode, the
//! quality/size line above a button); anchors that look like download
//! buttons become [`DownloadLink`]s attached to the open episode, or to the
//! record itself when no episode is open.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use super::profile::{compile_rules, first_value, parse_selector, CompiledRule, DetailProfile};
use super::{absolute_url, clean_title, derive_id, element_text, normalize_image_url, ExtractContext};
use crate::error::Result;
use crate::model::{DetailRecord, DownloadLink, Episode, ProviderType, Season};
use crate::tagger;

static SEASON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bseason\s*0*(\d{1,2})\b|\bS0*(\d{1,2})(?:\s?E\d{1,3})?\b")
        .expect("season pattern")
});
static EPISODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:episode|ep)[\s.:-]*0*(\d{1,3})\b|\bS\d{1,2}\s?E0*(\d{1,3})\b|\bE0*(\d{1,3})\b")
        .expect("episode pattern")
});
static SIZE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d+(?:\.\d+)?)\s?(TB|GB|MB)\b").expect("size pattern")
});
static DOWNLOAD_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)download|watch|stream|\b(?:480p|720p|1080p|2160p|4k)\b|g-?drive|instant|server")
        .expect("download label pattern")
});

static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").expect("anchor"));

const CONTEXT_TAGS: &[&str] = &["h2", "h3", "h4", "h5", "h6", "strong", "b"];

pub(super) struct CompiledDetail {
    title: Vec<CompiledRule>,
    image: Vec<CompiledRule>,
    rating: Vec<CompiledRule>,
    description: Vec<CompiledRule>,
    content: Vec<Selector>,
}

impl CompiledDetail {
    pub(super) fn new(profile: &DetailProfile, site: &str) -> Result<Self> {
        Ok(Self {
            title: compile_rules(profile.title, site)?,
            image: compile_rules(profile.image, site)?,
            rating: compile_rules(profile.rating, site)?,
            description: compile_rules(profile.description, site)?,
            content: profile
                .content
                .iter()
                .map(|s| parse_selector(s, site))
                .collect::<Result<Vec<_>>>()?,
        })
    }
}

/// Size token such as "1.4 GB".
pub(crate) fn parse_size(text: &str) -> Option<String> {
    SIZE_RE.captures(text).map(|c| {
        format!("{} {}", &c[1], c[2].to_ascii_uppercase())
    })
}

fn first_number(re: &Regex, text: &str) -> Option<u32> {
    let caps = re.captures(text)?;
    caps.iter()
        .skip(1)
        .flatten()
        .find_map(|m| m.as_str().parse().ok())
}

pub(crate) fn season_number(text: &str) -> Option<u32> {
    first_number(&SEASON_RE, text)
}

pub(crate) fn episode_number(text: &str) -> Option<u32> {
    first_number(&EPISODE_RE, text)
}

fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_ascii_lowercase()))
}

fn inside_anchor(element: ElementRef<'_>) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| a.value().name() == "a")
}

/// Off-site anchor that a known chain handles, or whose label reads like a
/// download button.
fn is_download_anchor(href: &str, label: &str, site_host: Option<&str>) -> bool {
    let host = host_of(href);
    if host.is_none() || host.as_deref() == site_host {
        return false;
    }
    ProviderType::from_url(href) != ProviderType::Direct || DOWNLOAD_LABEL_RE.is_match(label)
}

#[derive(Default)]
struct SectionWalk {
    download_links: Vec<DownloadLink>,
    seasons: Vec<Season>,
    /// Index of the season new episodes go into.
    current_season: Option<usize>,
    /// (season index, episode index) of the open episode.
    open_episode: Option<(usize, usize)>,
    /// Last heading text, applied to the buttons below it.
    context: String,
    /// Episode-labelled buttons open episodes even without a season heading.
    series: bool,
}

impl SectionWalk {
    fn new(series: bool) -> Self {
        Self {
            series,
            ..Self::default()
        }
    }

    fn open_season(&mut self, number: u32) -> usize {
        let idx = match self.seasons.iter().position(|s| s.number == number) {
            Some(idx) => idx,
            None => {
                self.seasons.push(Season {
                    number,
                    episodes: Vec::new(),
                });
                self.seasons.len() - 1
            }
        };
        self.current_season = Some(idx);
        idx
    }

    fn open_episode(&mut self, number: u32, title: &str) {
        let season_idx = match self.current_season {
            Some(idx) => idx,
            None => self.open_season(1),
        };
        let season = &mut self.seasons[season_idx];
        let episode_idx = match season.episodes.iter().position(|e| e.number == number) {
            Some(idx) => idx,
            None => {
                season.episodes.push(Episode {
                    number,
                    title: title.to_string(),
                    size: parse_size(title),
                    links: Vec::new(),
                });
                season.episodes.len() - 1
            }
        };
        self.open_episode = Some((season_idx, episode_idx));
    }

    fn on_heading(&mut self, text: &str) {
        if let Some(season) = season_number(text) {
            self.open_season(season);
            self.open_episode = None;
        }
        if let Some(episode) = episode_number(text) {
            self.open_episode(episode, text);
        } else if DOWNLOAD_LABEL_RE.is_match(text) || tagger::best_quality(text).is_some() {
            // A quality line above a group of buttons closes the open episode
            self.open_episode = None;
        }
        self.context = text.to_string();
    }

    fn on_link(&mut self, label: &str, href: &str) {
        let text = if label.is_empty() { self.context.as_str() } else { label };
        let Some(mut link) = DownloadLink::new(text, href) else {
            return;
        };
        link.quality = tagger::best_quality(label).or_else(|| tagger::best_quality(&self.context));
        link.size = parse_size(label).or_else(|| parse_size(&self.context));

        // Buttons labelled "Episode N" open that episode themselves
        if self.series || !self.seasons.is_empty() {
            if let Some(number) = episode_number(label) {
                self.open_episode(number, label);
            }
        }

        match self.open_episode {
            Some((s, e)) => {
                let episode = &mut self.seasons[s].episodes[e];
                if !episode.links.iter().any(|l| l.url == link.url) {
                    episode.links.push(link);
                }
            }
            None => {
                if !self.download_links.iter().any(|l| l.url == link.url) {
                    self.download_links.push(link);
                }
            }
        }
    }
}

fn walk_section(
    root: ElementRef<'_>,
    site_host: Option<&str>,
    page_url: &str,
    series: bool,
) -> SectionWalk {
    let mut walk = SectionWalk::new(series);

    for node in root.descendants() {
        let Some(element) = ElementRef::wrap(node) else {
            continue;
        };
        let name = element.value().name();

        if name == "a" {
            let Some(href) = element
                .value()
                .attr("href")
                .and_then(|h| absolute_url(h, page_url))
            else {
                continue;
            };
            let label = element_text(element);
            if is_download_anchor(&href, &label, site_host) {
                walk.on_link(&label, &href);
            }
        } else if CONTEXT_TAGS.contains(&name) && !inside_anchor(element) {
            let text = element_text(element);
            if !text.is_empty() {
                walk.on_heading(&text);
            }
        }
    }

    walk.seasons.retain(|s| !s.episodes.is_empty());
    walk
}

pub(super) fn extract(
    rules: &CompiledDetail,
    document: &Html,
    ctx: &ExtractContext<'_>,
) -> Option<DetailRecord> {
    let root = document.root_element();
    let title = first_value(&rules.title, root).map(|t| clean_title(&t))?;

    let mut record = DetailRecord::new(derive_id(ctx.page_url), &title, ctx.page_url, ctx.source_site)?;
    record.image_url = first_value(&rules.image, root)
        .map(|src| normalize_image_url(&src, ctx.base_url))
        .filter(|src| !src.is_empty());
    record.rating = first_value(&rules.rating, root);
    record.description = first_value(&rules.description, root);

    let section = rules
        .content
        .iter()
        .find_map(|sel| document.select(sel).find(|el| el.select(&ANCHOR).next().is_some()))
        .unwrap_or(root);

    let site_host = host_of(ctx.page_url);
    let walk = walk_section(
        section,
        site_host.as_deref(),
        ctx.page_url,
        record.tags.is_series,
    );
    debug!(
        title = %record.title,
        links = walk.download_links.len(),
        seasons = walk.seasons.len(),
        "Detail page extracted"
    );
    record.download_links = walk.download_links;
    record.seasons = walk.seasons;
    Some(record)
}
