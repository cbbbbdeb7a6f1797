//! Canonical records produced by the extraction adapters.
//!
//! Constructors return `Option` and refuse to build a record whose mandatory
//! fields are missing, so required fields are never empty strings.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use url::Url;

use crate::error::Error;
use crate::tagger::{Quality, TitleTags};

/// One search/listing result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub id: String,
    pub title: String,
    pub image_url: String,
    pub detail_url: String,
    #[serde(flatten)]
    pub tags: TitleTags,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<String>,
    pub source_site: String,
}

impl CatalogItem {
    /// Build an item, deriving tags from the title.
    ///
    /// Returns `None` when the title, image or detail URL is empty.
    pub fn new(
        id: impl Into<String>,
        title: &str,
        image_url: &str,
        detail_url: &str,
        source_site: &str,
    ) -> Option<Self> {
        let title = title.trim();
        let image_url = image_url.trim();
        let detail_url = detail_url.trim();
        if title.is_empty() || image_url.is_empty() || detail_url.is_empty() {
            return None;
        }

        Some(Self {
            id: id.into(),
            title: title.to_string(),
            image_url: image_url.to_string(),
            detail_url: detail_url.to_string(),
            tags: TitleTags::from_title(title),
            rating: None,
            source_site: source_site.to_string(),
        })
    }

    #[must_use]
    pub fn with_rating(mut self, rating: Option<String>) -> Self {
        self.rating = rating.filter(|r| !r.trim().is_empty());
        self
    }
}

/// Which resolution chain a download link needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    /// Already playable; resolves in zero hops.
    Direct,
    VidSrc,
    HubCloud,
    GdFlix,
    FilePress,
}

/// Host keywords that identify each obfuscation scheme.
const HOST_KEYWORDS: &[(ProviderType, &[&str])] = &[
    (ProviderType::VidSrc, &["vidsrc", "vsrc"]),
    (ProviderType::HubCloud, &["hubcloud", "hubdrive"]),
    (ProviderType::GdFlix, &["gdflix", "gdlink"]),
    (ProviderType::FilePress, &["filepress", "filebee"]),
];

impl ProviderType {
    pub const ALL: [ProviderType; 5] = [
        ProviderType::Direct,
        ProviderType::VidSrc,
        ProviderType::HubCloud,
        ProviderType::GdFlix,
        ProviderType::FilePress,
    ];

    /// Classify a link by its host.
    #[must_use]
    pub fn from_url(url: &str) -> Self {
        let Some(host) = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        else {
            return ProviderType::Direct;
        };

        HOST_KEYWORDS
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| host.contains(k)))
            .map_or(ProviderType::Direct, |(kind, _)| *kind)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderType::Direct => "direct",
            ProviderType::VidSrc => "vidsrc",
            ProviderType::HubCloud => "hubcloud",
            ProviderType::GdFlix => "gdflix",
            ProviderType::FilePress => "filepress",
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::Validation(format!("unknown provider type: {s}")))
    }
}

/// A reference into a resolution chain; not necessarily playable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadLink {
    pub label: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<Quality>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    pub provider_type: ProviderType,
    /// Filled in by the normalizer after a successful resolution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_url: Option<String>,
}

impl DownloadLink {
    /// Build a link whose chain is inferred from the URL host.
    pub fn new(label: &str, url: &str) -> Option<Self> {
        let url = url.trim();
        if url.is_empty() {
            return None;
        }
        Some(Self {
            label: label.trim().to_string(),
            url: url.to_string(),
            quality: None,
            size: None,
            provider_type: ProviderType::from_url(url),
            resolved_url: None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    pub number: u32,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    pub links: Vec<DownloadLink>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Season {
    pub number: u32,
    pub episodes: Vec<Episode>,
}

/// Result of visiting one content page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailRecord {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub detail_url: String,
    #[serde(flatten)]
    pub tags: TitleTags,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub source_site: String,
    pub download_links: Vec<DownloadLink>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub seasons: Vec<Season>,
}

impl DetailRecord {
    /// Returns `None` when the title or detail URL is empty.
    pub fn new(
        id: impl Into<String>,
        title: &str,
        detail_url: &str,
        source_site: &str,
    ) -> Option<Self> {
        let title = title.trim();
        let detail_url = detail_url.trim();
        if title.is_empty() || detail_url.is_empty() {
            return None;
        }

        Some(Self {
            id: id.into(),
            title: title.to_string(),
            image_url: None,
            detail_url: detail_url.to_string(),
            tags: TitleTags::from_title(title),
            rating: None,
            description: None,
            source_site: source_site.to_string(),
            download_links: Vec::new(),
            seasons: Vec::new(),
        })
    }

    /// Every link on the record, top-level first, then per episode.
    pub fn links(&self) -> impl Iterator<Item = &DownloadLink> {
        self.download_links.iter().chain(
            self.seasons
                .iter()
                .flat_map(|s| s.episodes.iter())
                .flat_map(|e| e.links.iter()),
        )
    }

    pub fn links_mut(&mut self) -> impl Iterator<Item = &mut DownloadLink> {
        self.download_links.iter_mut().chain(
            self.seasons
                .iter_mut()
                .flat_map(|s| s.episodes.iter_mut())
                .flat_map(|e| e.links.iter_mut()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_item_requires_mandatory_fields() {
        assert!(CatalogItem::new("a", "", "https://i/x.jpg", "https://d/x", "demo").is_none());
        assert!(CatalogItem::new("a", "Title", "  ", "https://d/x", "demo").is_none());
        assert!(CatalogItem::new("a", "Title", "https://i/x.jpg", "", "demo").is_none());

        let item = CatalogItem::new(
            "some-movie",
            " Some Movie (2022) 720p ",
            "https://i/x.jpg",
            "https://d/x",
            "demo",
        )
        .unwrap();
        assert_eq!(item.title, "Some Movie (2022) 720p");
        assert_eq!(item.tags.year, Some(2022));
    }

    #[test]
    fn catalog_item_serializes_flat_camel_case() {
        let item = CatalogItem::new("id", "Show S01 1080p", "https://i/x.jpg", "https://d/x", "demo")
            .unwrap()
            .with_rating(Some("7.9".into()));
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["imageUrl"], "https://i/x.jpg");
        assert_eq!(json["isSeries"], true);
        assert_eq!(json["rating"], "7.9");
        assert_eq!(json["sourceSite"], "demo");
    }

    #[test]
    fn provider_type_from_host() {
        assert_eq!(
            ProviderType::from_url("https://vidsrc.xyz/embed/movie/tt123"),
            ProviderType::VidSrc
        );
        assert_eq!(
            ProviderType::from_url("https://hubcloud.one/drive/abc"),
            ProviderType::HubCloud
        );
        assert_eq!(
            ProviderType::from_url("https://new6.gdflix.dad/file/xyz"),
            ProviderType::GdFlix
        );
        assert_eq!(
            ProviderType::from_url("https://cdn.example/video.mp4"),
            ProviderType::Direct
        );
        assert_eq!(ProviderType::from_url("garbage"), ProviderType::Direct);
    }

    #[test]
    fn provider_type_parses_names() {
        assert_eq!("HubCloud".parse::<ProviderType>().unwrap(), ProviderType::HubCloud);
        assert!("ftp".parse::<ProviderType>().is_err());
    }

    #[test]
    fn detail_links_walks_episodes() {
        let mut detail = DetailRecord::new("x", "Show S01", "https://d/x", "demo").unwrap();
        detail.download_links.push(DownloadLink::new("Pack", "https://a/1").unwrap());
        detail.seasons.push(Season {
            number: 1,
            episodes: vec![Episode {
                number: 1,
                title: "Episode 1".into(),
                size: None,
                links: vec![DownloadLink::new("E1", "https://a/2").unwrap()],
            }],
        });
        let urls: Vec<&str> = detail.links().map(|l| l.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a/1", "https://a/2"]);

        for link in detail.links_mut() {
            link.resolved_url = Some("https://cdn/file.mkv".into());
        }
        assert!(detail.links().all(|l| l.resolved_url.is_some()));
    }
}
