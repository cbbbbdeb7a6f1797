//! `reelfetch` - catalog scraping and chained link resolution
//!
//! # Features
//!
//! - **Provider Registry**: live base URLs with a TTL cache, single-flight
//!   refresh and stale-data fallback
//! - **Site Profiles**: data-driven selector tables with ordered fallback
//!   strategies and a generic profile for unknown sites
//! - **Title Tagging**: quality, language, audio, video, series and year facets
//! - **Link Resolution**: multi-hop chains as explicit step lists, with an
//!   overall deadline and cancellation
//!
//! # Example
//!
//! ```rust,no_run
//! use reelfetch::{Aggregator, Config};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None)?;
//!     let aggregator = Aggregator::new(&config)?;
//!     let page = aggregator
//!         .list_catalog("4kHDHub", Some(1), None, &CancellationToken::new())
//!         .await?;
//!     println!("{} items", page.total_results);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod gateway;
pub mod http_client;
pub mod model;
pub mod normalize;
pub mod quota;
pub mod registry;
pub mod resolve;
pub mod service;
pub mod site;
pub mod tagger;

pub use config::Config;
pub use error::{Error, Result};
pub use fingerprint::{chrome_profile, firefox_profile, random_profile, BrowserProfile};
pub use gateway::{Gateway, Request};
pub use http_client::{Fetch, FetchClient, FetchRequest, FetchedPage, FixtureFetcher};
pub use model::{CatalogItem, DetailRecord, DownloadLink, Episode, ProviderType, Season};
pub use normalize::{BatchReport, CatalogPage, DetailBatch, Envelope, ResolvedDetail};
pub use quota::{ApiKeyValidator, Credentials, KeyValidation, OpenAccess, StaticKeys};
pub use registry::{Clock, Provider, ProviderRegistry, RegistrySource, SystemClock};
pub use resolve::{FailureReason, ResolutionFailure, ResolutionResult, ResolutionState, Resolver};
pub use service::Aggregator;
pub use site::{CatalogQuery, SiteAdapter, SiteRouter};
pub use tagger::{AudioFormat, Language, Quality, TitleTags, VideoFormat};

/// Version of reelfetch
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
