//! Chained link resolution.
//!
//! A chain is an ordered list of hops. Each hop fetches the current URL,
//! extracts the next target from the response, and makes it absolute
//! against the URL the response was served from after redirects. The walk is an explicit state machine:
//!
//! ```text
//! Pending(0) -> Pending(1) -> ... -> Pending(n) -> Resolved(url)
//!     \______________\____________________\-----> Failed { hop, reason }
//! ```
//!
//! `Pending(i)` means `i` hops have completed. A failure at the k-th hop
//! (1-based) is reported as `hop = k` and no later hop is fetched. There is
//! no retry inside a chain; callers re-run the whole chain instead.

pub mod chains;
pub mod step;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::time::{timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::http_client::Fetch;
use crate::model::{DownloadLink, ProviderType};
use chains::ChainBook;
use step::ResolutionStep;

/// Why a chain stopped.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// The hop's document had no match for any extraction rule.
    #[error("no-match")]
    NoMatch,
    #[error("http-error {status}")]
    Http { status: u16 },
    #[error("transport error: {message}")]
    Transport { message: String },
    #[error("hop timed out")]
    Timeout,
    #[error("cancelled")]
    Cancelled,
    /// The overall chain deadline elapsed.
    #[error("chain deadline exceeded")]
    DeadlineExceeded,
    /// The extracted target was not a usable http(s) URL.
    #[error("invalid target {target:?}")]
    InvalidTarget { target: String },
    #[error("no chain registered")]
    NoChain,
}

impl From<&Error> for FailureReason {
    fn from(err: &Error) -> Self {
        match err {
            Error::Http { status, .. } => FailureReason::Http { status: *status },
            Error::Timeout { .. } => FailureReason::Timeout,
            Error::Cancelled => FailureReason::Cancelled,
            other => FailureReason::Transport {
                message: other.to_string(),
            },
        }
    }
}

/// Terminal failure of one chain invocation.
///
/// `hop` is the 1-based ordinal of the failing hop; `0` means the start URL
/// was rejected before any fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("{chain} chain failed at hop {hop}: {reason}")]
pub struct ResolutionFailure {
    pub chain: ProviderType,
    pub hop: usize,
    pub reason: FailureReason,
}

/// Successful resolution: every hop produced a non-empty target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionResult {
    pub final_url: String,
    pub hops_completed: usize,
    pub provider_type: ProviderType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionState {
    /// Number of hops completed so far.
    Pending(usize),
    Resolved(String),
    Failed { hop: usize, reason: FailureReason },
}

/// Runs chains from a [`ChainBook`] through a [`Fetch`] implementation.
pub struct Resolver {
    fetcher: Arc<dyn Fetch>,
    chains: ChainBook,
    deadline: Duration,
}

impl Resolver {
    /// Resolver over the built-in chains.
    pub fn new(fetcher: Arc<dyn Fetch>, deadline: Duration) -> Result<Self> {
        Ok(Self::with_chains(fetcher, ChainBook::builtin()?, deadline))
    }

    #[must_use]
    pub fn with_chains(fetcher: Arc<dyn Fetch>, chains: ChainBook, deadline: Duration) -> Self {
        Self {
            fetcher,
            chains,
            deadline,
        }
    }

    /// Resolve a link using the chain its provider type selects.
    pub async fn resolve_link(
        &self,
        link: &DownloadLink,
        cancel: &CancellationToken,
    ) -> std::result::Result<ResolutionResult, ResolutionFailure> {
        self.resolve(&link.url, link.provider_type, cancel).await
    }

    /// Walk the chain for `provider_type` starting at `start_url`.
    #[instrument(skip(self, cancel), fields(chain = %provider_type))]
    pub async fn resolve(
        &self,
        start_url: &str,
        provider_type: ProviderType,
        cancel: &CancellationToken,
    ) -> std::result::Result<ResolutionResult, ResolutionFailure> {
        let fail = |hop, reason| ResolutionFailure {
            chain: provider_type,
            hop,
            reason,
        };

        let chain = self
            .chains
            .get(provider_type)
            .ok_or_else(|| fail(0, FailureReason::NoChain))?;
        let mut current = Url::parse(start_url.trim())
            .ok()
            .filter(is_web_url)
            .ok_or_else(|| {
                fail(
                    0,
                    FailureReason::InvalidTarget {
                        target: start_url.to_string(),
                    },
                )
            })?;

        let deadline = Instant::now() + self.deadline;
        let mut previous: Option<Url> = None;
        let mut state = ResolutionState::Pending(0);

        loop {
            state = match state {
                ResolutionState::Pending(done) if done == chain.len() => {
                    ResolutionState::Resolved(current.to_string())
                }
                ResolutionState::Pending(done) => {
                    let step = &chain.steps[done];
                    match self
                        .hop(step, &current, previous.as_ref(), deadline, cancel)
                        .await
                    {
                        Ok((landed, next)) => {
                            debug!(hop = done + 1, step = step.name(), next = %next, "Hop resolved");
                            previous = Some(landed);
                            current = next;
                            ResolutionState::Pending(done + 1)
                        }
                        Err(reason) => ResolutionState::Failed {
                            hop: done + 1,
                            reason,
                        },
                    }
                }
                ResolutionState::Resolved(final_url) => {
                    debug!(final_url = %final_url, hops = chain.len(), "Chain resolved");
                    return Ok(ResolutionResult {
                        final_url,
                        hops_completed: chain.len(),
                        provider_type,
                    });
                }
                ResolutionState::Failed { hop, reason } => {
                    warn!(hop, reason = %reason, "Chain failed");
                    return Err(fail(hop, reason));
                }
            };
        }
    }

    async fn hop(
        &self,
        step: &ResolutionStep,
        url: &Url,
        previous: Option<&Url>,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> std::result::Result<(Url, Url), FailureReason> {
        let request = step.request_for(url.as_str(), previous.map(Url::as_str));
        let page = match timeout_at(deadline, self.fetcher.fetch_page(&request, cancel)).await {
            Err(_) => return Err(FailureReason::DeadlineExceeded),
            Ok(Err(e)) => return Err(FailureReason::from(&e)),
            Ok(Ok(page)) => page,
        };
        let landed = Url::parse(&page.url).unwrap_or_else(|_| url.clone());

        let target = step.extract_next(&page.body).ok_or(FailureReason::NoMatch)?;
        let next = landed
            .join(&target)
            .ok()
            .filter(is_web_url)
            .ok_or(FailureReason::InvalidTarget { target })?;
        Ok((landed, next))
    }
}

fn is_web_url(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https") && url.host_str().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::FixtureFetcher;

    const EMBED: &str = "https://vidsrc.example/embed/movie/tt0111161";

    fn vidsrc_fixtures() -> FixtureFetcher {
        FixtureFetcher::new()
            .with_page(
                EMBED,
                r#"<iframe id="player_iframe" src="//cloudnestra.example/rcp/abc123"></iframe>"#,
            )
            .with_page(
                "https://cloudnestra.example/rcp/abc123",
                r"<script>$('#pl').attr({src: '/prorcp/def456'});</script>",
            )
            .with_page(
                "https://cloudnestra.example/prorcp/def456",
                r#"<div id="player"><iframe src="https://player.example/e/789"></iframe></div>"#,
            )
    }

    fn resolver(fetcher: Arc<FixtureFetcher>) -> Resolver {
        Resolver::new(fetcher, Duration::from_secs(30)).unwrap()
    }

    #[tokio::test]
    async fn four_hop_chain_resolves() {
        let fetcher = Arc::new(vidsrc_fixtures().with_page(
            "https://player.example/e/789",
            r#"new Playerjs({file:"https:\/\/cdn.example\/hls\/master.m3u8"})"#,
        ));
        let result = resolver(fetcher.clone())
            .resolve(EMBED, ProviderType::VidSrc, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.final_url, "https://cdn.example/hls/master.m3u8");
        assert_eq!(result.hops_completed, 4);

        let requests = fetcher.requests();
        assert_eq!(requests.len(), 4);
        assert_eq!(requests[0].referer, None);
        assert_eq!(
            requests[2].referer.as_deref(),
            Some("https://cloudnestra.example/rcp/abc123")
        );
    }

    #[tokio::test]
    async fn relative_targets_join_against_redirected_host() {
        let fetcher = Arc::new(
            FixtureFetcher::new()
                .with_redirect(
                    "https://hubcloud.one/drive/abc",
                    "https://hubcloud.fans/drive/abc",
                )
                .with_page(
                    "https://hubcloud.fans/drive/abc",
                    "<script>var url = '/gateway?id=1';</script>",
                )
                .with_page(
                    "https://hubcloud.fans/gateway?id=1",
                    r#"<a id="fsl" href="https://cdn.example/f.mkv">Download</a>"#,
                ),
        );
        let result = resolver(fetcher.clone())
            .resolve(
                "https://hubcloud.one/drive/abc",
                ProviderType::HubCloud,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.final_url, "https://cdn.example/f.mkv");
        let requests = fetcher.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].url, "https://hubcloud.fans/gateway?id=1");
        assert_eq!(
            requests[1].referer.as_deref(),
            Some("https://hubcloud.fans/drive/abc")
        );
    }

    #[tokio::test]
    async fn miss_at_last_hop_aborts() {
        let fetcher = Arc::new(
            vidsrc_fixtures().with_page("https://player.example/e/789", "<html>removed</html>"),
        );
        let err = resolver(fetcher.clone())
            .resolve(EMBED, ProviderType::VidSrc, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.hop, 4);
        assert_eq!(err.reason, FailureReason::NoMatch);
        assert_eq!(fetcher.requests().len(), 4);
    }

    #[tokio::test]
    async fn http_error_stops_chain_early() {
        let fetcher = Arc::new(
            vidsrc_fixtures().with_status("https://cloudnestra.example/rcp/abc123", 403),
        );
        let err = resolver(fetcher.clone())
            .resolve(EMBED, ProviderType::VidSrc, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.hop, 2);
        assert_eq!(err.reason, FailureReason::Http { status: 403 });
        assert_eq!(fetcher.requests().len(), 2);
    }

    #[tokio::test]
    async fn direct_links_resolve_without_fetching() {
        let fetcher = Arc::new(FixtureFetcher::new());
        let result = resolver(fetcher.clone())
            .resolve(
                "https://cdn.example/movie.mkv",
                ProviderType::Direct,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.final_url, "https://cdn.example/movie.mkv");
        assert_eq!(result.hops_completed, 0);
        assert!(fetcher.requests().is_empty());
    }

    #[tokio::test]
    async fn invalid_start_url_fails_at_hop_zero() {
        let fetcher = Arc::new(FixtureFetcher::new());
        let err = resolver(fetcher.clone())
            .resolve("ftp://files.example/x", ProviderType::FilePress, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.hop, 0);
        assert!(matches!(err.reason, FailureReason::InvalidTarget { .. }));
        assert!(fetcher.requests().is_empty());
    }

    #[tokio::test]
    async fn cancelled_token_stops_first_hop() {
        let fetcher = Arc::new(vidsrc_fixtures());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = resolver(fetcher.clone())
            .resolve(EMBED, ProviderType::VidSrc, &cancel)
            .await
            .unwrap_err();

        assert_eq!(err.hop, 1);
        assert_eq!(err.reason, FailureReason::Cancelled);
        assert_eq!(fetcher.requests().len(), 1);
    }

    #[tokio::test]
    async fn failure_converts_to_boundary_error() {
        let fetcher = Arc::new(FixtureFetcher::new());
        let err: Error = resolver(fetcher)
            .resolve(EMBED, ProviderType::VidSrc, &CancellationToken::new())
            .await
            .unwrap_err()
            .into();

        assert_eq!(err.status_code(), 500);
        assert_eq!(err.kind(), "resolution");
        assert!(err.to_string().contains("hop 1"));
    }
}
