//! Error taxonomy shared by the registry, fetch layer, adapters and boundary.
//!
//! Every variant maps onto one of the boundary status classes through
//! [`Error::status_code`], and onto a short machine label through
//! [`Error::kind`]. The `Display` text is the human-readable `message`
//! that tells callers whether to fix the request, retry later, or give up.

use thiserror::Error;

use crate::resolve::ResolutionFailure;

/// Errors surfaced by the resolution pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// Bad caller input: malformed URL, wrong provider domain, `page < 1`.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Missing or rejected API key (decided by the external validator).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Upstream site answered with a non-2xx status.
    #[error("upstream returned HTTP {status} for {url}")]
    Http { status: u16, url: String },

    /// Connection-level failure (DNS, TLS, reset, body decode).
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    /// Per-request timeout elapsed.
    #[error("request to {url} timed out")]
    Timeout { url: String },

    /// The caller aborted the request while it was in flight.
    #[error("request cancelled")]
    Cancelled,

    /// The registry could not be loaded and no cached copy exists.
    #[error("provider registry unavailable: {0}")]
    Registry(String),

    /// The registry has no entry for the requested key.
    #[error("unknown provider: {0}")]
    ProviderNotFound(String),

    /// The document was fetched but nothing usable was found in it.
    #[error("no content found: {0}")]
    Extraction(String),

    /// A resolution chain stopped before producing a final URL.
    #[error(transparent)]
    Resolution(#[from] ResolutionFailure),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// HTTP-style status for the boundary envelope.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation(_) | Error::Url(_) => 400,
            Error::Unauthorized(_) => 401,
            Error::ProviderNotFound(_) | Error::Extraction(_) => 404,
            _ => 500,
        }
    }

    /// Short machine-readable label used as the envelope `error` field.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) | Error::Url(_) => "validation",
            Error::Unauthorized(_) => "unauthorized",
            Error::Http { .. } => "http",
            Error::Transport { .. } => "transport",
            Error::Timeout { .. } => "timeout",
            Error::Cancelled => "cancelled",
            Error::Registry(_) => "registry",
            Error::ProviderNotFound(_) => "not_found",
            Error::Extraction(_) => "no_content",
            Error::Resolution(_) => "resolution",
            Error::Config(_) | Error::Toml(_) => "config",
            Error::Json(_) | Error::Io(_) => "internal",
        }
    }

    /// True for faults caused by the upstream site rather than the caller.
    #[must_use]
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Error::Http { .. } | Error::Transport { .. } | Error::Timeout { .. }
        )
    }
}
