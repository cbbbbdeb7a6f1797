//! Boundary response assembly.
//!
//! Pure functions: merge resolution results into their owning links, count
//! per-item successes and failures, and wrap everything in the uniform
//! [`Envelope`]. No I/O happens here.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::{CatalogItem, DetailRecord};
use crate::resolve::{ResolutionFailure, ResolutionResult};

/// `{ success, data?, error?, message?, remainingRequests? }`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Passed through from the quota collaborator, never computed here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_requests: Option<u64>,
    /// HTTP-style status class; carried alongside, not serialized.
    #[serde(skip)]
    pub status: u16,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
            remaining_requests: None,
            status: 200,
        }
    }

    pub fn from_error(err: &Error) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(err.kind().to_string()),
            message: Some(err.to_string()),
            remaining_requests: None,
            status: err.status_code(),
        }
    }

    pub fn from_result(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(err) => Self::from_error(&err),
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_remaining(mut self, remaining: Option<u64>) -> Self {
        self.remaining_requests = remaining;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogPage {
    pub items: Vec<CatalogItem>,
    pub total_results: usize,
}

/// Success/failure counts for a batch of sub-items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchReport {
    fn record(&mut self, ok: bool) {
        if ok {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }
}

/// A sub-item that failed inside an otherwise successful response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemFailure {
    pub url: String,
    pub error: String,
    pub message: String,
}

/// Detail record with resolved links merged in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedDetail {
    #[serde(flatten)]
    pub detail: DetailRecord,
    pub resolution: BatchReport,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<ItemFailure>,
}

/// Several detail pages fetched in one call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailBatch {
    pub details: Vec<DetailRecord>,
    pub report: BatchReport,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<ItemFailure>,
}

#[must_use]
pub fn normalize_catalog(items: Vec<CatalogItem>) -> CatalogPage {
    CatalogPage {
        total_results: items.len(),
        items,
    }
}

/// Envelope for a catalog page. An empty page is a success with a message.
#[must_use]
pub fn catalog_envelope(page: CatalogPage) -> Envelope<CatalogPage> {
    if page.items.is_empty() {
        Envelope::ok(page).with_message("no items found")
    } else {
        Envelope::ok(page)
    }
}

/// Merge chain results into the links they were started from.
///
/// `results` are keyed by the link URL the chain started at. Every link with
/// that URL (top-level or inside an episode) receives the final URL.
#[must_use]
pub fn normalize_detail(
    mut detail: DetailRecord,
    results: Vec<(String, std::result::Result<ResolutionResult, ResolutionFailure>)>,
) -> ResolvedDetail {
    let mut report = BatchReport::default();
    let mut failures = Vec::new();
    let mut resolved: HashMap<String, String> = HashMap::new();

    for (url, result) in results {
        report.record(result.is_ok());
        match result {
            Ok(ok) => {
                resolved.insert(url, ok.final_url);
            }
            Err(err) => failures.push(ItemFailure {
                url,
                error: "resolution".to_string(),
                message: err.to_string(),
            }),
        }
    }

    for link in detail.links_mut() {
        if let Some(final_url) = resolved.get(&link.url) {
            link.resolved_url = Some(final_url.clone());
        }
    }

    ResolvedDetail {
        detail,
        resolution: report,
        failures,
    }
}

/// Split per-page outcomes into records and isolated failures.
#[must_use]
pub fn normalize_batch(results: Vec<(String, Result<DetailRecord>)>) -> DetailBatch {
    let mut report = BatchReport::default();
    let mut details = Vec::new();
    let mut failures = Vec::new();

    for (url, result) in results {
        report.record(result.is_ok());
        match result {
            Ok(detail) => details.push(detail),
            Err(err) => failures.push(ItemFailure {
                url,
                error: err.kind().to_string(),
                message: err.to_string(),
            }),
        }
    }

    DetailBatch {
        details,
        report,
        failures,
    }
}
