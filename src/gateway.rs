//! Request dispatch at the boundary.
//!
//! Checks the caller's key with the external validator, runs the operation,
//! and wraps the outcome in an [`Envelope`] carrying `remainingRequests`.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::ProviderType;
use crate::normalize::{catalog_envelope, Envelope};
use crate::quota::{ApiKeyValidator, Credentials};
use crate::service::Aggregator;

/// One boundary call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Providers,
    Catalog {
        provider: String,
        page: Option<u32>,
        search: Option<String>,
    },
    Detail {
        provider: String,
        url: String,
        resolve: bool,
    },
    Details {
        provider: String,
        urls: Vec<String>,
    },
    Resolve {
        url: String,
        provider_type: Option<String>,
    },
}

pub struct Gateway {
    aggregator: Aggregator,
    validator: Arc<dyn ApiKeyValidator>,
}

impl Gateway {
    pub fn new(aggregator: Aggregator, validator: Arc<dyn ApiKeyValidator>) -> Self {
        Self {
            aggregator,
            validator,
        }
    }

    /// Validate the key, run `request`, and build the envelope.
    pub async fn dispatch(
        &self,
        credentials: &Credentials,
        request: Request,
        cancel: &CancellationToken,
    ) -> Envelope<Value> {
        let validation = self.validator.validate(credentials).await;
        if !validation.is_valid {
            let reason = validation
                .error
                .unwrap_or_else(|| "invalid API key".to_string());
            warn!(reason = %reason, "Rejected request");
            return Envelope::from_error(&Error::Unauthorized(reason));
        }

        let envelope = self.run(request, cancel).await;
        if let Some(message) = envelope.message.as_deref() {
            debug!(status = envelope.status, message, "Request finished");
        }
        envelope.with_remaining(validation.remaining_requests())
    }

    async fn run(&self, request: Request, cancel: &CancellationToken) -> Envelope<Value> {
        let agg = &self.aggregator;
        match request {
            Request::Providers => to_json(Envelope::from_result(agg.providers(cancel).await)),
            Request::Catalog {
                provider,
                page,
                search,
            } => {
                match agg
                    .list_catalog(&provider, page, search.as_deref(), cancel)
                    .await
                {
                    Ok(page) => to_json(catalog_envelope(page)),
                    Err(e) => Envelope::from_error(&e),
                }
            }
            Request::Detail {
                provider,
                url,
                resolve: false,
            } => to_json(Envelope::from_result(
                agg.get_detail(&provider, &url, cancel).await,
            )),
            Request::Detail {
                provider,
                url,
                resolve: true,
            } => to_json(Envelope::from_result(
                agg.get_detail_resolved(&provider, &url, cancel).await,
            )),
            Request::Details { provider, urls } => to_json(Envelope::from_result(
                agg.get_details(&provider, &urls, cancel).await,
            )),
            Request::Resolve { url, provider_type } => {
                let result = match parse_provider_type(provider_type.as_deref()) {
                    Ok(kind) => agg.resolve_link(&url, kind, cancel).await,
                    Err(e) => Err(e),
                };
                to_json(Envelope::from_result(result))
            }
        }
    }
}

fn parse_provider_type(raw: Option<&str>) -> Result<Option<ProviderType>> {
    raw.map(str::parse).transpose()
}

fn to_json<T: Serialize>(envelope: Envelope<T>) -> Envelope<Value> {
    match envelope.data.as_ref().map(serde_json::to_value).transpose() {
        Ok(data) => Envelope {
            success: envelope.success,
            data,
            error: envelope.error,
            message: envelope.message,
            remaining_requests: envelope.remaining_requests,
            status: envelope.status,
        },
        Err(e) => Envelope::from_error(&Error::Json(e)),
    }
}
