//! API-key validation and quota collaborators.
//!
//! Key issuance and usage accounting live outside this crate. The core only
//! asks a validator whether a caller's key is acceptable and reads the
//! ledger values to report `remainingRequests`; it never mutates them.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::config::ApiKeyConfig;

/// What the caller presented.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: Option<String>,
}

impl Credentials {
    pub fn with_key(key: impl Into<String>) -> Self {
        Self {
            api_key: Some(key.into()),
        }
    }
}

/// Ledger view of one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKeyRecord {
    pub key: String,
    pub requests_used: u64,
    pub requests_limit: u64,
}

impl ApiKeyRecord {
    #[must_use]
    pub fn remaining_requests(&self) -> u64 {
        self.requests_limit.saturating_sub(self.requests_used)
    }
}

/// Outcome of `validate(request)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValidation {
    pub is_valid: bool,
    pub api_key: Option<ApiKeyRecord>,
    pub error: Option<String>,
}

impl KeyValidation {
    fn valid(record: Option<ApiKeyRecord>) -> Self {
        Self {
            is_valid: true,
            api_key: record,
            error: None,
        }
    }

    fn invalid(error: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            api_key: None,
            error: Some(error.into()),
        }
    }

    /// `remainingRequests` for the envelope.
    #[must_use]
    pub fn remaining_requests(&self) -> Option<u64> {
        self.api_key.as_ref().map(ApiKeyRecord::remaining_requests)
    }
}

#[async_trait]
pub trait ApiKeyValidator: Send + Sync {
    async fn validate(&self, credentials: &Credentials) -> KeyValidation;
}

/// Keys listed in the config file.
#[derive(Debug, Clone, Default)]
pub struct StaticKeys {
    keys: HashMap<String, ApiKeyRecord>,
}

impl StaticKeys {
    #[must_use]
    pub fn from_config(keys: &[ApiKeyConfig]) -> Self {
        Self {
            keys: keys
                .iter()
                .map(|k| {
                    (
                        k.key.clone(),
                        ApiKeyRecord {
                            key: k.key.clone(),
                            requests_used: k.requests_used,
                            requests_limit: k.requests_limit,
                        },
                    )
                })
                .collect(),
        }
    }
}

#[async_trait]
impl ApiKeyValidator for StaticKeys {
    async fn validate(&self, credentials: &Credentials) -> KeyValidation {
        let Some(key) = credentials.api_key.as_deref().map(str::trim) else {
            return KeyValidation::invalid("API key required");
        };
        match self.keys.get(key) {
            None => KeyValidation::invalid("invalid API key"),
            Some(record) if record.remaining_requests() == 0 => {
                KeyValidation::invalid("request quota exhausted")
            }
            Some(record) => KeyValidation::valid(Some(record.clone())),
        }
    }
}

/// Accepts every caller and reports no quota. Used when no keys are configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAccess;

#[async_trait]
impl ApiKeyValidator for OpenAccess {
    async fn validate(&self, _credentials: &Credentials) -> KeyValidation {
        KeyValidation::valid(None)
    }
}
