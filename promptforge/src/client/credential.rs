//! API credential held by the caller and forwarded per request.

use std::fmt;

use crate::errors::PipelineError;

/// Primary environment variable holding the API key.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Fallback environment variable holding the API key.
pub const API_KEY_ENV_FALLBACK: &str = "API_KEY";

/// An API key. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wraps a key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the raw key for placing in a request header.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey(****)")
    }
}

/// Whether the caller currently holds a usable credential.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CredentialStatus {
    /// No key has been configured.
    #[default]
    Missing,
    /// A key is configured and has not been rejected.
    Ready(ApiKey),
    /// The service rejected the key on a previous call.
    Rejected(ApiKey),
}

impl CredentialStatus {
    /// Reads the key from `GEMINI_API_KEY`, falling back to `API_KEY`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolves the key through `lookup`, trying the primary then the
    /// fallback variable. Blank values count as missing.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        [API_KEY_ENV, API_KEY_ENV_FALLBACK]
            .iter()
            .filter_map(|name| lookup(name))
            .find(|value| !value.trim().is_empty())
            .map_or(Self::Missing, |value| Self::Ready(ApiKey::new(value.trim())))
    }

    /// Returns the key if it may be used for a dispatch.
    pub fn usable_key(&self) -> Result<&ApiKey, PipelineError> {
        match self {
            Self::Ready(key) => Ok(key),
            Self::Missing => Err(PipelineError::CredentialRequired {
                reason: "no API key is configured".to_string(),
            }),
            Self::Rejected(_) => Err(PipelineError::CredentialRequired {
                reason: "the configured API key was rejected; select another key".to_string(),
            }),
        }
    }

    /// Marks a ready key as rejected after a credential failure.
    #[must_use]
    pub fn into_rejected(self) -> Self {
        match self {
            Self::Ready(key) => Self::Rejected(key),
            other => other,
        }
    }

    /// Returns true if a dispatch would be accepted.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}
