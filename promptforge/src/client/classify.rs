//! Mapping of service failures onto [`AnalysisError`] variants.

use regex::Regex;
use std::sync::OnceLock;

use crate::errors::AnalysisError;

fn transient_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"(?i)\b429\b|RESOURCE_EXHAUSTED|quota|rate[ _-]?limit|too many requests")
                .ok()
        })
        .as_ref()
}

fn credential_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r"(?i)PERMISSION_DENIED|UNAUTHENTICATED|API_KEY_INVALID|API key not valid|Requested entity was not found",
            )
            .ok()
        })
        .as_ref()
}

fn is_match(pattern: Option<&Regex>, message: &str) -> bool {
    pattern.is_some_and(|re| re.is_match(message))
}

/// Classifies a failed call from its HTTP status (if one was received) and
/// the error text.
///
/// Status codes win over message text; a transport failure with no status
/// can still be recognised as rate limiting from its message.
#[must_use]
pub fn classify_failure(status: Option<u16>, message: &str) -> AnalysisError {
    match status {
        Some(429) => return AnalysisError::rate_limited(message),
        Some(401 | 403 | 404) => return AnalysisError::credential_rejected(message),
        _ => {}
    }

    if is_match(transient_pattern(), message) {
        AnalysisError::rate_limited(message)
    } else if is_match(credential_pattern(), message) {
        AnalysisError::credential_rejected(message)
    } else if let Some(status) = status {
        AnalysisError::Service {
            status,
            message: message.to_string(),
        }
    } else {
        AnalysisError::transport(message)
    }
}
