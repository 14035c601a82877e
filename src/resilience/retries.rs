//! Retry policy.
//!
//! # Responsibilities
//! - Determine if a backend attempt is retryable
//! - Pace retries with jittered exponential backoff
//!
//! # Design Decisions
//! - Never retry non-idempotent verbs (POST, PATCH)
//! - Connection errors and 502/503/504 are retryable; other statuses are final
//! - The gateway core never retries; only dispatchers do

use std::time::Duration;

use axum::http::StatusCode;

use crate::config::schema::HttpVerb;
use crate::config::settings::RetryConfig;
use crate::resilience::backoff::Backoff;

/// Whether an HTTP attempt that ended with `status` (or a connection error)
/// may be repeated.
pub fn is_retryable(verb: &HttpVerb, status: Option<StatusCode>, connection_error: bool) -> bool {
    if !verb.is_idempotent() {
        return false;
    }
    if connection_error {
        return true;
    }
    matches!(
        status,
        Some(StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT)
    )
}

/// Attempt budget and pacing for one dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first try included. Always at least 1.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// A policy that tries exactly once.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: Backoff::new(0, 0),
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        if !config.enabled {
            return Self::none();
        }
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: Backoff::from_config(config),
        }
    }

    /// `attempt` attempts have been made; can another one follow?
    pub fn allows(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_idempotent_verbs_retry() {
        assert!(is_retryable(&HttpVerb::Get, None, true));
        assert!(is_retryable(&HttpVerb::Put, Some(StatusCode::SERVICE_UNAVAILABLE), false));
        assert!(!is_retryable(&HttpVerb::Post, None, true));
        assert!(!is_retryable(&HttpVerb::Get, Some(StatusCode::INTERNAL_SERVER_ERROR), false));
        assert!(!is_retryable(&HttpVerb::Get, Some(StatusCode::OK), false));
    }

    #[test]
    fn test_disabled_policy_tries_once() {
        let config = RetryConfig {
            enabled: false,
            ..Default::default()
        };
        let policy = RetryPolicy::from_config(&config);
        assert!(!policy.allows(1));

        let policy = RetryPolicy::from_config(&RetryConfig::default());
        assert!(policy.allows(2));
        assert!(!policy.allows(3));
    }
}
