//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap the per-request pipeline with its effective deadline
//! - Pick the effective timeout (method, nearest resource, gateway default)
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; the inner future is dropped on expiry
//! - Timeout errors are distinct from other errors (504, not 502)

use std::future::Future;
use std::time::Duration;

use crate::error::GatewayError;

/// Run `future` with a deadline; expiry becomes [`GatewayError::DispatchTimeout`].
pub async fn with_deadline<F, T>(deadline: Duration, future: F) -> Result<T, GatewayError>
where
    F: Future<Output = Result<T, GatewayError>>,
{
    match tokio::time::timeout(deadline, future).await {
        Ok(result) => result,
        Err(_) => Err(GatewayError::DispatchTimeout(deadline)),
    }
}

/// First configured timeout wins; zero means unset.
pub fn effective_timeout(configured: Option<Duration>, default: Duration) -> Duration {
    configured.filter(|t| !t.is_zero()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn test_deadline_expires() {
        let result: Result<(), _> = with_deadline(Duration::from_millis(20), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::DispatchTimeout);
    }

    #[tokio::test]
    async fn test_inner_error_passes_through() {
        let result: Result<(), _> = with_deadline(Duration::from_secs(1), async {
            Err(GatewayError::DispatchFailed("refused".into()))
        })
        .await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::DispatchFailed);
    }

    #[test]
    fn test_effective_timeout() {
        let default = Duration::from_secs(30);
        assert_eq!(effective_timeout(None, default), default);
        assert_eq!(effective_timeout(Some(Duration::ZERO), default), default);
        assert_eq!(
            effective_timeout(Some(Duration::from_millis(5)), default),
            Duration::from_millis(5)
        );
    }
}
