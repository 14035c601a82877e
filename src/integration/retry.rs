//! Retrying wrapper for protocol dispatchers.
//!
//! RPC backends declare their own retry count (`retries` in the dubbo
//! backend config). This wrapper honours it for any inner dispatcher:
//! a `DispatchFailed` is retried with backoff until the count is used up.
//! Timeouts are never retried here; the pipeline deadline owns them.

use async_trait::async_trait;

use crate::config::settings::RetryConfig;
use crate::error::GatewayError;
use crate::integration::{GatewayResponse, IntegrationDispatcher};
use crate::mapping::IntegrationCall;
use crate::observability::metrics;
use crate::resilience::backoff::Backoff;

pub struct RetryingDispatcher<D> {
    inner: D,
    backoff: Backoff,
}

impl<D> RetryingDispatcher<D> {
    pub fn new(inner: D, backoff: Backoff) -> Self {
        Self { inner, backoff }
    }

    pub fn from_config(inner: D, config: &RetryConfig) -> Self {
        Self::new(inner, Backoff::from_config(config))
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }
}

#[async_trait]
impl<D> IntegrationDispatcher for RetryingDispatcher<D>
where
    D: IntegrationDispatcher,
{
    async fn dispatch(&self, call: &IntegrationCall) -> Result<GatewayResponse, GatewayError> {
        let retries = call.retries();
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.inner.dispatch(call).await {
                Err(GatewayError::DispatchFailed(reason)) if attempt <= retries => {
                    let delay = self.backoff.delay(attempt);
                    tracing::info!(
                        protocol = %call.protocol,
                        attempt,
                        retries,
                        delay = ?delay,
                        error = %reason,
                        "Retrying backend call"
                    );
                    metrics::record_retry(call.protocol.as_str());
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }
}
