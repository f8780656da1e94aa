//! Breaker- and retry-guarded HTTP execution.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::context::RequestContext;
use crate::metrics::ProviderMetrics;

use super::breaker::CircuitBreaker;
use super::error::ResilienceError;
use super::health::HealthRegistry;
use super::retry::{Failure, RetryPolicy};
use super::transport::{HttpRequest, HttpResponse, Transport};

/// Sends requests for one named dependency.
///
/// Each attempt must be admitted by the dependency's circuit breaker.
/// Transient failures (transport errors, 429, 5xx) are retried with
/// backoff and count against the breaker. Any other response, including
/// 4xx, is returned to the caller as-is for domain mapping.
pub struct ResilientClient<T> {
    dependency: String,
    transport: T,
    breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
    health: Arc<dyn HealthRegistry>,
    metrics: ProviderMetrics,
}

impl<T: Transport> ResilientClient<T> {
    pub fn new(
        dependency: impl Into<String>,
        transport: T,
        breaker: Arc<CircuitBreaker>,
        health: Arc<dyn HealthRegistry>,
        metrics: ProviderMetrics,
    ) -> Self {
        let dependency = dependency.into();
        health.register(&dependency);
        Self {
            dependency,
            transport,
            breaker,
            retry: RetryPolicy::default(),
            health,
            metrics,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn dependency(&self) -> &str {
        &self.dependency
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Send `request`, retrying transient failures.
    pub async fn execute(
        &self,
        ctx: &RequestContext,
        request: HttpRequest,
    ) -> Result<HttpResponse, ResilienceError> {
        let mut attempts = 0u32;

        loop {
            ctx.check()?;

            let Ok(permit) = self.breaker.try_acquire() else {
                debug!(dependency = %self.dependency, "circuit open, failing fast");
                return Err(ResilienceError::CircuitOpen {
                    dependency: self.dependency.clone(),
                });
            };
            attempts += 1;

            let started = Instant::now();
            let result = match ctx.run(self.transport.send(request.clone())).await {
                Ok(result) => result,
                Err(interrupted) => {
                    // Dropping the permit releases a probe slot without
                    // counting against the dependency.
                    drop(permit);
                    self.metrics
                        .observe_request(&self.dependency, "cancelled", started.elapsed());
                    return Err(interrupted.into());
                }
            };
            let elapsed = started.elapsed();

            let failure = match result {
                Ok(response) => match Failure::from_status(response.status) {
                    None => {
                        permit.success();
                        self.health
                            .record_success(&self.dependency, self.breaker.state());
                        self.metrics.observe_request(&self.dependency, "ok", elapsed);
                        return Ok(response);
                    }
                    Some(failure) => failure,
                },
                Err(err) => Failure::from(err),
            };

            permit.failure();
            let state = self.breaker.state();
            self.health
                .record_failure(&self.dependency, &failure.to_string(), state);
            self.metrics.observe_request(&self.dependency, "error", elapsed);

            if attempts > self.retry.max_retries {
                warn!(
                    dependency = %self.dependency,
                    attempts,
                    error = %failure,
                    "retries exhausted"
                );
                return Err(ResilienceError::RetriesExhausted {
                    dependency: self.dependency.clone(),
                    attempts,
                    last_failure: failure,
                });
            }

            let delay = self.retry.delay(attempts - 1);
            debug!(
                dependency = %self.dependency,
                attempt = attempts,
                error = %failure,
                delay_ms = delay.as_millis() as u64,
                "transient failure, retrying"
            );
            ctx.run(tokio::time::sleep(delay)).await?;
        }
    }
}
