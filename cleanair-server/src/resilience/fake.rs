//! Scripted transport for tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::metrics::ProviderMetrics;

use super::breaker::{BreakerConfig, CircuitBreaker};
use super::client::ResilientClient;
use super::health::InMemoryHealthRegistry;
use super::retry::RetryPolicy;
use super::transport::{HttpRequest, HttpResponse, Transport, TransportError};

pub type Reply = Result<HttpResponse, TransportError>;

/// Replays queued replies in order, then repeats `fallback`.
///
/// Every request is recorded so tests can assert on call counts and on
/// what was sent.
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    delay: Option<Duration>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    /// Always answer `status` with `body`.
    pub fn always(status: u16, body: impl Into<String>) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: Ok(HttpResponse::new(status, body)),
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always fail at the transport level.
    pub fn failing(err: TransportError) -> Self {
        Self {
            fallback: Err(err),
            ..Self::always(0, "")
        }
    }

    /// Queue a reply ahead of the fallback.
    pub fn then(self, status: u16, body: impl Into<String>) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Ok(HttpResponse::new(status, body)));
        self
    }

    /// Queue a transport error ahead of the fallback.
    pub fn then_error(self, err: TransportError) -> Self {
        self.replies.lock().unwrap().push_back(Err(err));
        self
    }

    /// Sleep before answering, so concurrent callers overlap.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let queued = self.replies.lock().unwrap().pop_front();
        queued.unwrap_or_else(|| self.fallback.clone())
    }
}

/// Answers each request by calling a function, for providers that issue
/// several different requests concurrently.
pub struct FnTransport<F> {
    respond: F,
    requests: Mutex<Vec<HttpRequest>>,
}

impl<F> FnTransport<F>
where
    F: Fn(&HttpRequest) -> Reply + Send + Sync,
{
    pub fn new(respond: F) -> Self {
        Self {
            respond,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl<F> Transport for FnTransport<F>
where
    F: Fn(&HttpRequest) -> Reply + Send + Sync,
{
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let reply = (self.respond)(&request);
        self.requests.lock().unwrap().push(request);
        reply
    }
}

/// A client with fresh breaker, health and metrics, and no retries.
pub fn resilient<T: Transport>(dependency: &str, transport: T) -> ResilientClient<T> {
    ResilientClient::new(
        dependency,
        transport,
        Arc::new(CircuitBreaker::new(dependency, BreakerConfig::default())),
        Arc::new(InMemoryHealthRegistry::new()),
        ProviderMetrics::detached(),
    )
    .with_retry(RetryPolicy::none())
}
