//! Resilience substrate shared by every provider client.
//!
//! A [`ResilientClient`] wraps a [`Transport`] with a per-dependency
//! [`CircuitBreaker`] and a bounded [`RetryPolicy`], and reports what it
//! sees to a [`HealthRegistry`].

mod breaker;
mod client;
mod error;
#[cfg(test)]
pub(crate) mod fake;
mod health;
mod retry;
mod transport;

pub use breaker::{
    Admission, BreakerConfig, BreakerRegistry, CircuitBreaker, CircuitOpen, CircuitState, Permit,
};
pub use client::ResilientClient;
pub use error::ResilienceError;
pub use health::{DependencyHealth, HealthRegistry, HealthStatus, InMemoryHealthRegistry};
pub use retry::{Failure, RetryPolicy};
pub use transport::{
    HttpRequest, HttpResponse, Method, ReqwestTransport, Transport, TransportError,
};
