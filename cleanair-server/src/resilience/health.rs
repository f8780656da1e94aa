//! Per-dependency health, as seen by the resilience client.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::breaker::CircuitState;

/// Coarse health derived from breaker state and recent failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Health record for one external dependency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DependencyHealth {
    pub name: String,
    pub state: CircuitState,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
}

impl DependencyHealth {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: CircuitState::Closed,
            last_success: None,
            last_failure: None,
            last_error: None,
            consecutive_failures: 0,
        }
    }

    pub fn status(&self) -> HealthStatus {
        match self.state {
            CircuitState::Open => HealthStatus::Unhealthy,
            CircuitState::HalfOpen => HealthStatus::Degraded,
            CircuitState::Closed if self.consecutive_failures > 0 => HealthStatus::Degraded,
            CircuitState::Closed => HealthStatus::Healthy,
        }
    }
}

/// Sink for dependency health, readable by the status endpoint.
///
/// Injected into every resilience client so tests can use isolated
/// registries.
pub trait HealthRegistry: Send + Sync {
    /// Make `dependency` visible before its first call.
    fn register(&self, dependency: &str);

    fn record_success(&self, dependency: &str, state: CircuitState);

    fn record_failure(&self, dependency: &str, error: &str, state: CircuitState);

    /// All dependencies, sorted by name.
    fn snapshot(&self) -> Vec<DependencyHealth>;

    fn get(&self, dependency: &str) -> Option<DependencyHealth> {
        self.snapshot().into_iter().find(|h| h.name == dependency)
    }
}

/// Process-local health registry.
#[derive(Debug, Default)]
pub struct InMemoryHealthRegistry {
    entries: RwLock<HashMap<String, DependencyHealth>>,
}

impl InMemoryHealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&self, dependency: &str, f: impl FnOnce(&mut DependencyHealth)) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let entry = entries
            .entry(dependency.to_string())
            .or_insert_with(|| DependencyHealth::new(dependency));
        f(entry);
    }
}

impl HealthRegistry for InMemoryHealthRegistry {
    fn register(&self, dependency: &str) {
        self.update(dependency, |_| {});
    }

    fn record_success(&self, dependency: &str, state: CircuitState) {
        self.update(dependency, |h| {
            h.state = state;
            h.last_success = Some(Utc::now());
            h.consecutive_failures = 0;
        });
    }

    fn record_failure(&self, dependency: &str, error: &str, state: CircuitState) {
        self.update(dependency, |h| {
            h.state = state;
            h.last_failure = Some(Utc::now());
            h.last_error = Some(error.to_string());
            h.consecutive_failures = h.consecutive_failures.saturating_add(1);
        });
    }

    fn snapshot(&self) -> Vec<DependencyHealth> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut all: Vec<_> = entries.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }
}
