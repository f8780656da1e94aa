//! Circuit breaker guarding one external dependency.
//!
//! ```text
//! Closed   → Open:     rolling window of >= min_requests outcomes with
//!                      failure ratio >= failure_ratio
//! Open     → HalfOpen: open_timeout elapsed (checked on the next admission)
//! HalfOpen → Closed:   a probe succeeds
//! HalfOpen → Open:     a probe fails
//! ```

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{info, warn};

/// Breaker state as reported to operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        };
        f.write_str(s)
    }
}

/// Configuration for a circuit breaker.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Number of most recent outcomes kept in the rolling window.
    pub window_size: usize,

    /// Minimum outcomes in the window before the breaker may trip.
    pub min_requests: usize,

    /// Failure ratio at or above which the breaker trips.
    pub failure_ratio: f64,

    /// How long the breaker stays open before admitting probes.
    pub open_timeout: Duration,

    /// Maximum concurrent probes while half-open.
    pub half_open_max_probes: usize,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            window_size: 10,
            min_requests: 5,
            failure_ratio: 0.5,
            open_timeout: Duration::from_secs(30),
            half_open_max_probes: 1,
        }
    }
}

impl BreakerConfig {
    pub fn with_open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }

    pub fn with_half_open_max_probes(mut self, probes: usize) -> Self {
        self.half_open_max_probes = probes;
        self
    }

    pub fn with_window(mut self, window_size: usize, min_requests: usize) -> Self {
        self.window_size = window_size;
        self.min_requests = min_requests;
        self
    }
}

/// Returned when the breaker refuses a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("circuit open")]
pub struct CircuitOpen;

/// How a call was admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Normal,
    Probe,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    /// Most recent outcomes while closed; `true` marks a failure.
    outcomes: VecDeque<bool>,
    opened_at: Option<Instant>,
    probes_in_flight: usize,
}

/// Circuit breaker for a single named dependency.
///
/// State lives behind a short-lived mutex that is never held across I/O.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                outcomes: VecDeque::with_capacity(config.window_size),
                opened_at: None,
                probes_in_flight: 0,
            }),
            config,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state, applying the open → half-open timeout if due.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.lock();
        self.advance(&mut inner);
        inner.state
    }

    /// Ask to make a call. The returned permit must be settled with
    /// [`Permit::success`] or [`Permit::failure`]; dropping it unsettled
    /// (e.g. on cancellation) releases a probe slot without an outcome.
    pub fn try_acquire(&self) -> Result<Permit<'_>, CircuitOpen> {
        let mut inner = self.lock();
        self.advance(&mut inner);

        let admission = match inner.state {
            CircuitState::Closed => Admission::Normal,
            CircuitState::Open => return Err(CircuitOpen),
            CircuitState::HalfOpen => {
                if inner.probes_in_flight >= self.config.half_open_max_probes {
                    return Err(CircuitOpen);
                }
                inner.probes_in_flight += 1;
                Admission::Probe
            }
        };

        Ok(Permit {
            breaker: self,
            admission,
            settled: false,
        })
    }

    fn record(&self, admission: Admission, failed: bool) {
        let mut inner = self.lock();

        match admission {
            Admission::Probe => {
                inner.probes_in_flight = inner.probes_in_flight.saturating_sub(1);
                if inner.state != CircuitState::HalfOpen {
                    return;
                }
                if failed {
                    self.trip(&mut inner);
                } else {
                    self.close(&mut inner);
                    info!(breaker = %self.name, "probe succeeded, circuit closed");
                }
            }
            Admission::Normal => {
                // Outcomes of calls admitted before a trip are stale.
                if inner.state != CircuitState::Closed {
                    return;
                }
                if inner.outcomes.len() == self.config.window_size {
                    inner.outcomes.pop_front();
                }
                inner.outcomes.push_back(failed);

                let total = inner.outcomes.len();
                let failures = inner.outcomes.iter().filter(|f| **f).count();
                if total >= self.config.min_requests
                    && failures as f64 / total as f64 >= self.config.failure_ratio
                {
                    self.trip(&mut inner);
                }
            }
        }
    }

    fn release_probe(&self) {
        let mut inner = self.lock();
        inner.probes_in_flight = inner.probes_in_flight.saturating_sub(1);
    }

    fn advance(&self, inner: &mut BreakerInner) {
        if inner.state == CircuitState::Open
            && let Some(opened_at) = inner.opened_at
            && opened_at.elapsed() >= self.config.open_timeout
        {
            inner.state = CircuitState::HalfOpen;
            inner.probes_in_flight = 0;
            info!(breaker = %self.name, "open timeout elapsed, circuit half-open");
        }
    }

    fn trip(&self, inner: &mut BreakerInner) {
        inner.state = CircuitState::Open;
        inner.opened_at = Some(Instant::now());
        inner.outcomes.clear();
        inner.probes_in_flight = 0;
        warn!(
            breaker = %self.name,
            open_for_secs = self.config.open_timeout.as_secs(),
            "circuit opened"
        );
    }

    fn close(&self, inner: &mut BreakerInner) {
        inner.state = CircuitState::Closed;
        inner.opened_at = None;
        inner.outcomes.clear();
        inner.probes_in_flight = 0;
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Permission to make one call through a breaker.
#[derive(Debug)]
pub struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    admission: Admission,
    settled: bool,
}

impl Permit<'_> {
    pub fn admission(&self) -> Admission {
        self.admission
    }

    pub fn success(mut self) {
        self.settled = true;
        self.breaker.record(self.admission, false);
    }

    pub fn failure(mut self) {
        self.settled = true;
        self.breaker.record(self.admission, true);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.admission == Admission::Probe {
            self.breaker.release_probe();
        }
    }
}

/// One breaker per named dependency, shared across the process.
#[derive(Debug, Default)]
pub struct BreakerRegistry {
    config: BreakerConfig,
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerRegistry {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    /// The breaker for `dependency`, created on first use.
    pub fn breaker(&self, dependency: &str) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock().unwrap_or_else(PoisonError::into_inner);
        breakers
            .entry(dependency.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(dependency, self.config.clone())))
            .clone()
    }

    /// Current state of every known breaker, sorted by name.
    pub fn states(&self) -> Vec<(String, CircuitState)> {
        let breakers = self.breakers.lock().unwrap_or_else(PoisonError::into_inner);
        let mut states: Vec<_> = breakers
            .iter()
            .map(|(name, b)| (name.clone(), b.state()))
            .collect();
        states.sort_by(|a, b| a.0.cmp(&b.0));
        states
    }
}
