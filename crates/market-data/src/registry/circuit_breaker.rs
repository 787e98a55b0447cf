//! Per-provider circuit breaker.
//!
//! A provider that keeps timing out or rate limiting us is taken out of
//! rotation for a while so requests fail over to the next provider without
//! paying its latency first.
//!
//! - **Closed**: requests pass; consecutive penalized failures are counted.
//! - **Open**: requests are skipped until the recovery timeout elapses.
//! - **HalfOpen**: trial requests pass; enough successes close the circuit,
//!   any failure reopens it.
//!
//! State lives in memory only.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;
use tokio::time::Instant;

const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
const DEFAULT_RECOVERY_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_HALF_OPEN_SUCCESSES: u32 = 2;

/// Circuit breaker state.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Open => write!(f, "Open"),
            Self::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open a closed circuit.
    pub failure_threshold: u32,
    /// How long an open circuit stays open.
    pub recovery_timeout: Duration,
    /// Successes in HalfOpen needed to close again.
    pub half_open_success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            recovery_timeout: DEFAULT_RECOVERY_TIMEOUT,
            half_open_success_threshold: DEFAULT_HALF_OPEN_SUCCESSES,
        }
    }
}

#[derive(Debug)]
struct Circuit {
    state: CircuitState,
    consecutive_failures: u32,
    trial_successes: u32,
    opened_at: Option<Instant>,
}

impl Default for Circuit {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            trial_successes: 0,
            opened_at: None,
        }
    }
}

impl Circuit {
    fn open(&mut self) {
        self.state = CircuitState::Open;
        self.trial_successes = 0;
        self.opened_at = Some(Instant::now());
    }

    fn close(&mut self) {
        *self = Self::default();
    }
}

/// Point-in-time view of one provider's circuit, used in cache stats.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitSnapshot {
    pub provider: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
}

/// Circuit breaker keyed by provider id.
pub struct CircuitBreaker {
    circuits: Mutex<HashMap<String, Circuit>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self::with_config(CircuitBreakerConfig::default())
    }

    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        Self {
            circuits: Mutex::new(HashMap::new()),
            config,
        }
    }

    fn lock_circuits(&self) -> MutexGuard<'_, HashMap<String, Circuit>> {
        self.circuits.lock().unwrap_or_else(|poisoned| {
            warn!("Circuit breaker mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Whether a request to `provider` may go out now.
    ///
    /// Moves an open circuit to HalfOpen once its recovery timeout elapsed.
    pub fn is_allowed(&self, provider: &str) -> bool {
        let mut circuits = self.lock_circuits();
        let circuit = circuits.entry(provider.to_string()).or_default();

        match circuit.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let recovered = circuit
                    .opened_at
                    .is_some_and(|at| at.elapsed() >= self.config.recovery_timeout);
                if recovered {
                    info!("Circuit breaker: '{}' Open -> HalfOpen", provider);
                    circuit.state = CircuitState::HalfOpen;
                    circuit.trial_successes = 0;
                }
                recovered
            }
        }
    }

    pub fn record_success(&self, provider: &str) {
        let mut circuits = self.lock_circuits();
        let circuit = circuits.entry(provider.to_string()).or_default();

        match circuit.state {
            CircuitState::Closed => circuit.consecutive_failures = 0,
            CircuitState::HalfOpen => {
                circuit.trial_successes += 1;
                if circuit.trial_successes >= self.config.half_open_success_threshold {
                    info!(
                        "Circuit breaker: '{}' closed after {} trial successes",
                        provider, circuit.trial_successes
                    );
                    circuit.close();
                }
            }
            CircuitState::Open => {
                debug!("Circuit breaker: late success for '{}' while open", provider);
            }
        }
    }

    pub fn record_failure(&self, provider: &str) {
        let mut circuits = self.lock_circuits();
        let circuit = circuits.entry(provider.to_string()).or_default();
        circuit.consecutive_failures += 1;

        match circuit.state {
            CircuitState::Closed
                if circuit.consecutive_failures >= self.config.failure_threshold =>
            {
                warn!(
                    "Circuit breaker: opening '{}' after {} consecutive failures",
                    provider, circuit.consecutive_failures
                );
                circuit.open();
            }
            CircuitState::Closed => {
                debug!(
                    "Circuit breaker: failure for '{}' ({}/{})",
                    provider, circuit.consecutive_failures, self.config.failure_threshold
                );
            }
            CircuitState::HalfOpen => {
                warn!("Circuit breaker: trial request to '{}' failed, reopening", provider);
                circuit.open();
            }
            CircuitState::Open => {}
        }
    }

    pub fn state(&self, provider: &str) -> CircuitState {
        self.lock_circuits()
            .get(provider)
            .map(|c| c.state)
            .unwrap_or(CircuitState::Closed)
    }

    /// Snapshot of every provider seen so far, sorted by provider id.
    pub fn snapshot(&self) -> Vec<CircuitSnapshot> {
        let circuits = self.lock_circuits();
        let mut snapshot: Vec<_> = circuits
            .iter()
            .map(|(provider, circuit)| CircuitSnapshot {
                provider: provider.clone(),
                state: circuit.state,
                consecutive_failures: circuit.consecutive_failures,
            })
            .collect();
        snapshot.sort_by(|a, b| a.provider.cmp(&b.provider));
        snapshot
    }

    pub fn reset_all(&self) {
        self.lock_circuits().clear();
        info!("Circuit breaker: all circuits reset");
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}
