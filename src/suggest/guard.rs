//! Failure isolation around backend calls
//!
//! Bounds each call by a timeout and stops calling a backend that keeps
//! failing. After `failure_threshold` consecutive failures the circuit opens
//! and calls fail fast with [`StorageError::CircuitOpen`]; once the open
//! period elapses a single trial call is let through.

use crate::config::ResilienceSettings;
use crate::error::StorageError;
use parking_lot::Mutex;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use tracing::{info, warn};

/// Externally visible circuit state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitStatus {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
enum Circuit {
    Closed { failures: u32 },
    Open { until: Instant },
    HalfOpen { since: Instant },
}

/// Timeout and circuit breaker for backend calls
pub struct BackendGuard {
    timeout: Duration,
    failure_threshold: u32,
    open_for: Duration,
    circuit: Mutex<Circuit>,
}

impl BackendGuard {
    pub fn new(timeout: Duration, failure_threshold: u32, open_for: Duration) -> Self {
        Self {
            timeout,
            failure_threshold: failure_threshold.max(1),
            open_for,
            circuit: Mutex::new(Circuit::Closed { failures: 0 }),
        }
    }

    pub fn from_settings(settings: &ResilienceSettings) -> Self {
        Self::new(settings.timeout(), settings.failure_threshold, settings.open_for())
    }

    pub fn status(&self) -> CircuitStatus {
        match *self.circuit.lock() {
            Circuit::Closed { .. } => CircuitStatus::Closed,
            Circuit::Open { .. } => CircuitStatus::Open,
            Circuit::HalfOpen { .. } => CircuitStatus::HalfOpen,
        }
    }

    /// Run `call` under the guard
    pub async fn call<F, T>(&self, call: F) -> Result<T, StorageError>
    where
        F: Future<Output = Result<T, StorageError>>,
    {
        self.acquire()?;

        let result = match timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StorageError::Timeout(self.timeout)),
        };

        match &result {
            Ok(_) => self.on_success(),
            Err(e) => self.on_failure(e),
        }
        result
    }

    fn acquire(&self) -> Result<(), StorageError> {
        let now = Instant::now();
        let mut circuit = self.circuit.lock();
        match *circuit {
            Circuit::Closed { .. } => Ok(()),
            Circuit::Open { until } if now >= until => {
                *circuit = Circuit::HalfOpen { since: now };
                Ok(())
            }
            Circuit::Open { .. } => Err(StorageError::CircuitOpen),
            // a trial that outlived its timeout was abandoned; allow another
            Circuit::HalfOpen { since } if now.saturating_duration_since(since) > self.timeout => {
                *circuit = Circuit::HalfOpen { since: now };
                Ok(())
            }
            Circuit::HalfOpen { .. } => Err(StorageError::CircuitOpen),
        }
    }

    fn on_success(&self) {
        let mut circuit = self.circuit.lock();
        if matches!(*circuit, Circuit::HalfOpen { .. }) {
            info!("Backend recovered, closing circuit");
        }
        *circuit = Circuit::Closed { failures: 0 };
    }

    fn on_failure(&self, err: &StorageError) {
        let now = Instant::now();
        let mut circuit = self.circuit.lock();
        let next = match *circuit {
            Circuit::Closed { failures } if failures + 1 < self.failure_threshold => {
                Circuit::Closed {
                    failures: failures + 1,
                }
            }
            Circuit::Closed { .. } | Circuit::HalfOpen { .. } => {
                warn!("Opening backend circuit for {:?} after: {}", self.open_for, err);
                Circuit::Open {
                    until: now + self.open_for,
                }
            }
            // a call admitted before the circuit opened
            Circuit::Open { until } => Circuit::Open { until },
        };
        *circuit = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> BackendGuard {
        BackendGuard::new(Duration::from_millis(100), 2, Duration::from_secs(5))
    }

    async fn fail(guard: &BackendGuard) -> Result<(), StorageError> {
        guard
            .call(async { Err::<(), _>(StorageError::Unavailable("down".into())) })
            .await
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_becomes_storage_error() {
        let guard = guard();
        let err = guard
            .call(std::future::pending::<Result<(), StorageError>>())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Timeout(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_after_threshold_and_recovers() {
        let guard = guard();
        assert!(fail(&guard).await.is_err());
        assert_eq!(guard.status(), CircuitStatus::Closed);
        assert!(fail(&guard).await.is_err());
        assert_eq!(guard.status(), CircuitStatus::Open);

        let err = guard.call(async { Ok::<_, StorageError>(1) }).await.unwrap_err();
        assert!(matches!(err, StorageError::CircuitOpen));

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(guard.call(async { Ok::<_, StorageError>(1) }).await.unwrap(), 1);
        assert_eq!(guard.status(), CircuitStatus::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_trial_reopens() {
        let guard = guard();
        fail(&guard).await.unwrap_err();
        fail(&guard).await.unwrap_err();

        tokio::time::advance(Duration::from_secs(5)).await;
        fail(&guard).await.unwrap_err();
        assert_eq!(guard.status(), CircuitStatus::Open);
    }

    #[tokio::test]
    async fn test_success_resets_failure_count() {
        let guard = guard();
        fail(&guard).await.unwrap_err();
        guard.call(async { Ok::<_, StorageError>(()) }).await.unwrap();
        fail(&guard).await.unwrap_err();
        assert_eq!(guard.status(), CircuitStatus::Closed);
    }
}
