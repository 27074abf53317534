//! Resilient invoker: retry inside a per-name circuit breaker, with a fallback.
//!
//! # Data Flow
//! ```text
//! invoke(name, op, fallback)
//!     → circuit_breaker.rs (Open: short-circuit to fallback)
//!     → op() with per-attempt timeout
//!     → transient failure: retry.rs (fixed wait, bounded attempts)
//!     → attempts exhausted: record failure, fallback
//!     → terminal error: returned as-is, not retried, not counted
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use crate::config::{CircuitBreakerConfig, RetryConfig};
use crate::error::AppError;

use super::circuit_breaker::{CircuitBreaker, CircuitState, Permit};
use super::retry::RetryPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationPath {
    Primary,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Invocation<T> {
    pub value: T,
    pub path: InvocationPath,
}

impl<T> Invocation<T> {
    pub fn is_degraded(&self) -> bool {
        self.path == InvocationPath::Fallback
    }
}

#[derive(Debug)]
pub struct ResilientInvoker {
    breaker_config: CircuitBreakerConfig,
    retry: RetryPolicy,
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
}

impl ResilientInvoker {
    pub fn new(breaker_config: CircuitBreakerConfig, retry: RetryConfig) -> Self {
        Self {
            breaker_config,
            retry: RetryPolicy::new(retry),
            breakers: Mutex::new(HashMap::new()),
        }
    }

    pub fn breaker(&self, name: &str) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock().unwrap_or_else(PoisonError::into_inner);
        breakers
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(name, self.breaker_config)))
            .clone()
    }

    pub fn state(&self, name: &str) -> CircuitState {
        self.breaker(name).state()
    }

    pub async fn invoke<T, Op, Fut, Fb>(
        &self,
        name: &str,
        mut operation: Op,
        fallback: Fb,
    ) -> Result<Invocation<T>, AppError>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
        Fb: FnOnce(&AppError) -> T,
    {
        let breaker = self.breaker(name);
        let Some(permit) = breaker.try_acquire() else {
            let err = AppError::transient(name, "circuit breaker is open");
            return Ok(degrade(name, &err, fallback));
        };

        let call = CallGuard::new(&breaker, permit);
        let mut last_err = None;

        for attempt in 1..=self.retry.max_attempts() {
            let delay = self.retry.delay_before(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match tokio::time::timeout(self.retry.attempt_timeout(), operation()).await {
                Ok(Ok(value)) => {
                    call.succeeded();
                    return Ok(Invocation {
                        value,
                        path: InvocationPath::Primary,
                    });
                }
                Ok(Err(err)) if err.is_transient() => {
                    tracing::debug!(operation = name, attempt, error = %err, "attempt failed");
                    last_err = Some(err);
                }
                Ok(Err(err)) => return Err(err),
                Err(_) => {
                    tracing::debug!(operation = name, attempt, "attempt timed out");
                    last_err = Some(AppError::transient(
                        name,
                        format!("attempt timed out after {:?}", self.retry.attempt_timeout()),
                    ));
                }
            }
        }

        call.failed();
        let err = last_err.unwrap_or_else(|| AppError::transient(name, "no attempt was made"));
        Ok(degrade(name, &err, fallback))
    }
}

fn degrade<T>(name: &str, err: &AppError, fallback: impl FnOnce(&AppError) -> T) -> Invocation<T> {
    tracing::warn!(operation = name, error = %err, "serving degraded fallback response");
    Invocation {
        value: fallback(err),
        path: InvocationPath::Fallback,
    }
}

// Settles a granted breaker call. Dropped unsettled (terminal error, or the
// request future was cancelled mid-retry) → the permit is released.
struct CallGuard<'a> {
    breaker: &'a CircuitBreaker,
    permit: Permit,
    settled: bool,
}

impl<'a> CallGuard<'a> {
    fn new(breaker: &'a CircuitBreaker, permit: Permit) -> Self {
        Self {
            breaker,
            permit,
            settled: false,
        }
    }

    fn succeeded(mut self) {
        self.settled = true;
        self.breaker.on_success(self.permit);
    }

    fn failed(mut self) {
        self.settled = true;
        self.breaker.on_failure(self.permit);
    }
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.release(self.permit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn invoker(max_attempts: u32, wait_in_open: Duration, permitted: usize) -> ResilientInvoker {
        ResilientInvoker::new(
            CircuitBreakerConfig {
                sliding_window_size: 4,
                minimum_number_of_calls: 4,
                failure_rate_threshold: 50,
                wait_duration_in_open_state: wait_in_open,
                permitted_calls_in_half_open_state: permitted,
            },
            RetryConfig {
                max_attempts,
                wait_duration: Duration::ZERO,
                attempt_timeout: Duration::from_millis(200),
            },
        )
    }

    fn fallback(_: &AppError) -> &'static str {
        "fallback"
    }

    async fn always_fail(invoker: &ResilientInvoker, calls: &AtomicU32) -> Invocation<&'static str> {
        invoker
            .invoke(
                "hello",
                move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<&'static str, _>(AppError::transient("hello", "down"))
                },
                fallback,
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn success_takes_primary_path() {
        let invoker = invoker(3, Duration::from_secs(10), 1);
        let result = invoker
            .invoke("hello", || async { Ok("primary") }, fallback)
            .await
            .unwrap();

        assert_eq!(result.value, "primary");
        assert!(!result.is_degraded());
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let invoker = invoker(3, Duration::from_secs(10), 1);
        let calls = &AtomicU32::new(0);

        let result = invoker
            .invoke(
                "hello",
                move || async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(AppError::transient("hello", "flaky"))
                    } else {
                        Ok("primary")
                    }
                },
                fallback,
            )
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.path, InvocationPath::Primary);
    }

    #[tokio::test]
    async fn exhausted_retries_fall_back() {
        let invoker = invoker(3, Duration::from_secs(10), 1);
        let calls = AtomicU32::new(0);

        let result = always_fail(&invoker, &calls).await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.value, "fallback");
        assert!(result.is_degraded());
    }

    #[tokio::test]
    async fn terminal_errors_are_not_retried() {
        let invoker = invoker(3, Duration::from_secs(10), 1);
        let calls = &AtomicU32::new(0);

        let err = invoker
            .invoke(
                "hello",
                move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<&'static str, _>(AppError::business_rule("no"))
                },
                fallback,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::BusinessRule(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(invoker.state("hello"), CircuitState::Closed);
    }

    #[tokio::test]
    async fn open_breaker_short_circuits() {
        let invoker = invoker(1, Duration::from_secs(60), 1);
        let calls = &AtomicU32::new(0);

        for _ in 0..4 {
            always_fail(&invoker, calls).await;
        }
        assert_eq!(invoker.state("hello"), CircuitState::Open);
        assert_eq!(calls.load(Ordering::SeqCst), 4);

        let result = invoker
            .invoke(
                "hello",
                move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("primary")
                },
                fallback,
            )
            .await
            .unwrap();

        assert!(result.is_degraded());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn recovers_through_half_open() {
        let invoker = invoker(1, Duration::from_millis(30), 1);
        let calls = AtomicU32::new(0);
        for _ in 0..4 {
            always_fail(&invoker, &calls).await;
        }
        assert_eq!(invoker.state("hello"), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(50)).await;

        let result = invoker
            .invoke("hello", || async { Ok("primary") }, fallback)
            .await
            .unwrap();
        assert_eq!(result.path, InvocationPath::Primary);
        assert_eq!(invoker.state("hello"), CircuitState::Closed);
    }

    #[tokio::test]
    async fn slow_attempts_time_out_into_fallback() {
        let invoker = invoker(2, Duration::from_secs(10), 1);

        let result = invoker
            .invoke(
                "hello",
                || async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok("primary")
                },
                fallback,
            )
            .await
            .unwrap();

        assert!(result.is_degraded());
    }

    #[tokio::test]
    async fn cancelled_trial_call_releases_its_permit() {
        let invoker = invoker(1, Duration::from_millis(10), 1);
        let calls = AtomicU32::new(0);
        for _ in 0..4 {
            always_fail(&invoker, &calls).await;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;

        // The trial call is dropped while its attempt is still pending.
        let cancelled = tokio::time::timeout(
            Duration::from_millis(20),
            invoker.invoke(
                "hello",
                || async {
                    tokio::time::sleep(Duration::from_millis(150)).await;
                    Ok("primary")
                },
                fallback,
            ),
        )
        .await;
        assert!(cancelled.is_err());
        assert_eq!(invoker.state("hello"), CircuitState::HalfOpen);

        let result = invoker
            .invoke("hello", || async { Ok("primary") }, fallback)
            .await
            .unwrap();
        assert_eq!(result.path, InvocationPath::Primary);
    }
}
