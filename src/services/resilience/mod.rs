//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to a protected route:
//!     → rate_limiter.rs (named fixed window; rejected → 429 before any work)
//!     → invoker.rs (circuit breaker gate, retry with per-attempt timeout)
//!     → fallback on exhausted retries / open circuit
//! ```
//!
//! # Design Decisions
//! - State is per name and process-wide, created once at startup and held in `AppState`
//! - Only transient dependency failures are retried or counted by the breaker
//! - Retry latency is bounded; dropping the caller's future stops further attempts

pub mod circuit_breaker;
pub mod invoker;
pub mod rate_limiter;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitState, Permit};
pub use invoker::{Invocation, InvocationPath, ResilientInvoker};
pub use rate_limiter::RateLimiter;
pub use retry::RetryPolicy;
