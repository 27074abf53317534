/*
 * Responsibility
 * - hello のメッセージ生成 (GreetingSource を ResilientInvoker 経由で呼ぶ)
 * - retry 枯渇 / circuit open 時は "(Fallback response)" + "<version>-fallback" を返す
 * - GreetingSource は外部依存の差し替え口 (テストでは失敗する実装を注入する)
 */
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::services::resilience::{Invocation, ResilientInvoker};

/// Breaker / retry name protecting the greeting dependency.
pub const HELLO_OPERATION: &str = "externalService";

#[async_trait]
pub trait GreetingSource: Send + Sync + Debug + 'static {
    // Transient failures must be reported as `AppError::TransientDependency`.
    async fn greeting_for(&self, user: &str) -> Result<String, AppError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalGreetingSource;

#[async_trait]
impl GreetingSource for LocalGreetingSource {
    async fn greeting_for(&self, user: &str) -> Result<String, AppError> {
        Ok(format!("Hello, {user}! Welcome to AKS Starter Kit."))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeting {
    pub message: String,
    pub user: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl Greeting {
    fn fallback(user: &str, version: &str) -> Self {
        Self {
            message: format!("Hello, {user}! (Fallback response)"),
            user: user.to_string(),
            timestamp: Utc::now(),
            version: format!("{version}-fallback"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HelloService {
    version: String,
    source: Arc<dyn GreetingSource>,
    invoker: Arc<ResilientInvoker>,
}

impl HelloService {
    pub fn new(
        version: impl Into<String>,
        source: Arc<dyn GreetingSource>,
        invoker: Arc<ResilientInvoker>,
    ) -> Self {
        Self {
            version: version.into(),
            source,
            invoker,
        }
    }

    pub async fn get_hello_message(&self, user: &str) -> Result<Invocation<Greeting>, AppError> {
        tracing::debug!(user, "generating hello message");

        let source = self.source.as_ref();
        let version = self.version.as_str();

        self.invoker
            .invoke(
                HELLO_OPERATION,
                move || async move {
                    let message = source.greeting_for(user).await?;
                    Ok(Greeting {
                        message,
                        user: user.to_string(),
                        timestamp: Utc::now(),
                        version: version.to_string(),
                    })
                },
                |err| {
                    tracing::warn!(user, error = %err, "using fallback hello message");
                    Greeting::fallback(user, version)
                },
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CircuitBreakerConfig, RetryConfig};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[derive(Debug, Default)]
    struct Unavailable {
        calls: AtomicU32,
    }

    #[async_trait]
    impl GreetingSource for Unavailable {
        async fn greeting_for(&self, _user: &str) -> Result<String, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(AppError::transient(HELLO_OPERATION, "connection refused"))
        }
    }

    fn invoker() -> Arc<ResilientInvoker> {
        Arc::new(ResilientInvoker::new(
            CircuitBreakerConfig::default(),
            RetryConfig {
                max_attempts: 2,
                wait_duration: Duration::ZERO,
                attempt_timeout: Duration::from_secs(1),
            },
        ))
    }

    #[tokio::test]
    async fn greets_the_user() {
        let service = HelloService::new("1.0.0", Arc::new(LocalGreetingSource), invoker());

        let result = service.get_hello_message("testuser").await.unwrap();

        assert!(!result.is_degraded());
        assert_eq!(result.value.user, "testuser");
        assert!(result.value.message.contains("testuser"));
        assert_eq!(result.value.version, "1.0.0");
    }

    #[tokio::test]
    async fn messages_are_personalised() {
        let service = HelloService::new("1.0.0", Arc::new(LocalGreetingSource), invoker());

        let alice = service.get_hello_message("alice").await.unwrap().value;
        let bob = service.get_hello_message("bob").await.unwrap().value;

        assert_ne!(alice.user, bob.user);
        assert!(alice.message.contains("alice"));
        assert!(bob.message.contains("bob"));
    }

    #[tokio::test]
    async fn unavailable_source_yields_fallback() {
        let source = Arc::new(Unavailable::default());
        let service = HelloService::new("1.0.0", source.clone(), invoker());

        let result = service.get_hello_message("testuser").await.unwrap();

        assert!(result.is_degraded());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(result.value.user, "testuser");
        assert!(result.value.message.contains("Fallback"));
        assert_eq!(result.value.version, "1.0.0-fallback");
    }
}
