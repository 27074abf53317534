/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 *   - users / hello service, rate limiter, token verifier, 認可設定
 * - Clone 前提で持つ (内部は Arc/Clone cheap)
 */
use std::sync::Arc;

use crate::config::Config;
use crate::repos::UserStore;
use crate::services::auth::TokenVerifier;
use crate::services::hello::{GreetingSource, HelloService};
use crate::services::resilience::{RateLimiter, ResilientInvoker};
use crate::services::user_service::UserService;

#[derive(Clone, Debug)]
pub struct AppState {
    pub users: UserService,
    pub hello: HelloService,
    pub rate_limiter: Arc<RateLimiter>,
    pub invoker: Arc<ResilientInvoker>,
    // None → local mode: every request resolves to `local-user`.
    pub verifier: Option<Arc<dyn TokenVerifier>>,
    pub auth_required: bool,
    pub delete_user_role: Option<String>,
}

impl AppState {
    pub fn new(
        config: &Config,
        store: Arc<dyn UserStore>,
        verifier: Option<Arc<dyn TokenVerifier>>,
        greetings: Arc<dyn GreetingSource>,
    ) -> Self {
        let invoker = Arc::new(ResilientInvoker::new(config.circuit_breaker, config.retry));

        Self {
            users: UserService::new(store),
            hello: HelloService::new(config.app_version.clone(), greetings, invoker.clone()),
            rate_limiter: Arc::new(RateLimiter::new(config.rate_limit)),
            invoker,
            verifier,
            auth_required: config.auth.required,
            delete_user_role: config.auth.delete_user_role.clone(),
        }
    }
}
