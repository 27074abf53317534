//! Rate limit admission in front of protected routes.
//!
//! Rejections short-circuit with `429` before the handler (and anything it
//! would call) runs.

use axum::{
    Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
};

use crate::error::AppError;
use crate::state::AppState;

/// Shared limiter name for every rate limited route.
pub const API_LIMITER: &str = "api";

pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    router.route_layer(middleware::from_fn_with_state(state, rate_limit_middleware))
}

async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    if !state.rate_limiter.admit(API_LIMITER) {
        return Err(AppError::RateLimited {
            limiter: API_LIMITER.to_string(),
        });
    }
    Ok(next.run(req).await)
}
