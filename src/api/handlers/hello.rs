/*
 * Responsibility
 * - GET /api/hello
 * - rate limit は middleware 側で済んでいる前提。ここでは Principal → HelloService
 * - fallback 経路の応答には `x-degraded: true` を付ける
 */
use axum::{
    Json,
    extract::State,
    http::{HeaderName, HeaderValue},
    response::{IntoResponse, Response},
};

use crate::{
    api::{dto::hello::HelloResponse, extractors::CurrentPrincipal},
    error::AppError,
    state::AppState,
};

pub const DEGRADED_HEADER: &str = "x-degraded";

pub async fn hello(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<Response, AppError> {
    tracing::info!(user = %principal.display_name, "Hello endpoint called");

    let invocation = state.hello.get_hello_message(&principal.display_name).await?;
    let degraded = invocation.is_degraded();
    let body = Json(HelloResponse::from(invocation.value));

    if degraded {
        let header = (
            HeaderName::from_static(DEGRADED_HEADER),
            HeaderValue::from_static("true"),
        );
        Ok(([header], body).into_response())
    } else {
        Ok(body.into_response())
    }
}
