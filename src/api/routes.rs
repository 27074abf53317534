/*
 * Responsibility
 * - /api の URL 構造を定義
 * - /public/health は認証・rate limit なし
 * - /hello は rate limit (外側) → access (内側) の順で通す
 * - /users は access のみ
 */
use axum::{Router, routing::get};

use crate::{
    api::handlers::{
        health::health,
        hello::hello,
        users::{create_user, delete_user, get_user, list_users},
    },
    middleware::{auth::access, rate_limit},
    state::AppState,
};

pub fn routes(state: AppState) -> Router<AppState> {
    let public = Router::new().route("/public/health", get(health));

    let greeting = Router::new().route("/hello", get(hello));
    let greeting = access::apply(greeting, state.clone());
    let greeting = rate_limit::apply(greeting, state.clone());

    let users = Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/{id}", get(get_user).delete(delete_user));
    let users = access::apply(users, state);

    public.merge(greeting).merge(users)
}
