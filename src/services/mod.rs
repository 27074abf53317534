/*
 * Responsibility
 * - ビジネスロジック層 (handler から呼ばれ、repos を使う)
 * - auth: claim → Principal 解決 / bearer 検証
 * - resilience: rate limit, circuit breaker, retry
 */
pub mod auth;
pub mod hello;
pub mod resilience;
pub mod user_service;
