/*
 * Responsibility
 * - middleware の公開インターフェース
 * - route 単位: auth::access, rate_limit
 * - router 全体: http, cors, security_headers, error_envelope (最外)
 */
pub mod auth;
pub mod cors;
pub mod error_envelope;
pub mod http;
pub mod rate_limit;
pub mod security_headers;
