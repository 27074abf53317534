/*
 * Responsibility
 * - handler 引数用の extractor をまとめる
 * - axum の rejection (plain text) を AppError (ErrorEnvelope) に揃える
 */
mod json;
mod principal;
mod user_id;

pub use json::ApiJson;
pub use principal::CurrentPrincipal;
pub use user_id::UserIdPath;
