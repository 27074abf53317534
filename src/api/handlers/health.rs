/*
 * Responsibility
 * - GET /api/public/health (疎通用, 認証・rate limit なし)
 */
pub async fn health() -> &'static str {
    "OK"
}
