use axum::extract::OriginalUri;

use crate::error::AppError;

/// Router fallback: any unmatched path. `OriginalUri` keeps the `/api` prefix
/// when the miss happens inside the nested router.
pub async fn endpoint_not_found(OriginalUri(uri): OriginalUri) -> AppError {
    AppError::EndpointNotFound {
        path: uri.path().to_string(),
    }
}
