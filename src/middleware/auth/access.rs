//! bearer token 検証 → Principal を extensions に入れる
//!
//! - verifier 未設定 (local/dev) : Authorization ヘッダは見ない。常に `local-user`
//! - verifier 設定済み:
//!   - ヘッダあり → `Bearer <jwt>` を検証。失敗は 401
//!   - ヘッダなし → `AUTH_REQUIRED` なら 401、そうでなければ `local-user`
//! - 認可 (role チェック) は handler 側

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header},
    middleware::{self, Next},
    response::Response,
};

use crate::error::AppError;
use crate::services::auth::{IdentityToken, TokenVerifier, resolve_principal};
use crate::state::AppState;

/// 認証を掛ける router に適用する。match した route にだけ効くよう route_layer を使う。
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    // axum 0.8 の from_fn は State extractor を受け取れないため、`from_fn_with_state` で明示的に state を渡す
    router.route_layer(middleware::from_fn_with_state(state, access_middleware))
}

async fn access_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = match state.verifier.as_deref() {
        Some(verifier) => authenticate(verifier, req.headers(), state.auth_required)?,
        None => None,
    };

    let principal = resolve_principal(token.as_ref());
    tracing::debug!(principal = %principal.display_name, "request authenticated");

    // middleware → extractor への受け渡し
    req.extensions_mut().insert(principal);

    Ok(next.run(req).await)
}

fn authenticate(
    verifier: &dyn TokenVerifier,
    headers: &HeaderMap,
    required: bool,
) -> Result<Option<IdentityToken>, AppError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return if required {
            Err(AppError::unauthenticated("missing bearer token"))
        } else {
            Ok(None)
        };
    };

    let token = value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::unauthenticated("malformed authorization header"))?;

    match verifier.verify(token) {
        Ok(identity) => Ok(Some(identity)),
        Err(err) => {
            tracing::warn!(error = %err, "access token verification failed");
            Err(AppError::unauthenticated(err.to_string()))
        }
    }
}
