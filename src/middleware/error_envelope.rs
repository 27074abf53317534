//! Final stage for error responses.
//!
//! `AppError::into_response` cannot see the request, so it attaches an
//! `ErrorReport` to the response. This layer (outermost) stamps the request
//! path into the envelope and emits the single log line for the failure.
//! Errors produced by inner tower layers (timeouts, rate limit, auth) pass
//! through here as well. Error statuses that arrive without a report (axum's
//! 405, plain-text layer rejections) are classified from the status alone.

use axum::{
    Json, Router,
    body::Body,
    http::{Request, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
};

use crate::error::{AppError, ErrorEnvelope, ErrorReport, classify};

pub fn apply(router: Router) -> Router {
    router.layer(middleware::from_fn(error_envelope))
}

async fn error_envelope(req: Request<Body>, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let method = req.method().to_string();
    let mut response = next.run(req).await;

    let report = match response.extensions_mut().remove::<ErrorReport>() {
        Some(report) => report,
        None if response.status().is_client_error() || response.status().is_server_error() => {
            let err = AppError::from_bare_status(response.status(), &method, &path);
            ErrorReport {
                envelope: ErrorEnvelope::new(classify(&err), ""),
                detail: err.to_string(),
            }
        }
        None => return response,
    };
    report.log(&path);

    let (mut parts, _body) = response.into_parts();
    // The envelope body replaces whatever the inner layer wrote.
    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.remove(header::CONTENT_TYPE);
    parts.status = report.envelope.status_code();
    (parts, Json(report.envelope.with_path(path))).into_response()
}
