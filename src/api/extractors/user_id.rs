/*
 * Responsibility
 * - Path の `{id}` を数値 user id として受ける
 * - 数値でない / percent-decode できない → TypeMismatch, 1 未満 → ConstraintViolation
 */
use axum::{
    extract::{FromRequestParts, Path, rejection::PathRejection},
    http::request::Parts,
};

use crate::error::{AppError, FieldErrors};

const PARAMETER: &str = "id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserIdPath(pub i64);

impl UserIdPath {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let id: i64 = raw.parse().map_err(|_| AppError::TypeMismatch {
            parameter: PARAMETER,
            expected: "Long",
            value: raw.to_string(),
        })?;

        if id < 1 {
            let violations =
                FieldErrors::from([(PARAMETER.to_string(), "must be greater than or equal to 1".to_string())]);
            return Err(AppError::ConstraintViolation { violations });
        }

        Ok(Self(id))
    }

    fn undecodable(raw: &str) -> AppError {
        AppError::TypeMismatch {
            parameter: PARAMETER,
            expected: "Long",
            value: raw.to_string(),
        }
    }
}

// Last path segment as it arrived on the wire, still percent-encoded.
fn raw_segment(parts: &Parts) -> &str {
    parts.uri.path().rsplit('/').next().unwrap_or_default()
}

impl<S> FromRequestParts<S> for UserIdPath
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<String>::from_request_parts(parts, state).await {
            Ok(Path(raw)) => Self::parse(&raw),
            Err(PathRejection::FailedToDeserializePathParams(_)) => {
                Err(Self::undecodable(raw_segment(parts)))
            }
            Err(e) => Err(AppError::Unexpected(anyhow::anyhow!(
                "path extraction failed: {}",
                e.body_text()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, classify};

    #[test]
    fn accepts_positive_ids() {
        assert_eq!(UserIdPath::parse("42").unwrap(), UserIdPath(42));
    }

    #[test]
    fn non_numeric_is_type_mismatch() {
        let c = classify(&UserIdPath::parse("abc").unwrap_err());
        assert_eq!(c.kind, ErrorKind::TypeMismatch);
        assert_eq!(c.message, "Parameter 'id' should be of type Long");
    }

    #[tokio::test]
    async fn undecodable_segment_is_type_mismatch() {
        use axum::{Router, body::Body, http::Request, routing::get};
        use tower::ServiceExt;

        use crate::error::ErrorReport;

        let app = Router::new().route(
            "/users/{id}",
            get(|UserIdPath(id): UserIdPath| async move { id.to_string() }),
        );
        let req = Request::builder().uri("/users/%FF").body(Body::empty()).unwrap();

        let response = app.oneshot(req).await.unwrap();
        let report = response.extensions().get::<ErrorReport>().unwrap();

        assert_eq!(response.status().as_u16(), 400);
        assert_eq!(report.envelope.error, "Type Mismatch");
        assert_eq!(report.envelope.message, "Parameter 'id' should be of type Long");
        assert!(report.detail.contains("%FF"));
    }

    #[test]
    fn zero_is_constraint_violation() {
        let c = classify(&UserIdPath::parse("0").unwrap_err());
        assert_eq!(c.kind, ErrorKind::ConstraintViolation);
        assert!(c.field_errors.unwrap().contains_key("id"));
    }
}
