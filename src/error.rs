/*
 * Responsibility
 * - アプリ共通の AppError 定義 (client input / not found / business rule / auth / resilience / unexpected)
 * - classify(): AppError → (kind, message, fieldErrors) の純粋関数。HTTP status は kind から一意に決まる
 * - IntoResponse 実装 (ErrorEnvelope JSON)。path の付与とログ出力は middleware::error_envelope が担当
 */
use std::collections::BTreeMap;

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::repos::error::RepoError;

/// field (or parameter path) → message
pub type FieldErrors = BTreeMap<String, String>;

const INTERNAL_MESSAGE: &str = "An unexpected error occurred. Please try again later.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ValidationFailed,
    ConstraintViolation,
    InvalidRequest,
    TypeMismatch,
    ResourceNotFound,
    BusinessRuleViolation,
    AuthenticationFailed,
    AccessDenied,
    EndpointNotFound,
    TooManyRequests,
    ServiceUnavailable,
    RequestTimeout,
    MethodNotAllowed,
    PayloadTooLarge,
    InternalServerError,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ValidationFailed => "Validation Failed",
            Self::ConstraintViolation => "Constraint Violation",
            Self::InvalidRequest => "Invalid Request",
            Self::TypeMismatch => "Type Mismatch",
            Self::ResourceNotFound => "Resource Not Found",
            Self::BusinessRuleViolation => "Business Rule Violation",
            Self::AuthenticationFailed => "Authentication Failed",
            Self::AccessDenied => "Access Denied",
            Self::EndpointNotFound => "Endpoint Not Found",
            Self::TooManyRequests => "Too Many Requests",
            Self::ServiceUnavailable => "Service Unavailable",
            Self::RequestTimeout => "Request Timeout",
            Self::MethodNotAllowed => "Method Not Allowed",
            Self::PayloadTooLarge => "Payload Too Large",
            Self::InternalServerError => "Internal Server Error",
        }
    }

    pub fn status(self) -> StatusCode {
        match self {
            Self::ValidationFailed
            | Self::ConstraintViolation
            | Self::InvalidRequest
            | Self::TypeMismatch => StatusCode::BAD_REQUEST,
            Self::ResourceNotFound | Self::EndpointNotFound => StatusCode::NOT_FOUND,
            Self::BusinessRuleViolation => StatusCode::UNPROCESSABLE_ENTITY,
            Self::AuthenticationFailed => StatusCode::UNAUTHORIZED,
            Self::AccessDenied => StatusCode::FORBIDDEN,
            Self::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed on {} field(s)", .field_errors.len())]
    Validation { field_errors: FieldErrors },
    #[error("constraint violation: {violations:?}")]
    ConstraintViolation { violations: FieldErrors },
    #[error("malformed request body: {detail}")]
    InvalidRequest { detail: String },
    #[error("parameter '{parameter}' expected {expected}, got '{value}'")]
    TypeMismatch {
        parameter: &'static str,
        expected: &'static str,
        value: String,
    },
    #[error("{resource} not found with {field}: '{value}'")]
    NotFound {
        resource: &'static str,
        field: &'static str,
        value: String,
    },
    #[error("no route for {path}")]
    EndpointNotFound { path: String },
    #[error("{0}")]
    BusinessRule(String),
    #[error("authentication failed: {reason}")]
    Unauthenticated { reason: String },
    #[error("access denied: {reason}")]
    Forbidden { reason: String },
    #[error("rate limiter '{limiter}' rejected the call")]
    RateLimited { limiter: String },
    #[error("transient failure in {dependency}: {detail}")]
    TransientDependency { dependency: String, detail: String },
    #[error("request deadline exceeded")]
    RequestTimeout,
    #[error("method {method} not supported")]
    MethodNotAllowed { method: String },
    #[error("request body too large: {detail}")]
    PayloadTooLarge { detail: String },
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl AppError {
    pub fn not_found(resource: &'static str, field: &'static str, value: impl ToString) -> Self {
        Self::NotFound {
            resource,
            field,
            value: value.to_string(),
        }
    }

    pub fn business_rule(message: impl Into<String>) -> Self {
        Self::BusinessRule(message.into())
    }

    pub fn unauthenticated(reason: impl Into<String>) -> Self {
        Self::Unauthenticated {
            reason: reason.into(),
        }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }

    pub fn transient(dependency: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::TransientDependency {
            dependency: dependency.into(),
            detail: detail.into(),
        }
    }

    /// Error for a response some inner layer produced without an `AppError`
    /// (axum's 405, a tower layer's plain-text rejection).
    pub fn from_bare_status(status: StatusCode, method: &str, path: &str) -> Self {
        match status {
            StatusCode::METHOD_NOT_ALLOWED => Self::MethodNotAllowed {
                method: method.to_string(),
            },
            StatusCode::PAYLOAD_TOO_LARGE => Self::PayloadTooLarge {
                detail: "rejected before reaching a handler".into(),
            },
            StatusCode::NOT_FOUND => Self::EndpointNotFound {
                path: path.to_string(),
            },
            StatusCode::REQUEST_TIMEOUT => Self::RequestTimeout,
            other => Self::Unexpected(anyhow::anyhow!("unhandled {other} response")),
        }
    }

    /// Only transient dependency failures are retried and counted by the circuit breaker.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientDependency { .. })
    }
}

/// Result of classifying an [`AppError`]; the HTTP status is `kind.status()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: ErrorKind,
    pub message: String,
    pub field_errors: Option<FieldErrors>,
}

impl Classification {
    fn plain(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            field_errors: None,
        }
    }
}

pub fn classify(err: &AppError) -> Classification {
    match err {
        AppError::Validation { field_errors } => Classification {
            kind: ErrorKind::ValidationFailed,
            message: "Request validation failed. Please check the errors.".into(),
            field_errors: Some(field_errors.clone()),
        },
        AppError::ConstraintViolation { violations } => Classification {
            kind: ErrorKind::ConstraintViolation,
            message: "Request contains invalid parameters.".into(),
            field_errors: Some(violations.clone()),
        },
        AppError::InvalidRequest { .. } => Classification::plain(
            ErrorKind::InvalidRequest,
            "Request body is malformed or contains invalid data. Please check the API specification.",
        ),
        AppError::TypeMismatch {
            parameter,
            expected,
            ..
        } => Classification::plain(
            ErrorKind::TypeMismatch,
            format!("Parameter '{parameter}' should be of type {expected}"),
        ),
        AppError::NotFound { .. } => {
            Classification::plain(ErrorKind::ResourceNotFound, err.to_string())
        }
        AppError::EndpointNotFound { path } => Classification::plain(
            ErrorKind::EndpointNotFound,
            format!("The endpoint '{path}' does not exist."),
        ),
        AppError::BusinessRule(message) => {
            Classification::plain(ErrorKind::BusinessRuleViolation, message.clone())
        }
        AppError::Unauthenticated { .. } => Classification::plain(
            ErrorKind::AuthenticationFailed,
            "Invalid credentials provided.",
        ),
        AppError::Forbidden { .. } => Classification::plain(
            ErrorKind::AccessDenied,
            "You do not have permission to access this resource.",
        ),
        AppError::RateLimited { .. } => Classification::plain(
            ErrorKind::TooManyRequests,
            "Rate limit exceeded. Please try again later.",
        ),
        AppError::TransientDependency { .. } => Classification::plain(
            ErrorKind::ServiceUnavailable,
            "A dependency is temporarily unavailable. Please try again later.",
        ),
        AppError::RequestTimeout => Classification::plain(
            ErrorKind::RequestTimeout,
            "The request took too long to complete.",
        ),
        AppError::MethodNotAllowed { method } => Classification::plain(
            ErrorKind::MethodNotAllowed,
            format!("Request method '{method}' is not supported."),
        ),
        AppError::PayloadTooLarge { .. } => Classification::plain(
            ErrorKind::PayloadTooLarge,
            "Request body exceeds the maximum allowed size.",
        ),
        AppError::Unexpected(_) => {
            Classification::plain(ErrorKind::InternalServerError, INTERNAL_MESSAGE)
        }
    }
}

/// Uniform error body returned for every failure.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub error: &'static str,
    pub message: String,
    pub status: u16,
    pub timestamp: DateTime<Utc>,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_errors: Option<FieldErrors>,
}

impl ErrorEnvelope {
    pub fn new(classification: Classification, path: impl Into<String>) -> Self {
        Self {
            error: classification.kind.as_str(),
            message: classification.message,
            status: classification.kind.status().as_u16(),
            timestamp: Utc::now(),
            path: path.into(),
            field_errors: classification.field_errors,
        }
    }

    pub fn with_path(self, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..self
        }
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// Attached to error responses so the responder layer can stamp the request path
/// and log the internal detail, which never reaches the body.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub envelope: ErrorEnvelope,
    pub detail: String,
}

impl ErrorReport {
    pub fn log(&self, path: &str) {
        if self.envelope.status >= 500 {
            tracing::error!(
                path,
                kind = self.envelope.error,
                error = %self.detail,
                "unexpected error"
            );
        } else {
            tracing::warn!(
                path,
                kind = self.envelope.error,
                detail = %self.detail,
                "request rejected"
            );
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let envelope = ErrorEnvelope::new(classify(&self), "");
        let detail = match &self {
            AppError::Unexpected(e) => format!("{e:?}"),
            other => other.to_string(),
        };

        let mut response = (envelope.status_code(), Json(envelope.clone())).into_response();
        response
            .extensions_mut()
            .insert(ErrorReport { envelope, detail });
        response
    }
}

impl From<RepoError> for AppError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::Conflict => AppError::business_rule("resource already exists"),
            RepoError::Db(e) => AppError::Unexpected(e.into()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return AppError::PayloadTooLarge {
                detail: rejection.body_text(),
            };
        }
        AppError::InvalidRequest {
            detail: rejection.body_text(),
        }
    }
}
