/*
 * Responsibility
 * - Shared AppError for the HTTP surface
 * - IntoResponse (HTTP status / JSON error body, 302 for sign-in redirects)
 * - Converts authentication denials, store and token errors in one place
 */
use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::repos::error::StoreError;
use crate::services::token_auth::error::{AuthenticationFailure, ConfigurationError, Denial};
use crate::services::token_auth::generator::TokenError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{code}: {message}")]
    BadRequest { code: &'static str, message: String },
    #[error("not found: {resource}")]
    NotFound { resource: &'static str },
    #[error("unauthorized: {scope}")]
    Unauthorized { scope: String },
    #[error("sign in required: {location}")]
    SignInRequired { location: String },
    #[error("request timed out")]
    Timeout,
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("internal server error")]
    Internal,
}

impl AppError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(resource: &'static str) -> Self {
        Self::NotFound { resource }
    }

    pub fn unauthorized(scope: impl Into<String>) -> Self {
        Self::Unauthorized {
            scope: scope.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::BadRequest { code, message } => (StatusCode::BAD_REQUEST, code, message),
            AppError::NotFound { resource } => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("{resource} not found."),
            ),
            AppError::Unauthorized { scope } => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                format!("you need to sign in as {scope} before continuing"),
            ),
            AppError::SignInRequired { location } => {
                return (StatusCode::FOUND, [(header::LOCATION, location)]).into_response();
            }
            AppError::Timeout => (
                StatusCode::REQUEST_TIMEOUT,
                "REQUEST_TIMEOUT",
                "request timed out".into(),
            ),
            AppError::Configuration(err) => {
                tracing::error!(error = %err, "configuration error reached a request");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_SERVER_ERROR",
                    "internal server error".into(),
                )
            }
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_SERVER_ERROR",
                "internal server error".into(),
            ),
        };

        let body = ErrorResponse {
            error: ErrorBody { code, message },
        };

        (status, Json(body)).into_response()
    }
}

impl From<AuthenticationFailure> for AppError {
    fn from(failure: AuthenticationFailure) -> Self {
        match failure.denial {
            Denial::Unauthorized => AppError::Unauthorized {
                scope: failure.scope,
            },
            Denial::Redirect { location } => AppError::SignInRequired { location },
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::RecordNotFound(_) => AppError::not_found("record"),
            other => {
                tracing::error!(error = %other, "entity store failure");
                AppError::Internal
            }
        }
    }
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Store(store) => store.into(),
            other => {
                tracing::error!(error = %other, "token generation failed");
                AppError::Internal
            }
        }
    }
}
