//! JSON responses and failure-to-status mapping.
//!
//! # Design Decisions
//! - Every body is JSON, errors included
//! - Unknown keys and missing breakers are 404, malformed bodies 400
//! - Throttling failures reaching the boundary use a configurable status

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dependency::DependencyKey;
use crate::resilience::ResilienceError;

pub const CACHE_CONTROL_VALUE: &str = "must-revalidate,no-cache,no-store";

/// Body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: u16,
    pub message: String,
}

fn json_error(status: StatusCode, message: String) -> Response {
    let body = ErrorBody {
        code: status.as_u16(),
        message,
    };
    (status, Json(body)).into_response()
}

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("unknown dependency key '{0}'")]
    UnknownKey(String),

    #[error("no circuit breaker instantiated for {0}")]
    NoBreaker(DependencyKey),

    #[error("malformed request body: {0}")]
    BadRequest(String),

    #[error("missing or invalid credentials")]
    Unauthorized,

    #[error("no such route")]
    NotFound,
}

impl AdminError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::UnknownKey(_) | Self::NoBreaker(_) | Self::NotFound => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::debug!(status = status.as_u16(), error = %self, "Admin request rejected");
        json_error(status, self.to_string())
    }
}

/// Translates facade failures that escape to an HTTP boundary.
#[derive(Debug, Clone, Copy)]
pub struct ThrottlingMapper {
    throttle_status: StatusCode,
}

impl Default for ThrottlingMapper {
    fn default() -> Self {
        Self {
            throttle_status: StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

impl ThrottlingMapper {
    /// Codes that are not valid HTTP statuses fall back to 429.
    pub fn new(throttle_status: u16) -> Self {
        match StatusCode::from_u16(throttle_status) {
            Ok(status) => Self { throttle_status: status },
            Err(_) => {
                tracing::warn!(throttle_status, "Invalid throttle status, using 429");
                Self::default()
            }
        }
    }

    pub fn status_for(&self, error: &ResilienceError) -> StatusCode {
        if error.is_throttling() {
            self.throttle_status
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    /// Pair `error` with its status so a handler can return it directly.
    pub fn reject(&self, error: ResilienceError) -> DependencyFailure {
        DependencyFailure {
            status: self.status_for(&error),
            error,
        }
    }
}

/// A facade failure on its way out of an application handler.
#[derive(Debug)]
pub struct DependencyFailure {
    status: StatusCode,
    error: ResilienceError,
}

impl DependencyFailure {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn error(&self) -> &ResilienceError {
        &self.error
    }
}

impl IntoResponse for DependencyFailure {
    fn into_response(self) -> Response {
        let key = self.error.key();
        if self.status.is_server_error() {
            tracing::error!(key = %key, error = %self.error, "Unhandled dependency failure");
        } else {
            tracing::warn!(key = %key, cause = self.error.cause().label(), "Dependency throttled");
        }
        json_error(self.status, self.error.to_string())
    }
}
