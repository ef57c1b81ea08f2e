use std::{borrow::Cow, time::Duration};

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::errors::ServiceError;

const GENERIC_FAILURE: &str = "Something went wrong";

/// Error returned by every route, rendered as `{"error": "<message>"}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(Cow<'static, str>),
    #[error("{0}")]
    Unauthorized(Cow<'static, str>),
    #[error("{0}")]
    NotFound(Cow<'static, str>),
    #[error("{message}")]
    RateLimited {
        message: &'static str,
        retry_after: Duration,
    },
    #[error("Request timed out")]
    Timeout,
    #[error("{0}")]
    Internal(Cow<'static, str>),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Timeout => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn internal() -> Self {
        ApiError::Internal(Cow::Borrowed(GENERIC_FAILURE))
    }

    pub fn invalid_body() -> Self {
        ApiError::BadRequest(Cow::Borrowed("Invalid request body"))
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::BadRequest(message) => ApiError::BadRequest(message),
            ServiceError::Validation(issues) => ApiError::BadRequest(Cow::Owned(issues.summary())),
            ServiceError::Unauthorized => ApiError::Unauthorized(Cow::Borrowed("Not authorized.")),
            ServiceError::NotFound(message) => ApiError::NotFound(message),
            ServiceError::Store(err) => {
                log::error!("store failure: {err}");
                ApiError::internal()
            }
            ServiceError::Upstream(message) => ApiError::Internal(message),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        log::debug!("rejected request body: {rejection}");
        ApiError::invalid_body()
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let retry_after = match &self {
            ApiError::RateLimited { retry_after, .. } => Some(retry_after.as_secs_f64().ceil().max(1.0) as u64),
            _ => None,
        };
        let mut response = (status, Json(ErrorBody { error: self.to_string() })).into_response();
        if let Some(seconds) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(seconds));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StoreError;

    #[test]
    fn store_errors_are_not_leaked() {
        let err = ApiError::from(ServiceError::Store(StoreError::Other {
            message: Cow::Borrowed("connection reset by peer"),
        }));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Something went wrong");
    }

    #[test]
    fn rate_limit_sets_retry_after() {
        let response = ApiError::RateLimited {
            message: "slow down",
            retry_after: Duration::from_millis(1500),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "2");
    }

    #[test]
    fn unauthorized_uses_fixed_message() {
        let err = ApiError::from(ServiceError::Unauthorized);
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_string(), "Not authorized.");
    }
}
