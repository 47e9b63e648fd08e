//! HTTP error mapping
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::error;

use crate::{CommerceError, ErrorKind, OrderError};

#[derive(Debug)]
pub struct ApiError(pub CommerceError);

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: u16,
    pub error: &'static str,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl From<CommerceError> for ApiError {
    fn from(e: CommerceError) -> Self {
        ApiError(e)
    }
}

impl From<OrderError> for ApiError {
    fn from(e: OrderError) -> Self {
        ApiError(e.into())
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(e: validator::ValidationErrors) -> Self {
        ApiError::validation(e.to_string())
    }
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError(CommerceError::Validation(message.into()))
    }

    pub fn status(&self) -> StatusCode {
        status_for(self.0.kind())
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation | ErrorKind::Security => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorKind::Transient => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if self.0.kind() == ErrorKind::Internal {
            error!(error = %self.0, "request failed");
            "internal server error".to_string()
        } else {
            self.0.to_string()
        };
        let body = ErrorBody {
            status: status.as_u16(),
            error: status.canonical_reason().unwrap_or("Error"),
            message,
            timestamp: Utc::now(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CartError;

    #[test]
    fn test_kinds_map_to_status_codes() {
        assert_eq!(ApiError::from(CommerceError::from(CartError::EmptyCheckoutSelection)).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::from(OrderError::NotCancellable(crate::domain::aggregates::OrderStatus::Shipping)).status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::from(CommerceError::CartNotFound).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::from(CommerceError::InvalidSignature).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::from(CommerceError::Unauthenticated).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::from(CommerceError::Storage("x".into())).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
