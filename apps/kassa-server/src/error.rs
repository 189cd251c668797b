//! # API Error Type
//!
//! What the front-end receives when an operation other than a settlement
//! fails. Settlements never use this: their failures are a `status: "error"`
//! body with HTTP 200.
//!
//! ```json
//! { "code": "DEVICE_NOT_READY", "message": "Register not ready (mode 3): ..." }
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use kassa_fiscal::SettlementError;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    /// Machine-readable error code
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Malformed order fields (400)
    ValidationError,

    /// Register unrecoverable after one recovery attempt (503)
    DeviceNotReady,

    /// A register call failed mid-operation (502)
    DeviceError,

    /// Internal server error (500)
    Internal,
}

impl ErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::DeviceNotReady => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::DeviceError => StatusCode::BAD_GATEWAY,
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }
}

impl From<SettlementError> for ApiError {
    fn from(err: SettlementError) -> Self {
        let code = match &err {
            SettlementError::Validation(_) => ErrorCode::ValidationError,
            SettlementError::DeviceNotReady { .. } => ErrorCode::DeviceNotReady,
            SettlementError::DeviceOperation(_) => ErrorCode::DeviceError,
            SettlementError::Internal(_) => ErrorCode::Internal,
        };
        ApiError::new(code, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.code == ErrorCode::Internal {
            tracing::error!(message = %self.message, "Internal error");
        }
        (self.code.status(), Json(self)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;
    use kassa_core::ValidationError;
    use kassa_fiscal::DeviceError;

    #[test]
    fn test_settlement_error_mapping() {
        let err: ApiError = SettlementError::from(ValidationError::not_a_number("kolvo", "two")).into();
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(err.code.status(), StatusCode::BAD_REQUEST);

        let err: ApiError = SettlementError::DeviceNotReady {
            mode: 3,
            description: "Открытая смена, 24 часа кончились".into(),
        }
        .into();
        assert_eq!(err.code.status(), StatusCode::SERVICE_UNAVAILABLE);

        let err: ApiError = SettlementError::from(DeviceError::new("print_x_report", 107, "Нет бумаги")).into();
        assert_eq!(err.code, ErrorCode::DeviceError);
        assert!(err.message.contains("Нет бумаги"));
    }

    #[test]
    fn test_serialization() {
        let json = serde_json::to_value(ApiError::internal("boom")).unwrap();
        assert_eq!(json["code"], "INTERNAL");
        assert_eq!(json["message"], "boom");
    }
}
