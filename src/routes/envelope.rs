use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use crate::errors::{AppError, AppResult};

/// Success half of the `{success, message, data}` envelope. Failures are
/// rendered by [`AppError`].
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    message: String,
    data: Option<Value>,
}

#[derive(Serialize)]
struct Envelope<'a> {
    success: bool,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a Value>,
}

impl ApiResponse {
    pub fn ok(message: impl Into<String>, data: impl Serialize) -> AppResult<Self> {
        Self::with_status(StatusCode::OK, message, data)
    }

    pub fn created(message: impl Into<String>, data: impl Serialize) -> AppResult<Self> {
        Self::with_status(StatusCode::CREATED, message, data)
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            message: message.into(),
            data: None,
        }
    }

    fn with_status(status: StatusCode, message: impl Into<String>, data: impl Serialize) -> AppResult<Self> {
        let data = serde_json::to_value(data)
            .map_err(|err| AppError::internal(format!("failed to serialize response: {err}")))?;
        Ok(Self {
            status,
            message: message.into(),
            data: Some(data),
        })
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        let body = Envelope {
            success: true,
            message: &self.message,
            data: self.data.as_ref(),
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn created_carries_payload_and_status() {
        let response = ApiResponse::created("Resource created.", json!({"resource_id": 7})).unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.data(), Some(&json!({"resource_id": 7})));
    }
}
