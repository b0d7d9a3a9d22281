use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Map, Value};

pub type AppResult<T> = Result<T, AppError>;

const OPAQUE_FAILURE: &str = "Operation failed.";

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("invalid parameter {param}: {reason}")]
    Validation { param: String, reason: String },
    #[error("{message}")]
    BadRequest { code: &'static str, message: String },
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
    #[error("{message}")]
    Forbidden { code: &'static str, message: String },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("not implemented: {0}")]
    NotImplemented(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("token error: {0}")]
    Token(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(param: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            param: param.into(),
            reason: reason.into(),
        }
    }

    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code,
            message: message.into(),
        }
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated(message.into())
    }

    pub fn forbidden(code: &'static str, message: impl Into<String>) -> Self {
        Self::Forbidden {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::NotImplemented(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn token(err: impl Into<String>) -> Self {
        Self::Token(err.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } | AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated(_) | AppError::Token(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            AppError::Configuration(_) | AppError::Database(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Machine readable code carried in the error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "invalid_param",
            AppError::BadRequest { code, .. } => *code,
            AppError::Unauthenticated(_) => "not_logged_in",
            AppError::Forbidden { code, .. } => *code,
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::NotImplemented(_) => "not_implemented",
            AppError::Configuration(_) => "configuration",
            AppError::Token(_) => "token",
            AppError::Database(_) => "database",
            AppError::Internal(_) => "internal",
        }
    }

    fn public_message(&self) -> String {
        match self {
            AppError::Validation { param, .. } => format!("Invalid parameter(s): {param}"),
            AppError::Unauthenticated(message)
            | AppError::NotFound(message)
            | AppError::Conflict(message)
            | AppError::NotImplemented(message) => message.clone(),
            AppError::BadRequest { message, .. } | AppError::Forbidden { message, .. } => {
                message.clone()
            }
            AppError::Token(_) => "Invalid or expired token.".to_string(),
            // storage and internal details stay in the logs
            AppError::Configuration(_) | AppError::Database(_) | AppError::Internal(_) => {
                OPAQUE_FAILURE.to_string()
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorEnvelope {
    success: bool,
    message: String,
    data: Value,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(error = %self, code = self.code(), "request failed");
        }

        let mut data = Map::new();
        data.insert("code".to_string(), json!(self.code()));
        data.insert("status".to_string(), json!(status.as_u16()));
        if let AppError::Validation { param, reason } = &self {
            data.insert("params".to_string(), json!({ param.as_str(): reason }));
        }

        let payload = ErrorEnvelope {
            success: false,
            message: self.public_message(),
            data: Value::Object(data),
        };

        (status, Json(payload)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_errors_are_opaque() {
        let err = AppError::Database(sqlx::Error::RowNotFound);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), OPAQUE_FAILURE);
        assert!(err.to_string().contains("no rows returned"), "{err}");
    }

    #[test]
    fn validation_names_the_parameter() {
        let err = AppError::validation("end_time", "end_time must be after start_time");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "invalid_param");
        assert!(err.public_message().contains("end_time"));
    }
}
