use axum::body::Bytes;
use axum::extract::State;
use serde::de::DeserializeOwned;

use super::ApiResponse;
use crate::app::AppState;
use crate::errors::{AppError, AppResult};
use crate::identity::{create_user, find_user, find_user_by_email};
use crate::jwt::Caller;
use crate::models::user::{AuthResponse, LoginRequest, RegisterRequest};
use crate::utils::verify_password;
use crate::validation::sanitize::sanitize_text_field;

pub async fn register(State(state): State<AppState>, body: Bytes) -> AppResult<ApiResponse> {
    let payload: RegisterRequest = parse_body(&body)?;

    let display_name = sanitize_text_field(&payload.display_name);
    if display_name.is_empty() {
        return Err(AppError::validation("display_name", "display_name must not be empty"));
    }
    let email = payload.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(AppError::validation("email", "email must be a valid address"));
    }

    let user = create_user(&state.pool, &display_name, &email, &payload.password).await?;
    let token = state.config.jwt.encode(user.user_id)?;

    ApiResponse::created("User registered.", AuthResponse { token, user })
}

pub async fn login(State(state): State<AppState>, body: Bytes) -> AppResult<ApiResponse> {
    let payload: LoginRequest = parse_body(&body)?;

    let db_user = find_user_by_email(&state.pool, &payload.email)
        .await?
        .ok_or_else(invalid_credentials)?;

    if !verify_password(&payload.password, &db_user.password_hash)? {
        tracing::debug!(user_id = db_user.user_id, "login rejected");
        return Err(invalid_credentials());
    }

    let token = state.config.jwt.encode(db_user.user_id)?;
    let user = find_user(&state.pool, db_user.user_id)
        .await?
        .ok_or_else(invalid_credentials)?;

    ApiResponse::ok("Login successful.", AuthResponse { token, user })
}

pub async fn me(State(state): State<AppState>, caller: Caller) -> AppResult<ApiResponse> {
    let principal = caller.require()?;
    let user = find_user(&state.pool, principal.user_id)
        .await?
        .ok_or_else(|| AppError::unauthenticated("You are not currently logged in."))?;

    ApiResponse::ok("Current user.", user)
}

/// Tokens are stateless; logging out is the client dropping its token.
pub async fn logout(caller: Caller) -> AppResult<ApiResponse> {
    caller.require()?;
    Ok(ApiResponse::message("Logged out."))
}

fn invalid_credentials() -> AppError {
    AppError::unauthenticated("Invalid credentials.")
}

/// Decodes a JSON body, naming the offending field on failure.
fn parse_body<T: DeserializeOwned>(body: &[u8]) -> AppResult<T> {
    let mut deserializer = serde_json::Deserializer::from_slice(body);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|err| {
        let path = err.path().to_string();
        let param = if path == "." { "body".to_string() } else { path };
        AppError::validation(param, err.into_inner().to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_field_is_named() {
        let err = parse_body::<LoginRequest>(br#"{"email": "ada@example.com"}"#).unwrap_err();
        assert_eq!(err.code(), "invalid_param");
        assert!(err.to_string().contains("password"));
    }

    #[test]
    fn wrong_type_points_at_the_field() {
        let err = parse_body::<LoginRequest>(br#"{"email": 7, "password": "x"}"#).unwrap_err();
        assert!(matches!(err, AppError::Validation { ref param, .. } if param == "email"));
    }
}
