use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};

use crate::app::AppState;
use crate::authz::Principal;
use crate::errors::AppError;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Arc<Vec<u8>>,
    pub exp_hours: i64,
}

impl JwtConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let secret = std::env::var("JWT_SECRET").map_err(|_| AppError::configuration("JWT_SECRET not set"))?;
        let exp_hours = std::env::var("JWT_EXP_HOURS")
            .map(|val| val.parse::<i64>())
            .unwrap_or(Ok(24))
            .map_err(|_| AppError::configuration("JWT_EXP_HOURS must be a valid integer"))?;

        Ok(Self {
            secret: Arc::new(secret.into_bytes()),
            exp_hours,
        })
    }

    pub fn encode(&self, user_id: i64) -> Result<String, AppError> {
        use chrono::{Duration, Utc};

        let now = Utc::now();
        let exp = now + Duration::hours(self.exp_hours);

        let claims = Claims {
            sub: user_id,
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(&self.secret))
            .map_err(|err| AppError::token(err.to_string()))
    }

    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map(|data| data.claims)
            .map_err(|err| AppError::token(err.to_string()))
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub exp: usize,
    pub iat: usize,
}

/// The identity behind a request. Anonymous when no bearer token was sent
/// or the token's user no longer exists; the authorization engine turns
/// that into a 401 where a route requires it.
#[derive(Debug, Clone)]
pub struct Caller(pub Option<Principal>);

impl Caller {
    pub fn anonymous() -> Self {
        Self(None)
    }

    pub fn require(&self) -> Result<&Principal, AppError> {
        self.0
            .as_ref()
            .ok_or_else(|| AppError::unauthenticated("You are not currently logged in."))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = match parts.headers.get(axum::http::header::AUTHORIZATION) {
            Some(value) => value,
            None => return Ok(Caller::anonymous()),
        };

        let token = header
            .to_str()
            .ok()
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::token("malformed Authorization header"))?;

        let claims = state.config.jwt.decode(token)?;
        let principal = state.identity.principal(claims.sub).await?;

        Ok(Caller(principal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> JwtConfig {
        JwtConfig {
            secret: Arc::new(b"unit-test-secret".to_vec()),
            exp_hours: 1,
        }
    }

    #[test]
    fn token_carries_user_id() {
        let jwt = config();
        let token = jwt.encode(42).expect("encode");
        let claims = jwt.decode(&token).expect("decode");
        assert_eq!(claims.sub, 42);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = config().encode(7).expect("encode");
        let other = JwtConfig {
            secret: Arc::new(b"another-secret".to_vec()),
            exp_hours: 1,
        };
        assert!(matches!(other.decode(&token), Err(AppError::Token(_))));
    }
}
