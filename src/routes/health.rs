use axum::extract::State;
use serde::Serialize;
use sqlx::query_scalar;
use utoipa::ToSchema;

use super::ApiResponse;
use crate::app::AppState;
use crate::errors::AppResult;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub db_ok: bool,
}

pub async fn health(State(state): State<AppState>) -> AppResult<ApiResponse> {
    let db_ok = match query_scalar::<_, i64>("SELECT 1").fetch_one(&state.pool).await {
        Ok(_) => true,
        Err(err) => {
            tracing::warn!(error = %err, "health check database ping failed");
            false
        }
    };

    let status = if db_ok { "ok" } else { "degraded" };
    ApiResponse::ok("Health check.", HealthResponse { status, db_ok })
}
