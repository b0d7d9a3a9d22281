use std::sync::Arc;

use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::db::Repositories;
use crate::errors::AppError;
use crate::identity::{IdentityProvider, SqliteIdentity};
use crate::routes::{self, auth, health};

/// Everything a handler may touch, injected per request.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub repos: Repositories,
    pub identity: Arc<dyn IdentityProvider>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: AppConfig) -> Self {
        Self {
            repos: Repositories::new(pool.clone()),
            identity: Arc::new(SqliteIdentity::new(pool.clone())),
            config: Arc::new(config),
            pool,
        }
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let config = AppConfig::from_env()?;
    Ok(build_router(AppState::new(pool, config)))
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route("/logout", post(auth::logout));

    let router = Router::new()
        .nest("/auth", auth_routes)
        .route("/api/health", get(health::health));

    routes::register(router)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
