use axum::{Json, Router, extract::State, routing::get};

use crate::models::AppState;

#[derive(serde::Serialize)]
pub struct BannerResponse {
    pub message: String,
    pub version: String,
    pub health: String,
}

#[derive(serde::Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_seconds: u64,
    pub database: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(banner))
        .route("/api/health", get(health))
}

pub async fn banner() -> Json<BannerResponse> {
    Json(BannerResponse {
        message: "Tabib IQ API is running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        health: "/api/health".to_string(),
    })
}

/// Liveness/readiness probe. `database` is the result of an actual round
/// trip, not the pool's opinion of itself.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.db)
        .await
    {
        Ok(_) => "connected",
        Err(e) => {
            tracing::warn!("health probe failed: {e}");
            "disconnected"
        }
    };

    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        database: database.to_string(),
    })
}
