mod auth;
mod config;
mod middleware;

mod db;
mod error;
mod models;
mod routes;
mod upload;

use std::time::Instant;

use crate::{config::Config, models::AppState};

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, header};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cfg = Config::from_env()?;
    let pool = db::connect_pg(&cfg.database_url).await?;

    tokio::fs::create_dir_all(&cfg.upload_dir).await?;

    let state = AppState {
        db: pool,
        session_ttl_hours: cfg.session_ttl_hours,
        upload_dir: cfg.upload_dir.clone().into(),
        max_upload_bytes: cfg.max_upload_bytes,
        started_at: Instant::now(),
    };

    let cors = build_cors(&cfg.cors_allowed_origins);

    let app = routes::router(state)
        .nest_service("/uploads", ServeDir::new(&cfg.upload_dir))
        // headroom over the file cap for multipart framing
        .layer(DefaultBodyLimit::max(cfg.max_upload_bytes + 1024 * 1024))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on http://{}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// With no configured origins (dev) the API answers any origin; in
/// production CORS_ALLOWED_ORIGINS pins the frontend hosts.
fn build_cors(allowed_origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers([
        header::CONTENT_TYPE,
        header::AUTHORIZATION,
        header::ACCEPT,
    ]);

    if allowed_origins.is_empty() {
        base.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| o.parse::<HeaderValue>().ok())
            .collect();
        base.allow_origin(AllowOrigin::list(origins))
    }
}
