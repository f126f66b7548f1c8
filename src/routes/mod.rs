use crate::models::AppState;
use axum::Router;

pub mod account_routes;
pub mod appointment_routes;
pub mod auth_routes;
pub mod doctor_routes;
pub mod health_center_routes;
pub mod home_routes;
pub mod message_routes;
pub mod notification_routes;
pub mod reminder_routes;
pub mod upload_routes;

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/auth", auth_routes::router())
        .nest("/api/users", account_routes::router())
        .nest("/api", doctor_routes::router())
        .nest("/api", appointment_routes::router())
        .nest("/api", health_center_routes::router())
        .nest("/api", notification_routes::router())
        .nest("/api", message_routes::router())
        .nest("/api", reminder_routes::router())
        .nest("/api", upload_routes::router())
        .merge(home_routes::router())
        .with_state(state)
}
