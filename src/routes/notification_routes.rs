// src/routes/notification_routes.rs

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, put},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState, OkData},
    routes::auth_routes::ensure_admin,
};

pub const NOTIF_SYSTEM: i16 = 0;
pub const NOTIF_APPOINTMENT: i16 = 1;
pub const NOTIF_REMINDER: i16 = 2;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list_notifications).post(create_notification))
        .route("/notifications/{notification_id}/read", put(mark_read))
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct NotificationRow {
    pub notification_id: Uuid,
    pub account_id: Uuid,
    pub title: String,
    pub body: String,
    pub kind: i16,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Insert a notification inside an existing transaction. Booking and
/// status changes call this so the record lands atomically with the
/// appointment write.
pub async fn push_notification(
    tx: &mut sqlx::PgConnection,
    account_id: Uuid,
    title: &str,
    body: &str,
    kind: i16,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO notification (account_id, title, body, kind)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(account_id)
    .bind(title)
    .bind(body)
    .bind(kind)
    .execute(tx)
    .await?;
    Ok(())
}

pub async fn list_notifications(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<NotificationRow>>>, ApiError> {
    let rows: Vec<NotificationRow> = sqlx::query_as::<_, NotificationRow>(
        r#"
        SELECT notification_id, account_id, title, body, kind, is_read, created_at
        FROM notification
        WHERE account_id = $1
        ORDER BY is_read ASC, created_at DESC
        LIMIT 100
        "#,
    )
    .bind(auth.account_id)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: rows }))
}

#[derive(Debug, Deserialize)]
pub struct CreateNotificationRequest {
    pub account_id: Uuid,
    pub title: String,
    pub body: String,
    pub kind: Option<i16>,
}

pub async fn create_notification(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateNotificationRequest>,
) -> Result<(axum::http::StatusCode, Json<ApiOk<NotificationRow>>), ApiError> {
    ensure_admin(&auth)?;

    let title = req.title.trim();
    let body = req.body.trim();
    if title.is_empty() || body.is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "title and body are required".into(),
        ));
    }

    let kind = req.kind.unwrap_or(NOTIF_SYSTEM);
    if !(0..=2).contains(&kind) {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "kind must be one of 0..2".into(),
        ));
    }

    let row: NotificationRow = sqlx::query_as::<_, NotificationRow>(
        r#"
        INSERT INTO notification (account_id, title, body, kind)
        VALUES ($1, $2, $3, $4)
        RETURNING notification_id, account_id, title, body, kind, is_read, created_at
        "#,
    )
    .bind(req.account_id)
    .bind(title)
    .bind(body)
    .bind(kind)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok((axum::http::StatusCode::CREATED, Json(ApiOk { data: row })))
}

pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    let res = sqlx::query(
        r#"
        UPDATE notification
        SET is_read = true
        WHERE notification_id = $1
          AND account_id = $2
        "#,
    )
    .bind(notification_id)
    .bind(auth.account_id)
    .execute(&state.db)
    .await
    .map_err(ApiError::db)?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("notification"));
    }

    Ok(Json(ApiOk::ok()))
}
