// src/routes/message_routes.rs

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/messages", post(send_message))
        .route("/messages/with/{account_id}", get(conversation))
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct MessageRow {
    pub message_id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub recipient_id: Uuid,
    pub body: String,
}

pub async fn send_message(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<SendMessageRequest>,
) -> Result<(axum::http::StatusCode, Json<ApiOk<MessageRow>>), ApiError> {
    let body = req.body.trim();
    if body.is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "body is required".into(),
        ));
    }
    if req.recipient_id == auth.account_id {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "cannot message yourself".into(),
        ));
    }

    let recipient_exists: Option<Uuid> = sqlx::query_scalar(
        r#"
        SELECT account_id
        FROM account
        WHERE account_id = $1
          AND is_active = true
        "#,
    )
    .bind(req.recipient_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?;

    if recipient_exists.is_none() {
        return Err(ApiError::not_found("recipient"));
    }

    let row: MessageRow = sqlx::query_as::<_, MessageRow>(
        r#"
        INSERT INTO message (sender_id, recipient_id, body)
        VALUES ($1, $2, $3)
        RETURNING message_id, sender_id, recipient_id, body, created_at, read_at
        "#,
    )
    .bind(auth.account_id)
    .bind(req.recipient_id)
    .bind(body)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok((axum::http::StatusCode::CREATED, Json(ApiOk { data: row })))
}

/// Both directions of the thread, oldest first. Fetching a conversation
/// marks the messages addressed to the caller as read.
pub async fn conversation(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(account_id): Path<Uuid>,
) -> Result<Json<ApiOk<Vec<MessageRow>>>, ApiError> {
    let rows: Vec<MessageRow> = sqlx::query_as::<_, MessageRow>(
        r#"
        SELECT message_id, sender_id, recipient_id, body, created_at, read_at
        FROM message
        WHERE (sender_id = $1 AND recipient_id = $2)
           OR (sender_id = $2 AND recipient_id = $1)
        ORDER BY created_at ASC
        LIMIT 500
        "#,
    )
    .bind(auth.account_id)
    .bind(account_id)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    // Best-effort read receipt for our side of the thread.
    let _ = sqlx::query(
        r#"
        UPDATE message
        SET read_at = now()
        WHERE recipient_id = $1
          AND sender_id = $2
          AND read_at IS NULL
        "#,
    )
    .bind(auth.account_id)
    .bind(account_id)
    .execute(&state.db)
    .await;

    Ok(Json(ApiOk { data: rows }))
}
