// src/routes/reminder_routes.rs

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, patch},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState, OkData, validate_time_hhmm},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/reminders", get(list_reminders).post(create_reminder))
        .route("/reminders/{reminder_id}", patch(toggle_reminder).delete(delete_reminder))
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ReminderRow {
    pub reminder_id: Uuid,
    pub account_id: Uuid,
    pub medicine_name: String,
    pub dosage: String,
    pub time_of_day: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateReminderRequest {
    pub medicine_name: String,
    pub dosage: Option<String>,
    /// HH:MM
    pub time_of_day: String,
}

pub async fn create_reminder(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateReminderRequest>,
) -> Result<(axum::http::StatusCode, Json<ApiOk<ReminderRow>>), ApiError> {
    let medicine_name = req.medicine_name.trim();
    if medicine_name.is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "medicine_name is required".into(),
        ));
    }
    let time_of_day = validate_time_hhmm(&req.time_of_day)?.to_string();

    let row: ReminderRow = sqlx::query_as::<_, ReminderRow>(
        r#"
        INSERT INTO medicine_reminder (account_id, medicine_name, dosage, time_of_day)
        VALUES ($1, $2, $3, $4)
        RETURNING reminder_id, account_id, medicine_name, dosage, time_of_day, is_active, created_at
        "#,
    )
    .bind(auth.account_id)
    .bind(medicine_name)
    .bind(req.dosage.as_deref().unwrap_or("").trim())
    .bind(&time_of_day)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok((axum::http::StatusCode::CREATED, Json(ApiOk { data: row })))
}

pub async fn list_reminders(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<ReminderRow>>>, ApiError> {
    let rows: Vec<ReminderRow> = sqlx::query_as::<_, ReminderRow>(
        r#"
        SELECT reminder_id, account_id, medicine_name, dosage, time_of_day, is_active, created_at
        FROM medicine_reminder
        WHERE account_id = $1
        ORDER BY time_of_day ASC, created_at ASC
        "#,
    )
    .bind(auth.account_id)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: rows }))
}

#[derive(Debug, Deserialize)]
pub struct ToggleReminderRequest {
    pub is_active: bool,
}

pub async fn toggle_reminder(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(reminder_id): Path<Uuid>,
    Json(req): Json<ToggleReminderRequest>,
) -> Result<Json<ApiOk<ReminderRow>>, ApiError> {
    let row: ReminderRow = sqlx::query_as::<_, ReminderRow>(
        r#"
        UPDATE medicine_reminder
        SET is_active = $1
        WHERE reminder_id = $2
          AND account_id = $3
        RETURNING reminder_id, account_id, medicine_name, dosage, time_of_day, is_active, created_at
        "#,
    )
    .bind(req.is_active)
    .bind(reminder_id)
    .bind(auth.account_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(|| ApiError::not_found("reminder"))?;

    Ok(Json(ApiOk { data: row }))
}

pub async fn delete_reminder(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(reminder_id): Path<Uuid>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    let res = sqlx::query(
        r#"
        DELETE FROM medicine_reminder
        WHERE reminder_id = $1
          AND account_id = $2
        "#,
    )
    .bind(reminder_id)
    .bind(auth.account_id)
    .execute(&state.db)
    .await
    .map_err(ApiError::db)?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("reminder"));
    }

    Ok(Json(ApiOk::ok()))
}
