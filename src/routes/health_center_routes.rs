// src/routes/health_center_routes.rs

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, put},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::hash_password,
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{
        ApiOk, AppState, OkData, ROLE_HEALTH_CENTER, validate_email, validate_password,
    },
    routes::auth_routes::ensure_admin,
    routes::notification_routes::{NOTIF_SYSTEM, push_notification},
};

// health_center.status
const CENTER_PENDING: i16 = 0;
const CENTER_APPROVED: i16 = 1;
const CENTER_REJECTED: i16 = 2;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health-centers", get(list_centers).post(register_center))
        .route("/health-centers/{account_id}", get(get_center).delete(delete_center))
        .route("/health-centers/{account_id}/approve", put(approve_center))
        .route("/health-centers/{account_id}/reject", put(reject_center))
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct HealthCenterPublic {
    pub account_id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub address: String,
    pub province: String,
    pub area: String,
    pub description: String,
    pub services: Vec<String>,
    pub image_path: Option<String>,
    pub is_featured: bool,
    pub rating: f32,
    pub total_ratings: i32,
    pub created_at: DateTime<Utc>,
}

const CENTER_COLUMNS: &str = r#"
    a.account_id, a.name, a.phone,
    h.address, h.province, h.area, h.description, h.services,
    h.image_path, h.is_featured, h.rating, h.total_ratings, h.created_at
"#;

pub async fn list_centers(
    State(state): State<AppState>,
) -> Result<Json<ApiOk<Vec<HealthCenterPublic>>>, ApiError> {
    let rows: Vec<HealthCenterPublic> = sqlx::query_as::<_, HealthCenterPublic>(&format!(
        r#"
        SELECT {CENTER_COLUMNS}
        FROM health_center h
        JOIN account a ON a.account_id = h.account_id
        WHERE h.status = $1
          AND a.is_active = true
          AND a.disabled = false
        ORDER BY h.is_featured DESC, h.rating DESC, h.created_at DESC
        LIMIT 200
        "#
    ))
    .bind(CENTER_APPROVED)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: rows }))
}

pub async fn get_center(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<ApiOk<HealthCenterPublic>>, ApiError> {
    let row: HealthCenterPublic = sqlx::query_as::<_, HealthCenterPublic>(&format!(
        r#"
        SELECT {CENTER_COLUMNS}
        FROM health_center h
        JOIN account a ON a.account_id = h.account_id
        WHERE h.account_id = $1
          AND h.status = $2
          AND a.is_active = true
          AND a.disabled = false
        "#
    ))
    .bind(account_id)
    .bind(CENTER_APPROVED)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(|| ApiError::not_found("health center"))?;

    Ok(Json(ApiOk { data: row }))
}

#[derive(Debug, Deserialize)]
pub struct RegisterCenterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub address: String,
    pub province: String,
    pub area: Option<String>,
    pub description: Option<String>,
    pub services: Option<Vec<String>>,
}

pub async fn register_center(
    State(state): State<AppState>,
    Json(req): Json<RegisterCenterRequest>,
) -> Result<(axum::http::StatusCode, Json<ApiOk<HealthCenterPublic>>), ApiError> {
    let name = req.name.trim();
    let address = req.address.trim();
    let province = req.province.trim();
    if name.is_empty() || address.is_empty() || province.is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "name, address and province are required".into(),
        ));
    }
    let email = validate_email(&req.email)?.to_string();
    validate_password(&req.password)?;

    let services: Vec<String> = req
        .services
        .unwrap_or_default()
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    let password_hash = hash_password(req.password.trim()).map_err(ApiError::Internal)?;

    let mut tx = state.db.begin().await.map_err(ApiError::db)?;

    let account_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO account (name, email, phone, password_hash, role)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING account_id
        "#,
    )
    .bind(name)
    .bind(&email)
    .bind(req.phone.as_deref())
    .bind(&password_hash)
    .bind(ROLE_HEALTH_CENTER)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        ApiError::db_or_conflict(e, "account_email_key", "EMAIL_TAKEN", "Email already registered")
    })?;

    sqlx::query(
        r#"
        INSERT INTO health_center (account_id, address, province, area, description, services, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(account_id)
    .bind(address)
    .bind(province)
    .bind(req.area.as_deref().unwrap_or("").trim())
    .bind(req.description.as_deref().unwrap_or("").trim())
    .bind(&services)
    .bind(CENTER_PENDING)
    .execute(&mut *tx)
    .await
    .map_err(ApiError::db)?;

    let row: HealthCenterPublic = sqlx::query_as::<_, HealthCenterPublic>(&format!(
        r#"
        SELECT {CENTER_COLUMNS}
        FROM health_center h
        JOIN account a ON a.account_id = h.account_id
        WHERE h.account_id = $1
        "#
    ))
    .bind(account_id)
    .fetch_one(&mut *tx)
    .await
    .map_err(ApiError::db)?;

    tx.commit().await.map_err(ApiError::db)?;

    tracing::info!(%account_id, "health center registered, pending review");

    Ok((axum::http::StatusCode::CREATED, Json(ApiOk { data: row })))
}

pub async fn approve_center(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(account_id): Path<Uuid>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    set_center_status(&state, &auth, account_id, CENTER_APPROVED).await
}

pub async fn reject_center(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(account_id): Path<Uuid>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    set_center_status(&state, &auth, account_id, CENTER_REJECTED).await
}

async fn set_center_status(
    state: &AppState,
    auth: &AuthContext,
    account_id: Uuid,
    status: i16,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    ensure_admin(auth)?;

    let mut tx = state.db.begin().await.map_err(ApiError::db)?;

    let res = sqlx::query(
        r#"
        UPDATE health_center
        SET status = $1
        WHERE account_id = $2
        "#,
    )
    .bind(status)
    .bind(account_id)
    .execute(&mut *tx)
    .await
    .map_err(ApiError::db)?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("health center"));
    }

    let (title, body) = if status == CENTER_APPROVED {
        ("Listing approved", "Your health center is now listed.")
    } else {
        ("Listing rejected", "Your health center listing was rejected.")
    };
    push_notification(&mut *tx, account_id, title, body, NOTIF_SYSTEM)
        .await
        .map_err(ApiError::db)?;

    tx.commit().await.map_err(ApiError::db)?;

    Ok(Json(ApiOk::ok()))
}

pub async fn delete_center(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(account_id): Path<Uuid>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    ensure_admin(&auth)?;

    let res = sqlx::query(
        r#"
        DELETE FROM account
        WHERE account_id = $1
          AND role = $2
        "#,
    )
    .bind(account_id)
    .bind(ROLE_HEALTH_CENTER)
    .execute(&state.db)
    .await
    .map_err(ApiError::db)?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("health center"));
    }

    Ok(Json(ApiOk::ok()))
}
