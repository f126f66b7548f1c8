// src/routes/account_routes.rs

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use uuid::Uuid;

use serde::Deserialize;

use crate::{
    auth::hash_password,
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{AccountPublic, ApiOk, AppState, OkData, validate_email, validate_password},
    routes::auth_routes::{ensure_admin, insert_account},
};

pub fn router() -> Router<AppState> {
    Router::new()
        // /api/users
        .route("/", get(list_accounts).post(create_account))
        // /api/users/{account_id}
        .route("/{account_id}", get(get_account).delete(delete_account))
        .route("/{account_id}/disable", post(disable_account))
        .route("/{account_id}/enable", post(enable_account))
}

const ACCOUNT_COLUMNS: &str =
    "account_id, name, email, phone, role, is_active, disabled, avatar_path, created_at";

pub async fn list_accounts(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<AccountPublic>>>, ApiError> {
    ensure_admin(&auth)?;

    let accounts: Vec<AccountPublic> = sqlx::query_as::<_, AccountPublic>(&format!(
        r#"
        SELECT {ACCOUNT_COLUMNS}
        FROM account
        ORDER BY created_at DESC
        LIMIT 200
        "#
    ))
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: accounts }))
}

pub async fn get_account(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(account_id): Path<Uuid>,
) -> Result<Json<ApiOk<AccountPublic>>, ApiError> {
    if auth.account_id != account_id {
        ensure_admin(&auth)?;
    }

    let account: AccountPublic = sqlx::query_as::<_, AccountPublic>(&format!(
        r#"
        SELECT {ACCOUNT_COLUMNS}
        FROM account
        WHERE account_id = $1
        "#
    ))
    .bind(account_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(|| ApiError::not_found("account"))?;

    Ok(Json(ApiOk { data: account }))
}

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    /// 0 patient, 1 admin, 2 doctor, 3 health center.
    pub role: i16,
}

fn validate_role(role: i16) -> Result<(), ApiError> {
    if !(0..=3).contains(&role) {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "role must be one of 0..3".into(),
        ));
    }
    Ok(())
}

/// Admin provisioning path for elevated accounts (the public registration
/// endpoint only creates patients).
pub async fn create_account(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateAccountRequest>,
) -> Result<(axum::http::StatusCode, Json<ApiOk<AccountPublic>>), ApiError> {
    ensure_admin(&auth)?;

    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "name is required".into(),
        ));
    }
    let email = validate_email(&req.email)?.to_string();
    validate_password(&req.password)?;
    validate_role(req.role)?;

    let password_hash = hash_password(req.password.trim()).map_err(ApiError::Internal)?;

    let account = insert_account(
        &state,
        name,
        &email,
        req.phone.as_deref(),
        &password_hash,
        req.role,
    )
    .await?;

    Ok((axum::http::StatusCode::CREATED, Json(ApiOk { data: account })))
}

/// Hard delete. Profiles, appointments, notifications, messages, reminders
/// and sessions go with the row via FK cascade.
pub async fn delete_account(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(account_id): Path<Uuid>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    ensure_admin(&auth)?;

    if account_id == auth.account_id {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "cannot delete your own account".into(),
        ));
    }

    let res = sqlx::query(
        r#"
        DELETE FROM account
        WHERE account_id = $1
        "#,
    )
    .bind(account_id)
    .execute(&state.db)
    .await
    .map_err(ApiError::db)?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("account"));
    }

    tracing::info!(%account_id, "account deleted");

    Ok(Json(ApiOk::ok()))
}

pub async fn disable_account(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(account_id): Path<Uuid>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    set_disabled(&state, &auth, account_id, true).await
}

pub async fn enable_account(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(account_id): Path<Uuid>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    set_disabled(&state, &auth, account_id, false).await
}

async fn set_disabled(
    state: &AppState,
    auth: &AuthContext,
    account_id: Uuid,
    disabled: bool,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    ensure_admin(auth)?;

    let res = sqlx::query(
        r#"
        UPDATE account
        SET disabled = $1
        WHERE account_id = $2
        "#,
    )
    .bind(disabled)
    .bind(account_id)
    .execute(&state.db)
    .await
    .map_err(ApiError::db)?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("account"));
    }

    // Disabling also cuts live sessions; the auth extractor re-checks the
    // flag, this just keeps the table tidy.
    if disabled {
        let _ = sqlx::query(
            r#"
            UPDATE session_token
            SET revoked_at = now()
            WHERE account_id = $1
              AND revoked_at IS NULL
            "#,
        )
        .bind(account_id)
        .execute(&state.db)
        .await;
    }

    Ok(Json(ApiOk::ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_role_bounds() {
        assert!(validate_role(0).is_ok());
        assert!(validate_role(3).is_ok());

        assert!(validate_role(-1).is_err());
        assert!(validate_role(4).is_err());
    }
}
