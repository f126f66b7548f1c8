use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::{generate_access_token, hash_access_token, hash_password, verify_password},
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{
        AccountPublic, AccountRow, ApiOk, AppState, OkData, ROLE_ADMIN, ROLE_PATIENT,
        role_from_login_type, validate_email, validate_password,
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/logout", post(logout))
        .route("/change_password", post(change_password))
}

/* =========================
   Registration
   ========================= */

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    /// "patient" (default), "doctor", "admin", "health_center".
    /// Anything above patient requires an admin caller; doctors and health
    /// centers register through their own endpoints, which add the profile.
    pub role: Option<String>,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(axum::http::StatusCode, Json<ApiOk<AccountPublic>>), ApiError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "name is required".into(),
        ));
    }
    let email = validate_email(&req.email)?.to_string();
    validate_password(&req.password)?;

    let role = match req.role.as_deref().map(str::trim) {
        None | Some("") | Some("patient") | Some("user") => ROLE_PATIENT,
        Some(other) => {
            // Self-service registration only creates patients. Elevated
            // accounts are provisioned by an admin (see account_routes) or
            // via the doctor / health-center registration flows.
            return Err(ApiError::Forbidden(
                "FORBIDDEN",
                format!("cannot self-register as {other}"),
            ));
        }
    };

    let password_hash = hash_password(req.password.trim()).map_err(ApiError::Internal)?;

    let account = insert_account(
        &state,
        name,
        &email,
        req.phone.as_deref(),
        &password_hash,
        role,
    )
    .await?;

    tracing::info!(account_id = %account.account_id, "account registered");

    Ok((axum::http::StatusCode::CREATED, Json(ApiOk { data: account })))
}

/// Shared insert used by patient, doctor and health-center registration.
/// The unique index on lower(email) turns duplicates into a 409.
pub async fn insert_account(
    state: &AppState,
    name: &str,
    email: &str,
    phone: Option<&str>,
    password_hash: &str,
    role: i16,
) -> Result<AccountPublic, ApiError> {
    sqlx::query_as::<_, AccountPublic>(
        r#"
        INSERT INTO account (name, email, phone, password_hash, role)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING account_id, name, email, phone, role, is_active, disabled, avatar_path, created_at
        "#,
    )
    .bind(name)
    .bind(email)
    .bind(phone)
    .bind(password_hash)
    .bind(role)
    .fetch_one(&state.db)
    .await
    .map_err(|e| {
        ApiError::db_or_conflict(e, "account_email_key", "EMAIL_TAKEN", "Email already registered")
    })
}

/* =========================
   Login
   ========================= */

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Optional discriminator from older clients; when present it must
    /// match the account's role.
    pub login_type: Option<String>,
    pub device_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginData {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub account: AccountPublic,
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiOk<LoginData>>, ApiError> {
    let email = req.email.trim();
    if email.is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "email and password are required".into(),
        ));
    }

    let account: AccountRow = sqlx::query_as::<_, AccountRow>(
        r#"
        SELECT account_id, name, email, phone, password_hash, role, is_active, disabled, avatar_path, created_at
        FROM account
        WHERE lower(email) = lower($1)
        "#,
    )
    .bind(email)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(ApiError::invalid_credentials)?;

    // Wrong password and unknown email are indistinguishable to the caller.
    if !verify_password(&req.password, &account.password_hash) {
        return Err(ApiError::invalid_credentials());
    }

    if let Some(lt) = req.login_type.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        match role_from_login_type(lt) {
            Some(required) if required == account.role => {}
            _ => return Err(ApiError::invalid_credentials()),
        }
    }

    if account.disabled || !account.is_active {
        return Err(ApiError::Forbidden("FORBIDDEN", "Account is disabled".into()));
    }

    let access_token = generate_access_token();
    let token_hash = hash_access_token(&access_token);
    let expires_at = Utc::now() + Duration::hours(state.session_ttl_hours);

    let expires_at: DateTime<Utc> = sqlx::query_scalar(
        r#"
        INSERT INTO session_token (account_id, session_token_hash, device_name, expires_at)
        VALUES ($1, $2, $3, $4)
        RETURNING expires_at
        "#,
    )
    .bind(account.account_id)
    .bind(&token_hash)
    .bind(req.device_name.as_deref())
    .bind(expires_at)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk {
        data: LoginData {
            access_token,
            expires_at,
            account: account.into_public(),
        },
    }))
}

/* =========================
   Session
   ========================= */

#[derive(Debug, Serialize)]
pub struct MeData {
    pub account: AccountPublic,
    pub session: SessionInfo,
}

#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub session_token_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

pub async fn me(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<MeData>>, ApiError> {
    let account: AccountPublic = sqlx::query_as::<_, AccountPublic>(
        r#"
        SELECT account_id, name, email, phone, role, is_active, disabled, avatar_path, created_at
        FROM account
        WHERE account_id = $1
        "#,
    )
    .bind(auth.account_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(ApiError::session_expired)?;

    let expires_at: DateTime<Utc> = sqlx::query_scalar(
        r#"
        SELECT expires_at
        FROM session_token
        WHERE session_token_id = $1
          AND revoked_at IS NULL
          AND expires_at > now()
        "#,
    )
    .bind(auth.session_token_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(ApiError::session_expired)?;

    Ok(Json(ApiOk {
        data: MeData {
            account,
            session: SessionInfo {
                session_token_id: auth.session_token_id,
                expires_at,
            },
        },
    }))
}

pub async fn logout(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    let rows = sqlx::query(
        r#"
        UPDATE session_token
        SET revoked_at = now()
        WHERE session_token_id = $1
          AND account_id = $2
          AND revoked_at IS NULL
        "#,
    )
    .bind(auth.session_token_id)
    .bind(auth.account_id)
    .execute(&state.db)
    .await
    .map_err(ApiError::db)?;

    if rows.rows_affected() == 0 {
        return Err(ApiError::session_expired());
    }

    Ok(Json(ApiOk::ok()))
}

/* =========================
   Password change
   ========================= */

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    if req.old_password.is_empty() || req.new_password.is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "old_password and new_password are required".into(),
        ));
    }
    validate_password(&req.new_password)?;

    let current_hash: String = sqlx::query_scalar(
        r#"
        SELECT password_hash
        FROM account
        WHERE account_id = $1
          AND is_active = true
        "#,
    )
    .bind(auth.account_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(ApiError::session_expired)?;

    if !verify_password(&req.old_password, &current_hash) {
        return Err(ApiError::invalid_credentials());
    }

    let new_hash = hash_password(req.new_password.trim()).map_err(ApiError::Internal)?;

    // Update hash and revoke the other sessions together.
    let mut tx = state.db.begin().await.map_err(ApiError::db)?;

    sqlx::query(
        r#"
        UPDATE account
        SET password_hash = $1
        WHERE account_id = $2
        "#,
    )
    .bind(new_hash)
    .bind(auth.account_id)
    .execute(&mut *tx)
    .await
    .map_err(ApiError::db)?;

    sqlx::query(
        r#"
        UPDATE session_token
        SET revoked_at = now()
        WHERE account_id = $1
          AND revoked_at IS NULL
          AND expires_at > now()
          AND session_token_id <> $2
        "#,
    )
    .bind(auth.account_id)
    .bind(auth.session_token_id)
    .execute(&mut *tx)
    .await
    .map_err(ApiError::db)?;

    tx.commit().await.map_err(ApiError::db)?;

    Ok(Json(ApiOk::ok()))
}

pub fn ensure_admin(auth: &AuthContext) -> Result<(), ApiError> {
    if auth.role == ROLE_ADMIN {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "FORBIDDEN",
            "Only admin can perform this action".into(),
        ))
    }
}
