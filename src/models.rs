use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub session_ttl_hours: i64,
    pub upload_dir: std::path::PathBuf,
    pub max_upload_bytes: usize,
    pub started_at: Instant,
}

/* -------------------------
   Roles
--------------------------*/

pub const ROLE_PATIENT: i16 = 0;
pub const ROLE_ADMIN: i16 = 1;
pub const ROLE_DOCTOR: i16 = 2;
pub const ROLE_HEALTH_CENTER: i16 = 3;

pub fn role_to_string(role: i16) -> String {
    match role {
        ROLE_PATIENT => "patient",
        ROLE_ADMIN => "admin",
        ROLE_DOCTOR => "doctor",
        ROLE_HEALTH_CENTER => "health_center",
        _ => "unknown",
    }
    .to_string()
}

/// The `login_type` discriminator some clients send with login requests.
pub fn role_from_login_type(login_type: &str) -> Option<i16> {
    match login_type {
        "patient" | "user" => Some(ROLE_PATIENT),
        "admin" => Some(ROLE_ADMIN),
        "doctor" => Some(ROLE_DOCTOR),
        "health_center" => Some(ROLE_HEALTH_CENTER),
        _ => None,
    }
}

/* -------------------------
   Appointment status
--------------------------*/

pub const APPT_PENDING: i16 = 0;
pub const APPT_CONFIRMED: i16 = 1;
pub const APPT_CANCELLED: i16 = 2;
pub const APPT_COMPLETED: i16 = 3;

pub fn appointment_status_to_string(status: i16) -> String {
    match status {
        APPT_PENDING => "pending",
        APPT_CONFIRMED => "confirmed",
        APPT_CANCELLED => "cancelled",
        APPT_COMPLETED => "completed",
        _ => "unknown",
    }
    .to_string()
}

pub fn appointment_status_from_string(status: &str) -> Result<i16, ApiError> {
    match status {
        "pending" => Ok(APPT_PENDING),
        "confirmed" => Ok(APPT_CONFIRMED),
        "cancelled" => Ok(APPT_CANCELLED),
        "completed" => Ok(APPT_COMPLETED),
        other => Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            format!("unknown appointment status: {other}"),
        )),
    }
}

/* -------------------------
   Shared API DTOs
--------------------------*/

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct OkData {
    pub ok: bool,
}

impl ApiOk<OkData> {
    pub fn ok() -> Self {
        ApiOk {
            data: OkData { ok: true },
        }
    }
}

/// Account as returned to clients. Never carries the password hash.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct AccountPublic {
    pub account_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: i16,
    pub is_active: bool,
    pub disabled: bool,
    pub avatar_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

/* -------------------------
   DB row models
--------------------------*/

#[derive(Debug, sqlx::FromRow)]
pub struct AccountRow {
    pub account_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub password_hash: String,
    pub role: i16,
    pub is_active: bool,
    pub disabled: bool,
    pub avatar_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AccountRow {
    pub fn into_public(self) -> AccountPublic {
        AccountPublic {
            account_id: self.account_id,
            name: self.name,
            email: self.email,
            phone: self.phone,
            role: self.role,
            is_active: self.is_active,
            disabled: self.disabled,
            avatar_path: self.avatar_path,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct SessionTokenRow {
    pub session_token_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/* -------------------------
   Validation helpers
--------------------------*/

pub fn validate_email(email: &str) -> Result<&str, ApiError> {
    let e = email.trim();
    let well_formed = e.len() >= 5
        && e.split_once('@')
            .map(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.starts_with('.'))
            .unwrap_or(false);
    if !well_formed {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "email is not valid".into(),
        ));
    }
    Ok(e)
}

pub fn validate_password(pw: &str) -> Result<(), ApiError> {
    if pw.trim().len() < 8 {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "password must be at least 8 characters".into(),
        ));
    }
    Ok(())
}

/// Times throughout the API are "HH:MM" wall-clock strings.
pub fn validate_time_hhmm(t: &str) -> Result<&str, ApiError> {
    let t = t.trim();
    if chrono::NaiveTime::parse_from_str(t, "%H:%M").is_err() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            format!("time must be HH:MM, got {t:?}"),
        ));
    }
    Ok(t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        assert_eq!(role_to_string(ROLE_PATIENT), "patient");
        assert_eq!(role_to_string(ROLE_HEALTH_CENTER), "health_center");
        assert_eq!(role_to_string(99), "unknown");

        assert_eq!(role_from_login_type("doctor"), Some(ROLE_DOCTOR));
        // Older frontends send "user" for patients.
        assert_eq!(role_from_login_type("user"), Some(ROLE_PATIENT));
        assert_eq!(role_from_login_type("superuser"), None);
    }

    #[test]
    fn test_appointment_status_mapping() {
        for s in ["pending", "confirmed", "cancelled", "completed"] {
            let code = appointment_status_from_string(s).unwrap();
            assert_eq!(appointment_status_to_string(code), s);
        }
        assert!(appointment_status_from_string("rescheduled").is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("someone@tabib-iq.com").is_ok());
        assert_eq!(validate_email("  a@b.io  ").unwrap(), "a@b.io");
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("@tabib-iq.com").is_err());
        assert!(validate_email("a@no-dot").is_err());
    }

    #[test]
    fn test_validate_time_hhmm() {
        assert!(validate_time_hhmm("09:30").is_ok());
        assert!(validate_time_hhmm("23:59").is_ok());
        assert!(validate_time_hhmm("24:00").is_err());
        assert!(validate_time_hhmm("9am").is_err());
        assert!(validate_time_hhmm("").is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("longenough").is_ok());
        assert!(validate_password("short").is_err());
    }
}
