// src/routes/doctor_routes.rs

use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    routing::{get, put},
};
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::hash_password,
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{
        ApiOk, AppState, OkData, ROLE_DOCTOR, validate_email, validate_password,
        validate_time_hhmm,
    },
    routes::auth_routes::ensure_admin,
    routes::notification_routes::{NOTIF_SYSTEM, push_notification},
    upload::FileStore,
};

// doctor_profile.status
const DOCTOR_PENDING: i16 = 0;
const DOCTOR_APPROVED: i16 = 1;
const DOCTOR_REJECTED: i16 = 2;

// Display slots offered to patients are 30 minutes wide.
const SLOT_MINUTES: i64 = 30;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/doctors", get(list_doctors).post(register_doctor))
        .route("/doctors/{account_id}", get(get_doctor).delete(delete_doctor))
        .route("/doctors/{account_id}/approve", put(approve_doctor))
        .route("/doctors/{account_id}/reject", put(reject_doctor))
        .route("/doctors/{account_id}/feature", put(feature_doctor))
        .route("/doctors/{account_id}/unfeature", put(unfeature_doctor))
        .route("/doctors/{account_id}/work_times", put(put_work_times))
        .route("/admin/doctors", get(admin_list_doctors))
}

/* ============================================================
   DTOs
   ============================================================ */

/// What the public directory and detail pages see. ID/syndicate scans stay
/// out of every public payload.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct DoctorPublic {
    pub account_id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub specialty: String,
    pub province: String,
    pub area: String,
    pub clinic_location: String,
    pub about: String,
    pub experience_years: Option<i32>,
    pub consultation_fee_iqd: Option<i32>,
    pub image_path: Option<String>,
    pub is_featured: bool,
    pub is_available: bool,
    pub rating: f32,
    pub total_ratings: i32,
    pub created_at: DateTime<Utc>,
}

/// Admin view adds moderation state and contact email.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct DoctorAdminRow {
    pub account_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub specialty: String,
    pub province: String,
    pub status: i16,
    pub is_featured: bool,
    pub disabled: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct WorkTime {
    pub weekday: i16,
    pub from_time: String,
    pub to_time: String,
}

#[derive(Debug, Serialize)]
pub struct DayAvailability {
    pub weekday: i16,
    pub day_name: &'static str,
    pub available: bool,
    pub times: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DoctorDetail {
    #[serde(flatten)]
    pub doctor: DoctorPublic,
    pub work_times: Vec<WorkTime>,
    pub available_days: Vec<DayAvailability>,
}

const DOCTOR_PUBLIC_COLUMNS: &str = r#"
    a.account_id, a.name, a.phone,
    d.specialty, d.province, d.area, d.clinic_location, d.about,
    d.experience_years, d.consultation_fee_iqd, d.image_path,
    d.is_featured, d.is_available, d.rating, d.total_ratings, d.created_at
"#;

/* ============================================================
   Public directory + detail
   ============================================================ */

pub async fn list_doctors(
    State(state): State<AppState>,
) -> Result<Json<ApiOk<Vec<DoctorPublic>>>, ApiError> {
    let rows: Vec<DoctorPublic> = sqlx::query_as::<_, DoctorPublic>(&format!(
        r#"
        SELECT {DOCTOR_PUBLIC_COLUMNS}
        FROM doctor_profile d
        JOIN account a ON a.account_id = d.account_id
        WHERE d.status = $1
          AND a.is_active = true
          AND a.disabled = false
        ORDER BY d.is_featured DESC, d.rating DESC, d.created_at DESC
        LIMIT 200
        "#
    ))
    .bind(DOCTOR_APPROVED)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: rows }))
}

pub async fn get_doctor(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<ApiOk<DoctorDetail>>, ApiError> {
    let doctor: DoctorPublic = sqlx::query_as::<_, DoctorPublic>(&format!(
        r#"
        SELECT {DOCTOR_PUBLIC_COLUMNS}
        FROM doctor_profile d
        JOIN account a ON a.account_id = d.account_id
        WHERE d.account_id = $1
          AND d.status = $2
          AND a.is_active = true
          AND a.disabled = false
        "#
    ))
    .bind(account_id)
    .bind(DOCTOR_APPROVED)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(|| ApiError::not_found("doctor"))?;

    let work_times: Vec<WorkTime> = sqlx::query_as::<_, WorkTime>(
        r#"
        SELECT weekday, from_time, to_time
        FROM work_time
        WHERE account_id = $1
        ORDER BY weekday ASC, from_time ASC
        "#,
    )
    .bind(account_id)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    let available_days = build_available_days(&work_times);

    Ok(Json(ApiOk {
        data: DoctorDetail {
            doctor,
            work_times,
            available_days,
        },
    }))
}

/* ============================================================
   Registration (multipart: profile fields + images)
   ============================================================ */

#[derive(Debug, Default)]
struct DoctorForm {
    name: String,
    email: String,
    password: String,
    phone: Option<String>,
    specialty: String,
    province: String,
    area: String,
    clinic_location: String,
    about: String,
    experience_years: Option<i32>,
    consultation_fee_iqd: Option<i32>,
    image_path: Option<String>,
    id_front_path: Option<String>,
    id_back_path: Option<String>,
    syndicate_front_path: Option<String>,
    syndicate_back_path: Option<String>,
}

fn bad_multipart() -> ApiError {
    ApiError::BadRequest("VALIDATION_ERROR", "malformed multipart body".into())
}

pub async fn register_doctor(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(axum::http::StatusCode, Json<ApiOk<DoctorPublic>>), ApiError> {
    let store = FileStore::new(&state.upload_dir, state.max_upload_bytes);
    let mut saved_files: Vec<String> = Vec::new();

    match read_form_and_insert(&state, &store, multipart, &mut saved_files).await {
        Ok(doctor) => {
            tracing::info!(account_id = %doctor.account_id, "doctor registered, pending review");
            Ok((axum::http::StatusCode::CREATED, Json(ApiOk { data: doctor })))
        }
        Err(e) => {
            // Registration failed after files hit the disk; don't orphan them.
            for path in &saved_files {
                store.remove(path).await;
            }
            Err(e)
        }
    }
}

async fn read_form_and_insert(
    state: &AppState,
    store: &FileStore,
    mut multipart: Multipart,
    saved_files: &mut Vec<String>,
) -> Result<DoctorPublic, ApiError> {
    let mut form = DoctorForm::default();

    while let Some(field) = multipart.next_field().await.map_err(|_| bad_multipart())? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "name" => form.name = field.text().await.map_err(|_| bad_multipart())?,
            "email" => form.email = field.text().await.map_err(|_| bad_multipart())?,
            "password" => form.password = field.text().await.map_err(|_| bad_multipart())?,
            "phone" => form.phone = Some(field.text().await.map_err(|_| bad_multipart())?),
            "specialty" => form.specialty = field.text().await.map_err(|_| bad_multipart())?,
            "province" => form.province = field.text().await.map_err(|_| bad_multipart())?,
            "area" => form.area = field.text().await.map_err(|_| bad_multipart())?,
            "clinic_location" => {
                form.clinic_location = field.text().await.map_err(|_| bad_multipart())?
            }
            "about" => form.about = field.text().await.map_err(|_| bad_multipart())?,
            "experience_years" => {
                let raw = field.text().await.map_err(|_| bad_multipart())?;
                form.experience_years = parse_optional_int(&raw, "experience_years")?;
            }
            "consultation_fee_iqd" => {
                let raw = field.text().await.map_err(|_| bad_multipart())?;
                form.consultation_fee_iqd = parse_optional_int(&raw, "consultation_fee_iqd")?;
            }
            "image" | "id_front" | "id_back" | "syndicate_front" | "syndicate_back" => {
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(|_| bad_multipart())?;
                let path = store.save_image(content_type.as_deref(), &bytes).await?;
                saved_files.push(path.clone());
                match name.as_str() {
                    "image" => form.image_path = Some(path),
                    "id_front" => form.id_front_path = Some(path),
                    "id_back" => form.id_back_path = Some(path),
                    "syndicate_front" => form.syndicate_front_path = Some(path),
                    _ => form.syndicate_back_path = Some(path),
                }
            }
            // Unknown parts are ignored, same as the loose schemas before.
            _ => {}
        }
    }

    insert_doctor(state, &form).await
}

fn parse_optional_int(raw: &str, field: &str) -> Result<Option<i32>, ApiError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<i32>().map(Some).map_err(|_| {
        ApiError::BadRequest("VALIDATION_ERROR", format!("{field} must be an integer"))
    })
}

async fn insert_doctor(state: &AppState, form: &DoctorForm) -> Result<DoctorPublic, ApiError> {
    let name = form.name.trim();
    let specialty = form.specialty.trim();
    let province = form.province.trim();
    if name.is_empty() || specialty.is_empty() || province.is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "name, specialty and province are required".into(),
        ));
    }
    let email = validate_email(&form.email)?.to_string();
    validate_password(&form.password)?;

    let password_hash = hash_password(form.password.trim()).map_err(ApiError::Internal)?;

    // Account and profile land together or not at all.
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
    .bind(form.phone.as_deref())
    .bind(&password_hash)
    .bind(ROLE_DOCTOR)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        ApiError::db_or_conflict(e, "account_email_key", "EMAIL_TAKEN", "Email already registered")
    })?;

    sqlx::query(
        r#"
        INSERT INTO doctor_profile (
          account_id, specialty, province, area, clinic_location, about,
          experience_years, consultation_fee_iqd,
          image_path, id_front_path, id_back_path,
          syndicate_front_path, syndicate_back_path, status
        )
        VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14)
        "#,
    )
    .bind(account_id)
    .bind(specialty)
    .bind(province)
    .bind(form.area.trim())
    .bind(form.clinic_location.trim())
    .bind(form.about.trim())
    .bind(form.experience_years)
    .bind(form.consultation_fee_iqd)
    .bind(form.image_path.as_deref())
    .bind(form.id_front_path.as_deref())
    .bind(form.id_back_path.as_deref())
    .bind(form.syndicate_front_path.as_deref())
    .bind(form.syndicate_back_path.as_deref())
    .bind(DOCTOR_PENDING)
    .execute(&mut *tx)
    .await
    .map_err(ApiError::db)?;

    let doctor: DoctorPublic = sqlx::query_as::<_, DoctorPublic>(&format!(
        r#"
        SELECT {DOCTOR_PUBLIC_COLUMNS}
        FROM doctor_profile d
        JOIN account a ON a.account_id = d.account_id
        WHERE d.account_id = $1
        "#
    ))
    .bind(account_id)
    .fetch_one(&mut *tx)
    .await
    .map_err(ApiError::db)?;

    tx.commit().await.map_err(ApiError::db)?;

    Ok(doctor)
}

/* ============================================================
   Moderation (admin)
   ============================================================ */

pub async fn approve_doctor(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(account_id): Path<Uuid>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    set_doctor_status(&state, &auth, account_id, DOCTOR_APPROVED).await
}

pub async fn reject_doctor(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(account_id): Path<Uuid>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    set_doctor_status(&state, &auth, account_id, DOCTOR_REJECTED).await
}

async fn set_doctor_status(
    state: &AppState,
    auth: &AuthContext,
    account_id: Uuid,
    status: i16,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    ensure_admin(auth)?;

    let mut tx = state.db.begin().await.map_err(ApiError::db)?;

    let res = sqlx::query(
        r#"
        UPDATE doctor_profile
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
        return Err(ApiError::not_found("doctor"));
    }

    let (title, body) = if status == DOCTOR_APPROVED {
        ("Profile approved", "Your doctor profile is now visible to patients.")
    } else {
        ("Profile rejected", "Your doctor profile was rejected. Contact support for details.")
    };
    push_notification(&mut *tx, account_id, title, body, NOTIF_SYSTEM)
        .await
        .map_err(ApiError::db)?;

    tx.commit().await.map_err(ApiError::db)?;

    tracing::info!(%account_id, status, "doctor moderation state changed");

    Ok(Json(ApiOk::ok()))
}

pub async fn feature_doctor(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(account_id): Path<Uuid>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    set_featured(&state, &auth, account_id, true).await
}

pub async fn unfeature_doctor(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(account_id): Path<Uuid>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    set_featured(&state, &auth, account_id, false).await
}

async fn set_featured(
    state: &AppState,
    auth: &AuthContext,
    account_id: Uuid,
    is_featured: bool,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    ensure_admin(auth)?;

    let res = sqlx::query(
        r#"
        UPDATE doctor_profile
        SET is_featured = $1
        WHERE account_id = $2
        "#,
    )
    .bind(is_featured)
    .bind(account_id)
    .execute(&state.db)
    .await
    .map_err(ApiError::db)?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("doctor"));
    }

    Ok(Json(ApiOk::ok()))
}

pub async fn admin_list_doctors(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<DoctorAdminRow>>>, ApiError> {
    ensure_admin(&auth)?;

    let rows: Vec<DoctorAdminRow> = sqlx::query_as::<_, DoctorAdminRow>(
        r#"
        SELECT a.account_id, a.name, a.email, a.phone,
               d.specialty, d.province, d.status, d.is_featured, a.disabled, d.created_at
        FROM doctor_profile d
        JOIN account a ON a.account_id = d.account_id
        ORDER BY d.created_at DESC
        LIMIT 500
        "#,
    )
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: rows }))
}

/// Removing the account removes the profile, work times, appointments and
/// notifications through FK cascade; no per-collection cleanup here.
pub async fn delete_doctor(
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
    .bind(ROLE_DOCTOR)
    .execute(&state.db)
    .await
    .map_err(ApiError::db)?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("doctor"));
    }

    tracing::info!(%account_id, "doctor deleted with dependents");

    Ok(Json(ApiOk::ok()))
}

/* ============================================================
   Weekly schedule
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct PutWorkTimesRequest {
    pub work_times: Vec<WorkTime>,
}

/// Replace-all semantics, same shape the frontends already send.
pub async fn put_work_times(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(account_id): Path<Uuid>,
    Json(req): Json<PutWorkTimesRequest>,
) -> Result<Json<ApiOk<Vec<WorkTime>>>, ApiError> {
    if auth.account_id != account_id {
        ensure_admin(&auth)?;
    }

    for wt in &req.work_times {
        if !(0..=6).contains(&wt.weekday) {
            return Err(ApiError::BadRequest(
                "VALIDATION_ERROR",
                "weekday must be 0..6".into(),
            ));
        }
        let from = validate_time_hhmm(&wt.from_time)?;
        let to = validate_time_hhmm(&wt.to_time)?;
        if from >= to {
            return Err(ApiError::BadRequest(
                "VALIDATION_ERROR",
                "from_time must be before to_time".into(),
            ));
        }
    }

    let mut tx = state.db.begin().await.map_err(ApiError::db)?;

    let exists: Option<Uuid> = sqlx::query_scalar(
        r#"
        SELECT account_id
        FROM doctor_profile
        WHERE account_id = $1
        "#,
    )
    .bind(account_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(ApiError::db)?;

    if exists.is_none() {
        return Err(ApiError::not_found("doctor"));
    }

    sqlx::query(r#"DELETE FROM work_time WHERE account_id = $1"#)
        .bind(account_id)
        .execute(&mut *tx)
        .await
        .map_err(ApiError::db)?;

    for wt in &req.work_times {
        sqlx::query(
            r#"
            INSERT INTO work_time (account_id, weekday, from_time, to_time)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(account_id)
        .bind(wt.weekday)
        .bind(wt.from_time.trim())
        .bind(wt.to_time.trim())
        .execute(&mut *tx)
        .await
        .map_err(ApiError::db)?;
    }

    let rows: Vec<WorkTime> = sqlx::query_as::<_, WorkTime>(
        r#"
        SELECT weekday, from_time, to_time
        FROM work_time
        WHERE account_id = $1
        ORDER BY weekday ASC, from_time ASC
        "#,
    )
    .bind(account_id)
    .fetch_all(&mut *tx)
    .await
    .map_err(ApiError::db)?;

    tx.commit().await.map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: rows }))
}

/* ============================================================
   Slot expansion
   ============================================================ */

fn day_name(weekday: i16) -> &'static str {
    match weekday {
        0 => "Sunday",
        1 => "Monday",
        2 => "Tuesday",
        3 => "Wednesday",
        4 => "Thursday",
        5 => "Friday",
        6 => "Saturday",
        _ => "Unknown",
    }
}

/// Expand a working window into bookable start times, one every
/// `step_minutes`. A window that ends before it starts yields nothing.
fn expand_slots(from_time: &str, to_time: &str, step_minutes: i64) -> Vec<String> {
    let (Ok(from), Ok(to)) = (
        NaiveTime::parse_from_str(from_time, "%H:%M"),
        NaiveTime::parse_from_str(to_time, "%H:%M"),
    ) else {
        return Vec::new();
    };

    let step = chrono::Duration::minutes(step_minutes);
    let mut slots = Vec::new();
    let mut t = from;
    while t < to {
        slots.push(t.format("%H:%M").to_string());
        let (next, wrapped) = t.overflowing_add_signed(step);
        if wrapped != 0 {
            break;
        }
        t = next;
    }
    slots
}

fn build_available_days(work_times: &[WorkTime]) -> Vec<DayAvailability> {
    (0..7)
        .map(|weekday| {
            let mut times: Vec<String> = work_times
                .iter()
                .filter(|wt| wt.weekday == weekday)
                .flat_map(|wt| expand_slots(&wt.from_time, &wt.to_time, SLOT_MINUTES))
                .collect();
            times.sort();
            times.dedup();
            DayAvailability {
                weekday,
                day_name: day_name(weekday),
                available: !times.is_empty(),
                times,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_slots_half_hour_grid() {
        assert_eq!(
            expand_slots("09:00", "11:00", 30),
            vec!["09:00", "09:30", "10:00", "10:30"]
        );
        // End time itself is not a bookable start.
        assert_eq!(expand_slots("10:00", "10:30", 30), vec!["10:00"]);
    }

    #[test]
    fn test_expand_slots_degenerate_windows() {
        assert!(expand_slots("15:00", "15:00", 30).is_empty());
        assert!(expand_slots("16:00", "12:00", 30).is_empty());
        assert!(expand_slots("junk", "12:00", 30).is_empty());
        // Window running to end of day must not wrap past midnight.
        assert_eq!(expand_slots("23:00", "23:59", 30).len(), 2);
    }

    #[test]
    fn test_build_available_days_covers_whole_week() {
        let work_times = vec![
            WorkTime {
                weekday: 0,
                from_time: "10:00".into(),
                to_time: "12:00".into(),
            },
            WorkTime {
                weekday: 4,
                from_time: "08:00".into(),
                to_time: "09:00".into(),
            },
        ];
        let days = build_available_days(&work_times);
        assert_eq!(days.len(), 7);
        assert!(days[0].available);
        assert_eq!(days[0].times.len(), 4);
        assert!(!days[1].available);
        assert_eq!(days[4].times, vec!["08:00", "08:30"]);
        assert_eq!(days[6].day_name, "Saturday");
    }

    #[test]
    fn test_build_available_days_merges_split_shifts() {
        let work_times = vec![
            WorkTime {
                weekday: 2,
                from_time: "09:00".into(),
                to_time: "10:00".into(),
            },
            WorkTime {
                weekday: 2,
                from_time: "14:00".into(),
                to_time: "15:00".into(),
            },
        ];
        let days = build_available_days(&work_times);
        assert_eq!(days[2].times, vec!["09:00", "09:30", "14:00", "14:30"]);
    }
}
