// src/routes/appointment_routes.rs

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, post, put},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{
        APPT_CANCELLED, APPT_PENDING, ApiOk, AppState, OkData, ROLE_ADMIN, ROLE_DOCTOR,
        ROLE_PATIENT, appointment_status_from_string, appointment_status_to_string,
        validate_time_hhmm,
    },
    routes::notification_routes::{NOTIF_APPOINTMENT, push_notification},
};

const KIND_CONSULTATION: i16 = 0;
const KIND_FOLLOW_UP: i16 = 1;

fn is_admin(auth: &AuthContext) -> bool {
    auth.role == ROLE_ADMIN
}
fn is_doctor(auth: &AuthContext) -> bool {
    auth.role == ROLE_DOCTOR
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/appointments", post(create_appointment))
        .route("/appointments/patient/{account_id}", get(list_patient_appointments))
        .route("/appointments/doctor/{account_id}", get(list_doctor_appointments))
        .route("/appointments/{appointment_id}/status", put(update_status))
        .route("/appointments/{appointment_id}", delete(delete_appointment))
}

/* ============================================================
   DTOs
   ============================================================ */

#[derive(Debug, Serialize)]
pub struct PersonBrief {
    pub account_id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub specialty: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AppointmentView {
    pub appointment_id: Uuid,
    pub date: NaiveDate,
    pub time: String,
    pub status: String,
    pub kind: String,
    pub notes: Option<String>,
    pub symptoms: Option<String>,
    pub prescription: Option<String>,
    pub created_at: DateTime<Utc>,
    pub patient: PersonBrief,
    pub doctor: PersonBrief,
}

#[derive(Debug, sqlx::FromRow)]
struct AppointmentJoinRow {
    appointment_id: Uuid,
    patient_account_id: Uuid,
    doctor_account_id: Uuid,
    date_on: NaiveDate,
    time_slot: String,
    status: i16,
    kind: i16,
    notes: Option<String>,
    symptoms: Option<String>,
    prescription: Option<String>,
    created_at: DateTime<Utc>,
    patient_name: String,
    patient_phone: Option<String>,
    doctor_name: String,
    doctor_specialty: Option<String>,
}

impl AppointmentJoinRow {
    fn into_view(self) -> AppointmentView {
        AppointmentView {
            appointment_id: self.appointment_id,
            date: self.date_on,
            time: self.time_slot,
            status: appointment_status_to_string(self.status),
            kind: kind_to_string(self.kind),
            notes: self.notes,
            symptoms: self.symptoms,
            prescription: self.prescription,
            created_at: self.created_at,
            patient: PersonBrief {
                account_id: self.patient_account_id,
                name: self.patient_name,
                phone: self.patient_phone,
                specialty: None,
            },
            doctor: PersonBrief {
                account_id: self.doctor_account_id,
                name: self.doctor_name,
                phone: None,
                specialty: self.doctor_specialty,
            },
        }
    }
}

const APPOINTMENT_JOIN: &str = r#"
    SELECT
      ap.appointment_id,
      ap.patient_account_id,
      ap.doctor_account_id,
      ap.date_on,
      ap.time_slot,
      ap.status,
      ap.kind,
      ap.notes,
      ap.symptoms,
      ap.prescription,
      ap.created_at,
      p.name AS patient_name,
      p.phone AS patient_phone,
      d.name AS doctor_name,
      dp.specialty AS doctor_specialty
    FROM appointment ap
    JOIN account p ON p.account_id = ap.patient_account_id
    JOIN account d ON d.account_id = ap.doctor_account_id
    LEFT JOIN doctor_profile dp ON dp.account_id = ap.doctor_account_id
"#;

fn kind_to_string(kind: i16) -> String {
    match kind {
        KIND_CONSULTATION => "consultation",
        KIND_FOLLOW_UP => "follow-up",
        _ => "unknown",
    }
    .to_string()
}

fn kind_from_string(kind: &str) -> Result<i16, ApiError> {
    match kind {
        "consultation" => Ok(KIND_CONSULTATION),
        "follow-up" | "follow_up" => Ok(KIND_FOLLOW_UP),
        other => Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            format!("unknown appointment kind: {other}"),
        )),
    }
}

/* ============================================================
   POST /appointments (booking)
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    /// YYYY-MM-DD
    pub date: NaiveDate,
    /// HH:MM
    pub time: String,
    pub kind: Option<String>,
    pub notes: Option<String>,
    pub symptoms: Option<String>,
}

pub async fn create_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateAppointmentRequest>,
) -> Result<(axum::http::StatusCode, Json<ApiOk<AppointmentView>>), ApiError> {
    // Patients book for themselves; staff may book on a patient's behalf.
    if req.patient_id != auth.account_id && !is_admin(&auth) {
        return Err(ApiError::Forbidden(
            "FORBIDDEN",
            "Patients can only book their own appointments".into(),
        ));
    }

    let time = validate_time_hhmm(&req.time)?.to_string();
    if req.date < Utc::now().date_naive() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "date must not be in the past".into(),
        ));
    }
    let kind = match req.kind.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(k) => kind_from_string(k)?,
        None => KIND_CONSULTATION,
    };

    // Both parties must exist with the right roles; the doctor must be
    // approved and open for booking.
    let patient: Option<(String,)> = sqlx::query_as(
        r#"
        SELECT name
        FROM account
        WHERE account_id = $1
          AND role = $2
          AND is_active = true
          AND disabled = false
        "#,
    )
    .bind(req.patient_id)
    .bind(ROLE_PATIENT)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?;

    let Some((patient_name,)) = patient else {
        return Err(ApiError::not_found("patient"));
    };

    let doctor: Option<(String,)> = sqlx::query_as(
        r#"
        SELECT a.name
        FROM account a
        JOIN doctor_profile dp ON dp.account_id = a.account_id
        WHERE a.account_id = $1
          AND dp.status = 1
          AND dp.is_available = true
          AND a.is_active = true
          AND a.disabled = false
        "#,
    )
    .bind(req.doctor_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?;

    let Some((doctor_name,)) = doctor else {
        return Err(ApiError::not_found("doctor"));
    };

    // The insert and both notifications commit together. No availability
    // pre-check: the partial unique index is the arbiter, so two racing
    // bookings cannot both land — the loser gets a 409.
    let mut tx = state.db.begin().await.map_err(ApiError::db)?;

    let appointment_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO appointment
            (patient_account_id, doctor_account_id, date_on, time_slot, status, kind, notes, symptoms)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING appointment_id
        "#,
    )
    .bind(req.patient_id)
    .bind(req.doctor_id)
    .bind(req.date)
    .bind(&time)
    .bind(APPT_PENDING)
    .bind(kind)
    .bind(req.notes.as_deref())
    .bind(req.symptoms.as_deref())
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        ApiError::db_or_conflict(
            e,
            "appointment_slot_key",
            "SLOT_TAKEN",
            "Appointment time not available",
        )
    })?;

    let when = format!("{} at {}", req.date, time);
    push_notification(
        &mut *tx,
        req.doctor_id,
        "New appointment",
        &format!("New appointment with {patient_name} on {when}."),
        NOTIF_APPOINTMENT,
    )
    .await
    .map_err(ApiError::db)?;
    push_notification(
        &mut *tx,
        req.patient_id,
        "Appointment booked",
        &format!("Your appointment with {doctor_name} on {when} is awaiting confirmation."),
        NOTIF_APPOINTMENT,
    )
    .await
    .map_err(ApiError::db)?;

    tx.commit().await.map_err(ApiError::db)?;

    tracing::info!(%appointment_id, doctor_id = %req.doctor_id, "appointment booked");

    let view = fetch_view(&state, appointment_id).await?;
    Ok((axum::http::StatusCode::CREATED, Json(ApiOk { data: view })))
}

async fn fetch_view(state: &AppState, appointment_id: Uuid) -> Result<AppointmentView, ApiError> {
    let row: AppointmentJoinRow = sqlx::query_as::<_, AppointmentJoinRow>(&format!(
        "{APPOINTMENT_JOIN} WHERE ap.appointment_id = $1"
    ))
    .bind(appointment_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(|| ApiError::not_found("appointment"))?;

    Ok(row.into_view())
}

/* ============================================================
   Listings
   ============================================================ */

pub async fn list_patient_appointments(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(account_id): Path<Uuid>,
) -> Result<Json<ApiOk<Vec<AppointmentView>>>, ApiError> {
    if auth.account_id != account_id && !is_admin(&auth) {
        return Err(ApiError::Forbidden(
            "FORBIDDEN",
            "You can only view your own appointments".into(),
        ));
    }

    let rows: Vec<AppointmentJoinRow> = sqlx::query_as::<_, AppointmentJoinRow>(&format!(
        r#"
        {APPOINTMENT_JOIN}
        WHERE ap.patient_account_id = $1
        ORDER BY ap.date_on ASC, ap.time_slot ASC
        "#
    ))
    .bind(account_id)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk {
        data: rows.into_iter().map(AppointmentJoinRow::into_view).collect(),
    }))
}

pub async fn list_doctor_appointments(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(account_id): Path<Uuid>,
) -> Result<Json<ApiOk<Vec<AppointmentView>>>, ApiError> {
    let allowed = is_admin(&auth) || (is_doctor(&auth) && auth.account_id == account_id);
    if !allowed {
        return Err(ApiError::Forbidden(
            "FORBIDDEN",
            "Doctors can only view their own schedule".into(),
        ));
    }

    let rows: Vec<AppointmentJoinRow> = sqlx::query_as::<_, AppointmentJoinRow>(&format!(
        r#"
        {APPOINTMENT_JOIN}
        WHERE ap.doctor_account_id = $1
        ORDER BY ap.date_on ASC, ap.time_slot ASC
        "#
    ))
    .bind(account_id)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk {
        data: rows.into_iter().map(AppointmentJoinRow::into_view).collect(),
    }))
}

/* ============================================================
   Status transitions
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    pub prescription: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct OwnershipRow {
    patient_account_id: Uuid,
    doctor_account_id: Uuid,
}

pub async fn update_status(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<ApiOk<AppointmentView>>, ApiError> {
    let status = appointment_status_from_string(req.status.trim())?;

    let owners: OwnershipRow = sqlx::query_as::<_, OwnershipRow>(
        r#"
        SELECT patient_account_id, doctor_account_id
        FROM appointment
        WHERE appointment_id = $1
        "#,
    )
    .bind(appointment_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(|| ApiError::not_found("appointment"))?;

    // The doctor (or an admin) drives the lifecycle; the patient may only
    // cancel their own booking.
    let is_own_doctor = auth.account_id == owners.doctor_account_id;
    let is_own_patient = auth.account_id == owners.patient_account_id;
    let allowed =
        is_admin(&auth) || is_own_doctor || (is_own_patient && status == APPT_CANCELLED);
    if !allowed {
        return Err(ApiError::Forbidden(
            "FORBIDDEN",
            "Not allowed to change this appointment".into(),
        ));
    }

    let mut tx = state.db.begin().await.map_err(ApiError::db)?;

    sqlx::query(
        r#"
        UPDATE appointment
        SET status = $1,
            prescription = COALESCE($2, prescription),
            updated_at = now()
        WHERE appointment_id = $3
        "#,
    )
    .bind(status)
    .bind(req.prescription.as_deref())
    .bind(appointment_id)
    .execute(&mut *tx)
    .await
    .map_err(ApiError::db)?;

    let status_text = appointment_status_to_string(status);
    if is_own_patient && status == APPT_CANCELLED {
        push_notification(
            &mut *tx,
            owners.doctor_account_id,
            "Appointment cancelled",
            "A patient cancelled an appointment.",
            NOTIF_APPOINTMENT,
        )
        .await
        .map_err(ApiError::db)?;
    } else {
        push_notification(
            &mut *tx,
            owners.patient_account_id,
            "Appointment update",
            &format!("Your appointment is now {status_text}."),
            NOTIF_APPOINTMENT,
        )
        .await
        .map_err(ApiError::db)?;
    }

    tx.commit().await.map_err(ApiError::db)?;

    let view = fetch_view(&state, appointment_id).await?;
    Ok(Json(ApiOk { data: view }))
}

pub async fn delete_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    let res = if is_admin(&auth) {
        sqlx::query(r#"DELETE FROM appointment WHERE appointment_id = $1"#)
            .bind(appointment_id)
            .execute(&state.db)
            .await
    } else {
        sqlx::query(
            r#"
            DELETE FROM appointment
            WHERE appointment_id = $1
              AND patient_account_id = $2
            "#,
        )
        .bind(appointment_id)
        .bind(auth.account_id)
        .execute(&state.db)
        .await
    }
    .map_err(ApiError::db)?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("appointment"));
    }

    Ok(Json(ApiOk::ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(kind_from_string("consultation").unwrap(), KIND_CONSULTATION);
        assert_eq!(kind_from_string("follow-up").unwrap(), KIND_FOLLOW_UP);
        // Snake_case alias kept for older clients.
        assert_eq!(kind_from_string("follow_up").unwrap(), KIND_FOLLOW_UP);
        assert!(kind_from_string("walk-in").is_err());

        assert_eq!(kind_to_string(KIND_CONSULTATION), "consultation");
        assert_eq!(kind_to_string(KIND_FOLLOW_UP), "follow-up");
    }
}
