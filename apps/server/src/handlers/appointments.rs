use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use chrono::{Duration, NaiveTime};
use rust_decimal::Decimal;
use sqlx::SqliteConnection;
use std::sync::Arc;

use crate::error::{ApiError, AppResult};
use crate::models::{
    cents_to_decimal, decimal_to_cents, effective_duration, ApiResponse, AppointmentDetail,
    AppointmentView, AppointmentsQuery, ConflictInfo, CreateAppointmentRequest, StaffSlotsQuery,
    UpdateAppointmentRequest, APPOINTMENT_STATUSES, PAYMENT_METHODS, STATUS_CANCELLED,
    STATUS_CONFIRMED,
};
use crate::scheduling::hours::WeekSchedule;
use crate::scheduling::{conflict, payment};
use crate::store::{self, NewAppointment};
use crate::{auth, clock, db, AppState};

/// GET /api/admin/appointments?date= or ?from=&to= — joined listing
pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<AppointmentsQuery>,
) -> AppResult<Json<ApiResponse<Vec<AppointmentView>>>> {
    let mut conn = state.db.acquire().await?;
    auth::require_staff(&headers, &mut conn).await?;

    let rows = if let Some(raw) = &query.date {
        let day = super::parse_date(raw)?.and_time(NaiveTime::MIN);
        store::appointments_between(&mut conn, day, day + Duration::days(1)).await?
    } else if let (Some(from_raw), Some(to_raw)) = (&query.from, &query.to) {
        let from = super::parse_date(from_raw)?.and_time(NaiveTime::MIN);
        let to = (super::parse_date(to_raw)? + Duration::days(1)).and_time(NaiveTime::MIN);
        store::appointments_between(&mut conn, from, to).await?
    } else if let Some(from_raw) = &query.from {
        let from = super::parse_date(from_raw)?.and_time(NaiveTime::MIN);
        store::appointments_from(&mut conn, from).await?
    } else {
        let today = clock::salon_today(state.utc_offset_minutes).and_time(NaiveTime::MIN);
        store::appointments_from(&mut conn, today).await?
    };

    Ok(Json(ApiResponse::success(
        rows.into_iter().map(Into::into).collect(),
    )))
}

/// POST /api/admin/appointments — staff books directly, default confirmed
pub async fn create_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateAppointmentRequest>,
) -> AppResult<Json<ApiResponse<AppointmentDetail>>> {
    let start_at = super::parse_start_at(&req.date, &req.start_time)?;
    if let Some(d) = req.duration_min {
        if d <= 0 {
            return Err(ApiError::Validation("Duration must be positive".into()));
        }
    }
    let status = req
        .status
        .clone()
        .unwrap_or_else(|| STATUS_CONFIRMED.to_string());
    if !APPOINTMENT_STATUSES.contains(&status.as_str()) {
        return Err(ApiError::Validation("Unknown appointment status".into()));
    }

    let staff = {
        let mut conn = state.db.acquire().await?;
        auth::require_staff(&headers, &mut conn).await?
    };

    let mut conn = db::begin_immediate(&state.db).await?;
    match create_in_tx(&mut conn, staff.id, &req, start_at, &status).await {
        Ok(id) => {
            db::commit(&mut conn).await?;
            let detail = store::appointment_detail(&mut conn, id)
                .await?
                .ok_or(ApiError::NotFound("Appointment"))?;
            tracing::info!("appointment {} created by {}", id, staff.username);
            Ok(Json(ApiResponse::success(detail)))
        }
        Err(e) => {
            db::rollback(&mut conn).await;
            Err(e)
        }
    }
}

async fn create_in_tx(
    conn: &mut SqliteConnection,
    staff_id: i64,
    req: &CreateAppointmentRequest,
    start_at: chrono::NaiveDateTime,
    status: &str,
) -> Result<i64, ApiError> {
    store::client_by_id(&mut *conn, req.client_id)
        .await?
        .ok_or(ApiError::NotFound("Client"))?;

    let services = store::services_by_ids(&mut *conn, &req.service_ids).await?;
    if services.len() != req.service_ids.len() {
        return Err(ApiError::Validation("Unknown service selected".into()));
    }
    let duration_min = effective_duration(req.duration_min, &services);
    if duration_min <= 0 {
        return Err(ApiError::Validation(
            "Appointment needs services or an explicit duration".into(),
        ));
    }

    // Staff may book outside working hours and over blocks, but never
    // over another active appointment.
    if status != STATUS_CANCELLED {
        let busy = store::busy_appointments_for_date(&mut *conn, start_at.date()).await?;
        if let Some(conflicting) = conflict::find_conflict(start_at, duration_min, &busy, None) {
            return Err(ApiError::SchedulingConflict(ConflictInfo::from_busy(
                conflicting,
            )));
        }
    }

    let id = store::insert_appointment(
        &mut *conn,
        &NewAppointment {
            client_id: req.client_id,
            user_id: staff_id,
            start_at,
            duration_min: req.duration_min,
            status: status.to_string(),
            notes: req.notes.clone(),
        },
    )
    .await?;
    store::insert_appointment_services(&mut *conn, id, &services).await?;
    Ok(id)
}

/// PUT /api/admin/appointments/:id — reschedule, edit, or check out
pub async fn update_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(req): Json<UpdateAppointmentRequest>,
) -> AppResult<Json<ApiResponse<AppointmentDetail>>> {
    if let Some(d) = req.duration_min {
        if d <= 0 {
            return Err(ApiError::Validation("Duration must be positive".into()));
        }
    }
    if let Some(status) = &req.status {
        if !APPOINTMENT_STATUSES.contains(&status.as_str()) {
            return Err(ApiError::Validation("Unknown appointment status".into()));
        }
    }
    match (req.paid_price, &req.payment_method) {
        (Some(paid), Some(method)) => {
            if paid < Decimal::ZERO {
                return Err(ApiError::Validation("Paid price cannot be negative".into()));
            }
            if !PAYMENT_METHODS.contains(&method.as_str()) {
                return Err(ApiError::Validation("Unknown payment method".into()));
            }
        }
        (Some(_), None) => {
            return Err(ApiError::Validation(
                "payment_method is required with paid_price".into(),
            ));
        }
        (None, Some(_)) => {
            return Err(ApiError::Validation(
                "paid_price is required with payment_method".into(),
            ));
        }
        (None, None) => {}
    }

    let staff = {
        let mut conn = state.db.acquire().await?;
        auth::require_staff(&headers, &mut conn).await?
    };

    let mut conn = db::begin_immediate(&state.db).await?;
    match update_in_tx(&mut conn, &state, id, &req).await {
        Ok(()) => {
            db::commit(&mut conn).await?;
            let detail = store::appointment_detail(&mut conn, id)
                .await?
                .ok_or(ApiError::NotFound("Appointment"))?;
            tracing::info!("appointment {} updated by {}", id, staff.username);
            Ok(Json(ApiResponse::success(detail)))
        }
        Err(e) => {
            db::rollback(&mut conn).await;
            Err(e)
        }
    }
}

async fn update_in_tx(
    conn: &mut SqliteConnection,
    state: &AppState,
    id: i64,
    req: &UpdateAppointmentRequest,
) -> Result<(), ApiError> {
    let current = store::appointment_row(&mut *conn, id)
        .await?
        .ok_or(ApiError::NotFound("Appointment"))?;
    let stored_override = store::appointment_duration_override(&mut *conn, id).await?;

    let client_id = match req.client_id {
        Some(cid) => {
            store::client_by_id(&mut *conn, cid)
                .await?
                .ok_or(ApiError::NotFound("Client"))?;
            cid
        }
        None => current.client_id,
    };

    let date = match &req.date {
        Some(raw) => super::parse_date(raw)?,
        None => current.start_at.date(),
    };
    let time = match &req.start_time {
        Some(raw) => super::parse_time(raw)?,
        None => current.start_at.time(),
    };
    let start_at = date.and_time(time);

    // The stored override only changes when the request carries one;
    // the effective value still falls back to the service sum.
    let new_override = req.duration_min.or(stored_override);
    let duration_min = req.duration_min.unwrap_or(current.duration_min);

    let status = match &req.status {
        Some(status) => status.clone(),
        None => current.status.clone(),
    };
    let notes = req.notes.clone().or_else(|| current.notes.clone());
    let cancelled_at = if status == STATUS_CANCELLED {
        current.cancelled_at.clone().or_else(|| {
            Some(
                clock::salon_now(state.utc_offset_minutes)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string(),
            )
        })
    } else {
        None
    };

    if status != STATUS_CANCELLED {
        let busy = store::busy_appointments_for_date(&mut *conn, start_at.date()).await?;
        if let Some(conflicting) =
            conflict::find_conflict(start_at, duration_min, &busy, Some(id))
        {
            return Err(ApiError::SchedulingConflict(ConflictInfo::from_busy(
                conflicting,
            )));
        }
    }

    store::update_appointment_core(
        &mut *conn,
        id,
        client_id,
        start_at,
        new_override,
        &status,
        notes.as_deref(),
        cancelled_at.as_deref(),
    )
    .await?;

    if let (Some(paid), Some(method)) = (req.paid_price, req.payment_method.as_deref()) {
        check_out(&mut *conn, id, paid, method).await?;
    }
    Ok(())
}

/// Record the amount actually paid and spread it over the service
/// snapshots, in the same transaction as the appointment update.
async fn check_out(
    conn: &mut SqliteConnection,
    id: i64,
    paid: Decimal,
    method: &str,
) -> Result<(), ApiError> {
    let rows = store::appointment_service_rows(&mut *conn, id).await?;
    let snapshots: Vec<Decimal> = rows
        .iter()
        .map(|r| cents_to_decimal(r.price_snapshot_cents))
        .collect();

    let shares = payment::distribute_paid_price(paid, &snapshots);
    for (row, share) in rows.iter().zip(shares.iter()) {
        store::set_snapshot_cents(&mut *conn, row.id, decimal_to_cents(*share)).await?;
    }
    store::set_appointment_payment(&mut *conn, id, decimal_to_cents(paid), method).await?;
    Ok(())
}

/// POST /api/admin/appointments/:id/cancel — cancel, keep history
pub async fn cancel_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<AppointmentDetail>>> {
    let mut conn = state.db.acquire().await?;
    let staff = auth::require_staff(&headers, &mut conn).await?;

    let now = clock::salon_now(state.utc_offset_minutes)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string();
    if !store::cancel_appointment(&mut conn, id, &now).await? {
        return Err(ApiError::NotFound("Appointment"));
    }
    let detail = store::appointment_detail(&mut conn, id)
        .await?
        .ok_or(ApiError::NotFound("Appointment"))?;
    tracing::info!("appointment {} cancelled by {}", id, staff.username);
    Ok(Json(ApiResponse::success(detail)))
}

/// GET /api/admin/slots?date=&service_id= or &duration_min= — staff
/// view of the grid, no online-booking gate
pub async fn list_slots(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<StaffSlotsQuery>,
) -> AppResult<Json<ApiResponse<Vec<String>>>> {
    let date = super::parse_date(&query.date)?;
    let mut conn = state.db.acquire().await?;
    auth::require_staff(&headers, &mut conn).await?;

    let duration_min = match (query.service_id, query.duration_min) {
        (Some(service_id), _) => {
            store::service_by_id(&mut conn, service_id)
                .await?
                .ok_or(ApiError::NotFound("Service"))?
                .duration_min
        }
        (None, Some(d)) if d > 0 => d,
        _ => {
            return Err(ApiError::Validation(
                "service_id or a positive duration_min is required".into(),
            ));
        }
    };

    let settings = store::settings_get_or_create(&mut conn).await?;
    let schedule = WeekSchedule::from_json(&settings.working_hours);
    let slots = super::public::compute_slots(&mut conn, date, duration_min, &schedule).await?;
    Ok(Json(ApiResponse::success(slots)))
}
